use std::sync::Arc;
use std::time::SystemTime;
use tracing::warn;

use crate::collaborators::{DomainRepository, RemoteControlClient};
use crate::domain::mapping::{MappingStatus, PortMapping};
use crate::domain::registry::{strip_port, DomainRegistry};
use crate::error::GatewayError;

/// Three-tier mapping lookup: the persistent
/// repository first, then the in-memory registry, then the cross-node
/// remote control plane as a last resort. Each external tier is optional —
/// a gateway running with neither wired in degrades to a pure in-memory
/// registry.
pub struct MappingResolver {
    registry: Arc<DomainRegistry>,
    repository: Option<Arc<dyn DomainRepository>>,
    remote_control: Option<Arc<dyn RemoteControlClient>>,
}

impl MappingResolver {
    pub fn new(
        registry: Arc<DomainRegistry>,
        repository: Option<Arc<dyn DomainRepository>>,
        remote_control: Option<Arc<dyn RemoteControlClient>>,
    ) -> Self {
        Self {
            registry,
            repository,
            remote_control,
        }
    }

    /// Resolve `host` (port included or not) to an active, non-expired,
    /// non-revoked `PortMapping`.
    ///
    /// A mapping found but blocked (inactive, revoked, or expired) never
    /// reaches forwarding (invariant I3 / property P4): the repository tier
    /// treats a blocked find as "not found" and falls through to the next
    /// tier, since it only returns on "found and not expired and active";
    /// the registry and remote-control tiers instead fail the whole lookup
    /// with the mapped error (`Unavailable` for an inactive mapping,
    /// `Forbidden` for revoked/expired), matching step 3's "validate ...
    /// and return or fail with a mapped error".
    pub async fn resolve(&self, host: &str) -> Result<PortMapping, GatewayError> {
        let full_domain = strip_port(host);

        if let Some(repository) = &self.repository {
            if let Some(mapping) = repository.find_by_domain(full_domain).await? {
                if !mapping.is_blocked(SystemTime::now()) {
                    // Write-through: subsequent lookups hit the registry
                    // tier. Best-effort — a racing unregister for the same
                    // domain is not escalated, the next lookup simply
                    // re-resolves.
                    if let Err(err) = self.registry.register(mapping.clone()) {
                        warn!(
                            domain = full_domain,
                            error = ?err,
                            "resolver: write-through registration from repository failed"
                        );
                    }
                    return Ok(mapping);
                }
            }
        }

        if let Some(mapping) = self.registry.lookup(full_domain) {
            return Self::gate(mapping);
        }

        if let Some(remote_control) = &self.remote_control {
            if let Some(mapping) = remote_control.lookup_domain(full_domain).await? {
                let gated = Self::gate(mapping)?;
                if let Err(err) = self.registry.register(gated.clone()) {
                    warn!(
                        domain = full_domain,
                        error = ?err,
                        "resolver: write-through registration from remote control failed"
                    );
                }
                return Ok(gated);
            }
        }

        Err(GatewayError::DomainNotFound)
    }

    /// Validate `{status == active, not revoked, not expired}`, failing with
    /// the mapped error names rather than a generic
    /// `DomainNotFound` — callers that reached this tier already know the
    /// domain exists, they just can't use it right now.
    fn gate(mapping: PortMapping) -> Result<PortMapping, GatewayError> {
        if mapping.status != MappingStatus::Active {
            return Err(GatewayError::Unavailable);
        }
        if mapping.is_blocked(SystemTime::now()) {
            return Err(GatewayError::Forbidden);
        }
        Ok(mapping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::mapping::{MappingStatus, Protocol};
    use async_trait::async_trait;

    fn mapping(status: MappingStatus) -> PortMapping {
        PortMapping {
            id: "pm_1".into(),
            protocol: Protocol::Http,
            subdomain: "myapp".into(),
            base_domain: "tunnel.example.com".into(),
            target_client_id: 1,
            target_host: "10.0.0.1".into(),
            target_port: 9000,
            status,
            is_revoked: false,
            expires_at: None,
        }
    }

    struct FakeRepository(Option<PortMapping>);

    #[async_trait]
    impl DomainRepository for FakeRepository {
        async fn find_by_domain(&self, _domain: &str) -> Result<Option<PortMapping>, GatewayError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn falls_through_to_repository_and_caches_in_registry() {
        let registry = Arc::new(DomainRegistry::new(vec![]));
        let repository: Arc<dyn DomainRepository> =
            Arc::new(FakeRepository(Some(mapping(MappingStatus::Active))));
        let resolver = MappingResolver::new(registry.clone(), Some(repository), None);

        let found = resolver.resolve("myapp.tunnel.example.com").await.unwrap();
        assert_eq!(found.id, "pm_1");
        assert_eq!(registry.count(), 1);
    }

    #[tokio::test]
    async fn inactive_mapping_from_registry_is_unavailable() {
        let registry = Arc::new(DomainRegistry::new(vec![]));
        registry.register(mapping(MappingStatus::Inactive)).unwrap();
        let resolver = MappingResolver::new(registry, None, None);

        let err = resolver
            .resolve("myapp.tunnel.example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Unavailable));
    }

    #[tokio::test]
    async fn revoked_mapping_from_registry_is_forbidden() {
        let registry = Arc::new(DomainRegistry::new(vec![]));
        let mut revoked = mapping(MappingStatus::Active);
        revoked.is_revoked = true;
        registry.register(revoked).unwrap();
        let resolver = MappingResolver::new(registry, None, None);

        let err = resolver
            .resolve("myapp.tunnel.example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Forbidden));
    }

    #[tokio::test]
    async fn repository_tier_is_consulted_before_registry() {
        let registry = Arc::new(DomainRegistry::new(vec![]));
        registry.register(mapping(MappingStatus::Inactive)).unwrap();
        let repository: Arc<dyn DomainRepository> =
            Arc::new(FakeRepository(Some(mapping(MappingStatus::Active))));
        let resolver = MappingResolver::new(registry, Some(repository), None);

        let found = resolver.resolve("myapp.tunnel.example.com").await.unwrap();
        assert_eq!(found.id, "pm_1");
    }

    #[tokio::test]
    async fn misses_every_tier_without_repository_or_remote() {
        let registry = Arc::new(DomainRegistry::new(vec![]));
        let resolver = MappingResolver::new(registry, None, None);
        let err = resolver.resolve("nope.example.com").await.unwrap_err();
        assert!(matches!(err, GatewayError::DomainNotFound));
    }
}
