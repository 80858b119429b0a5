use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use crate::domain::mapping::{PortMapping, Protocol};
use crate::error::GatewayError;

/// Inner state guarded by the registry's single readers-writer lock.
struct RegistryInner {
    by_domain: HashMap<String, PortMapping>,
    allowed_base_domains: HashSet<String>,
}

/// Thread-safe mapping from full hostname to `PortMapping`, plus
/// base-domain allow-listing.
///
/// Concurrency: one `RwLock` — all reads acquire shared mode, all
/// mutations exclusive. Lookups never allocate beyond the returned clone.
pub struct DomainRegistry {
    inner: RwLock<RegistryInner>,
}

impl DomainRegistry {
    pub fn new(allowed_base_domains: Vec<String>) -> Self {
        Self {
            inner: RwLock::new(RegistryInner {
                by_domain: HashMap::new(),
                allowed_base_domains: allowed_base_domains.into_iter().collect(),
            }),
        }
    }

    /// Register `mapping`. Idempotent when re-registering the same `id`
    /// under the same domain; fails if the slot is occupied by a different
    /// `id`, if the domain is outside the allow-list, or the mapping is
    /// structurally invalid.
    pub fn register(&self, mapping: PortMapping) -> Result<(), GatewayError> {
        let full_domain = mapping.full_domain();
        if full_domain.is_empty() {
            return Err(GatewayError::InvalidDomain);
        }
        if mapping.protocol != Protocol::Http {
            return Err(GatewayError::InvalidProtocol);
        }

        let mut inner = self.inner.write().unwrap();
        if !inner.allowed_base_domains.is_empty()
            && !inner.allowed_base_domains.contains(&mapping.base_domain)
        {
            return Err(GatewayError::BaseDomainNotAllowed);
        }

        if let Some(existing) = inner.by_domain.get(&full_domain) {
            if existing.id != mapping.id {
                return Err(GatewayError::DomainAlreadyExists);
            }
        }

        inner.by_domain.insert(full_domain, mapping);
        Self::report_size(inner.by_domain.len());
        Ok(())
    }

    /// Idempotent removal by full hostname.
    pub fn unregister(&self, full_domain: &str) {
        let mut inner = self.inner.write().unwrap();
        inner.by_domain.remove(full_domain);
        Self::report_size(inner.by_domain.len());
    }

    /// Idempotent removal by mapping id, regardless of which domain it
    /// currently occupies.
    pub fn unregister_by_mapping_id(&self, id: &str) {
        let mut inner = self.inner.write().unwrap();
        inner.by_domain.retain(|_, m| m.id != id);
        Self::report_size(inner.by_domain.len());
    }

    pub fn lookup(&self, full_domain: &str) -> Option<PortMapping> {
        self.inner.read().unwrap().by_domain.get(full_domain).cloned()
    }

    /// Strips a trailing `:port` (the last `:` only) before looking up.
    pub fn lookup_by_host(&self, host: &str) -> Option<PortMapping> {
        self.lookup(strip_port(host))
    }

    /// Atomically replace the whole table. Non-HTTP entries are dropped.
    pub fn rebuild(&self, snapshot: Vec<PortMapping>) {
        let mut by_domain = HashMap::with_capacity(snapshot.len());
        for mapping in snapshot {
            if mapping.protocol != Protocol::Http {
                continue;
            }
            let full_domain = mapping.full_domain();
            if full_domain.is_empty() {
                continue;
            }
            by_domain.insert(full_domain, mapping);
        }
        Self::report_size(by_domain.len());
        self.inner.write().unwrap().by_domain = by_domain;
    }

    fn report_size(count: usize) {
        metrics::gauge!("gateway_domain_proxy_mappings_total").set(count as f64);
    }

    pub fn is_subdomain_available(&self, subdomain: &str, base_domain: &str) -> bool {
        let full_domain = format!("{}.{}", subdomain, base_domain);
        !self.inner.read().unwrap().by_domain.contains_key(&full_domain)
    }

    /// `true` iff the allow-list is empty (dev mode) or contains `base_domain`.
    pub fn is_base_domain_allowed(&self, base_domain: &str) -> bool {
        let inner = self.inner.read().unwrap();
        inner.allowed_base_domains.is_empty()
            || inner.allowed_base_domains.contains(base_domain)
    }

    pub fn count(&self) -> usize {
        self.inner.read().unwrap().by_domain.len()
    }

    /// Diagnostic dump of every currently registered mapping, for the
    /// admin `/v1/mappings` endpoint. Does not consult the repository or
    /// remote-control tiers.
    pub fn snapshot(&self) -> Vec<PortMapping> {
        self.inner.read().unwrap().by_domain.values().cloned().collect()
    }
}

/// Strip a trailing `:port` from `host`, splitting on the *last* `:` so
/// that literal IPv6 addresses (which contain `:`) are not mis-split.
/// This mirrors the one authoritative port-stripping rule used by both
/// the registry and the mapping resolver (spec property P2).
pub fn strip_port(host: &str) -> &str {
    match host.rfind(':') {
        Some(idx) => &host[..idx],
        None => host,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::mapping::MappingStatus;

    fn mapping(id: &str, sub: &str, base: &str) -> PortMapping {
        PortMapping {
            id: id.to_string(),
            protocol: Protocol::Http,
            subdomain: sub.to_string(),
            base_domain: base.to_string(),
            target_client_id: 1,
            target_host: "10.0.0.1".into(),
            target_port: 9000,
            status: MappingStatus::Active,
            is_revoked: false,
            expires_at: None,
        }
    }

    #[test]
    fn scenario_base_domain_guard() {
        let registry = DomainRegistry::new(vec!["tunnel.example.com".to_string()]);

        let err = registry
            .register(mapping("pm_1", "myapp", "other.example.com"))
            .unwrap_err();
        assert!(matches!(err, GatewayError::BaseDomainNotAllowed));

        registry
            .register(mapping("pm_1", "myapp", "tunnel.example.com"))
            .unwrap();

        let found = registry.lookup("myapp.tunnel.example.com").unwrap();
        assert_eq!(found.id, "pm_1");
    }

    #[test]
    fn scenario_port_stripping() {
        let registry = DomainRegistry::new(vec!["tunnel.example.com".to_string()]);
        registry
            .register(mapping("pm_1", "myapp", "tunnel.example.com"))
            .unwrap();

        let found = registry
            .lookup_by_host("myapp.tunnel.example.com:443")
            .unwrap();
        assert_eq!(found.id, "pm_1");
    }

    #[test]
    fn scenario_rebuild_drops_non_http() {
        let registry = DomainRegistry::new(vec![]);
        let mut tcp_mapping = mapping("pm_3", "x", "example.com");
        tcp_mapping.protocol = Protocol::Tcp;

        registry.rebuild(vec![
            mapping("pm_1", "app1", "example.com"),
            mapping("pm_2", "app2", "example.com"),
            tcp_mapping,
        ]);

        assert_eq!(registry.count(), 2);
    }

    #[test]
    fn register_same_id_on_same_domain_is_idempotent() {
        let registry = DomainRegistry::new(vec![]);
        registry.register(mapping("pm_1", "a", "b.com")).unwrap();
        registry.register(mapping("pm_1", "a", "b.com")).unwrap();
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn register_different_id_on_occupied_domain_fails() {
        let registry = DomainRegistry::new(vec![]);
        registry.register(mapping("pm_1", "a", "b.com")).unwrap();
        let err = registry.register(mapping("pm_2", "a", "b.com")).unwrap_err();
        assert!(matches!(err, GatewayError::DomainAlreadyExists));
    }

    #[test]
    fn empty_full_domain_is_invalid() {
        let registry = DomainRegistry::new(vec![]);
        let err = registry.register(mapping("pm_1", "", "b.com")).unwrap_err();
        assert!(matches!(err, GatewayError::InvalidDomain));
    }

    #[test]
    fn unregister_by_mapping_id_is_idempotent() {
        let registry = DomainRegistry::new(vec![]);
        registry.register(mapping("pm_1", "a", "b.com")).unwrap();
        registry.unregister_by_mapping_id("pm_1");
        registry.unregister_by_mapping_id("pm_1");
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn strip_port_keeps_ipv6_address_intact_up_to_last_colon() {
        assert_eq!(strip_port("example.com:8080"), "example.com");
        assert_eq!(strip_port("example.com"), "example.com");
    }
}
