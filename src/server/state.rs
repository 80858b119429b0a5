use std::sync::Arc;

use crate::collaborators::{DomainRepository, RemoteControlClient, SessionManager, StatsProvider};
use crate::config::GatewayConfig;
use crate::domain::{DomainRegistry, MappingResolver};
use crate::gateway_health::GatewayHealthManager;
use crate::health::HealthComposite;
use crate::metrics::Metrics;
use crate::proxy::correlator::Correlator;

/// Shared gateway state, cheaply cloneable.
///
/// `session_manager`, `repository` and `remote_control` are external
/// collaborators out of scope for this core: the caller wires in concrete
/// implementations at construction time — state simply cannot be built
/// without a `SessionManager`, so there is no path that serves traffic
/// before one exists.
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<GatewayConfig>,
    pub registry: Arc<DomainRegistry>,
    pub resolver: Arc<MappingResolver>,
    pub correlator: Arc<Correlator>,
    pub session_manager: Arc<dyn SessionManager>,
    pub metrics: Metrics,
    pub health: Arc<HealthComposite>,
    pub gateway_health: Arc<GatewayHealthManager>,
}

impl GatewayState {
    /// `repository` and `remote_control` are the persistent-store and
    /// cross-node tiers of the mapping resolver; either or
    /// both may be absent, in which case resolution never falls through
    /// past the in-memory registry.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: GatewayConfig,
        session_manager: Arc<dyn SessionManager>,
        repository: Option<Arc<dyn DomainRepository>>,
        remote_control: Option<Arc<dyn RemoteControlClient>>,
        health: Arc<HealthComposite>,
        stats_provider: Option<Arc<dyn StatsProvider>>,
    ) -> Self {
        let registry = Arc::new(DomainRegistry::new(
            config.modules.domain_proxy.allowed_base_domains.clone(),
        ));
        let resolver = Arc::new(MappingResolver::new(
            registry.clone(),
            repository,
            remote_control,
        ));

        Self {
            config: Arc::new(config),
            registry,
            resolver,
            correlator: Arc::new(Correlator::new()),
            session_manager,
            metrics: Metrics::install(),
            health,
            gateway_health: Arc::new(GatewayHealthManager::new(stats_provider)),
        }
    }
}
