use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::collaborators::{Pingable, StatsProvider};
use crate::error::GatewayError;
use crate::health::composite::{CheckResult, CheckStatus, Checker};

/// Named adapter for one of the two `Pingable` collaborators the health
/// composite reports on by name: the persistent repository ("storage") and
/// the control-plane link ("broker"). Unlike a generic optional dependency,
/// an unconfigured storage or broker collaborator is itself a reportable
/// condition — it is surfaced as `Unhealthy`, not omitted,
/// since the gateway cannot serve its mapping-resolution contract without
/// one wired in.
pub struct PingableChecker {
    name: &'static str,
    absent_message: &'static str,
    target: Option<Arc<dyn Pingable>>,
    timeout: Duration,
}

impl PingableChecker {
    pub fn storage(target: Option<Arc<dyn Pingable>>, timeout: Duration) -> Self {
        Self {
            name: "storage",
            absent_message: "storage not configured",
            target,
            timeout,
        }
    }

    pub fn broker(target: Option<Arc<dyn Pingable>>, timeout: Duration) -> Self {
        Self {
            name: "broker",
            absent_message: "broker not configured",
            target,
            timeout,
        }
    }
}

#[async_trait]
impl Checker for PingableChecker {
    fn name(&self) -> &str {
        self.name
    }

    async fn check(&self) -> Result<Option<CheckResult>, GatewayError> {
        let Some(target) = self.target.as_ref() else {
            return Ok(Some(CheckResult {
                status: CheckStatus::Unhealthy,
                message: Some(self.absent_message.to_string()),
            }));
        };
        // Propagate the ping failure as an error rather than folding it into
        // a `CheckResult` here — `HealthComposite::run` synthesizes the
        // `Unhealthy` report from it, same as it does for a timeout.
        target.ping(self.timeout).await?;
        Ok(Some(CheckResult {
            status: CheckStatus::Healthy,
            message: None,
        }))
    }
}

/// Reports live connection/tunnel counters from the `StatsProvider`
/// collaborator. Unlike storage/broker, an
/// unconfigured stats provider only degrades the report — the gateway can
/// still serve traffic without one, it just can't count it.
pub struct ProtocolChecker {
    stats_provider: Option<Arc<dyn StatsProvider>>,
}

impl ProtocolChecker {
    pub fn new(stats_provider: Option<Arc<dyn StatsProvider>>) -> Self {
        Self { stats_provider }
    }
}

#[async_trait]
impl Checker for ProtocolChecker {
    fn name(&self) -> &str {
        "protocol"
    }

    async fn check(&self) -> Result<Option<CheckResult>, GatewayError> {
        let Some(stats) = self.stats_provider.as_ref() else {
            return Ok(Some(CheckResult {
                status: CheckStatus::Degraded,
                message: Some("protocol stats not configured".to_string()),
            }));
        };
        let connections = stats.active_connections();
        let tunnels = stats.active_tunnels();
        let message = if connections == 0 && tunnels == 0 {
            Some("no active connections".to_string())
        } else {
            None
        };
        Ok(Some(CheckResult {
            status: CheckStatus::Healthy,
            message,
        }))
    }
}

/// Reports the in-memory domain registry's size as a sanity check. Always
/// `Healthy` — an empty registry is operationally worth seeing in the
/// report's message, never a hard failure, since the registry itself
/// cannot be "down".
pub struct RegistryChecker {
    registry: Arc<crate::domain::DomainRegistry>,
}

impl RegistryChecker {
    pub fn new(registry: Arc<crate::domain::DomainRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Checker for RegistryChecker {
    fn name(&self) -> &str {
        "domain_registry"
    }

    async fn check(&self) -> Result<Option<CheckResult>, GatewayError> {
        let count = self.registry.count();
        Ok(Some(CheckResult {
            status: CheckStatus::Healthy,
            message: Some(format!("{count} active mappings")),
        }))
    }
}
