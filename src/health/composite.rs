use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

use crate::error::GatewayError;

/// Liveness/readiness outcome of a single named check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// A single external dependency this gateway reports on (a repository
/// connection, a control-plane link, a stats provider). Returning
/// `Ok(None)` omits the check from the rendered report entirely — used by
/// adapters wrapping an optional collaborator that was never configured.
/// An `Err` is distinct from `Ok(Some(Unhealthy))`: it means the check
/// itself could not run (the collaborator call blew up) rather than ran
/// and observed a real unhealthy dependency; `HealthComposite::run`
/// synthesizes an `Unhealthy` result from it either way, but the
/// distinction is there for a `Checker` to make if it has one.
#[async_trait]
pub trait Checker: Send + Sync {
    fn name(&self) -> &str;
    async fn check(&self) -> Result<Option<CheckResult>, GatewayError>;
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub status: CheckStatus,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NamedCheckResult {
    pub name: String,
    #[serde(flatten)]
    pub result: CheckResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: CheckStatus,
    pub checks: Vec<NamedCheckResult>,
    pub uptime_seconds: u64,
}

/// Runs every registered `Checker` with a shared per-check timeout and
/// rolls the results up into one overall status: unhealthy beats degraded
/// beats healthy.
pub struct HealthComposite {
    checkers: Vec<Arc<dyn Checker>>,
    check_timeout: Duration,
    start_time: Instant,
}

impl HealthComposite {
    pub fn new(checkers: Vec<Arc<dyn Checker>>, check_timeout: Duration) -> Self {
        Self {
            checkers,
            check_timeout,
            start_time: Instant::now(),
        }
    }

    pub async fn run(&self) -> HealthReport {
        let mut checks = Vec::with_capacity(self.checkers.len());
        for checker in &self.checkers {
            let result = match timeout(self.check_timeout, checker.check()).await {
                Ok(Ok(Some(result))) => Some(result),
                Ok(Ok(None)) => None,
                Ok(Err(err)) => Some(CheckResult {
                    status: CheckStatus::Unhealthy,
                    message: Some(err.to_string()),
                }),
                Err(_) => Some(CheckResult {
                    status: CheckStatus::Unhealthy,
                    message: Some("check timed out".to_string()),
                }),
            };
            if let Some(result) = result {
                checks.push(NamedCheckResult {
                    name: checker.name().to_string(),
                    result,
                });
            }
        }

        let status = checks
            .iter()
            .map(|c| c.result.status)
            .fold(CheckStatus::Healthy, worse_of);

        let gauge_value = match status {
            CheckStatus::Healthy => 2.0,
            CheckStatus::Degraded => 1.0,
            CheckStatus::Unhealthy => 0.0,
        };
        metrics::gauge!("gateway_domain_proxy_health_status").set(gauge_value);

        HealthReport {
            status,
            checks,
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }
}

fn worse_of(a: CheckStatus, b: CheckStatus) -> CheckStatus {
    use CheckStatus::*;
    match (a, b) {
        (Unhealthy, _) | (_, Unhealthy) => Unhealthy,
        (Degraded, _) | (_, Degraded) => Degraded,
        _ => Healthy,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedChecker {
        name: &'static str,
        result: Option<CheckResult>,
    }

    #[async_trait]
    impl Checker for FixedChecker {
        fn name(&self) -> &str {
            self.name
        }
        async fn check(&self) -> Result<Option<CheckResult>, GatewayError> {
            Ok(self.result.clone())
        }
    }

    struct SlowChecker;

    #[async_trait]
    impl Checker for SlowChecker {
        fn name(&self) -> &str {
            "slow"
        }
        async fn check(&self) -> Result<Option<CheckResult>, GatewayError> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(Some(CheckResult {
                status: CheckStatus::Healthy,
                message: None,
            }))
        }
    }

    struct FailingChecker;

    #[async_trait]
    impl Checker for FailingChecker {
        fn name(&self) -> &str {
            "failing"
        }
        async fn check(&self) -> Result<Option<CheckResult>, GatewayError> {
            Err(GatewayError::Upstream("collaborator unreachable".into()))
        }
    }

    #[tokio::test]
    async fn overall_status_is_worst_of_all_checks() {
        let composite = HealthComposite::new(
            vec![
                Arc::new(FixedChecker {
                    name: "a",
                    result: Some(CheckResult {
                        status: CheckStatus::Healthy,
                        message: None,
                    }),
                }),
                Arc::new(FixedChecker {
                    name: "b",
                    result: Some(CheckResult {
                        status: CheckStatus::Degraded,
                        message: Some("slow".into()),
                    }),
                }),
            ],
            Duration::from_secs(1),
        );

        let report = composite.run().await;
        assert_eq!(report.status, CheckStatus::Degraded);
        assert_eq!(report.checks.len(), 2);
    }

    #[tokio::test]
    async fn omitted_check_is_dropped_from_report() {
        let composite = HealthComposite::new(
            vec![Arc::new(FixedChecker {
                name: "unconfigured",
                result: None,
            })],
            Duration::from_secs(1),
        );
        let report = composite.run().await;
        assert!(report.checks.is_empty());
        assert_eq!(report.status, CheckStatus::Healthy);
    }

    #[tokio::test]
    async fn timed_out_check_counts_as_unhealthy() {
        let composite = HealthComposite::new(vec![Arc::new(SlowChecker)], Duration::from_millis(10));
        let report = composite.run().await;
        assert_eq!(report.status, CheckStatus::Unhealthy);
    }

    #[tokio::test]
    async fn checker_error_is_synthesized_as_unhealthy_with_message() {
        let composite = HealthComposite::new(vec![Arc::new(FailingChecker)], Duration::from_secs(1));
        let report = composite.run().await;
        assert_eq!(report.status, CheckStatus::Unhealthy);
        assert_eq!(report.checks.len(), 1);
        assert!(report.checks[0]
            .result
            .message
            .as_ref()
            .unwrap()
            .contains("unreachable"));
    }
}
