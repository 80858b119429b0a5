use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Histogram bucket boundaries for latency metrics (seconds).
const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Thin handle around the global metrics recorder.
///
/// After `Metrics::install()` the `metrics` crate macros (`counter!`, `gauge!`,
/// `histogram!`) can be used anywhere in the codebase. The `PrometheusHandle`
/// is retained solely for rendering the `/metrics` endpoint.
#[derive(Clone)]
pub struct Metrics {
    handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder and register metric descriptions.
    ///
    /// Must be called **once** at startup before any `counter!` / `gauge!` /
    /// `histogram!` calls.
    pub fn install() -> Self {
        let handle = PrometheusBuilder::new()
            .set_buckets_for_metric(
                metrics_exporter_prometheus::Matcher::Suffix("_duration_seconds".to_string()),
                LATENCY_BUCKETS,
            )
            .expect("valid matcher")
            .install_recorder()
            .expect("failed to install metrics recorder");

        // request path
        describe_counter!(
            "gateway_domain_proxy_requests_total",
            Unit::Count,
            "Total domain-proxy requests processed, by forwarding path and status"
        );
        describe_histogram!(
            "gateway_domain_proxy_request_duration_seconds",
            Unit::Seconds,
            "Total request duration from client perspective, by forwarding path"
        );

        // command correlator
        describe_gauge!(
            "gateway_domain_proxy_pending_commands",
            Unit::Count,
            "Number of command-mode requests awaiting a response"
        );
        describe_counter!(
            "gateway_domain_proxy_command_timeouts_total",
            Unit::Count,
            "Total command-mode requests that timed out waiting for a response"
        );

        // tunnels
        describe_gauge!(
            "gateway_domain_proxy_active_tunnels",
            Unit::Count,
            "Number of currently open tunnel-mode and websocket connections"
        );

        // domain registry
        describe_gauge!(
            "gateway_domain_proxy_mappings_total",
            Unit::Count,
            "Number of port mappings currently registered"
        );

        // health
        describe_gauge!(
            "gateway_domain_proxy_health_status",
            Unit::Count,
            "Overall health composite status: 2=healthy 1=degraded 0=unhealthy"
        );

        Self { handle }
    }

    /// Render all metrics in Prometheus text exposition format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}
