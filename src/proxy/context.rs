use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use std::net::IpAddr;
use std::time::Instant;

pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

pub fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

pub fn empty_body() -> BoxBody {
    Full::new(Bytes::new())
        .map_err(|never| match never {})
        .boxed()
}

/// Per-request context threaded through classification, resolution, and
/// forwarding — the single place request metadata accumulates and final
/// metrics are recorded.
pub struct RequestContext {
    pub host: String,
    pub uri_path: String,
    pub method: String,
    pub client_ip: IpAddr,
    pub start: Instant,
    /// Set once a mapping is resolved; empty before resolution or on a
    /// `DomainNotFound` failure.
    pub full_domain: String,
}

impl RequestContext {
    pub fn new(host: String, uri_path: String, method: String, client_ip: IpAddr) -> Self {
        Self {
            host,
            uri_path,
            method,
            client_ip,
            start: Instant::now(),
            full_domain: String::new(),
        }
    }

    /// Record terminal metrics for this request. Called exactly once per
    /// request on every exit path (success or mapped error) — the single
    /// place request-duration/status metrics are emitted.
    pub fn finalize_metrics(&self, status_code: u16, path_kind: &'static str) {
        let mut buf = itoa::Buffer::new();
        let status_str = buf.format(status_code);

        metrics::counter!(
            "gateway_domain_proxy_requests_total",
            "path" => path_kind,
            "status_code" => status_str.to_owned(),
        )
        .increment(1);

        metrics::histogram!(
            "gateway_domain_proxy_request_duration_seconds",
            "path" => path_kind,
        )
        .record(self.start.elapsed().as_secs_f64());
    }
}
