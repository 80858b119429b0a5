use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Response, StatusCode};
use thiserror::Error;

use crate::proxy::context::BoxBody;

/// Tagged error kinds propagated by the domain-proxy core.
///
/// Deliberately not a string: callers match on the variant to decide HTTP
/// status and logging level. `Internal` is the catch-all for anything that
/// should never leak detail to the user.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("domain not found")]
    DomainNotFound,
    #[error("base domain not allowed")]
    BaseDomainNotAllowed,
    #[error("domain already exists")]
    DomainAlreadyExists,
    #[error("invalid domain")]
    InvalidDomain,
    #[error("invalid protocol")]
    InvalidProtocol,
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("backend unavailable")]
    Unavailable,
    #[error("mapping forbidden (revoked or expired)")]
    Forbidden,
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    NetworkError(String),
    #[error("client offline")]
    ClientOffline,
    #[error("dependency not configured: {0}")]
    NotConfigured(String),
    #[error("upstream error: {0}")]
    Upstream(String),
    #[error("internal error: {0}")]
    Internal(String),
}

/// Render the plain-text, stable-phrase response body for a `GatewayError`,
/// per the error-to-status mapping the user-facing ingress must honor.
///
/// This is the single exit point for all proxy-core error paths — the one
/// place that builds an error response and decides its status.
pub fn to_response(err: &GatewayError) -> Response<BoxBody> {
    let (status, body) = match err {
        GatewayError::DomainNotFound => (StatusCode::NOT_FOUND, "Domain not found"),
        GatewayError::ClientOffline | GatewayError::Unavailable => {
            (StatusCode::SERVICE_UNAVAILABLE, "Backend service unavailable")
        }
        GatewayError::Timeout => (StatusCode::GATEWAY_TIMEOUT, "Request timeout"),
        GatewayError::BaseDomainNotAllowed | GatewayError::Forbidden => {
            (StatusCode::FORBIDDEN, "Domain not allowed")
        }
        GatewayError::Upstream(_) => (StatusCode::BAD_GATEWAY, "Bad Gateway"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
    };

    Response::builder()
        .status(status)
        .header("content-type", "text/plain; charset=utf-8")
        .body(plain_body(body))
        .unwrap()
}

fn plain_body(data: &'static str) -> BoxBody {
    Full::new(Bytes::from_static(data.as_bytes()))
        .map_err(|never| match never {})
        .boxed()
}
