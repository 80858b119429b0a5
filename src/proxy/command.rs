use bytes::Bytes;
use http::{HeaderMap, Response};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::collaborators::SessionManager;
use crate::domain::PortMapping;
use crate::error::GatewayError;
use crate::proxy::context::{full_body, BoxBody};
use crate::proxy::correlator::{Correlator, HttpProxyRequest};
use crate::proxy::headers::remove_hop_headers;

/// Forward a request through `mapping.target_client_id`'s control
/// connection and wait for the matching response.
///
/// `path_and_query` is the request-target (path plus optional raw query);
/// `scheme` is the default scheme configured for this gateway, used both to
/// build the envelope's target `url` and as the `X-Forwarded-Proto` fallback.
#[allow(clippy::too_many_arguments)]
pub async fn forward(
    session_manager: &dyn SessionManager,
    correlator: &Correlator,
    mapping: &PortMapping,
    method: &str,
    path_and_query: &str,
    headers: &HeaderMap,
    body: Bytes,
    scheme: &str,
    deadline: Duration,
) -> Result<Response<BoxBody>, GatewayError> {
    if !session_manager.has_control_connection(mapping.target_client_id) {
        return Err(GatewayError::ClientOffline);
    }

    let request_id = Uuid::new_v4();
    let mut outbound_headers = headers.clone();
    remove_hop_headers(&mut outbound_headers);
    let header_map: HashMap<String, String> = outbound_headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

    let url = format!(
        "{scheme}://{}:{}{path_and_query}",
        mapping.target_host, mapping.target_port
    );

    let request = HttpProxyRequest {
        request_id,
        mapping_id: mapping.id.clone(),
        method: method.to_string(),
        url,
        headers: header_map,
        body: body.to_vec(),
        timeout_seconds: deadline.as_secs(),
    };

    let rx = correlator.register(request_id);
    if let Err(err) = session_manager
        .send_http_proxy_request(mapping.target_client_id, request)
        .await
    {
        correlator.unregister(&request_id);
        return Err(err);
    }

    let proxy_response = correlator.wait(request_id, rx, deadline).await?;

    if !proxy_response.error.is_empty() {
        return Err(GatewayError::Upstream(proxy_response.error));
    }

    let mut builder = Response::builder().status(proxy_response.status_code);
    for (name, value) in &proxy_response.headers {
        builder = builder.header(name, value);
    }
    let mut response = builder
        .body(full_body(Bytes::from(proxy_response.body)))
        .map_err(|e| GatewayError::Upstream(e.to_string()))?;
    remove_hop_headers(response.headers_mut());
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MappingStatus, Protocol};
    use crate::proxy::tunnel::Tunnel;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn mapping(client_id: u64) -> PortMapping {
        PortMapping {
            id: "pm_1".into(),
            protocol: Protocol::Http,
            subdomain: "a".into(),
            base_domain: "b.com".into(),
            target_client_id: client_id,
            target_host: "10.0.0.1".into(),
            target_port: 9000,
            status: MappingStatus::Active,
            is_revoked: false,
            expires_at: None,
        }
    }

    struct OfflineSessionManager;

    #[async_trait]
    impl SessionManager for OfflineSessionManager {
        fn has_control_connection(&self, _client_id: u64) -> bool {
            false
        }
        async fn send_http_proxy_request(
            &self,
            _client_id: u64,
            _request: HttpProxyRequest,
        ) -> Result<(), GatewayError> {
            unreachable!("must not be called when offline")
        }
        async fn request_tunnel_for_http(
            &self,
            _client_id: u64,
            _mapping_id: &str,
            _target_url: &str,
            _method: &str,
        ) -> Result<Box<dyn Tunnel>, GatewayError> {
            unreachable!()
        }
    }

    struct EchoSessionManager {
        correlator: Arc<Correlator>,
        sent: AtomicBool,
        captured_headers: std::sync::Mutex<Option<HashMap<String, String>>>,
    }

    #[async_trait]
    impl SessionManager for EchoSessionManager {
        fn has_control_connection(&self, _client_id: u64) -> bool {
            true
        }
        async fn send_http_proxy_request(
            &self,
            _client_id: u64,
            request: HttpProxyRequest,
        ) -> Result<(), GatewayError> {
            self.sent.store(true, Ordering::SeqCst);
            *self.captured_headers.lock().unwrap() = Some(request.headers.clone());
            self.correlator.on_response(crate::proxy::correlator::HttpProxyResponse {
                request_id: request.request_id,
                status_code: 200,
                headers: HashMap::new(),
                body: b"ok".to_vec(),
                error: String::new(),
            });
            Ok(())
        }
        async fn request_tunnel_for_http(
            &self,
            _client_id: u64,
            _mapping_id: &str,
            _target_url: &str,
            _method: &str,
        ) -> Result<Box<dyn Tunnel>, GatewayError> {
            unreachable!()
        }
    }

    #[tokio::test]
    async fn offline_client_fails_fast_without_registering() {
        let correlator = Correlator::new();
        let session_manager = OfflineSessionManager;
        let mapping = mapping(1);

        let err = forward(
            &session_manager,
            &correlator,
            &mapping,
            "GET",
            "/",
            &HeaderMap::new(),
            Bytes::new(),
            "http",
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, GatewayError::ClientOffline));
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn round_trips_through_correlator() {
        let correlator = Arc::new(Correlator::new());
        let session_manager = EchoSessionManager {
            correlator: correlator.clone(),
            sent: AtomicBool::new(false),
            captured_headers: std::sync::Mutex::new(None),
        };
        let mapping = mapping(1);

        let response = forward(
            &session_manager,
            &correlator,
            &mapping,
            "GET",
            "/",
            &HeaderMap::new(),
            Bytes::new(),
            "http",
            Duration::from_secs(1),
        )
        .await
        .unwrap();

        assert_eq!(response.status(), 200);
        assert!(session_manager.sent.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn envelope_strips_hop_by_hop_headers_from_user_request() {
        let correlator = Arc::new(Correlator::new());
        let session_manager = EchoSessionManager {
            correlator: correlator.clone(),
            sent: AtomicBool::new(false),
            captured_headers: std::sync::Mutex::new(None),
        };
        let mapping = mapping(1);

        let mut headers = HeaderMap::new();
        headers.insert(http::header::CONNECTION, "keep-alive".parse().unwrap());
        headers.insert("keep-alive", "timeout=5".parse().unwrap());
        headers.insert("x-custom", "value".parse().unwrap());

        forward(
            &session_manager,
            &correlator,
            &mapping,
            "GET",
            "/",
            &headers,
            Bytes::new(),
            "http",
            Duration::from_secs(1),
        )
        .await
        .unwrap();

        let captured = session_manager.captured_headers.lock().unwrap().clone().unwrap();
        assert!(!captured.contains_key("connection"));
        assert!(!captured.contains_key("keep-alive"));
        assert_eq!(captured.get("x-custom").unwrap(), "value");
    }

    struct ErroringSessionManager {
        correlator: Arc<Correlator>,
    }

    #[async_trait]
    impl SessionManager for ErroringSessionManager {
        fn has_control_connection(&self, _client_id: u64) -> bool {
            true
        }
        async fn send_http_proxy_request(
            &self,
            _client_id: u64,
            request: HttpProxyRequest,
        ) -> Result<(), GatewayError> {
            self.correlator.on_response(crate::proxy::correlator::HttpProxyResponse {
                request_id: request.request_id,
                status_code: 0,
                headers: HashMap::new(),
                body: vec![],
                error: "target connection refused".to_string(),
            });
            Ok(())
        }
        async fn request_tunnel_for_http(
            &self,
            _client_id: u64,
            _mapping_id: &str,
            _target_url: &str,
            _method: &str,
        ) -> Result<Box<dyn Tunnel>, GatewayError> {
            unreachable!()
        }
    }

    #[tokio::test]
    async fn non_empty_envelope_error_surfaces_as_upstream_error() {
        let correlator = Arc::new(Correlator::new());
        let session_manager = ErroringSessionManager {
            correlator: correlator.clone(),
        };
        let mapping = mapping(1);

        let err = forward(
            &session_manager,
            &correlator,
            &mapping,
            "GET",
            "/",
            &HeaderMap::new(),
            Bytes::new(),
            "http",
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, GatewayError::Upstream(_)));
    }
}
