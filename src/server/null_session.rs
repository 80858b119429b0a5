use async_trait::async_trait;

use crate::collaborators::SessionManager;
use crate::error::GatewayError;
use crate::proxy::correlator::HttpProxyRequest;
use crate::proxy::tunnel::Tunnel;

/// Default `SessionManager` wired in when the operator has not supplied a
/// real one.
/// Every client is reported offline and every tunnel request is refused, so
/// a gateway booted with no session manager configured degrades to "always
/// 503 / backend unavailable" rather than failing to start.
pub struct NullSessionManager;

#[async_trait]
impl SessionManager for NullSessionManager {
    fn has_control_connection(&self, _client_id: u64) -> bool {
        false
    }

    async fn send_http_proxy_request(
        &self,
        _client_id: u64,
        _request: HttpProxyRequest,
    ) -> Result<(), GatewayError> {
        Err(GatewayError::ClientOffline)
    }

    async fn request_tunnel_for_http(
        &self,
        _client_id: u64,
        _mapping_id: &str,
        _target_url: &str,
        _method: &str,
    ) -> Result<Box<dyn Tunnel>, GatewayError> {
        Err(GatewayError::ClientOffline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reports_every_client_offline() {
        let mgr = NullSessionManager;
        assert!(!mgr.has_control_connection(1));
        let err = mgr
            .send_http_proxy_request(
                1,
                HttpProxyRequest {
                    request_id: uuid::Uuid::new_v4(),
                    mapping_id: "pm_1".into(),
                    method: "GET".into(),
                    url: "http://10.0.0.1:9000/".into(),
                    headers: Default::default(),
                    body: vec![],
                    timeout_seconds: 30,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::ClientOffline));
    }
}
