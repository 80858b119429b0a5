//! External collaborators referenced only by contract: the CRUD management API, cloud control (user/client/quota
//! persistence), connection-code issuance, the session manager that holds
//! control connections and can open tunnels, persistent repositories, and
//! so on. This crate defines the narrow trait each core component actually
//! calls through and injects a concrete implementation at construction
//! time.
//!
//! No production implementation of any of these lives here — only the
//! contracts, plus in-memory fakes under `#[cfg(test)]` / `tests/` used to
//! exercise the core.

use async_trait::async_trait;
use std::time::Duration;

use crate::domain::mapping::PortMapping;
use crate::error::GatewayError;
use crate::proxy::correlator::HttpProxyRequest;
use crate::proxy::tunnel::Tunnel;

/// Holds control connections per client and can open on-demand tunnels.
/// Owned by an external "session manager" component.
#[async_trait]
pub trait SessionManager: Send + Sync {
    /// `true` iff `client_id` currently holds an open control connection.
    fn has_control_connection(&self, client_id: u64) -> bool;

    /// Ship a command-mode request to `client_id` over its control
    /// connection. The correlator owns matching the eventual response
    /// back to `request.request_id`.
    async fn send_http_proxy_request(
        &self,
        client_id: u64,
        request: HttpProxyRequest,
    ) -> Result<(), GatewayError>;

    /// Open a fresh byte-stream tunnel to `client_id` for `mapping_id`.
    /// `method` is the HTTP method for HTTP tunnels, or the literal
    /// `"WEBSOCKET"` for WebSocket bridges.
    async fn request_tunnel_for_http(
        &self,
        client_id: u64,
        mapping_id: &str,
        target_url: &str,
        method: &str,
    ) -> Result<Box<dyn Tunnel>, GatewayError>;
}

/// The persistent-store tier of the mapping resolver.
#[async_trait]
pub trait DomainRepository: Send + Sync {
    /// `Ok(None)` signals "not found" (the resolver continues to the next
    /// tier); `Err` is surfaced immediately
    async fn find_by_domain(&self, domain: &str) -> Result<Option<PortMapping>, GatewayError>;
}

/// The cross-node control-plane tier of the mapping resolver.
#[async_trait]
pub trait RemoteControlClient: Send + Sync {
    async fn lookup_domain(&self, domain: &str) -> Result<Option<PortMapping>, GatewayError>;
}

/// Live counters consumed by the Gateway Health Manager and the protocol
/// health checker.
pub trait StatsProvider: Send + Sync {
    fn active_connections(&self) -> i64;
    fn active_tunnels(&self) -> i64;
}

/// Capability a health checker pings — e.g. a database or message broker.
/// Deliberately minimal: health composite adapters only need a liveness
/// probe with a deadline.
#[async_trait]
pub trait Pingable: Send + Sync {
    async fn ping(&self, timeout: Duration) -> Result<(), GatewayError>;
}
