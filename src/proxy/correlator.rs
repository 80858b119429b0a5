use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::warn;
use uuid::Uuid;

use crate::error::GatewayError;

/// Command-mode request envelope shipped to a client over its control
/// connection. `request_id` is the correlation
/// key the client must echo back verbatim on `HttpProxyResponse`. `url` is
/// the full target URL (`scheme://target_host:target_port{path}[?query]`),
/// not just the path — the client has no other way to learn the target
/// address. `headers` is a single-value map: multi-value user headers
/// collapse to the first value on this path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpProxyRequest {
    pub request_id: Uuid,
    pub mapping_id: String,
    pub method: String,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    pub timeout_seconds: u64,
}

/// Response envelope the client sends back for a previously dispatched
/// `HttpProxyRequest`, matched on `request_id`. A non-empty `error` means
/// the client itself failed to produce a real response — the gateway
/// writes a `502 Bad Gateway` with that text rather than `status_code`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpProxyResponse {
    pub request_id: Uuid,
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

/// Matches outstanding command-mode requests to their eventual responses.
///
/// Concurrency: a `DashMap` keyed by `request_id` — unlike the domain
/// registry there is no single-writer invariant here, so sharded locking is
/// fine; entries are independent of one another.
pub struct Correlator {
    pending: DashMap<Uuid, oneshot::Sender<HttpProxyResponse>>,
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}

impl Correlator {
    pub fn new() -> Self {
        Self {
            pending: DashMap::new(),
        }
    }

    /// Register interest in `request_id`'s eventual response. Must be
    /// called before the request is handed to the `SessionManager`, so a
    /// response that races the registration is never dropped.
    pub fn register(&self, request_id: Uuid) -> oneshot::Receiver<HttpProxyResponse> {
        let (tx, rx) = oneshot::channel();
        self.pending.insert(request_id, tx);
        metrics::gauge!("gateway_domain_proxy_pending_commands").increment(1.0);
        rx
    }

    /// Drop a pending registration without a response — used on the
    /// timeout/error path so a stray late response cannot resolve a
    /// receiver that's already been abandoned.
    pub fn unregister(&self, request_id: &Uuid) {
        if self.pending.remove(request_id).is_some() {
            metrics::gauge!("gateway_domain_proxy_pending_commands").decrement(1.0);
        }
    }

    /// Deliver `response` to whichever caller is waiting on
    /// `response.request_id`, if any. A response with no matching waiter
    /// (already timed out, or a duplicate) is logged and dropped; a waiter
    /// that's gone (the `wait` future was cancelled) is likewise logged.
    pub fn on_response(&self, response: HttpProxyResponse) {
        let request_id = response.request_id;
        let Some((_, tx)) = self.pending.remove(&request_id) else {
            warn!(
                request_id = %request_id,
                "correlator: response for unknown or already-resolved request_id, dropping"
            );
            return;
        };
        metrics::gauge!("gateway_domain_proxy_pending_commands").decrement(1.0);
        if tx.send(response).is_err() {
            warn!(
                request_id = %request_id,
                "correlator: waiter for request_id is gone, dropping response"
            );
        }
    }

    /// Wait for `request_id`'s response, up to `deadline`. Always
    /// unregisters the waiter on the way out, whether by timeout,
    /// cancellation, or a closed sender (client disconnected mid-flight).
    pub async fn wait(
        &self,
        request_id: Uuid,
        rx: oneshot::Receiver<HttpProxyResponse>,
        deadline: Duration,
    ) -> Result<HttpProxyResponse, GatewayError> {
        let result = timeout(deadline, rx).await;
        self.unregister(&request_id);
        match result {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(GatewayError::ClientOffline),
            Err(_) => {
                metrics::counter!("gateway_domain_proxy_command_timeouts_total").increment(1);
                Err(GatewayError::Timeout)
            }
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
