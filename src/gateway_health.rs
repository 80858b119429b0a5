use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use crate::collaborators::StatsProvider;

/// Lifecycle state of this gateway node, reported to a front-end load
/// balancer or orchestrator. Transitions are one-directional
/// in normal operation: `Healthy` → `Draining` → `Unhealthy`; only an
/// explicit `mark_healthy` (e.g. after a failed drain is aborted) reverses
/// it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    Healthy,
    Draining,
    Unhealthy,
}

/// Free-form detail attached to the current state — currently just the
/// reason the node was last marked unhealthy, if any.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NodeHealthDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unhealthy_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeHealth {
    pub status: NodeState,
    pub start_time_unix: u64,
    pub last_status_change_unix: u64,
    pub uptime_seconds: u64,
    pub details: NodeHealthDetails,
    pub active_connections: i64,
    pub active_tunnels: i64,
}

struct Inner {
    state: NodeState,
    last_status_change: SystemTime,
    details: NodeHealthDetails,
}

/// Tracks this process's own accept/drain/shutdown lifecycle, independent
/// of the dependency health reported by `HealthComposite`. Guarded by a
/// plain `Mutex` — state changes are rare (operator-driven or triggered by
/// shutdown signal handling) so there is no call for sharded locking.
pub struct GatewayHealthManager {
    inner: Mutex<Inner>,
    start_time: Instant,
    start_time_unix: SystemTime,
    stats_provider: Option<Arc<dyn StatsProvider>>,
}

impl GatewayHealthManager {
    pub fn new(stats_provider: Option<Arc<dyn StatsProvider>>) -> Self {
        let now = SystemTime::now();
        Self {
            inner: Mutex::new(Inner {
                state: NodeState::Healthy,
                last_status_change: now,
                details: NodeHealthDetails::default(),
            }),
            start_time: Instant::now(),
            start_time_unix: now,
            stats_provider,
        }
    }

    pub fn is_accepting_connections(&self) -> bool {
        matches!(self.inner.lock().unwrap().state, NodeState::Healthy)
    }

    pub fn mark_draining(&self) {
        self.transition(NodeState::Draining, NodeHealthDetails::default());
    }

    pub fn mark_unhealthy(&self, reason: impl Into<String>) {
        self.transition(
            NodeState::Unhealthy,
            NodeHealthDetails {
                unhealthy_reason: Some(reason.into()),
            },
        );
    }

    pub fn mark_healthy(&self) {
        self.transition(NodeState::Healthy, NodeHealthDetails::default());
    }

    fn transition(&self, state: NodeState, details: NodeHealthDetails) {
        let mut inner = self.inner.lock().unwrap();
        inner.state = state;
        inner.details = details;
        inner.last_status_change = SystemTime::now();
    }

    pub fn get_health_info(&self) -> NodeHealth {
        let inner = self.inner.lock().unwrap();
        let (active_connections, active_tunnels) = match &self.stats_provider {
            Some(provider) => (provider.active_connections(), provider.active_tunnels()),
            None => (0, 0),
        };
        NodeHealth {
            status: inner.state,
            start_time_unix: unix_secs(self.start_time_unix),
            last_status_change_unix: unix_secs(inner.last_status_change),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            details: inner.details.clone(),
            active_connections,
            active_tunnels,
        }
    }
}

fn unix_secs(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}
