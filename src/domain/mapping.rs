use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Protocol a `PortMapping` advertises. Only `Http` participates in this
/// core; `Tcp`/`Socks` mappings are dropped by `DomainRegistry::rebuild`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Tcp,
    Socks,
}

/// Lifecycle status of a `PortMapping`, as set by the owning control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingStatus {
    Active,
    Inactive,
    Error,
}

/// The public contract a client has registered: binds a `full_domain` to a
/// `(target_host, target_port)` reachable through `target_client_id`'s
/// control connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortMapping {
    pub id: String,
    pub protocol: Protocol,
    pub subdomain: String,
    pub base_domain: String,
    pub target_client_id: u64,
    pub target_host: String,
    pub target_port: u16,
    pub status: MappingStatus,
    pub is_revoked: bool,
    /// Unix timestamp (seconds) after which the mapping is expired, if set.
    pub expires_at: Option<u64>,
}

impl PortMapping {
    /// `subdomain + "." + base_domain`. Empty when either half is empty —
    /// callers must reject an empty `full_domain` for HTTP mappings.
    pub fn full_domain(&self) -> String {
        if self.subdomain.is_empty() || self.base_domain.is_empty() {
            return String::new();
        }
        format!("{}.{}", self.subdomain, self.base_domain)
    }

    /// `true` when `status != active`, `is_revoked`, or `expires_at` is in
    /// the past — the gate a lookup that reaches request forwarding must
    /// never cross (spec invariant I3 / testable property P4).
    pub fn is_blocked(&self, now: SystemTime) -> bool {
        if self.status != MappingStatus::Active || self.is_revoked {
            return true;
        }
        if let Some(expires_at) = self.expires_at {
            let now_secs = now
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0);
            if expires_at < now_secs {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(status: MappingStatus, revoked: bool, expires_at: Option<u64>) -> PortMapping {
        PortMapping {
            id: "pm_1".into(),
            protocol: Protocol::Http,
            subdomain: "myapp".into(),
            base_domain: "tunnel.example.com".into(),
            target_client_id: 1,
            target_host: "127.0.0.1".into(),
            target_port: 8080,
            status,
            is_revoked: revoked,
            expires_at,
        }
    }

    #[test]
    fn full_domain_joins_sub_and_base() {
        let m = mapping(MappingStatus::Active, false, None);
        assert_eq!(m.full_domain(), "myapp.tunnel.example.com");
    }

    #[test]
    fn full_domain_empty_when_subdomain_missing() {
        let mut m = mapping(MappingStatus::Active, false, None);
        m.subdomain.clear();
        assert_eq!(m.full_domain(), "");
    }

    #[test]
    fn blocked_when_inactive_revoked_or_expired() {
        let now = SystemTime::now();
        assert!(mapping(MappingStatus::Inactive, false, None).is_blocked(now));
        assert!(mapping(MappingStatus::Active, true, None).is_blocked(now));
        assert!(!mapping(MappingStatus::Active, false, None).is_blocked(now));

        let past = now
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
            .saturating_sub(3600);
        assert!(mapping(MappingStatus::Active, false, Some(past)).is_blocked(now));

        let future = now.duration_since(UNIX_EPOCH).unwrap().as_secs() + 3600;
        assert!(!mapping(MappingStatus::Active, false, Some(future)).is_blocked(now));
    }
}
