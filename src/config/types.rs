use serde::{Deserialize, Serialize};

/// Top-level gateway configuration, loaded from a TOML file and overlaid
/// with environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    #[serde(default = "default_admin_listen_addr")]
    pub admin_listen_addr: String,

    /// Prefix every admin API route is mounted under, e.g. `/api`.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    #[serde(default)]
    pub modules: ModulesConfig,

    #[serde(default)]
    pub cors: CorsConfig,

    #[serde(default)]
    pub health: HealthConfigSection,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            admin_listen_addr: default_admin_listen_addr(),
            api_prefix: default_api_prefix(),
            modules: ModulesConfig::default(),
            cors: CorsConfig::default(),
            health: HealthConfigSection::default(),
        }
    }
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_admin_listen_addr() -> String {
    "0.0.0.0:9090".to_string()
}

fn default_api_prefix() -> String {
    "/api".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModulesConfig {
    #[serde(default)]
    pub domain_proxy: DomainProxyConfig,
}

/// Configuration specific to the multi-tenant domain-proxy core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainProxyConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Base domains new mappings are allowed to register under. Empty
    /// means any base domain is allowed (development mode).
    #[serde(default)]
    pub allowed_base_domains: Vec<String>,

    /// Scheme used to build the upstream target URL and as the
    /// `X-Forwarded-Proto` default.
    #[serde(default = "default_scheme")]
    pub default_scheme: String,

    /// Requests whose declared/observed body size exceeds this threshold
    /// are routed tunnel-mode instead of command-mode.
    #[serde(default = "default_command_mode_threshold")]
    pub command_mode_threshold_bytes: u64,

    /// Wall-clock budget for a command-mode round trip through the
    /// correlator, in seconds.
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,

    /// Reserved for tunnel reuse policy; not exercised by this core.
    #[serde(default)]
    pub tunnel_pool: TunnelPoolConfig,
}

impl Default for DomainProxyConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            allowed_base_domains: Vec::new(),
            default_scheme: default_scheme(),
            command_mode_threshold_bytes: default_command_mode_threshold(),
            command_timeout_secs: default_command_timeout_secs(),
            tunnel_pool: TunnelPoolConfig::default(),
        }
    }
}

impl DomainProxyConfig {
    pub fn command_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.command_timeout_secs)
    }
}

fn default_enabled() -> bool {
    true
}

fn default_scheme() -> String {
    "http".to_string()
}

fn default_command_mode_threshold() -> u64 {
    64 * 1024
}

fn default_command_timeout_secs() -> u64 {
    30
}

/// Reserved tunnel-pool reuse policy — this core
/// opens one fresh tunnel per request/bridge and never reuses it, so these
/// fields are parsed and surfaced but not acted on.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TunnelPoolConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub idle_timeout_secs: Option<u64>,

    #[serde(default)]
    pub max_tunnels_per_client: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            allowed_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfigSection {
    #[serde(default = "default_health_check_timeout_secs")]
    pub check_timeout_secs: u64,
}

impl Default for HealthConfigSection {
    fn default() -> Self {
        Self {
            check_timeout_secs: default_health_check_timeout_secs(),
        }
    }
}

impl HealthConfigSection {
    pub fn check_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.check_timeout_secs)
    }
}

fn default_health_check_timeout_secs() -> u64 {
    5
}
