pub mod types;

#[cfg(test)]
mod tests;

pub use types::*;

use anyhow::Result;
use std::path::Path;

impl GatewayConfig {
    /// Load configuration from a file (if it exists) and apply environment
    /// variable overrides. When the file does not exist, built-in defaults
    /// are used — allowing the gateway to start with zero configuration for
    /// local development.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config: GatewayConfig = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            match path.extension().and_then(|e| e.to_str()) {
                Some("toml") => toml::from_str(&content)?,
                Some("json") => serde_json::from_str(&content)?,
                Some(ext) => anyhow::bail!("unsupported config format: .{ext}, use .toml or .json"),
                None => anyhow::bail!("config file has no extension, use .toml or .json"),
            }
        } else {
            tracing::info!(
                "config file not found at {}, using defaults",
                path.display()
            );
            GatewayConfig::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        tracing::info!("loaded gateway configuration");
        Ok(config)
    }

    /// Apply `GATEWAY_*` environment variable overrides for the
    /// infra-settings fields this gateway actually owns.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("GATEWAY_LISTEN_ADDR") {
            self.listen_addr = v;
        }
        if let Ok(v) = std::env::var("GATEWAY_ADMIN_LISTEN_ADDR") {
            self.admin_listen_addr = v;
        }
        if let Ok(v) = std::env::var("GATEWAY_ALLOWED_BASE_DOMAINS") {
            self.modules.domain_proxy.allowed_base_domains =
                v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
        }
        if let Ok(v) = std::env::var("GATEWAY_COMMAND_MODE_THRESHOLD_BYTES") {
            if let Ok(n) = v.parse::<u64>() {
                self.modules.domain_proxy.command_mode_threshold_bytes = n;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.listen_addr.is_empty() {
            anyhow::bail!("listen_addr cannot be empty");
        }
        if self.api_prefix.is_empty() {
            anyhow::bail!("api_prefix cannot be empty");
        }
        Ok(())
    }
}
