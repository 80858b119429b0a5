use super::types::*;
use super::GatewayConfig;

#[test]
fn load_falls_back_to_defaults_when_file_missing() {
    let cfg = GatewayConfig::load(std::path::Path::new("/nonexistent/gateway.toml")).unwrap();
    assert_eq!(cfg.listen_addr, "0.0.0.0:8080");
}

#[test]
fn load_parses_toml_file() {
    let toml_str = r#"
        listen_addr = "127.0.0.1:9000"
        api_prefix = "/v1"

        [modules.domain_proxy]
        allowed_base_domains = ["tunnel.example.com"]
        command_mode_threshold_bytes = 2048
    "#;
    let tmp = std::env::temp_dir().join("domain_gateway_test_config.toml");
    std::fs::write(&tmp, toml_str).unwrap();
    let cfg = GatewayConfig::load(&tmp).unwrap();
    std::fs::remove_file(&tmp).ok();

    assert_eq!(cfg.listen_addr, "127.0.0.1:9000");
    assert_eq!(cfg.api_prefix, "/v1");
    assert_eq!(
        cfg.modules.domain_proxy.allowed_base_domains,
        vec!["tunnel.example.com"]
    );
    assert_eq!(cfg.modules.domain_proxy.command_mode_threshold_bytes, 2048);
}

#[test]
fn unsupported_format_is_rejected() {
    let tmp = std::env::temp_dir().join("domain_gateway_test.yml");
    std::fs::write(&tmp, "key: value").unwrap();
    let result = GatewayConfig::load(&tmp);
    std::fs::remove_file(&tmp).ok();
    assert!(result.is_err());
}

#[test]
fn validate_rejects_empty_listen_addr() {
    let mut cfg = GatewayConfig::default();
    cfg.listen_addr.clear();
    assert!(cfg.validate().is_err());
}

#[test]
fn validate_accepts_defaults() {
    assert!(GatewayConfig::default().validate().is_ok());
}
