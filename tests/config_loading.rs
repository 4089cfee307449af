//! Integration tests for config loading across file formats.

use portico::balancer::Algorithm;
use portico::config::model::Config;
use portico::config::{load_file, parse_config_str, ConfigVersion};
use portico::config::validation::validate;
use portico::error::GatewayError;

#[cfg(feature = "toml")]
const FULL_TOML: &str = r#"
[server]
port = 8000
admin_port = 8001

[proxy]
timeout_ms = 1500

[load_balancing]
algorithm = "random"

[health_check]
interval_secs = 10

[logging]
file = "/var/log/portico/audit.log"
max_writers = 16

[cors]
allowed_origins = ["https://app.example.com"]

[jwt]
secret_key = "s3cret"

[[services]]
path = "/orders"
methods = ["GET", "POST"]
strip_path = true
algorithm = "round_robin"
upstreams = [{ url = "http://10.0.0.1:8081" }, { url = "http://10.0.0.2:8081" }]

[[services]]
path = "billing"
jwt_required = true
upstreams = [{ url = "https://billing.internal" }]
"#;

#[cfg(feature = "toml")]
#[test]
fn toml_config_loads_and_validates() {
    let config = parse_config_str("toml", FULL_TOML, "portico.toml").unwrap();
    validate(&config).unwrap();

    assert_eq!(config.server.port, 8000);
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.proxy.timeout_ms, 1500);
    assert_eq!(config.logging.max_writers, 16);
    assert_eq!(config.logging.queue_capacity, 1024);
    assert_eq!(config.total_upstreams(), 3);

    let orders = &config.services[0];
    assert_eq!(orders.key(), "orders");
    assert_eq!(config.algorithm_for(orders), Algorithm::RoundRobin);
    assert_eq!(config.algorithm_for(&config.services[1]), Algorithm::Random);
    assert_eq!(config.services[1].methods, vec!["*".to_string()]);
}

#[cfg(feature = "toml")]
#[test]
fn unknown_fields_are_rejected() {
    let err = parse_config_str("toml", "[server]\nprot = 1\n", "bad.toml").unwrap_err();
    assert!(matches!(err, GatewayError::ConfigParse { .. }));
}

#[cfg(feature = "toml")]
#[test]
fn unknown_algorithm_is_rejected() {
    let content = "[load_balancing]\nalgorithm = \"least_conn\"\n";
    assert!(parse_config_str("toml", content, "bad.toml").is_err());
}

#[cfg(feature = "yaml")]
#[test]
fn yaml_config_loads() {
    let content = "services:\n  - path: /orders\n    upstreams:\n      - url: http://localhost:8081\n";
    let config = parse_config_str("yaml", content, "portico.yaml").unwrap();
    validate(&config).unwrap();
    assert_eq!(config.services[0].key(), "orders");
}

#[cfg(feature = "json")]
#[test]
fn json_config_loads() {
    let content = r#"{"services":[{"path":"/orders","upstreams":[{"url":"http://localhost:8081"}]}]}"#;
    let config = parse_config_str("json", content, "portico.json").unwrap();
    validate(&config).unwrap();
    assert_eq!(config.total_upstreams(), 1);
}

#[test]
fn unsupported_extension_is_rejected() {
    let err = parse_config_str("ini", "", "portico.ini").unwrap_err();
    assert!(matches!(err, GatewayError::UnsupportedFormat(ext) if ext == "ini"));
}

#[test]
fn empty_config_is_valid() {
    validate(&Config::default()).unwrap();
}

#[cfg(feature = "toml")]
#[tokio::test]
async fn load_file_hashes_content() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("portico.toml");
    std::fs::write(&path, FULL_TOML).unwrap();

    let (config, version) = load_file(&path).await.unwrap();
    assert_eq!(config.services.len(), 2);
    let ConfigVersion::Hash(hash) = &version else {
        unreachable!()
    };
    assert_eq!(hash.len(), 64);
    assert_eq!(version.short().len(), 8);

    let (_, again) = load_file(&path).await.unwrap();
    assert_eq!(again, version);
}

#[cfg(feature = "toml")]
#[tokio::test]
async fn load_file_reports_validation_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("portico.toml");
    std::fs::write(
        &path,
        "[[services]]\npath = \"/a/b\"\nupstreams = [{ url = \"ftp://x\" }]\n",
    )
    .unwrap();

    let err = load_file(&path).await.unwrap_err();
    let GatewayError::ConfigValidation { errors } = err else {
        panic!("expected validation errors, got {err}");
    };
    assert_eq!(errors.len(), 2);
}

#[tokio::test]
async fn missing_file_is_reported() {
    let err = load_file(std::path::Path::new("/nonexistent/portico.toml"))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::ConfigFileNotFound { .. }));
}
