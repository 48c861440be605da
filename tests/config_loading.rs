//! Integration tests for config loading across all file formats.

use std::path::Path;

use tether::config::model::{BackendKind, Config};
use tether::config::validation::validate;
use tether::config::{self, parse_config_str};
use tether::error::TetherError;
use tether::middleware::access_log::AccessLog;

fn load_demo(name: &str) -> String {
    let path = format!("demos/{name}");
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("failed to read {path}: {e}"))
}

#[test]
fn yaml_demo_loads_and_validates() {
    let content = load_demo("tether.yaml");
    let config = parse_config_str("yaml", &content, "tether.yaml").unwrap();
    validate(&config).unwrap();
    assert_eq!(config.app, "inventory");
    assert_eq!(config.database.backend, BackendKind::Memory);
    assert_eq!(config.error_header(), "inventory-error");
}

#[test]
fn yaml_full_demo_loads_and_validates() {
    let content = load_demo("full.yaml");
    let config = parse_config_str("yaml", &content, "full.yaml").unwrap();
    validate(&config).unwrap();

    assert_eq!(config.database.backend, BackendKind::Mongodb);
    assert_eq!(config.database.connect_timeout, 2500);
    assert!(config.signals.strip);
    // Header names are case-insensitive on the wire; stored lowercased.
    assert_eq!(config.error_header(), "orders-failure");

    let log = AccessLog::from_config(&config).unwrap();
    assert_eq!(log.app(), "orders");
    assert_eq!(log.signals().error().as_str(), "orders-failure");
}

#[test]
fn invalid_demo_reports_every_problem() {
    let content = load_demo("invalid.yaml");
    let config = parse_config_str("yaml", &content, "invalid.yaml").unwrap();
    let errors = validate(&config).unwrap_err();

    let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
    assert_eq!(errors.len(), 4, "{fields:?}");
    assert!(fields.contains(&"app"));
    assert!(fields.contains(&"signals.error_header"));
    assert!(fields.contains(&"namespace"));
    assert!(fields.contains(&"url"));
}

#[test]
fn unknown_fields_are_rejected() {
    let result = parse_config_str("yaml", "app: x\nroutes: []\n", "bad.yaml");
    assert!(matches!(result, Err(TetherError::ConfigParse { .. })));
}

#[cfg(feature = "json")]
#[test]
fn json_demo_loads_and_validates() {
    let content = load_demo("tether.json");
    let config = parse_config_str("json", &content, "tether.json").unwrap();
    validate(&config).unwrap();
    assert_eq!(config.database.namespace, "inventory");
}

#[cfg(feature = "toml")]
#[test]
fn toml_demo_loads_and_validates() {
    let content = load_demo("tether.toml");
    let config = parse_config_str("toml", &content, "tether.toml").unwrap();
    validate(&config).unwrap();
    assert_eq!(config.database.namespace, "inventory");
}

#[cfg(all(feature = "json", feature = "toml"))]
#[test]
fn all_formats_produce_equivalent_configs() {
    let yaml_config = parse_config_str("yaml", &load_demo("tether.yaml"), "yaml").unwrap();
    let json_config = parse_config_str("json", &load_demo("tether.json"), "json").unwrap();
    let toml_config = parse_config_str("toml", &load_demo("tether.toml"), "toml").unwrap();

    for other in [&json_config, &toml_config] {
        assert_eq!(yaml_config.app, other.app);
        assert_eq!(yaml_config.database.backend, other.database.backend);
        assert_eq!(yaml_config.database.namespace, other.database.namespace);
        assert_eq!(yaml_config.error_header(), other.error_header());
    }
}

#[test]
fn unsupported_format_returns_error() {
    let result = parse_config_str("xml", "{}", "test.xml");
    assert!(matches!(result, Err(TetherError::UnsupportedFormat(_))));
}

#[test]
fn defaults_are_valid() {
    let config = Config::default();
    validate(&config).unwrap();
    assert_eq!(config.app, "tether");
    assert_eq!(config.error_header(), "tether-error");
    assert_eq!(config.database.backend, BackendKind::Memory);
}

#[tokio::test]
async fn explicit_path_is_loaded() {
    let (config, path) = config::load(Some(Path::new("demos/tether.yaml")))
        .await
        .unwrap();
    assert_eq!(path.as_deref(), Some(Path::new("demos/tether.yaml")));
    assert_eq!(config.app, "inventory");
}

#[tokio::test]
async fn missing_explicit_path_is_an_error() {
    let result = config::load(Some(Path::new("demos/does-not-exist.yaml"))).await;
    assert!(matches!(
        result,
        Err(TetherError::ConfigFileNotFound { .. })
    ));
}

#[test]
fn validated_wraps_errors() {
    let config = Config {
        app: String::new(),
        ..Config::default()
    };
    let err = config::validated(config).unwrap_err();
    match err {
        TetherError::ConfigValidation { errors } => assert!(!errors.is_empty()),
        other => panic!("unexpected error: {other}"),
    }
}
