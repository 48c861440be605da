//! Configuration validation with detailed error reporting.
//!
//! The [`validate`] function checks a parsed [`Config`] for problems that
//! would otherwise surface at startup or on the first request: an app tag
//! or error header that is not a legal HTTP header name, a namespace
//! MongoDB would reject, a MongoDB backend without a usable URL, and
//! half-configured credentials. Returns every [`ValidationError`] found.

use http::HeaderName;

use super::model::{BackendKind, Config};
use crate::error::ValidationError;
use crate::middleware::signal::INFO_HEADER;

/// Characters MongoDB does not allow in database names.
const FORBIDDEN_NAMESPACE_CHARS: &[char] = &['/', '\\', '.', ' ', '"', '$', '*', '<', '>', ':', '|', '?'];

/// MongoDB caps database names at 63 bytes.
const MAX_NAMESPACE_LEN: usize = 63;

/// Validate a header name. Returns `Ok(())` or a human-readable error.
pub fn validate_header_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("header name cannot be empty".into());
    }
    if HeaderName::from_bytes(name.to_ascii_lowercase().as_bytes()).is_err() {
        return Err(format!("'{name}' is not a valid HTTP header name"));
    }
    if name.eq_ignore_ascii_case(INFO_HEADER.as_str()) {
        return Err(format!("'{name}' is reserved for info signals"));
    }
    Ok(())
}

/// Validate a database namespace. Returns `Ok(())` or a human-readable error.
pub fn validate_namespace(namespace: &str) -> Result<(), String> {
    if namespace.is_empty() {
        return Err("namespace cannot be empty".into());
    }
    if namespace.len() > MAX_NAMESPACE_LEN {
        return Err(format!(
            "namespace is {} bytes, at most {MAX_NAMESPACE_LEN} allowed",
            namespace.len()
        ));
    }
    if let Some(c) = namespace.chars().find(|c| FORBIDDEN_NAMESPACE_CHARS.contains(c)) {
        return Err(format!("namespace cannot contain '{c}'"));
    }
    Ok(())
}

/// Validate a MongoDB connection URL. Returns `Ok(())` or a human-readable error.
pub fn validate_mongodb_url(url: &str) -> Result<(), String> {
    let rest = url
        .strip_prefix("mongodb://")
        .or_else(|| url.strip_prefix("mongodb+srv://"))
        .ok_or_else(|| format!("'{url}' must start with mongodb:// or mongodb+srv://"))?;
    let hosts = rest.rsplit_once('@').map_or(rest, |(_, h)| h);
    let hosts = hosts.split(['/', '?']).next().unwrap_or_default();
    if hosts.is_empty() {
        return Err(format!("'{url}' does not name any host"));
    }
    Ok(())
}

pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.app.trim().is_empty() {
        errors.push(ValidationError {
            section: "(root)".into(),
            field: "app".into(),
            message: "app tag cannot be empty".into(),
            suggestion: None,
        });
    }

    let error_header = config.error_header();
    if let Err(msg) = validate_header_name(&error_header) {
        let field = if config.signals.error_header.is_some() {
            "signals.error_header"
        } else {
            "app"
        };
        errors.push(ValidationError {
            section: "signals".into(),
            field: field.into(),
            message: msg,
            suggestion: config.signals.error_header.is_none().then(|| {
                "set signals.error_header explicitly when the app tag is not header-safe".into()
            }),
        });
    }

    let db = &config.database;

    if let Err(msg) = validate_namespace(&db.namespace) {
        errors.push(ValidationError {
            section: "database".into(),
            field: "namespace".into(),
            message: msg,
            suggestion: None,
        });
    }

    match db.backend {
        BackendKind::Memory => {
            if db.url.is_some() {
                errors.push(ValidationError {
                    section: "database".into(),
                    field: "url".into(),
                    message: "url is ignored by the memory backend".into(),
                    suggestion: Some("did you mean 'backend: mongodb'?".into()),
                });
            }
        }
        BackendKind::Mongodb => match db.url.as_deref() {
            None => errors.push(ValidationError {
                section: "database".into(),
                field: "url".into(),
                message: "url is required for the mongodb backend".into(),
                suggestion: Some("e.g. mongodb://localhost:27017".into()),
            }),
            Some(url) => {
                if let Err(msg) = validate_mongodb_url(url) {
                    errors.push(ValidationError {
                        section: "database".into(),
                        field: "url".into(),
                        message: msg,
                        suggestion: None,
                    });
                }
            }
        },
    }

    match (&db.username, &db.password) {
        (Some(_), None) => errors.push(ValidationError {
            section: "database".into(),
            field: "password".into(),
            message: "password is required when username is set".into(),
            suggestion: None,
        }),
        (None, Some(_)) => errors.push(ValidationError {
            section: "database".into(),
            field: "username".into(),
            message: "username is required when password is set".into(),
            suggestion: None,
        }),
        (Some(u), Some(_)) if u.is_empty() => errors.push(ValidationError {
            section: "database".into(),
            field: "username".into(),
            message: "username cannot be empty when credentials are configured".into(),
            suggestion: None,
        }),
        _ => {}
    }

    if db.connect_timeout == 0 {
        errors.push(ValidationError {
            section: "database".into(),
            field: "connect_timeout".into(),
            message: "connect timeout must be greater than 0".into(),
            suggestion: Some("the default is 10000 ms".into()),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::DatabaseConfig;

    fn mongo_config(url: &str) -> Config {
        Config {
            database: DatabaseConfig {
                backend: BackendKind::Mongodb,
                url: Some(url.into()),
                ..DatabaseConfig::default()
            },
            ..Config::default()
        }
    }

    #[test]
    fn default_config_is_valid() {
        validate(&Config::default()).unwrap();
    }

    #[test]
    fn mongodb_urls() {
        assert!(validate_mongodb_url("mongodb://localhost:27017").is_ok());
        assert!(validate_mongodb_url("mongodb://a:1,b:2/shop?replicaSet=rs0").is_ok());
        assert!(validate_mongodb_url("mongodb+srv://u:p@cluster.example.net").is_ok());
        assert!(validate_mongodb_url("http://localhost").is_err());
        assert!(validate_mongodb_url("mongodb:///shop").is_err());
    }

    #[test]
    fn mongodb_backend_requires_url() {
        let mut config = mongo_config("mongodb://localhost");
        config.database.url = None;
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.message.contains("required")));
    }

    #[test]
    fn app_tag_with_spaces_needs_explicit_header() {
        let config = Config {
            app: "my shop".into(),
            ..Config::default()
        };
        let errors = validate(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.message.contains("not a valid HTTP header name")));

        let mut fixed = config;
        fixed.signals.error_header = Some("x-shop-error".into());
        validate(&fixed).unwrap();
    }

    #[test]
    fn error_header_cannot_shadow_info() {
        let mut config = Config::default();
        config.signals.error_header = Some("Info".into());
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.message.contains("reserved")));
    }

    #[test]
    fn bad_namespace_fails() {
        let mut config = Config::default();
        config.database.namespace = "shop.items".into();
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.message.contains("cannot contain '.'")));

        config.database.namespace = "x".repeat(64);
        assert!(validate(&config).is_err());
    }

    #[test]
    fn credentials_come_in_pairs() {
        let mut config = mongo_config("mongodb://localhost");
        config.database.username = Some("svc".into());
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "password"));
    }

    #[test]
    fn url_on_memory_backend_suggests_mongodb() {
        let mut config = Config::default();
        config.database.url = Some("mongodb://localhost".into());
        let errors = validate(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.suggestion.as_deref() == Some("did you mean 'backend: mongodb'?")));
    }

    #[test]
    fn zero_connect_timeout_fails() {
        let mut config = mongo_config("mongodb://localhost");
        config.database.connect_timeout = 0;
        assert!(validate(&config).is_err());
    }
}
