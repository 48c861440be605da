//! Serde data structures for the tether configuration file.
//!
//! Contains [`Config`] (the root), [`SignalConfig`] for the reserved
//! outcome headers, and [`DatabaseConfig`] for the shared connection.
//! All types derive `Serialize` and `Deserialize` with
//! `deny_unknown_fields` for strict parsing.

use serde::{Deserialize, Serialize};

const fn default_connect_timeout() -> u64 {
    10_000
}

fn default_app() -> String {
    "tether".to_string()
}

fn default_namespace() -> String {
    "tether".to_string()
}

fn is_default_connect_timeout(v: &u64) -> bool {
    *v == default_connect_timeout()
}

fn is_false(v: &bool) -> bool {
    !*v
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Application tag stamped on every access log record.
    #[serde(default = "default_app")]
    pub app: String,

    #[serde(default, skip_serializing_if = "SignalConfig::is_default")]
    pub signals: SignalConfig,

    #[serde(default)]
    pub database: DatabaseConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app: default_app(),
            signals: SignalConfig::default(),
            database: DatabaseConfig::default(),
        }
    }
}

impl Config {
    /// Name of the response header carrying error signals: the configured
    /// override, else `<app>-error`.
    #[must_use]
    pub fn error_header(&self) -> String {
        self.signals
            .error_header
            .clone()
            .unwrap_or_else(|| format!("{}-error", self.app))
            .to_ascii_lowercase()
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SignalConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_header: Option<String>,

    /// Remove the signal headers from responses once they have been logged.
    #[serde(default, skip_serializing_if = "is_false")]
    pub strip: bool,
}

impl SignalConfig {
    fn is_default(&self) -> bool {
        self.error_header.is_none() && !self.strip
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Memory,
    Mongodb,
}

impl BackendKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Mongodb => "mongodb",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub backend: BackendKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Database name; also the key bindings are stored under per request.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Connect and server-selection timeout in milliseconds.
    #[serde(
        default = "default_connect_timeout",
        skip_serializing_if = "is_default_connect_timeout"
    )]
    pub connect_timeout: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            url: None,
            namespace: default_namespace(),
            username: None,
            password: None,
            connect_timeout: default_connect_timeout(),
        }
    }
}
