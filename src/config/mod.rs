//! Configuration loading and validation.
//!
//! Config is read once at startup: from an explicit path, from a
//! `tether.{yaml,yml,json,toml}` file auto-detected in the working
//! directory, or from built-in defaults when neither exists. The format
//! is picked from the file extension. Submodules provide the data model
//! and validation logic.

pub mod model;
pub mod validation;

use std::path::{Path, PathBuf};

use crate::error::TetherError;
use model::Config;

pub const CANDIDATES: &[&str] = &["tether.yaml", "tether.yml", "tether.json", "tether.toml"];

/// Parse a config string based on file extension.
pub fn parse_config_str(
    ext: &str,
    content: &str,
    path_display: &str,
) -> Result<Config, TetherError> {
    match ext {
        #[cfg(feature = "yaml")]
        "yaml" | "yml" => serde_yml::from_str(content).map_err(|e| TetherError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        #[cfg(feature = "json")]
        "json" => serde_json::from_str(content).map_err(|e| TetherError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        #[cfg(feature = "toml")]
        "toml" => toml::from_str(content).map_err(|e| TetherError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        other => Err(TetherError::UnsupportedFormat(other.to_string())),
    }
}

/// Read and parse a config file without validating it.
pub async fn read_file(path: &Path) -> Result<Config, TetherError> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            TetherError::ConfigFileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            TetherError::Io(e)
        }
    })?;

    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    parse_config_str(ext, &content, &path.display().to_string())
}

/// Resolve the config file to use: the explicit path, else the first
/// auto-detected candidate.
pub async fn resolve_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    for name in CANDIDATES {
        let path = PathBuf::from(name);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::info!(path = %path.display(), "auto-detected config file");
            return Some(path);
        }
    }

    None
}

/// Load the config (file or defaults). Validation is left to the caller
/// so CLI overrides can be applied first.
pub async fn load(explicit: Option<&Path>) -> Result<(Config, Option<PathBuf>), TetherError> {
    match resolve_path(explicit).await {
        Some(path) => Ok((read_file(&path).await?, Some(path))),
        None => {
            tracing::info!("no config file found, using defaults");
            Ok((Config::default(), None))
        }
    }
}

pub fn validated(config: Config) -> Result<Config, TetherError> {
    validation::validate(&config).map_err(|errors| TetherError::ConfigValidation { errors })?;
    Ok(config)
}
