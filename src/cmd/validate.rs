//! `tether validate`: check a configuration file for errors.
//!
//! A valid file is summarized the way `run` would resolve it: the signal
//! headers a client will see, whether they are stripped, and which
//! database every request gets scoped to. A MongoDB config checked by a
//! build without the `mongodb` feature still passes, with a warning.

use std::fmt::Write;

use serde::Serialize;

use crate::cli::{ValidateArgs, ValidateFormat};
use crate::config::model::{BackendKind, Config};
use crate::config::{parse_config_str, validation};
use crate::error::TetherError;
use crate::middleware::signal::INFO_HEADER;

/// What `run` would do with a validated config.
#[derive(Debug, Serialize)]
pub struct Summary {
    pub app: String,
    pub error_header: String,
    pub info_header: &'static str,
    pub strip_signals: bool,
    pub backend: &'static str,
    pub backend_compiled: bool,
    pub namespace: String,
    pub authenticated: bool,
    pub connect_timeout_ms: Option<u64>,
}

impl Summary {
    #[must_use]
    pub fn of(config: &Config) -> Self {
        let db = &config.database;
        let mongodb = db.backend == BackendKind::Mongodb;
        Self {
            app: config.app.clone(),
            error_header: config.error_header(),
            info_header: INFO_HEADER.as_str(),
            strip_signals: config.signals.strip,
            backend: db.backend.as_str(),
            backend_compiled: !mongodb || cfg!(feature = "mongodb"),
            namespace: db.namespace.clone(),
            authenticated: db.username.is_some(),
            connect_timeout_ms: mongodb.then_some(db.connect_timeout),
        }
    }

    fn render(&self, path: &str) -> String {
        let delivery = if self.strip_signals {
            "logged, stripped from responses"
        } else {
            "logged and sent to clients"
        };
        let mut out = format!(
            "\u{2713} {path} is valid\n  \
             app:       {}\n  \
             signals:   '{}' / '{}' ({delivery})\n  \
             database:  {} (namespace '{}')\n",
            self.app, self.error_header, self.info_header, self.backend, self.namespace,
        );
        if let Some(ms) = self.connect_timeout_ms {
            let auth = if self.authenticated {
                "with credentials"
            } else {
                "no credentials"
            };
            let _ = writeln!(out, "  connect:   {ms}ms timeout, {auth}");
        }
        if !self.backend_compiled {
            let _ = writeln!(
                out,
                "  warning:   this build lacks the {} backend; `tether run` will refuse it",
                self.backend
            );
        }
        out
    }
}

pub fn execute(args: &ValidateArgs) -> Result<(), TetherError> {
    let path = &args.config;

    if !path.exists() {
        return Err(TetherError::ConfigFileNotFound { path: path.clone() });
    }

    let content = std::fs::read_to_string(path)?;

    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let config = parse_config_str(ext, &content, &path.display().to_string())?;

    if let Err(errors) = validation::validate(&config) {
        match args.format {
            ValidateFormat::Text => {
                eprintln!("\u{2717} {} has {} errors\n", path.display(), errors.len());
                for error in &errors {
                    eprintln!("{error}");
                }
            }
            ValidateFormat::Json => {
                let json_errors: Vec<serde_json::Value> = errors
                    .iter()
                    .map(|e| {
                        serde_json::json!({
                            "section": e.section,
                            "field": e.field,
                            "message": e.message,
                            "suggestion": e.suggestion,
                        })
                    })
                    .collect();
                println!(
                    "{}",
                    serde_json::json!({
                        "valid": false,
                        "errors": json_errors,
                    })
                );
            }
        }
        return Err(TetherError::ConfigValidation { errors });
    }

    let summary = Summary::of(&config);
    match args.format {
        ValidateFormat::Text => print!("{}", summary.render(&path.display().to_string())),
        ValidateFormat::Json => println!(
            "{}",
            serde_json::json!({ "valid": true, "summary": summary })
        ),
    }

    Ok(())
}
