//! `tether init`: generate a starter configuration file.
//!
//! Creates a YAML, JSON, or TOML config file with either minimal
//! or fully documented templates.

use std::path::PathBuf;

use crate::cli::{ConfigFormat, InitArgs};
use crate::error::TetherError;

pub fn execute(args: &InitArgs) -> Result<(), TetherError> {
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("tether.{}", args.format.extension())));

    if output.exists() {
        return Err(TetherError::FileExists { path: output });
    }

    std::fs::write(&output, template(&args.format, args.full))?;
    println!("Created {}", output.display());
    Ok(())
}

#[must_use]
pub const fn template(format: &ConfigFormat, full: bool) -> &'static str {
    match (format, full) {
        (ConfigFormat::Yaml, false) => YAML_MINIMAL,
        (ConfigFormat::Yaml, true) => YAML_FULL,
        (ConfigFormat::Json, false) => JSON_MINIMAL,
        (ConfigFormat::Json, true) => JSON_FULL,
        (ConfigFormat::Toml, false) => TOML_MINIMAL,
        (ConfigFormat::Toml, true) => TOML_FULL,
    }
}

const YAML_MINIMAL: &str = r#"# tether config

app: "tether"

database:
  backend: memory
  namespace: "tether"
"#;

const YAML_FULL: &str = r#"# tether config
#
# All values shown are defaults. Uncomment and modify as needed.

# Tag stamped on every access log record. The error signal header is
# "<app>-error" unless overridden below.
app: "tether"

# signals:
#   error_header: "tether-error"   # Header carrying error detail
#   strip: false                   # Remove signal headers before responding

database:
  # memory keeps data in-process; mongodb needs `url`
  # (requires --features mongodb at build time)
  backend: memory
  namespace: "tether"              # Database every request is scoped to
  # url: "mongodb://localhost:27017"
  # username: "tether"             # Set together with password
  # password: "changeme"
  # connect_timeout: 10000         # Connect / server selection timeout in ms
"#;

const JSON_MINIMAL: &str = r#"{
  "app": "tether",
  "database": {
    "backend": "memory",
    "namespace": "tether"
  }
}
"#;

const JSON_FULL: &str = r#"{
  "app": "tether",
  "signals": {
    "error_header": "tether-error",
    "strip": false
  },
  "database": {
    "backend": "memory",
    "namespace": "tether",
    "connect_timeout": 10000
  }
}
"#;

const TOML_MINIMAL: &str = r#"# tether config

app = "tether"

[database]
backend = "memory"
namespace = "tether"
"#;

const TOML_FULL: &str = r#"# tether config
#
# All values shown are defaults. Uncomment and modify as needed.

app = "tether"

[signals]
# error_header = "tether-error"
# strip = false

[database]
backend = "memory"
namespace = "tether"
# url = "mongodb://localhost:27017"
# username = "tether"
# password = "changeme"
# connect_timeout = 10000
"#;
