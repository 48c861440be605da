//! Structured logging setup using the `tracing` ecosystem.
//!
//! One subscriber serves both diagnostics and the access log: records from
//! [`TracingSink`](crate::middleware::access_log::TracingSink) are ordinary
//! events carrying `app`, `request`, `method`, `remote`, `status`, `took`
//! and `outcome` fields. Output is JSON for collectors or pretty for a
//! terminal, picked by TTY detection unless `--json` / `--pretty` is given.

use tracing::Level;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::LogLevel;

/// Driver crates that log every heartbeat at debug level.
const CHATTY_TARGETS: &[&str] = &["mongodb", "hyper", "hyper_util"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[must_use]
pub fn resolve_format(pretty: bool, json: bool) -> LogFormat {
    let tty = std::io::IsTerminal::is_terminal(&std::io::stdout());
    pick_format(pretty, json, tty)
}

const fn pick_format(pretty: bool, json: bool, tty: bool) -> LogFormat {
    match (json, pretty, tty) {
        (true, _, _) => LogFormat::Json,
        (false, true, _) | (false, false, true) => LogFormat::Pretty,
        (false, false, false) => LogFormat::Json,
    }
}

/// `level` for this crate and everything else, capped at INFO for driver
/// crates unless tracing is explicitly requested.
fn filter(level: Level) -> Targets {
    let driver_level = if level == Level::TRACE {
        Level::TRACE
    } else {
        level.min(Level::INFO)
    };
    CHATTY_TARGETS
        .iter()
        .fold(Targets::new().with_default(level), |targets, target| {
            targets.with_target(*target, driver_level)
        })
}

pub fn init(level: &LogLevel, format: LogFormat) {
    let filter = filter(level.to_tracing_level());

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_target(false))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().pretty())
                .init();
        }
    }
}

/// Record a startup failure the process cannot recover from. The caller
/// returns the error and `main` exits non-zero.
pub fn fatal(app: &str, appmsg: &str, error: &dyn std::error::Error) {
    tracing::error!(app = %app, appmsg = %appmsg, error = %error, "fatal startup error");
}

/// Record an application error a handler recovered from. `msg_body` is
/// the payload being processed when it failed.
pub fn error(app: &str, appmsg: &str, msg_body: &str, error: &dyn std::error::Error) {
    tracing::error!(app = %app, appmsg = %appmsg, msgbody = %msg_body, "{error}");
}

#[cfg(test)]
pub(crate) mod capture {
    //! Collects JSON log lines emitted inside a closure.

    use std::io::Write;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    pub struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        pub fn lines(&self) -> Vec<serde_json::Value> {
            String::from_utf8_lossy(&self.0.lock().unwrap())
                .lines()
                .map(|line| serde_json::from_str(line).unwrap())
                .collect()
        }
    }

    fn subscriber(captured: &Captured) -> impl tracing::Subscriber + Send + Sync + 'static {
        let writer = captured.clone();
        tracing_subscriber::fmt()
            .json()
            .with_writer(move || writer.clone())
            .finish()
    }

    /// Run `f` with a JSON subscriber installed for the current thread.
    pub fn json_logs<R>(f: impl FnOnce() -> R) -> (R, Captured) {
        let captured = Captured::default();
        let result = tracing::subscriber::with_default(subscriber(&captured), f);
        (result, captured)
    }

    /// Drive `fut` with a JSON subscriber attached to it.
    pub async fn json_logs_async<F: std::future::Future>(fut: F) -> (F::Output, Captured) {
        use tracing::instrument::WithSubscriber;

        let captured = Captured::default();
        let result = fut.with_subscriber(subscriber(&captured)).await;
        (result, captured)
    }
}
