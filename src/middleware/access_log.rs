//! Access log middleware.
//!
//! [`access_log`] times the rest of the stack, turns any [`OutcomeSignal`]
//! the handler attached into the reserved headers, and emits one
//! [`AccessRecord`] per request through an [`AccessSink`]. Records are
//! classified by [`Outcome::classify`]:
//!
//! 1. status >= 400: error, with the error header as detail
//! 2. otherwise a non-empty info header: info, with that detail
//! 3. otherwise: plain success
//!
//! 1xx, 2xx and 3xx statuses (201, 204 and 304 included) are successes.
//! The status is authoritative: an error header on a 2xx response does not
//! make the request an error.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::Response;

use super::signal::{OutcomeSignal, SignalHeaders, Signals};
use crate::config::model::Config;
use crate::error::TetherError;

static X_CORRELATION_ID: HeaderName = HeaderName::from_static("x-correlation-id");

/// How a finished request is reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Error(String),
    Info(String),
    Success,
}

impl Outcome {
    #[must_use]
    pub fn classify(status: StatusCode, signals: &Signals) -> Self {
        if status.as_u16() >= 400 {
            let detail = signals
                .error
                .clone()
                .or_else(|| status.canonical_reason().map(str::to_owned))
                .unwrap_or_else(|| format!("status {}", status.as_u16()));
            return Self::Error(detail);
        }
        match &signals.info {
            Some(info) => Self::Info(info.clone()),
            None => Self::Success,
        }
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Error(_) => "error",
            Self::Info(_) => "info",
            Self::Success => "success",
        }
    }

    #[must_use]
    pub fn detail(&self) -> &str {
        match self {
            Self::Error(d) | Self::Info(d) => d,
            Self::Success => "plain success",
        }
    }
}

/// One request, as written to the access log.
#[derive(Debug, Clone)]
pub struct AccessRecord {
    pub app: String,
    pub request: String,
    pub method: Method,
    pub remote: String,
    pub status: StatusCode,
    pub took: Duration,
    pub correlation_id: String,
    pub outcome: Outcome,
}

/// Destination for access records. Failures are reported by the
/// middleware on a separate channel and never reach the client.
pub trait AccessSink: Send + Sync {
    fn emit(&self, record: &AccessRecord) -> Result<(), TetherError>;
}

/// Writes records as structured `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl AccessSink for TracingSink {
    fn emit(&self, record: &AccessRecord) -> Result<(), TetherError> {
        match &record.outcome {
            Outcome::Error(detail) => tracing::error!(
                app = %record.app,
                request = %record.request,
                method = %record.method,
                remote = %record.remote,
                status = record.status.as_u16(),
                took = ?record.took,
                correlation_id = %record.correlation_id,
                outcome = record.outcome.label(),
                "{detail}"
            ),
            Outcome::Info(detail) => tracing::info!(
                app = %record.app,
                request = %record.request,
                method = %record.method,
                remote = %record.remote,
                status = record.status.as_u16(),
                took = ?record.took,
                correlation_id = %record.correlation_id,
                outcome = record.outcome.label(),
                "{detail}"
            ),
            Outcome::Success => tracing::info!(
                app = %record.app,
                request = %record.request,
                method = %record.method,
                remote = %record.remote,
                status = record.status.as_u16(),
                took = ?record.took,
                correlation_id = %record.correlation_id,
                outcome = record.outcome.label(),
                "{}",
                record.outcome.detail()
            ),
        }
        Ok(())
    }
}

pub struct AccessLog {
    app: String,
    signals: SignalHeaders,
    strip: bool,
    sink: Arc<dyn AccessSink>,
}

impl AccessLog {
    #[must_use]
    pub fn new(app: impl Into<String>, signals: SignalHeaders) -> Self {
        Self {
            app: app.into(),
            signals,
            strip: false,
            sink: Arc::new(TracingSink),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, TetherError> {
        let signals = SignalHeaders::new(&config.error_header())?;
        Ok(Self::new(config.app.clone(), signals).strip_signals(config.signals.strip))
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn AccessSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Remove the signal headers from responses after logging.
    #[must_use]
    pub const fn strip_signals(mut self, strip: bool) -> Self {
        self.strip = strip;
        self
    }

    #[must_use]
    pub fn app(&self) -> &str {
        &self.app
    }

    #[must_use]
    pub const fn signals(&self) -> &SignalHeaders {
        &self.signals
    }
}

pub async fn access_log(
    State(log): State<Arc<AccessLog>>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();

    let method = request.method().clone();
    let uri = request
        .uri()
        .path_and_query()
        .map_or_else(|| request.uri().path().to_owned(), |pq| pq.as_str().to_owned());
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| "-".to_owned(), |ConnectInfo(addr)| addr.to_string());
    let correlation_id = request
        .headers()
        .get(&X_CORRELATION_ID)
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| uuid::Uuid::new_v4().to_string(), String::from);

    let mut response = next.run(request).await;
    let took = start.elapsed();

    if let Some(signal) = response.extensions_mut().remove::<OutcomeSignal>() {
        log.signals.render(&signal, response.headers_mut());
    }

    let status = response.status();
    let signals = log.signals.read(response.headers());

    let record = AccessRecord {
        app: log.app.clone(),
        request: uri,
        method,
        remote,
        status,
        took,
        correlation_id,
        outcome: Outcome::classify(status, &signals),
    };

    if let Err(e) = log.sink.emit(&record) {
        tracing::warn!(
            app = %log.app,
            correlation_id = %record.correlation_id,
            error = %e,
            "access log sink failed"
        );
    }

    if log.strip {
        log.signals.strip(response.headers_mut());
    }

    if let Ok(value) = HeaderValue::from_str(&record.correlation_id) {
        response.headers_mut().insert(X_CORRELATION_ID.clone(), value);
    }

    response
}
