//! Outcome signals: how handlers tell the access log what happened.
//!
//! Handlers return an ordinary response, so they have no channel for
//! "this failed because ..." other than the response itself. They attach
//! an [`OutcomeSignal`] to it (usually through [`write_error_signal`],
//! [`write_info_signal`] or by returning an [`ApiError`]); the access log
//! renders the signal into two reserved response headers before the
//! response leaves the middleware stack, then reads the headers back to
//! classify the request:
//!
//! - the error header, `<app>-error` unless configured otherwise
//! - the info header, literally `info`
//!
//! Handlers that still write the raw headers themselves are read the same
//! way. The header names are wire-visible and must not change.

use std::fmt::Display;

use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::error::TetherError;

pub static INFO_HEADER: HeaderName = HeaderName::from_static("info");

/// What a handler reports about its own outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OutcomeSignal {
    #[default]
    None,
    Error(String),
    Info(String),
}

impl OutcomeSignal {
    pub fn error(err: impl Display) -> Self {
        Self::Error(err.to_string())
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::Info(message.into())
    }

    /// Attach this signal to a response. An error signal already attached
    /// is never replaced by a weaker one.
    pub fn attach(self, response: impl IntoResponse) -> Response {
        let mut response = response.into_response();
        let has_error = matches!(response.extensions().get::<Self>(), Some(Self::Error(_)));
        if !has_error || matches!(self, Self::Error(_)) {
            response.extensions_mut().insert(self);
        }
        response
    }
}

/// Report a failure: the error's text becomes the error signal and
/// `status` the final status code.
pub fn write_error_signal<E: Display + ?Sized>(err: &E, status: StatusCode) -> Response {
    OutcomeSignal::Error(err.to_string()).attach(status)
}

/// Report success with a note for the access log. Always 200.
pub fn write_info_signal(message: impl Into<String>) -> Response {
    OutcomeSignal::info(message).attach(StatusCode::OK)
}

/// Handler error carrying its status. Renders through [`write_error_signal`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<TetherError> for ApiError {
    fn from(e: TetherError) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        write_error_signal(&self.message, self.status)
    }
}

/// Signal header values as found on a finished response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signals {
    pub error: Option<String>,
    pub info: Option<String>,
}

impl Signals {
    /// Collapse to one signal. Error wins when both are present.
    #[must_use]
    pub fn outcome(&self) -> OutcomeSignal {
        match (&self.error, &self.info) {
            (Some(e), _) => OutcomeSignal::Error(e.clone()),
            (None, Some(i)) => OutcomeSignal::Info(i.clone()),
            (None, None) => OutcomeSignal::None,
        }
    }
}

/// The reserved header pair for one deployment.
#[derive(Debug, Clone)]
pub struct SignalHeaders {
    error: HeaderName,
    info: HeaderName,
}

impl SignalHeaders {
    pub fn new(error_header: &str) -> Result<Self, TetherError> {
        let error = HeaderName::from_bytes(error_header.to_ascii_lowercase().as_bytes())
            .map_err(|_| TetherError::InvalidHeaderName {
                name: error_header.to_owned(),
            })?;
        if error == INFO_HEADER {
            return Err(TetherError::InvalidHeaderName {
                name: error_header.to_owned(),
            });
        }
        Ok(Self {
            error,
            info: INFO_HEADER.clone(),
        })
    }

    /// `<app>-error` for the given app tag.
    pub fn for_app(app: &str) -> Result<Self, TetherError> {
        Self::new(&format!("{app}-error"))
    }

    #[must_use]
    pub const fn error(&self) -> &HeaderName {
        &self.error
    }

    #[must_use]
    pub const fn info(&self) -> &HeaderName {
        &self.info
    }

    pub fn render(&self, signal: &OutcomeSignal, headers: &mut HeaderMap) {
        match signal {
            OutcomeSignal::None => {}
            OutcomeSignal::Error(message) => {
                headers.insert(self.error.clone(), header_value(message));
            }
            OutcomeSignal::Info(message) => {
                headers.insert(self.info.clone(), header_value(message));
            }
        }
    }

    #[must_use]
    pub fn read(&self, headers: &HeaderMap) -> Signals {
        Signals {
            error: read_header(headers, &self.error),
            info: read_header(headers, &self.info),
        }
    }

    pub fn strip(&self, headers: &mut HeaderMap) {
        headers.remove(&self.error);
        headers.remove(&self.info);
    }
}

fn read_header(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    headers
        .get(name)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
        .filter(|v| !v.is_empty())
}

/// Header-safe rendering of an arbitrary message: control characters
/// (newlines included) become spaces.
fn header_value(message: &str) -> HeaderValue {
    let cleaned: String = message
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    HeaderValue::from_bytes(cleaned.trim().as_bytes())
        .unwrap_or_else(|_| HeaderValue::from_static("unrepresentable signal"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers() -> SignalHeaders {
        SignalHeaders::for_app("Inventory").unwrap()
    }

    #[test]
    fn error_header_is_lowercased_app_tag() {
        assert_eq!(headers().error().as_str(), "inventory-error");
        assert_eq!(headers().info().as_str(), "info");
    }

    #[test]
    fn info_cannot_be_the_error_header() {
        assert!(SignalHeaders::new("INFO").is_err());
        assert!(SignalHeaders::new("bad header").is_err());
    }

    #[test]
    fn write_error_signal_sets_status_and_signal() {
        let response = write_error_signal("validation failed", StatusCode::BAD_REQUEST);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.extensions().get::<OutcomeSignal>(),
            Some(&OutcomeSignal::Error("validation failed".into()))
        );
    }

    #[test]
    fn write_info_signal_is_ok() {
        let response = write_info_signal("cache warmed");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.extensions().get::<OutcomeSignal>(),
            Some(&OutcomeSignal::Info("cache warmed".into()))
        );
    }

    #[test]
    fn info_does_not_override_error() {
        let response = write_error_signal("boom", StatusCode::INTERNAL_SERVER_ERROR);
        let response = OutcomeSignal::info("fine").attach(response);
        assert_eq!(
            response.extensions().get::<OutcomeSignal>(),
            Some(&OutcomeSignal::Error("boom".into()))
        );
    }

    #[test]
    fn render_then_read() {
        let h = headers();
        let mut map = HeaderMap::new();
        h.render(&OutcomeSignal::error("line one\nline two"), &mut map);
        h.render(&OutcomeSignal::info("note"), &mut map);

        let signals = h.read(&map);
        assert_eq!(signals.error.as_deref(), Some("line one line two"));
        assert_eq!(signals.info.as_deref(), Some("note"));
        assert_eq!(signals.outcome(), OutcomeSignal::Error("line one line two".into()));

        h.strip(&mut map);
        assert_eq!(h.read(&map), Signals::default());
    }

    #[test]
    fn empty_headers_are_no_signal() {
        let h = headers();
        let mut map = HeaderMap::new();
        map.insert(INFO_HEADER.clone(), HeaderValue::from_static(""));
        assert_eq!(h.read(&map).outcome(), OutcomeSignal::None);
    }

    #[test]
    fn api_error_renders_as_error_signal() {
        let response = ApiError::conflict("item 'bolt' already exists").into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert!(matches!(
            response.extensions().get::<OutcomeSignal>(),
            Some(OutcomeSignal::Error(m)) if m.contains("bolt")
        ));
    }
}
