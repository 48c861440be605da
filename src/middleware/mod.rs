//! Tower middleware layers.
//!
//! - [`access_log`] -- times each request and logs its classified outcome.
//! - [`resource_scope`] -- binds a per-request database clone.
//! - [`signal`] -- the header convention handlers use to report outcomes.
//!
//! [`PanicHandler`] turns a handler panic into a 500 carrying an error
//! signal, so a panicking request is still logged with a reason.

pub mod access_log;
pub mod resource_scope;
pub mod signal;

use std::any::Any;

use axum::body::Body;
use axum::http::{Response, StatusCode};
use tower_http::catch_panic::ResponseForPanic;

use signal::write_error_signal;

#[derive(Debug, Clone, Copy, Default)]
pub struct PanicHandler;

impl ResponseForPanic for PanicHandler {
    type ResponseBody = Body;

    fn response_for_panic(&mut self, error: Box<dyn Any + Send + 'static>) -> Response<Body> {
        let message = error
            .downcast_ref::<&str>()
            .map(|s| (*s).to_owned())
            .or_else(|| error.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".to_owned());

        tracing::error!(panic = %message, "request handler panicked");
        write_error_signal(&format!("handler panicked: {message}"), StatusCode::INTERNAL_SERVER_ERROR)
    }
}
