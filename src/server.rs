//! Axum server setup, shared application state, and graceful shutdown.
//!
//! Contains [`AppState`] (the clonable state holding the shared connection
//! handle, the access log and uptime), [`build_router`] for assembling the
//! middleware stack around the application routes, and
//! [`shutdown_signal`] for SIGTERM / Ctrl+C handling.
//!
//! Stack order, outermost first: access log, panic catcher, body limit,
//! request timeout, then the resource scope around application routes.
//! `/health` sits outside the resource scope.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::FromRef;
use axum::http::StatusCode;
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

use crate::health::health_handler;
use crate::middleware::access_log::{access_log, AccessLog};
use crate::middleware::resource_scope::resource_scope;
use crate::middleware::PanicHandler;
use crate::pool::{Backend, SharedHandle};

pub struct AppState<B: Backend> {
    pub handle: Arc<SharedHandle<B>>,
    pub access_log: Arc<AccessLog>,
    pub start_time: Instant,
}

impl<B: Backend> AppState<B> {
    #[must_use]
    pub fn new(handle: Arc<SharedHandle<B>>, access_log: Arc<AccessLog>) -> Self {
        Self {
            handle,
            access_log,
            start_time: Instant::now(),
        }
    }
}

// Manual impl: `B` itself does not need to be `Clone`.
impl<B: Backend> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            handle: Arc::clone(&self.handle),
            access_log: Arc::clone(&self.access_log),
            start_time: self.start_time,
        }
    }
}

impl<B: Backend> FromRef<AppState<B>> for Arc<SharedHandle<B>> {
    fn from_ref(state: &AppState<B>) -> Self {
        Arc::clone(&state.handle)
    }
}

impl<B: Backend> FromRef<AppState<B>> for Arc<AccessLog> {
    fn from_ref(state: &AppState<B>) -> Self {
        Arc::clone(&state.access_log)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ServerLimits {
    pub timeout: Duration,
    pub max_body: usize,
}

impl Default for ServerLimits {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(5000),
            max_body: 1_048_576,
        }
    }
}

/// Wrap `routes` in the resource scope and the rest of the middleware stack.
pub fn build_router<B: Backend>(
    state: AppState<B>,
    routes: Router<AppState<B>>,
    limits: ServerLimits,
) -> Router {
    let scoped = routes.route_layer(from_fn_with_state(
        Arc::clone(&state.handle),
        resource_scope::<B>,
    ));

    Router::new()
        .route("/health", get(health_handler::<B>))
        .merge(scoped)
        .layer(
            ServiceBuilder::new()
                .layer(from_fn_with_state(
                    Arc::clone(&state.access_log),
                    access_log,
                ))
                .layer(CatchPanicLayer::custom(PanicHandler))
                .layer(RequestBodyLimitLayer::new(limits.max_body))
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    limits.timeout,
                )),
        )
        .with_state(state)
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
}
