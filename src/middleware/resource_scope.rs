//! Binds a per-request database clone for the duration of one request.
//!
//! [`resource_scope`] acquires a [`Lease`](crate::pool::Lease) from the
//! shared handle, stores its binding in the request's
//! [`ScopeStore`], and runs the rest of the stack. The lease is a local of
//! the middleware future, so it is released when the handler returns, when
//! it panics (unwinding drops it), and when the whole request future is
//! dropped by a timeout or a disconnecting client.
//!
//! Handlers read the binding back with the [`Db`] extractor or
//! [`SharedHandle::get`].

use std::sync::Arc;

use axum::extract::{FromRef, FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use super::signal::write_error_signal;
use crate::context::ScopeStore;
use crate::error::TetherError;
use crate::pool::{Backend, Binding, SharedHandle};

pub async fn resource_scope<B: Backend>(
    State(handle): State<Arc<SharedHandle<B>>>,
    mut request: Request,
    next: Next,
) -> Response {
    let lease = match handle.acquire() {
        Ok(lease) => lease,
        Err(e) => {
            tracing::error!(
                namespace = %handle.namespace(),
                error = %e,
                "failed to clone database connection"
            );
            return write_error_signal(&e, StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    ScopeStore::bind_into(request.extensions_mut(), lease.binding());

    let response = next.run(request).await;
    drop(lease);
    response
}

/// The database bound to the current request.
///
/// Rejects with a 500 (and an error signal) when the route is not wrapped
/// in [`resource_scope`] for this handle's namespace.
pub struct Db<B: Backend>(pub Arc<Binding<B::Database>>);

impl<B: Backend> std::ops::Deref for Db<B> {
    type Target = B::Database;

    fn deref(&self) -> &B::Database {
        self.0.database()
    }
}

impl<S, B> FromRequestParts<S> for Db<B>
where
    B: Backend,
    S: Send + Sync,
    Arc<SharedHandle<B>>: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let handle = Arc::<SharedHandle<B>>::from_ref(state);
        handle.get(&parts.extensions).map(Self).ok_or_else(|| {
            let e = TetherError::MissingBinding {
                namespace: handle.namespace().to_owned(),
            };
            tracing::error!(error = %e, "handler ran outside a resource scope");
            write_error_signal(&e, StatusCode::INTERNAL_SERVER_ERROR).into_response()
        })
    }
}
