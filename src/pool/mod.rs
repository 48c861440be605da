//! Shared connection handle and per-request leases.
//!
//! A [`SharedHandle`] owns the one long-lived [`Backend`] connection for the
//! process together with the namespace (database name) requests are scoped
//! to. Requests never touch the backend directly: they [`acquire`] a
//! [`Lease`], which clones the connection, derives the namespaced database
//! and hands it out as a [`Binding`]. Dropping the lease releases the clone,
//! so release happens exactly once on every exit path, including panics and
//! dropped (cancelled) futures.
//!
//! [`acquire`]: SharedHandle::acquire

pub mod memory;
#[cfg(feature = "mongodb")]
pub mod mongo;

use std::future::Future;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use http::Extensions;
use serde::Serialize;

use crate::context::ScopeStore;
use crate::error::TetherError;

/// A connection pool that can be cloned cheaply per request.
///
/// `checkout` must not block: it is called on the request path of every
/// request and may run concurrently from many tasks.
pub trait Backend: Send + Sync + 'static {
    /// Independent clone of the pooled connection, owned by one request.
    type Conn: Send + 'static;
    /// Namespaced sub-resource handed to handlers.
    type Database: Clone + Send + Sync + 'static;

    fn kind(&self) -> &'static str;

    fn checkout(&self) -> Result<Self::Conn, TetherError>;

    fn database(&self, conn: &Self::Conn, namespace: &str) -> Self::Database;

    fn release(&self, conn: Self::Conn) {
        drop(conn);
    }

    fn close(&self) -> impl Future<Output = ()> + Send;
}

/// The database bound to one request.
#[derive(Debug)]
pub struct Binding<D> {
    id: u64,
    namespace: String,
    database: D,
}

impl<D> Binding<D> {
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    #[must_use]
    pub const fn database(&self) -> &D {
        &self.database
    }
}

impl<D> Deref for Binding<D> {
    type Target = D;

    fn deref(&self) -> &D {
        &self.database
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub acquired: u64,
    pub released: u64,
    pub active: u64,
}

pub struct SharedHandle<B: Backend> {
    backend: B,
    namespace: String,
    next_id: AtomicU64,
    acquired: AtomicU64,
    released: AtomicU64,
    closed: AtomicBool,
}

impl<B: Backend> SharedHandle<B> {
    pub fn new(backend: B, namespace: impl Into<String>) -> Self {
        Self {
            backend,
            namespace: namespace.into(),
            next_id: AtomicU64::new(1),
            acquired: AtomicU64::new(0),
            released: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        self.backend.kind()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Clone the shared connection for one request.
    ///
    /// Fails once the handle has been closed or when the backend refuses
    /// the checkout.
    pub fn acquire(self: &Arc<Self>) -> Result<Lease<B>, TetherError> {
        if self.is_closed() {
            return Err(TetherError::PoolClosed {
                namespace: self.namespace.clone(),
            });
        }

        let conn = self.backend.checkout()?;
        let database = self.backend.database(&conn, &self.namespace);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.acquired.fetch_add(1, Ordering::Relaxed);

        tracing::trace!(binding = id, namespace = %self.namespace, "connection cloned");

        Ok(Lease {
            handle: Arc::clone(self),
            conn: Some(conn),
            binding: Arc::new(Binding {
                id,
                namespace: self.namespace.clone(),
                database,
            }),
        })
    }

    /// Look up the binding the resource scope stored for this handle's
    /// namespace. `None` outside an active scope.
    #[must_use]
    pub fn get(&self, extensions: &Extensions) -> Option<Arc<Binding<B::Database>>> {
        extensions
            .get::<ScopeStore>()
            .and_then(|store| store.lookup::<B::Database>(&self.namespace))
    }

    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let acquired = self.acquired.load(Ordering::Relaxed);
        let released = self.released.load(Ordering::Relaxed);
        PoolStats {
            acquired,
            released,
            active: acquired.saturating_sub(released),
        }
    }

    /// Close the underlying connection. Idempotent; later acquisitions fail.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let stats = self.stats();
        if stats.active > 0 {
            tracing::warn!(
                namespace = %self.namespace,
                active = stats.active,
                "closing connection pool with leases still outstanding"
            );
        }

        self.backend.close().await;
        tracing::info!(
            backend = self.backend.kind(),
            namespace = %self.namespace,
            acquired = stats.acquired,
            "connection pool closed"
        );
    }
}

/// A request's clone of the shared connection. Released on drop.
pub struct Lease<B: Backend> {
    handle: Arc<SharedHandle<B>>,
    conn: Option<B::Conn>,
    binding: Arc<Binding<B::Database>>,
}

impl<B: Backend> Lease<B> {
    #[must_use]
    pub fn binding(&self) -> Arc<Binding<B::Database>> {
        Arc::clone(&self.binding)
    }
}

impl<B: Backend> Drop for Lease<B> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.handle.backend.release(conn);
            self.handle.released.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(
                binding = self.binding.id,
                namespace = %self.binding.namespace,
                "connection released"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryBackend;
    use super::*;

    fn handle() -> (MemoryBackend, Arc<SharedHandle<MemoryBackend>>) {
        let backend = MemoryBackend::new();
        let handle = Arc::new(SharedHandle::new(backend.clone(), "inventory"));
        (backend, handle)
    }

    #[test]
    fn lease_releases_once_on_drop() {
        let (backend, handle) = handle();

        let lease = handle.acquire().unwrap();
        assert_eq!(handle.stats().active, 1);
        assert_eq!(backend.live_connections(), 1);

        drop(lease);
        assert_eq!(
            handle.stats(),
            PoolStats {
                acquired: 1,
                released: 1,
                active: 0
            }
        );
        assert_eq!(backend.live_connections(), 0);
    }

    #[test]
    fn leases_get_distinct_bindings() {
        let (_, handle) = handle();

        let a = handle.acquire().unwrap();
        let b = handle.acquire().unwrap();

        assert_ne!(a.binding().id(), b.binding().id());
        assert_ne!(
            a.binding().connection_id(),
            b.binding().connection_id()
        );
        assert_eq!(a.binding().namespace(), "inventory");
    }

    #[test]
    fn lease_released_when_unwinding() {
        let (backend, handle) = handle();

        let task_handle = Arc::clone(&handle);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _lease = task_handle.acquire().unwrap();
            panic!("handler blew up");
        }));

        assert!(result.is_err());
        assert_eq!(handle.stats().released, 1);
        assert_eq!(backend.live_connections(), 0);
    }

    #[tokio::test]
    async fn closed_handle_refuses_leases() {
        let (_, handle) = handle();
        handle.close().await;
        handle.close().await;

        assert!(handle.is_closed());
        assert!(matches!(
            handle.acquire(),
            Err(TetherError::PoolClosed { .. })
        ));
    }

    #[test]
    fn get_outside_scope_is_absent() {
        let (_, handle) = handle();
        assert!(handle.get(&Extensions::new()).is_none());
    }
}
