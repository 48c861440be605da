//! In-process [`Backend`] holding JSON documents per namespace.
//!
//! Used for local development and tests. Every checkout yields a
//! [`MemoryConn`] with its own connection id; all connections share the
//! same document store, the way clones of a network client share its pool.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;

use super::Backend;
use crate::error::TetherError;

type Collections = HashMap<String, Vec<Value>>;

#[derive(Default)]
struct Inner {
    namespaces: RwLock<HashMap<String, Collections>>,
    next_conn: AtomicU64,
    live: AtomicU64,
    closed: AtomicBool,
}

#[derive(Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<Inner>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Connections checked out and not yet released.
    #[must_use]
    pub fn live_connections(&self) -> u64 {
        self.inner.live.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

pub struct MemoryConn {
    id: u64,
    inner: Arc<Inner>,
}

#[derive(Clone)]
pub struct MemoryDatabase {
    namespace: String,
    connection_id: u64,
    inner: Arc<Inner>,
}

impl Backend for MemoryBackend {
    type Conn = MemoryConn;
    type Database = MemoryDatabase;

    fn kind(&self) -> &'static str {
        "memory"
    }

    fn checkout(&self) -> Result<MemoryConn, TetherError> {
        if self.is_closed() {
            return Err(TetherError::Database {
                backend: "memory",
                source: "store is closed".into(),
            });
        }
        let id = self.inner.next_conn.fetch_add(1, Ordering::Relaxed) + 1;
        self.inner.live.fetch_add(1, Ordering::Relaxed);
        Ok(MemoryConn {
            id,
            inner: Arc::clone(&self.inner),
        })
    }

    fn database(&self, conn: &MemoryConn, namespace: &str) -> MemoryDatabase {
        MemoryDatabase {
            namespace: namespace.to_owned(),
            connection_id: conn.id,
            inner: Arc::clone(&conn.inner),
        }
    }

    fn release(&self, conn: MemoryConn) {
        conn.inner.live.fetch_sub(1, Ordering::Relaxed);
    }

    async fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
    }
}

impl MemoryDatabase {
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Id of the connection clone this database was derived from.
    #[must_use]
    pub const fn connection_id(&self) -> u64 {
        self.connection_id
    }

    pub async fn documents(&self, collection: &str) -> Vec<Value> {
        let namespaces = self.inner.namespaces.read().await;
        namespaces
            .get(&self.namespace)
            .and_then(|collections| collections.get(collection))
            .cloned()
            .unwrap_or_default()
    }

    /// First document whose string `field` equals `value`.
    pub async fn find_by(&self, collection: &str, field: &str, value: &str) -> Option<Value> {
        let namespaces = self.inner.namespaces.read().await;
        namespaces
            .get(&self.namespace)?
            .get(collection)?
            .iter()
            .find(|doc| doc.get(field).and_then(Value::as_str) == Some(value))
            .cloned()
    }

    /// Append a document. Fails once the backend has been closed.
    pub async fn insert(&self, collection: &str, document: Value) -> Result<(), TetherError> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(TetherError::Database {
                backend: "memory",
                source: "store is closed".into(),
            });
        }
        let mut namespaces = self.inner.namespaces.write().await;
        namespaces
            .entry(self.namespace.clone())
            .or_default()
            .entry(collection.to_owned())
            .or_default()
            .push(document);
        Ok(())
    }
}
