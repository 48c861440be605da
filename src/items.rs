//! Item endpoints served from the request's bound database.
//!
//! - `GET /items` lists every item in the namespace.
//! - `GET /items/{name}` fetches one item, 404 with an error signal when
//!   missing.
//! - `POST /items` validates and stores an item; rejects with 400 or 409
//!   through the signal convention, reports success with an info signal.
//!
//! Handlers are generic over the backend; anything whose database type
//! implements [`ItemStore`] can serve them. A failed write is logged with
//! the rejected item as payload before the 500 goes out.

use std::future::Future;
use std::sync::Arc;

use axum::extract::{FromRef, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::error::TetherError;
use crate::logging;
use crate::middleware::access_log::AccessLog;
use crate::middleware::resource_scope::Db;
use crate::middleware::signal::{ApiError, OutcomeSignal};
use crate::pool::memory::MemoryDatabase;
use crate::pool::{Backend, SharedHandle};

const COLLECTION: &str = "items";
const MAX_NAME_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    #[serde(default)]
    pub quantity: u32,
}

impl Item {
    /// Returns the first problem found, if any.
    pub fn validate(&self) -> Result<(), String> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err("validation failed: name cannot be empty".into());
        }
        if name.len() > MAX_NAME_LEN {
            return Err(format!(
                "validation failed: name is longer than {MAX_NAME_LEN} bytes"
            ));
        }
        if name != self.name {
            return Err("validation failed: name has surrounding whitespace".into());
        }
        Ok(())
    }
}

pub trait ItemStore: Send + Sync {
    fn list(&self) -> impl Future<Output = Result<Vec<Item>, TetherError>> + Send;

    fn find(&self, name: &str) -> impl Future<Output = Result<Option<Item>, TetherError>> + Send;

    fn insert(&self, item: Item) -> impl Future<Output = Result<(), TetherError>> + Send;
}

fn memory_error(e: serde_json::Error) -> TetherError {
    TetherError::Database {
        backend: "memory",
        source: Box::new(e),
    }
}

impl ItemStore for MemoryDatabase {
    async fn list(&self) -> Result<Vec<Item>, TetherError> {
        self.documents(COLLECTION)
            .await
            .into_iter()
            .map(|doc| serde_json::from_value(doc).map_err(memory_error))
            .collect()
    }

    async fn find(&self, name: &str) -> Result<Option<Item>, TetherError> {
        self.find_by(COLLECTION, "name", name)
            .await
            .map(|doc| serde_json::from_value(doc).map_err(memory_error))
            .transpose()
    }

    async fn insert(&self, item: Item) -> Result<(), TetherError> {
        let doc = serde_json::to_value(item).map_err(memory_error)?;
        MemoryDatabase::insert(self, COLLECTION, doc).await
    }
}

#[cfg(feature = "mongodb")]
mod mongo_store {
    use mongodb::bson::doc;
    use mongodb::Database;

    use super::{Item, ItemStore, COLLECTION};
    use crate::error::TetherError;

    fn db_error(e: mongodb::error::Error) -> TetherError {
        TetherError::Database {
            backend: "mongodb",
            source: Box::new(e),
        }
    }

    impl ItemStore for Database {
        async fn list(&self) -> Result<Vec<Item>, TetherError> {
            let mut cursor = self
                .collection::<Item>(COLLECTION)
                .find(doc! {})
                .await
                .map_err(db_error)?;
            let mut items = Vec::new();
            while cursor.advance().await.map_err(db_error)? {
                items.push(cursor.deserialize_current().map_err(db_error)?);
            }
            Ok(items)
        }

        async fn find(&self, name: &str) -> Result<Option<Item>, TetherError> {
            self.collection::<Item>(COLLECTION)
                .find_one(doc! { "name": name })
                .await
                .map_err(db_error)
        }

        async fn insert(&self, item: Item) -> Result<(), TetherError> {
            self.collection::<Item>(COLLECTION)
                .insert_one(item)
                .await
                .map_err(db_error)?;
            Ok(())
        }
    }
}

pub fn router<B, S>() -> Router<S>
where
    B: Backend,
    B::Database: ItemStore,
    S: Clone + Send + Sync + 'static,
    Arc<SharedHandle<B>>: FromRef<S>,
    Arc<AccessLog>: FromRef<S>,
{
    Router::new()
        .route("/items", get(list_items::<B>).post(create_item::<B>))
        .route("/items/{name}", get(get_item::<B>))
}

pub async fn list_items<B>(db: Db<B>) -> Result<Json<Vec<Item>>, ApiError>
where
    B: Backend,
    B::Database: ItemStore,
{
    Ok(Json(db.list().await?))
}

pub async fn get_item<B>(db: Db<B>, Path(name): Path<String>) -> Result<Json<Item>, ApiError>
where
    B: Backend,
    B::Database: ItemStore,
{
    db.find(&name)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("item '{name}' not found")))
}

pub async fn create_item<B>(
    State(log): State<Arc<AccessLog>>,
    db: Db<B>,
    Json(item): Json<Item>,
) -> Result<Response, ApiError>
where
    B: Backend,
    B::Database: ItemStore,
{
    store_item(&*db, log.app(), item).await
}

async fn store_item<D: ItemStore>(db: &D, app: &str, item: Item) -> Result<Response, ApiError> {
    item.validate().map_err(ApiError::bad_request)?;

    if db.find(&item.name).await?.is_some() {
        return Err(ApiError::conflict(format!(
            "item '{}' already exists",
            item.name
        )));
    }

    let note = format!("stored item '{}'", item.name);
    if let Err(e) = db.insert(item.clone()).await {
        let body = serde_json::to_string(&item).unwrap_or_default();
        logging::error(app, "could not store item", &body, &e);
        return Err(e.into());
    }

    Ok(OutcomeSignal::info(note).attach((StatusCode::OK, Json(item)).into_response()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_validation() {
        let ok = Item {
            name: "bolt".into(),
            quantity: 3,
        };
        assert!(ok.validate().is_ok());

        let empty = Item {
            name: "  ".into(),
            quantity: 0,
        };
        assert!(empty.validate().unwrap_err().starts_with("validation failed"));

        let padded = Item {
            name: " bolt".into(),
            quantity: 0,
        };
        assert!(padded.validate().is_err());
    }

    #[tokio::test]
    async fn failed_write_is_logged_with_the_item() {
        use crate::logging::capture;
        use crate::pool::memory::MemoryBackend;

        let backend = MemoryBackend::new();
        let conn = backend.checkout().unwrap();
        let db = backend.database(&conn, "inventory");
        backend.close().await;

        let item = Item {
            name: "bolt".into(),
            quantity: 2,
        };
        let (result, logs) = capture::json_logs_async(store_item(&db, "inventory", item)).await;

        let response = result.unwrap_err().into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let lines = logs.lines();
        let line = lines
            .iter()
            .find(|line| line["level"] == "ERROR")
            .expect("error line");
        assert_eq!(line["fields"]["app"], "inventory");
        assert_eq!(line["fields"]["appmsg"], "could not store item");
        assert_eq!(line["fields"]["msgbody"], r#"{"name":"bolt","quantity":2}"#);
        assert!(line["fields"]["message"]
            .as_str()
            .unwrap()
            .contains("store is closed"));
    }
}
