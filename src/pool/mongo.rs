//! MongoDB-backed [`Backend`].
//!
//! The driver's [`Client`] is itself a handle onto a shared connection
//! pool, so a per-request clone is a refcount bump and the namespaced
//! sub-resource is [`Client::database`]. The initial connection is
//! verified with a `ping` so a bad URL or bad credentials fail at startup
//! instead of on the first request.

use std::time::Duration;

use mongodb::bson::doc;
use mongodb::options::{ClientOptions, Credential};
use mongodb::{Client, Database};

use super::Backend;
use crate::config::model::DatabaseConfig;
use crate::error::TetherError;

fn db_error(e: mongodb::error::Error) -> TetherError {
    TetherError::Database {
        backend: "mongodb",
        source: Box::new(e),
    }
}

pub struct MongoBackend {
    client: Client,
}

impl MongoBackend {
    pub async fn connect(config: &DatabaseConfig, app: &str) -> Result<Self, TetherError> {
        let url = config.url.as_deref().ok_or_else(|| TetherError::Database {
            backend: "mongodb",
            source: "no connection URL configured".into(),
        })?;

        let mut options = ClientOptions::parse(url).await.map_err(db_error)?;

        let timeout = Duration::from_millis(config.connect_timeout);
        options.connect_timeout = Some(timeout);
        options.server_selection_timeout = Some(timeout);
        options.app_name = Some(app.to_owned());

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            let mut credential = Credential::default();
            credential.username = Some(username.clone());
            credential.password = Some(password.clone());
            credential.source = Some(config.namespace.clone());
            options.credential = Some(credential);
        }

        let hosts = options
            .hosts
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");

        let client = Client::with_options(options).map_err(db_error)?;

        client
            .database(&config.namespace)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(db_error)?;

        tracing::info!(hosts = %hosts, namespace = %config.namespace, "connected to mongodb");

        Ok(Self { client })
    }
}

impl Backend for MongoBackend {
    type Conn = Client;
    type Database = Database;

    fn kind(&self) -> &'static str {
        "mongodb"
    }

    fn checkout(&self) -> Result<Client, TetherError> {
        Ok(self.client.clone())
    }

    fn database(&self, conn: &Client, namespace: &str) -> Database {
        conn.database(namespace)
    }

    async fn close(&self) {
        self.client.clone().shutdown().await;
    }
}
