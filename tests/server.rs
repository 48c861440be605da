//! Integration tests for the HTTP server, health endpoint, and graceful shutdown.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tether::cmd::run::serve;
use tether::config::model::Config;
use tether::health::HealthResponse;
use tether::error::TetherError;
use tether::middleware::access_log::{AccessLog, AccessRecord, AccessSink, Outcome};
use tether::pool::memory::MemoryBackend;
use tether::pool::SharedHandle;
use tether::server::ServerLimits;

#[derive(Default)]
struct RecordingSink(Mutex<Vec<AccessRecord>>);

impl AccessSink for RecordingSink {
    fn emit(&self, record: &AccessRecord) -> Result<(), TetherError> {
        self.0.lock().unwrap().push(record.clone());
        Ok(())
    }
}

impl RecordingSink {
    fn records(&self) -> Vec<AccessRecord> {
        self.0.lock().unwrap().clone()
    }
}

struct TestServer {
    addr: SocketAddr,
    sink: Arc<RecordingSink>,
    backend: MemoryBackend,
    handle: Arc<SharedHandle<MemoryBackend>>,
    shutdown: tokio::sync::oneshot::Sender<()>,
    task: tokio::task::JoinHandle<()>,
}

async fn start_test_server() -> TestServer {
    let config = Config {
        app: "inventory".into(),
        ..Config::default()
    };
    let sink = Arc::new(RecordingSink::default());
    let access_log = Arc::new(
        AccessLog::from_config(&config)
            .unwrap()
            .with_sink(Arc::clone(&sink) as Arc<dyn AccessSink>),
    );

    let backend = MemoryBackend::new();
    let handle = Arc::new(SharedHandle::new(backend.clone(), "inventory"));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (shutdown, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let task = tokio::spawn({
        let handle = Arc::clone(&handle);
        async move {
            serve(
                listener,
                handle,
                access_log,
                ServerLimits::default(),
                async {
                    let _ = shutdown_rx.await;
                },
            )
            .await
            .unwrap();
        }
    });

    TestServer {
        addr,
        sink,
        backend,
        handle,
        shutdown,
        task,
    }
}

#[tokio::test]
async fn health_endpoint_returns_healthy() {
    let server = start_test_server().await;

    let url = format!("http://{}/health", server.addr);
    let resp = reqwest::get(&url).await.unwrap();
    assert_eq!(resp.status(), 200);

    let health: HealthResponse = resp.json().await.unwrap();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
    assert_eq!(health.app, "inventory");
    assert_eq!(health.database.backend, "memory");
    assert_eq!(health.database.namespace, "inventory");
    assert_eq!(health.database.acquired, 0);

    let _ = server.shutdown.send(());
}

#[tokio::test]
async fn items_round_trip_over_http() {
    let server = start_test_server().await;
    let client = reqwest::Client::new();
    let base = format!("http://{}", server.addr);

    let resp = client
        .post(format!("{base}/items"))
        .json(&serde_json::json!({ "name": "washer", "quantity": 40 }))
        .header("x-correlation-id", "it-1")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["info"], "stored item 'washer'");
    assert_eq!(resp.headers()["x-correlation-id"], "it-1");

    let items: Vec<serde_json::Value> = client
        .get(format!("{base}/items"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["name"], "washer");

    let resp = client
        .get(format!("{base}/items/nut"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    assert_eq!(resp.headers()["inventory-error"], "item 'nut' not found");

    let health: HealthResponse = client
        .get(format!("{base}/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health.database.acquired, 3);
    assert_eq!(health.database.released, 3);
    assert_eq!(health.database.active, 0);

    let _ = server.shutdown.send(());
}

#[tokio::test]
async fn access_records_carry_peer_address_and_query() {
    let server = start_test_server().await;

    let url = format!("http://{}/items?x=1", server.addr);
    let resp = reqwest::get(&url).await.unwrap();
    assert_eq!(resp.status(), 200);

    let records = server.sink.records();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.app, "inventory");
    assert_eq!(record.request, "/items?x=1");
    assert_eq!(record.method, "GET");
    assert_eq!(record.status.as_u16(), 200);
    assert_eq!(record.outcome, Outcome::Success);

    let remote: SocketAddr = record.remote.parse().unwrap();
    assert!(remote.ip().is_loopback());
    assert_ne!(remote.port(), server.addr.port());

    let _ = server.shutdown.send(());
}

#[tokio::test]
async fn unmatched_route_returns_404() {
    let server = start_test_server().await;

    let url = format!("http://{}/nonexistent", server.addr);
    let resp = reqwest::get(&url).await.unwrap();
    assert_eq!(resp.status(), 404);
    assert_eq!(server.handle.stats().acquired, 0);

    let _ = server.shutdown.send(());
}

#[tokio::test]
async fn graceful_shutdown_closes_the_pool() {
    let server = start_test_server().await;

    let url = format!("http://{}/items", server.addr);
    assert!(reqwest::get(&url).await.is_ok());

    let _ = server.shutdown.send(());
    tokio::time::timeout(Duration::from_secs(5), server.task)
        .await
        .unwrap()
        .unwrap();

    assert!(server.handle.is_closed());
    assert!(server.backend.is_closed());
    assert_eq!(server.backend.live_connections(), 0);

    // Server should no longer accept connections
    let result = reqwest::get(&url).await;
    assert!(result.is_err());
}
