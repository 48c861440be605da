//! `tether health`: check the health of a running instance.
//!
//! Sends a `GET /health` request to the specified URL and displays
//! the response as formatted text or raw JSON. A `closing` instance is
//! reported as unhealthy.

use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use crate::cli::HealthArgs;
use crate::error::TetherError;
use crate::health::HealthResponse;

const HEALTH_TIMEOUT: Duration = Duration::from_secs(10);

fn request_error(e: impl std::error::Error + Send + Sync + 'static) -> TetherError {
    TetherError::HttpRequest {
        source: Box::new(e),
    }
}

/// GET `<base>/health` and return the body of a 2xx response.
async fn fetch(base: &str) -> Result<Bytes, TetherError> {
    let uri: hyper::Uri = format!("{}/health", base.trim_end_matches('/'))
        .parse()
        .map_err(|e: hyper::http::uri::InvalidUri| TetherError::UriParse {
            source: Box::new(e),
        })?;

    let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
    let req = hyper::Request::get(uri)
        .body(Full::new(Bytes::new()))
        .map_err(request_error)?;

    let response = tokio::time::timeout(HEALTH_TIMEOUT, client.request(req))
        .await
        .map_err(|_| TetherError::HttpRequest {
            source: format!("health check timed out after {}s", HEALTH_TIMEOUT.as_secs()).into(),
        })?
        .map_err(request_error)?;

    let status = response.status();
    if !status.is_success() {
        return Err(TetherError::HealthCheckFailed(status));
    }

    Ok(response
        .into_body()
        .collect()
        .await
        .map_err(request_error)?
        .to_bytes())
}

pub async fn execute(args: HealthArgs) -> Result<(), TetherError> {
    let body = fetch(&args.url).await?;

    if args.json {
        println!("{}", String::from_utf8_lossy(&body));
        return Ok(());
    }

    let health = match serde_json::from_slice::<HealthResponse>(&body) {
        Ok(health) => health,
        Err(e) => {
            eprintln!("Failed to parse health response: {e}");
            println!("{}", String::from_utf8_lossy(&body));
            return Ok(());
        }
    };

    print!("{}", render(&health, &args.url));

    if health.status == "healthy" {
        Ok(())
    } else {
        Err(TetherError::HealthCheckFailed(
            hyper::StatusCode::SERVICE_UNAVAILABLE,
        ))
    }
}

fn render(health: &HealthResponse, url: &str) -> String {
    let mark = if health.status == "healthy" {
        '\u{2713}'
    } else {
        '\u{2717}'
    };
    let db = &health.database;
    format!(
        "{mark} tether is {} ({url})\n  \
         version:   {}\n  \
         uptime:    {}\n  \
         app:       {}\n  \
         database:  {} (namespace '{}')\n  \
         leases:    {} acquired, {} released, {} active\n",
        health.status,
        health.version,
        format_uptime(health.uptime_seconds),
        health.app,
        db.backend,
        db.namespace,
        db.acquired,
        db.released,
        db.active,
    )
}

fn format_uptime(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{hours}h {minutes}m {secs}s")
    } else if minutes > 0 {
        format!("{minutes}m {secs}s")
    } else {
        format!("{secs}s")
    }
}
