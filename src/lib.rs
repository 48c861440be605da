//! Tether scopes a shared database connection to individual HTTP requests
//! and writes one outcome-classified access log record per request.
//!
//! Every request that reaches an application route leases a clone of the
//! process-wide connection, gets the namespaced database bound to its
//! context, and releases the clone exactly once when the response is done,
//! whether the handler returned, failed, panicked or was cancelled. Handlers
//! report failures and notes through typed outcome signals; the access log
//! classifies each request as error, info or plain success from the final
//! status code and those signals.
//!
//! # Architecture
//!
//! - [`cli`] -- Command-line argument parsing with clap derive macros.
//! - [`cmd`] -- Subcommand dispatch and execution (run, init, validate, health).
//! - [`config`] -- Configuration loading and validation.
//! - [`context`] -- Per-request store of bound databases, keyed by namespace.
//! - [`error`] -- Unified error types using `thiserror`.
//! - [`health`] -- `GET /health` endpoint handler returning runtime diagnostics.
//! - [`items`] -- Example item endpoints served from the bound database.
//! - [`logging`] -- Structured tracing setup with JSON and pretty-print output.
//! - [`middleware`] -- Resource scope, outcome signals and the access log.
//! - [`pool`] -- Shared connection handle, leases and backends.
//! - [`server`] -- Axum router assembly, shared state and graceful shutdown.
//!
//! # Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `yaml` | YAML config file support _(enabled by default)_ |
//! | `json` | JSON config file support |
//! | `toml` | TOML config file support |
//! | `mongodb` | MongoDB backend |
//! | `file-backends` | All config file formats |
//! | `full` | All features |

// Binary crate: public functions are internal, not consumed by external users.
#![allow(clippy::missing_errors_doc)]

pub mod cli;
pub mod cmd;
pub mod config;
pub mod context;
pub mod error;
pub mod health;
pub mod items;
pub mod logging;
pub mod middleware;
pub mod pool;
pub mod server;
