//! `tether run`: start the HTTP server.
//!
//! Loads the config (file or defaults), applies CLI overrides, validates,
//! opens the shared connection for the configured backend, then serves
//! until SIGTERM / Ctrl+C. In-flight requests drain before the shared
//! connection is closed.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use crate::cli::RunArgs;
use crate::config;
use crate::config::model::{BackendKind, Config};
use crate::error::TetherError;
use crate::items::{self, ItemStore};
use crate::logging;
use crate::middleware::access_log::AccessLog;
use crate::pool::memory::MemoryBackend;
use crate::pool::{Backend, SharedHandle};
use crate::server::{self, AppState, ServerLimits};

pub async fn execute(args: RunArgs) -> Result<(), TetherError> {
    let log_format = logging::resolve_format(args.pretty, args.json);
    logging::init(&args.log_level, log_format);

    let (mut config, path) = config::load(args.config.as_deref()).await?;
    if let Some(path) = &path {
        tracing::info!(path = %path.display(), "loaded config file");
    }
    apply_overrides(&mut config, &args);
    let config = config::validated(config)?;

    let access_log = Arc::new(AccessLog::from_config(&config)?);
    let limits = ServerLimits {
        timeout: Duration::from_millis(args.timeout),
        max_body: args.max_body,
    };

    let namespace = config.database.namespace.clone();
    match config.database.backend {
        BackendKind::Memory => {
            let handle = Arc::new(SharedHandle::new(MemoryBackend::new(), namespace));
            let listener = bind(&args, &config).await?;
            serve(listener, handle, access_log, limits, server::shutdown_signal()).await?;
        }
        BackendKind::Mongodb => {
            #[cfg(feature = "mongodb")]
            {
                let backend =
                    match crate::pool::mongo::MongoBackend::connect(&config.database, &config.app)
                        .await
                    {
                        Ok(backend) => backend,
                        Err(e) => {
                            logging::fatal(&config.app, "could not connect to mongodb", &e);
                            return Err(e);
                        }
                    };
                let handle = Arc::new(SharedHandle::new(backend, namespace));
                let listener = bind(&args, &config).await?;
                serve(listener, handle, access_log, limits, server::shutdown_signal()).await?;
            }

            #[cfg(not(feature = "mongodb"))]
            {
                let e = TetherError::BackendUnavailable("mongodb");
                logging::fatal(&config.app, "mongodb backend requested", &e);
                return Err(e);
            }
        }
    }

    tracing::info!("tether stopped");
    Ok(())
}

/// Bind the listener once the backend is up.
async fn bind(args: &RunArgs, config: &Config) -> Result<TcpListener, TetherError> {
    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(
        addr = %addr,
        app = %config.app,
        backend = config.database.backend.as_str(),
        namespace = %config.database.namespace,
        "tether started"
    );

    Ok(listener)
}

/// Serve the item routes over `listener` until `shutdown` resolves, then
/// close the shared connection.
pub async fn serve<B>(
    listener: TcpListener,
    handle: Arc<SharedHandle<B>>,
    access_log: Arc<AccessLog>,
    limits: ServerLimits,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), TetherError>
where
    B: Backend,
    B::Database: ItemStore,
{
    let state = AppState::new(Arc::clone(&handle), access_log);
    let router = server::build_router(state, items::router::<B, AppState<B>>(), limits);

    let served = axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await;

    handle.close().await;
    served?;
    Ok(())
}

/// CLI flags win over file values. A MongoDB URL on the command line
/// implies the mongodb backend.
fn apply_overrides(config: &mut Config, args: &RunArgs) {
    if let Some(ref app) = args.app {
        config.app.clone_from(app);
    }
    if let Some(ref namespace) = args.namespace {
        config.database.namespace.clone_from(namespace);
    }
    if let Some(ref url) = args.mongodb_url {
        config.database.backend = BackendKind::Mongodb;
        config.database.url = Some(url.clone());
    }
    if args.mongodb_username.is_some() {
        config.database.username.clone_from(&args.mongodb_username);
    }
    if args.mongodb_password.is_some() {
        config.database.password.clone_from(&args.mongodb_password);
    }
}
