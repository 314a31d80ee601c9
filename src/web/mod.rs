//! Exposition server and process wiring.
//!
//! The server only ever reads the registry. Collection happens on the
//! scheduler task, which runs independently of scrape traffic and is
//! stopped through the same shutdown signal as the server.

pub mod handlers;
pub mod router;

pub use router::create_app;

use crate::config::ExporterConfig;
use crate::error::{ExporterError, Result};
use crate::metrics::{catalog, Registry};
use crate::sampler::HostSource;
use crate::scheduler::Scheduler;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

/// Shared state of the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub started: Instant,
}

impl AppState {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            started: Instant::now(),
        }
    }
}

/// Serve the exposition endpoint on an already bound listener until
/// `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    registry: Arc<Registry>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let app = create_app(AppState::new(registry));

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ExporterError::web_server_error(format!("Server error: {}", e)))
}

/// Run the whole exporter: define metrics, start the collection scheduler and
/// serve scrapes until `shutdown` resolves, then let the in-flight cycle
/// finish before returning.
pub async fn start_exporter<S: HostSource>(
    config: ExporterConfig,
    source: S,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    config.validate()?;

    let registry = Arc::new(Registry::new());
    catalog::register_all(&registry, &config.services)?;

    let addr = config
        .bind_address()
        .parse::<SocketAddr>()
        .map_err(|e| ExporterError::config_error(format!("Invalid bind address: {}", e)))?;
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| ExporterError::web_server_error(format!("Failed to bind to address: {}", e)))?;

    info!("Metrics available at http://{}/metrics", listener.local_addr()?);

    let (stop_tx, stop_rx) = watch::channel(false);
    let scheduler = Scheduler::from_config(source, Arc::clone(&registry), &config);
    let scheduler_task = tokio::spawn(scheduler.run(stop_rx));

    let server_stop = stop_tx.clone();
    let result = serve(listener, registry, async move {
        shutdown.await;
        info!("shutdown requested");
        let _ = server_stop.send(true);
    })
    .await;

    // The server may also have stopped on an error.
    let _ = stop_tx.send(true);
    match scheduler_task.await {
        Ok(cycles) => info!(cycles, "exporter stopped"),
        Err(e) => warn!(error = %e, "collection scheduler task ended abnormally"),
    }

    result
}
