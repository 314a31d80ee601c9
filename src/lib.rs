//! # host_exporter - Host Metrics Exporter
//!
//! Periodically samples host state (CPU, memory, disks, network, processes),
//! probes a handful of local TCP services, counts threshold breaches and
//! serves everything in the Prometheus text exposition format.
//!
//! ## Features
//!
//! - **Typed metric registry**: gauges, counters and info metrics with fixed label sets
//! - **Isolated sub-collectors**: one failing or hanging read never blocks the others
//! - **Monotonic mirroring**: raw OS counters are exposed as proper counters, even across resets
//! - **Scrape-safe**: `/metrics` only reads the latest published values
//! - **Library + Binary**: embed the engine or run the `host_exporter` binary
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use host_exporter::{start_exporter, ExporterConfig, SysinfoHost};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExporterConfig::default();
//!     start_exporter(config, SysinfoHost::new(), async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await?;
//!     Ok(())
//! }
//! ```

pub mod alerting;
pub mod config;
pub mod error;
pub mod metrics;
pub mod probe;
pub mod sampler;
pub mod scheduler;
pub mod web;

// Re-export public API
pub use alerting::{AlertSummary, ThresholdAlerting};
pub use config::{ExporterConfig, ServiceTarget, Thresholds};
pub use error::{ExporterError, Result};
pub use metrics::{MetricDesc, MetricKind, Registry, RegistrySnapshot, SeriesValue};
pub use probe::ServiceProbe;
pub use sampler::{HostSource, Sampler, SysinfoHost};
pub use scheduler::{CycleReport, CycleState, Scheduler};
pub use web::{create_app, start_exporter, AppState};

/// The default exposition port
pub const DEFAULT_PORT: u16 = 9100;

/// The default collection interval in seconds
pub const DEFAULT_INTERVAL_SECS: u64 = 30;
