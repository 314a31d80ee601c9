//! Exporter configuration.

use crate::error::{ExporterError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// A local TCP service whose reachability is probed every cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceTarget {
    /// Service name, used as the `service` label
    pub name: String,
    /// TCP port on localhost
    pub port: u16,
}

impl ServiceTarget {
    pub fn new(name: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            port,
        }
    }

    /// The services probed when none are configured.
    pub fn defaults() -> Vec<ServiceTarget> {
        vec![
            ServiceTarget::new("ssh", 22),
            ServiceTarget::new("http", 80),
            ServiceTarget::new("https", 443),
            ServiceTarget::new("prometheus", 9090),
            ServiceTarget::new("grafana", 3000),
        ]
    }
}

/// Parses `name=port`, as accepted by `--service`.
impl FromStr for ServiceTarget {
    type Err = ExporterError;

    fn from_str(s: &str) -> Result<Self> {
        let (name, port) = s
            .split_once('=')
            .ok_or_else(|| ExporterError::config_error(format!("expected name=port, got '{}'", s)))?;

        let name = name.trim();
        if name.is_empty() {
            return Err(ExporterError::config_error(format!("empty service name in '{}'", s)));
        }

        let port = port
            .trim()
            .parse::<u16>()
            .map_err(|e| ExporterError::config_error(format!("invalid port in '{}': {}", s, e)))?;

        Ok(ServiceTarget::new(name, port))
    }
}

/// Static alerting thresholds, in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// CPU utilization alert boundary
    pub cpu_percent: f64,
    /// Memory utilization alert boundary
    pub memory_percent: f64,
    /// Per-mount disk utilization alert boundary
    pub disk_percent: f64,
    /// Per-mount disk utilization notice boundary (logged only)
    pub disk_notice_percent: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            cpu_percent: 80.0,
            memory_percent: 85.0,
            disk_percent: 90.0,
            disk_notice_percent: 85.0,
        }
    }
}

/// Configuration for the exporter process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExporterConfig {
    /// Host to bind the exposition server to
    pub host: String,
    /// Port to bind the exposition server to
    pub port: u16,
    /// Seconds between the starts of two collection cycles
    pub interval_secs: u64,
    /// Seconds to wait for a service probe connect
    pub probe_timeout_secs: u64,
    /// Seconds a single sub-collector may run before it is treated as failed
    pub collector_timeout_secs: u64,
    /// Services probed on localhost
    pub services: Vec<ServiceTarget>,
    /// Alerting thresholds
    pub thresholds: Thresholds,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: crate::DEFAULT_PORT,
            interval_secs: crate::DEFAULT_INTERVAL_SECS,
            probe_timeout_secs: 1,
            collector_timeout_secs: 10,
            services: ServiceTarget::defaults(),
            thresholds: Thresholds::default(),
        }
    }
}

impl ExporterConfig {
    /// Create a new configuration with custom host and port.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Load a configuration from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            ExporterError::config_error(format!("invalid config file {}: {}", path.display(), e))
        })
    }

    /// Set the host for the exposition server.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the port for the exposition server.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the collection interval in whole seconds.
    pub fn with_interval_secs(mut self, interval_secs: u64) -> Self {
        self.interval_secs = interval_secs;
        self
    }

    /// Replace the probed services.
    pub fn with_services(mut self, services: Vec<ServiceTarget>) -> Self {
        self.services = services;
        self
    }

    /// Replace the alerting thresholds.
    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn collector_timeout(&self) -> Duration {
        Duration::from_secs(self.collector_timeout_secs)
    }

    /// Get the full bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Reject configurations the scheduler or probe cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.interval_secs == 0 {
            return Err(ExporterError::config_error("interval must be at least 1 second"));
        }
        if self.probe_timeout_secs == 0 {
            return Err(ExporterError::config_error("probe timeout must be at least 1 second"));
        }
        if self.collector_timeout_secs == 0 {
            return Err(ExporterError::config_error(
                "collector timeout must be at least 1 second",
            ));
        }

        let mut seen = HashSet::new();
        for service in &self.services {
            if service.port == 0 {
                return Err(ExporterError::config_error(format!(
                    "service {} has port 0",
                    service.name
                )));
            }
            if !seen.insert(service.name.as_str()) {
                return Err(ExporterError::config_error(format!(
                    "service {} is configured twice",
                    service.name
                )));
            }
        }

        let t = &self.thresholds;
        for (name, value) in [
            ("cpu", t.cpu_percent),
            ("memory", t.memory_percent),
            ("disk", t.disk_percent),
            ("disk notice", t.disk_notice_percent),
        ] {
            if !(value > 0.0 && value <= 100.0) {
                return Err(ExporterError::config_error(format!(
                    "{} threshold must be in (0, 100], got {}",
                    name, value
                )));
            }
        }

        Ok(())
    }
}
