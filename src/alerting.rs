//! Static threshold alerting over the values sampled in the current cycle.

use crate::config::Thresholds;
use crate::metrics::catalog::{self, ALERT_CPU, ALERT_DISK, ALERT_MEMORY};
use crate::metrics::Registry;
use crate::sampler::CycleReadings;
use std::sync::Arc;
use tracing::{info, warn};

/// Alert counters touched by one evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertSummary {
    /// `metric` label values incremented this cycle
    pub breached: Vec<&'static str>,
    /// Mount points between the notice and alert boundaries
    pub approaching: Vec<String>,
}

/// Increments `custom_alert_threshold_exceeded_total` on threshold breaches.
///
/// Each metric's counter moves by at most 1 per evaluation: any number of
/// mounts over the disk threshold still count as one `disk_usage` breach.
/// A breach that persists is counted again on every cycle.
pub struct ThresholdAlerting {
    thresholds: Thresholds,
    registry: Arc<Registry>,
}

impl ThresholdAlerting {
    pub fn new(thresholds: Thresholds, registry: Arc<Registry>) -> Self {
        Self {
            thresholds,
            registry,
        }
    }

    /// Evaluate the readings of the cycle that just sampled.
    pub fn evaluate(&self, readings: &CycleReadings) -> AlertSummary {
        let t = &self.thresholds;
        let mut summary = AlertSummary::default();

        if let Some(cpu) = readings.cpu_percent {
            if cpu > t.cpu_percent {
                warn!(usage = cpu, threshold = t.cpu_percent, "CPU usage above threshold");
                summary.breached.push(ALERT_CPU);
            }
        }

        if let Some(memory) = readings.memory_percent {
            if memory > t.memory_percent {
                warn!(usage = memory, threshold = t.memory_percent, "memory usage above threshold");
                summary.breached.push(ALERT_MEMORY);
            }
        }

        let mut disk_breached = false;
        for (mount_point, usage) in &readings.disk_usage {
            if *usage > t.disk_percent {
                warn!(mountpoint = %mount_point, "disk usage on {} is {:.1}%", mount_point, usage);
                disk_breached = true;
            } else if *usage > t.disk_notice_percent {
                info!(mountpoint = %mount_point, "notice: disk usage on {} is {:.1}%", mount_point, usage);
                summary.approaching.push(mount_point.clone());
            }
        }
        if disk_breached {
            summary.breached.push(ALERT_DISK);
        }

        for &metric in &summary.breached {
            if let Err(e) =
                self.registry
                    .increment_counter(catalog::ALERT_THRESHOLD_EXCEEDED, &[metric], 1.0)
            {
                warn!(metric, error = %e, "rejected alert counter write");
            }
        }

        summary
    }
}
