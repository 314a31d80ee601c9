//! The seam between the sampler and the host it inspects.

use crate::error::Result;
use crate::sampler::procfs::ConnState;
use std::collections::BTreeMap;

/// System load averages.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoadAverage {
    pub one_minute: f64,
    pub five_minutes: f64,
    pub fifteen_minutes: f64,
}

/// CPU utilization and, where the platform has the concept, load averages.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CpuReading {
    /// Utilization percentage (0.0 to 100.0)
    pub usage_percent: f64,
    /// `None` on platforms without load averages
    pub load_average: Option<LoadAverage>,
}

/// Space accounting for one mounted filesystem.
#[derive(Debug, Clone, PartialEq)]
pub struct MountUsage {
    /// Mount point (e.g. "/", "/boot")
    pub mount_point: String,
    pub used_bytes: u64,
    pub total_bytes: u64,
}

impl MountUsage {
    /// `used / total * 100`, clamped to [0, 100]; `None` for zero-sized filesystems.
    pub fn percent(&self) -> Option<f64> {
        if self.total_bytes == 0 {
            return None;
        }
        let percent = self.used_bytes as f64 * 100.0 / self.total_bytes as f64;
        Some(percent.clamp(0.0, 100.0))
    }
}

/// Raw cumulative I/O counters of one block device, as reported by the OS.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiskIoCounters {
    pub device: String,
    pub read_bytes: u64,
    pub write_bytes: u64,
    pub reads_completed: u64,
    pub writes_completed: u64,
}

/// Raw cumulative byte counters of one network interface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterfaceCounters {
    pub interface: String,
    pub bytes_sent: u64,
    pub bytes_recv: u64,
}

/// Process census.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessCensus {
    pub total: u64,
    pub zombies: u64,
}

/// Read access to host state, one method per sub-collector.
///
/// Methods block (they may sleep or read procfs), so the sampler calls them
/// from `spawn_blocking` under a timeout. An `Err` means the facility could
/// not be read this time; it never aborts sibling reads.
///
/// Methods take `&self`: implementations keep any mutable state per category,
/// so a read that never returns holds up only its own category.
pub trait HostSource: Send + Sync + 'static {
    /// CPU utilization over a short sampling window, plus load averages.
    fn cpu(&self) -> Result<CpuReading>;

    /// Memory utilization percentage.
    fn memory_percent(&self) -> Result<f64>;

    /// Usage of every mounted filesystem.
    ///
    /// Per-mount failures are reported inline so the sampler can skip
    /// permission-denied mounts without failing the whole read.
    fn disk_usage(&self) -> Result<Vec<std::io::Result<MountUsage>>>;

    /// Cumulative I/O counters per block device.
    fn disk_io(&self) -> Result<Vec<DiskIoCounters>>;

    /// Cumulative byte counters per network interface.
    fn network_io(&self) -> Result<Vec<InterfaceCounters>>;

    /// Number of open sockets per connection state.
    fn connections(&self) -> Result<BTreeMap<ConnState, u64>>;

    /// Total and zombie process counts.
    fn processes(&self) -> Result<ProcessCensus>;

    /// Descriptive host identity fields, published once at startup.
    fn system_info(&self) -> Result<BTreeMap<String, String>>;
}
