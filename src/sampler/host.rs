//! Host inspection using sysinfo and direct /proc access.

use crate::error::{ExporterError, Result};
use crate::sampler::procfs::{self, ConnState};
use crate::sampler::traits::{
    CpuReading, DiskIoCounters, HostSource, InterfaceCounters, LoadAverage, MountUsage,
    ProcessCensus,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use sysinfo::{Disks, Networks, ProcessStatus, System};

/// Window between the two CPU refreshes a utilization reading is computed over.
const CPU_SAMPLE_WINDOW: Duration = Duration::from_secs(1);

/// [`HostSource`] backed by the running machine.
///
/// Each category refreshes its own sysinfo handle behind its own lock.
pub struct SysinfoHost {
    cpu: Mutex<System>,
    memory: Mutex<System>,
    processes: Mutex<System>,
    disks: Mutex<Disks>,
    networks: Mutex<Networks>,
    procfs_root: PathBuf,
}

impl SysinfoHost {
    /// Create a host source reading procfs from `/proc`.
    pub fn new() -> Self {
        Self::with_procfs_root("/proc")
    }

    /// Create a host source reading procfs from another root, e.g. a host
    /// `/proc` bind-mounted into a container.
    pub fn with_procfs_root(root: impl Into<PathBuf>) -> Self {
        Self {
            cpu: Mutex::new(System::new()),
            memory: Mutex::new(System::new()),
            processes: Mutex::new(System::new()),
            disks: Mutex::new(Disks::new_with_refreshed_list()),
            networks: Mutex::new(Networks::new_with_refreshed_list()),
            procfs_root: root.into(),
        }
    }

    #[cfg_attr(not(target_os = "linux"), allow(dead_code))]
    fn read_procfs(&self, collector: &'static str, relative: &str) -> Result<String> {
        let path = self.procfs_root.join(relative);
        std::fs::read_to_string(&path).map_err(|e| {
            ExporterError::sample_unavailable(collector, format!("{}: {}", path.display(), e))
        })
    }

    fn load_average() -> Option<LoadAverage> {
        if cfg!(windows) {
            return None;
        }
        let load = System::load_average();
        Some(LoadAverage {
            one_minute: load.one,
            five_minutes: load.five,
            fifteen_minutes: load.fifteen,
        })
    }
}

// A read that panicked left a stale sysinfo handle behind, which the next
// refresh overwrites.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Space accounting of the filesystem mounted at `path`.
///
/// Used space is `(f_blocks - f_bfree) * f_frsize`, so blocks reserved for
/// root count as free, matching `df`.
#[cfg(unix)]
pub fn statvfs_usage(path: &Path) -> std::io::Result<MountUsage> {
    let stat = nix::sys::statvfs::statvfs(path)?;
    let fragment = stat.fragment_size() as u64;
    let blocks = stat.blocks() as u64;
    let free = stat.blocks_free() as u64;

    Ok(MountUsage {
        mount_point: path.to_string_lossy().to_string(),
        used_bytes: blocks.saturating_sub(free).saturating_mul(fragment),
        total_bytes: blocks.saturating_mul(fragment),
    })
}

impl Default for SysinfoHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HostSource for SysinfoHost {
    fn cpu(&self) -> Result<CpuReading> {
        let mut system = lock(&self.cpu);
        system.refresh_cpu_usage();
        std::thread::sleep(CPU_SAMPLE_WINDOW);
        system.refresh_cpu_usage();

        let cpus = system.cpus();
        if cpus.is_empty() {
            return Err(ExporterError::sample_unavailable(
                "cpu",
                "no CPU information available",
            ));
        }

        let usage_percent =
            cpus.iter().map(|cpu| cpu.cpu_usage() as f64).sum::<f64>() / cpus.len() as f64;

        Ok(CpuReading {
            usage_percent: usage_percent.clamp(0.0, 100.0),
            load_average: Self::load_average(),
        })
    }

    fn memory_percent(&self) -> Result<f64> {
        let mut system = lock(&self.memory);
        system.refresh_memory();

        let total_bytes = system.total_memory();
        if total_bytes == 0 {
            return Err(ExporterError::sample_unavailable(
                "memory",
                "total memory reported as zero",
            ));
        }

        let used_bytes = total_bytes.saturating_sub(system.available_memory());
        Ok(used_bytes as f64 / total_bytes as f64 * 100.0)
    }

    fn disk_usage(&self) -> Result<Vec<std::io::Result<MountUsage>>> {
        let mut disks = lock(&self.disks);
        disks.refresh_list();

        Ok(disks
            .iter()
            .map(|disk| mount_usage(disk.mount_point(), disk))
            .collect())
    }

    #[cfg(target_os = "linux")]
    fn disk_io(&self) -> Result<Vec<DiskIoCounters>> {
        let content = self.read_procfs("disk_io", "diskstats")?;
        Ok(procfs::parse_diskstats(&content))
    }

    #[cfg(not(target_os = "linux"))]
    fn disk_io(&self) -> Result<Vec<DiskIoCounters>> {
        Err(ExporterError::sample_unavailable(
            "disk_io",
            "per-device I/O counters are only read from procfs on Linux",
        ))
    }

    fn network_io(&self) -> Result<Vec<InterfaceCounters>> {
        let mut networks = lock(&self.networks);
        networks.refresh_list();

        Ok(networks
            .iter()
            .map(|(interface, data)| InterfaceCounters {
                interface: interface.clone(),
                bytes_sent: data.total_transmitted(),
                bytes_recv: data.total_received(),
            })
            .collect())
    }

    #[cfg(target_os = "linux")]
    fn connections(&self) -> Result<BTreeMap<ConnState, u64>> {
        let mut counts = BTreeMap::new();
        let mut readable = 0;

        for (file, udp) in [
            ("net/tcp", false),
            ("net/tcp6", false),
            ("net/udp", true),
            ("net/udp6", true),
        ] {
            // tcp6/udp6 are missing when IPv6 is disabled
            match self.read_procfs("connections", file) {
                Ok(content) => {
                    procfs::count_socket_states(&content, udp, &mut counts);
                    readable += 1;
                }
                Err(e) => tracing::debug!(error = %e, "skipping socket table"),
            }
        }

        if readable == 0 {
            return Err(ExporterError::sample_unavailable(
                "connections",
                "no socket table under procfs is readable",
            ));
        }
        Ok(counts)
    }

    #[cfg(not(target_os = "linux"))]
    fn connections(&self) -> Result<BTreeMap<ConnState, u64>> {
        Err(ExporterError::sample_unavailable(
            "connections",
            "socket tables are only read from procfs on Linux",
        ))
    }

    fn processes(&self) -> Result<ProcessCensus> {
        let mut system = lock(&self.processes);
        system.refresh_all();

        let processes = system.processes();
        let zombies = processes
            .values()
            .filter(|process| process.status() == ProcessStatus::Zombie)
            .count();

        Ok(ProcessCensus {
            total: processes.len() as u64,
            zombies: zombies as u64,
        })
    }

    fn system_info(&self) -> Result<BTreeMap<String, String>> {
        let unknown = || "unknown".to_string();

        let mut fields = BTreeMap::new();
        fields.insert("hostname".to_string(), System::host_name().unwrap_or_else(unknown));
        fields.insert("os".to_string(), System::name().unwrap_or_else(unknown));
        fields.insert(
            "os_version".to_string(),
            System::os_version().unwrap_or_else(unknown),
        );
        fields.insert(
            "kernel_version".to_string(),
            System::kernel_version().unwrap_or_else(unknown),
        );
        fields.insert(
            "architecture".to_string(),
            std::env::consts::ARCH.to_string(),
        );
        fields.insert(
            "exporter_version".to_string(),
            env!("CARGO_PKG_VERSION").to_string(),
        );
        Ok(fields)
    }
}

#[cfg(unix)]
fn mount_usage(mount_point: &Path, _disk: &sysinfo::Disk) -> std::io::Result<MountUsage> {
    statvfs_usage(mount_point)
}

#[cfg(not(unix))]
fn mount_usage(mount_point: &Path, disk: &sysinfo::Disk) -> std::io::Result<MountUsage> {
    let total_bytes = disk.total_space();
    Ok(MountUsage {
        mount_point: mount_point.to_string_lossy().to_string(),
        used_bytes: total_bytes.saturating_sub(disk.available_space()),
        total_bytes,
    })
}
