//! Host sampling: seven isolated sub-collectors writing into the registry.
//!
//! Each sub-collector reads one category of host state through a
//! [`HostSource`] and writes the result into the [`Registry`]. A read runs on
//! the blocking pool under a timeout; an error, panic or timeout is caught at
//! the sub-collector boundary, logged, counted in
//! `custom_collector_failures_total`, and leaves that sub-collector's series
//! untouched for the cycle. Sibling sub-collectors always run.
//!
//! A timed-out read keeps running on the blocking pool. Until it returns,
//! later reads of the same category fail immediately instead of queueing
//! behind it; other categories are unaffected.

pub mod host;
pub mod mirror;
pub mod procfs;
pub mod traits;

pub use host::SysinfoHost;
pub use traits::HostSource;

use crate::error::{ExporterError, Result};
use crate::metrics::catalog;
use crate::metrics::Registry;
use mirror::{CounterMirror, MirrorUpdate, RateTracker};
use procfs::ConnState;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// One category of host inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubCollector {
    Cpu,
    Memory,
    DiskUsage,
    DiskIo,
    NetworkIo,
    Connections,
    Processes,
}

impl SubCollector {
    /// Every sub-collector, in the order a cycle runs them.
    pub const ALL: [SubCollector; 7] = [
        SubCollector::Cpu,
        SubCollector::Memory,
        SubCollector::DiskUsage,
        SubCollector::DiskIo,
        SubCollector::NetworkIo,
        SubCollector::Connections,
        SubCollector::Processes,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SubCollector::Cpu => "cpu",
            SubCollector::Memory => "memory",
            SubCollector::DiskUsage => "disk_usage",
            SubCollector::DiskIo => "disk_io",
            SubCollector::NetworkIo => "network_io",
            SubCollector::Connections => "connections",
            SubCollector::Processes => "processes",
        }
    }
}

/// Read name of the startup host identity read.
const SYSTEM_INFO_READ: &str = "system_info";

/// Marks a category's read as running; cleared when the blocking read
/// returns, even if the sampler stopped waiting for it.
struct InFlight {
    reads: Arc<Mutex<HashSet<&'static str>>>,
    name: &'static str,
}

impl InFlight {
    fn claim(reads: &Arc<Mutex<HashSet<&'static str>>>, name: &'static str) -> Option<Self> {
        let claimed = reads
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(name);
        claimed.then(|| Self {
            reads: Arc::clone(reads),
            name,
        })
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.reads
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(self.name);
    }
}

/// Outcome of one sub-collector run.
#[derive(Debug)]
pub struct CollectorOutcome {
    pub collector: SubCollector,
    pub result: Result<()>,
    pub elapsed: Duration,
}

/// Values written during the current cycle that alerting evaluates.
///
/// A field is `None` (or a mount is missing) when its sub-collector produced
/// no update this cycle, so alerting never looks at a prior cycle's value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReadings {
    pub cpu_percent: Option<f64>,
    pub memory_percent: Option<f64>,
    /// (mount point, usage percent) for every mount written this cycle
    pub disk_usage: Vec<(String, f64)>,
}

/// Aggregated result of one sampling pass.
#[derive(Debug, Default)]
pub struct SampleReport {
    pub readings: CycleReadings,
    pub outcomes: Vec<CollectorOutcome>,
}

impl SampleReport {
    pub fn failures(&self) -> impl Iterator<Item = &CollectorOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }

    pub fn succeeded(&self, collector: SubCollector) -> bool {
        self.outcomes
            .iter()
            .any(|o| o.collector == collector && o.result.is_ok())
    }
}

/// Drives the sub-collectors against a shared [`HostSource`].
pub struct Sampler<S: HostSource> {
    source: Arc<S>,
    in_flight: Arc<Mutex<HashSet<&'static str>>>,
    registry: Arc<Registry>,
    timeout: Duration,
    disk_read: CounterMirror,
    disk_write: CounterMirror,
    net_sent: CounterMirror,
    net_recv: CounterMirror,
    read_ops: RateTracker,
    write_ops: RateTracker,
}

impl<S: HostSource> Sampler<S> {
    pub fn new(source: S, registry: Arc<Registry>, timeout: Duration) -> Self {
        Self {
            source: Arc::new(source),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            registry,
            timeout,
            disk_read: CounterMirror::new(),
            disk_write: CounterMirror::new(),
            net_sent: CounterMirror::new(),
            net_recv: CounterMirror::new(),
            read_ops: RateTracker::new(),
            write_ops: RateTracker::new(),
        }
    }

    /// Run `read` against the source on the blocking pool, bounded by the
    /// sub-collector timeout.
    async fn read<T, F>(&self, name: &'static str, read: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&S) -> Result<T> + Send + 'static,
    {
        let in_flight = InFlight::claim(&self.in_flight, name).ok_or_else(|| {
            ExporterError::sample_unavailable(name, "previous read is still running")
        })?;

        let source = Arc::clone(&self.source);
        let task = tokio::task::spawn_blocking(move || {
            let _in_flight = in_flight;
            read(source.as_ref())
        });

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(ExporterError::sample_unavailable(
                name,
                format!("read panicked: {}", join_error),
            )),
            Err(_) => Err(ExporterError::SampleTimeout {
                collector: name,
                timeout: self.timeout,
            }),
        }
    }

    /// Publish the host identity info metric. Called once at startup.
    pub async fn publish_system_info(&self) -> Result<()> {
        let fields = self
            .read(SYSTEM_INFO_READ, |source| source.system_info())
            .await?;
        self.registry.set_info(catalog::SYSTEM_INFO, &[], fields)
    }

    /// Run every sub-collector once.
    pub async fn sample(&mut self) -> SampleReport {
        let mut report = SampleReport::default();

        for collector in SubCollector::ALL {
            let started = Instant::now();
            let result = match collector {
                SubCollector::Cpu => self.collect_cpu(&mut report.readings).await,
                SubCollector::Memory => self.collect_memory(&mut report.readings).await,
                SubCollector::DiskUsage => self.collect_disk_usage(&mut report.readings).await,
                SubCollector::DiskIo => self.collect_disk_io().await,
                SubCollector::NetworkIo => self.collect_network_io().await,
                SubCollector::Connections => self.collect_connections().await,
                SubCollector::Processes => self.collect_processes().await,
            };
            let elapsed = started.elapsed();

            match &result {
                Ok(()) => debug!(collector = collector.name(), ?elapsed, "sub-collector done"),
                Err(e) => {
                    warn!(collector = collector.name(), error = %e, "sub-collector failed");
                    self.record(
                        self.registry
                            .increment_counter(catalog::COLLECTOR_FAILURES, &[collector.name()], 1.0),
                    );
                }
            }

            report.outcomes.push(CollectorOutcome {
                collector,
                result,
                elapsed,
            });
        }

        report
    }

    /// Registry writes only fail on programming errors; log and keep going.
    fn record(&self, result: Result<()>) {
        if let Err(e) = result {
            warn!(error = %e, "rejected registry write");
        }
    }

    async fn collect_cpu(&self, readings: &mut CycleReadings) -> Result<()> {
        let cpu = self.read(SubCollector::Cpu.name(), |source| source.cpu()).await?;

        self.registry
            .set_gauge(catalog::CPU_USAGE, &[], cpu.usage_percent)?;
        if let Some(load) = cpu.load_average {
            for (period, value) in [
                ("1min", load.one_minute),
                ("5min", load.five_minutes),
                ("15min", load.fifteen_minutes),
            ] {
                self.registry
                    .set_gauge(catalog::LOAD_AVERAGE, &[period], value)?;
            }
        }

        readings.cpu_percent = Some(cpu.usage_percent);
        Ok(())
    }

    async fn collect_memory(&self, readings: &mut CycleReadings) -> Result<()> {
        let percent = self
            .read(SubCollector::Memory.name(), |source| source.memory_percent())
            .await?;

        self.registry.set_gauge(catalog::MEMORY_USAGE, &[], percent)?;
        readings.memory_percent = Some(percent);
        Ok(())
    }

    async fn collect_disk_usage(&self, readings: &mut CycleReadings) -> Result<()> {
        let mounts = self
            .read(SubCollector::DiskUsage.name(), |source| source.disk_usage())
            .await?;

        for mount in mounts {
            let mount = match mount {
                Ok(mount) => mount,
                Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => continue,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable filesystem");
                    continue;
                }
            };
            let Some(percent) = mount.percent() else {
                continue;
            };

            self.registry
                .set_gauge(catalog::DISK_USAGE, &[&mount.mount_point], percent)?;
            readings.disk_usage.push((mount.mount_point, percent));
        }
        Ok(())
    }

    async fn collect_disk_io(&mut self) -> Result<()> {
        let disks = self
            .read(SubCollector::DiskIo.name(), |source| source.disk_io())
            .await?;
        let now = Instant::now();

        for disk in &disks {
            let device = disk.device.as_str();
            mirror_counter(
                &self.registry,
                &mut self.disk_read,
                catalog::DISK_READ_BYTES,
                device,
                disk.read_bytes,
            )?;
            mirror_counter(
                &self.registry,
                &mut self.disk_write,
                catalog::DISK_WRITE_BYTES,
                device,
                disk.write_bytes,
            )?;

            // first sight or reset: no rate, and the previous one is dropped
            for (tracker, operation, raw) in [
                (&mut self.read_ops, "read", disk.reads_completed),
                (&mut self.write_ops, "write", disk.writes_completed),
            ] {
                match tracker.observe(device, raw, now) {
                    Some(rate) => self
                        .registry
                        .set_gauge(catalog::DISK_IOPS, &[device, operation], rate)?,
                    None => {
                        self.registry
                            .remove_series(catalog::DISK_IOPS, &[device, operation])?;
                    }
                }
            }
        }

        let present: HashSet<&str> = disks.iter().map(|d| d.device.as_str()).collect();
        forget_vanished(&self.registry, &mut self.disk_read, catalog::DISK_READ_BYTES, &present)?;
        forget_vanished(&self.registry, &mut self.disk_write, catalog::DISK_WRITE_BYTES, &present)?;
        for (tracker, operation) in [(&mut self.read_ops, "read"), (&mut self.write_ops, "write")] {
            for device in tracker.retain_present(&present) {
                self.registry
                    .remove_series(catalog::DISK_IOPS, &[&device, operation])?;
            }
        }
        Ok(())
    }

    async fn collect_network_io(&mut self) -> Result<()> {
        let interfaces = self
            .read(SubCollector::NetworkIo.name(), |source| source.network_io())
            .await?;

        for iface in &interfaces {
            mirror_counter(
                &self.registry,
                &mut self.net_sent,
                catalog::NETWORK_BYTES_SENT,
                &iface.interface,
                iface.bytes_sent,
            )?;
            mirror_counter(
                &self.registry,
                &mut self.net_recv,
                catalog::NETWORK_BYTES_RECV,
                &iface.interface,
                iface.bytes_recv,
            )?;
        }

        let present: HashSet<&str> = interfaces.iter().map(|i| i.interface.as_str()).collect();
        forget_vanished(&self.registry, &mut self.net_sent, catalog::NETWORK_BYTES_SENT, &present)?;
        forget_vanished(&self.registry, &mut self.net_recv, catalog::NETWORK_BYTES_RECV, &present)?;
        Ok(())
    }

    async fn collect_connections(&self) -> Result<()> {
        let counts = self
            .read(SubCollector::Connections.name(), |source| source.connections())
            .await?;

        // Every state is written, so states that disappeared read 0.
        for state in ConnState::ALL {
            let count = counts.get(&state).copied().unwrap_or(0);
            self.registry
                .set_gauge(catalog::NETWORK_CONNECTIONS, &[state.label()], count as f64)?;
        }
        Ok(())
    }

    async fn collect_processes(&self) -> Result<()> {
        let census = self
            .read(SubCollector::Processes.name(), |source| source.processes())
            .await?;

        self.registry
            .set_gauge(catalog::PROCESS_COUNT, &[], census.total as f64)?;
        self.registry
            .set_gauge(catalog::ZOMBIE_PROCESSES, &[], census.zombies as f64)?;
        Ok(())
    }
}

fn mirror_counter(
    registry: &Registry,
    mirror: &mut CounterMirror,
    metric: &str,
    label: &str,
    raw: u64,
) -> Result<()> {
    match mirror.observe(label, raw) {
        MirrorUpdate::Delta(delta) => registry.increment_counter(metric, &[label], delta as f64),
        MirrorUpdate::Reset { previous, baseline } => {
            info!(
                metric,
                series = label,
                previous,
                baseline,
                "raw counter went backwards, treating as device reset"
            );
            // keep the series visible even if it had never been written
            registry.increment_counter(metric, &[label], 0.0)
        }
    }
}

/// Drop the mirror state and the exported counter of every device that is no
/// longer reported. A device that comes back starts a fresh series.
fn forget_vanished(
    registry: &Registry,
    mirror: &mut CounterMirror,
    metric: &str,
    present: &HashSet<&str>,
) -> Result<()> {
    for label in mirror.retain_present(present) {
        info!(metric, series = %label, "device disappeared, dropping its counter");
        registry.remove_series(metric, &[&label])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::catalog::*;
    use crate::sampler::traits::*;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Scripted host: every call pops the next value of its script and the
    /// last value repeats.
    #[derive(Default)]
    struct FakeHost {
        cpu: Option<f64>,
        memory: Option<f64>,
        mounts: Mutex<Vec<std::io::Result<MountUsage>>>,
        disk_io: Mutex<Vec<Vec<DiskIoCounters>>>,
        net_io: Mutex<Vec<Vec<InterfaceCounters>>>,
        hang_cpu_once: AtomicBool,
        hang_processes: bool,
        hang_system_info: bool,
    }

    fn next<T: Clone + Default>(script: &Mutex<Vec<T>>) -> T {
        let mut script = script.lock().unwrap();
        if script.len() > 1 {
            script.remove(0)
        } else {
            script.first().cloned().unwrap_or_default()
        }
    }

    impl HostSource for FakeHost {
        fn cpu(&self) -> Result<CpuReading> {
            if self.hang_cpu_once.swap(false, Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(600));
            }
            let usage_percent = self
                .cpu
                .ok_or_else(|| ExporterError::sample_unavailable("cpu", "scripted failure"))?;
            Ok(CpuReading {
                usage_percent,
                load_average: None,
            })
        }

        fn memory_percent(&self) -> Result<f64> {
            self.memory
                .ok_or_else(|| ExporterError::sample_unavailable("memory", "scripted failure"))
        }

        fn disk_usage(&self) -> Result<Vec<std::io::Result<MountUsage>>> {
            Ok(std::mem::take(&mut *self.mounts.lock().unwrap()))
        }

        fn disk_io(&self) -> Result<Vec<DiskIoCounters>> {
            Ok(next(&self.disk_io))
        }

        fn network_io(&self) -> Result<Vec<InterfaceCounters>> {
            Ok(next(&self.net_io))
        }

        fn connections(&self) -> Result<BTreeMap<ConnState, u64>> {
            let mut counts = BTreeMap::new();
            counts.insert(ConnState::Listen, 3);
            Ok(counts)
        }

        fn processes(&self) -> Result<ProcessCensus> {
            if self.hang_processes {
                std::thread::sleep(Duration::from_millis(500));
            }
            Ok(ProcessCensus {
                total: 120,
                zombies: 2,
            })
        }

        fn system_info(&self) -> Result<BTreeMap<String, String>> {
            if self.hang_system_info {
                std::thread::sleep(Duration::from_millis(500));
            }
            let mut fields = BTreeMap::new();
            fields.insert("hostname".to_string(), "fake".to_string());
            Ok(fields)
        }
    }

    fn healthy() -> FakeHost {
        FakeHost {
            cpu: Some(1.0),
            memory: Some(1.0),
            ..Default::default()
        }
    }

    fn registry() -> Arc<Registry> {
        let registry = Arc::new(Registry::new());
        register_all(&registry, &[]).unwrap();
        registry
    }

    fn disk(device: &str, read_bytes: u64, write_bytes: u64) -> DiskIoCounters {
        DiskIoCounters {
            device: device.to_string(),
            read_bytes,
            write_bytes,
            ..Default::default()
        }
    }

    fn disk_ops(device: &str, reads_completed: u64) -> DiskIoCounters {
        DiskIoCounters {
            device: device.to_string(),
            reads_completed,
            writes_completed: reads_completed,
            ..Default::default()
        }
    }

    fn iface(interface: &str, bytes_sent: u64, bytes_recv: u64) -> InterfaceCounters {
        InterfaceCounters {
            interface: interface.to_string(),
            bytes_sent,
            bytes_recv,
        }
    }

    #[tokio::test]
    async fn test_failing_sub_collector_does_not_abort_siblings() {
        let registry = registry();
        let host = FakeHost {
            cpu: None,
            memory: Some(42.0),
            ..Default::default()
        };
        let mut sampler = Sampler::new(host, Arc::clone(&registry), Duration::from_secs(5));

        let report = sampler.sample().await;

        assert_eq!(report.outcomes.len(), SubCollector::ALL.len());
        assert_eq!(report.failures().count(), 1);
        assert!(!report.succeeded(SubCollector::Cpu));
        assert_eq!(report.readings.cpu_percent, None);
        assert_eq!(report.readings.memory_percent, Some(42.0));
        assert_eq!(registry.get(MEMORY_USAGE, &[]), Some(42.0));
        assert_eq!(registry.get(PROCESS_COUNT, &[]), Some(120.0));
        assert_eq!(registry.get(ZOMBIE_PROCESSES, &[]), Some(2.0));
        assert_eq!(registry.get(COLLECTOR_FAILURES, &["cpu"]), Some(1.0));
        assert_eq!(registry.get(COLLECTOR_FAILURES, &["memory"]), Some(0.0));
    }

    #[tokio::test]
    async fn test_slow_sub_collector_times_out() {
        let registry = registry();
        let host = FakeHost {
            hang_processes: true,
            ..healthy()
        };
        let mut sampler = Sampler::new(host, Arc::clone(&registry), Duration::from_millis(100));

        let report = sampler.sample().await;
        let failure = report.failures().next().unwrap();
        assert_eq!(failure.collector, SubCollector::Processes);
        assert!(matches!(
            failure.result,
            Err(ExporterError::SampleTimeout { .. })
        ));
        assert_eq!(registry.get(PROCESS_COUNT, &[]), Some(0.0));
    }

    #[tokio::test]
    async fn test_hung_read_only_blocks_its_own_category() {
        let registry = registry();
        let host = FakeHost {
            cpu: Some(33.0),
            memory: Some(44.0),
            hang_cpu_once: AtomicBool::new(true),
            ..Default::default()
        };
        let mut sampler = Sampler::new(host, Arc::clone(&registry), Duration::from_millis(100));

        let first = sampler.sample().await;
        let failed: Vec<_> = first.failures().map(|o| o.collector).collect();
        assert_eq!(failed, vec![SubCollector::Cpu]);
        assert!(matches!(
            first.outcomes[0].result,
            Err(ExporterError::SampleTimeout { collector: "cpu", .. })
        ));
        assert_eq!(registry.get(MEMORY_USAGE, &[]), Some(44.0));
        assert_eq!(registry.get(PROCESS_COUNT, &[]), Some(120.0));

        // the abandoned cpu read is still sleeping
        let second = sampler.sample().await;
        let failed: Vec<_> = second.failures().map(|o| o.collector).collect();
        assert_eq!(failed, vec![SubCollector::Cpu]);
        assert!(matches!(
            second.outcomes[0].result,
            Err(ExporterError::SampleUnavailable { collector: "cpu", .. })
        ));
        assert_eq!(registry.get(COLLECTOR_FAILURES, &["cpu"]), Some(2.0));
        assert_eq!(registry.get(COLLECTOR_FAILURES, &["memory"]), Some(0.0));

        tokio::time::sleep(Duration::from_millis(700)).await;
        let third = sampler.sample().await;
        assert_eq!(third.failures().count(), 0);
        assert_eq!(registry.get(CPU_USAGE, &[]), Some(33.0));
    }

    #[tokio::test]
    async fn test_disk_usage_skips_permission_denied_mounts() {
        let registry = registry();
        let host = FakeHost {
            mounts: Mutex::new(vec![
                Ok(MountUsage {
                    mount_point: "/".to_string(),
                    used_bytes: 95,
                    total_bytes: 100,
                }),
                Err(std::io::Error::from(std::io::ErrorKind::PermissionDenied)),
                Ok(MountUsage {
                    mount_point: "/proc".to_string(),
                    used_bytes: 0,
                    total_bytes: 0,
                }),
            ]),
            ..healthy()
        };
        let mut sampler = Sampler::new(host, Arc::clone(&registry), Duration::from_secs(5));

        let report = sampler.sample().await;
        assert!(report.succeeded(SubCollector::DiskUsage));
        assert_eq!(report.readings.disk_usage, vec![("/".to_string(), 95.0)]);

        let snapshot = registry.snapshot();
        let family = snapshot.family(DISK_USAGE).unwrap();
        assert_eq!(family.series.len(), 1);
        assert_eq!(snapshot.value(DISK_USAGE, &["/"]), Some(95.0));
    }

    #[tokio::test]
    async fn test_io_counters_stay_monotonic_across_reset() {
        let registry = registry();
        let host = FakeHost {
            disk_io: Mutex::new(vec![
                vec![disk("sda", 1000, 500)],
                vec![disk("sda", 1600, 700)],
                vec![disk("sda", 100, 50)],
                vec![disk("sda", 300, 60)],
            ]),
            net_io: Mutex::new(vec![vec![iface("eth0", 10, 20)], vec![iface("eth0", 5, 25)]]),
            ..healthy()
        };
        let mut sampler = Sampler::new(host, Arc::clone(&registry), Duration::from_secs(5));

        let mut observed = Vec::new();
        for _ in 0..4 {
            sampler.sample().await;
            observed.push(registry.get(DISK_READ_BYTES, &["sda"]).unwrap());
        }

        assert_eq!(observed, vec![1000.0, 1600.0, 1600.0, 1800.0]);
        assert!(observed.windows(2).all(|w| w[1] >= w[0]));
        assert_eq!(registry.get(DISK_WRITE_BYTES, &["sda"]), Some(710.0));
        assert_eq!(registry.get(NETWORK_BYTES_SENT, &["eth0"]), Some(10.0));
        assert_eq!(registry.get(NETWORK_BYTES_RECV, &["eth0"]), Some(25.0));
    }

    #[tokio::test]
    async fn test_iops_dropped_after_reset() {
        let registry = registry();
        let host = FakeHost {
            disk_io: Mutex::new(vec![
                vec![disk_ops("sda", 100)],
                vec![disk_ops("sda", 10_000)],
                vec![disk_ops("sda", 5)],
            ]),
            ..healthy()
        };
        let mut sampler = Sampler::new(host, Arc::clone(&registry), Duration::from_secs(5));

        sampler.sample().await;
        assert_eq!(registry.get(DISK_IOPS, &["sda", "read"]), None);

        tokio::time::sleep(Duration::from_millis(10)).await;
        sampler.sample().await;
        assert!(registry.get(DISK_IOPS, &["sda", "read"]).unwrap() > 0.0);
        assert!(registry.get(DISK_IOPS, &["sda", "write"]).unwrap() > 0.0);

        sampler.sample().await;
        assert_eq!(registry.get(DISK_IOPS, &["sda", "read"]), None);
        assert_eq!(registry.get(DISK_IOPS, &["sda", "write"]), None);
    }

    #[tokio::test]
    async fn test_vanished_devices_are_dropped() {
        let registry = registry();
        let host = FakeHost {
            disk_io: Mutex::new(vec![
                vec![disk("sda", 10, 10), disk("sdb", 20, 20)],
                vec![disk("sda", 15, 10), disk("sdb", 25, 20)],
                vec![disk("sda", 20, 10)],
            ]),
            net_io: Mutex::new(vec![
                vec![iface("eth0", 1, 1), iface("wlan0", 7, 7)],
                vec![iface("eth0", 2, 2)],
                vec![iface("eth0", 3, 3), iface("wlan0", 4, 4)],
            ]),
            ..healthy()
        };
        let mut sampler = Sampler::new(host, Arc::clone(&registry), Duration::from_secs(5));

        sampler.sample().await;
        sampler.sample().await;
        assert_eq!(registry.get(NETWORK_BYTES_SENT, &["wlan0"]), None);
        assert_eq!(registry.get(NETWORK_BYTES_RECV, &["wlan0"]), None);
        assert_eq!(registry.get(NETWORK_BYTES_SENT, &["eth0"]), Some(2.0));

        sampler.sample().await;
        assert_eq!(registry.get(DISK_READ_BYTES, &["sdb"]), None);
        assert_eq!(registry.get(DISK_WRITE_BYTES, &["sdb"]), None);
        assert_eq!(registry.get(DISK_IOPS, &["sdb", "read"]), None);
        assert_eq!(registry.get(DISK_READ_BYTES, &["sda"]), Some(20.0));
        // a returning interface starts a fresh series at its raw value
        assert_eq!(registry.get(NETWORK_BYTES_SENT, &["wlan0"]), Some(4.0));
    }

    #[tokio::test]
    async fn test_connections_rebuilt_with_every_state() {
        let registry = registry();
        let mut sampler = Sampler::new(healthy(), Arc::clone(&registry), Duration::from_secs(5));
        sampler.sample().await;

        let snapshot = registry.snapshot();
        assert_eq!(
            snapshot.family(NETWORK_CONNECTIONS).unwrap().series.len(),
            ConnState::ALL.len()
        );
        assert_eq!(snapshot.value(NETWORK_CONNECTIONS, &["listen"]), Some(3.0));
        assert_eq!(snapshot.value(NETWORK_CONNECTIONS, &["established"]), Some(0.0));
    }

    #[tokio::test]
    async fn test_load_average_omitted_when_unsupported() {
        let registry = registry();
        let host = FakeHost {
            cpu: Some(10.0),
            ..healthy()
        };
        let mut sampler = Sampler::new(host, Arc::clone(&registry), Duration::from_secs(5));
        sampler.sample().await;

        let snapshot = registry.snapshot();
        assert!(snapshot.family(LOAD_AVERAGE).unwrap().series.is_empty());
    }

    #[tokio::test]
    async fn test_publish_system_info() {
        let registry = registry();
        let sampler = Sampler::new(FakeHost::default(), Arc::clone(&registry), Duration::from_secs(5));
        sampler.publish_system_info().await.unwrap();

        let snapshot = registry.snapshot();
        let info = snapshot.info(SYSTEM_INFO).unwrap();
        assert_eq!(info.get("hostname").map(String::as_str), Some("fake"));
    }

    #[tokio::test]
    async fn test_system_info_read_is_its_own_category() {
        let registry = registry();
        let host = FakeHost {
            hang_system_info: true,
            ..healthy()
        };
        let mut sampler = Sampler::new(host, Arc::clone(&registry), Duration::from_millis(100));

        let err = sampler.publish_system_info().await.unwrap_err();
        assert!(matches!(
            err,
            ExporterError::SampleTimeout {
                collector: "system_info",
                ..
            }
        ));

        // the identity read is still sleeping; process counting is not held up
        let report = sampler.sample().await;
        assert!(report.succeeded(SubCollector::Processes));
        assert_eq!(registry.get(COLLECTOR_FAILURES, &["processes"]), Some(0.0));
    }
}
