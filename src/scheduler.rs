//! Periodic collection cycles: sampling, probing, then alerting.
//!
//! A [`Scheduler`] owns the only writer sequence into the registry. Cycles
//! run one after another on the scheduler's own task, so two cycles can never
//! overlap; a cycle that overruns the interval delays the next tick instead of
//! stacking up missed ones. Cancellation is checked between cycles only, so an
//! in-flight cycle always finishes its writes.

use crate::alerting::{AlertSummary, ThresholdAlerting};
use crate::config::ExporterConfig;
use crate::metrics::catalog;
use crate::metrics::Registry;
use crate::probe::ServiceProbe;
use crate::sampler::{HostSource, SampleReport, Sampler};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Where the scheduler currently is in its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    /// Waiting for the next tick
    Idle,
    /// Sub-collectors and service probes running
    Sampling,
    /// Evaluating thresholds over the fresh readings
    Alerting,
}

/// Everything one cycle did.
#[derive(Debug)]
pub struct CycleReport {
    pub sample: SampleReport,
    pub alerts: AlertSummary,
    pub duration: Duration,
}

pub struct Scheduler<S: HostSource> {
    sampler: Sampler<S>,
    probe: ServiceProbe,
    alerting: ThresholdAlerting,
    registry: Arc<Registry>,
    interval: Duration,
    state: watch::Sender<CycleState>,
    cycles: u64,
}

impl<S: HostSource> Scheduler<S> {
    pub fn new(
        sampler: Sampler<S>,
        probe: ServiceProbe,
        alerting: ThresholdAlerting,
        registry: Arc<Registry>,
        interval: Duration,
    ) -> Self {
        let (state, _) = watch::channel(CycleState::Idle);
        Self {
            sampler,
            probe,
            alerting,
            registry,
            interval,
            state,
            cycles: 0,
        }
    }

    /// Wire a sampler, probe and alerting stage from the configuration.
    pub fn from_config(source: S, registry: Arc<Registry>, config: &ExporterConfig) -> Self {
        let sampler = Sampler::new(source, Arc::clone(&registry), config.collector_timeout());
        let probe = ServiceProbe::new(
            config.services.clone(),
            config.probe_timeout(),
            Arc::clone(&registry),
        );
        let alerting = ThresholdAlerting::new(config.thresholds.clone(), Arc::clone(&registry));
        Self::new(sampler, probe, alerting, registry, config.interval())
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<CycleState> {
        self.state.subscribe()
    }

    pub fn cycles_completed(&self) -> u64 {
        self.cycles
    }

    /// Publish the host identity info metric.
    pub async fn publish_system_info(&self) {
        if let Err(e) = self.sampler.publish_system_info().await {
            warn!(error = %e, "failed to publish system info");
        }
    }

    /// Run one full cycle. Never fails: sub-collector errors are contained in
    /// the returned report.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let started = Instant::now();
        debug!(
            cycle = self.cycles + 1,
            at = %chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            "collecting metrics"
        );

        self.state.send_replace(CycleState::Sampling);
        let sample = self.sampler.sample().await;
        self.probe.probe_all().await;

        self.state.send_replace(CycleState::Alerting);
        let alerts = self.alerting.evaluate(&sample.readings);

        let duration = started.elapsed();
        self.cycles += 1;
        if let Err(e) = self
            .registry
            .increment_counter(catalog::COLLECTION_CYCLES, &[], 1.0)
            .and_then(|_| {
                self.registry
                    .set_gauge(catalog::COLLECTION_DURATION, &[], duration.as_secs_f64())
            })
        {
            warn!(error = %e, "failed to record cycle metrics");
        }

        self.state.send_replace(CycleState::Idle);

        let failures = sample.failures().count();
        if failures > 0 {
            info!(cycle = self.cycles, ?duration, failures, "collection cycle finished with failures");
        } else {
            debug!(cycle = self.cycles, ?duration, "collection cycle finished");
        }
        if duration > self.interval {
            warn!(
                ?duration,
                interval = ?self.interval,
                "collection cycle overran the interval, next cycle is deferred"
            );
        }

        CycleReport {
            sample,
            alerts,
            duration,
        }
    }

    /// Run cycles every interval until `shutdown` turns true (or its sender
    /// is dropped). Returns the number of completed cycles.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> u64 {
        info!(interval = ?self.interval, "collection scheduler started");
        self.publish_system_info().await;

        // tokio panics on a zero period
        let mut ticker = tokio::time::interval(self.interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut shutdown) => break,
                _ = ticker.tick() => {}
            }
            self.run_cycle().await;
        }

        info!(cycles = self.cycles, "collection scheduler stopped");
        self.cycles
    }
}

async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExporterConfig, ServiceTarget};
    use crate::error::Result;
    use crate::metrics::catalog::*;
    use crate::sampler::procfs::ConnState;
    use crate::sampler::traits::*;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fixed readings; counts concurrent `cpu` calls to detect overlapping cycles.
    struct StaticHost {
        cpu: f64,
        memory: f64,
        disk: f64,
        delay: Duration,
        active: Arc<AtomicUsize>,
        max_active: Arc<AtomicUsize>,
    }

    impl StaticHost {
        fn new(cpu: f64, memory: f64, disk: f64) -> Self {
            Self {
                cpu,
                memory,
                disk,
                delay: Duration::ZERO,
                active: Arc::new(AtomicUsize::new(0)),
                max_active: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl HostSource for StaticHost {
        fn cpu(&self) -> Result<CpuReading> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(CpuReading {
                usage_percent: self.cpu,
                load_average: None,
            })
        }
        fn memory_percent(&self) -> Result<f64> {
            Ok(self.memory)
        }
        fn disk_usage(&self) -> Result<Vec<std::io::Result<MountUsage>>> {
            Ok(vec![Ok(MountUsage {
                mount_point: "/".to_string(),
                used_bytes: (self.disk * 10.0) as u64,
                total_bytes: 1000,
            })])
        }
        fn disk_io(&self) -> Result<Vec<DiskIoCounters>> {
            Ok(Vec::new())
        }
        fn network_io(&self) -> Result<Vec<InterfaceCounters>> {
            Ok(Vec::new())
        }
        fn connections(&self) -> Result<BTreeMap<ConnState, u64>> {
            Ok(BTreeMap::new())
        }
        fn processes(&self) -> Result<ProcessCensus> {
            Ok(ProcessCensus::default())
        }
        fn system_info(&self) -> Result<BTreeMap<String, String>> {
            Ok(BTreeMap::new())
        }
    }

    fn scheduler(host: StaticHost, interval: Duration) -> (Scheduler<StaticHost>, Arc<Registry>) {
        let config = ExporterConfig::default().with_services(Vec::<ServiceTarget>::new());
        let registry = Arc::new(Registry::new());
        register_all(&registry, &config.services).unwrap();

        let sampler = Sampler::new(host, Arc::clone(&registry), config.collector_timeout());
        let probe = ServiceProbe::new(Vec::new(), config.probe_timeout(), Arc::clone(&registry));
        let alerting = ThresholdAlerting::new(config.thresholds.clone(), Arc::clone(&registry));
        let scheduler = Scheduler::new(sampler, probe, alerting, Arc::clone(&registry), interval);
        (scheduler, registry)
    }

    #[tokio::test]
    async fn test_cycle_scenario() {
        let (mut scheduler, registry) =
            scheduler(StaticHost::new(92.0, 50.0, 95.0), Duration::from_secs(30));

        let report = scheduler.run_cycle().await;
        assert_eq!(report.alerts.breached, vec![ALERT_CPU, ALERT_DISK]);

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.value(ALERT_THRESHOLD_EXCEEDED, &[ALERT_CPU]), Some(1.0));
        assert_eq!(snapshot.value(ALERT_THRESHOLD_EXCEEDED, &[ALERT_DISK]), Some(1.0));
        assert_eq!(snapshot.value(ALERT_THRESHOLD_EXCEEDED, &[ALERT_MEMORY]), Some(0.0));
        assert_eq!(snapshot.value(DISK_USAGE, &["/"]), Some(95.0));
        assert_eq!(snapshot.value(COLLECTION_CYCLES, &[]), Some(1.0));
        assert_eq!(scheduler.cycles_completed(), 1);
    }

    #[tokio::test]
    async fn test_alert_counts_once_per_cycle() {
        let (mut scheduler, registry) =
            scheduler(StaticHost::new(99.0, 99.0, 99.0), Duration::from_secs(30));

        for _ in 0..3 {
            scheduler.run_cycle().await;
        }
        for metric in [ALERT_CPU, ALERT_MEMORY, ALERT_DISK] {
            assert_eq!(registry.get(ALERT_THRESHOLD_EXCEEDED, &[metric]), Some(3.0));
        }
    }

    #[tokio::test]
    async fn test_state_returns_to_idle() {
        let (mut scheduler, _registry) =
            scheduler(StaticHost::new(1.0, 1.0, 1.0), Duration::from_secs(30));
        let state = scheduler.subscribe();

        scheduler.run_cycle().await;
        assert_eq!(*state.borrow(), CycleState::Idle);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown_without_overlap() {
        let mut host = StaticHost::new(1.0, 1.0, 1.0);
        host.delay = Duration::from_millis(50);
        let max_active = Arc::clone(&host.max_active);

        // interval shorter than a cycle: cycles must still run back to back
        let (scheduler, registry) = scheduler(host, Duration::from_millis(10));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(scheduler.run(shutdown_rx));

        tokio::time::sleep(Duration::from_millis(300)).await;
        shutdown_tx.send(true).unwrap();
        let cycles = handle.await.unwrap();

        assert!(cycles >= 1);
        assert_eq!(max_active.load(Ordering::SeqCst), 1);
        assert_eq!(registry.get(COLLECTION_CYCLES, &[]), Some(cycles as f64));
    }

    #[tokio::test]
    async fn test_run_exits_when_shutdown_sender_dropped() {
        let (scheduler, _registry) =
            scheduler(StaticHost::new(1.0, 1.0, 1.0), Duration::from_secs(3600));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(scheduler.run(shutdown_rx));

        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(shutdown_tx);
        let cycles = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(cycles <= 1);
    }
}
