//! Metric identities exported by this process.

use crate::config::ServiceTarget;
use crate::error::Result;
use crate::metrics::data::MetricDesc;
use crate::metrics::registry::Registry;
use crate::sampler::SubCollector;

pub const CPU_USAGE: &str = "custom_cpu_usage_percent";
pub const MEMORY_USAGE: &str = "custom_memory_usage_percent";
pub const DISK_USAGE: &str = "custom_disk_usage_percent";
pub const LOAD_AVERAGE: &str = "custom_load_average";

pub const NETWORK_BYTES_SENT: &str = "custom_network_bytes_sent_total";
pub const NETWORK_BYTES_RECV: &str = "custom_network_bytes_recv_total";
pub const NETWORK_CONNECTIONS: &str = "custom_network_connections_total";

pub const PROCESS_COUNT: &str = "custom_process_count_total";
pub const ZOMBIE_PROCESSES: &str = "custom_zombie_processes_total";

pub const DISK_READ_BYTES: &str = "custom_disk_read_bytes_total";
pub const DISK_WRITE_BYTES: &str = "custom_disk_write_bytes_total";
pub const DISK_IOPS: &str = "custom_disk_iops";

pub const SERVICE_AVAILABILITY: &str = "custom_service_availability";
pub const ALERT_THRESHOLD_EXCEEDED: &str = "custom_alert_threshold_exceeded_total";

pub const SYSTEM_INFO: &str = "custom_system_info";

pub const COLLECTION_CYCLES: &str = "custom_collection_cycles_total";
pub const COLLECTION_DURATION: &str = "custom_collection_duration_seconds";
pub const COLLECTOR_FAILURES: &str = "custom_collector_failures_total";
pub const HTTP_REQUESTS: &str = "custom_http_requests_total";

/// `metric` label values of the alert counter.
pub const ALERT_CPU: &str = "cpu_usage";
pub const ALERT_MEMORY: &str = "memory_usage";
pub const ALERT_DISK: &str = "disk_usage";

/// Every metric identity, in registration order.
pub fn descriptors() -> Vec<MetricDesc> {
    vec![
        MetricDesc::gauge(CPU_USAGE, "CPU utilization percentage"),
        MetricDesc::gauge(MEMORY_USAGE, "Memory utilization percentage"),
        MetricDesc::gauge(DISK_USAGE, "Filesystem utilization percentage")
            .with_labels(&["mountpoint"]),
        MetricDesc::gauge(LOAD_AVERAGE, "System load average").with_labels(&["period"]),
        MetricDesc::counter(NETWORK_BYTES_SENT, "Bytes sent per network interface")
            .with_labels(&["interface"]),
        MetricDesc::counter(NETWORK_BYTES_RECV, "Bytes received per network interface")
            .with_labels(&["interface"]),
        MetricDesc::gauge(NETWORK_CONNECTIONS, "Open network connections by state")
            .with_labels(&["state"]),
        MetricDesc::gauge(PROCESS_COUNT, "Total number of processes"),
        MetricDesc::gauge(ZOMBIE_PROCESSES, "Number of zombie processes"),
        MetricDesc::counter(DISK_READ_BYTES, "Bytes read per block device")
            .with_labels(&["device"]),
        MetricDesc::counter(DISK_WRITE_BYTES, "Bytes written per block device")
            .with_labels(&["device"]),
        MetricDesc::gauge(DISK_IOPS, "Completed disk operations per second")
            .with_labels(&["device", "operation"]),
        MetricDesc::gauge(SERVICE_AVAILABILITY, "Local TCP service availability (1 up, 0 down)")
            .with_labels(&["service"]),
        MetricDesc::counter(ALERT_THRESHOLD_EXCEEDED, "Collection cycles with a threshold breach")
            .with_labels(&["metric"]),
        MetricDesc::info(SYSTEM_INFO, "Host identity"),
        MetricDesc::counter(COLLECTION_CYCLES, "Completed collection cycles"),
        MetricDesc::gauge(COLLECTION_DURATION, "Duration of the last collection cycle"),
        MetricDesc::counter(COLLECTOR_FAILURES, "Failed sub-collector runs")
            .with_labels(&["collector"]),
        MetricDesc::counter(HTTP_REQUESTS, "HTTP requests served")
            .with_labels(&["method", "path"]),
    ]
}

/// Define every metric and seed the series whose label values are known up
/// front, so a scrape before the first cycle renders them at zero.
pub fn register_all(registry: &Registry, services: &[ServiceTarget]) -> Result<()> {
    for desc in descriptors() {
        registry.define(desc)?;
    }

    for metric in [ALERT_CPU, ALERT_MEMORY, ALERT_DISK] {
        registry.increment_counter(ALERT_THRESHOLD_EXCEEDED, &[metric], 0.0)?;
    }

    for collector in SubCollector::ALL {
        registry.increment_counter(COLLECTOR_FAILURES, &[collector.name()], 0.0)?;
    }

    for service in services {
        registry.set_gauge(SERVICE_AVAILABILITY, &[&service.name], 0.0)?;
    }

    Ok(())
}
