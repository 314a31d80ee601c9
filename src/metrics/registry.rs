//! Process-wide store of typed, labeled metrics.
//!
//! Every family is backed by a `prometheus` vector registered in a private
//! `prometheus::Registry`. This type layers the exporter's contract on top:
//! identities are fixed at definition time, writes are checked against the
//! family's kind and label schema, and counters only ever move forward.
//!
//! The scheduler (one writer sequence at a time) and the exposition endpoint
//! (many concurrent readers) share it. A registry-wide `RwLock` makes
//! [`Registry::snapshot`] and [`Registry::gather`] point-in-time views: they
//! hold the read lock only while copying values out.

use crate::error::{ExporterError, Result};
use crate::metrics::data::{
    FamilySnapshot, MetricDesc, MetricKind, RegistrySnapshot, SeriesSnapshot, SeriesValue,
};
use prometheus::proto::MetricFamily;
use prometheus::{CounterVec, GaugeVec, Opts};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{SystemTime, UNIX_EPOCH};

enum Handle {
    Gauge(GaugeVec),
    Counter(CounterVec),
    /// Exposed as `<name>_info`; rebuilt whenever the field names change
    Info(GaugeVec),
}

struct Family {
    desc: MetricDesc,
    handle: Handle,
    /// Label values of every live series
    series: BTreeSet<Vec<String>>,
    /// Info fields per series, info families only
    info: BTreeMap<Vec<String>, BTreeMap<String, String>>,
}

struct Inner {
    backend: prometheus::Registry,
    families: BTreeMap<String, Family>,
}

/// Thread-safe metric registry, shared as `Arc<Registry>`.
pub struct Registry {
    inner: RwLock<Inner>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                backend: prometheus::Registry::new(),
                families: BTreeMap::new(),
            }),
        }
    }

    // A writer that panicked mid-update left at most one series half-written;
    // the family map itself is still consistent.
    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a metric identity.
    ///
    /// Re-registering an identical identity is a no-op. Unlabeled gauges and
    /// counters get a zero-valued series immediately and unlabeled info metrics
    /// get an empty field set, so a scrape before the first cycle sees them.
    pub fn define(&self, desc: MetricDesc) -> Result<()> {
        let mut inner = self.write();

        if let Some(existing) = inner.families.get(&desc.name) {
            if existing.desc.same_identity(&desc) {
                return Ok(());
            }
            return Err(ExporterError::DuplicateMetric { name: desc.name });
        }

        let labels: Vec<&str> = desc.label_names.iter().map(String::as_str).collect();
        let handle = match desc.kind {
            MetricKind::Gauge => Handle::Gauge(
                GaugeVec::new(Opts::new(desc.name.as_str(), desc.help.as_str()), &labels)
                    .map_err(|e| ExporterError::invalid_metric(&desc.name, e))?,
            ),
            MetricKind::Counter => Handle::Counter(
                CounterVec::new(Opts::new(desc.name.as_str(), desc.help.as_str()), &labels)
                    .map_err(|e| ExporterError::invalid_metric(&desc.name, e))?,
            ),
            MetricKind::Info => Handle::Info(info_vec(&desc, &[])?),
        };
        register(&inner.backend, &desc.name, &handle)?;

        let mut family = Family {
            desc,
            handle,
            series: BTreeSet::new(),
            info: BTreeMap::new(),
        };
        if family.desc.label_names.is_empty() {
            match family.desc.kind {
                MetricKind::Gauge | MetricKind::Counter => {
                    family.touch(&[])?;
                }
                MetricKind::Info => family.replace_info(&inner.backend, &[], BTreeMap::new())?,
            }
        }

        tracing::debug!(metric = %family.desc.name, kind = %family.desc.kind, "defined metric");
        inner.families.insert(family.desc.name.clone(), family);
        Ok(())
    }

    /// Replace the value of a gauge series.
    pub fn set_gauge(&self, name: &str, labels: &[&str], value: f64) -> Result<()> {
        let mut inner = self.write();
        let family = lookup(
            &mut inner.families,
            name,
            labels,
            MetricKind::Gauge,
            "set a gauge value",
        )?;
        if let Handle::Gauge(vec) = &family.handle {
            vec.get_metric_with_label_values(labels)
                .map_err(|e| ExporterError::invalid_metric(name, e))?
                .set(value);
        }
        family.series.insert(owned_labels(labels));
        Ok(())
    }

    /// Add a non-negative delta to a counter series, creating it at zero first
    /// if it does not exist yet.
    pub fn increment_counter(&self, name: &str, labels: &[&str], delta: f64) -> Result<()> {
        if !delta.is_finite() || delta < 0.0 {
            return Err(ExporterError::NegativeDelta {
                name: name.to_string(),
                delta,
            });
        }

        let mut inner = self.write();
        let family = lookup(
            &mut inner.families,
            name,
            labels,
            MetricKind::Counter,
            "increment",
        )?;
        if let Handle::Counter(vec) = &family.handle {
            vec.get_metric_with_label_values(labels)
                .map_err(|e| ExporterError::invalid_metric(name, e))?
                .inc_by(delta);
        }
        family.series.insert(owned_labels(labels));
        Ok(())
    }

    /// Set the descriptive fields of an info series.
    ///
    /// Field names become labels of `<name>_info`. Series of the same family
    /// whose field names differ from `fields` are dropped.
    pub fn set_info(
        &self,
        name: &str,
        labels: &[&str],
        fields: BTreeMap<String, String>,
    ) -> Result<()> {
        let mut inner = self.write();
        let Inner { backend, families } = &mut *inner;
        let family = lookup(families, name, labels, MetricKind::Info, "set info fields")?;
        family.replace_info(backend, labels, fields)
    }

    /// Drop one series of any kind. Returns whether it existed.
    ///
    /// Only for series whose source went away or reset; every other series
    /// lives as long as the process.
    pub fn remove_series(&self, name: &str, labels: &[&str]) -> Result<bool> {
        let mut inner = self.write();
        let family = inner
            .families
            .get_mut(name)
            .ok_or_else(|| ExporterError::UnknownMetric {
                name: name.to_string(),
            })?;
        check_labels(family, name, labels)?;

        let key = owned_labels(labels);
        if !family.series.remove(&key) {
            return Ok(false);
        }

        let removed = match &family.handle {
            Handle::Gauge(vec) => vec.remove_label_values(labels),
            Handle::Counter(vec) => vec.remove_label_values(labels),
            Handle::Info(vec) => {
                let fields = family.info.remove(&key).unwrap_or_default();
                let values: Vec<&str> = labels
                    .iter()
                    .copied()
                    .chain(fields.values().map(String::as_str))
                    .collect();
                vec.remove_label_values(&values)
            }
        };
        removed.map_err(|e| ExporterError::invalid_metric(name, e))?;
        Ok(true)
    }

    /// Current numeric value of one series.
    pub fn get(&self, name: &str, labels: &[&str]) -> Option<f64> {
        let inner = self.read();
        let family = inner.families.get(name)?;
        if !family.series.contains(&owned_labels(labels)) {
            return None;
        }
        family.value(labels)?.as_number()
    }

    /// Copy every family and series into an immutable snapshot.
    pub fn snapshot(&self) -> RegistrySnapshot {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;

        let inner = self.read();
        let families = inner
            .families
            .values()
            .map(|family| FamilySnapshot {
                desc: family.desc.clone(),
                series: family
                    .series
                    .iter()
                    .filter_map(|label_values| {
                        let labels: Vec<&str> = label_values.iter().map(String::as_str).collect();
                        Some(SeriesSnapshot {
                            label_values: label_values.clone(),
                            value: family.value(&labels)?,
                        })
                    })
                    .collect(),
            })
            .collect();

        RegistrySnapshot {
            timestamp,
            families,
        }
    }

    /// Collect every non-empty family for text encoding.
    pub fn gather(&self) -> Vec<MetricFamily> {
        self.read().backend.gather()
    }
}

impl Family {
    /// Make sure the series exists without changing its value.
    fn touch(&mut self, labels: &[&str]) -> Result<()> {
        let created = match &self.handle {
            Handle::Gauge(vec) => vec.get_metric_with_label_values(labels).map(|_| ()),
            Handle::Counter(vec) => vec.get_metric_with_label_values(labels).map(|_| ()),
            Handle::Info(_) => Ok(()),
        };
        created.map_err(|e| ExporterError::invalid_metric(&self.desc.name, e))?;
        self.series.insert(owned_labels(labels));
        Ok(())
    }

    fn value(&self, labels: &[&str]) -> Option<SeriesValue> {
        match &self.handle {
            Handle::Gauge(vec) => vec
                .get_metric_with_label_values(labels)
                .ok()
                .map(|gauge| SeriesValue::Number(gauge.get())),
            Handle::Counter(vec) => vec
                .get_metric_with_label_values(labels)
                .ok()
                .map(|counter| SeriesValue::Number(counter.get())),
            Handle::Info(_) => self
                .info
                .get(&owned_labels(labels))
                .cloned()
                .map(SeriesValue::Info),
        }
    }

    /// Store `fields` for one info series and rebuild the backing vector so
    /// its label names are the schema labels followed by the field names.
    fn replace_info(
        &mut self,
        backend: &prometheus::Registry,
        labels: &[&str],
        fields: BTreeMap<String, String>,
    ) -> Result<()> {
        let field_names: Vec<&str> = fields.keys().map(String::as_str).collect();
        let rebuilt = info_vec(&self.desc, &field_names)?;

        let key = owned_labels(labels);
        self.info
            .retain(|existing, other| existing == &key || other.keys().eq(fields.keys()));
        self.info.insert(key, fields.clone());
        self.series = self.info.keys().cloned().collect();

        for (label_values, fields) in &self.info {
            let values: Vec<&str> = label_values
                .iter()
                .map(String::as_str)
                .chain(fields.values().map(String::as_str))
                .collect();
            rebuilt
                .get_metric_with_label_values(&values)
                .map_err(|e| ExporterError::invalid_metric(&self.desc.name, e))?
                .set(1.0);
        }

        if let Handle::Info(previous) = &self.handle {
            // Absent on the first call from `define`.
            let _ = backend.unregister(Box::new(previous.clone()));
        }
        backend
            .register(Box::new(rebuilt.clone()))
            .map_err(|e| ExporterError::invalid_metric(&self.desc.name, e))?;
        self.handle = Handle::Info(rebuilt);
        Ok(())
    }
}

fn info_vec(desc: &MetricDesc, field_names: &[&str]) -> Result<GaugeVec> {
    let labels: Vec<&str> = desc
        .label_names
        .iter()
        .map(String::as_str)
        .chain(field_names.iter().copied())
        .collect();
    GaugeVec::new(
        Opts::new(format!("{}_info", desc.name), desc.help.as_str()),
        &labels,
    )
    .map_err(|e| ExporterError::invalid_metric(&desc.name, e))
}

fn register(backend: &prometheus::Registry, name: &str, handle: &Handle) -> Result<()> {
    let registered = match handle {
        Handle::Gauge(vec) => backend.register(Box::new(vec.clone())),
        Handle::Counter(vec) => backend.register(Box::new(vec.clone())),
        // registered by `replace_info` once the field names are known
        Handle::Info(_) => Ok(()),
    };
    registered.map_err(|e| ExporterError::invalid_metric(name, e))
}

fn lookup<'a>(
    families: &'a mut BTreeMap<String, Family>,
    name: &str,
    labels: &[&str],
    kind: MetricKind,
    operation: &'static str,
) -> Result<&'a mut Family> {
    let family = families
        .get_mut(name)
        .ok_or_else(|| ExporterError::UnknownMetric {
            name: name.to_string(),
        })?;

    if family.desc.kind != kind {
        return Err(ExporterError::KindMismatch {
            name: name.to_string(),
            kind: family.desc.kind.as_str(),
            operation,
        });
    }

    check_labels(family, name, labels)?;
    Ok(family)
}

fn check_labels(family: &Family, name: &str, labels: &[&str]) -> Result<()> {
    if family.desc.label_names.len() != labels.len() {
        return Err(ExporterError::LabelMismatch {
            name: name.to_string(),
            expected: family.desc.label_names.len(),
            got: labels.len(),
        });
    }
    Ok(())
}

fn owned_labels(labels: &[&str]) -> Vec<String> {
    labels.iter().map(|l| l.to_string()).collect()
}
