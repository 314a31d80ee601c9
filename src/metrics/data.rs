//! Data structures for metric identities and registry snapshots.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The kind of a registered metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Last value set, replaceable at will
    Gauge,
    /// Cumulative value, increased by non-negative deltas only
    Counter,
    /// Descriptive string fields, set once
    Info,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Gauge => "gauge",
            MetricKind::Counter => "counter",
            MetricKind::Info => "info",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a metric: name, kind and ordered label schema.
///
/// `help` is metadata only and does not take part in identity comparisons.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricDesc {
    /// Unique, stable metric name
    pub name: String,
    /// One-line description rendered as `# HELP`
    pub help: String,
    /// Metric kind
    pub kind: MetricKind,
    /// Ordered label names, empty for unlabeled metrics
    pub label_names: Vec<String>,
}

impl MetricDesc {
    pub fn new(name: impl Into<String>, help: impl Into<String>, kind: MetricKind) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            kind,
            label_names: Vec::new(),
        }
    }

    pub fn gauge(name: impl Into<String>, help: impl Into<String>) -> Self {
        Self::new(name, help, MetricKind::Gauge)
    }

    pub fn counter(name: impl Into<String>, help: impl Into<String>) -> Self {
        Self::new(name, help, MetricKind::Counter)
    }

    pub fn info(name: impl Into<String>, help: impl Into<String>) -> Self {
        Self::new(name, help, MetricKind::Info)
    }

    /// Set the label schema.
    pub fn with_labels(mut self, labels: &[&str]) -> Self {
        self.label_names = labels.iter().map(|l| l.to_string()).collect();
        self
    }

    /// Whether two descriptors describe the same identity.
    pub fn same_identity(&self, other: &MetricDesc) -> bool {
        self.name == other.name && self.kind == other.kind && self.label_names == other.label_names
    }
}

/// Value held by one series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SeriesValue {
    /// Gauge or counter value
    Number(f64),
    /// Info fields
    Info(BTreeMap<String, String>),
}

impl SeriesValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            SeriesValue::Number(value) => Some(*value),
            SeriesValue::Info(_) => None,
        }
    }
}

/// One series inside a family snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesSnapshot {
    /// Label values, in the family's label-name order
    pub label_values: Vec<String>,
    /// Current value
    pub value: SeriesValue,
}

/// Point-in-time copy of one metric and all of its series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilySnapshot {
    #[serde(flatten)]
    pub desc: MetricDesc,
    /// Series ordered by label values
    pub series: Vec<SeriesSnapshot>,
}

impl FamilySnapshot {
    /// Look up a series by its label values.
    pub fn get(&self, label_values: &[&str]) -> Option<&SeriesValue> {
        self.series
            .iter()
            .find(|s| {
                s.label_values.len() == label_values.len()
                    && s.label_values.iter().zip(label_values).all(|(a, b)| a == b)
            })
            .map(|s| &s.value)
    }
}

/// An immutable point-in-time view of the whole registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    /// When this snapshot was taken (Unix timestamp in milliseconds)
    pub timestamp: u64,
    /// Families ordered by metric name
    pub families: Vec<FamilySnapshot>,
}

impl RegistrySnapshot {
    pub fn family(&self, name: &str) -> Option<&FamilySnapshot> {
        self.families.iter().find(|f| f.desc.name == name)
    }

    /// Numeric value of one series, `None` when the metric or series is absent.
    pub fn value(&self, name: &str, label_values: &[&str]) -> Option<f64> {
        self.family(name)?.get(label_values)?.as_number()
    }

    /// Info fields of an unlabeled info metric.
    pub fn info(&self, name: &str) -> Option<&BTreeMap<String, String>> {
        match self.family(name)?.get(&[])? {
            SeriesValue::Info(fields) => Some(fields),
            SeriesValue::Number(_) => None,
        }
    }
}
