//! Metric model, registry and text exposition.
//!
//! The [`Registry`] is the single source of truth: collectors write into it,
//! the exposition endpoint encodes [`Registry::gather`] on every scrape.

pub mod catalog;
pub mod data;
pub mod exposition;
pub mod registry;

// Re-export commonly used items
pub use data::{MetricDesc, MetricKind, RegistrySnapshot, SeriesValue};
pub use registry::Registry;
