//! Prometheus text exposition (format 0.0.4) of the registry.
//!
//! Families that have no series yet (labeled metrics nothing has written to)
//! are left out of the text. Every unlabeled family is seeded when it is
//! defined, so it is always present.

use crate::error::{ExporterError, Result};
use crate::metrics::registry::Registry;
use prometheus::{Encoder, TextEncoder};

/// `Content-Type` of the rendered text.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Encode a point-in-time view of every family.
pub fn render(registry: &Registry) -> Result<String> {
    let families = registry.gather();
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&families, &mut buffer)
        .map_err(|e| ExporterError::Exposition(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| ExporterError::Exposition(e.to_string()))
}
