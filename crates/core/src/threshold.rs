//! Threshold pairs and parsing of user-edited threshold rows.
//!
//! `warning < critical` is expected but not checked here; the server owns
//! that rule.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::metric::MetricId;

/// Warning and critical levels for one metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdPair {
    pub warning: f64,
    pub critical: f64,
}

/// Raw text of one threshold row as typed by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThresholdInput {
    pub metric: MetricId,
    pub warning: String,
    pub critical: String,
}

impl ThresholdInput {
    pub fn new(metric: MetricId, warning: impl Into<String>, critical: impl Into<String>) -> Self {
        Self {
            metric,
            warning: warning.into(),
            critical: critical.into(),
        }
    }

    /// Parse both fields. Either one empty or non-numeric fails the row.
    pub fn parse(&self) -> Result<ThresholdPair, CoreError> {
        Ok(ThresholdPair {
            warning: parse_level(&self.warning, self.metric, "warning")?,
            critical: parse_level(&self.critical, self.metric, "critical")?,
        })
    }
}

fn parse_level(raw: &str, metric: MetricId, name: &str) -> Result<f64, CoreError> {
    let value: f64 = raw.trim().parse().map_err(|_| {
        CoreError::Validation(format!("{metric} {name} must be numeric, got {raw:?}"))
    })?;
    if !value.is_finite() {
        return Err(CoreError::Validation(format!(
            "{metric} {name} must be finite, got {raw:?}"
        )));
    }
    Ok(value)
}

/// Validate that a value falls within `[0.0, 1.0]`.
///
/// Returns a `CoreError::Validation` naming the field if out of range.
pub fn validate_unit_range(value: f64, name: &str) -> Result<(), CoreError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(CoreError::Validation(format!(
            "{name} must be between 0.0 and 1.0, got {value}"
        )));
    }
    Ok(())
}
