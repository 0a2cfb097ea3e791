//! Monitored metric identifiers and samples.
//!
//! The set of metrics is fixed at build time. Inbound frames may name
//! metrics this client does not know; those entries are dropped by the
//! codec via [`MetricId::from_str`](std::str::FromStr) rather than failing
//! the whole frame.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Wire name for the CPU utilisation metric.
pub const METRIC_CPU: &str = "cpu";

/// Wire name for the memory utilisation metric.
pub const METRIC_MEMORY: &str = "memory";

/// Wire name for the network bandwidth metric.
pub const METRIC_BANDWIDTH: &str = "bandwidth";

/// Wire name for the network latency metric.
pub const METRIC_LATENCY: &str = "latency";

/// A monitored metric.
///
/// Declaration order is the display order used by maps keyed on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricId {
    Cpu,
    Memory,
    Bandwidth,
    Latency,
}

impl MetricId {
    /// Every known metric, in display order.
    pub const ALL: [MetricId; 4] = [
        MetricId::Cpu,
        MetricId::Memory,
        MetricId::Bandwidth,
        MetricId::Latency,
    ];

    /// Wire name, e.g. `"cpu"`.
    pub fn as_str(self) -> &'static str {
        match self {
            MetricId::Cpu => METRIC_CPU,
            MetricId::Memory => METRIC_MEMORY,
            MetricId::Bandwidth => METRIC_BANDWIDTH,
            MetricId::Latency => METRIC_LATENCY,
        }
    }

    /// Capitalised name used in alarm banners, e.g. `"Cpu"`.
    pub fn label(self) -> &'static str {
        match self {
            MetricId::Cpu => "Cpu",
            MetricId::Memory => "Memory",
            MetricId::Bandwidth => "Bandwidth",
            MetricId::Latency => "Latency",
        }
    }

    /// Display unit used when the frame does not carry one.
    pub fn unit(self) -> &'static str {
        match self {
            MetricId::Cpu | MetricId::Memory => "%",
            MetricId::Bandwidth => "Mbps",
            MetricId::Latency => "ms",
        }
    }

    /// Value that maps to a full gauge.
    pub fn full_scale(self) -> f64 {
        match self {
            MetricId::Cpu | MetricId::Memory => 100.0,
            MetricId::Bandwidth => 1000.0,
            MetricId::Latency => 500.0,
        }
    }
}

impl fmt::Display for MetricId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a wire name does not match any known metric.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown metric: {0}")]
pub struct UnknownMetric(pub String);

impl FromStr for MetricId {
    type Err = UnknownMetric;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            METRIC_CPU => Ok(MetricId::Cpu),
            METRIC_MEMORY => Ok(MetricId::Memory),
            METRIC_BANDWIDTH => Ok(MetricId::Bandwidth),
            METRIC_LATENCY => Ok(MetricId::Latency),
            other => Err(UnknownMetric(other.to_string())),
        }
    }
}

/// The latest observed value of one metric.
///
/// Samples are never merged: a newer sample for the same metric replaces
/// the previous one outright.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSample {
    pub metric: MetricId,
    pub value: f64,
    pub unit: String,
}

impl MetricSample {
    /// Build a sample, falling back to the metric's default unit.
    pub fn new(metric: MetricId, value: f64, unit: Option<String>) -> Self {
        let unit = unit
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| metric.unit().to_string());
        Self {
            metric,
            value,
            unit,
        }
    }

    /// Formatted value with one decimal, e.g. `"45.3%"` or `"512.0 Mbps"`.
    pub fn display_value(&self) -> String {
        if self.unit == "%" {
            format!("{:.1}%", self.value)
        } else {
            format!("{:.1} {}", self.value, self.unit)
        }
    }

    /// Share of the metric's full scale, in percent.
    pub fn gauge_percent(&self) -> f64 {
        self.value / self.metric.full_scale() * 100.0
    }
}
