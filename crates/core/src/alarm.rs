//! Alarm severities, history entries, and the overall alarm banner.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::metric::MetricId;

/// Banner text shown when no metric is in alarm.
pub const NO_ALARMS_LABEL: &str = "No Alarms";

/// Per-metric alarm level, ordered `Normal < Warning < Critical`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Normal,
    Warning,
    Critical,
}

impl Severity {
    /// Wire name of the level.
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Normal => "normal",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of the server-maintained alarm history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmHistoryEntry {
    #[serde(default)]
    pub timestamp: String,
    #[serde(default, alias = "status")]
    pub severity: Severity,
    #[serde(default)]
    pub message: String,
    /// Metric the entry refers to, kept verbatim since history may name
    /// metrics this client does not monitor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric: Option<String>,
}

/// Aggregate alarm state derived from the per-metric alarm map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AlarmBanner {
    /// Highest severity present across all metrics.
    pub severity: Severity,
    /// Every metric not at `Normal`, in metric display order.
    pub active: Vec<(MetricId, Severity)>,
}

impl AlarmBanner {
    /// Metrics sitting at the aggregate severity. Empty when normal.
    pub fn contributors(&self) -> Vec<MetricId> {
        self.active
            .iter()
            .filter(|(_, severity)| *severity == self.severity)
            .map(|(metric, _)| *metric)
            .collect()
    }

    /// Banner text, e.g. `"Cpu: CRITICAL, Memory: WARNING"`.
    pub fn label(&self) -> String {
        if self.severity == Severity::Normal {
            return NO_ALARMS_LABEL.to_string();
        }
        self.active
            .iter()
            .map(|(metric, severity)| {
                format!("{}: {}", metric.label(), severity.as_str().to_uppercase())
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Fold the per-metric alarm map into one banner.
///
/// An empty map, or one where every entry is normal, yields a normal
/// banner with no listed metrics.
pub fn aggregate(alarms: &BTreeMap<MetricId, Severity>) -> AlarmBanner {
    let active: Vec<(MetricId, Severity)> = alarms
        .iter()
        .filter(|(_, severity)| **severity != Severity::Normal)
        .map(|(metric, severity)| (*metric, *severity))
        .collect();

    let severity = active
        .iter()
        .map(|(_, severity)| *severity)
        .max()
        .unwrap_or_default();

    AlarmBanner { severity, active }
}

/// Whether the audible alert should play for this banner.
///
/// This is a level check, not an edge check: it returns `true` every time
/// it is asked while the banner stays critical.
pub fn should_sound(banner: &AlarmBanner, sound_enabled: bool) -> bool {
    sound_enabled && banner.severity == Severity::Critical
}
