//! The dashboard view model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::alarm::{AlarmBanner, AlarmHistoryEntry, Severity};
use crate::metric::{MetricId, MetricSample};
use crate::threshold::ThresholdPair;

/// Whether the server-side metric simulator is producing samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulationState {
    #[default]
    Stopped,
    Running,
}

/// Everything the presentation layer renders.
///
/// Maps are ordered so two equal snapshots always serialize to the same
/// bytes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ViewModelSnapshot {
    pub metrics: BTreeMap<MetricId, MetricSample>,
    pub alarms: BTreeMap<MetricId, Severity>,
    pub history: Vec<AlarmHistoryEntry>,
    pub thresholds: BTreeMap<MetricId, ThresholdPair>,
    pub simulation: SimulationState,
    /// Aggregate of `alarms`, recomputed whenever `alarms` is replaced.
    pub banner: AlarmBanner,
}

impl ViewModelSnapshot {
    /// Empty snapshot used at startup.
    pub fn new() -> Self {
        Self::default()
    }

    /// True once thresholds and at least one metrics frame have arrived.
    pub fn is_populated(&self) -> bool {
        !self.thresholds.is_empty() && !self.metrics.is_empty()
    }
}
