//! Dashboard WebSocket message types and codec.
//!
//! The telemetry server sends JSON frames shaped `{"type": "<kind>",
//! "data": {...}}`, or `{"status": "<string>"}` for bare acknowledgments.
//! [`decode`] turns them into a typed [`InboundEvent`]; [`encode`] turns
//! an [`OutboundCommand`] into `{"type": "<command>", ...payload}`.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::alarm::{AlarmHistoryEntry, Severity};
use crate::error::CoreError;
use crate::metric::{MetricId, MetricSample};
use crate::snapshot::SimulationState;
use crate::threshold::ThresholdPair;

pub const MSG_TYPE_METRICS_UPDATE: &str = "metrics_update";
pub const MSG_TYPE_ALARM_UPDATE: &str = "alarm_update";
pub const MSG_TYPE_CONFIG: &str = "config";
pub const MSG_TYPE_THRESHOLDS: &str = "thresholds";
pub const MSG_TYPE_SIMULATION_CONTROL: &str = "simulation_control";
pub const MSG_TYPE_ERROR: &str = "error";

/// Command kinds the server echoes back as `{"success": bool}` responses.
pub const MSG_TYPE_THRESHOLD_UPDATE: &str = "threshold_update";
pub const MSG_TYPE_CLEAR_ALARMS: &str = "clear_alarms";
pub const MSG_TYPE_SIMULATE_SPIKE: &str = "simulate_spike";

/// Bare status strings that carry simulation state.
pub const STATUS_SIMULATION_STARTED: &str = "simulation_started";
pub const STATUS_SIMULATION_STOPPED: &str = "simulation_stopped";

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// A decoded inbound frame.
///
/// Metric-keyed maps only contain metrics this client knows about.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// Latest samples for some or all metrics.
    MetricsUpdate(BTreeMap<MetricId, MetricSample>),

    /// Full alarm status map plus the server's current history list.
    AlarmUpdate {
        alarms: BTreeMap<MetricId, Severity>,
        history: Vec<AlarmHistoryEntry>,
    },

    /// Full threshold set (`config` or `thresholds` frames).
    Thresholds(BTreeMap<MetricId, ThresholdPair>),

    /// Simulation running state.
    Simulation(SimulationState),

    /// Bare `{"status": ...}` acknowledgment.
    Status(String),

    /// Server response to a command we sent.
    Acknowledged { command: String, success: bool },

    /// Protocol fault reported by the server.
    Error { message: String },

    /// A well-formed frame of a kind this client does not handle.
    Unrecognized { kind: String },
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    data: Value,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MetricValue {
    value: f64,
    #[serde(default)]
    unit: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AlarmData {
    alarms: BTreeMap<String, Value>,
    history: Vec<AlarmHistoryEntry>,
}

/// An alarm map entry: either a bare level or the server's alarm record.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AlarmField {
    Level(Severity),
    Record {
        #[serde(alias = "status")]
        severity: Severity,
    },
}

impl AlarmField {
    fn severity(self) -> Severity {
        match self {
            AlarmField::Level(severity) | AlarmField::Record { severity } => severity,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ThresholdData {
    thresholds: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct SimulationData {
    status: SimulationState,
}

#[derive(Debug, Deserialize)]
struct ErrorData {
    message: String,
}

#[derive(Debug, Deserialize)]
struct AckData {
    success: bool,
}

/// Parse an inbound text frame.
///
/// Returns `Err` for malformed JSON, a frame with neither `type` nor
/// `status`, or a recognised kind whose payload is missing required
/// fields. Unknown kinds are not an error; they decode to
/// [`InboundEvent::Unrecognized`].
pub fn decode(text: &str) -> Result<InboundEvent, CoreError> {
    let envelope: Envelope = serde_json::from_str(text)?;

    let Some(kind) = envelope.kind else {
        return envelope
            .status
            .map(InboundEvent::Status)
            .ok_or(CoreError::MissingKind);
    };

    let event = match kind.as_str() {
        MSG_TYPE_METRICS_UPDATE => {
            let raw: BTreeMap<String, Value> = payload(&kind, envelope.data)?;
            let samples = known_entries::<MetricValue>(&kind, raw)?
                .into_iter()
                .map(|(metric, v)| (metric, MetricSample::new(metric, v.value, v.unit)))
                .collect();
            InboundEvent::MetricsUpdate(samples)
        }
        MSG_TYPE_ALARM_UPDATE => {
            let data: AlarmData = payload(&kind, envelope.data)?;
            let alarms = known_entries::<AlarmField>(&kind, data.alarms)?
                .into_iter()
                .map(|(metric, field)| (metric, field.severity()))
                .collect();
            InboundEvent::AlarmUpdate {
                alarms,
                history: data.history,
            }
        }
        MSG_TYPE_CONFIG | MSG_TYPE_THRESHOLDS => {
            let data: ThresholdData = payload(&kind, envelope.data)?;
            InboundEvent::Thresholds(known_entries(&kind, data.thresholds)?)
        }
        MSG_TYPE_SIMULATION_CONTROL => {
            let data: SimulationData = payload(&kind, envelope.data)?;
            InboundEvent::Simulation(data.status)
        }
        MSG_TYPE_ERROR => {
            let data: ErrorData = payload(&kind, envelope.data)?;
            InboundEvent::Error {
                message: data.message,
            }
        }
        MSG_TYPE_THRESHOLD_UPDATE | MSG_TYPE_CLEAR_ALARMS | MSG_TYPE_SIMULATE_SPIKE => {
            let data: AckData = payload(&kind, envelope.data)?;
            InboundEvent::Acknowledged {
                command: kind.clone(),
                success: data.success,
            }
        }
        _ => InboundEvent::Unrecognized { kind: kind.clone() },
    };

    Ok(event)
}

fn payload<T: DeserializeOwned>(kind: &str, data: Value) -> Result<T, CoreError> {
    serde_json::from_value(data).map_err(|source| CoreError::InvalidPayload {
        kind: kind.to_string(),
        source,
    })
}

/// Keep only entries keyed by a known metric, then type them.
///
/// Entries for unknown metrics are skipped before their values are looked
/// at, so a server adding a metric with a new value shape still decodes.
fn known_entries<T: DeserializeOwned>(
    kind: &str,
    raw: BTreeMap<String, Value>,
) -> Result<BTreeMap<MetricId, T>, CoreError> {
    raw.into_iter()
        .filter_map(|(name, value)| name.parse::<MetricId>().ok().map(|m| (m, value)))
        .map(|(metric, value)| Ok((metric, payload(kind, value)?)))
        .collect()
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// Simulation start/stop action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulationAction {
    Start,
    Stop,
}

/// A command sent to the telemetry server.
///
/// The command name travels in `type`; payload fields sit beside it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundCommand {
    GetConfig,
    SimulationControl {
        action: SimulationAction,
    },
    SimulateSpike {
        metric: MetricId,
        /// Fraction of the metric's maximum, in `[0.0, 1.0]`.
        #[serde(rename = "percentage")]
        magnitude: f64,
    },
    ClearAlarms,
    ThresholdUpdate {
        metric: MetricId,
        warning: f64,
        critical: f64,
    },
}

impl OutboundCommand {
    /// Wire name of the command.
    pub fn name(&self) -> &'static str {
        match self {
            OutboundCommand::GetConfig => "get_config",
            OutboundCommand::SimulationControl { .. } => MSG_TYPE_SIMULATION_CONTROL,
            OutboundCommand::SimulateSpike { .. } => MSG_TYPE_SIMULATE_SPIKE,
            OutboundCommand::ClearAlarms => MSG_TYPE_CLEAR_ALARMS,
            OutboundCommand::ThresholdUpdate { .. } => MSG_TYPE_THRESHOLD_UPDATE,
        }
    }
}

/// Serialize a command into one text frame.
pub fn encode(command: &OutboundCommand) -> Result<String, CoreError> {
    Ok(serde_json::to_string(command)?)
}
