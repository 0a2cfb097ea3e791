//! Translation of user intents into outbound commands.

use alarmdeck_core::messages::{OutboundCommand, SimulationAction};
use alarmdeck_core::metric::MetricId;
use alarmdeck_core::threshold::{validate_unit_range, ThresholdInput};

/// Spike height used when the user does not pick one.
pub const DEFAULT_SPIKE_MAGNITUDE: f64 = 0.9;

/// Something the user asked the dashboard to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    StartSimulation,
    StopSimulation,
    /// Push `metric` to `magnitude` of its maximum.
    TriggerSpike {
        metric: MetricId,
        magnitude: f64,
    },
    ClearAlarms,
    /// Every threshold row as currently typed.
    EditThresholds(Vec<ThresholdInput>),
    RequestConfig,
}

/// Map one intent onto the commands it sends.
///
/// Input faults never fail the whole intent: a spike outside `[0, 1]`
/// produces nothing, and threshold rows that do not parse are skipped
/// while the remaining rows are still sent.
pub fn dispatch(intent: &Intent) -> Vec<OutboundCommand> {
    match intent {
        Intent::StartSimulation => vec![OutboundCommand::SimulationControl {
            action: SimulationAction::Start,
        }],
        Intent::StopSimulation => vec![OutboundCommand::SimulationControl {
            action: SimulationAction::Stop,
        }],
        Intent::TriggerSpike { metric, magnitude } => {
            match validate_unit_range(*magnitude, "spike magnitude") {
                Ok(()) => vec![OutboundCommand::SimulateSpike {
                    metric: *metric,
                    magnitude: *magnitude,
                }],
                Err(e) => {
                    tracing::warn!(%metric, error = %e, "Skipping spike request");
                    Vec::new()
                }
            }
        }
        Intent::ClearAlarms => vec![OutboundCommand::ClearAlarms],
        Intent::EditThresholds(rows) => rows
            .iter()
            .filter_map(|row| match row.parse() {
                Ok(pair) => Some(OutboundCommand::ThresholdUpdate {
                    metric: row.metric,
                    warning: pair.warning,
                    critical: pair.critical,
                }),
                Err(e) => {
                    tracing::warn!(metric = %row.metric, error = %e, "Skipping threshold row");
                    None
                }
            })
            .collect(),
        Intent::RequestConfig => vec![OutboundCommand::GetConfig],
    }
}
