//! Line-oriented presenter used by the `alarmdeck` binary.
//!
//! Turns stdin lines into session requests and committed snapshots into
//! text. It only ever reads snapshots; all state lives in the session.

use alarmdeck_core::metric::MetricId;
use alarmdeck_core::snapshot::{SimulationState, ViewModelSnapshot};
use alarmdeck_core::threshold::ThresholdInput;

use crate::session::SessionHandle;

pub const HELP: &str = "\
commands:
  start | stop                         start/stop the simulator
  spike <metric> [fraction]            spike a metric (fraction of max)
  clear                                clear alarms
  threshold <metric> <warn> <crit>     edit one threshold
  thresholds <metric>=<warn>,<crit>... edit several thresholds at once
  config                               reload thresholds from the server
  sound on|off                         toggle the audible alert
  quit";

/// Shown in place of the last alarm while the history list is empty.
pub const NO_HISTORY_LABEL: &str = "No alarm history";

/// One parsed console line.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    StartSimulation,
    StopSimulation,
    Spike {
        metric: MetricId,
        magnitude: Option<f64>,
    },
    ClearAlarms,
    Thresholds(Vec<ThresholdInput>),
    RequestConfig,
    Sound(bool),
    Help,
    Quit,
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ConsoleError {
    #[error("unknown command `{0}` (try `help`)")]
    UnknownCommand(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error(transparent)]
    UnknownMetric(#[from] alarmdeck_core::metric::UnknownMetric),
}

/// Parse one line. Blank lines yield `Ok(None)`.
///
/// Threshold values are passed through as typed so that non-numeric rows
/// are skipped by the dispatcher like any other input fault.
pub fn parse_line(line: &str) -> Result<Option<ConsoleCommand>, ConsoleError> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let command = match (verb, args.as_slice()) {
        ("start", []) => ConsoleCommand::StartSimulation,
        ("stop", []) => ConsoleCommand::StopSimulation,
        ("clear", []) => ConsoleCommand::ClearAlarms,
        ("config", []) => ConsoleCommand::RequestConfig,
        ("help", _) => ConsoleCommand::Help,
        ("quit" | "exit", []) => ConsoleCommand::Quit,
        ("sound", ["on"]) => ConsoleCommand::Sound(true),
        ("sound", ["off"]) => ConsoleCommand::Sound(false),
        ("sound", _) => return Err(ConsoleError::Usage("sound on|off")),
        ("spike", [metric]) => ConsoleCommand::Spike {
            metric: metric.parse()?,
            magnitude: None,
        },
        ("spike", [metric, fraction]) => ConsoleCommand::Spike {
            metric: metric.parse()?,
            magnitude: Some(
                fraction
                    .parse()
                    .map_err(|_| ConsoleError::Usage("spike <metric> [fraction]"))?,
            ),
        },
        ("spike", _) => return Err(ConsoleError::Usage("spike <metric> [fraction]")),
        ("threshold", [metric, warning, critical]) => ConsoleCommand::Thresholds(vec![
            ThresholdInput::new(metric.parse()?, *warning, *critical),
        ]),
        ("threshold", _) => return Err(ConsoleError::Usage("threshold <metric> <warn> <crit>")),
        ("thresholds", rows) if !rows.is_empty() => ConsoleCommand::Thresholds(
            rows.iter()
                .map(|row| parse_threshold_row(row))
                .collect::<Result<_, _>>()?,
        ),
        ("thresholds", _) => {
            return Err(ConsoleError::Usage("thresholds <metric>=<warn>,<crit>..."))
        }
        (other, _) => return Err(ConsoleError::UnknownCommand(other.to_string())),
    };

    Ok(Some(command))
}

fn parse_threshold_row(row: &str) -> Result<ThresholdInput, ConsoleError> {
    let usage = ConsoleError::Usage("thresholds <metric>=<warn>,<crit>...");
    let (metric, levels) = row.split_once('=').ok_or(usage.clone())?;
    let (warning, critical) = levels.split_once(',').ok_or(usage)?;
    Ok(ThresholdInput::new(metric.parse()?, warning, critical))
}

/// Forward a parsed command to the session. Returns `false` on quit.
pub fn apply(handle: &SessionHandle, command: ConsoleCommand) -> bool {
    match command {
        ConsoleCommand::StartSimulation => handle.start_simulation(),
        ConsoleCommand::StopSimulation => handle.stop_simulation(),
        ConsoleCommand::Spike {
            metric,
            magnitude: Some(magnitude),
        } => handle.trigger_spike_at(metric, magnitude),
        ConsoleCommand::Spike {
            metric,
            magnitude: None,
        } => handle.trigger_spike(metric),
        ConsoleCommand::ClearAlarms => handle.clear_alarms(),
        ConsoleCommand::Thresholds(rows) => handle.update_thresholds(rows),
        ConsoleCommand::RequestConfig => handle.request_config(),
        ConsoleCommand::Sound(enabled) => handle.set_sound_enabled(enabled),
        ConsoleCommand::Help => println!("{HELP}"),
        ConsoleCommand::Quit => return false,
    }
    true
}

/// Render a snapshot as display lines.
pub fn render(snapshot: &ViewModelSnapshot) -> Vec<String> {
    let mut lines = Vec::with_capacity(MetricId::ALL.len() + 2);

    let simulation = match snapshot.simulation {
        SimulationState::Running => "running",
        SimulationState::Stopped => "stopped",
    };
    lines.push(format!(
        "alarms: {} | simulation: {simulation}",
        snapshot.banner.label()
    ));

    for metric in MetricId::ALL {
        let value = snapshot
            .metrics
            .get(&metric)
            .map(|s| format!("{:>11} ({:>5.1}%)", s.display_value(), s.gauge_percent()))
            .unwrap_or_else(|| format!("{:>11}", "--"));
        let severity = snapshot.alarms.get(&metric).copied().unwrap_or_default();
        let limits = snapshot
            .thresholds
            .get(&metric)
            .map(|t| format!("warn {} / crit {}", t.warning, t.critical))
            .unwrap_or_default();
        lines.push(format!(
            "  {:<10}{value}  {:<8}  {limits}",
            metric.label(),
            severity.as_str()
        ));
    }

    match snapshot.history.first() {
        Some(latest) => {
            lines.push(format!("  last alarm: {} {}", latest.timestamp, latest.message));
        }
        None => lines.push(format!("  {NO_HISTORY_LABEL}")),
    }

    lines
}
