//! Folding inbound events into the view model.
//!
//! [`reconcile`] is pure. Every event kind replaces state rather than
//! accumulating it, so applying the same event twice leaves the snapshot
//! as applying it once did. [`Reconciler`] owns the live snapshot and
//! adds the audible-alert decision on top.

use crate::alarm::{aggregate, should_sound};
use crate::messages::{InboundEvent, STATUS_SIMULATION_STARTED, STATUS_SIMULATION_STOPPED};
use crate::snapshot::{SimulationState, ViewModelSnapshot};

/// Compute the snapshot that results from applying `event` to `current`.
pub fn reconcile(current: &ViewModelSnapshot, event: &InboundEvent) -> ViewModelSnapshot {
    let mut next = current.clone();

    match event {
        InboundEvent::MetricsUpdate(samples) => {
            for (metric, sample) in samples {
                next.metrics.insert(*metric, sample.clone());
            }
        }
        InboundEvent::AlarmUpdate { alarms, history } => {
            next.alarms = alarms.clone();
            next.history = history.clone();
            next.banner = aggregate(&next.alarms);
        }
        InboundEvent::Thresholds(thresholds) => {
            next.thresholds = thresholds.clone();
        }
        InboundEvent::Simulation(state) => {
            next.simulation = *state;
        }
        InboundEvent::Status(status) => match status.as_str() {
            STATUS_SIMULATION_STARTED => next.simulation = SimulationState::Running,
            STATUS_SIMULATION_STOPPED => next.simulation = SimulationState::Stopped,
            _ => {}
        },
        InboundEvent::Acknowledged { .. }
        | InboundEvent::Error { .. }
        | InboundEvent::Unrecognized { .. } => {}
    }

    next
}

/// Result of applying one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    /// The committed snapshot differs from the previous one.
    pub changed: bool,
    /// The audible alert should play.
    ///
    /// Checked on every alarm update, so it stays `true` for as long as
    /// updates keep arriving with a critical aggregate, even if nothing
    /// changed.
    pub sound_alert: bool,
}

/// Owner of the live snapshot.
#[derive(Debug, Default)]
pub struct Reconciler {
    snapshot: ViewModelSnapshot,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// The last committed snapshot.
    pub fn snapshot(&self) -> &ViewModelSnapshot {
        &self.snapshot
    }

    /// Apply one event and commit the result.
    pub fn apply(&mut self, event: &InboundEvent, sound_enabled: bool) -> Outcome {
        let next = reconcile(&self.snapshot, event);
        let changed = next != self.snapshot;
        self.snapshot = next;

        let sound_alert = matches!(event, InboundEvent::AlarmUpdate { .. })
            && should_sound(&self.snapshot.banner, sound_enabled);

        Outcome {
            changed,
            sound_alert,
        }
    }
}
