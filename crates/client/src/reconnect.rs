//! Fixed-delay reconnection policy.
//!
//! When the connection drops unexpectedly, or an attempt fails, the
//! session calls [`ReconnectPolicy::schedule`] and waits until
//! [`ReconnectPolicy::deadline`]. There is no backoff growth and no retry
//! cap; the policy keeps scheduling until an `opened` event resets it.
//!
//! The policy holds at most one deadline. Scheduling again replaces the
//! pending one, so a burst of close events never yields concurrent
//! attempts.

use std::time::Duration;

use tokio::time::Instant;

/// Delay between a drop and the next connection attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Longest delay the policy will wait between attempts.
pub const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(3600);

/// Where the policy currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyState {
    /// No retry pending.
    Idle,
    /// A retry is due at `deadline`.
    Waiting { deadline: Instant },
}

/// Retry timer for one session: a fixed delay and at most one deadline.
#[derive(Debug)]
pub struct ReconnectPolicy {
    delay: Duration,
    state: PolicyState,
    /// Retries fired since the last successful open.
    retries: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RECONNECT_DELAY)
    }
}

impl ReconnectPolicy {
    /// Build a policy; delays above [`MAX_RECONNECT_DELAY`] are capped.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay: delay.min(MAX_RECONNECT_DELAY),
            state: PolicyState::Idle,
            retries: 0,
        }
    }

    /// Fixed wait between a drop and the next attempt.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Whether a retry is pending.
    pub fn state(&self) -> PolicyState {
        self.state
    }

    /// When the pending retry is due, if any.
    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            PolicyState::Idle => None,
            PolicyState::Waiting { deadline } => Some(deadline),
        }
    }

    /// `true` while a retry is pending.
    pub fn is_waiting(&self) -> bool {
        matches!(self.state, PolicyState::Waiting { .. })
    }

    /// Attempts fired since the last successful open.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Arm the retry timer, replacing any pending one.
    pub fn schedule(&mut self, now: Instant) -> Instant {
        if let PolicyState::Waiting { deadline } = self.state {
            tracing::debug!(
                remaining_ms = deadline.saturating_duration_since(now).as_millis() as u64,
                "Replacing pending reconnect timer",
            );
        }
        let deadline = now.checked_add(self.delay).unwrap_or_else(|| {
            tracing::warn!(
                delay_secs = self.delay.as_secs(),
                "Reconnect deadline overflowed, retrying now",
            );
            now
        });
        self.state = PolicyState::Waiting { deadline };
        deadline
    }

    /// Consume the pending retry if it is due.
    ///
    /// Returns `true` when the caller should attempt to connect now. The
    /// policy goes back to idle; a failed attempt is expected to call
    /// [`schedule`](Self::schedule) again.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.state {
            PolicyState::Waiting { deadline } if deadline <= now => {
                self.state = PolicyState::Idle;
                self.retries += 1;
                true
            }
            _ => false,
        }
    }

    /// A connection opened: drop any pending retry and reset the count.
    pub fn reset(&mut self) {
        self.state = PolicyState::Idle;
        self.retries = 0;
    }

    /// Drop any pending retry without touching the count.
    pub fn cancel(&mut self) {
        self.state = PolicyState::Idle;
    }
}
