use std::time::Duration;

use alarmdeck_core::threshold::validate_unit_range;

use crate::dispatcher::DEFAULT_SPIKE_MAGNITUDE;
use crate::reconnect::{DEFAULT_RECONNECT_DELAY, MAX_RECONNECT_DELAY};

/// Origin the dashboard is served from when nothing is configured.
pub const DEFAULT_PAGE_URL: &str = "http://localhost:8080";

/// Path of the telemetry socket on the dashboard origin.
pub const WS_PATH: &str = "/ws";

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Socket URL, derived from the page origin unless set explicitly.
    pub ws_url: String,
    /// Fixed delay between a drop and the next attempt.
    pub reconnect_delay: Duration,
    /// Initial state of the audible-alert toggle.
    pub sound_enabled: bool,
    /// Spike magnitude used when the user does not give one.
    pub spike_magnitude: f64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ws_url: format!("ws://localhost:8080{WS_PATH}"),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            sound_enabled: false,
            spike_magnitude: DEFAULT_SPIKE_MAGNITUDE,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} is not a valid URL: {value}")]
    InvalidUrl { var: &'static str, value: String },

    #[error("{var} has an invalid value {value:?}: {reason}")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },
}

impl ClientConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default                 |
    /// |-----------------------------|-------------------------|
    /// | `ALARMDECK_PAGE_URL`        | `http://localhost:8080` |
    /// | `ALARMDECK_WS_URL`          | derived from page URL   |
    /// | `ALARMDECK_RECONNECT_SECS`  | `5`                     |
    /// | `ALARMDECK_SOUND`           | `false`                 |
    /// | `ALARMDECK_SPIKE_MAGNITUDE` | `0.9`                   |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let ws_url = match lookup("ALARMDECK_WS_URL") {
            Some(url) => {
                if !(url.starts_with("ws://") || url.starts_with("wss://")) {
                    return Err(ConfigError::InvalidUrl {
                        var: "ALARMDECK_WS_URL",
                        value: url,
                    });
                }
                url
            }
            None => {
                let page = lookup("ALARMDECK_PAGE_URL").unwrap_or_else(|| DEFAULT_PAGE_URL.into());
                socket_url(&page).ok_or(ConfigError::InvalidUrl {
                    var: "ALARMDECK_PAGE_URL",
                    value: page,
                })?
            }
        };

        let reconnect_delay = match lookup("ALARMDECK_RECONNECT_SECS") {
            Some(raw) => {
                let invalid = |reason: String| ConfigError::InvalidValue {
                    var: "ALARMDECK_RECONNECT_SECS",
                    value: raw.clone(),
                    reason,
                };
                let secs: u64 = raw
                    .trim()
                    .parse()
                    .map_err(|_| invalid("must be a whole number of seconds".into()))?;
                let max = MAX_RECONNECT_DELAY.as_secs();
                if secs == 0 || secs > max {
                    return Err(invalid(format!("must be between 1 and {max}")));
                }
                Duration::from_secs(secs)
            }
            None => DEFAULT_RECONNECT_DELAY,
        };

        let sound_enabled = match lookup("ALARMDECK_SOUND") {
            Some(raw) => parse_flag(&raw).ok_or_else(|| ConfigError::InvalidValue {
                var: "ALARMDECK_SOUND",
                value: raw.clone(),
                reason: "expected true/false".into(),
            })?,
            None => false,
        };

        let spike_magnitude = match lookup("ALARMDECK_SPIKE_MAGNITUDE") {
            Some(raw) => {
                let invalid = |reason: String| ConfigError::InvalidValue {
                    var: "ALARMDECK_SPIKE_MAGNITUDE",
                    value: raw.clone(),
                    reason,
                };
                let value: f64 = raw
                    .trim()
                    .parse()
                    .map_err(|_| invalid("must be a number".into()))?;
                validate_unit_range(value, "spike magnitude").map_err(|e| invalid(e.to_string()))?;
                value
            }
            None => DEFAULT_SPIKE_MAGNITUDE,
        };

        Ok(Self {
            ws_url,
            reconnect_delay,
            sound_enabled,
            spike_magnitude,
        })
    }
}

/// Derive the socket URL from a page origin: `http` becomes `ws`, `https`
/// becomes `wss`, and the path is replaced with [`WS_PATH`].
pub fn socket_url(page_url: &str) -> Option<String> {
    let (scheme, rest) = page_url.split_once("://")?;
    let scheme = match scheme.to_ascii_lowercase().as_str() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        _ => return None,
    };
    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if host.is_empty() {
        return None;
    }
    Some(format!("{scheme}://{host}{WS_PATH}"))
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
