//! Notifications the session publishes to the presentation layer.
//!
//! Snapshots travel on their own `watch` channel; these events cover what
//! is not part of the view model.

use alarmdeck_core::alarm::AlarmBanner;
use alarmdeck_core::types::Timestamp;

use crate::transport::ConnectionState;

#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// The transport moved to a new state.
    ConnectionChanged { state: ConnectionState },

    /// Play the audible alert. Sent on every alarm update while the banner
    /// is critical and sound is enabled.
    AlertSound { banner: AlarmBanner },

    /// The server reported a protocol fault.
    Diagnostic {
        message: String,
        received_at: Timestamp,
    },
}
