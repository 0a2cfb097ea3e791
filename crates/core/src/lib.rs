//! Pure logic for the alarm dashboard client.
//!
//! Nothing in this crate performs IO. It holds the view-model types, the
//! wire codec, the reconciliation engine, and the severity aggregator so
//! they can be tested without a socket or a runtime.

pub mod alarm;
pub mod error;
pub mod messages;
pub mod metric;
pub mod reconcile;
pub mod snapshot;
pub mod threshold;
pub mod types;
