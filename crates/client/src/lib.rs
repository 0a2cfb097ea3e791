//! `alarmdeck` client library crate.
//!
//! Keeps a live WebSocket session to the alarm dashboard server, folds
//! inbound frames into a view model, and relays user commands back. The
//! binary entrypoint lives in `main.rs`.

pub mod client;
pub mod config;
pub mod console;
pub mod dispatcher;
pub mod events;
pub mod reconnect;
pub mod session;
pub mod transport;
