//! `alarmdeck` -- headless alarm dashboard client.
//!
//! Connects to the dashboard server's `/ws` endpoint, keeps the view
//! model in sync, logs every committed snapshot, and reads commands from
//! stdin (type `help`).
//!
//! # Environment variables
//!
//! | Variable                    | Required | Default                 | Description                      |
//! |-----------------------------|----------|-------------------------|----------------------------------|
//! | `ALARMDECK_PAGE_URL`        | no       | `http://localhost:8080` | Dashboard origin                 |
//! | `ALARMDECK_WS_URL`          | no       | derived                 | Explicit socket URL              |
//! | `ALARMDECK_RECONNECT_SECS`  | no       | `5`                     | Fixed reconnect delay            |
//! | `ALARMDECK_SOUND`           | no       | `false`                 | Start with audible alerts on     |
//! | `ALARMDECK_SPIKE_MAGNITUDE` | no       | `0.9`                   | Default spike fraction           |

use std::io::Write;

use alarmdeck_client::client::WsDialer;
use alarmdeck_client::config::ClientConfig;
use alarmdeck_client::console;
use alarmdeck_client::events::ClientEvent;
use alarmdeck_client::session::{SessionHandle, SyncSession};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "alarmdeck=info,alarmdeck_client=info,alarmdeck_core=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ClientConfig::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid configuration");
        std::process::exit(1);
    });

    tracing::info!(
        ws_url = %config.ws_url,
        reconnect_secs = config.reconnect_delay.as_secs(),
        sound = config.sound_enabled,
        "Starting alarmdeck",
    );

    let (session, handle) = SyncSession::new(&config, WsDialer::new(config.ws_url.clone()));
    let session_task = tokio::spawn(session.run());
    tokio::spawn(present(handle.clone()));

    read_commands(&handle).await;

    handle.shutdown();
    if let Err(e) = session_task.await {
        tracing::error!(error = %e, "Session task failed");
    }
    tracing::info!("alarmdeck stopped");
}

/// Log committed snapshots and client events until the session ends.
async fn present(handle: SessionHandle) {
    let mut snapshots = handle.snapshots();
    let mut events = handle.subscribe();

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    return;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                for line in console::render(&snapshot) {
                    tracing::info!("{line}");
                }
            }
            event = events.recv() => match event {
                Ok(ClientEvent::ConnectionChanged { state }) => {
                    tracing::info!(?state, "Connection status");
                }
                Ok(ClientEvent::AlertSound { banner }) => {
                    // Terminal bell stands in for the alarm sound.
                    print!("\x07");
                    let _ = std::io::stdout().flush();
                    tracing::warn!(alarms = %banner.label(), "Critical alarm");
                }
                Ok(ClientEvent::Diagnostic { message, received_at }) => {
                    tracing::warn!(%message, %received_at, "Server diagnostic");
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Presenter lagged behind client events");
                }
                Err(RecvError::Closed) => return,
            }
        }
    }
}

/// Forward stdin lines to the session until `quit`, EOF or Ctrl-C.
async fn read_commands(handle: &SessionHandle) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => return,
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => return,
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to read stdin");
                        return;
                    }
                };
                match console::parse_line(&line) {
                    Ok(Some(command)) => {
                        if !console::apply(handle, command) {
                            return;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => tracing::warn!("{e}"),
                }
            }
        }
    }
}
