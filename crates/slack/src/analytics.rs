use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Metadata for one command invocation, emitted by the dispatcher and owned
/// by the logger task for its printed lifetime.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandEvent {
    pub timestamp: DateTime<Utc>,
    pub command: String,
    pub parameters: HashMap<String, String>,
    pub kind: String,
}

impl CommandEvent {
    pub fn received(command: &str, parameters: HashMap<String, String>) -> Self {
        Self {
            timestamp: Utc::now(),
            command: command.to_owned(),
            parameters,
            kind: "received".to_owned(),
        }
    }
}

/// Single-producer side of the analytics stream.
#[derive(Clone)]
pub struct AnalyticsSink {
    tx: mpsc::UnboundedSender<CommandEvent>,
}

impl AnalyticsSink {
    pub fn emit(&self, event: CommandEvent) {
        // The logger task owning the receiver may already be gone during
        // shutdown; invocation metadata is best-effort observability.
        if self.tx.send(event).is_err() {
            debug!("analytics receiver dropped; discarding command event");
        }
    }
}

pub fn analytics_channel() -> (AnalyticsSink, mpsc::UnboundedReceiver<CommandEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (AnalyticsSink { tx }, rx)
}

/// Drains the analytics stream and logs each event until the stream closes or
/// the shutdown signal fires.
pub fn spawn_event_logger(
    mut events: mpsc::UnboundedReceiver<CommandEvent>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                maybe_event = events.recv() => {
                    let Some(event) = maybe_event else {
                        debug!("analytics stream closed; event logger exiting");
                        break;
                    };
                    info!(
                        event_name = "analytics.command_event",
                        timestamp = %event.timestamp,
                        command = %event.command,
                        parameters = ?event.parameters,
                        kind = %event.kind,
                        "command event"
                    );
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("shutdown signaled; event logger exiting");
                        break;
                    }
                }
            }
        }
    })
}
