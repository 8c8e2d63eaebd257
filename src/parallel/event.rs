use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::parallel::{command::CommandSpec, error::CommandError};

/// Lifecycle events emitted by a command controller
///
/// Each controller emits at most one `Started` and exactly one `Finished`
/// for every `Started`, always in that order. Events from different
/// controllers interleave freely.
///
/// # Examples
///
/// ```rust
/// use std::time::UNIX_EPOCH;
/// use tcrm_parallel::parallel::{command::CommandSpec, event::Event};
///
/// let event = Event::Started {
///     time: UNIX_EPOCH,
///     command: CommandSpec::new("echo").args(["hi"]),
/// };
/// assert_eq!(event.kind(), "started");
/// assert!(!event.is_finished());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// The controller claimed its start and is about to spawn the process
    Started {
        time: SystemTime,
        command: CommandSpec,
    },

    /// The command reached its terminal state
    ///
    /// `error` is `None` only when the process exited successfully.
    Finished {
        started_at: SystemTime,
        finished_at: SystemTime,
        command: CommandSpec,
        error: Option<CommandError>,
    },
}

impl Event {
    /// Short type name of the event, matching its serialized `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Started { .. } => "started",
            Event::Finished { .. } => "finished",
        }
    }

    pub fn command(&self) -> &CommandSpec {
        match self {
            Event::Started { command, .. } | Event::Finished { command, .. } => command,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, Event::Finished { .. })
    }

    pub fn error(&self) -> Option<&CommandError> {
        match self {
            Event::Finished { error, .. } => error.as_ref(),
            Event::Started { .. } => None,
        }
    }
}

/// Receiver of lifecycle events
///
/// A single handler is shared by every controller in a run and is invoked
/// concurrently from multiple tokio tasks. Handlers are called while the
/// emitting controller holds its state lock, so they must not call back into
/// that controller.
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: Event);
}

impl<F> EventHandler for F
where
    F: Fn(Event) + Send + Sync,
{
    fn handle(&self, event: Event) {
        self(event)
    }
}

/// Default handler: one JSON line per event through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct LogEventHandler;

impl EventHandler for LogEventHandler {
    fn handle(&self, event: Event) {
        match serde_json::to_string(&event) {
            Ok(line) => tracing::info!(target: "tcrm_parallel::event", "{}", line),
            Err(e) => {
                tracing::warn!(target: "tcrm_parallel::event", error = %e, event = %event.kind(), "Failed to serialize event");
            }
        }
    }
}

/// Forwards every event into an unbounded channel
///
/// # Examples
///
/// ```rust
/// use tcrm_parallel::parallel::event::ChannelEventHandler;
/// use tokio::sync::mpsc;
///
/// let (tx, _rx) = mpsc::unbounded_channel();
/// let handler = ChannelEventHandler::new(tx);
/// ```
#[derive(Debug, Clone)]
pub struct ChannelEventHandler {
    tx: mpsc::UnboundedSender<Event>,
}

impl ChannelEventHandler {
    pub fn new(tx: mpsc::UnboundedSender<Event>) -> Self {
        Self { tx }
    }
}

impl EventHandler for ChannelEventHandler {
    fn handle(&self, event: Event) {
        if let Err(e) = self.tx.send(event) {
            tracing::trace!(event = e.0.kind(), "Event channel closed, dropping event");
        }
    }
}
