use serde::{Deserialize, Serialize};

/// Externally visible lifecycle state of a command controller
///
/// Transitions only move forward:
/// `NotStarted -> Started -> Finished` or `NotStarted -> Finished`
/// when a kill arrives before the command was run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandState {
    NotStarted,
    Started,
    Finished,
}

impl CommandState {
    pub fn is_finished(self) -> bool {
        self == CommandState::Finished
    }
}
