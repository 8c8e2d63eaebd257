use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure reason carried by a [`Finished`](crate::parallel::event::Event::Finished) event
///
/// Every variant names the command it belongs to, rendered as
/// `program arg1 arg2 ...`.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandError {
    /// The process could not be spawned
    #[error("command could not start: {command}: {reason}")]
    Start { command: String, reason: String },

    /// The process ran and exited with a failure status
    #[error("command had error: {command}: {status}")]
    Exit { command: String, status: String },

    /// Waiting on the process failed at the OS level
    #[error("command had error while waiting: {command}: {reason}")]
    Wait { command: String, reason: String },

    /// The command was cancelled while running
    #[error("command killed: {command}")]
    Killed { command: String },

    /// Delivering the termination request failed
    #[error("command had error on kill: {command}: {reason}")]
    KillFailed { command: String, reason: String },
}

impl CommandError {
    /// Whether this failure comes from a `kill` rather than from the command itself.
    pub fn is_kill(&self) -> bool {
        matches!(
            self,
            CommandError::Killed { .. } | CommandError::KillFailed { .. }
        )
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParallelError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("command failed ({failed} of {total})")]
    CommandFailed { failed: usize, total: usize },
}
