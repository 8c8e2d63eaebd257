use std::{
    process::ExitStatus,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::SystemTime,
};

use tokio::{process::Child, sync::oneshot};

use crate::parallel::{
    command::CommandSpec,
    error::CommandError,
    event::{Event, EventHandler},
    options::Clock,
    state::CommandState,
};

#[derive(Debug)]
enum Lifecycle {
    NotStarted,
    Started {
        started_at: SystemTime,
        kill_tx: oneshot::Sender<()>,
    },
    Finished,
}

/// Lifecycle controller for exactly one external command
///
/// `run` and `kill` may be called from different tasks in any order and any
/// number of times. Whichever of them moves the controller to `Finished`
/// emits the single `Finished` event; the other becomes a no-op.
///
/// # Examples
///
/// ```rust,no_run
/// use std::{sync::Arc, time::SystemTime};
/// use tcrm_parallel::parallel::{
///     command::CommandSpec, controller::CommandController, event::LogEventHandler,
/// };
///
/// #[tokio::main]
/// async fn main() {
///     let controller = Arc::new(CommandController::new(
///         CommandSpec::new("sleep").args(["10"]),
///         Arc::new(LogEventHandler),
///         Arc::new(SystemTime::now),
///     ));
///
///     let running = Arc::clone(&controller);
///     let handle = tokio::spawn(async move { running.run().await });
///
///     tokio::time::sleep(std::time::Duration::from_millis(100)).await;
///     controller.kill();
///
///     // A killed command is not reported as a run failure.
///     assert!(handle.await.unwrap());
/// }
/// ```
pub struct CommandController {
    command: CommandSpec,
    event_handler: Arc<dyn EventHandler>,
    clock: Clock,
    state: Mutex<Lifecycle>,
}

impl CommandController {
    /// Creates a controller that has not started yet.
    ///
    /// The handler and clock are shared with every other controller of the
    /// same run.
    pub fn new(command: CommandSpec, event_handler: Arc<dyn EventHandler>, clock: Clock) -> Self {
        Self {
            command,
            event_handler,
            clock,
            state: Mutex::new(Lifecycle::NotStarted),
        }
    }

    /// The command this controller runs.
    pub fn command(&self) -> &CommandSpec {
        &self.command
    }

    /// Snapshot of the lifecycle state; it may change right after it is read.
    pub fn state(&self) -> CommandState {
        match *self.lock() {
            Lifecycle::NotStarted => CommandState::NotStarted,
            Lifecycle::Started { .. } => CommandState::Started,
            Lifecycle::Finished => CommandState::Finished,
        }
    }

    /// Runs the command to completion.
    ///
    /// Returns `false` only for a failure that this call reported itself: the
    /// process could not be spawned, or it exited unsuccessfully. Returns
    /// `true` when the process succeeded, when the controller was already
    /// started or finished, and when a concurrent [`kill`](Self::kill) got to
    /// report the outcome first.
    ///
    /// Dropping the returned future while the process runs kills the process
    /// and reports `Finished` with [`CommandError::Killed`].
    pub async fn run(&self) -> bool {
        let (mut child, kill_rx) = {
            let mut state = self.lock();
            if !matches!(*state, Lifecycle::NotStarted) {
                return true;
            }

            let started_at = (self.clock)();
            self.emit(Event::Started {
                time: started_at,
                command: self.command.clone(),
            });

            // Spawn while holding the lock: a kill must see either no process
            // and a suppressed start, or a process it can stop. The guard is a
            // std mutex, so it is released before the first `.await` below.
            match self.command.to_command().spawn() {
                Ok(child) => {
                    let (kill_tx, kill_rx) = oneshot::channel();
                    *state = Lifecycle::Started {
                        started_at,
                        kill_tx,
                    };
                    (child, kill_rx)
                }
                Err(e) => {
                    let finished_at = (self.clock)();
                    *state = Lifecycle::Finished;
                    tracing::debug!(command = %self.command, error = %e, "Command could not start");
                    self.emit(Event::Finished {
                        started_at,
                        finished_at,
                        command: self.command.clone(),
                        error: Some(CommandError::Start {
                            command: self.command.to_string(),
                            reason: e.to_string(),
                        }),
                    });
                    return false;
                }
            }
        };

        tracing::debug!(command = %self.command, pid = ?child.id(), "Command started");
        let mut abandoned = FinishOnDrop {
            controller: self,
            armed: true,
        };
        let result = self.wait(&mut child, kill_rx).await;
        abandoned.armed = false;
        let finished_at = (self.clock)();

        let mut state = self.lock();
        let started_at = match std::mem::replace(&mut *state, Lifecycle::Finished) {
            Lifecycle::Started { started_at, .. } => started_at,
            _ => {
                tracing::debug!(command = %self.command, "Command finished after kill");
                return true;
            }
        };

        let error = match result {
            Ok(status) if status.success() => None,
            Ok(status) => Some(CommandError::Exit {
                command: self.command.to_string(),
                status: status.to_string(),
            }),
            Err(e) => Some(CommandError::Wait {
                command: self.command.to_string(),
                reason: e.to_string(),
            }),
        };
        let success = error.is_none();
        tracing::debug!(command = %self.command, success, "Command finished");

        self.emit(Event::Finished {
            started_at,
            finished_at,
            command: self.command.clone(),
            error,
        });
        success
    }

    /// Cancels the command.
    ///
    /// Before `run`, the start is suppressed: no process is ever spawned and
    /// no event is emitted. While running, the process is killed and the
    /// `Finished` event is emitted with a kill reason. After finishing, this
    /// is a no-op.
    pub fn kill(&self) {
        let mut state = self.lock();
        match std::mem::replace(&mut *state, Lifecycle::Finished) {
            Lifecycle::NotStarted => {
                tracing::debug!(command = %self.command, "Command start suppressed by kill");
            }
            Lifecycle::Finished => {}
            Lifecycle::Started {
                started_at,
                kill_tx,
            } => {
                let finished_at = (self.clock)();
                let error = match kill_tx.send(()) {
                    Ok(()) => CommandError::Killed {
                        command: self.command.to_string(),
                    },
                    Err(()) => CommandError::KillFailed {
                        command: self.command.to_string(),
                        reason: "process already exited".to_string(),
                    },
                };
                tracing::debug!(command = %self.command, error = %error, "Command killed");
                self.emit(Event::Finished {
                    started_at,
                    finished_at,
                    command: self.command.clone(),
                    error: Some(error),
                });
            }
        }
    }

    /// Waits for the child to exit, stopping it first if a kill request arrives.
    async fn wait(
        &self,
        child: &mut Child,
        kill_rx: oneshot::Receiver<()>,
    ) -> std::io::Result<ExitStatus> {
        let kill_requested = tokio::select! {
            result = child.wait() => return result,
            request = kill_rx => request.is_ok(),
        };
        if kill_requested {
            self.terminate(child);
        }
        child.wait().await
    }

    fn terminate(&self, child: &mut Child) {
        #[cfg(all(unix, feature = "process-group"))]
        if self.command.process_group {
            if let Some(pid) = child.id() {
                match crate::parallel::process::kill_process_group(pid) {
                    Ok(()) => return,
                    Err(e) => {
                        tracing::warn!(command = %self.command, pid, error = %e, "Failed to kill process group, killing child only");
                    }
                }
            }
        }

        if let Err(e) = child.start_kill() {
            tracing::warn!(command = %self.command, error = %e, "Failed to kill child process");
        }
    }

    /// Reports a started command whose `run` future was dropped before the
    /// process exited. `kill_on_drop` takes care of the process itself.
    fn finish_abandoned(&self) {
        let mut state = self.lock();
        let Lifecycle::Started { started_at, .. } =
            std::mem::replace(&mut *state, Lifecycle::Finished)
        else {
            return;
        };
        let finished_at = (self.clock)();
        tracing::debug!(command = %self.command, "Command abandoned while running");
        self.emit(Event::Finished {
            started_at,
            finished_at,
            command: self.command.clone(),
            error: Some(CommandError::Killed {
                command: self.command.to_string(),
            }),
        });
    }

    fn emit(&self, event: Event) {
        self.event_handler.handle(event);
    }

    fn lock(&self) -> MutexGuard<'_, Lifecycle> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Emits the missing `Finished` event if `run` is cancelled mid-wait.
struct FinishOnDrop<'a> {
    controller: &'a CommandController,
    armed: bool,
}

impl Drop for FinishOnDrop<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.controller.finish_abandoned();
        }
    }
}

impl std::fmt::Debug for CommandController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandController")
            .field("command", &self.command)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
