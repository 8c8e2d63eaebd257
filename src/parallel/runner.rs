use std::sync::Arc;

use tokio::{sync::Semaphore, task::JoinSet};
use tracing::Instrument;

use crate::parallel::{
    command::CommandSpec, controller::CommandController, error::ParallelError,
    options::RunnerOptions,
};

/// Runs a batch of commands with bounded parallelism
///
/// One [`CommandController`] is created per command. Each command waits for
/// an admission permit before running, so no more than
/// `max_concurrent_cmds` commands are between `Started` and `Finished` at
/// any time. With fast-fail enabled, the first failure closes admission and
/// kills every controller that has not finished yet.
///
/// # Examples
///
/// ```rust,no_run
/// use tcrm_parallel::parallel::{
///     command::CommandSpec, error::ParallelError, options::RunnerOptions, runner::Runner,
/// };
///
/// #[tokio::main]
/// async fn main() -> Result<(), ParallelError> {
///     let runner = Runner::new(RunnerOptions::default().fast_fail(true))?;
///
///     let result = runner
///         .run([
///             CommandSpec::new("sleep").args(["5"]),
///             CommandSpec::new("false"),
///         ])
///         .await;
///
///     assert!(matches!(result, Err(ParallelError::CommandFailed { .. })));
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Runner {
    options: RunnerOptions,
}

impl Runner {
    /// Creates a runner after validating `options`.
    ///
    /// # Errors
    ///
    /// Returns [`ParallelError::InvalidConfiguration`] if the options are invalid.
    pub fn new(options: RunnerOptions) -> Result<Self, ParallelError> {
        options.validate()?;
        Ok(Self { options })
    }

    /// The options every run of this runner uses.
    pub fn options(&self) -> &RunnerOptions {
        &self.options
    }

    /// Runs every command and waits for all of them to finish.
    ///
    /// All specifications are validated before anything is started.
    ///
    /// # Errors
    ///
    /// - [`ParallelError::InvalidConfiguration`] if any specification is invalid
    /// - [`ParallelError::CommandFailed`] if any command failed
    ///
    /// Dropping the future kills every running command; each of them still
    /// reports its `Finished` event.
    pub async fn run<I>(&self, commands: I) -> Result<(), ParallelError>
    where
        I: IntoIterator<Item = CommandSpec>,
    {
        let commands: Vec<CommandSpec> = commands.into_iter().collect();
        for command in &commands {
            command.validate()?;
        }

        let total = commands.len();
        let controllers: Arc<[Arc<CommandController>]> = commands
            .into_iter()
            .map(|command| {
                Arc::new(CommandController::new(
                    command,
                    self.options.get_event_handler(),
                    self.options.get_clock(),
                ))
            })
            .collect();
        let fast_fail = self.options.is_fast_fail();

        tracing::debug!(
            total,
            max_concurrent_cmds = self.options.get_max_concurrent_cmds(),
            fast_fail,
            "Starting command batch"
        );

        let permits = Arc::new(Semaphore::new(
            self.options
                .get_max_concurrent_cmds()
                .min(Semaphore::MAX_PERMITS),
        ));
        let mut tasks = JoinSet::new();
        for index in 0..total {
            let controllers = Arc::clone(&controllers);
            let permits = Arc::clone(&permits);
            let span =
                tracing::debug_span!("command", index, command = %controllers[index].command());
            tasks.spawn(
                async move {
                    // A closed semaphore means fast-fail stopped admission.
                    let Ok(_permit) = Arc::clone(&permits).acquire_owned().await else {
                        return true;
                    };
                    let success = controllers[index].run().await;
                    // Sweep before the permit is released so no waiting
                    // command is admitted after the failure.
                    if !success && fast_fail {
                        kill_outstanding(&permits, &controllers);
                    }
                    success
                }
                .instrument(span),
            );
        }

        let mut failed = 0;
        while let Some(joined) = tasks.join_next().await {
            let success = match joined {
                Ok(success) => success,
                Err(e) => {
                    tracing::error!(error = %e, "Command task did not complete");
                    if fast_fail {
                        kill_outstanding(&permits, &controllers);
                    }
                    false
                }
            };
            if !success {
                failed += 1;
            }
        }

        if failed > 0 {
            return Err(ParallelError::CommandFailed { failed, total });
        }
        Ok(())
    }
}

/// Stops admission and kills every controller that has not finished.
///
/// Safe to call more than once; later calls find nothing left to do.
fn kill_outstanding(permits: &Semaphore, controllers: &[Arc<CommandController>]) {
    if !permits.is_closed() {
        tracing::debug!("Command failed, killing outstanding commands");
    }
    permits.close();
    for controller in controllers {
        controller.kill();
    }
}
