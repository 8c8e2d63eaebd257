use std::{fmt, sync::Arc, time::SystemTime};

use crate::parallel::{
    error::ParallelError,
    event::{EventHandler, LogEventHandler},
};

/// Time source used for every event timestamp
pub type Clock = Arc<dyn Fn() -> SystemTime + Send + Sync>;

/// Policy knobs for one batch run
///
/// Built once, then shared read-only by the runner and every controller it
/// creates.
///
/// # Defaults
///
/// - `fast_fail`: `false`
/// - `max_concurrent_cmds`: number of logical CPUs
/// - `event_handler`: [`LogEventHandler`]
/// - `clock`: [`SystemTime::now`]
///
/// # Examples
///
/// ```rust
/// use std::time::UNIX_EPOCH;
/// use tcrm_parallel::parallel::{event::Event, options::RunnerOptions};
///
/// let options = RunnerOptions::default()
///     .fast_fail(true)
///     .max_concurrent_cmds(4)
///     .event_handler(|event: Event| println!("{:?}", event))
///     .clock(|| UNIX_EPOCH);
///
/// assert!(options.is_fast_fail());
/// assert_eq!(options.get_max_concurrent_cmds(), 4);
/// assert!(options.validate().is_ok());
/// ```
#[derive(Clone)]
pub struct RunnerOptions {
    fast_fail: bool,
    max_concurrent_cmds: usize,
    event_handler: Arc<dyn EventHandler>,
    clock: Clock,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        RunnerOptions {
            fast_fail: false,
            max_concurrent_cmds: num_cpus::get(),
            event_handler: Arc::new(LogEventHandler),
            clock: Arc::new(SystemTime::now),
        }
    }
}

impl RunnerOptions {
    /// Kill every outstanding command as soon as one fails.
    pub fn fast_fail(mut self, enabled: bool) -> Self {
        self.fast_fail = enabled;
        self
    }

    /// Maximum number of commands running at the same time.
    ///
    /// Must be greater than zero. Defaults to the number of CPUs.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use tcrm_parallel::parallel::options::RunnerOptions;
    ///
    /// let options = RunnerOptions::default().max_concurrent_cmds(4);
    /// assert_eq!(options.get_max_concurrent_cmds(), 4);
    /// assert!(RunnerOptions::default().max_concurrent_cmds(0).validate().is_err());
    /// ```
    pub fn max_concurrent_cmds(mut self, max: usize) -> Self {
        self.max_concurrent_cmds = max;
        self
    }

    /// Receiver for every lifecycle event of the run.
    ///
    /// Defaults to [`LogEventHandler`].
    ///
    /// # Examples
    ///
    /// ```rust
    /// use tcrm_parallel::parallel::{event::Event, options::RunnerOptions};
    ///
    /// let options = RunnerOptions::default().event_handler(|event: Event| {
    ///     println!("{}: {}", event.kind(), event.command());
    /// });
    /// ```
    pub fn event_handler(mut self, handler: impl EventHandler + 'static) -> Self {
        self.event_handler = Arc::new(handler);
        self
    }

    /// Time source for event timestamps. Defaults to `SystemTime::now`.
    pub fn clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> SystemTime + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    pub fn is_fast_fail(&self) -> bool {
        self.fast_fail
    }

    pub fn get_max_concurrent_cmds(&self) -> usize {
        self.max_concurrent_cmds
    }

    pub(crate) fn get_event_handler(&self) -> Arc<dyn EventHandler> {
        Arc::clone(&self.event_handler)
    }

    pub(crate) fn get_clock(&self) -> Clock {
        Arc::clone(&self.clock)
    }

    /// # Errors
    ///
    /// Returns [`ParallelError::InvalidConfiguration`] if `max_concurrent_cmds` is zero.
    pub fn validate(&self) -> Result<(), ParallelError> {
        if self.max_concurrent_cmds == 0 {
            return Err(ParallelError::InvalidConfiguration(
                "max_concurrent_cmds must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for RunnerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunnerOptions")
            .field("fast_fail", &self.fast_fail)
            .field("max_concurrent_cmds", &self.max_concurrent_cmds)
            .finish_non_exhaustive()
    }
}
