//! # tcrm-parallel
//!
//! A Rust library for running a batch of system commands in parallel.
//! Built for developers who need bounded concurrency, lifecycle events,
//! and fast-fail cancellation across a group of processes.
//!
//! ## Features
//!
//! - **Bounded Parallelism**: At most `max_concurrent_cmds` commands run at once
//! - **Lifecycle Events**: Every command reports `Started` and `Finished` exactly once
//! - **Fast-Fail**: Optionally kill every outstanding command as soon as one fails
//! - **Race-Safe Cancellation**: `kill` can be called at any point, any number of times
//! - **Injectable Clock**: Deterministic timestamps for testing
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tcrm_parallel::parallel::{command::CommandSpec, options::RunnerOptions, runner::Runner};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = RunnerOptions::default()
//!         .fast_fail(true)
//!         .max_concurrent_cmds(2);
//!
//!     let runner = Runner::new(options)?;
//!     runner
//!         .run([
//!             CommandSpec::new("echo").args(["hello"]),
//!             CommandSpec::new("echo").args(["world"]),
//!         ])
//!         .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Collecting Events
//!
//! ```rust,no_run
//! use tcrm_parallel::parallel::{
//!     command::CommandSpec,
//!     event::{ChannelEventHandler, Event},
//!     options::RunnerOptions,
//!     runner::Runner,
//! };
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (tx, mut rx) = mpsc::unbounded_channel();
//!     let options = RunnerOptions::default().event_handler(ChannelEventHandler::new(tx));
//!
//!     let result = Runner::new(options)?
//!         .run([CommandSpec::new("false")])
//!         .await;
//!     assert!(result.is_err());
//!
//!     while let Ok(event) = rx.try_recv() {
//!         if let Event::Finished { error: Some(error), .. } = event {
//!             eprintln!("{error}");
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Optional Features
//!
//! - `process-group` (default, unix): commands may be started in their own
//!   process group so a kill reaches every descendant
//! - `tracing-max_level_*` / `tracing-release_max_level_*`: compile-time log level caps

pub mod parallel;
