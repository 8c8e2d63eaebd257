use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt, process::Stdio};

use tokio::process::Command;

use crate::parallel::error::ParallelError;

/// A single external command to run as part of a batch
///
/// The program, its arguments, and its environment are resolved by the caller;
/// the runner only spawns what it is given.
///
/// # Examples
///
/// ```rust
/// use tcrm_parallel::parallel::command::CommandSpec;
///
/// let spec = CommandSpec::new("cargo")
///     .args(["build", "--release"])
///     .working_dir("/tmp")
///     .env([("RUST_LOG", "debug")]);
///
/// assert_eq!(spec.to_string(), "cargo build --release");
/// assert!(spec.validate().is_ok());
/// ```
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct CommandSpec {
    /// The program or executable to run
    pub program: String,

    /// Arguments to pass to the program
    pub args: Vec<String>,

    /// Working directory for the process
    pub working_dir: Option<String>,

    /// Extra environment variables for the process
    pub env: Option<HashMap<String, String>>,

    /// Start the process as the leader of its own process group (unix only)
    ///
    /// When enabled, killing the command signals the whole group so
    /// grandchildren spawned by shells are stopped as well.
    pub process_group: bool,
}

impl CommandSpec {
    /// Creates a command for `program` with no arguments, inheriting the
    /// caller's working directory and environment.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use tcrm_parallel::parallel::command::CommandSpec;
    ///
    /// let spec = CommandSpec::new("ls");
    /// assert_eq!(spec.program, "ls");
    /// assert!(spec.args.is_empty());
    /// ```
    pub fn new(program: impl Into<String>) -> Self {
        CommandSpec {
            program: program.into(),
            ..Default::default()
        }
    }

    /// Sets the arguments, replacing any set before.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use tcrm_parallel::parallel::command::CommandSpec;
    ///
    /// let spec = CommandSpec::new("git").args(["status", "--short"]);
    /// assert_eq!(spec.to_string(), "git status --short");
    /// ```
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the directory the process starts in.
    pub fn working_dir(mut self, dir: impl Into<String>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Sets extra environment variables, added on top of the inherited ones.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use tcrm_parallel::parallel::command::CommandSpec;
    ///
    /// let spec = CommandSpec::new("node").env([("NODE_ENV", "production")]);
    /// assert_eq!(spec.env.unwrap()["NODE_ENV"], "production");
    /// ```
    pub fn env<K, V, I>(mut self, env: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        self.env = Some(env.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
        self
    }

    /// Run the process in its own process group so a kill reaches its
    /// descendants too. Ignored on non-unix targets.
    pub fn process_group(mut self, enabled: bool) -> Self {
        self.process_group = enabled;
        self
    }

    /// Checks the command for values no process could be started with.
    ///
    /// Existence of the program is not checked here; a missing executable is
    /// reported as a start failure when the command runs.
    ///
    /// # Errors
    ///
    /// Returns [`ParallelError::InvalidConfiguration`] if:
    /// - the program is empty or has leading/trailing whitespace
    /// - the program, an argument, the working directory, or an environment
    ///   entry contains a null byte
    /// - an environment key is empty or contains `=`
    pub fn validate(&self) -> Result<(), ParallelError> {
        if self.program.is_empty() {
            return Err(ParallelError::InvalidConfiguration(
                "Program cannot be empty".to_string(),
            ));
        }
        if self.program.trim() != self.program {
            return Err(ParallelError::InvalidConfiguration(format!(
                "Program '{}' cannot have leading or trailing whitespace",
                self.program
            )));
        }
        reject_null_byte("Program", &self.program)?;

        for arg in &self.args {
            reject_null_byte("Argument", arg)?;
        }

        if let Some(dir) = &self.working_dir {
            reject_null_byte("Working directory", dir)?;
        }

        if let Some(env) = &self.env {
            for (key, value) in env {
                if key.is_empty() {
                    return Err(ParallelError::InvalidConfiguration(
                        "Environment variable key cannot be empty".to_string(),
                    ));
                }
                if key.contains('=') {
                    return Err(ParallelError::InvalidConfiguration(format!(
                        "Environment variable key '{}' cannot contain '='",
                        key
                    )));
                }
                reject_null_byte("Environment variable key", key)?;
                reject_null_byte("Environment variable value", value)?;
            }
        }

        Ok(())
    }

    /// Builds the tokio command to spawn.
    pub(crate) fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        if let Some(envs) = &self.env {
            cmd.envs(envs);
        }

        // Output belongs to the caller's terminal, not to the runner.
        cmd.stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        cmd.kill_on_drop(true);

        #[cfg(all(unix, feature = "process-group"))]
        if self.process_group {
            cmd.process_group(0);
        }

        cmd
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

fn reject_null_byte(what: &str, value: &str) -> Result<(), ParallelError> {
    if value.contains('\0') {
        return Err(ParallelError::InvalidConfiguration(format!(
            "{} cannot contain null bytes",
            what
        )));
    }
    Ok(())
}
