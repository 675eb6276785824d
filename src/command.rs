//! What the shell runs and how a run ended, plus the [`Runner`] seam that
//! starts children.

use crate::env::Environment;
use crate::error::RunError;
use std::fmt;
use std::path::PathBuf;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
pub type ExitCode = i32;

/// A fully resolved argument vector, ready to be handed to a [`Runner`].
///
/// `program` is either a bare name looked up through `PATH` (relayed git
/// commands) or an absolute path into the command directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    /// Program to execute: a bare name or a path.
    pub program: PathBuf,
    /// Arguments after the program name, passed without further quoting.
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// How a child terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Normal exit with the low 8 bits of the status.
    Exited(u8),
    /// Killed by the given signal number.
    Signaled(i32),
    /// Could not be spawned or waited for.
    WaitFailed,
}

impl ExitStatus {
    /// Exit code to hand back to our own parent, following shell conventions.
    pub fn code(self) -> ExitCode {
        match self {
            ExitStatus::Exited(code) => ExitCode::from(code),
            ExitStatus::Signaled(signal) => 128 + signal,
            ExitStatus::WaitFailed => 255,
        }
    }

    pub fn success(self) -> bool {
        self == ExitStatus::Exited(0)
    }
}

/// Knobs of a single [`Runner::run`] call.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Do not print the "cannot run" diagnostic when the program is missing.
    pub silent_exec_failure: bool,
    /// Point the child's standard error at `/dev/null`.
    pub suppress_stderr: bool,
}

impl RunOptions {
    pub fn silent() -> Self {
        Self {
            silent_exec_failure: true,
            ..Self::default()
        }
    }
}

/// Spawns a child for a [`CommandLine`] and blocks until it is gone.
///
/// This is the only way the shell starts processes synchronously. The
/// production implementation is [`crate::ProcessRunner`]; tests substitute a
/// recorder.
pub trait Runner {
    /// Run `cmd` with the variables and working directory of `env`.
    ///
    /// Returns [`RunError::NotFound`] when the program does not exist or is not
    /// executable. Every other failure is folded into
    /// [`ExitStatus::WaitFailed`].
    fn run(
        &mut self,
        cmd: &CommandLine,
        env: &Environment,
        opts: RunOptions,
    ) -> Result<ExitStatus, RunError>;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Runner that records what it was asked to do and never spawns anything.
    #[derive(Default)]
    pub(crate) struct RecordingRunner {
        pub calls: Vec<CommandLine>,
        pub paths: Vec<Option<String>>,
        /// Programs reported as missing.
        pub missing: Vec<PathBuf>,
        pub status: Option<ExitStatus>,
    }

    impl Runner for RecordingRunner {
        fn run(
            &mut self,
            cmd: &CommandLine,
            env: &Environment,
            _opts: RunOptions,
        ) -> Result<ExitStatus, RunError> {
            self.calls.push(cmd.clone());
            self.paths.push(env.get_var("PATH"));
            if self.missing.contains(&cmd.program) {
                return Err(RunError::NotFound(cmd.program.clone()));
            }
            Ok(self.status.unwrap_or(ExitStatus::Exited(0)))
        }
    }
}
