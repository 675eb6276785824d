//! Error taxonomy of the restricted shell.
//!
//! Every variant of [`ShellError`] is fatal in single-shot mode. The
//! interactive loop prints the message and moves on to the next prompt.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while classifying, tokenizing or dispatching a command.
#[derive(Debug, Error)]
pub enum ShellError {
    /// Wrong invocation shape.
    #[error("Run with no arguments or with -c cmd")]
    Usage,

    /// Interactive mode requested but the command directory is not usable.
    #[error("Sorry, the interactive git-shell is not enabled")]
    InteractiveDisabled,

    /// A relayed command was given no argument or a malformed quoted one.
    #[error("bad argument")]
    BadArgument,

    /// A relay handler was bound to a name outside the `git-` namespace.
    #[error("bad command")]
    BadCommand,

    /// The CVS shim only speaks `server`.
    #[error("git-cvsserver only handles server: {0}")]
    UnsupportedMode(String),

    #[error("unrecognized command '{0}'")]
    CommandNotFound(String),

    /// The name contains `/` or `.` and was never resolved.
    #[error("invalid command format '{0}'")]
    InvalidCommandName(String),

    #[error("invalid command format '{line}'")]
    Tokenize {
        line: String,
        #[source]
        source: TokenizeError,
    },

    /// A relayed program could not be started.
    #[error(transparent)]
    Spawn(#[from] RunError),

    #[error("opening /dev/null failed: {0}")]
    DevNull(#[source] nix::Error),
}

impl ShellError {
    /// Exit code used when the process dies on this error.
    pub fn exit_code(&self) -> i32 {
        128
    }
}

/// Failures of the command-line splitter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenizeError {
    #[error("unclosed quote")]
    UnclosedQuote,
    #[error("cmdline ends with \\")]
    TrailingBackslash,
}

/// Failures of the single-quote dequoter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuoteError {
    #[error("argument is not single-quoted")]
    MissingOpeningQuote,
    #[error("unterminated single quote")]
    UnterminatedQuote,
    #[error("invalid escape after closing quote")]
    BadEscape,
}

/// Conditions the subprocess runner reports instead of an exit status.
#[derive(Debug, Error)]
pub enum RunError {
    /// The program does not exist or is not executable.
    #[error("cannot run {}: No such file or directory", .0.display())]
    NotFound(PathBuf),
}
