//! A restricted login shell for accounts that may only talk git.
//!
//! Installed as the login shell of an SSH account, it runs exactly one of:
//! - an allow-listed git command (`git-receive-pack`, `git-upload-pack`,
//!   `git-upload-archive`) or the `cvs server` shim, as requested with `-c`;
//! - an executable the administrator put in the account's
//!   `git-shell-commands/` directory;
//! - an interactive prompt limited to that directory, when it exists.
//!
//! There are no pipelines, redirections or expansions, and one command per
//! line. The main entry point is [`Interpreter`]; [`Mode`] decides which of
//! the above applies to a process invocation.

mod builtin;
pub mod command;
mod complete;
pub mod env;
pub mod error;
mod external;
mod interpreter;
mod invocation;
mod io_adapters;
mod lexer;
mod resolver;

pub use builtin::{ALLOWLIST, AllowlistEntry, Handler, lookup, normalize};
pub use command::{CommandLine, ExitCode, ExitStatus, RunOptions, Runner};
pub use complete::{CompletionGenerator, CompletionSession};
pub use env::Environment;
pub use error::{QuoteError, RunError, ShellError, TokenizeError};
pub use external::{ProcessRunner, find_command_path, spawn_piped};
pub use interpreter::{EXIT_KEYWORDS, Interpreter, PROMPT};
pub use invocation::{CVS_SHIM_COMMAND, Mode};
pub use io_adapters::{LineEditor, LineReader, PlainInput, ReadOutcome, ensure_standard_fds};
pub use lexer::{dequote_single, split_cmdline};
pub use resolver::{HelpMode, help_command, is_valid_command_name, resolve};
