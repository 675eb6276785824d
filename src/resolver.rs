//! Resolution of names typed by the user to executables in the command
//! directory.

use crate::command::CommandLine;
use crate::env::{Environment, HELP_COMMAND};
use crate::error::ShellError;

/// Flag passed to the help command when it is asked for completions.
pub const COMPLETE_FLAG: &str = "--complete";

/// Whether `name` may be looked up in the command directory.
///
/// Names containing `/` or `.` are refused outright. This is the only thing
/// standing between a user and `../../bin/sh`, and it has to hold before any
/// path is built.
pub fn is_valid_command_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['/', '.'])
}

/// Build the command line for `argv` as a pluggable command.
///
/// `argv[0]` names the executable inside the command directory, the rest are
/// passed through untouched.
pub fn resolve(env: &Environment, argv: &[String]) -> Result<CommandLine, ShellError> {
    let (name, rest) = argv
        .split_first()
        .ok_or_else(|| ShellError::InvalidCommandName(String::new()))?;
    if !is_valid_command_name(name) {
        return Err(ShellError::InvalidCommandName(name.clone()));
    }
    Ok(CommandLine::new(env.command_dir().join(name), rest.to_vec()))
}

/// Ways the help command gets invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelpMode<'a> {
    /// Print the greeting shown when an interactive session starts.
    Banner,
    /// List the command names starting with the given text, one per line.
    Complete(&'a str),
}

/// The help command of the command directory in the given mode.
pub fn help_command(env: &Environment, mode: HelpMode<'_>) -> CommandLine {
    let args = match mode {
        HelpMode::Banner => Vec::new(),
        HelpMode::Complete(partial) => vec![COMPLETE_FLAG.to_string(), partial.to_string()],
    };
    CommandLine::new(env.command_dir().join(HELP_COMMAND), args)
}
