//! The allow-list of commands a restricted account may run outside its
//! command directory, and how each one is turned into a git invocation.

use crate::command::CommandLine;
use crate::env::Environment;
use crate::error::ShellError;
use crate::lexer::dequote_single;
use std::borrow::Cow;
use tracing::debug;

/// Program every allow-listed command is relayed to.
pub const GIT_PROGRAM: &str = "git";

/// Namespace prefix of the relayed command names.
const GIT_DASH: &str = "git-";

/// What an allow-listed command does once matched.
///
/// The set is closed on purpose: adding a handler means adding a variant and
/// a match arm here, never registering a callback at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    /// Run `git <name without "git-"> <dequoted argument>`.
    GenericRelay,
    /// Run `git cvsserver server`, only for the argument `server`.
    CvsServer,
}

impl Handler {
    /// Turn a matched entry and its argument into the command line to run and
    /// the environment to run it in.
    ///
    /// The returned environment is `env` with git's exec path in front of
    /// `PATH`; `env` itself is left alone so later commands of the session
    /// do not inherit it.
    pub fn plan(
        self,
        name: &str,
        arg: Option<&str>,
        env: &Environment,
    ) -> Result<(CommandLine, Environment), ShellError> {
        match self {
            Handler::GenericRelay => {
                let arg = arg
                    .and_then(|a| dequote_single(a).ok())
                    .ok_or(ShellError::BadArgument)?;
                let real_name = name
                    .strip_prefix(GIT_DASH)
                    .ok_or(ShellError::BadCommand)?;
                let cmd = CommandLine::new(GIT_PROGRAM, vec![real_name.to_string(), arg]);
                Ok((cmd, env.with_exec_path()))
            }
            Handler::CvsServer => {
                if arg != Some("server") {
                    return Err(ShellError::UnsupportedMode(
                        arg.unwrap_or_default().to_string(),
                    ));
                }
                let cmd = CommandLine::new(
                    GIT_PROGRAM,
                    vec!["cvsserver".to_string(), "server".to_string()],
                );
                Ok((cmd, env.with_exec_path()))
            }
        }
    }
}

/// A command name permitted to run, bound to its handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllowlistEntry {
    /// Dashed command name matched as a prefix of the normalized line.
    pub name: &'static str,
    /// What to do with the rest of the line.
    pub handler: Handler,
}

/// The commands a restricted account may run besides its command directory.
///
/// Order matters: [`lookup`] returns the first entry that matches.
pub const ALLOWLIST: &[AllowlistEntry] = &[
    AllowlistEntry {
        name: "git-receive-pack",
        handler: Handler::GenericRelay,
    },
    AllowlistEntry {
        name: "git-upload-pack",
        handler: Handler::GenericRelay,
    },
    AllowlistEntry {
        name: "git-upload-archive",
        handler: Handler::GenericRelay,
    },
    AllowlistEntry {
        name: "cvs",
        handler: Handler::CvsServer,
    },
];

/// Accept `"git foo"` as if the caller said `"git-foo"`.
///
/// Only the single whitespace character right after the leading `git` is
/// rewritten; everything else is left alone, so `"gitfoo"` stays as it is.
pub fn normalize(token: &str) -> Cow<'_, str> {
    if let Some(rest) = token.strip_prefix("git") {
        if let Some(sep) = rest.chars().next().filter(|c| c.is_whitespace()) {
            return Cow::Owned(format!("{GIT_DASH}{}", &rest[sep.len_utf8()..]));
        }
    }
    Cow::Borrowed(token)
}

/// Find the allow-list entry for `token`.
///
/// An entry matches when its name is a prefix of `token` and is followed
/// either by the end of the string, in which case there is no argument, or
/// by a single space, in which case everything after that space is the
/// argument, verbatim. Any other character after the prefix means the entry
/// does not match (`git-upload-packs` is not `git-upload-pack`). Entries are
/// tried in table order and the first match wins.
pub fn lookup<'t>(
    table: &'static [AllowlistEntry],
    token: &'t str,
) -> Option<(&'static AllowlistEntry, Option<&'t str>)> {
    for entry in table {
        let Some(rest) = token.strip_prefix(entry.name) else {
            continue;
        };
        let arg = if rest.is_empty() {
            None
        } else if let Some(arg) = rest.strip_prefix(' ') {
            Some(arg)
        } else {
            continue;
        };
        debug!(entry = entry.name, ?arg, "allow-list match");
        return Some((entry, arg));
    }
    None
}
