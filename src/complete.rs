//! Tab completion backed by the command directory's help command.
//!
//! The line editor asks for candidates one at a time and never says when it
//! gives up on a cycle. [`CompletionGenerator`] therefore keeps at most one
//! [`CompletionSession`] alive and tears the previous one down whenever a new
//! cycle starts, exhausted or not.

use crate::command::CommandLine;
use crate::env::Environment;
use crate::external::{spawn_piped, wait_for};
use crate::resolver::{HelpMode, help_command};
use std::io::{self, BufRead, BufReader, Lines};
use std::process::{Child, ChildStdout};
use tracing::debug;

/// A running helper process and the reader over its standard output.
///
/// Dropping the session closes the pipe and reaps the child. A session that
/// was not read to the end kills its child first.
pub struct CompletionSession {
    child: Child,
    lines: Option<Lines<BufReader<ChildStdout>>>,
    exhausted: bool,
}

impl CompletionSession {
    fn start(cmd: &CommandLine, env: &Environment) -> io::Result<Self> {
        let mut child = spawn_piped(cmd, env)?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("helper stdout was not captured"))?;
        debug!(pid = child.id(), "completion helper started");
        Ok(Self {
            child,
            lines: Some(BufReader::new(stdout).lines()),
            exhausted: false,
        })
    }

    /// Next non-empty line, or `None` once the stream is over.
    fn next_line(&mut self) -> Option<String> {
        let lines = self.lines.as_mut()?;
        loop {
            match lines.next() {
                Some(Ok(line)) if line.is_empty() => continue,
                Some(Ok(line)) => return Some(line),
                Some(Err(e)) => {
                    debug!(error = %e, "completion helper output unreadable");
                    break;
                }
                None => break,
            }
        }
        self.exhausted = true;
        None
    }

    /// Process id of the helper.
    pub fn pid(&self) -> u32 {
        self.child.id()
    }
}

impl Drop for CompletionSession {
    fn drop(&mut self) {
        if !self.exhausted {
            let _ = self.child.kill();
        }
        self.lines = None;
        let status = wait_for(&mut self.child);
        debug!(pid = self.child.id(), ?status, "completion helper reaped");
    }
}

/// Restartable producer of completion candidates.
pub struct CompletionGenerator {
    env: Environment,
    session: Option<CompletionSession>,
}

impl CompletionGenerator {
    pub fn new(env: Environment) -> Self {
        Self { env, session: None }
    }

    /// Produce the next candidate for `partial`.
    ///
    /// `first` starts a new cycle: any live session is torn down and a fresh
    /// helper is started with `partial` as its filter. Every call then hands
    /// out one line of the helper's output; `None` means the cycle is over
    /// (or never started because the helper could not be run).
    pub fn next(&mut self, partial: &str, first: bool) -> Option<String> {
        if first {
            if let Some(stale) = self.session.take() {
                debug!(pid = stale.pid(), "abandoning previous completion session");
            }
            let cmd = help_command(&self.env, HelpMode::Complete(partial));
            match CompletionSession::start(&cmd, &self.env) {
                Ok(session) => self.session = Some(session),
                Err(e) => {
                    debug!(error = %e, "no completion helper");
                    return None;
                }
            }
        }

        let session = self.session.as_mut()?;
        match session.next_line() {
            Some(line) => Some(line),
            None => {
                self.session = None;
                None
            }
        }
    }

    /// Run a whole cycle and collect every candidate.
    pub fn candidates(&mut self, partial: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut first = true;
        while let Some(candidate) = self.next(partial, first) {
            out.push(candidate);
            first = false;
        }
        out
    }

    /// Process id of the live helper, if a cycle is in progress.
    pub fn session_pid(&self) -> Option<u32> {
        self.session.as_ref().map(CompletionSession::pid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn with_helper(body: &str) -> (TempDir, CompletionGenerator) {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("git-shell-commands");
        fs::create_dir(&dir).unwrap();
        let help = dir.join("help");
        fs::write(&help, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&help, fs::Permissions::from_mode(0o755)).unwrap();
        let env = Environment::isolated(tmp.path(), "/usr/bin:/bin");
        (tmp, CompletionGenerator::new(env))
    }

    const LISTING: &str = r#"[ "$1" = --complete ] || exit 1
for c in backup bundle list; do
  case "$c" in "$2"*) echo "$c" ;; esac
done"#;

    fn is_gone(pid: u32) -> bool {
        kill(Pid::from_raw(pid as i32), None) == Err(Errno::ESRCH)
    }

    #[test]
    fn hands_out_one_candidate_per_call() {
        let (_tmp, mut generator) = with_helper(LISTING);
        assert_eq!(generator.next("b", true).as_deref(), Some("backup"));
        assert_eq!(generator.next("b", false).as_deref(), Some("bundle"));
        assert_eq!(generator.next("b", false), None);
        assert_eq!(generator.session_pid(), None);
        assert_eq!(generator.next("b", false), None);
    }

    #[test]
    fn empty_partial_lists_everything() {
        let (_tmp, mut generator) = with_helper(LISTING);
        assert_eq!(generator.candidates(""), vec!["backup", "bundle", "list"]);
        assert_eq!(generator.candidates("l"), vec!["list"]);
        assert!(generator.candidates("zzz").is_empty());
    }

    #[test]
    fn exhausted_helper_is_reaped() {
        let (_tmp, mut generator) = with_helper(LISTING);
        assert!(generator.next("list", true).is_some());
        let pid = generator.session_pid().unwrap();
        assert_eq!(generator.next("list", false), None);
        assert!(is_gone(pid));
    }

    #[test]
    fn restarting_tears_down_the_abandoned_session() {
        let (_tmp, mut generator) = with_helper("echo one\necho two\nexec sleep 30");
        assert_eq!(generator.next("", true).as_deref(), Some("one"));
        let first_pid = generator.session_pid().unwrap();

        assert_eq!(generator.next("", true).as_deref(), Some("one"));
        let second_pid = generator.session_pid().unwrap();

        assert_ne!(first_pid, second_pid);
        assert!(is_gone(first_pid), "first helper leaked");
        assert!(!is_gone(second_pid));

        drop(generator);
        assert!(is_gone(second_pid), "helper outlived its generator");
    }

    #[test]
    fn blank_lines_are_skipped() {
        let (_tmp, mut generator) = with_helper("echo\necho a\necho\necho b");
        assert_eq!(generator.candidates(""), vec!["a", "b"]);
    }

    #[test]
    fn missing_helper_yields_nothing() {
        let tmp = TempDir::new().unwrap();
        let mut generator = CompletionGenerator::new(Environment::isolated(tmp.path(), "/bin"));
        assert_eq!(generator.next("b", true), None);
        assert_eq!(generator.session_pid(), None);
        assert_eq!(generator.next("b", false), None);
    }
}
