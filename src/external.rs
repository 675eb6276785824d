//! Running programs as child processes: `PATH` lookup against an explicit
//! environment, spawning, and turning wait statuses into [`ExitStatus`].

use crate::command::{CommandLine, ExitStatus, RunOptions, Runner};
use crate::env::Environment;
use crate::error::RunError;
use std::ffi::OsStr;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use tracing::{debug, warn};

/// [`Runner`] backed by real child processes with inherited stdio.
#[derive(Debug, Default)]
pub struct ProcessRunner;

impl Runner for ProcessRunner {
    fn run(
        &mut self,
        cmd: &CommandLine,
        env: &Environment,
        opts: RunOptions,
    ) -> Result<ExitStatus, RunError> {
        let program = match locate(cmd, env) {
            Some(program) => program,
            None => {
                let err = RunError::NotFound(cmd.program.clone());
                if !opts.silent_exec_failure {
                    eprintln!("error: {err}");
                }
                return Err(err);
            }
        };
        debug!(program = %program.display(), args = ?cmd.args, "spawning");

        let stderr = if opts.suppress_stderr {
            Stdio::null()
        } else {
            Stdio::inherit()
        };
        let spawned = command_for(&program, cmd, env)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(stderr)
            .spawn();
        let mut child = match spawned {
            Ok(child) => child,
            Err(e) if is_not_found(&e) => {
                let err = RunError::NotFound(cmd.program.clone());
                if !opts.silent_exec_failure {
                    eprintln!("error: {err}");
                }
                return Err(err);
            }
            Err(e) => {
                eprintln!("error: cannot run {}: {e}", cmd.program.display());
                return Ok(ExitStatus::WaitFailed);
            }
        };

        Ok(wait_for(&mut child))
    }
}

/// Spawn `cmd` with its standard output captured and everything else nulled.
///
/// This is the asynchronous primitive the completion helper is started with;
/// the caller owns the child and must reap it.
pub fn spawn_piped(cmd: &CommandLine, env: &Environment) -> io::Result<Child> {
    let program = locate(cmd, env).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} not found", cmd.program.display()),
        )
    })?;
    command_for(&program, cmd, env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
}

/// Block until `child` exits, retrying transparently when a signal interrupts
/// the wait.
pub fn wait_for(child: &mut Child) -> ExitStatus {
    loop {
        match child.wait() {
            Ok(status) => return map_status(status),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!(pid = child.id(), error = %e, "waitpid failed");
                return ExitStatus::WaitFailed;
            }
        }
    }
}

/// Translate the raw OS status into [`ExitStatus`].
pub fn map_status(status: std::process::ExitStatus) -> ExitStatus {
    if let Some(code) = status.code() {
        ExitStatus::Exited((code & 0xff) as u8)
    } else if let Some(signal) = status.signal() {
        ExitStatus::Signaled(signal)
    } else {
        ExitStatus::WaitFailed
    }
}

fn command_for(program: &Path, cmd: &CommandLine, env: &Environment) -> Command {
    let mut command = Command::new(program);
    command
        .args(&cmd.args)
        .env_clear()
        .envs(&env.vars)
        .current_dir(&env.current_dir);
    command
}

fn locate(cmd: &CommandLine, env: &Environment) -> Option<PathBuf> {
    let search_paths = env.var_os("PATH").unwrap_or_default();
    find_command_path(search_paths, &env.current_dir, &cmd.program)
}

fn is_not_found(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied
    )
}

/// Resolve a program path the way `execvp` would, but against an explicit
/// `PATH` and working directory instead of the process-wide ones.
///
/// Behavior:
/// - Absolute path: returns it if it is an executable file.
/// - Relative with multiple components (e.g., `git-shell-commands/help`):
///   resolved against `base`.
/// - Single path component (no separators): search each directory in
///   `search_paths` and return the first executable match.
/// - Empty path: returns `None`.
pub fn find_command_path(search_paths: &OsStr, base: &Path, path: &Path) -> Option<PathBuf> {
    if path.is_absolute() {
        return find_by_path(path);
    }

    let mut components = path.components();
    let first = components.next();
    let second = components.next();
    match (first, second) {
        (None, None) => None,
        (Some(x), None) => find_in_path(search_paths, x.as_os_str()),
        _ => find_by_path(&base.join(path)),
    }
}

fn find_in_path(search_paths: &OsStr, cmd: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(search_paths)
        .filter(|dir| !dir.as_os_str().is_empty())
        .find_map(|dir| find_by_path(&dir.join(cmd)))
}

fn find_by_path(path: &Path) -> Option<PathBuf> {
    let meta = std::fs::metadata(path).ok()?;
    if meta.is_file() && meta.permissions().mode() & 0o111 != 0 {
        Some(path.to_path_buf())
    } else {
        None
    }
}
