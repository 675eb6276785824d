//! The environment children of the shell are started in.

use std::collections::HashMap;
use std::env as stdenv;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

/// Directory, relative to the working directory, holding the pluggable commands.
pub const COMMAND_DIR: &str = "git-shell-commands";

/// Name of the banner/completion helper inside [`COMMAND_DIR`].
pub const HELP_COMMAND: &str = "help";

/// Variable naming the directory that holds git's own executables.
pub const EXEC_PATH_VAR: &str = "GIT_EXEC_PATH";

/// User-level view of the process environment handed to every child.
#[derive(Debug, Clone)]
pub struct Environment {
    /// Variables visible to executed commands, byte-exact as the shell
    /// received them (names and values need not be UTF-8).
    pub vars: HashMap<OsString, OsString>,
    /// The working directory for command execution, normally `$HOME` of the
    /// account the shell logs into.
    pub current_dir: PathBuf,
    /// Where pluggable commands live, relative to `current_dir`.
    pub command_dir: PathBuf,
    /// Git's exec path from `GIT_EXEC_PATH`, prepended to `PATH` for relays.
    pub exec_path: Option<PathBuf>,
    /// Directory of the running executable, also prepended for relays.
    pub argv0_dir: Option<PathBuf>,
}

impl Environment {
    /// Capture the current process state into a new `Environment` instance.
    ///
    /// Variables come from `std::env::vars_os()`, the working directory from
    /// `std::env::current_dir()` and the argv0 directory from the running
    /// executable.
    pub fn new() -> Self {
        let vars: HashMap<OsString, OsString> = stdenv::vars_os().collect();
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let exec_path = vars
            .get(OsStr::new(EXEC_PATH_VAR))
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);
        let argv0_dir = stdenv::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));
        Self {
            vars,
            current_dir,
            command_dir: PathBuf::from(COMMAND_DIR),
            exec_path,
            argv0_dir,
        }
    }

    /// Environment rooted at `dir` with only the given `PATH`.
    ///
    /// Used where the caller wants full control over what children see.
    pub fn isolated(dir: impl Into<PathBuf>, path: &str) -> Self {
        let mut vars = HashMap::new();
        vars.insert(OsString::from("PATH"), OsString::from(path));
        Self {
            vars,
            current_dir: dir.into(),
            command_dir: PathBuf::from(COMMAND_DIR),
            exec_path: None,
            argv0_dir: None,
        }
    }

    /// Value of `key`, lossily converted to UTF-8.
    pub fn get_var(&self, key: &str) -> Option<String> {
        self.var_os(key).map(|v| v.to_string_lossy().into_owned())
    }

    /// Raw value of `key`.
    pub fn var_os(&self, key: &str) -> Option<&OsStr> {
        self.vars.get(OsStr::new(key)).map(OsString::as_os_str)
    }

    pub fn set_var(&mut self, key: impl Into<OsString>, val: impl Into<OsString>) {
        self.vars.insert(key.into(), val.into());
    }

    /// Absolute location of the pluggable command directory.
    pub fn command_dir(&self) -> PathBuf {
        self.current_dir.join(&self.command_dir)
    }

    /// Copy of this environment with git's exec path and the executable's own
    /// directory in front of `PATH`.
    ///
    /// Only the command being relayed gets the copy; the session keeps its
    /// own `PATH`. Directories already present are not added twice.
    pub fn with_exec_path(&self) -> Self {
        let mut env = self.clone();
        let current = self.var_os("PATH").unwrap_or_default();
        let mut dirs: Vec<PathBuf> = stdenv::split_paths(current).collect();
        let extra = [self.argv0_dir.clone(), self.exec_path.clone()];
        for dir in extra.into_iter().flatten() {
            if !dirs.contains(&dir) {
                dirs.insert(0, dir);
            }
        }
        match stdenv::join_paths(dirs) {
            Ok(joined) => env.set_var("PATH", joined),
            Err(err) => tracing::warn!(%err, "cannot extend PATH"),
        }
        env
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use crate::env::Environment;
    use std::ffi::OsString;
    use std::os::unix::ffi::OsStringExt;
    use std::path::PathBuf;

    #[test]
    fn test_env_set_and_get_var() {
        let mut env = Environment::isolated("/tmp", "/bin");

        // initially absent
        assert_eq!(env.get_var("SOME_RANDOM_ENV_VAR_12345"), None);

        env.set_var("KEY", "VALUE");

        assert_eq!(env.get_var("KEY"), Some("VALUE".to_string()));
    }

    #[test]
    fn test_env_reads_from_process_env() {
        let env = Environment::new();
        assert!(env.get_var("PATH").is_some());
    }

    #[test]
    fn non_utf8_values_are_kept_verbatim() {
        let mut env = Environment::isolated("/tmp", "/bin");
        let raw = OsString::from_vec(vec![b'a', 0xff, b'b']);
        env.set_var("RAW", raw.clone());
        assert_eq!(env.var_os("RAW"), Some(raw.as_os_str()));
    }

    #[test]
    fn exec_path_is_prepended_once() {
        let mut env = Environment::isolated("/tmp", "/usr/bin:/bin");
        env.exec_path = Some(PathBuf::from("/opt/git/libexec"));

        let relay = env.with_exec_path().with_exec_path();

        assert_eq!(
            relay.get_var("PATH").as_deref(),
            Some("/opt/git/libexec:/usr/bin:/bin")
        );
        assert_eq!(env.get_var("PATH").as_deref(), Some("/usr/bin:/bin"));
    }

    #[test]
    fn without_extra_dirs_path_is_unchanged() {
        let env = Environment::isolated("/tmp", "/usr/bin:/bin");
        assert_eq!(
            env.with_exec_path().get_var("PATH").as_deref(),
            Some("/usr/bin:/bin")
        );
    }

    #[test]
    fn command_dir_is_relative_to_working_dir() {
        let env = Environment::isolated("/home/git", "/bin");
        assert_eq!(
            env.command_dir(),
            PathBuf::from("/home/git/git-shell-commands")
        );
    }
}
