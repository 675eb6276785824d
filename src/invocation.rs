//! Deciding what the shell was asked to do from its argument vector.

use crate::error::ShellError;
use nix::unistd::{AccessFlags, access};
use std::ffi::OsString;
use std::path::Path;
use tracing::debug;

/// The literal argument remote CVS clients pass in place of `-c`. It is also
/// the command line dispatched for [`Mode::CvsShim`].
pub const CVS_SHIM_COMMAND: &str = "cvs server";

/// What this process will do, decided once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// `git-shell "cvs server"`.
    CvsShim,
    /// `git-shell -c "<cmd> [arg]"`.
    SingleCommand(String),
    /// `git-shell` with no arguments.
    Interactive,
}

impl Mode {
    /// Classify the process arguments (`args[0]` being the program name).
    ///
    /// Interactive mode is only granted when `command_dir` is readable and
    /// searchable by the invoking user.
    pub fn classify(args: Vec<OsString>, command_dir: &Path) -> Result<Self, ShellError> {
        let args = args
            .into_iter()
            .map(OsString::into_string)
            .collect::<Result<Vec<String>, _>>()
            .map_err(|_| ShellError::Usage)?;

        let mode = match args.as_slice() {
            [_, single] if single == CVS_SHIM_COMMAND => Mode::CvsShim,
            [_] => {
                if access(command_dir, AccessFlags::R_OK | AccessFlags::X_OK).is_err() {
                    return Err(ShellError::InteractiveDisabled);
                }
                Mode::Interactive
            }
            [_, flag, raw] if flag == "-c" => Mode::SingleCommand(raw.clone()),
            _ => return Err(ShellError::Usage),
        };
        debug!(?mode, "classified invocation");
        Ok(mode)
    }

    /// The raw command string to dispatch, for the single-shot modes.
    pub fn raw_command(&self) -> Option<&str> {
        match self {
            Mode::CvsShim => Some(CVS_SHIM_COMMAND),
            Mode::SingleCommand(raw) => Some(raw),
            Mode::Interactive => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::ffi::OsStringExt;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn argv(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    fn enabled_dir() -> TempDir {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("git-shell-commands")).unwrap();
        tmp
    }

    #[test]
    fn cvs_server_argument_selects_shim() {
        let mode = Mode::classify(argv(&["git-shell", "cvs server"]), Path::new("/nonexistent")).unwrap();
        assert_eq!(mode, Mode::CvsShim);
        assert_eq!(mode.raw_command(), Some("cvs server"));
    }

    #[test]
    fn dash_c_selects_single_command() {
        let mode = Mode::classify(
            argv(&["git-shell", "-c", "git-upload-pack '/r.git'"]),
            Path::new("/nonexistent"),
        )
        .unwrap();
        assert_eq!(mode, Mode::SingleCommand("git-upload-pack '/r.git'".into()));
        assert_eq!(mode.raw_command(), Some("git-upload-pack '/r.git'"));
    }

    #[test]
    fn no_arguments_selects_interactive_when_enabled() {
        let tmp = enabled_dir();
        let mode = Mode::classify(argv(&["git-shell"]), &tmp.path().join("git-shell-commands")).unwrap();
        assert_eq!(mode, Mode::Interactive);
        assert_eq!(mode.raw_command(), None);
    }

    #[test]
    fn no_arguments_without_command_dir_is_refused() {
        let tmp = TempDir::new().unwrap();
        let err = Mode::classify(argv(&["git-shell"]), &tmp.path().join("git-shell-commands")).unwrap_err();
        assert!(matches!(err, ShellError::InteractiveDisabled));
    }

    #[test]
    fn unsearchable_command_dir_is_refused() {
        // root bypasses permission bits, nothing to check there
        if nix::unistd::geteuid().is_root() {
            return;
        }
        let tmp = enabled_dir();
        let dir = tmp.path().join("git-shell-commands");
        fs::set_permissions(&dir, fs::Permissions::from_mode(0o600)).unwrap();
        let err = Mode::classify(argv(&["git-shell"]), &dir).unwrap_err();
        fs::set_permissions(&dir, fs::Permissions::from_mode(0o755)).unwrap();
        assert!(matches!(err, ShellError::InteractiveDisabled));
    }

    #[test]
    fn other_shapes_are_usage_errors() {
        let dir = Path::new("/nonexistent");
        for args in [
            argv(&["git-shell", "-c"]),
            argv(&["git-shell", "cvs"]),
            argv(&["git-shell", "-x", "ls"]),
            argv(&["git-shell", "-c", "ls", "extra"]),
            argv(&["git-shell", "cvs server", "x"]),
        ] {
            assert!(matches!(Mode::classify(args, dir), Err(ShellError::Usage)));
        }
    }

    #[test]
    fn non_utf8_argument_is_a_usage_error() {
        let args = vec![
            OsString::from("git-shell"),
            OsString::from("-c"),
            OsString::from_vec(vec![0x66, 0xff, 0x6f]),
        ];
        assert!(matches!(
            Mode::classify(args, Path::new("/nonexistent")),
            Err(ShellError::Usage)
        ));
    }
}
