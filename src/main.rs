use git_shell::{Environment, Interpreter, LineEditor, Mode, ShellError, ensure_standard_fds};
use std::io::IsTerminal;
use tracing_subscriber::EnvFilter;

/// Variable holding the log filter, e.g. `GIT_SHELL_LOG=debug`.
const LOG_ENV: &str = "GIT_SHELL_LOG";

fn main() {
    if let Err(err) = ensure_standard_fds() {
        die(&err);
    }
    init_logging();

    let env = Environment::new();
    let mode = match Mode::classify(std::env::args_os().collect(), &env.command_dir()) {
        Ok(mode) => mode,
        Err(err) => die(&err),
    };

    let mut shell = Interpreter::new(env);
    match mode.raw_command() {
        Some(raw) => match shell.dispatch(raw) {
            Ok(status) => std::process::exit(status.code()),
            Err(err) => die(&err),
        },
        None => {
            let editor = line_editor(shell.env());
            if let Err(err) = shell.repl(editor) {
                eprintln!("fatal: {err:#}");
                std::process::exit(128);
            }
        }
    }
}

fn init_logging() {
    // stdout carries the git protocol, logs must stay on stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Line editing when talking to a terminal; plain reads otherwise.
fn line_editor(env: &Environment) -> Option<LineEditor> {
    if !std::io::stdin().is_terminal() {
        return None;
    }
    LineEditor::new(env)
        .inspect_err(|err| tracing::debug!(%err, "line editing unavailable"))
        .ok()
}

fn die(err: &ShellError) -> ! {
    eprintln!("fatal: {err}");
    std::process::exit(err.exit_code())
}
