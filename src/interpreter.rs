use crate::builtin::{ALLOWLIST, lookup, normalize};
use crate::command::{ExitStatus, RunOptions, Runner};
use crate::env::Environment;
use crate::error::ShellError;
use crate::external::ProcessRunner;
use crate::io_adapters::{LineEditor, LineReader, PlainInput, ReadOutcome};
use crate::lexer::split_cmdline;
use crate::resolver::{HelpMode, help_command, resolve};
use std::io::{self, Write};
use tracing::debug;

/// Prompt of the interactive loop.
pub const PROMPT: &str = "git> ";

/// Words that end an interactive session.
pub const EXIT_KEYWORDS: [&str; 4] = ["quit", "logout", "exit", "bye"];

/// Where the interactive loop is between two iterations.
#[derive(Debug)]
enum LoopState {
    AwaitingLine,
    Dispatching(String),
    Terminated,
}

/// The restricted command interpreter.
///
/// Holds the [`Environment`] children run in and the [`Runner`] that starts
/// them. The same dispatch path serves `-c` invocations and lines typed at
/// the interactive prompt: the allow-list is consulted first, then the
/// command directory.
///
/// Example
/// ```no_run
/// use git_shell::{Environment, Interpreter};
/// let mut sh = Interpreter::new(Environment::new());
/// let status = sh.dispatch("git-upload-pack '/srv/project.git'").unwrap();
/// std::process::exit(status.code());
/// ```
pub struct Interpreter<R: Runner = ProcessRunner> {
    env: Environment,
    runner: R,
}

impl Interpreter<ProcessRunner> {
    /// Create an interpreter that spawns real processes.
    pub fn new(env: Environment) -> Self {
        Self::with_runner(env, ProcessRunner)
    }
}

impl<R: Runner> Interpreter<R> {
    pub fn with_runner(env: Environment, runner: R) -> Self {
        Self { env, runner }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Run one command line and wait for it.
    ///
    /// Errors are everything that kept a child from being started at all; a
    /// child that ran and failed is an `Ok` with its status.
    pub fn dispatch(&mut self, raw: &str) -> Result<ExitStatus, ShellError> {
        let line = normalize(raw);
        if let Some((entry, arg)) = lookup(ALLOWLIST, &line) {
            let (cmd, relay_env) = entry.handler.plan(entry.name, arg, &self.env)?;
            debug!(%cmd, "relaying allow-listed command");
            return Ok(self.runner.run(&cmd, &relay_env, RunOptions::silent())?);
        }

        let argv = split_cmdline(&line).map_err(|source| ShellError::Tokenize {
            line: raw.to_string(),
            source,
        })?;
        let cmd = resolve(&self.env, &argv)?;
        debug!(%cmd, "running pluggable command");
        self.runner
            .run(&cmd, &self.env, RunOptions::silent())
            .map_err(|_| ShellError::CommandNotFound(argv[0].clone()))
    }

    /// Interactive session on the terminal.
    ///
    /// Uses `editor` when one could be set up, plain stdin otherwise. The
    /// editor is dropped, restoring the terminal, before this returns.
    pub fn repl(&mut self, editor: Option<LineEditor>) -> anyhow::Result<()> {
        match editor {
            Some(mut editor) => self.run_loop(&mut editor, &mut io::stderr()),
            None => {
                let stdin = io::stdin();
                let mut input = PlainInput::new(stdin.lock(), io::stderr());
                self.run_loop(&mut input, &mut io::stderr())
            }
        }
    }

    /// Drive the read-eval loop until an exit keyword or end of input.
    ///
    /// Diagnostics go to `diag`. Nothing a child does ends the loop.
    pub fn run_loop(
        &mut self,
        input: &mut dyn LineReader,
        diag: &mut dyn Write,
    ) -> anyhow::Result<()> {
        self.show_banner();

        let mut state = LoopState::AwaitingLine;
        loop {
            state = match state {
                LoopState::AwaitingLine => match input.read_line(PROMPT)? {
                    ReadOutcome::Line(line) => LoopState::Dispatching(line),
                    ReadOutcome::Interrupted => LoopState::AwaitingLine,
                    ReadOutcome::Eof => {
                        writeln!(diag)?;
                        LoopState::Terminated
                    }
                },
                LoopState::Dispatching(line) => self.eval_line(&line, input, diag)?,
                LoopState::Terminated => return Ok(()),
            };
        }
    }

    fn eval_line(
        &mut self,
        line: &str,
        input: &mut dyn LineReader,
        diag: &mut dyn Write,
    ) -> anyhow::Result<LoopState> {
        let line = line.trim();
        let argv = match split_cmdline(line) {
            Ok(argv) => argv,
            Err(err) => {
                writeln!(diag, "error: {err}")?;
                return Ok(LoopState::AwaitingLine);
            }
        };

        let prog = argv.first().map(String::as_str).unwrap_or_default();
        if prog.is_empty() {
            return Ok(LoopState::AwaitingLine);
        }
        if EXIT_KEYWORDS.contains(&prog) {
            return Ok(LoopState::Terminated);
        }

        input.add_history(line);
        match self.dispatch(line) {
            Ok(status) => debug!(?status, "command finished"),
            Err(err) => writeln!(diag, "{err}")?,
        }
        Ok(LoopState::AwaitingLine)
    }

    /// Best effort: a missing or failing help command is not an error.
    fn show_banner(&mut self) {
        let cmd = help_command(&self.env, HelpMode::Banner);
        let _ = self.runner.run(&cmd, &self.env, RunOptions::silent());
    }
}
