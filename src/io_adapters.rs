use crate::complete::CompletionGenerator;
use crate::env::Environment;
use crate::error::ShellError;
use nix::fcntl::{OFlag, open};
use nix::sys::stat::Mode;
use nix::unistd::{close, dup};
use rustyline::completion::Completer;
use rustyline::config::{Behavior, Config};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};
use std::cell::RefCell;
use std::io::{BufRead, Write};

/// Make sure descriptors 0, 1 and 2 are open.
///
/// A login shell may be started with some of them closed. Anything opened
/// later (a diagnostic, a pipe for a child) would then land on 0-2 and be
/// clobbered or inherited by accident. `/dev/null` is dup'ed until a
/// descriptor above 2 comes back, and that one is closed again.
pub fn ensure_standard_fds() -> Result<(), ShellError> {
    let mut fd = open("/dev/null", OFlag::O_RDWR, Mode::empty()).map_err(ShellError::DevNull)?;
    while (0..=2).contains(&fd) {
        fd = dup(fd).map_err(ShellError::DevNull)?;
    }
    close(fd).map_err(ShellError::DevNull)
}

/// Result of asking for one line of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Line(String),
    /// Ctrl-C at the prompt; the partial line is gone.
    Interrupted,
    Eof,
}

/// Source of input lines for the interactive loop.
pub trait LineReader {
    /// Show `prompt` and block until a line, an interrupt or end of input.
    fn read_line(&mut self, prompt: &str) -> anyhow::Result<ReadOutcome>;

    /// Remember `line` for recall. Sources without history ignore it.
    fn add_history(&mut self, _line: &str) {}
}

/// Plain blocking reads, no history and no completion.
///
/// The prompt goes to `prompt_out`, which is stderr in production so that
/// nothing but command output ever reaches stdout.
pub struct PlainInput<R, W> {
    input: R,
    prompt_out: W,
}

impl<R: BufRead, W: Write> PlainInput<R, W> {
    pub fn new(input: R, prompt_out: W) -> Self {
        Self { input, prompt_out }
    }
}

impl<R: BufRead, W: Write> LineReader for PlainInput<R, W> {
    fn read_line(&mut self, prompt: &str) -> anyhow::Result<ReadOutcome> {
        write!(self.prompt_out, "{prompt}")?;
        self.prompt_out.flush()?;

        let mut buf = Vec::new();
        if self.input.read_until(b'\n', &mut buf)? == 0 {
            return Ok(ReadOutcome::Eof);
        }
        Ok(ReadOutcome::Line(String::from_utf8_lossy(&buf).into_owned()))
    }
}

/// rustyline helper offering command names from the completion generator.
pub struct ShellHelper {
    generator: RefCell<CompletionGenerator>,
}

impl ShellHelper {
    pub fn new(generator: CompletionGenerator) -> Self {
        Self {
            generator: RefCell::new(generator),
        }
    }
}

impl Completer for ShellHelper {
    type Candidate = String;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        let start = word_start(line, pos);
        let candidates = self.generator.borrow_mut().candidates(&line[start..pos]);
        Ok((start, candidates))
    }
}

impl Hinter for ShellHelper {
    type Hint = String;

    fn hint(&self, _line: &str, _pos: usize, _ctx: &Context<'_>) -> Option<String> {
        None
    }
}

impl Highlighter for ShellHelper {}

impl Validator for ShellHelper {}

impl Helper for ShellHelper {}

/// Byte offset where the word under the cursor begins.
fn word_start(line: &str, pos: usize) -> usize {
    line[..pos]
        .char_indices()
        .rev()
        .find(|(_, c)| c.is_whitespace())
        .map_or(0, |(i, c)| i + c.len_utf8())
}

/// Line editing with history and tab completion.
pub struct LineEditor {
    editor: Editor<ShellHelper, DefaultHistory>,
}

impl LineEditor {
    /// Set up rustyline with completions drawn from `env`'s help command.
    pub fn new(env: &Environment) -> rustyline::Result<Self> {
        let mut editor = Editor::with_config(editor_config())?;
        editor.set_helper(Some(ShellHelper::new(CompletionGenerator::new(
            env.clone(),
        ))));
        Ok(Self { editor })
    }
}

/// The editor talks to the controlling terminal directly, so like
/// [`PlainInput`] it never writes its prompt to stdout.
fn editor_config() -> Config {
    Config::builder().behavior(Behavior::PreferTerm).build()
}

impl LineReader for LineEditor {
    fn read_line(&mut self, prompt: &str) -> anyhow::Result<ReadOutcome> {
        match self.editor.readline(prompt) {
            Ok(line) => Ok(ReadOutcome::Line(line)),
            Err(ReadlineError::Interrupted) => Ok(ReadOutcome::Interrupted),
            Err(ReadlineError::Eof) => Ok(ReadOutcome::Eof),
            Err(err) => Err(err.into()),
        }
    }

    fn add_history(&mut self, line: &str) {
        if let Err(err) = self.editor.add_history_entry(line) {
            tracing::debug!(%err, "history entry dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn plain_input_prompts_and_reads_lines() {
        let mut prompts = Vec::new();
        let mut input = PlainInput::new(Cursor::new(b"one\ntwo".to_vec()), &mut prompts);

        assert_eq!(input.read_line("git> ").unwrap(), ReadOutcome::Line("one\n".into()));
        assert_eq!(input.read_line("git> ").unwrap(), ReadOutcome::Line("two".into()));
        assert_eq!(input.read_line("git> ").unwrap(), ReadOutcome::Eof);
        drop(input);

        assert_eq!(String::from_utf8(prompts).unwrap(), "git> git> git> ");
    }

    #[test]
    fn plain_input_tolerates_invalid_utf8() {
        let mut input = PlainInput::new(Cursor::new(vec![b'a', 0xff, b'\n']), Vec::new());
        assert_eq!(
            input.read_line("").unwrap(),
            ReadOutcome::Line("a\u{fffd}\n".into())
        );
    }

    #[test]
    fn word_start_finds_current_word() {
        assert_eq!(word_start("bac", 3), 0);
        assert_eq!(word_start("backup li", 9), 7);
        assert_eq!(word_start("backup ", 7), 7);
        assert_eq!(word_start("backup li", 3), 0);
        assert_eq!(word_start("é\u{3000}ba", "é\u{3000}ba".len()), "é\u{3000}".len());
    }

    #[test]
    fn editor_uses_the_terminal_not_stdout() {
        assert_eq!(editor_config().behavior(), Behavior::PreferTerm);
    }

    #[test]
    fn standard_fds_fixup_is_harmless_when_open() {
        ensure_standard_fds().unwrap();
        ensure_standard_fds().unwrap();
    }
}
