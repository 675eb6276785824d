//! Lexical helpers for command lines typed at the restricted shell.
//!
//! Two small state machines live here: [`split_cmdline`], which turns a line
//! into an argument vector, and [`dequote_single`], which undoes the strict
//! single-quoting git clients apply to repository paths. Neither performs any
//! expansion; there are no variables or substitutions in this shell.

use crate::error::{QuoteError, TokenizeError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    Start,
    ReadingWord,
    ReadingSingleQuote,
    ReadingDoubleQuote,
}

struct LexingFSM {
    input: Vec<char>,
    pos: usize,
    state: LexingState,
    buffer: String,
}

impl LexingFSM {
    fn new(line: &str) -> Self {
        LexingFSM {
            input: line.chars().collect(),
            pos: 0,
            state: LexingState::Start,
            buffer: String::new(),
        }
    }

    /// Runs the machine to completion and returns the words.
    ///
    /// Words are separated by runs of whitespace outside quotes. Single quotes
    /// preserve everything literally; inside double quotes and unquoted text a
    /// backslash takes the next character literally.
    fn make_words(&mut self) -> Result<Vec<String>, TokenizeError> {
        let mut out = Vec::new();

        while let Some(ch) = self.read_char() {
            match self.state {
                LexingState::Start => self.handle_start(ch)?,
                LexingState::ReadingWord => self.handle_word(ch, &mut out)?,
                LexingState::ReadingSingleQuote => self.handle_single_quote(ch),
                LexingState::ReadingDoubleQuote => self.handle_double_quote(ch)?,
            }
        }

        match self.state {
            LexingState::ReadingSingleQuote | LexingState::ReadingDoubleQuote => {
                return Err(TokenizeError::UnclosedQuote);
            }
            LexingState::ReadingWord => out.push(std::mem::take(&mut self.buffer)),
            LexingState::Start => {}
        }

        Ok(out)
    }

    fn read_char(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn read_escaped(&mut self) -> Result<char, TokenizeError> {
        self.read_char().ok_or(TokenizeError::TrailingBackslash)
    }

    fn handle_start(&mut self, ch: char) -> Result<(), TokenizeError> {
        match ch {
            c if c.is_whitespace() => {}
            '\'' => self.state = LexingState::ReadingSingleQuote,
            '"' => self.state = LexingState::ReadingDoubleQuote,
            '\\' => {
                let c = self.read_escaped()?;
                self.buffer.push(c);
                self.state = LexingState::ReadingWord;
            }
            c => {
                self.buffer.push(c);
                self.state = LexingState::ReadingWord;
            }
        }
        Ok(())
    }

    fn handle_word(&mut self, ch: char, out: &mut Vec<String>) -> Result<(), TokenizeError> {
        match ch {
            c if c.is_whitespace() => {
                out.push(std::mem::take(&mut self.buffer));
                self.state = LexingState::Start;
            }
            '\'' => self.state = LexingState::ReadingSingleQuote,
            '"' => self.state = LexingState::ReadingDoubleQuote,
            '\\' => {
                let c = self.read_escaped()?;
                self.buffer.push(c);
            }
            c => self.buffer.push(c),
        }
        Ok(())
    }

    fn handle_single_quote(&mut self, ch: char) {
        match ch {
            '\'' => self.state = LexingState::ReadingWord,
            c => self.buffer.push(c),
        }
    }

    fn handle_double_quote(&mut self, ch: char) -> Result<(), TokenizeError> {
        match ch {
            '"' => self.state = LexingState::ReadingWord,
            '\\' => {
                let c = self.read_escaped()?;
                self.buffer.push(c);
            }
            c => self.buffer.push(c),
        }
        Ok(())
    }
}

/// Split a command line into words.
///
/// An empty or all-blank line yields an empty vector. A quoted empty string
/// (`''`) is a word of its own.
pub fn split_cmdline(line: &str) -> Result<Vec<String>, TokenizeError> {
    LexingFSM::new(line).make_words()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DequoteState {
    Quoted,
    AfterQuote,
}

/// Undo git's single-quote escaping of a single argument.
///
/// The accepted grammar is strict: the whole argument must be one or more
/// single-quoted runs, joined only by `\'` or `\!` escapes (`'a'\''b'` is
/// `a'b`). Anything else, including unquoted text or trailing garbage, is
/// rejected so a client cannot smuggle extra words past the relay handlers.
pub fn dequote_single(arg: &str) -> Result<String, QuoteError> {
    let mut chars = arg.chars();
    if chars.next() != Some('\'') {
        return Err(QuoteError::MissingOpeningQuote);
    }

    let mut out = String::with_capacity(arg.len());
    let mut state = DequoteState::Quoted;
    loop {
        match state {
            DequoteState::Quoted => match chars.next() {
                None => return Err(QuoteError::UnterminatedQuote),
                Some('\'') => state = DequoteState::AfterQuote,
                Some(c) => out.push(c),
            },
            DequoteState::AfterQuote => match chars.next() {
                None => return Ok(out),
                Some('\\') => {
                    let escaped = chars.next();
                    let reopen = chars.next();
                    match (escaped, reopen) {
                        (Some(c @ ('\'' | '!')), Some('\'')) => {
                            out.push(c);
                            state = DequoteState::Quoted;
                        }
                        _ => return Err(QuoteError::BadEscape),
                    }
                }
                Some(_) => return Err(QuoteError::BadEscape),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(line: &str) -> Vec<String> {
        split_cmdline(line).expect("line should split")
    }

    #[test]
    fn splits_on_whitespace_runs() {
        assert_eq!(words("backup  --full\tnow"), vec!["backup", "--full", "now"]);
    }

    #[test]
    fn blank_line_has_no_words() {
        assert!(words("").is_empty());
        assert!(words("   ").is_empty());
    }

    #[test]
    fn single_quotes_are_literal() {
        assert_eq!(words(r#"list 'a b\c "d"'"#), vec!["list", r#"a b\c "d""#]);
    }

    #[test]
    fn double_quotes_honor_backslash() {
        assert_eq!(words(r#"say "x \"y\" z""#), vec!["say", r#"x "y" z"#]);
    }

    #[test]
    fn adjacent_quoted_runs_form_one_word() {
        assert_eq!(words(r#"a'b c'"d e"f"#), vec!["ab cd ef"]);
    }

    #[test]
    fn unquoted_backslash_escapes_space() {
        assert_eq!(words(r"my\ file x"), vec!["my file", "x"]);
    }

    #[test]
    fn empty_quotes_make_an_empty_word() {
        assert_eq!(words("rm ''"), vec!["rm", ""]);
    }

    #[test]
    fn unclosed_quotes_fail() {
        assert_eq!(split_cmdline("rm 'oops"), Err(TokenizeError::UnclosedQuote));
        assert_eq!(split_cmdline("rm \"oops"), Err(TokenizeError::UnclosedQuote));
    }

    #[test]
    fn trailing_backslash_fails() {
        assert_eq!(split_cmdline("rm x\\"), Err(TokenizeError::TrailingBackslash));
        assert_eq!(split_cmdline("rm \"x\\"), Err(TokenizeError::TrailingBackslash));
    }

    #[test]
    fn dequote_plain() {
        assert_eq!(dequote_single("'/srv/repo.git'").unwrap(), "/srv/repo.git");
        assert_eq!(dequote_single("''").unwrap(), "");
    }

    #[test]
    fn dequote_escaped_quote_and_bang() {
        assert_eq!(dequote_single(r"'a'\''b'").unwrap(), "a'b");
        assert_eq!(dequote_single(r"'a'\!'b'").unwrap(), "a!b");
    }

    #[test]
    fn dequote_keeps_spaces_inside_quotes() {
        assert_eq!(dequote_single("'my repo.git'").unwrap(), "my repo.git");
    }

    #[test]
    fn dequote_rejects_malformed() {
        assert_eq!(dequote_single("/srv/repo.git"), Err(QuoteError::MissingOpeningQuote));
        assert_eq!(dequote_single(""), Err(QuoteError::MissingOpeningQuote));
        assert_eq!(dequote_single("'unterminated"), Err(QuoteError::UnterminatedQuote));
        assert_eq!(dequote_single("'a' 'b'"), Err(QuoteError::BadEscape));
        assert_eq!(dequote_single(r"'a'\x'b'"), Err(QuoteError::BadEscape));
        assert_eq!(dequote_single(r"'a'\'"), Err(QuoteError::BadEscape));
        assert_eq!(dequote_single("'a'b"), Err(QuoteError::BadEscape));
    }
}
