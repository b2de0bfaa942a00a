//! Token dispenser for the line-oriented directive syntax.
//!
//! Input is split into whitespace-delimited tokens, each remembering the line it came
//! from. `#` starts a comment that runs to the end of the line, and standalone `{` / `}`
//! tokens open and close blocks. A directive is a name followed by arguments on the
//! same line:
//!
//! ```text
//! encode {
//!     zstd best 256KiB
//! }
//! ```
//!
//! Modules consume their own directive through a [`Dispenser`]: `next` advances to any
//! following token, `next_arg` only to an argument on the current line, and `val`
//! returns the current token text.

use crate::error::EncodeError;

/// A single token with the line it appeared on (1-based).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub line: usize,
}

impl Token {
    fn is_brace(&self) -> bool {
        self.text == "{" || self.text == "}"
    }
}

/// Cursor over a token sequence.
#[derive(Clone, Debug)]
pub struct Dispenser {
    file: String,
    tokens: Vec<Token>,
    cursor: Option<usize>,
}

impl Dispenser {
    /// Creates a dispenser positioned before the first token.
    pub fn new(file: impl Into<String>, tokens: Vec<Token>) -> Self {
        Self {
            file: file.into(),
            tokens,
            cursor: None,
        }
    }

    /// Splits `input` into tokens and returns a dispenser over them.
    pub fn tokenize(file: impl Into<String>, input: &str) -> Self {
        let mut tokens = Vec::new();
        for (idx, line) in input.lines().enumerate() {
            for word in line.split_whitespace() {
                if word.starts_with('#') {
                    break;
                }
                tokens.push(Token {
                    text: word.to_string(),
                    line: idx + 1,
                });
            }
        }
        Self::new(file, tokens)
    }

    /// Advances to the next token, on any line. Returns `false` at end of input.
    pub fn next(&mut self) -> bool {
        let next = self.cursor.map_or(0, |c| c + 1);
        if next < self.tokens.len() {
            self.cursor = Some(next);
            true
        } else {
            false
        }
    }

    /// Advances only if the next token is an argument on the current line.
    ///
    /// Before the first token this behaves like [`Dispenser::next`].
    pub fn next_arg(&mut self) -> bool {
        let Some(cursor) = self.cursor else {
            return self.next();
        };
        let current_line = self.tokens[cursor].line;
        match self.tokens.get(cursor + 1) {
            Some(next) if next.line == current_line && !next.is_brace() => {
                self.cursor = Some(cursor + 1);
                true
            }
            _ => false,
        }
    }

    /// Text of the current token, or `""` before the first token.
    pub fn val(&self) -> &str {
        self.current().map_or("", |t| t.text.as_str())
    }

    /// Text of the token after the current one, without advancing.
    pub fn peek(&self) -> Option<&str> {
        let next = self.cursor.map_or(0, |c| c + 1);
        self.tokens.get(next).map(|t| t.text.as_str())
    }

    /// Line of the current token, or of the first token before iteration starts.
    pub fn line(&self) -> usize {
        self.current()
            .or_else(|| self.tokens.first())
            .map_or(0, |t| t.line)
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    /// Consumes the remaining arguments on the current line and returns their text.
    pub fn remaining_args(&mut self) -> Vec<String> {
        let mut args = Vec::new();
        while self.next_arg() {
            args.push(self.val().to_string());
        }
        args
    }

    /// Splits off the current directive (current token plus its arguments) into a
    /// fresh dispenser positioned before its first token. `self` ends up on the last
    /// argument consumed.
    pub fn segment(&mut self) -> Dispenser {
        let Some(first) = self.current().cloned() else {
            return Dispenser::new(self.file.clone(), Vec::new());
        };
        let mut tokens = vec![first];
        while self.next_arg() {
            if let Some(token) = self.current() {
                tokens.push(token.clone());
            }
        }
        Dispenser::new(self.file.clone(), tokens)
    }

    /// Tags `source` with the current file and line.
    pub fn err(&self, source: EncodeError) -> EncodeError {
        EncodeError::Directive {
            file: self.file.clone(),
            line: self.line(),
            source: Box::new(source),
        }
    }

    /// Builds a located syntax error from a message.
    pub fn errf(&self, msg: impl Into<String>) -> EncodeError {
        self.err(EncodeError::Syntax(msg.into()))
    }

    fn current(&self) -> Option<&Token> {
        self.cursor.and_then(|c| self.tokens.get(c))
    }
}
