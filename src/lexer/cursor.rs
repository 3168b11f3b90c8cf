// Heavily inspired and referenced from `rustc_lexer` and adapted to suit the project.
// See https://doc.rust-lang.org/beta/nightly-rustc/src/rustc_lexer/cursor.rs.html

use std::str::Chars;

use crate::symbol::{Span, SrcOffset};

pub const EOF_CHAR: char = '\0';

/// Peekable iterator over a char sequence.
pub struct Cursor<'a> {
    src: &'a str,
    /// Iterator over chars in a &str
    chars: Chars<'a>,
    /// Start of the token currently being lexed
    token_start: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(src: &'a str) -> Cursor<'a> {
        Cursor {
            src,
            chars: src.chars(),
            token_start: 0,
        }
    }

    pub fn src(&self) -> &'a str {
        self.src
    }

    /// Byte offset of the cursor into the source.
    pub fn pos(&self) -> usize {
        self.src.len() - self.chars.as_str().len()
    }

    pub fn is_eof(&self) -> bool {
        self.chars.as_str().is_empty()
    }

    /// Peek the next character without consuming it.
    pub fn first(&self) -> char {
        self.chars.clone().next().unwrap_or(EOF_CHAR)
    }

    /// Advance by one character.
    pub fn bump(&mut self) -> Option<char> {
        self.chars.next()
    }

    /// Consume characters while the predicate holds.
    pub fn take_while(&mut self, mut pred: impl FnMut(char) -> bool) {
        while pred(self.first()) && !self.is_eof() {
            let _ = self.bump();
        }
    }

    /// Mark the current position as the start of the next token.
    pub fn start_token(&mut self) {
        self.token_start = self.pos();
    }

    /// Span from the last `start_token` call to the current position.
    pub fn token_span(&self) -> Span {
        Span::new(SrcOffset(self.token_start), self.pos() - self.token_start)
    }

    /// Source text of the token currently being lexed.
    pub fn token_str(&self) -> &'a str {
        &self.src[self.token_start..self.pos()]
    }
}
