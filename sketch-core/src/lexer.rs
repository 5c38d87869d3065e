//! Lexer for the drawing language.
//!
//! Produces [`Token`]s from a byte buffer on demand, with arbitrary
//! look-ahead through a FIFO cache.
//!
//! # Token production rules
//!
//! | Input                  | Token produced                       |
//! |------------------------|--------------------------------------|
//! | `123`, `3.14`, `1.`    | `Number`                             |
//! | `"a\nb"`               | `Str` (escapes decoded by the parser)|
//! | `abc`, `x_1`           | `Ident`                              |
//! | `origin`, `FOR`        | `Keyword(..)` (case-insensitive)     |
//! | `;`, `(`, `**`, …      | `Op(..)`                             |
//! | `// …` or `-- …`       | Skipped to end of line               |
//! | NUL byte               | Warning, skipped                     |
//! | anything else          | `Unknown` plus an error diagnostic   |
//!
//! The lexer never fails: malformed input yields a diagnostic plus a
//! best-effort token, and lexing always terminates at end of input.

use std::collections::VecDeque;

use crate::diag::{DiagEngine, DiagKind};
use crate::token::{Keyword, Op, Span, Token, TokenKind};

/// Lexer over a source buffer.
pub struct Lexer<'a> {
    /// Source bytes (borrowed from the [`crate::source::SourceBuffer`]).
    src: &'a [u8],
    /// Current byte position.
    pos: usize,
    /// Diagnostic sink.
    diag: &'a DiagEngine<'a>,
    /// Tokens lexed ahead of the consumer.
    cache: VecDeque<Token>,
}

impl<'a> Lexer<'a> {
    /// Create a lexer over `src`.
    #[must_use]
    pub fn new(src: &'a [u8], diag: &'a DiagEngine<'a>) -> Self {
        Self {
            src,
            pos: 0,
            diag,
            cache: VecDeque::new(),
        }
    }

    /// The diagnostic engine this lexer reports into.
    #[must_use]
    pub fn diag_engine(&self) -> &'a DiagEngine<'a> {
        self.diag
    }

    /// Return the next token and remove it from the stream.
    pub fn next(&mut self) -> Token {
        if let Some(tok) = self.cache.pop_front() {
            tok
        } else {
            self.lex_raw()
        }
    }

    /// Return the `k`th token of look-ahead (0 = the token `next` would
    /// return) without consuming anything.
    pub fn peek(&mut self, k: usize) -> &Token {
        while self.cache.len() <= k {
            let tok = self.lex_raw();
            self.cache.push_back(tok);
        }
        &self.cache[k]
    }

    /// Discard the front of the stream.
    pub fn consume(&mut self) {
        let _ = self.next();
    }

    /// Abandon the rest of the current line.
    ///
    /// Cached tokens belonging to the current line are dropped and replaced
    /// by a single zero-width `Unknown` token that anchors column math for
    /// the caller; tokens already lexed from following lines are kept. When
    /// nothing beyond the line break has been lexed yet, the cursor is
    /// repositioned to the character after the next `\n`.
    pub fn advance_to_eol(&mut self) {
        // A newline already inside the cached stream: drop the current
        // line's tokens and anchor at the break.
        for i in 1..self.cache.len() {
            let gap = &self.src[self.cache[i - 1].span.end..self.cache[i].span.start];
            if gap.contains(&b'\n') {
                let anchor_at = self.cache[i - 1].span.end;
                self.cache.drain(..i);
                self.cache.push_front(Self::anchor(anchor_at));
                return;
            }
        }
        if let Some(last) = self.cache.back() {
            let gap = &self.src[last.span.end..self.pos.max(last.span.end)];
            if gap.contains(&b'\n') {
                let anchor_at = last.span.end;
                self.cache.clear();
                self.cache.push_front(Self::anchor(anchor_at));
                return;
            }
        }
        // Nothing cached past the break: skip raw input to the next line.
        self.cache.clear();
        while self.pos < self.src.len() && self.src[self.pos] != b'\n' {
            self.pos += 1;
        }
        if self.pos < self.src.len() {
            self.pos += 1;
        }
        self.cache
            .push_back(Self::anchor(self.pos.saturating_sub(1)));
    }

    fn anchor(pos: usize) -> Token {
        Token {
            kind: TokenKind::Unknown,
            span: Span::at(pos),
            lexeme: String::new(),
        }
    }

    // -- raw lexing --

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn cur(&self) -> u8 {
        self.src[self.pos]
    }

    fn make_token(&self, kind: TokenKind, start: usize) -> Token {
        Token {
            kind,
            span: Span::new(start, self.pos),
            lexeme: String::from_utf8_lossy(&self.src[start..self.pos]).into_owned(),
        }
    }

    /// Lex one token from the byte stream.
    fn lex_raw(&mut self) -> Token {
        loop {
            if self.at_end() {
                return Token::eof(self.pos);
            }
            let start = self.pos;
            let c = self.cur();
            self.pos += 1;
            let op = match c {
                0 => {
                    self.diag
                        .create_at(DiagKind::NullInFile, start)
                        .finish();
                    continue;
                }
                b' ' | b'\t' | b'\r' | b'\n' | 0x0B | 0x0C => {
                    self.skip_whitespace();
                    continue;
                }
                b'0'..=b'9' => return self.lex_number(start),
                b'A'..=b'Z' | b'a'..=b'z' | b'_' => return self.lex_identifier(start),
                b'"' => return self.lex_string(start),
                b'(' => Op::LParen,
                b')' => Op::RParen,
                b'{' => Op::LBrace,
                b'}' => Op::RBrace,
                b',' => Op::Comma,
                b';' => Op::Semi,
                b'+' => Op::Plus,
                b'*' => {
                    if !self.at_end() && self.cur() == b'*' {
                        self.pos += 1;
                        Op::StarStar
                    } else {
                        Op::Star
                    }
                }
                b'-' => {
                    if !self.at_end() && self.cur() == b'-' {
                        self.skip_line_comment();
                        continue;
                    }
                    Op::Minus
                }
                b'/' => {
                    if !self.at_end() && self.cur() == b'/' {
                        self.skip_line_comment();
                        continue;
                    }
                    Op::Slash
                }
                _ => {
                    self.diag
                        .create_at(DiagKind::UnknownChar, start)
                        .arg_char(char::from(c))
                        .finish();
                    return self.make_token(TokenKind::Unknown, start);
                }
            };
            return self.make_token(TokenKind::Op(op), start);
        }
    }

    fn skip_whitespace(&mut self) {
        while !self.at_end() && matches!(self.cur(), b' ' | b'\t' | b'\r' | b'\n' | 0x0B | 0x0C) {
            self.pos += 1;
        }
    }

    /// Skip a `//` or `--` comment. The cursor is on the second marker
    /// character.
    fn skip_line_comment(&mut self) {
        while !self.at_end() && self.cur() != b'\n' {
            self.pos += 1;
        }
        if !self.at_end() {
            self.pos += 1;
        }
    }

    /// Lex the rest of a numeric constant: `digit+ ('.' digit*)?`.
    fn lex_number(&mut self, start: usize) -> Token {
        while !self.at_end() && self.cur().is_ascii_digit() {
            self.pos += 1;
        }
        if !self.at_end() && self.cur() == b'.' {
            self.pos += 1;
            while !self.at_end() && self.cur().is_ascii_digit() {
                self.pos += 1;
            }
        }
        self.make_token(TokenKind::Number, start)
    }

    /// Lex the rest of an identifier and classify it against the keyword
    /// table (case-insensitive).
    fn lex_identifier(&mut self, start: usize) -> Token {
        while !self.at_end() && (self.cur().is_ascii_alphanumeric() || self.cur() == b'_') {
            self.pos += 1;
        }
        let mut tok = self.make_token(TokenKind::Ident, start);
        if let Some(kw) = Keyword::from_ident(&tok.lexeme) {
            tok.kind = TokenKind::Keyword(kw);
        }
        tok
    }

    /// Lex a string literal. The opening quote has been consumed.
    ///
    /// Escape sequences are kept verbatim in the lexeme (the parser decodes
    /// them); a backslash only matters here because it may hide a closing
    /// quote. An unterminated string produces a warning and a token ending
    /// at the line break.
    fn lex_string(&mut self, start: usize) -> Token {
        while !self.at_end() {
            match self.cur() {
                b'"' => {
                    self.pos += 1;
                    return self.make_token(TokenKind::Str, start);
                }
                b'\n' => break,
                b'\\' => {
                    if self.pos + 1 < self.src.len() && self.src[self.pos + 1] != b'\n' {
                        self.pos += 2;
                    } else {
                        self.pos += 1;
                    }
                }
                _ => self.pos += 1,
            }
        }
        self.diag
            .create_range(DiagKind::UnterminatedString, start, self.pos)
            .finish();
        self.make_token(TokenKind::Str, start)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
