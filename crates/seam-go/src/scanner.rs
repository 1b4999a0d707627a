//! Scanner for Go source files.
//!
//! Produces a token stream with Go's automatic semicolon insertion applied,
//! plus the side tables the parser and loader need: doc comment groups and
//! `//go:embed` patterns.
//!
//! Scan errors do not abort; the scanner records them and keeps going so a
//! single malformed file degrades to a parse warning instead of sinking the
//! whole package.

use thiserror::Error;

use crate::token::{keyword, Token, TokenKind};

// ============================================================================
// Error Types
// ============================================================================

/// A recoverable scan error with its 1-based line.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("line {line}: {message}")]
pub struct ScanError {
    pub line: u32,
    pub message: String,
}

// ============================================================================
// Comment Groups
// ============================================================================

/// A contiguous run of `//` comments with no blank lines or tokens between.
///
/// The parser attaches a group ending on line `N` as the doc comment of a
/// declaration or field starting on line `N + 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentGroup {
    /// Comment text with `//` markers and one leading space stripped,
    /// lines joined by `\n`.
    pub text: String,
    /// 1-based line of the group's last comment.
    pub end_line: u32,
}

// ============================================================================
// Scan Output
// ============================================================================

/// Everything scanned from one source file.
#[derive(Debug, Default)]
pub struct ScanOutput {
    pub tokens: Vec<Token>,
    pub comments: Vec<CommentGroup>,
    /// Patterns collected from `//go:embed` directives, in source order.
    pub embed_patterns: Vec<String>,
    pub errors: Vec<ScanError>,
}

/// Scan a Go source file into tokens and side tables.
pub fn scan(src: &str) -> ScanOutput {
    Scanner::new(src).run()
}

// ============================================================================
// Scanner
// ============================================================================

struct Scanner {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    out: ScanOutput,
    /// Kind of the last significant token, for semicolon insertion.
    last_kind: Option<TokenKind>,
    /// Line of the last emitted token, to tell trailing comments from docs.
    last_token_line: u32,
    /// Pending comment group: (lines, start_line, end_line).
    group: Option<(Vec<String>, u32)>,
}

impl Scanner {
    fn new(src: &str) -> Self {
        Scanner {
            chars: src.chars().collect(),
            pos: 0,
            line: 1,
            out: ScanOutput::default(),
            last_kind: None,
            last_token_line: 0,
            group: None,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn error(&mut self, message: impl Into<String>) {
        let line = self.line;
        self.out.errors.push(ScanError {
            line,
            message: message.into(),
        });
    }

    fn emit(&mut self, kind: TokenKind, text: &str) {
        self.out.tokens.push(Token::new(kind, text, self.line));
        self.last_kind = Some(kind);
        self.last_token_line = self.line;
    }

    /// Insert a semicolon if the last token allows statement termination.
    fn maybe_insert_semicolon(&mut self) {
        if let Some(kind) = self.last_kind {
            if kind.terminates_statement() {
                self.out
                    .tokens
                    .push(Token::new(TokenKind::Semicolon, "", self.line));
                self.last_kind = Some(TokenKind::Semicolon);
            }
        }
    }

    fn flush_group(&mut self) {
        if let Some((lines, end_line)) = self.group.take() {
            self.out.comments.push(CommentGroup {
                text: lines.join("\n"),
                end_line,
            });
        }
    }

    fn add_comment_line(&mut self, text: &str, line: u32) {
        // A comment trailing code on the same line never becomes a doc.
        if line == self.last_token_line && self.last_token_line != 0 {
            return;
        }
        if let Some(rest) = text.strip_prefix("go:") {
            // Directive comments are excluded from doc text.
            if let Some(patterns) = rest.strip_prefix("embed ") {
                for pat in patterns.split_whitespace() {
                    self.out.embed_patterns.push(pat.to_string());
                }
            }
            return;
        }
        let cleaned = text.strip_prefix(' ').unwrap_or(text).to_string();
        match &mut self.group {
            Some((lines, end_line)) if *end_line + 1 == line => {
                lines.push(cleaned);
                *end_line = line;
            }
            _ => {
                self.flush_group();
                self.group = Some((vec![cleaned], line));
            }
        }
    }

    fn run(mut self) -> ScanOutput {
        while let Some(c) = self.peek() {
            match c {
                ' ' | '\t' | '\r' => {
                    self.pos += 1;
                }
                '\n' => {
                    self.bump();
                    self.maybe_insert_semicolon();
                }
                '/' if self.peek_at(1) == Some('/') => self.scan_line_comment(),
                '/' if self.peek_at(1) == Some('*') => self.scan_block_comment(),
                c if c == '_' || c.is_alphabetic() => self.scan_ident(),
                c if c.is_ascii_digit() => self.scan_number(),
                '"' => self.scan_string(),
                '`' => self.scan_raw_string(),
                '\'' => self.scan_rune(),
                _ => self.scan_operator(),
            }
        }
        // EOF acts like a final newline.
        self.maybe_insert_semicolon();
        self.flush_group();
        let line = self.line;
        self.out.tokens.push(Token::new(TokenKind::Eof, "", line));
        self.out
    }

    fn scan_line_comment(&mut self) {
        let line = self.line;
        self.pos += 2;
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        self.add_comment_line(&text, line);
    }

    fn scan_block_comment(&mut self) {
        let start_line = self.line;
        self.pos += 2;
        loop {
            match self.peek() {
                None => {
                    self.error("unterminated block comment");
                    return;
                }
                Some('*') if self.peek_at(1) == Some('/') => {
                    self.pos += 2;
                    break;
                }
                _ => {
                    self.bump();
                }
            }
        }
        // A general comment spanning lines acts like a newline.
        if self.line > start_line {
            self.maybe_insert_semicolon();
            self.flush_group();
        }
    }

    fn scan_ident(&mut self) {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == '_' || c.is_alphanumeric() {
                self.pos += 1;
            } else {
                break;
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        match keyword(&text) {
            Some(kind) => self.emit(kind, &text),
            None => self.emit(TokenKind::Ident, &text),
        }
    }

    fn scan_number(&mut self) {
        let start = self.pos;
        let mut is_float = false;
        let mut prev = '\0';
        while let Some(c) = self.peek() {
            let take = match c {
                '0'..='9' | 'a'..='d' | 'f' | 'A'..='D' | 'F' | 'x' | 'X' | 'o' | 'O' | '_' => {
                    true
                }
                'e' | 'E' => true,
                '.' => {
                    // Do not swallow `..` (start of an ellipsis after an int).
                    if self.peek_at(1) == Some('.') {
                        false
                    } else {
                        is_float = true;
                        true
                    }
                }
                '+' | '-' => prev == 'e' || prev == 'E',
                _ => false,
            };
            if !take {
                break;
            }
            prev = c;
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        let lower = text.to_ascii_lowercase();
        if !lower.starts_with("0x") && (is_float || lower.contains('e')) {
            self.emit(TokenKind::Float, &text);
        } else {
            self.emit(TokenKind::Int, &text);
        }
    }

    fn scan_string(&mut self) {
        let start = self.pos;
        self.pos += 1;
        loop {
            match self.peek() {
                None | Some('\n') => {
                    self.error("unterminated string literal");
                    break;
                }
                Some('\\') => {
                    self.pos += 1;
                    if self.peek().is_some() {
                        self.pos += 1;
                    }
                }
                Some('"') => {
                    self.pos += 1;
                    break;
                }
                _ => {
                    self.pos += 1;
                }
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        self.emit(TokenKind::Str, &text);
    }

    fn scan_raw_string(&mut self) {
        let start = self.pos;
        self.pos += 1;
        loop {
            match self.peek() {
                None => {
                    self.error("unterminated raw string literal");
                    break;
                }
                Some('`') => {
                    self.pos += 1;
                    break;
                }
                _ => {
                    self.bump();
                }
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        self.emit(TokenKind::Str, &text);
    }

    fn scan_rune(&mut self) {
        let start = self.pos;
        self.pos += 1;
        loop {
            match self.peek() {
                None | Some('\n') => {
                    self.error("unterminated rune literal");
                    break;
                }
                Some('\\') => {
                    self.pos += 1;
                    if self.peek().is_some() {
                        self.pos += 1;
                    }
                }
                Some('\'') => {
                    self.pos += 1;
                    break;
                }
                _ => {
                    self.pos += 1;
                }
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        self.emit(TokenKind::Rune, &text);
    }

    fn scan_operator(&mut self) {
        let c = self.chars[self.pos];
        let c1 = self.peek_at(1);
        let c2 = self.peek_at(2);

        // Longest match first.
        let (kind, len): (TokenKind, usize) = match (c, c1, c2) {
            ('&', Some('^'), Some('=')) => (TokenKind::OpAssign, 3),
            ('<', Some('<'), Some('=')) => (TokenKind::OpAssign, 3),
            ('>', Some('>'), Some('=')) => (TokenKind::OpAssign, 3),
            ('.', Some('.'), Some('.')) => (TokenKind::Ellipsis, 3),
            (':', Some('='), _) => (TokenKind::Define, 2),
            ('<', Some('-'), _) => (TokenKind::Arrow, 2),
            ('=', Some('='), _) => (TokenKind::Eq, 2),
            ('!', Some('='), _) => (TokenKind::NotEq, 2),
            ('<', Some('='), _) => (TokenKind::LtEq, 2),
            ('>', Some('='), _) => (TokenKind::GtEq, 2),
            ('&', Some('&'), _) => (TokenKind::AndAnd, 2),
            ('|', Some('|'), _) => (TokenKind::OrOr, 2),
            ('<', Some('<'), _) => (TokenKind::Shl, 2),
            ('>', Some('>'), _) => (TokenKind::Shr, 2),
            ('&', Some('^'), _) => (TokenKind::AndNot, 2),
            ('+', Some('+'), _) => (TokenKind::Inc, 2),
            ('-', Some('-'), _) => (TokenKind::Dec, 2),
            ('+', Some('='), _)
            | ('-', Some('='), _)
            | ('*', Some('='), _)
            | ('/', Some('='), _)
            | ('%', Some('='), _)
            | ('&', Some('='), _)
            | ('|', Some('='), _)
            | ('^', Some('='), _) => (TokenKind::OpAssign, 2),
            ('(', _, _) => (TokenKind::LParen, 1),
            (')', _, _) => (TokenKind::RParen, 1),
            ('{', _, _) => (TokenKind::LBrace, 1),
            ('}', _, _) => (TokenKind::RBrace, 1),
            ('[', _, _) => (TokenKind::LBracket, 1),
            (']', _, _) => (TokenKind::RBracket, 1),
            (',', _, _) => (TokenKind::Comma, 1),
            (';', _, _) => (TokenKind::Semicolon, 1),
            (':', _, _) => (TokenKind::Colon, 1),
            ('.', _, _) => (TokenKind::Dot, 1),
            ('=', _, _) => (TokenKind::Assign, 1),
            ('*', _, _) => (TokenKind::Star, 1),
            ('&', _, _) => (TokenKind::Amp, 1),
            ('+', _, _) => (TokenKind::Plus, 1),
            ('-', _, _) => (TokenKind::Minus, 1),
            ('/', _, _) => (TokenKind::Slash, 1),
            ('%', _, _) => (TokenKind::Percent, 1),
            ('|', _, _) => (TokenKind::Pipe, 1),
            ('^', _, _) => (TokenKind::Caret, 1),
            ('<', _, _) => (TokenKind::Lt, 1),
            ('>', _, _) => (TokenKind::Gt, 1),
            ('!', _, _) => (TokenKind::Not, 1),
            ('~', _, _) => (TokenKind::Tilde, 1),
            _ => {
                self.error(format!("unexpected character {:?}", c));
                self.pos += 1;
                return;
            }
        };
        let text: String = self.chars[self.pos..self.pos + len].iter().collect();
        self.pos += len;
        self.emit(kind, &text);
    }
}

// ============================================================================
// Tests
// ============================================================================
