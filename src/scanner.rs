// src/scanner.rs

use crate::error::CompileErrorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Single-character tokens.
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    Comma,
    Dot,
    Minus,
    Plus,
    Semicolon,
    Slash,
    Star,

    // One or two character tokens.
    Bang,
    BangEqual,
    Equal,
    EqualEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,

    // Literals.
    Identifier,
    String,
    Number,

    // Keywords.
    And,
    Break,
    Class,
    Continue,
    Elif,
    Else,
    False,
    For,
    Fun,
    If,
    Nil,
    Or,
    Print,
    Return,
    Super,
    This,
    True,
    Var,
    While,

    Error(ScanError),
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanError {
    UnexpectedCharacter,
    UnterminatedString,
}

impl From<ScanError> for CompileErrorKind {
    fn from(err: ScanError) -> Self {
        match err {
            ScanError::UnexpectedCharacter => CompileErrorKind::UnexpectedCharacter,
            ScanError::UnterminatedString => CompileErrorKind::UnterminatedString,
        }
    }
}

static KEYWORDS: phf::Map<&'static str, TokenKind> = phf::phf_map! {
    "and" => TokenKind::And,
    "break" => TokenKind::Break,
    "class" => TokenKind::Class,
    "continue" => TokenKind::Continue,
    "elif" => TokenKind::Elif,
    "else" => TokenKind::Else,
    "false" => TokenKind::False,
    "for" => TokenKind::For,
    "fun" => TokenKind::Fun,
    "if" => TokenKind::If,
    "nil" => TokenKind::Nil,
    "or" => TokenKind::Or,
    "print" => TokenKind::Print,
    "return" => TokenKind::Return,
    "super" => TokenKind::Super,
    "this" => TokenKind::This,
    "true" => TokenKind::True,
    "var" => TokenKind::Var,
    "while" => TokenKind::While,
};

/// A token is a span into the scanner's source, never a copy of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub length: usize,
    pub line: u32,
}

impl Token {
    /// A placeholder used before the first token is scanned.
    pub fn synthetic() -> Self {
        Token { kind: TokenKind::Eof, start: 0, length: 0, line: 1 }
    }
}

pub struct Scanner {
    source: String,
    start: usize,
    current: usize,
    line: u32,
}

impl Scanner {
    pub fn new(source: &str) -> Self {
        Scanner {
            source: source.to_string(),
            start: 0,
            current: 0,
            line: 1,
        }
    }

    pub fn lexeme(&self, token: &Token) -> &str {
        if token.kind == TokenKind::Eof {
            return "";
        }
        &self.source[token.start..token.start + token.length]
    }

    pub fn scan_token(&mut self) -> Token {
        self.skip_whitespace();
        self.start = self.current;

        let Some(c) = self.advance() else {
            return self.make_token(TokenKind::Eof);
        };

        match c {
            b'(' => self.make_token(TokenKind::LeftParen),
            b')' => self.make_token(TokenKind::RightParen),
            b'{' => self.make_token(TokenKind::LeftBrace),
            b'}' => self.make_token(TokenKind::RightBrace),
            b',' => self.make_token(TokenKind::Comma),
            b'.' => self.make_token(TokenKind::Dot),
            b'-' => self.make_token(TokenKind::Minus),
            b'+' => self.make_token(TokenKind::Plus),
            b';' => self.make_token(TokenKind::Semicolon),
            b'/' => self.make_token(TokenKind::Slash),
            b'*' => self.make_token(TokenKind::Star),
            b'!' => self.make_pair(TokenKind::BangEqual, TokenKind::Bang),
            b'=' => self.make_pair(TokenKind::EqualEqual, TokenKind::Equal),
            b'<' => self.make_pair(TokenKind::LessEqual, TokenKind::Less),
            b'>' => self.make_pair(TokenKind::GreaterEqual, TokenKind::Greater),
            b'"' => self.string(),
            c if c.is_ascii_digit() => self.number(),
            c if is_alpha(c) => self.identifier(),
            _ => {
                // Swallow the rest of a multi-byte character so lexemes stay on char boundaries.
                while self.peek().is_some_and(|b| b & 0xC0 == 0x80) {
                    self.current += 1;
                }
                self.make_token(TokenKind::Error(ScanError::UnexpectedCharacter))
            }
        }
    }

    fn bytes(&self) -> &[u8] {
        self.source.as_bytes()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes().get(self.current).copied()
    }

    fn peek_next(&self) -> Option<u8> {
        self.bytes().get(self.current + 1).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.current += 1;
        Some(c)
    }

    fn matches(&mut self, expected: u8) -> bool {
        if self.peek() == Some(expected) {
            self.current += 1;
            true
        } else {
            false
        }
    }

    fn make_token(&self, kind: TokenKind) -> Token {
        Token {
            kind,
            start: self.start,
            length: self.current - self.start,
            line: self.line,
        }
    }

    fn make_pair(&mut self, with_equal: TokenKind, alone: TokenKind) -> Token {
        let kind = if self.matches(b'=') { with_equal } else { alone };
        self.make_token(kind)
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            match c {
                b' ' | b'\r' | b'\t' => self.current += 1,
                b'\n' => {
                    self.line += 1;
                    self.current += 1;
                }
                b'/' if self.peek_next() == Some(b'/') => {
                    while self.peek().is_some_and(|c| c != b'\n') {
                        self.current += 1;
                    }
                }
                _ => return,
            }
        }
    }

    fn string(&mut self) -> Token {
        // The token keeps its line at the opening quote.
        let line = self.line;
        while let Some(c) = self.peek() {
            if c == b'"' {
                break;
            }
            if c == b'\n' {
                self.line += 1;
            }
            self.current += 1;
        }
        if self.peek().is_none() {
            return Token { line, ..self.make_token(TokenKind::Error(ScanError::UnterminatedString)) };
        }
        self.current += 1;
        Token { line, ..self.make_token(TokenKind::String) }
    }

    fn number(&mut self) -> Token {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.current += 1;
        }
        if self.peek() == Some(b'.') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            self.current += 1;
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.current += 1;
            }
        }
        self.make_token(TokenKind::Number)
    }

    fn identifier(&mut self) -> Token {
        while self.peek().is_some_and(|c| is_alpha(c) || c.is_ascii_digit()) {
            self.current += 1;
        }
        let text = &self.source[self.start..self.current];
        let kind = KEYWORDS.get(text).copied().unwrap_or(TokenKind::Identifier);
        self.make_token(kind)
    }
}

fn is_alpha(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}
