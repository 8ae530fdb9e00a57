//! Lexer for the MARC query mini-language.
//!
//! Queries look like `if leader[7] == "m" extract "245a"` and are tokenized one
//! token at a time with a single token of pushback. Malformed input never
//! fails the lexer; it shows up as [`Token::InvalidInput`].
//!
//! # Examples
//!
//! ```
//! use marc_engine::{Token, Tokenizer};
//!
//! let mut tokenizer = Tokenizer::new("leader[7] == \"m\"");
//! assert_eq!(tokenizer.get_token(), Token::Leader);
//! assert_eq!(tokenizer.get_token(), Token::OpenBracket);
//! assert_eq!(tokenizer.get_token(), Token::UnsignedConst(7));
//! ```

use crate::error::{MarcError, Result};
use std::fmt;

/// A lexical token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// `leader`
    Leader,
    /// `if`
    If,
    /// `extract`
    Extract,
    /// `exists`
    Exists,
    /// `is_missing`
    IsMissing,
    /// `[`
    OpenBracket,
    /// `]`
    CloseBracket,
    /// `-`
    Hyphen,
    /// `=`
    Equal,
    /// `==`
    EqualEqual,
    /// `!=`
    NotEqual,
    /// `===`, compares within a single field
    SingleFieldEqual,
    /// `!==`, compares within a single field
    SingleFieldNotEqual,
    /// `*`
    Star,
    /// Double-quoted string literal, escapes resolved
    StringConst(String),
    /// Unsigned integer literal
    UnsignedConst(u32),
    /// Anything the lexer cannot make sense of
    InvalidInput,
    /// No more input
    EndOfInput,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Leader => f.write_str("leader"),
            Token::If => f.write_str("if"),
            Token::Extract => f.write_str("extract"),
            Token::Exists => f.write_str("exists"),
            Token::IsMissing => f.write_str("is_missing"),
            Token::OpenBracket => f.write_str("["),
            Token::CloseBracket => f.write_str("]"),
            Token::Hyphen => f.write_str("-"),
            Token::Equal => f.write_str("="),
            Token::EqualEqual => f.write_str("=="),
            Token::NotEqual => f.write_str("!="),
            Token::SingleFieldEqual => f.write_str("==="),
            Token::SingleFieldNotEqual => f.write_str("!=="),
            Token::Star => f.write_str("*"),
            Token::StringConst(s) => write!(f, "{s:?}"),
            Token::UnsignedConst(n) => write!(f, "{n}"),
            Token::InvalidInput => f.write_str("invalid input"),
            Token::EndOfInput => f.write_str("end of input"),
        }
    }
}

fn keyword(word: &str) -> Option<Token> {
    match word {
        "leader" => Some(Token::Leader),
        "if" => Some(Token::If),
        "extract" => Some(Token::Extract),
        "exists" => Some(Token::Exists),
        "is_missing" => Some(Token::IsMissing),
        _ => None,
    }
}

/// Single-pass tokenizer with one token of lookahead.
#[derive(Debug, Clone)]
pub struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
    pushed_back: Option<Token>,
    last_token: Option<Token>,
}

impl<'a> Tokenizer<'a> {
    /// Create a tokenizer over `input`.
    pub fn new(input: &'a str) -> Self {
        Tokenizer {
            input,
            pos: 0,
            pushed_back: None,
            last_token: None,
        }
    }

    /// Byte offset of the next unread character.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Return the next token, or the token pushed back by [`unget_token`](Self::unget_token).
    pub fn get_token(&mut self) -> Token {
        let token = match self.pushed_back.take() {
            Some(token) => token,
            None => self.scan(),
        };
        self.last_token = Some(token.clone());
        token
    }

    /// Push the most recently returned token back.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::CallerMisuse`] if nothing was read since the last
    /// call, since only one token can be pushed back.
    pub fn unget_token(&mut self) -> Result<()> {
        if self.pushed_back.is_some() {
            return Err(MarcError::CallerMisuse(
                "unget_token() called twice in a row".to_string(),
            ));
        }
        let token = self.last_token.take().ok_or_else(|| {
            MarcError::CallerMisuse("unget_token() called before get_token()".to_string())
        })?;
        self.pushed_back = Some(token);
        Ok(())
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn scan(&mut self) -> Token {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }

        let Some(c) = self.bump() else {
            return Token::EndOfInput;
        };
        match c {
            '[' => Token::OpenBracket,
            ']' => Token::CloseBracket,
            '-' => Token::Hyphen,
            '*' => Token::Star,
            '=' => {
                if !self.eat('=') {
                    Token::Equal
                } else if self.eat('=') {
                    Token::SingleFieldEqual
                } else {
                    Token::EqualEqual
                }
            },
            '!' => {
                if !self.eat('=') {
                    Token::InvalidInput
                } else if self.eat('=') {
                    Token::SingleFieldNotEqual
                } else {
                    Token::NotEqual
                }
            },
            '"' => self.scan_string(),
            '0'..='9' => self.scan_unsigned(c),
            c if c.is_ascii_alphabetic() || c == '_' => self.scan_word(),
            _ => Token::InvalidInput,
        }
    }

    fn scan_string(&mut self) -> Token {
        let mut value = String::new();
        loop {
            match self.bump() {
                None => return Token::InvalidInput,
                Some('"') => return Token::StringConst(value),
                Some('\\') => match self.bump() {
                    Some('\\') => value.push('\\'),
                    Some('"') => value.push('"'),
                    Some('n') => value.push('\n'),
                    _ => return Token::InvalidInput,
                },
                Some(c) => value.push(c),
            }
        }
    }

    fn scan_unsigned(&mut self, first: char) -> Token {
        let start = self.pos - first.len_utf8();
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
        match self.input[start..self.pos].parse() {
            Ok(n) => Token::UnsignedConst(n),
            Err(_) => Token::InvalidInput,
        }
    }

    fn scan_word(&mut self) -> Token {
        let start = self.pos - 1;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            self.bump();
        }
        keyword(&self.input[start..self.pos]).unwrap_or(Token::InvalidInput)
    }
}
