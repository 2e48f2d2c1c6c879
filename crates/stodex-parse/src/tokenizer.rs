//! Scanner for the expolynomial expression grammar.
//!
//! The grammar is deliberately small: decimal literals, identifiers,
//! `+ - * / ^`, parentheses, and the `Exp(...)` builtin (recognized by the
//! parser, not here). Whitespace separates tokens and is dropped.

use std::error::Error;
use std::fmt::{self, Display};

/// A custom error type for the tokenizer.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenizerError {
    pub message: String,
    pub pos: usize,
}

impl Display for TokenizerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenizerError at {}: {}", self.pos, self.message)
    }
}

impl Error for TokenizerError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    Number,
    Ident,
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
}

impl Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// A token with its source span.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub value: String,
    pub token_type: TokenType,
    pub start: usize,
    pub end: usize,
}

impl Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} value: {}>", self.token_type, self.value)
    }
}

pub struct Tokenizer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    pub fn new(source: &'a str) -> Self {
        Tokenizer {
            source,
            bytes: source.as_bytes(),
            pos: 0,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, TokenizerError> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Option<Token>, TokenizerError> {
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
        if self.pos >= self.bytes.len() {
            return Ok(None);
        }

        let start = self.pos;
        let c = self.bytes[self.pos];
        let op = match c {
            b'+' => Some(TokenType::Plus),
            b'-' => Some(TokenType::Minus),
            b'*' => Some(TokenType::Star),
            b'/' => Some(TokenType::Slash),
            b'^' => Some(TokenType::Caret),
            b'(' => Some(TokenType::LParen),
            b')' => Some(TokenType::RParen),
            _ => None,
        };
        if let Some(tt) = op {
            self.pos += 1;
            return Ok(Some(self.token(tt, start)));
        }

        if c.is_ascii_digit() || c == b'.' {
            return self.scan_number(start).map(Some);
        }
        if c.is_ascii_alphabetic() || c == b'_' {
            while self.pos < self.bytes.len() && Self::is_ident(self.bytes[self.pos]) {
                self.pos += 1;
            }
            return Ok(Some(self.token(TokenType::Ident, start)));
        }

        Err(TokenizerError {
            message: format!("unexpected character '{}'", c as char),
            pos: start,
        })
    }

    fn scan_number(&mut self, start: usize) -> Result<Token, TokenizerError> {
        let mut seen_dot = false;
        while self.pos < self.bytes.len() {
            match self.bytes[self.pos] {
                b'0'..=b'9' => self.pos += 1,
                b'.' if !seen_dot => {
                    seen_dot = true;
                    self.pos += 1;
                }
                b'.' => {
                    return Err(TokenizerError {
                        message: "number with two decimal points".into(),
                        pos: self.pos,
                    });
                }
                _ => break,
            }
        }
        if &self.source[start..self.pos] == "." {
            return Err(TokenizerError {
                message: "lone decimal point".into(),
                pos: start,
            });
        }
        Ok(self.token(TokenType::Number, start))
    }

    fn token(&self, token_type: TokenType, start: usize) -> Token {
        Token {
            value: self.source[start..self.pos].to_string(),
            token_type,
            start,
            end: self.pos,
        }
    }

    fn is_ident(c: u8) -> bool {
        c.is_ascii_alphanumeric() || c == b'_'
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenType> {
        Tokenizer::new(src)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.token_type)
            .collect()
    }

    #[test]
    fn scans_the_operator_set() {
        assert_eq!(
            kinds("1 + x*2 - y/3 ^ 4"),
            vec![
                TokenType::Number,
                TokenType::Plus,
                TokenType::Ident,
                TokenType::Star,
                TokenType::Number,
                TokenType::Minus,
                TokenType::Ident,
                TokenType::Slash,
                TokenType::Number,
                TokenType::Caret,
                TokenType::Number,
            ]
        );
    }

    #[test]
    fn scans_exp_call() {
        let tokens = Tokenizer::new("Exp(-2*x)").tokenize().unwrap();
        assert_eq!(tokens[0].value, "Exp");
        assert_eq!(tokens[1].token_type, TokenType::LParen);
        assert_eq!(tokens.last().unwrap().token_type, TokenType::RParen);
    }

    #[test]
    fn rejects_stray_bytes() {
        let err = Tokenizer::new("1 & 2").tokenize().unwrap_err();
        assert_eq!(err.pos, 2);
    }

    #[test]
    fn rejects_double_dot() {
        assert!(Tokenizer::new("1.2.3").tokenize().is_err());
    }
}
