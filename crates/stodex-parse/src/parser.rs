//! Recursive-descent parser for the expolynomial expression grammar.
//!
//! ```text
//! expr   := term (('+' | '-') term)*
//! term   := factor (('*' | '/') factor)*
//! factor := ('-' | '+')* power
//! power  := atom ('^' integer)?
//! atom   := number | identifier | Exp '(' expr ')' | '(' expr ')'
//! ```

use crate::tokenizer::{Token, TokenType, Tokenizer};
use crate::types::ExprNode;
use bigdecimal::BigDecimal;
use std::error::Error;
use std::fmt::{self, Display};

/// A custom error type for the parser.
#[derive(Debug, Clone, PartialEq)]
pub struct ParserError {
    pub message: String,
    pub position: Option<usize>,
}

impl Display for ParserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(pos) = self.position {
            write!(f, "ParserError at position {}: {}", pos, self.message)
        } else {
            write!(f, "ParserError: {}", self.message)
        }
    }
}

impl Error for ParserError {}

/// Parse an expression string into its AST.
pub fn parse(source: &str) -> Result<ExprNode, ParserError> {
    let tokens = Tokenizer::new(source).tokenize().map_err(|e| ParserError {
        message: e.message,
        position: Some(e.pos),
    })?;
    let mut parser = Parser { tokens, pos: 0 };
    let node = parser.expr()?;
    if let Some(extra) = parser.peek() {
        return Err(ParserError {
            message: format!("unexpected trailing token `{}`", extra.value),
            position: Some(extra.start),
        });
    }
    Ok(node)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn eat(&mut self, tt: TokenType) -> bool {
        if self.peek().map(|t| t.token_type) == Some(tt) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tt: TokenType, what: &str) -> Result<(), ParserError> {
        if self.eat(tt) {
            Ok(())
        } else {
            Err(self.unexpected(what))
        }
    }

    fn unexpected(&self, what: &str) -> ParserError {
        match self.peek() {
            Some(t) => ParserError {
                message: format!("expected {what}, found `{}`", t.value),
                position: Some(t.start),
            },
            None => ParserError {
                message: format!("expected {what}, found end of input"),
                position: None,
            },
        }
    }

    fn expr(&mut self) -> Result<ExprNode, ParserError> {
        let mut node = self.term()?;
        loop {
            if self.eat(TokenType::Plus) {
                node = ExprNode::Add(Box::new(node), Box::new(self.term()?));
            } else if self.eat(TokenType::Minus) {
                node = ExprNode::Sub(Box::new(node), Box::new(self.term()?));
            } else {
                return Ok(node);
            }
        }
    }

    fn term(&mut self) -> Result<ExprNode, ParserError> {
        let mut node = self.factor()?;
        loop {
            if self.eat(TokenType::Star) {
                node = ExprNode::Mul(Box::new(node), Box::new(self.factor()?));
            } else if self.eat(TokenType::Slash) {
                node = ExprNode::Div(Box::new(node), Box::new(self.factor()?));
            } else {
                return Ok(node);
            }
        }
    }

    fn factor(&mut self) -> Result<ExprNode, ParserError> {
        if self.eat(TokenType::Minus) {
            return Ok(ExprNode::Neg(Box::new(self.factor()?)));
        }
        if self.eat(TokenType::Plus) {
            return self.factor();
        }
        self.power()
    }

    fn power(&mut self) -> Result<ExprNode, ParserError> {
        let base = self.atom()?;
        if !self.eat(TokenType::Caret) {
            return Ok(base);
        }
        let token = self
            .peek()
            .cloned()
            .ok_or_else(|| self.unexpected("an integer exponent"))?;
        if token.token_type != TokenType::Number {
            return Err(self.unexpected("an integer exponent"));
        }
        let exponent: u32 = token.value.parse().map_err(|_| ParserError {
            message: format!("exponent `{}` is not a nonnegative integer", token.value),
            position: Some(token.start),
        })?;
        self.pos += 1;
        Ok(ExprNode::Pow(Box::new(base), exponent))
    }

    fn atom(&mut self) -> Result<ExprNode, ParserError> {
        let token = match self.peek().cloned() {
            Some(t) => {
                self.pos += 1;
                t
            }
            None => return Err(self.unexpected("a value")),
        };
        match token.token_type {
            TokenType::Number => {
                let value: BigDecimal = token.value.parse().map_err(|_| ParserError {
                    message: format!("malformed number `{}`", token.value),
                    position: Some(token.start),
                })?;
                Ok(ExprNode::Number(value))
            }
            TokenType::Ident => {
                if self.peek().map(|t| t.token_type) == Some(TokenType::LParen) {
                    if !token.value.eq_ignore_ascii_case("exp") {
                        return Err(ParserError {
                            message: format!("unknown function `{}`", token.value),
                            position: Some(token.start),
                        });
                    }
                    self.pos += 1;
                    let arg = self.expr()?;
                    self.expect(TokenType::RParen, "`)`")?;
                    Ok(ExprNode::Exp(Box::new(arg)))
                } else {
                    Ok(ExprNode::Symbol(token.value))
                }
            }
            TokenType::LParen => {
                let inner = self.expr()?;
                self.expect(TokenType::RParen, "`)`")?;
                Ok(inner)
            }
            _ => Err(ParserError {
                message: format!("expected a value, found `{}`", token.value),
                position: Some(token.start),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_precedence() {
        let node = parse("1 + 2*x^3").unwrap();
        let ExprNode::Add(l, r) = node else {
            panic!("expected an addition")
        };
        assert_eq!(*l, ExprNode::number(1));
        assert!(matches!(*r, ExprNode::Mul(..)));
    }

    #[test]
    fn parses_exponential_builtin() {
        let node = parse("exp(-0.5*x)").unwrap();
        assert!(matches!(node, ExprNode::Exp(_)));
    }

    #[test]
    fn rejects_unknown_functions() {
        let err = parse("Sin(x)").unwrap_err();
        assert!(err.message.contains("unknown function"));
    }

    #[test]
    fn rejects_fractional_exponents() {
        assert!(parse("x^2.5").is_err());
        assert!(parse("x^-1").is_err());
    }

    #[test]
    fn reports_trailing_garbage() {
        let err = parse("x + 1 )").unwrap_err();
        assert!(err.message.contains("trailing"));
    }

    #[test]
    fn unary_signs_stack() {
        assert_eq!(parse("--x").unwrap().simplify(), ExprNode::symbol("x"));
        assert_eq!(parse("+x").unwrap().simplify(), ExprNode::symbol("x"));
    }
}
