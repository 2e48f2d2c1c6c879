//! Expression AST.
//!
//! [`ExprNode`] is a plain tagged sum; formatting and simplification are a
//! pair of operations realized by pattern matching over it. Structural
//! equality on simplified nodes is the canonical-form equality used by the
//! algebraic rewrites (`e - e`, `e / e`).

use bigdecimal::BigDecimal;
use num_traits::{One, Zero};
use std::fmt::{self, Display};

#[derive(Debug, Clone, PartialEq)]
pub enum ExprNode {
    Number(BigDecimal),
    Symbol(String),
    Neg(Box<ExprNode>),
    Add(Box<ExprNode>, Box<ExprNode>),
    Sub(Box<ExprNode>, Box<ExprNode>),
    Mul(Box<ExprNode>, Box<ExprNode>),
    Div(Box<ExprNode>, Box<ExprNode>),
    /// Integer power `base ^ exponent`.
    Pow(Box<ExprNode>, u32),
    /// The builtin exponential `Exp(argument)`.
    Exp(Box<ExprNode>),
}

impl ExprNode {
    pub fn number(v: impl Into<BigDecimal>) -> Self {
        ExprNode::Number(v.into())
    }

    pub fn symbol(name: impl Into<String>) -> Self {
        ExprNode::Symbol(name.into())
    }

    fn as_number(&self) -> Option<&BigDecimal> {
        match self {
            ExprNode::Number(n) => Some(n),
            _ => None,
        }
    }

    /// Constant folding and neutral-element elimination.
    ///
    /// `e - e` and `e / e` collapse by structural equality of the
    /// simplified operands. Division folds only when the divisor is a
    /// nonzero literal; a zero literal divisor is preserved so the
    /// lowering layer can reject it as a domain error.
    pub fn simplify(&self) -> ExprNode {
        use ExprNode::*;
        match self {
            Number(_) | Symbol(_) => self.clone(),
            Neg(e) => match e.simplify() {
                Number(n) => Number(-n),
                Neg(inner) => *inner,
                other => Neg(Box::new(other)),
            },
            Add(l, r) => {
                let (l, r) = (l.simplify(), r.simplify());
                match (&l, &r) {
                    (Number(a), Number(b)) => Number(a + b),
                    (Number(a), _) if a.is_zero() => r,
                    (_, Number(b)) if b.is_zero() => l,
                    _ => Add(Box::new(l), Box::new(r)),
                }
            }
            Sub(l, r) => {
                let (l, r) = (l.simplify(), r.simplify());
                if l == r {
                    return Number(BigDecimal::zero());
                }
                match (&l, &r) {
                    (Number(a), Number(b)) => Number(a - b),
                    (_, Number(b)) if b.is_zero() => l,
                    (Number(a), _) if a.is_zero() => Neg(Box::new(r)),
                    _ => Sub(Box::new(l), Box::new(r)),
                }
            }
            Mul(l, r) => {
                let (l, r) = (l.simplify(), r.simplify());
                match (&l, &r) {
                    (Number(a), Number(b)) => Number(a * b),
                    (Number(a), _) if a.is_zero() => Number(BigDecimal::zero()),
                    (_, Number(b)) if b.is_zero() => Number(BigDecimal::zero()),
                    (Number(a), _) if a.is_one() => r,
                    (_, Number(b)) if b.is_one() => l,
                    _ => Mul(Box::new(l), Box::new(r)),
                }
            }
            Div(l, r) => {
                let (l, r) = (l.simplify(), r.simplify());
                if l == r && !matches!(&l, Number(n) if n.is_zero()) {
                    return Number(BigDecimal::one());
                }
                match (&l, &r) {
                    (_, Number(b)) if b.is_one() => l,
                    (Number(a), _) if a.is_zero() && r.as_number().is_none_or(|b| !b.is_zero()) => {
                        Number(BigDecimal::zero())
                    }
                    _ => Div(Box::new(l), Box::new(r)),
                }
            }
            Pow(b, k) => {
                let base = b.simplify();
                match (*k, &base) {
                    (0, _) => Number(BigDecimal::one()),
                    (1, _) => base,
                    (k, Number(n)) => {
                        let mut acc = BigDecimal::one();
                        for _ in 0..k {
                            acc = &acc * n;
                        }
                        Number(acc)
                    }
                    (k, _) => Pow(Box::new(base), k),
                }
            }
            Exp(arg) => match arg.simplify() {
                Number(n) if n.is_zero() => Number(BigDecimal::one()),
                other => Exp(Box::new(other)),
            },
        }
    }

    fn precedence(&self) -> u8 {
        use ExprNode::*;
        match self {
            Add(..) | Sub(..) => 1,
            Mul(..) | Div(..) => 2,
            Neg(..) => 3,
            Pow(..) => 4,
            Number(_) | Symbol(_) | Exp(_) => 5,
        }
    }

    fn fmt_child(&self, child: &ExprNode, f: &mut fmt::Formatter<'_>, tight: bool) -> fmt::Result {
        let needs_parens = child.precedence() < self.precedence()
            || (tight && child.precedence() == self.precedence());
        if needs_parens {
            write!(f, "({child})")
        } else {
            write!(f, "{child}")
        }
    }
}

impl Display for ExprNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use ExprNode::*;
        match self {
            Number(n) => write!(f, "{}", n.normalized()),
            Symbol(s) => f.write_str(s),
            Neg(e) => {
                f.write_str("-")?;
                self.fmt_child(e, f, true)
            }
            Add(l, r) => {
                self.fmt_child(l, f, false)?;
                f.write_str(" + ")?;
                self.fmt_child(r, f, false)
            }
            Sub(l, r) => {
                self.fmt_child(l, f, false)?;
                f.write_str(" - ")?;
                self.fmt_child(r, f, true)
            }
            Mul(l, r) => {
                self.fmt_child(l, f, false)?;
                f.write_str("*")?;
                self.fmt_child(r, f, false)
            }
            Div(l, r) => {
                self.fmt_child(l, f, false)?;
                f.write_str("/")?;
                self.fmt_child(r, f, true)
            }
            Pow(b, k) => {
                self.fmt_child(b, f, true)?;
                write!(f, "^{k}")
            }
            Exp(arg) => write!(f, "Exp({arg})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn folds_constants() {
        let e = parse("2*3 + 4^2").unwrap().simplify();
        assert_eq!(e, ExprNode::number(22));
    }

    #[test]
    fn cancels_equal_operands_structurally() {
        assert_eq!(
            parse("(x + 1) - (x + 1)").unwrap().simplify(),
            ExprNode::number(0)
        );
        assert_eq!(parse("(2*x)/(2*x)").unwrap().simplify(), ExprNode::number(1));
    }

    #[test]
    fn keeps_zero_divisors_for_the_lowering_layer() {
        let e = parse("x / 0").unwrap().simplify();
        assert!(matches!(e, ExprNode::Div(..)));
    }

    #[test]
    fn display_round_trips_through_the_parser() {
        for src in ["x^2*Exp(-2*x) + 3", "1 - (x - 2)", "-x*(y + 1)"] {
            let ast = parse(src).unwrap().simplify();
            let reparsed = parse(&ast.to_string()).unwrap().simplify();
            assert_eq!(ast, reparsed, "round trip failed for {src}");
        }
    }

    #[test]
    fn neutral_elements_disappear() {
        assert_eq!(parse("x*1 + 0").unwrap().simplify(), ExprNode::symbol("x"));
        assert_eq!(parse("x^1").unwrap().simplify(), ExprNode::symbol("x"));
        assert_eq!(parse("Exp(0)").unwrap().simplify(), ExprNode::number(1));
    }
}
