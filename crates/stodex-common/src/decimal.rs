//! Arbitrary-precision decimals extended with the two infinities.
//!
//! [`OmegaDecimal`] is the numeric workhorse of the engine: zone bounds,
//! exmonomial constants, and integration results are all values of this
//! type. Arithmetic is exact except for division, which rounds to
//! [`DIVISION_PRECISION`] significant digits through [`div_decimal`]; no
//! ambient rounding context exists.
//!
//! Two conventions extend the obvious rules:
//! - `0 · ±∞ = 0`, so that a vanished coefficient annihilates an infinite
//!   limit during density evaluation at unbounded supports;
//! - `(+∞) + (−∞)` is undefined and panics. The engine never constructs
//!   it: DBM bounds only reach `+∞` and additions of opposite infinities
//!   are screened out by the bound algebra.

use bigdecimal::BigDecimal;
use num_traits::{FromPrimitive, One, Signed, ToPrimitive, Zero};
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};
use std::str::FromStr;

use crate::error::EngineError;

/// Significant digits kept by inexact divisions; the IEEE 754 decimal128
/// interchange precision.
pub const DIVISION_PRECISION: u64 = 34;

/// Divide two finite decimals, rounding the quotient to
/// [`DIVISION_PRECISION`] significant digits.
pub fn div_decimal(num: &BigDecimal, den: &BigDecimal) -> Result<BigDecimal, EngineError> {
    if den.is_zero() {
        return Err(EngineError::ZeroDivisor);
    }
    Ok((num / den).with_prec(DIVISION_PRECISION))
}

/// Integer power by repeated multiplication; exponents in this engine are
/// small monomial degrees.
pub fn pow_decimal(base: &BigDecimal, exponent: u32) -> BigDecimal {
    let mut acc = BigDecimal::one();
    for _ in 0..exponent {
        acc = &acc * base;
    }
    acc
}

/// `e^x` for a finite decimal argument.
///
/// Computed through `f64`; exponentials only enter densities numerically
/// when a bound is substituted, and the engine's tolerance (1e-9) is far
/// coarser than the `f64` error here. Overflow maps to the matching
/// infinity, underflow to zero.
pub fn exp_decimal(x: &BigDecimal) -> OmegaDecimal {
    let approx = match x.to_f64() {
        Some(v) => v.exp(),
        None => {
            if x.is_negative() {
                0.0
            } else {
                f64::INFINITY
            }
        }
    };
    if approx.is_infinite() {
        return OmegaDecimal::PosInfinite;
    }
    match BigDecimal::from_f64(approx) {
        Some(d) => OmegaDecimal::Finite(d.with_prec(DIVISION_PRECISION)),
        None => OmegaDecimal::Finite(BigDecimal::zero()),
    }
}

/// An arbitrary-precision decimal, or one of the two infinities.
///
/// The derived ordering is the numeric one: `−∞ < finite < +∞`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OmegaDecimal {
    NegInfinite,
    Finite(BigDecimal),
    PosInfinite,
}

impl OmegaDecimal {
    pub fn zero() -> Self {
        OmegaDecimal::Finite(BigDecimal::zero())
    }

    pub fn one() -> Self {
        OmegaDecimal::Finite(BigDecimal::one())
    }

    pub fn is_finite(&self) -> bool {
        matches!(self, OmegaDecimal::Finite(_))
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, OmegaDecimal::Finite(d) if d.is_zero())
    }

    pub fn is_negative(&self) -> bool {
        match self {
            OmegaDecimal::NegInfinite => true,
            OmegaDecimal::Finite(d) => d.is_negative(),
            OmegaDecimal::PosInfinite => false,
        }
    }

    pub fn as_finite(&self) -> Option<&BigDecimal> {
        match self {
            OmegaDecimal::Finite(d) => Some(d),
            _ => None,
        }
    }

    pub fn expect_finite(&self) -> Result<&BigDecimal, EngineError> {
        self.as_finite().ok_or(EngineError::NotFinite)
    }

    pub fn into_finite(self) -> Result<BigDecimal, EngineError> {
        match self {
            OmegaDecimal::Finite(d) => Ok(d),
            _ => Err(EngineError::NotFinite),
        }
    }

    /// Divide by a finite decimal, with [`DIVISION_PRECISION`] rounding.
    pub fn divide(&self, den: &BigDecimal) -> Result<OmegaDecimal, EngineError> {
        if den.is_zero() {
            return Err(EngineError::ZeroDivisor);
        }
        Ok(match self {
            OmegaDecimal::Finite(n) => OmegaDecimal::Finite(div_decimal(n, den)?),
            inf => {
                if den.is_negative() {
                    inf.clone().neg()
                } else {
                    inf.clone()
                }
            }
        })
    }

    pub fn pow(&self, exponent: u32) -> OmegaDecimal {
        if exponent == 0 {
            return OmegaDecimal::one();
        }
        match self {
            OmegaDecimal::Finite(d) => OmegaDecimal::Finite(pow_decimal(d, exponent)),
            OmegaDecimal::PosInfinite => OmegaDecimal::PosInfinite,
            OmegaDecimal::NegInfinite => {
                if exponent % 2 == 0 {
                    OmegaDecimal::PosInfinite
                } else {
                    OmegaDecimal::NegInfinite
                }
            }
        }
    }

    pub fn min(self, other: Self) -> Self {
        if self <= other { self } else { other }
    }

    pub fn max(self, other: Self) -> Self {
        if self >= other { self } else { other }
    }

    pub fn to_f64(&self) -> f64 {
        match self {
            OmegaDecimal::NegInfinite => f64::NEG_INFINITY,
            OmegaDecimal::Finite(d) => d.to_f64().unwrap_or(f64::NAN),
            OmegaDecimal::PosInfinite => f64::INFINITY,
        }
    }
}

impl From<BigDecimal> for OmegaDecimal {
    fn from(d: BigDecimal) -> Self {
        OmegaDecimal::Finite(d)
    }
}

impl From<i64> for OmegaDecimal {
    fn from(v: i64) -> Self {
        OmegaDecimal::Finite(BigDecimal::from(v))
    }
}

impl FromStr for OmegaDecimal {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "inf" | "+inf" => Ok(OmegaDecimal::PosInfinite),
            "-inf" => Ok(OmegaDecimal::NegInfinite),
            other => other
                .parse::<BigDecimal>()
                .map(OmegaDecimal::Finite)
                .map_err(|e| EngineError::Parse(e.to_string())),
        }
    }
}

impl fmt::Display for OmegaDecimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OmegaDecimal::NegInfinite => f.write_str("-inf"),
            OmegaDecimal::Finite(d) => write!(f, "{}", d.normalized()),
            OmegaDecimal::PosInfinite => f.write_str("inf"),
        }
    }
}

impl Neg for OmegaDecimal {
    type Output = OmegaDecimal;

    fn neg(self) -> OmegaDecimal {
        match self {
            OmegaDecimal::NegInfinite => OmegaDecimal::PosInfinite,
            OmegaDecimal::Finite(d) => OmegaDecimal::Finite(-d),
            OmegaDecimal::PosInfinite => OmegaDecimal::NegInfinite,
        }
    }
}

impl Neg for &OmegaDecimal {
    type Output = OmegaDecimal;

    fn neg(self) -> OmegaDecimal {
        self.clone().neg()
    }
}

impl Add for &OmegaDecimal {
    type Output = OmegaDecimal;

    fn add(self, rhs: &OmegaDecimal) -> OmegaDecimal {
        use OmegaDecimal::*;
        match (self, rhs) {
            (Finite(a), Finite(b)) => Finite(a + b),
            (PosInfinite, NegInfinite) | (NegInfinite, PosInfinite) => {
                panic!("sum of opposite infinities is undefined")
            }
            (PosInfinite, _) | (_, PosInfinite) => PosInfinite,
            (NegInfinite, _) | (_, NegInfinite) => NegInfinite,
        }
    }
}

impl Add for OmegaDecimal {
    type Output = OmegaDecimal;

    fn add(self, rhs: OmegaDecimal) -> OmegaDecimal {
        &self + &rhs
    }
}

impl Sub for &OmegaDecimal {
    type Output = OmegaDecimal;

    fn sub(self, rhs: &OmegaDecimal) -> OmegaDecimal {
        self + &rhs.neg()
    }
}

impl Sub for OmegaDecimal {
    type Output = OmegaDecimal;

    fn sub(self, rhs: OmegaDecimal) -> OmegaDecimal {
        &self - &rhs
    }
}

impl Mul for &OmegaDecimal {
    type Output = OmegaDecimal;

    fn mul(self, rhs: &OmegaDecimal) -> OmegaDecimal {
        use OmegaDecimal::*;
        match (self, rhs) {
            (Finite(a), Finite(b)) => Finite(a * b),
            // A vanished coefficient annihilates an infinite limit.
            (z, _) | (_, z) if z.is_zero() => OmegaDecimal::zero(),
            (a, b) => {
                if a.is_negative() == b.is_negative() {
                    PosInfinite
                } else {
                    NegInfinite
                }
            }
        }
    }
}

impl Mul for OmegaDecimal {
    type Output = OmegaDecimal;

    fn mul(self, rhs: OmegaDecimal) -> OmegaDecimal {
        &self * &rhs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> BigDecimal {
        s.parse().unwrap()
    }

    fn fin(s: &str) -> OmegaDecimal {
        OmegaDecimal::Finite(dec(s))
    }

    #[test]
    fn ordering_spans_the_infinities() {
        assert!(OmegaDecimal::NegInfinite < fin("-1000000"));
        assert!(fin("3.14") < OmegaDecimal::PosInfinite);
        assert!(fin("1.0") < fin("2"));
        assert_eq!(fin("1.50"), fin("1.5"));
    }

    #[test]
    fn arithmetic_follows_the_obvious_rules() {
        assert_eq!(&fin("2") + &fin("0.5"), fin("2.5"));
        assert_eq!(&OmegaDecimal::PosInfinite + &fin("7"), OmegaDecimal::PosInfinite);
        assert_eq!(&fin("3") - &fin("5"), fin("-2"));
        assert_eq!(&fin("-2") * &OmegaDecimal::PosInfinite, OmegaDecimal::NegInfinite);
    }

    #[test]
    fn zero_annihilates_infinity() {
        assert_eq!(&fin("0") * &OmegaDecimal::PosInfinite, OmegaDecimal::zero());
        assert_eq!(&OmegaDecimal::NegInfinite * &fin("0"), OmegaDecimal::zero());
    }

    #[test]
    #[should_panic(expected = "opposite infinities")]
    fn opposite_infinities_are_undefined() {
        let _ = &OmegaDecimal::PosInfinite + &OmegaDecimal::NegInfinite;
    }

    #[test]
    fn division_uses_the_fixed_precision() {
        let q = div_decimal(&dec("1"), &dec("3")).unwrap();
        let back = &q * &dec("3");
        assert!((&back - &dec("1")).abs() < dec("1e-30"));
        assert_eq!(
            OmegaDecimal::zero().divide(&dec("0")),
            Err(EngineError::ZeroDivisor)
        );
        assert_eq!(
            OmegaDecimal::PosInfinite.divide(&dec("-2")).unwrap(),
            OmegaDecimal::NegInfinite
        );
    }

    #[test]
    fn powers_and_negation() {
        assert_eq!(fin("-2").pow(3), fin("-8"));
        assert_eq!(OmegaDecimal::NegInfinite.pow(2), OmegaDecimal::PosInfinite);
        assert_eq!(-fin("1.5"), fin("-1.5"));
    }

    #[test]
    fn exp_of_zero_is_one() {
        assert_eq!(exp_decimal(&dec("0")), OmegaDecimal::one());
    }

    #[test]
    fn parses_infinities_and_decimals() {
        assert_eq!("inf".parse::<OmegaDecimal>().unwrap(), OmegaDecimal::PosInfinite);
        assert_eq!("-inf".parse::<OmegaDecimal>().unwrap(), OmegaDecimal::NegInfinite);
        assert_eq!("2.25".parse::<OmegaDecimal>().unwrap(), fin("2.25"));
        assert!("bogus".parse::<OmegaDecimal>().is_err());
    }
}
