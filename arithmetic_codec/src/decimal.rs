// arithmetic_codec/src/decimal.rs

//! Arbitrary-precision decimal numbers.
//!
//! A [`Decimal`] is stored exactly as `coefficient * 10^exponent`. Parsing never
//! rounds. Arithmetic goes through a [`Context`], which rounds every result to
//! a fixed number of significant digits (round-half-even). The context is an
//! ordinary value, so concurrent callers can each work at their own precision.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use num_bigint::{BigInt, BigUint, Sign};
use num_integer::Integer;
use num_traits::{One, Signed, Zero};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::error::{ArithmeticCodingError, Result};

/// Significant digits used when the caller does not choose a precision.
pub const DEFAULT_PRECISION: u32 = 100;

/// Largest precision a [`Context`] accepts.
pub const MAX_PRECISION: u32 = 1_000_000;

/// Parsed literals must satisfy `|exponent| <= MAX_EXPONENT` once the
/// fractional digits are folded into the exponent.
pub const MAX_EXPONENT: i64 = 4_000_000;

/// Error produced when text or a float cannot be read as a [`Decimal`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseDecimalError {
    /// The literal was empty.
    #[error("empty decimal literal")]
    Empty,
    /// The literal is not of the form `[-]digits[.digits][e[-]digits]`.
    #[error("malformed decimal literal {0:?}")]
    Malformed(String),
    /// NaN and infinities have no decimal expansion.
    #[error("non-finite value {0} has no decimal representation")]
    NonFinite(String),
    /// The exponent lies outside `[-MAX_EXPONENT, MAX_EXPONENT]`.
    #[error("exponent of decimal literal {0:?} is out of range")]
    ExponentOutOfRange(String),
}

/// `10^exponent` as an unsigned big integer.
///
/// Parsed exponents, precisions and the operand substitution in
/// [`Context::add`] keep every caller's exponent far below `u32::MAX`.
fn pow10(exponent: u64) -> BigUint {
    BigUint::from(10u32).pow(u32::try_from(exponent).unwrap_or(u32::MAX))
}

/// Number of decimal digits in `value` (zero has one digit).
fn digit_count(value: &BigUint) -> u64 {
    if value.is_zero() {
        1
    } else {
        value.to_str_radix(10).len() as u64
    }
}

/// An exact decimal number `coefficient * 10^exponent`.
#[derive(Clone, Debug)]
pub struct Decimal {
    coefficient: BigInt,
    exponent: i64,
}

impl Decimal {
    /// Creates `coefficient * 10^exponent`.
    pub fn new(coefficient: impl Into<BigInt>, exponent: i64) -> Self {
        Decimal {
            coefficient: coefficient.into(),
            exponent,
        }
    }

    pub fn zero() -> Self {
        Decimal::new(0, 0)
    }

    pub fn one() -> Self {
        Decimal::new(1, 0)
    }

    pub fn is_zero(&self) -> bool {
        self.coefficient.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.coefficient.is_negative()
    }

    pub fn abs(&self) -> Self {
        Decimal::new(self.coefficient.abs(), self.exponent)
    }

    /// Number of digits after the decimal point in this representation.
    pub fn scale(&self) -> u64 {
        if self.exponent < 0 {
            self.exponent.unsigned_abs()
        } else {
            0
        }
    }

    /// Position of the leading digit: `d.ddd * 10^adjusted`.
    fn adjusted(&self) -> i64 {
        self.exponent + digit_count(self.coefficient.magnitude()) as i64 - 1
    }

    /// Returns `floor(self * 10^digits)` exactly.
    pub fn floor_scaled(&self, digits: u32) -> BigInt {
        let shift = self.exponent + i64::from(digits);
        if shift >= 0 {
            return &self.coefficient * BigInt::from(pow10(shift.unsigned_abs()));
        }
        // every digit falls below the unit position
        if shift.unsigned_abs() > digit_count(self.coefficient.magnitude()) {
            return if self.is_negative() {
                BigInt::from(-1)
            } else {
                BigInt::zero()
            };
        }
        self.coefficient
            .div_floor(&BigInt::from(pow10(shift.unsigned_abs())))
    }

    /// Lossy conversion, used only for estimates.
    pub fn to_f64(&self) -> Option<f64> {
        self.to_string().parse().ok()
    }

    /// Both coefficients rescaled to the smaller of the two exponents.
    fn aligned(&self, other: &Decimal) -> (BigInt, BigInt, i64) {
        let exponent = self.exponent.min(other.exponent);
        let lhs = &self.coefficient * BigInt::from(pow10(self.exponent.abs_diff(exponent)));
        let rhs = &other.coefficient * BigInt::from(pow10(other.exponent.abs_diff(exponent)));
        (lhs, rhs, exponent)
    }
}

impl From<u32> for Decimal {
    fn from(value: u32) -> Self {
        Decimal::new(value, 0)
    }
}

impl From<u64> for Decimal {
    fn from(value: u64) -> Self {
        Decimal::new(value, 0)
    }
}

impl From<usize> for Decimal {
    fn from(value: usize) -> Self {
        Decimal::new(value, 0)
    }
}

impl TryFrom<f64> for Decimal {
    type Error = ParseDecimalError;

    /// Converts through the shortest decimal text that round-trips the float,
    /// so `0.1f64` becomes exactly `0.1`.
    fn try_from(value: f64) -> std::result::Result<Self, Self::Error> {
        if !value.is_finite() {
            return Err(ParseDecimalError::NonFinite(value.to_string()));
        }
        value.to_string().parse()
    }
}

impl FromStr for Decimal {
    type Err = ParseDecimalError;

    fn from_str(text: &str) -> std::result::Result<Self, Self::Err> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ParseDecimalError::Empty);
        }
        let malformed = || ParseDecimalError::Malformed(text.to_string());

        let (negative, body) = if let Some(rest) = text.strip_prefix('-') {
            (true, rest)
        } else {
            (false, text.strip_prefix('+').unwrap_or(text))
        };
        let out_of_range = || ParseDecimalError::ExponentOutOfRange(text.to_string());

        let (mantissa, exponent) = match body.split_once(|c: char| c == 'e' || c == 'E') {
            Some((mantissa, exponent)) => {
                (mantissa, exponent.parse::<i64>().map_err(|_| malformed())?)
            }
            None => (body, 0),
        };
        let (integer, fraction) = mantissa.split_once('.').unwrap_or((mantissa, ""));
        if integer.is_empty() && fraction.is_empty() {
            return Err(malformed());
        }
        if !integer.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }

        let exponent = i64::try_from(fraction.len())
            .ok()
            .and_then(|scale| exponent.checked_sub(scale))
            .filter(|exponent| exponent.unsigned_abs() <= MAX_EXPONENT.unsigned_abs())
            .ok_or_else(out_of_range)?;

        let digits = format!("{integer}{fraction}");
        let magnitude = BigUint::parse_bytes(digits.as_bytes(), 10).ok_or_else(malformed)?;
        let sign = if negative { Sign::Minus } else { Sign::Plus };
        Ok(Decimal {
            coefficient: BigInt::from_biguint(sign, magnitude),
            exponent,
        })
    }
}

/// Plain positional notation, never scientific.
impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.is_negative() { "-" } else { "" };
        let digits = self.coefficient.magnitude().to_str_radix(10);
        if self.exponent >= 0 {
            if self.is_zero() {
                return write!(f, "0");
            }
            return write!(f, "{sign}{digits}{}", "0".repeat(self.exponent as usize));
        }

        let scale = self.exponent.unsigned_abs() as usize;
        if digits.len() > scale {
            let (integer, fraction) = digits.split_at(digits.len() - scale);
            write!(f, "{sign}{integer}.{fraction}")
        } else {
            write!(f, "{sign}0.{}{digits}", "0".repeat(scale - digits.len()))
        }
    }
}

impl PartialEq for Decimal {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Decimal {}

impl PartialOrd for Decimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Decimal {
    fn cmp(&self, other: &Self) -> Ordering {
        let sign = self.coefficient.sign().cmp(&other.coefficient.sign());
        if sign != Ordering::Equal || self.is_zero() {
            return sign;
        }

        let magnitude = self.adjusted().cmp(&other.adjusted()).then_with(|| {
            // same leading position: compare digit by digit
            let lhs = self.coefficient.magnitude().to_str_radix(10);
            let rhs = other.coefficient.magnitude().to_str_radix(10);
            lhs.trim_end_matches('0').cmp(rhs.trim_end_matches('0'))
        });
        if self.is_negative() {
            magnitude.reverse()
        } else {
            magnitude
        }
    }
}

impl Serialize for Decimal {
    fn serialize<Z: Serializer>(&self, serializer: Z) -> std::result::Result<Z::Ok, Z::Error> {
        serializer.collect_str(self)
    }
}

struct DecimalVisitor;

impl<'de> Visitor<'de> for DecimalVisitor {
    type Value = Decimal;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a decimal number or a string holding one")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> std::result::Result<Decimal, E> {
        value.parse().map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> std::result::Result<Decimal, E> {
        Ok(Decimal::from(value))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> std::result::Result<Decimal, E> {
        Ok(Decimal::new(value, 0))
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> std::result::Result<Decimal, E> {
        Decimal::try_from(value).map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for Decimal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(DecimalVisitor)
    }
}

/// Arithmetic context: every result is rounded to `precision` significant
/// digits, halves going to the even neighbour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Context {
    precision: u32,
}

impl Default for Context {
    fn default() -> Self {
        Context {
            precision: DEFAULT_PRECISION,
        }
    }
}

impl Context {
    /// Creates a context keeping `precision` significant digits.
    ///
    /// # Errors
    ///
    /// Returns an error if `precision` is zero or above [`MAX_PRECISION`].
    pub fn new(precision: u32) -> Result<Self> {
        if precision == 0 || precision > MAX_PRECISION {
            return Err(ArithmeticCodingError::InvalidPrecision(precision));
        }
        Ok(Context { precision })
    }

    pub fn precision(&self) -> u32 {
        self.precision
    }

    /// Rounds `value` to this context's precision.
    pub fn round(&self, value: Decimal) -> Decimal {
        let precision = u64::from(self.precision);
        let Decimal {
            coefficient,
            mut exponent,
        } = value;
        let (sign, mut magnitude) = coefficient.into_parts();

        let digits = digit_count(&magnitude);
        if digits > precision {
            let dropped = digits - precision;
            let divisor = pow10(dropped);
            let (quotient, remainder) = magnitude.div_rem(&divisor);
            magnitude = match (&remainder * 2u32).cmp(&divisor) {
                Ordering::Greater => quotient + 1u32,
                Ordering::Equal if quotient.is_odd() => quotient + 1u32,
                _ => quotient,
            };
            exponent += dropped as i64;
            // 99..9 rounded up gains a digit
            if digit_count(&magnitude) > precision {
                magnitude /= 10u32;
                exponent += 1;
            }
        }

        Decimal {
            coefficient: BigInt::from_biguint(sign, magnitude),
            exponent,
        }
    }

    /// Operands of a sum, with one far below every digit of the other
    /// replaced by a sticky stand-in of the same sign.
    ///
    /// The stand-in sits below both the last digit of the larger operand and
    /// its rounding position, so the rounded result is unchanged while the
    /// alignment never spans more than the operands' own digits plus the
    /// precision.
    fn sum_operands(&self, lhs: &Decimal, rhs: &Decimal) -> (Decimal, Decimal) {
        match (lhs.is_zero(), rhs.is_zero()) {
            (true, true) => return (Decimal::zero(), Decimal::zero()),
            (true, false) => return (Decimal::new(0, rhs.exponent), rhs.clone()),
            (false, true) => return (lhs.clone(), Decimal::new(0, lhs.exponent)),
            (false, false) => {}
        }

        let swapped = lhs.adjusted() < rhs.adjusted();
        let (large, small) = if swapped { (rhs, lhs) } else { (lhs, rhs) };
        let floor = large
            .exponent
            .min(large.adjusted() - i64::from(self.precision) - 2)
            - 1;
        let small = if small.adjusted() < floor {
            Decimal::new(small.coefficient.signum(), floor)
        } else {
            small.clone()
        };

        if swapped {
            (small, large.clone())
        } else {
            (large.clone(), small)
        }
    }

    pub fn add(&self, lhs: &Decimal, rhs: &Decimal) -> Decimal {
        let (lhs, rhs) = self.sum_operands(lhs, rhs);
        let (lhs, rhs, exponent) = lhs.aligned(&rhs);
        self.round(Decimal::new(lhs + rhs, exponent))
    }

    pub fn sub(&self, lhs: &Decimal, rhs: &Decimal) -> Decimal {
        let (lhs, rhs) = self.sum_operands(lhs, rhs);
        let (lhs, rhs, exponent) = lhs.aligned(&rhs);
        self.round(Decimal::new(lhs - rhs, exponent))
    }

    pub fn mul(&self, lhs: &Decimal, rhs: &Decimal) -> Decimal {
        self.round(Decimal::new(
            &lhs.coefficient * &rhs.coefficient,
            lhs.exponent + rhs.exponent,
        ))
    }

    /// Correctly rounded quotient.
    ///
    /// # Errors
    ///
    /// Returns an error if `rhs` is zero.
    pub fn div(&self, lhs: &Decimal, rhs: &Decimal) -> Result<Decimal> {
        if rhs.is_zero() {
            return Err(ArithmeticCodingError::InvalidModel(
                "division by zero".to_string(),
            ));
        }
        if lhs.is_zero() {
            return Ok(Decimal::zero());
        }

        // Enough extra digits that the quotient always exceeds the precision.
        let shift = u64::from(self.precision) + digit_count(rhs.coefficient.magnitude()) + 1;
        let numerator = lhs.coefficient.magnitude() * pow10(shift);
        let (mut quotient, remainder) = numerator.div_rem(rhs.coefficient.magnitude());
        let mut exponent = lhs.exponent - rhs.exponent - shift as i64;
        if !remainder.is_zero() {
            // sticky digit: keeps an inexact quotient off the exact halfway point
            quotient = quotient * 10u32 + BigUint::one();
            exponent -= 1;
        }

        let sign = if lhs.is_negative() != rhs.is_negative() {
            Sign::Minus
        } else {
            Sign::Plus
        };
        Ok(self.round(Decimal {
            coefficient: BigInt::from_biguint(sign, quotient),
            exponent,
        }))
    }

    /// Left-to-right sum starting from zero, rounding after every addition.
    pub fn sum<'a, I>(&self, values: I) -> Decimal
    where
        I: IntoIterator<Item = &'a Decimal>,
    {
        values
            .into_iter()
            .fold(Decimal::zero(), |total, value| self.add(&total, value))
    }
}
