//! Canonical, locale-independent text for metric values.
//!
//! The aggregator parses values as plain ASCII decimal tokens, so every
//! numeric kind has exactly one rendering:
//!
//! - integers (fixed width or arbitrary precision): base-10 digits with a
//!   leading `-` for negatives, no separators
//! - floating point: fixed two fractional digits with `.` as separator

use num_bigint::BigInt;

/// Closed set of numeric representations that can be put on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum Number {
    Integer(i64),
    UnsignedInteger(u64),
    BigInteger(BigInt),
    Float(f64),
}

impl Number {
    /// Render the value, or `None` for a non-finite float.
    pub fn format(&self) -> Option<String> {
        match self {
            Number::Integer(i) => Some(format_integer(*i)),
            Number::UnsignedInteger(u) => Some(format_unsigned(*u)),
            Number::BigInteger(big) => Some(format_big_integer(big)),
            Number::Float(f) => format_float(*f),
        }
    }
}

impl From<i64> for Number {
    fn from(value: i64) -> Self {
        Number::Integer(value)
    }
}

impl From<u64> for Number {
    fn from(value: u64) -> Self {
        Number::UnsignedInteger(value)
    }
}

impl From<BigInt> for Number {
    fn from(value: BigInt) -> Self {
        Number::BigInteger(value)
    }
}

impl From<f64> for Number {
    fn from(value: f64) -> Self {
        Number::Float(value)
    }
}

pub fn format_integer(value: i64) -> String {
    value.to_string()
}

pub fn format_unsigned(value: u64) -> String {
    value.to_string()
}

pub fn format_big_integer(value: &BigInt) -> String {
    value.to_str_radix(10)
}

/// Two fractional digits, `.` separator. Rust formatting never consults the
/// host locale, so `3.14159` is always `"3.14"`.
///
/// NaN and infinities have no decimal rendering and yield `None`.
pub fn format_float(value: f64) -> Option<String> {
    if !value.is_finite() {
        return None;
    }
    Some(format!("{value:.2}"))
}
