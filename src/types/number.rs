//! Numeric scalars, including arbitrary precision integers and decimals
//!
//! [`BigInteger`] and [`BigDecimal`] keep their decimal text as written so
//! they round-trip exactly through a wire format. They are never converted
//! through `f64` unless a caller explicitly asks for a lossy view.

use std::{fmt::Display, str::FromStr};

use crate::error::Error;

/// Arbitrary precision integer stored as canonical decimal text.
///
/// Canonical means an optional `-` followed by digits without leading
/// zeros; zero is always `0`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BigInteger(String);

/// Arbitrary precision decimal stored as decimal text.
///
/// Two decimals are equal when their text is equal, so `1.0` and `1.00`
/// differ just like values with a different scale.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BigDecimal(String);

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

impl BigInteger {
    /// The decimal text of this integer.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the value as an `i64` if it is in range.
    #[must_use]
    pub fn to_i64(&self) -> Option<i64> {
        self.0.parse().ok()
    }

    /// Returns `true` if the value is negative.
    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.0.starts_with('-')
    }
}

impl FromStr for BigInteger {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (negative, digits) = match s.as_bytes().first() {
            Some(b'-') => (true, &s[1..]),
            Some(b'+') => (false, &s[1..]),
            _ => (false, s),
        };

        if !all_digits(digits) {
            return Err(Error::malformed(format!("invalid big integer: `{s}`")));
        }

        let trimmed = digits.trim_start_matches('0');
        if trimmed.is_empty() {
            return Ok(BigInteger("0".to_string()));
        }

        Ok(BigInteger(if negative {
            format!("-{trimmed}")
        } else {
            trimmed.to_string()
        }))
    }
}

impl From<i64> for BigInteger {
    fn from(value: i64) -> Self {
        BigInteger(value.to_string())
    }
}

impl From<u64> for BigInteger {
    fn from(value: u64) -> Self {
        BigInteger(value.to_string())
    }
}

impl From<i128> for BigInteger {
    fn from(value: i128) -> Self {
        BigInteger(value.to_string())
    }
}

impl Display for BigInteger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl BigDecimal {
    /// The decimal text of this value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lossy conversion to `f64`.
    #[must_use]
    pub fn to_f64(&self) -> f64 {
        // Text is validated on construction, so parsing cannot fail.
        self.0.parse().unwrap_or(f64::NAN)
    }

    /// Returns the value as a [`BigInteger`] if it has no fraction or exponent.
    #[must_use]
    pub fn to_big_integer(&self) -> Option<BigInteger> {
        self.0.parse().ok()
    }
}

impl FromStr for BigDecimal {
    type Err = Error;

    /// Accepts `-?digits(.digits)?([eE][+-]?digits)?`, with an optional
    /// leading `+` that is dropped.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::malformed(format!("invalid big decimal: `{s}`"));

        let body = s.strip_prefix('+').unwrap_or(s);
        let unsigned = body.strip_prefix('-').unwrap_or(body);

        let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
            Some(idx) => (&unsigned[..idx], Some(&unsigned[idx + 1..])),
            None => (unsigned, None),
        };

        let (int_part, frac_part) = match mantissa.split_once('.') {
            Some((int_part, frac_part)) => (int_part, Some(frac_part)),
            None => (mantissa, None),
        };

        if !all_digits(int_part) {
            return Err(invalid());
        }
        if let Some(frac_part) = frac_part {
            if !all_digits(frac_part) {
                return Err(invalid());
            }
        }
        if let Some(exponent) = exponent {
            let digits = exponent
                .strip_prefix(['+', '-'])
                .unwrap_or(exponent);
            if !all_digits(digits) {
                return Err(invalid());
            }
        }

        Ok(BigDecimal(body.to_string()))
    }
}

impl TryFrom<f64> for BigDecimal {
    type Error = Error;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !value.is_finite() {
            return Err(Error::malformed(format!(
                "non-finite value {value} has no decimal representation"
            )));
        }
        format!("{value:?}").parse()
    }
}

impl From<i64> for BigDecimal {
    fn from(value: i64) -> Self {
        BigDecimal(value.to_string())
    }
}

impl From<BigInteger> for BigDecimal {
    fn from(value: BigInteger) -> Self {
        BigDecimal(value.0)
    }
}

impl Display for BigDecimal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Numeric scalar held by a [`Node`](super::Node).
#[derive(Clone, Debug, PartialEq)]
pub enum Number {
    /// Integer that fits in 64 bits
    Int(i64),
    /// Binary floating point value
    Float(f64),
    /// Integer outside the 64 bit range, or written as a big integer
    BigInteger(BigInteger),
    /// Exact decimal
    BigDecimal(BigDecimal),
}

impl Number {
    /// Classifies number text read from a wire format.
    ///
    /// Integers become [`Number::Int`] when they fit in an `i64` and
    /// [`Number::BigInteger`] otherwise. Fractions become [`Number::Float`]
    /// only when the `f64` prints back to the same text, either in Rust's
    /// shortest form or in the form the JSON writer uses. Anything else is
    /// a [`Number::BigDecimal`].
    ///
    /// # Errors
    /// Returns [`Error::MalformedInput`] if `text` is not a number.
    pub fn from_text(text: &str) -> Result<Self, Error> {
        if let Ok(int) = text.parse::<i64>() {
            return Ok(Number::Int(int));
        }
        if let Ok(big) = text.parse::<BigInteger>() {
            return Ok(Number::BigInteger(big));
        }

        let decimal: BigDecimal = text.parse()?;
        if let Ok(float) = text.parse::<f64>() {
            if float.is_finite() && prints_as(float, decimal.as_str()) {
                return Ok(Number::Float(float));
            }
        }
        Ok(Number::BigDecimal(decimal))
    }

    /// Returns the value as an `i64` if it is an integer in range.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Number::Int(v) => Some(*v),
            Number::BigInteger(v) => v.to_i64(),
            Number::BigDecimal(v) => v.to_big_integer().and_then(|v| v.to_i64()),
            Number::Float(_) => None,
        }
    }

    /// Lossy view as `f64`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> f64 {
        match self {
            Number::Int(v) => *v as f64,
            Number::Float(v) => *v,
            Number::BigInteger(v) => v.as_str().parse().unwrap_or(f64::NAN),
            Number::BigDecimal(v) => v.to_f64(),
        }
    }

    /// Returns the value as a [`BigInteger`] if it is integral.
    #[must_use]
    pub fn to_big_integer(&self) -> Option<BigInteger> {
        match self {
            Number::Int(v) => Some(BigInteger::from(*v)),
            Number::BigInteger(v) => Some(v.clone()),
            Number::BigDecimal(v) => v.to_big_integer(),
            Number::Float(_) => None,
        }
    }

    /// Returns the value as a [`BigDecimal`].
    ///
    /// # Errors
    /// Fails for non-finite floats.
    pub fn to_big_decimal(&self) -> Result<BigDecimal, Error> {
        match self {
            Number::Int(v) => Ok(BigDecimal::from(*v)),
            Number::Float(v) => BigDecimal::try_from(*v),
            Number::BigInteger(v) => Ok(BigDecimal::from(v.clone())),
            Number::BigDecimal(v) => Ok(v.clone()),
        }
    }
}

fn prints_as(float: f64, text: &str) -> bool {
    format!("{float:?}") == text
        || serde_json::Number::from_f64(float).is_some_and(|json| json.to_string() == text)
}

impl Display for Number {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Number::Int(v) => write!(f, "{v}"),
            Number::Float(v) => write!(f, "{v:?}"),
            Number::BigInteger(v) => write!(f, "{v}"),
            Number::BigDecimal(v) => write!(f, "{v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn big_integer_canonical_form() {
        assert_eq!("+0007".parse::<BigInteger>().unwrap().as_str(), "7");
        assert_eq!("-000".parse::<BigInteger>().unwrap().as_str(), "0");
        assert_eq!(
            "-123456789012345678901234567890"
                .parse::<BigInteger>()
                .unwrap()
                .as_str(),
            "-123456789012345678901234567890"
        );
        assert!("12a".parse::<BigInteger>().is_err());
        assert!("".parse::<BigInteger>().is_err());
        assert!("-".parse::<BigInteger>().is_err());
    }

    #[test]
    fn big_decimal_grammar() {
        for ok in ["0", "1.50", "-3.25e10", "6.02E+23", "1e-7", "+2.5"] {
            assert!(ok.parse::<BigDecimal>().is_ok(), "{ok}");
        }
        for bad in ["", ".5", "1.", "1e", "--1", "1.2.3", "NaN"] {
            assert!(bad.parse::<BigDecimal>().is_err(), "{bad}");
        }
        assert_eq!("+2.5".parse::<BigDecimal>().unwrap().as_str(), "2.5");
    }

    #[test]
    fn decimal_scale_is_significant() {
        let a: BigDecimal = "1.0".parse().unwrap();
        let b: BigDecimal = "1.00".parse().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn number_classification() {
        assert_eq!(Number::from_text("42").unwrap(), Number::Int(42));
        assert_eq!(Number::from_text("1.5").unwrap(), Number::Float(1.5));
        assert_eq!(
            Number::from_text("99999999999999999999").unwrap(),
            Number::BigInteger("99999999999999999999".parse().unwrap())
        );
        assert_eq!(
            Number::from_text("0.1000000000000000055511151231257827").unwrap(),
            Number::BigDecimal("0.1000000000000000055511151231257827".parse().unwrap())
        );
        assert!(Number::from_text("abc").is_err());
    }

    #[test]
    fn json_writer_float_text_is_a_float() {
        for value in [1e-5, 1.5e-7, 1e16, 1e17, 1.2345e300, -0.000_012_5] {
            let written = serde_json::to_string(&value).unwrap();
            assert_eq!(
                Number::from_text(&written).unwrap(),
                Number::Float(value),
                "{written}"
            );
        }
        assert_eq!(Number::from_text("1e-5").unwrap(), Number::Float(1e-5));
    }

    #[test]
    fn conversions() {
        assert_eq!(Number::Int(7).as_i64(), Some(7));
        assert_eq!(Number::Float(7.0).as_i64(), None);
        assert_eq!(
            Number::BigDecimal("12".parse().unwrap()).as_i64(),
            Some(12)
        );
        assert_eq!(
            Number::Float(0.5).to_big_decimal().unwrap().as_str(),
            "0.5"
        );
        assert!(Number::Float(f64::INFINITY).to_big_decimal().is_err());
    }
}
