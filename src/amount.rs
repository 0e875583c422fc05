//! Arbitrary-precision decimal for stake, reward and delegation amounts
//!
//! Amounts are never stored or summed as floating point. The store keeps
//! them as canonical decimal TEXT; arithmetic happens here on a scaled
//! `BigInt` (value = mantissa / 10^scale).

use num_bigint::{BigInt, Sign};
use num_traits::{Signed, Zero};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::iter::Sum;
use std::ops::Add;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid decimal amount: {0:?}")]
pub struct ParseAmountError(pub String);

/// Decimal amount in canonical form (no trailing fractional zeros)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RewardAmount {
    mantissa: BigInt,
    scale: u32,
}

impl RewardAmount {
    pub fn zero() -> Self {
        Self {
            mantissa: BigInt::zero(),
            scale: 0,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.mantissa.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.mantissa.is_negative()
    }

    /// Number of fractional digits kept
    pub fn scale(&self) -> u32 {
        self.scale
    }

    fn new(mantissa: BigInt, scale: u32) -> Self {
        let mut amount = Self { mantissa, scale };
        amount.normalize();
        amount
    }

    fn normalize(&mut self) {
        if self.mantissa.is_zero() {
            self.scale = 0;
            return;
        }
        let ten = BigInt::from(10u8);
        while self.scale > 0 && (&self.mantissa % &ten).is_zero() {
            self.mantissa /= &ten;
            self.scale -= 1;
        }
    }

    /// Mantissa rescaled to `scale` fractional digits (`scale >= self.scale`)
    fn rescaled(&self, scale: u32) -> BigInt {
        &self.mantissa * BigInt::from(10u8).pow(scale - self.scale)
    }
}

impl Default for RewardAmount {
    fn default() -> Self {
        Self::zero()
    }
}

impl FromStr for RewardAmount {
    type Err = ParseAmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let invalid = || ParseAmountError(s.to_string());

        let (sign, body) = match raw.as_bytes().first() {
            Some(b'-') => (Sign::Minus, &raw[1..]),
            Some(b'+') => (Sign::Plus, &raw[1..]),
            Some(_) => (Sign::Plus, raw),
            None => return Err(invalid()),
        };

        let (int_part, frac_part) = match body.split_once('.') {
            Some((i, f)) => (i, f),
            None => (body, ""),
        };
        if int_part.is_empty() || (body.contains('.') && frac_part.is_empty()) {
            return Err(invalid());
        }
        if !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let digits = format!("{}{}", int_part, frac_part);
        let magnitude = BigInt::parse_bytes(digits.as_bytes(), 10).ok_or_else(invalid)?;
        let mantissa = if sign == Sign::Minus { -magnitude } else { magnitude };
        let scale = u32::try_from(frac_part.len()).map_err(|_| invalid())?;

        Ok(Self::new(mantissa, scale))
    }
}

impl fmt::Display for RewardAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.mantissa.abs().to_str_radix(10);
        let sign = if self.mantissa.is_negative() { "-" } else { "" };
        if self.scale == 0 {
            return write!(f, "{}{}", sign, digits);
        }
        let scale = self.scale as usize;
        let padded = format!("{:0>width$}", digits, width = scale + 1);
        let (int_part, frac_part) = padded.split_at(padded.len() - scale);
        write!(f, "{}{}.{}", sign, int_part, frac_part)
    }
}

impl From<u64> for RewardAmount {
    fn from(value: u64) -> Self {
        Self::new(BigInt::from(value), 0)
    }
}

impl From<i64> for RewardAmount {
    fn from(value: i64) -> Self {
        Self::new(BigInt::from(value), 0)
    }
}

impl Add for RewardAmount {
    type Output = RewardAmount;

    fn add(self, rhs: RewardAmount) -> RewardAmount {
        &self + &rhs
    }
}

impl<'a> Add<&'a RewardAmount> for &'a RewardAmount {
    type Output = RewardAmount;

    fn add(self, rhs: &'a RewardAmount) -> RewardAmount {
        let scale = self.scale.max(rhs.scale);
        RewardAmount::new(self.rescaled(scale) + rhs.rescaled(scale), scale)
    }
}

impl Sum for RewardAmount {
    fn sum<I: Iterator<Item = RewardAmount>>(iter: I) -> Self {
        iter.fold(RewardAmount::zero(), |acc, x| acc + x)
    }
}

impl<'a> Sum<&'a RewardAmount> for RewardAmount {
    fn sum<I: Iterator<Item = &'a RewardAmount>>(iter: I) -> Self {
        iter.fold(RewardAmount::zero(), |acc, x| &acc + x)
    }
}

impl Ord for RewardAmount {
    fn cmp(&self, other: &Self) -> Ordering {
        let scale = self.scale.max(other.scale);
        self.rescaled(scale).cmp(&other.rescaled(scale))
    }
}

impl PartialOrd for RewardAmount {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl ToSql for RewardAmount {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_string()))
    }
}

impl FromSql for RewardAmount {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Text(bytes) => {
                let text = std::str::from_utf8(bytes).map_err(|e| FromSqlError::Other(Box::new(e)))?;
                text.parse().map_err(|e| FromSqlError::Other(Box::new(e)))
            }
            ValueRef::Integer(i) => Ok(RewardAmount::from(i)),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

impl Serialize for RewardAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for RewardAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Providers send amounts either as JSON strings or bare integers
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Int(i64),
            Uint(u64),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
            Raw::Int(i) => Ok(RewardAmount::from(i)),
            Raw::Uint(u) => Ok(RewardAmount::from(u)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amt(s: &str) -> RewardAmount {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_and_display_canonical() {
        assert_eq!(amt("1.500").to_string(), "1.5");
        assert_eq!(amt("0.000001").to_string(), "0.000001");
        assert_eq!(amt("-12.30").to_string(), "-12.3");
        assert_eq!(amt("+7").to_string(), "7");
        assert_eq!(amt("0.000").to_string(), "0");
        assert_eq!(amt("-0.0").to_string(), "0");
    }

    #[test]
    fn test_rejects_malformed() {
        for bad in ["", "-", "1.", ".5", "1.2.3", "abc", "1e5", "1,5"] {
            assert!(bad.parse::<RewardAmount>().is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_exact_decimal_addition() {
        // 0.1 + 0.2 must be exactly 0.3
        assert_eq!(amt("0.1") + amt("0.2"), amt("0.3"));

        let total: RewardAmount = ["1000000000000000000000.000000001", "0.999999999", "-1"]
            .iter()
            .map(|s| amt(s))
            .sum();
        assert_eq!(total.to_string(), "1000000000000000000000");
    }

    #[test]
    fn test_ordering_across_scales() {
        assert!(amt("1.05") > amt("1.0499999"));
        assert!(amt("-2") < amt("-1.5"));
        assert_eq!(amt("3.10").cmp(&amt("3.1")), Ordering::Equal);
    }

    #[test]
    fn test_serde_accepts_string_and_integer() {
        let a: RewardAmount = serde_json::from_str("\"42.50\"").unwrap();
        let b: RewardAmount = serde_json::from_str("42").unwrap();
        assert_eq!(a.to_string(), "42.5");
        assert_eq!(b.to_string(), "42");
        assert_eq!(serde_json::to_string(&a).unwrap(), "\"42.5\"");

        let negative: RewardAmount = serde_json::from_str("-7").unwrap();
        assert_eq!(negative.to_string(), "-7");
        // Above i64::MAX
        let big: RewardAmount = serde_json::from_str("18446744073709551615").unwrap();
        assert_eq!(big.to_string(), "18446744073709551615");
    }
}
