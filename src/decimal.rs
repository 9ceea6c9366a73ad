//! Exact decimal arithmetic with explicit scale and HALF_UP rounding
//!
//! Every amount that can reach a result is represented as a `Decimal`: an
//! arbitrary-precision signed value carrying an explicit scale (number of
//! digits after the point). Arithmetic widens or preserves scale according
//! to fixed rules so that identical inputs always produce byte-identical
//! rendered amounts. Floating point never appears.

use bigdecimal::{BigDecimal, RoundingMode};
use num_bigint::{BigInt, Sign};
use num_traits::Zero;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::EngineError;

/// Largest supported scale (digits after the decimal point).
pub const MAX_SCALE: u32 = 50;

/// Immutable exact decimal with a fixed scale in `0..=50`.
///
/// - `add`/`sub` widen the result to `max(a.scale, b.scale)` unless an
///   explicit scale is requested;
/// - `mul`/`div` default to the left operand's scale;
/// - narrowing always rounds HALF_UP (ties away from zero).
#[derive(Clone)]
pub struct Decimal {
    value: BigDecimal,
    scale: u32,
}

fn rescale(value: BigDecimal, scale: u32) -> BigDecimal {
    value.with_scale_round(i64::from(scale), RoundingMode::HalfUp)
}

fn check_scale(scale: u32) -> Result<(), EngineError> {
    if scale > MAX_SCALE {
        return Err(EngineError::ScaleOutOfRange(scale));
    }
    Ok(())
}

impl Decimal {
    /// Parses `value` and rounds it to the requested scale.
    pub fn new(value: &str, scale: u32) -> Result<Self, EngineError> {
        check_scale(scale)?;
        let parsed = BigDecimal::from_str(value.trim())
            .map_err(|_| EngineError::InvalidAmount(value.to_string()))?;
        Ok(Self {
            value: rescale(parsed, scale),
            scale,
        })
    }

    /// Parses `value`, inferring the scale from its fractional digits.
    pub fn parse(value: &str) -> Result<Self, EngineError> {
        let parsed = BigDecimal::from_str(value.trim())
            .map_err(|_| EngineError::InvalidAmount(value.to_string()))?;
        let digits = parsed.fractional_digit_count().max(0);
        let scale = u32::try_from(digits).map_err(|_| EngineError::InvalidAmount(value.to_string()))?;
        check_scale(scale)?;
        Ok(Self {
            value: rescale(parsed, scale),
            scale,
        })
    }

    /// Builds a decimal from an integer mantissa: `mantissa × 10^(-scale)`.
    ///
    /// Used for exact internal constants such as `10⁻⁶`.
    pub fn from_raw(mantissa: i64, scale: u32) -> Self {
        let scale = scale.min(MAX_SCALE);
        Self {
            value: BigDecimal::new(BigInt::from(mantissa), i64::from(scale)),
            scale,
        }
    }

    pub fn from_i64(value: i64, scale: u32) -> Result<Self, EngineError> {
        check_scale(scale)?;
        Ok(Self {
            value: rescale(BigDecimal::from(value), scale),
            scale,
        })
    }

    pub fn zero(scale: u32) -> Self {
        let scale = scale.min(MAX_SCALE);
        Self {
            value: rescale(BigDecimal::zero(), scale),
            scale,
        }
    }

    pub fn one(scale: u32) -> Self {
        let scale = scale.min(MAX_SCALE);
        Self {
            value: rescale(BigDecimal::from(1), scale),
            scale,
        }
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.value.sign() == Sign::Minus
    }

    pub fn is_positive(&self) -> bool {
        self.value.sign() == Sign::Plus
    }

    pub fn abs(&self) -> Self {
        Self {
            value: self.value.abs(),
            scale: self.scale,
        }
    }

    /// Re-renders the value at a different scale, rounding HALF_UP when
    /// narrowing.
    pub fn with_scale(&self, scale: u32) -> Result<Self, EngineError> {
        check_scale(scale)?;
        Ok(Self {
            value: rescale(self.value.clone(), scale),
            scale,
        })
    }

    pub fn add(&self, other: &Decimal) -> Decimal {
        let scale = self.scale.max(other.scale);
        Decimal {
            value: rescale(&self.value + &other.value, scale),
            scale,
        }
    }

    pub fn add_with_scale(&self, other: &Decimal, scale: u32) -> Result<Decimal, EngineError> {
        check_scale(scale)?;
        Ok(Decimal {
            value: rescale(&self.value + &other.value, scale),
            scale,
        })
    }

    pub fn sub(&self, other: &Decimal) -> Decimal {
        let scale = self.scale.max(other.scale);
        Decimal {
            value: rescale(&self.value - &other.value, scale),
            scale,
        }
    }

    pub fn sub_with_scale(&self, other: &Decimal, scale: u32) -> Result<Decimal, EngineError> {
        check_scale(scale)?;
        Ok(Decimal {
            value: rescale(&self.value - &other.value, scale),
            scale,
        })
    }

    pub fn mul(&self, other: &Decimal) -> Decimal {
        Decimal {
            value: rescale(&self.value * &other.value, self.scale),
            scale: self.scale,
        }
    }

    pub fn mul_with_scale(&self, other: &Decimal, scale: u32) -> Result<Decimal, EngineError> {
        check_scale(scale)?;
        Ok(Decimal {
            value: rescale(&self.value * &other.value, scale),
            scale,
        })
    }

    pub fn div(&self, other: &Decimal) -> Result<Decimal, EngineError> {
        self.div_with_scale(other, self.scale)
    }

    pub fn div_with_scale(&self, other: &Decimal, scale: u32) -> Result<Decimal, EngineError> {
        check_scale(scale)?;
        if other.is_zero() {
            return Err(EngineError::DivisionByZero);
        }
        Ok(Decimal {
            value: rescale(&self.value / &other.value, scale),
            scale,
        })
    }

    pub fn min(&self, other: &Decimal) -> Decimal {
        if self <= other {
            self.clone()
        } else {
            other.clone()
        }
    }

    pub fn max(&self, other: &Decimal) -> Decimal {
        if self >= other {
            self.clone()
        } else {
            other.clone()
        }
    }
}

impl PartialEq for Decimal {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
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
        self.value.cmp(&other.value)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl fmt::Debug for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Decimal({})", self.value)
    }
}

impl Serialize for Decimal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Decimal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Decimal::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_infers_scale() {
        let d = Decimal::parse("123.450").unwrap();
        assert_eq!(d.scale(), 3);
        assert_eq!(d.to_string(), "123.450");

        let whole = Decimal::parse("42").unwrap();
        assert_eq!(whole.scale(), 0);
        assert_eq!(whole.to_string(), "42");
    }

    #[test]
    fn test_new_rounds_half_up() {
        assert_eq!(Decimal::new("1.005", 2).unwrap().to_string(), "1.01");
        assert_eq!(Decimal::new("1.004", 2).unwrap().to_string(), "1.00");
        assert_eq!(Decimal::new("-1.005", 2).unwrap().to_string(), "-1.01");
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(Decimal::parse("abc").is_err());
        assert!(Decimal::new("1.0", 51).is_err());
        assert!(matches!(
            Decimal::new("1.0", 99),
            Err(EngineError::ScaleOutOfRange(99))
        ));
    }

    #[test]
    fn test_add_widens_scale() {
        let a = Decimal::new("1.5", 1).unwrap();
        let b = Decimal::new("2.25", 2).unwrap();
        let sum = a.add(&b);
        assert_eq!(sum.scale(), 2);
        assert_eq!(sum.to_string(), "3.75");
    }

    #[test]
    fn test_sub_can_go_negative() {
        let a = Decimal::new("1.00", 2).unwrap();
        let b = Decimal::new("2.50", 2).unwrap();
        let diff = a.sub(&b);
        assert!(diff.is_negative());
        assert_eq!(diff.to_string(), "-1.50");
    }

    #[test]
    fn test_mul_keeps_left_scale() {
        let a = Decimal::new("100.00", 2).unwrap();
        let b = Decimal::new("0.00002", 5).unwrap();
        let product = a.mul(&b);
        assert_eq!(product.scale(), 2);
        assert_eq!(product.to_string(), "0.00");

        let wide = a.mul_with_scale(&b, 5).unwrap();
        assert_eq!(wide.to_string(), "0.00200");
    }

    #[test]
    fn test_div_rounds_half_up() {
        let a = Decimal::new("10", 0).unwrap();
        let b = Decimal::new("3", 0).unwrap();
        let q = a.div_with_scale(&b, 4).unwrap();
        assert_eq!(q.to_string(), "3.3333");

        let r = Decimal::new("2", 0)
            .unwrap()
            .div_with_scale(&Decimal::new("3", 0).unwrap(), 4)
            .unwrap();
        assert_eq!(r.to_string(), "0.6667");
    }

    #[test]
    fn test_div_by_zero() {
        let a = Decimal::new("1", 0).unwrap();
        let zero = Decimal::zero(0);
        assert_eq!(a.div(&zero), Err(EngineError::DivisionByZero));
    }

    #[test]
    fn test_compare_across_scales() {
        let a = Decimal::new("1.50", 2).unwrap();
        let b = Decimal::new("1.5000", 4).unwrap();
        assert_eq!(a, b);
        assert!(Decimal::new("1.51", 2).unwrap() > b);
    }

    #[test]
    fn test_from_raw() {
        let epsilon = Decimal::from_raw(1, 6);
        assert_eq!(epsilon.to_string(), "0.000001");
        assert_eq!(epsilon.scale(), 6);
    }

    #[test]
    fn test_serde_round_trip() {
        let d = Decimal::new("0.00200", 5).unwrap();
        let json = serde_json::to_string(&d).unwrap();
        assert_eq!(json, "\"0.00200\"");
        let back: Decimal = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d);
        assert_eq!(back.scale(), 5);
    }

    #[test]
    fn test_with_scale_widening_is_exact() {
        let d = Decimal::new("2.5", 1).unwrap();
        let wide = d.with_scale(4).unwrap();
        assert_eq!(wide.to_string(), "2.5000");
        let narrow = wide.with_scale(0).unwrap();
        assert_eq!(narrow.to_string(), "3");
    }
}
