//! Currency-tagged amounts and per-currency sums
//!
//! `Money` pairs a validated currency code with a non-negative `Decimal`.
//! All arithmetic enforces matching currencies; a mismatch is a programming
//! error and surfaces as `CurrencyMismatch`.

use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use crate::decimal::Decimal;
use crate::error::EngineError;

/// Validates and normalizes a currency code: 3 to 12 ASCII letters,
/// uppercased.
pub fn validate_currency(code: &str) -> Result<String, EngineError> {
    let normalized = code.trim().to_ascii_uppercase();
    let valid = (3..=12).contains(&normalized.len())
        && normalized.chars().all(|c| c.is_ascii_alphabetic());
    if !valid {
        return Err(EngineError::InvalidCurrency(code.to_string()));
    }
    Ok(normalized)
}

/// A non-negative amount in a single currency.
#[derive(Clone, PartialEq, Eq)]
pub struct Money {
    currency: String,
    amount: Decimal,
}

impl Money {
    pub fn new(currency: &str, amount: Decimal) -> Result<Self, EngineError> {
        let currency = validate_currency(currency)?;
        if amount.is_negative() {
            return Err(EngineError::NegativeAmount(amount.to_string()));
        }
        Ok(Self { currency, amount })
    }

    /// Parses the amount string at its natural scale.
    pub fn parse(currency: &str, amount: &str) -> Result<Self, EngineError> {
        Money::new(currency, Decimal::parse(amount)?)
    }

    pub fn zero(currency: &str, scale: u32) -> Result<Self, EngineError> {
        Money::new(currency, Decimal::zero(scale))
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn amount(&self) -> &Decimal {
        &self.amount
    }

    pub fn scale(&self) -> u32 {
        self.amount.scale()
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    fn require_same_currency(&self, other: &Money) -> Result<(), EngineError> {
        if self.currency != other.currency {
            return Err(EngineError::currency_mismatch(&self.currency, &other.currency));
        }
        Ok(())
    }

    pub fn add(&self, other: &Money) -> Result<Money, EngineError> {
        self.require_same_currency(other)?;
        Money::new(&self.currency, self.amount.add(&other.amount))
    }

    /// Subtracts `other`; the result must stay non-negative.
    pub fn sub(&self, other: &Money) -> Result<Money, EngineError> {
        self.require_same_currency(other)?;
        let amount = self.amount.sub(&other.amount);
        if amount.is_negative() {
            return Err(EngineError::NegativeAmount(amount.to_string()));
        }
        Money::new(&self.currency, amount)
    }

    pub fn mul_decimal(&self, factor: &Decimal, scale: u32) -> Result<Money, EngineError> {
        Money::new(&self.currency, self.amount.mul_with_scale(factor, scale)?)
    }

    pub fn div_decimal(&self, divisor: &Decimal, scale: u32) -> Result<Money, EngineError> {
        Money::new(&self.currency, self.amount.div_with_scale(divisor, scale)?)
    }

    pub fn with_scale(&self, scale: u32) -> Result<Money, EngineError> {
        Money::new(&self.currency, self.amount.with_scale(scale)?)
    }

    pub fn cmp_amount(&self, other: &Money) -> Result<Ordering, EngineError> {
        self.require_same_currency(other)?;
        Ok(self.amount.cmp(&other.amount))
    }

    pub fn min(&self, other: &Money) -> Result<Money, EngineError> {
        Ok(match self.cmp_amount(other)? {
            Ordering::Greater => other.clone(),
            _ => self.clone(),
        })
    }

    pub fn max(&self, other: &Money) -> Result<Money, EngineError> {
        Ok(match self.cmp_amount(other)? {
            Ordering::Less => other.clone(),
            _ => self.clone(),
        })
    }

    /// Clamps the amount into `[lo, hi]` (all in the same currency).
    pub fn clamp(&self, lo: &Money, hi: &Money) -> Result<Money, EngineError> {
        self.max(lo)?.min(hi)
    }

    /// `self / other` as a bare ratio at the requested scale.
    pub fn ratio_to(&self, other: &Money, scale: u32) -> Result<Decimal, EngineError> {
        self.require_same_currency(other)?;
        self.amount.div_with_scale(&other.amount, scale)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

impl fmt::Debug for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Money({} {})", self.amount, self.currency)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Money", 3)?;
        state.serialize_field("currency", &self.currency)?;
        state.serialize_field("amount", &self.amount.to_string())?;
        state.serialize_field("scale", &self.amount.scale())?;
        state.end()
    }
}

#[derive(Deserialize)]
struct MoneyRepr {
    currency: String,
    amount: String,
    scale: u32,
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = MoneyRepr::deserialize(deserializer)?;
        let amount = Decimal::new(&repr.amount, repr.scale).map_err(serde::de::Error::custom)?;
        Money::new(&repr.currency, amount).map_err(serde::de::Error::custom)
    }
}

/// Currency-keyed sum of money amounts.
///
/// Backed by a `BTreeMap` so iteration and the JSON form are always in
/// ascending currency order. Zero amounts are not recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MoneyMap {
    entries: BTreeMap<String, Money>,
}

impl MoneyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, money: &Money) -> Result<(), EngineError> {
        if money.is_zero() {
            return Ok(());
        }
        match self.entries.get(money.currency()) {
            Some(existing) => {
                let sum = existing.add(money)?;
                self.entries.insert(money.currency().to_string(), sum);
            }
            None => {
                self.entries.insert(money.currency().to_string(), money.clone());
            }
        }
        Ok(())
    }

    pub fn merge(&mut self, other: &MoneyMap) -> Result<(), EngineError> {
        for money in other.entries.values() {
            self.add(money)?;
        }
        Ok(())
    }

    pub fn get(&self, currency: &str) -> Option<&Money> {
        self.entries.get(currency)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Money)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl Serialize for MoneyMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.entries.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_validation() {
        assert_eq!(validate_currency("usd").unwrap(), "USD");
        assert_eq!(validate_currency(" Usdt ").unwrap(), "USDT");
        assert!(validate_currency("US").is_err());
        assert!(validate_currency("TOOLONGCURRENCY").is_err());
        assert!(validate_currency("US1").is_err());
        assert!(validate_currency("").is_err());
    }

    #[test]
    fn test_rejects_negative_amount() {
        let negative = Decimal::new("-1.00", 2).unwrap();
        assert!(matches!(
            Money::new("USD", negative),
            Err(EngineError::NegativeAmount(_))
        ));
    }

    #[test]
    fn test_add_requires_matching_currency() {
        let usd = Money::parse("USD", "10.00").unwrap();
        let eur = Money::parse("EUR", "10.00").unwrap();
        assert!(matches!(
            usd.add(&eur),
            Err(EngineError::CurrencyMismatch { .. })
        ));
    }

    #[test]
    fn test_add_widens_scale() {
        let a = Money::parse("USD", "10.5").unwrap();
        let b = Money::parse("USD", "0.25").unwrap();
        let sum = a.add(&b).unwrap();
        assert_eq!(sum.amount().to_string(), "10.75");
        assert_eq!(sum.scale(), 2);
    }

    #[test]
    fn test_sub_rejects_negative_result() {
        let a = Money::parse("USD", "1.00").unwrap();
        let b = Money::parse("USD", "2.00").unwrap();
        assert!(a.sub(&b).is_err());
        assert_eq!(b.sub(&a).unwrap().amount().to_string(), "1.00");
    }

    #[test]
    fn test_clamp() {
        let lo = Money::parse("USD", "10").unwrap();
        let hi = Money::parse("USD", "100").unwrap();
        let m = Money::parse("USD", "250").unwrap();
        assert_eq!(m.clamp(&lo, &hi).unwrap(), hi);
        let small = Money::parse("USD", "2").unwrap();
        assert_eq!(small.clamp(&lo, &hi).unwrap(), lo);
    }

    #[test]
    fn test_money_json_form() {
        let m = Money::new("BTC", Decimal::new("0.00200", 5).unwrap()).unwrap();
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"currency": "BTC", "amount": "0.00200", "scale": 5})
        );
        let back: Money = serde_json::from_value(json).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn test_money_map_merges_and_orders() {
        let mut map = MoneyMap::new();
        map.add(&Money::parse("USD", "1.00").unwrap()).unwrap();
        map.add(&Money::parse("BTC", "0.1").unwrap()).unwrap();
        map.add(&Money::parse("USD", "2.00").unwrap()).unwrap();
        map.add(&Money::zero("EUR", 2).unwrap()).unwrap();

        assert_eq!(map.len(), 2);
        assert_eq!(map.get("USD").unwrap().amount().to_string(), "3.00");

        let currencies: Vec<&str> = map.iter().map(|(c, _)| c).collect();
        assert_eq!(currencies, vec!["BTC", "USD"]);

        let json = serde_json::to_string(&map).unwrap();
        let btc_pos = json.find("BTC").unwrap();
        let usd_pos = json.find("USD").unwrap();
        assert!(btc_pos < usd_pos);
    }
}
