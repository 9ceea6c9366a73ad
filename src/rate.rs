//! Asset pairs and exchange rates

use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::decimal::Decimal;
use crate::error::EngineError;
use crate::money::{validate_currency, Money};

/// Base/quote currency pair; the two sides are distinct after uppercase
/// normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetPair {
    base: String,
    quote: String,
}

impl AssetPair {
    pub fn new(base: &str, quote: &str) -> Result<Self, EngineError> {
        let base = validate_currency(base)?;
        let quote = validate_currency(quote)?;
        if base == quote {
            return Err(EngineError::InvalidInput(format!(
                "asset pair sides must differ, got {base}/{quote}"
            )));
        }
        Ok(Self { base, quote })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn quote(&self) -> &str {
        &self.quote
    }
}

impl Serialize for AssetPair {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("AssetPair", 2)?;
        state.serialize_field("base", &self.base)?;
        state.serialize_field("quote", &self.quote)?;
        state.end()
    }
}

#[derive(Deserialize)]
struct AssetPairRepr {
    base: String,
    quote: String,
}

impl<'de> Deserialize<'de> for AssetPair {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = AssetPairRepr::deserialize(deserializer)?;
        AssetPair::new(&repr.base, &repr.quote).map_err(serde::de::Error::custom)
    }
}

/// Conversion rate from a base currency into a quote currency.
///
/// `convert` multiplies a base amount by the rate; `invert` swaps the
/// currencies and computes `1/rate` at the same scale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeRate {
    base: String,
    quote: String,
    rate: Decimal,
}

impl ExchangeRate {
    pub fn new(base: &str, quote: &str, rate: Decimal) -> Result<Self, EngineError> {
        let base = validate_currency(base)?;
        let quote = validate_currency(quote)?;
        if base == quote {
            return Err(EngineError::InvalidInput(format!(
                "exchange rate sides must differ, got {base}/{quote}"
            )));
        }
        if !rate.is_positive() {
            return Err(EngineError::InvalidAmount(format!(
                "exchange rate must be positive, got {rate}"
            )));
        }
        Ok(Self { base, quote, rate })
    }

    pub fn base_currency(&self) -> &str {
        &self.base
    }

    pub fn quote_currency(&self) -> &str {
        &self.quote
    }

    pub fn rate(&self) -> &Decimal {
        &self.rate
    }

    pub fn scale(&self) -> u32 {
        self.rate.scale()
    }

    /// Converts a base-currency amount into the quote currency at the
    /// requested scale.
    pub fn convert(&self, money: &Money, scale: u32) -> Result<Money, EngineError> {
        if money.currency() != self.base {
            return Err(EngineError::currency_mismatch(&self.base, money.currency()));
        }
        Money::new(&self.quote, money.amount().mul_with_scale(&self.rate, scale)?)
    }

    /// Swaps the currencies and computes `1/rate` at the same scale.
    pub fn invert(&self) -> Result<ExchangeRate, EngineError> {
        let inverted = Decimal::one(self.rate.scale()).div_with_scale(&self.rate, self.rate.scale())?;
        ExchangeRate::new(&self.quote, &self.base, inverted)
    }
}
