//! Fee policies
//!
//! The engine treats fee formulas as opaque: a policy receives the side,
//! the base amount and the raw quote of a fill and answers with the fees it
//! charges on each side. Two concrete policies are provided for hosts and
//! tests; anything implementing `FeePolicy` plugs in the same way.

use serde::Serialize;
use std::fmt;

use crate::decimal::Decimal;
use crate::error::EngineError;
use crate::money::Money;
use crate::order::Side;

/// Fees charged by one fill, split by currency side.
///
/// `base_fee` is denominated in the pair's base currency, `quote_fee` in the
/// quote currency. Absent sides charge nothing.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FeeBreakdown {
    pub base_fee: Option<Money>,
    pub quote_fee: Option<Money>,
}

impl FeeBreakdown {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_zero(&self) -> bool {
        self.base_fee.as_ref().map_or(true, Money::is_zero)
            && self.quote_fee.as_ref().map_or(true, Money::is_zero)
    }
}

/// Computes the fees an order charges for a given fill.
pub trait FeePolicy: fmt::Debug + Send + Sync {
    fn calculate(
        &self,
        side: Side,
        base_amount: &Money,
        raw_quote: &Money,
    ) -> Result<FeeBreakdown, EngineError>;
}

/// Proportional fee: a fixed rate applied to the base amount, the raw quote,
/// or both.
#[derive(Debug, Clone)]
pub struct RelativeFee {
    base_rate: Option<Decimal>,
    quote_rate: Option<Decimal>,
}

impl RelativeFee {
    pub fn new(base_rate: Option<Decimal>, quote_rate: Option<Decimal>) -> Result<Self, EngineError> {
        for rate in [&base_rate, &quote_rate].into_iter().flatten() {
            if rate.is_negative() {
                return Err(EngineError::InvalidAmount(format!(
                    "fee rate must not be negative, got {rate}"
                )));
            }
        }
        Ok(Self { base_rate, quote_rate })
    }

    pub fn on_base(rate: Decimal) -> Result<Self, EngineError> {
        Self::new(Some(rate), None)
    }

    pub fn on_quote(rate: Decimal) -> Result<Self, EngineError> {
        Self::new(None, Some(rate))
    }
}

impl FeePolicy for RelativeFee {
    fn calculate(
        &self,
        _side: Side,
        base_amount: &Money,
        raw_quote: &Money,
    ) -> Result<FeeBreakdown, EngineError> {
        let base_fee = match &self.base_rate {
            Some(rate) => Some(base_amount.mul_decimal(rate, base_amount.scale())?),
            None => None,
        };
        let quote_fee = match &self.quote_rate {
            Some(rate) => Some(raw_quote.mul_decimal(rate, raw_quote.scale())?),
            None => None,
        };
        Ok(FeeBreakdown { base_fee, quote_fee })
    }
}

/// Flat fee charged per fill regardless of size.
///
/// Makes the spend/receive relationship nonlinear, which is what the
/// iterative leg resolvers exist for. A zero-sized fill charges nothing.
#[derive(Debug, Clone)]
pub struct FixedFee {
    base_fee: Option<Money>,
    quote_fee: Option<Money>,
}

impl FixedFee {
    pub fn new(base_fee: Option<Money>, quote_fee: Option<Money>) -> Self {
        Self { base_fee, quote_fee }
    }

    pub fn on_base(fee: Money) -> Self {
        Self::new(Some(fee), None)
    }

    pub fn on_quote(fee: Money) -> Self {
        Self::new(None, Some(fee))
    }
}

impl FeePolicy for FixedFee {
    fn calculate(
        &self,
        _side: Side,
        base_amount: &Money,
        _raw_quote: &Money,
    ) -> Result<FeeBreakdown, EngineError> {
        if base_amount.is_zero() {
            return Ok(FeeBreakdown::none());
        }
        Ok(FeeBreakdown {
            base_fee: self.base_fee.clone(),
            quote_fee: self.quote_fee.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_fee_on_base() {
        let policy = RelativeFee::on_base(Decimal::new("0.10", 2).unwrap()).unwrap();
        let base = Money::parse("USD", "100.00").unwrap();
        let quote = Money::parse("EUR", "90.00").unwrap();
        let fees = policy.calculate(Side::Buy, &base, &quote).unwrap();
        assert_eq!(fees.base_fee.unwrap().amount().to_string(), "10.00");
        assert!(fees.quote_fee.is_none());
    }

    #[test]
    fn test_relative_fee_on_quote() {
        let policy = RelativeFee::on_quote(Decimal::new("0.01", 2).unwrap()).unwrap();
        let base = Money::parse("USDT", "100").unwrap();
        let quote = Money::parse("RUB", "9000.00").unwrap();
        let fees = policy.calculate(Side::Sell, &base, &quote).unwrap();
        assert!(fees.base_fee.is_none());
        assert_eq!(fees.quote_fee.unwrap().amount().to_string(), "90.00");
    }

    #[test]
    fn test_negative_rate_rejected() {
        assert!(RelativeFee::on_base(Decimal::new("-0.01", 2).unwrap()).is_err());
    }

    #[test]
    fn test_fixed_fee_skips_zero_fills() {
        let policy = FixedFee::on_quote(Money::parse("RUB", "50.00").unwrap());
        let zero = Money::zero("USDT", 2).unwrap();
        let quote = Money::zero("RUB", 2).unwrap();
        let fees = policy.calculate(Side::Sell, &zero, &quote).unwrap();
        assert!(fees.is_zero());

        let base = Money::parse("USDT", "10.00").unwrap();
        let fees = policy.calculate(Side::Sell, &base, &quote).unwrap();
        assert_eq!(fees.quote_fee.unwrap().amount().to_string(), "50.00");
    }
}
