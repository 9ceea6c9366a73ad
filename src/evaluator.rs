//! Order fill evaluation
//!
//! The fill evaluator is the seam between the routing core and the fee
//! model: given an order and a base amount it answers what the taker pays
//! and receives, fees included. The standard implementation applies the
//! order's fee policy on top of the pay side and deducts it from the
//! receive side; hosts may inject their own evaluator.

use std::fmt;

use crate::error::EngineError;
use crate::fees::FeeBreakdown;
use crate::money::Money;
use crate::order::{Order, Side};

/// Outcome of filling an order at a given net base amount.
#[derive(Debug, Clone)]
pub struct OrderFill {
    /// Base amount the order itself fills (what the bounds constrain).
    pub net_base: Money,
    /// Quote side of the fill. For a BUY this is what the taker receives
    /// (raw quote minus any quote fee); for a SELL it is the raw conversion
    /// amount the taker's spend is matched against.
    pub quote: Money,
    /// Base the taker must provide: net base plus any base fee.
    pub gross_base: Money,
    pub fees: FeeBreakdown,
}

/// Quote-side view of a SELL fill at a given base amount.
#[derive(Debug, Clone)]
pub struct SellQuote {
    /// Base the taker receives after any base fee.
    pub net_base: Money,
    /// Raw conversion amount (`base × rate`); the quantity a taker's target
    /// spend is solved against.
    pub effective_quote: Money,
    /// Quote the taker actually pays: effective quote plus any quote fee.
    pub gross_quote: Money,
    pub fees: FeeBreakdown,
}

/// Computes fill breakdowns for orders.
pub trait OrderFillEvaluator: fmt::Debug {
    fn evaluate_fill(&self, order: &Order, base_amount: &Money) -> Result<OrderFill, EngineError>;

    fn evaluate_sell_quote(
        &self,
        order: &Order,
        base_amount: &Money,
    ) -> Result<SellQuote, EngineError>;
}

/// Default evaluator: applies the order's fee policy directly.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardFillEvaluator;

impl StandardFillEvaluator {
    fn quote_scale(&self, order: &Order, base_amount: &Money) -> u32 {
        base_amount.scale().max(order.rate().scale())
    }

    fn fees_for(
        &self,
        order: &Order,
        base_amount: &Money,
        raw_quote: &Money,
    ) -> Result<FeeBreakdown, EngineError> {
        match order.fee_policy() {
            Some(policy) => policy.calculate(order.side(), base_amount, raw_quote),
            None => Ok(FeeBreakdown::none()),
        }
    }
}

impl OrderFillEvaluator for StandardFillEvaluator {
    fn evaluate_fill(&self, order: &Order, base_amount: &Money) -> Result<OrderFill, EngineError> {
        if base_amount.currency() != order.pair().base() {
            return Err(EngineError::currency_mismatch(
                order.pair().base(),
                base_amount.currency(),
            ));
        }
        let raw_quote = order.rate().convert(base_amount, self.quote_scale(order, base_amount))?;
        let fees = self.fees_for(order, base_amount, &raw_quote)?;

        let gross_base = match &fees.base_fee {
            Some(fee) => base_amount.add(fee)?,
            None => base_amount.clone(),
        };
        let quote = match (order.side(), &fees.quote_fee) {
            (Side::Buy, Some(fee)) => raw_quote.sub(fee)?,
            _ => raw_quote,
        };
        Ok(OrderFill {
            net_base: base_amount.clone(),
            quote,
            gross_base,
            fees,
        })
    }

    fn evaluate_sell_quote(
        &self,
        order: &Order,
        base_amount: &Money,
    ) -> Result<SellQuote, EngineError> {
        if base_amount.currency() != order.pair().base() {
            return Err(EngineError::currency_mismatch(
                order.pair().base(),
                base_amount.currency(),
            ));
        }
        let raw_quote = order.rate().convert(base_amount, self.quote_scale(order, base_amount))?;
        let fees = self.fees_for(order, base_amount, &raw_quote)?;

        let gross_quote = match &fees.quote_fee {
            Some(fee) => raw_quote.add(fee)?,
            None => raw_quote.clone(),
        };
        let net_base = match &fees.base_fee {
            Some(fee) => base_amount.sub(fee)?,
            None => base_amount.clone(),
        };
        Ok(SellQuote {
            net_base,
            effective_quote: raw_quote,
            gross_quote,
            fees,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::Decimal;
    use crate::fees::RelativeFee;
    use crate::order::OrderBounds;
    use crate::rate::{AssetPair, ExchangeRate};
    use std::sync::Arc;

    fn buy_order(fee_rate: Option<&str>) -> Order {
        let policy = fee_rate.map(|r| {
            Arc::new(RelativeFee::on_base(Decimal::parse(r).unwrap()).unwrap())
                as Arc<dyn crate::fees::FeePolicy>
        });
        Order::new(
            "buy-1",
            Side::Buy,
            AssetPair::new("USD", "EUR").unwrap(),
            OrderBounds::new(
                Money::parse("USD", "50.00").unwrap(),
                Money::parse("USD", "200.00").unwrap(),
            )
            .unwrap(),
            ExchangeRate::new("USD", "EUR", Decimal::new("0.90", 2).unwrap()).unwrap(),
            policy,
        )
        .unwrap()
    }

    fn sell_order(fee_rate: Option<&str>) -> Order {
        let policy = fee_rate.map(|r| {
            Arc::new(RelativeFee::on_quote(Decimal::parse(r).unwrap()).unwrap())
                as Arc<dyn crate::fees::FeePolicy>
        });
        Order::new(
            "sell-1",
            Side::Sell,
            AssetPair::new("USDT", "RUB").unwrap(),
            OrderBounds::new(
                Money::parse("USDT", "10.00").unwrap(),
                Money::parse("USDT", "1000.00").unwrap(),
            )
            .unwrap(),
            ExchangeRate::new("USDT", "RUB", Decimal::new("90.00", 2).unwrap()).unwrap(),
            policy,
        )
        .unwrap()
    }

    #[test]
    fn test_fill_without_fees() {
        let evaluator = StandardFillEvaluator;
        let fill = evaluator
            .evaluate_fill(&buy_order(None), &Money::parse("USD", "100.00").unwrap())
            .unwrap();
        assert_eq!(fill.net_base.amount().to_string(), "100.00");
        assert_eq!(fill.gross_base.amount().to_string(), "100.00");
        assert_eq!(fill.quote.amount().to_string(), "90.00");
        assert!(fill.fees.is_zero());
    }

    #[test]
    fn test_fill_with_base_fee() {
        let evaluator = StandardFillEvaluator;
        let fill = evaluator
            .evaluate_fill(&buy_order(Some("0.10")), &Money::parse("USD", "100.00").unwrap())
            .unwrap();
        assert_eq!(fill.gross_base.amount().to_string(), "110.00");
        assert_eq!(fill.quote.amount().to_string(), "90.00");
        assert_eq!(fill.fees.base_fee.as_ref().unwrap().amount().to_string(), "10.00");
    }

    #[test]
    fn test_sell_quote_with_quote_fee() {
        let evaluator = StandardFillEvaluator;
        let sq = evaluator
            .evaluate_sell_quote(&sell_order(Some("0.01")), &Money::parse("USDT", "100.00").unwrap())
            .unwrap();
        assert_eq!(sq.effective_quote.amount().to_string(), "9000.00");
        assert_eq!(sq.gross_quote.amount().to_string(), "9090.00");
        assert_eq!(sq.net_base.amount().to_string(), "100.00");
    }

    #[test]
    fn test_fill_rejects_wrong_currency() {
        let evaluator = StandardFillEvaluator;
        assert!(evaluator
            .evaluate_fill(&buy_order(None), &Money::parse("EUR", "100.00").unwrap())
            .is_err());
    }
}
