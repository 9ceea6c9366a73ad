//! Order model and order book

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::error::EngineError;
use crate::fees::FeePolicy;
use crate::money::Money;
use crate::rate::{AssetPair, ExchangeRate};

/// Taker-perspective side of an order: BUY converts base into quote,
/// SELL converts quote into base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// Min/max fill bounds, both in the pair's base currency.
#[derive(Debug, Clone)]
pub struct OrderBounds {
    min: Money,
    max: Money,
}

impl OrderBounds {
    pub fn new(min: Money, max: Money) -> Result<Self, EngineError> {
        if min.currency() != max.currency() {
            return Err(EngineError::currency_mismatch(min.currency(), max.currency()));
        }
        if min.amount() > max.amount() {
            return Err(EngineError::InvalidInput(format!(
                "order bounds must satisfy min <= max, got {min} > {max}"
            )));
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> &Money {
        &self.min
    }

    pub fn max(&self) -> &Money {
        &self.max
    }

    pub fn currency(&self) -> &str {
        self.min.currency()
    }

    /// Scale used when aligning resolved base amounts to the bounds.
    pub fn scale(&self) -> u32 {
        self.min.scale().max(self.max.scale())
    }

    pub fn contains(&self, amount: &Money) -> Result<bool, EngineError> {
        Ok(amount.cmp_amount(&self.min)? != std::cmp::Ordering::Less
            && amount.cmp_amount(&self.max)? != std::cmp::Ordering::Greater)
    }
}

/// An immutable order: side, asset pair, base-denominated bounds, effective
/// rate and an optional fee policy.
#[derive(Debug, Clone)]
pub struct Order {
    id: String,
    side: Side,
    pair: AssetPair,
    bounds: OrderBounds,
    rate: ExchangeRate,
    fee_policy: Option<Arc<dyn FeePolicy>>,
}

impl Order {
    pub fn new(
        id: &str,
        side: Side,
        pair: AssetPair,
        bounds: OrderBounds,
        rate: ExchangeRate,
        fee_policy: Option<Arc<dyn FeePolicy>>,
    ) -> Result<Self, EngineError> {
        if id.trim().is_empty() {
            return Err(EngineError::InvalidInput("order id must not be empty".to_string()));
        }
        if bounds.currency() != pair.base() {
            return Err(EngineError::currency_mismatch(pair.base(), bounds.currency()));
        }
        if rate.base_currency() != pair.base() || rate.quote_currency() != pair.quote() {
            return Err(EngineError::InvalidInput(format!(
                "rate {}/{} does not match pair {}/{}",
                rate.base_currency(),
                rate.quote_currency(),
                pair.base(),
                pair.quote()
            )));
        }
        Ok(Self {
            id: id.trim().to_string(),
            side,
            pair,
            bounds,
            rate,
            fee_policy,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn pair(&self) -> &AssetPair {
        &self.pair
    }

    pub fn bounds(&self) -> &OrderBounds {
        &self.bounds
    }

    pub fn rate(&self) -> &ExchangeRate {
        &self.rate
    }

    pub fn fee_policy(&self) -> Option<&Arc<dyn FeePolicy>> {
        self.fee_policy.as_ref()
    }

    /// Currency the taker spends into this order.
    pub fn spend_currency(&self) -> &str {
        match self.side {
            Side::Buy => self.pair.base(),
            Side::Sell => self.pair.quote(),
        }
    }

    /// Currency the taker receives from this order.
    pub fn receive_currency(&self) -> &str {
        match self.side {
            Side::Buy => self.pair.quote(),
            Side::Sell => self.pair.base(),
        }
    }
}

/// Immutable collection of orders handed to one routing request.
#[derive(Debug, Clone, Default)]
pub struct OrderBook {
    orders: Vec<Arc<Order>>,
}

impl OrderBook {
    pub fn new(orders: Vec<Order>) -> Self {
        Self {
            orders: orders.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn push(&mut self, order: Order) {
        self.orders.push(Arc::new(order));
    }

    pub fn orders(&self) -> &[Arc<Order>] {
        &self.orders
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::Decimal;

    fn pair(base: &str, quote: &str) -> AssetPair {
        AssetPair::new(base, quote).unwrap()
    }

    fn rate(base: &str, quote: &str, value: &str) -> ExchangeRate {
        ExchangeRate::new(base, quote, Decimal::parse(value).unwrap()).unwrap()
    }

    #[test]
    fn test_side_display_and_serde() {
        assert_eq!(Side::Buy.to_string(), "buy");
        assert_eq!(serde_json::to_string(&Side::Sell).unwrap(), "\"sell\"");
    }

    #[test]
    fn test_bounds_require_min_le_max() {
        let min = Money::parse("USD", "100").unwrap();
        let max = Money::parse("USD", "10").unwrap();
        assert!(OrderBounds::new(min, max).is_err());
    }

    #[test]
    fn test_order_validates_currencies() {
        let bounds = OrderBounds::new(
            Money::parse("EUR", "10").unwrap(),
            Money::parse("EUR", "1000").unwrap(),
        )
        .unwrap();
        // Bounds are in EUR but the pair's base is USD.
        assert!(Order::new(
            "o-1",
            Side::Buy,
            pair("USD", "BTC"),
            bounds,
            rate("USD", "BTC", "0.00002"),
            None,
        )
        .is_err());
    }

    #[test]
    fn test_spend_and_receive_currency() {
        let buy = Order::new(
            "o-1",
            Side::Buy,
            pair("USD", "BTC"),
            OrderBounds::new(
                Money::parse("USD", "10").unwrap(),
                Money::parse("USD", "1000").unwrap(),
            )
            .unwrap(),
            rate("USD", "BTC", "0.00002"),
            None,
        )
        .unwrap();
        assert_eq!(buy.spend_currency(), "USD");
        assert_eq!(buy.receive_currency(), "BTC");

        let sell = Order::new(
            "o-2",
            Side::Sell,
            pair("USDT", "RUB"),
            OrderBounds::new(
                Money::parse("USDT", "10").unwrap(),
                Money::parse("USDT", "1000").unwrap(),
            )
            .unwrap(),
            rate("USDT", "RUB", "90"),
            None,
        )
        .unwrap();
        assert_eq!(sell.spend_currency(), "RUB");
        assert_eq!(sell.receive_currency(), "USDT");
    }
}
