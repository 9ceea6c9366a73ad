//! Search configuration
//!
//! `PathSearchConfig` is a plain validated value type covering every option
//! of a routing request; a builder enumerates them all. The spend window
//! handed to the search derives from the desired amount and the tolerance
//! ratios.

use crate::decimal::Decimal;
use crate::error::EngineError;
use crate::money::Money;
use crate::tolerance::ToleranceWindow;
use crate::types::SpendRange;

pub const DEFAULT_MAX_EXPANSIONS: u64 = 25_000;
pub const DEFAULT_MAX_VISITED_STATES: u64 = 10_000;
pub const DEFAULT_MAX_HOPS: usize = 3;

/// All options of one routing request.
#[derive(Debug, Clone)]
pub struct PathSearchConfig {
    spend_amount: Money,
    min_tolerance_ratio: Decimal,
    max_tolerance_ratio: Decimal,
    min_hops: usize,
    max_hops: usize,
    result_limit: usize,
    max_expansions: u64,
    max_visited_states: u64,
    time_budget_ms: Option<u64>,
    disjoint_plans: bool,
    throw_on_guard_breach: bool,
}

impl PathSearchConfig {
    pub fn builder(spend_amount: Money) -> PathSearchConfigBuilder {
        PathSearchConfigBuilder::new(spend_amount)
    }

    pub fn spend_amount(&self) -> &Money {
        &self.spend_amount
    }

    pub fn min_tolerance_ratio(&self) -> &Decimal {
        &self.min_tolerance_ratio
    }

    pub fn max_tolerance_ratio(&self) -> &Decimal {
        &self.max_tolerance_ratio
    }

    pub fn min_hops(&self) -> usize {
        self.min_hops
    }

    pub fn max_hops(&self) -> usize {
        self.max_hops
    }

    pub fn result_limit(&self) -> usize {
        self.result_limit
    }

    pub fn max_expansions(&self) -> u64 {
        self.max_expansions
    }

    pub fn max_visited_states(&self) -> u64 {
        self.max_visited_states
    }

    pub fn time_budget_ms(&self) -> Option<u64> {
        self.time_budget_ms
    }

    pub fn disjoint_plans(&self) -> bool {
        self.disjoint_plans
    }

    pub fn throw_on_guard_breach(&self) -> bool {
        self.throw_on_guard_breach
    }

    pub fn tolerance_window(&self) -> Result<ToleranceWindow, EngineError> {
        ToleranceWindow::new(
            self.min_tolerance_ratio.clone(),
            self.max_tolerance_ratio.clone(),
        )
    }

    /// Spend window derived from the desired amount and the tolerance
    /// ratios: `[desired × (1 - min), desired × (1 + max)]` at the desired
    /// amount's scale, with the desired amount carried along.
    pub fn spend_range(&self) -> Result<SpendRange, EngineError> {
        let scale = self.spend_amount.scale();
        let one = Decimal::one(scale);
        let min_factor = one.sub(&self.min_tolerance_ratio);
        let max_factor = one.add(&self.max_tolerance_ratio);
        let min = self.spend_amount.mul_decimal(&min_factor, scale)?;
        let max = self.spend_amount.mul_decimal(&max_factor, scale)?;
        SpendRange::new(min, max, Some(self.spend_amount.clone()))
    }
}

/// Builder enumerating every `PathSearchConfig` option.
#[derive(Debug, Clone)]
pub struct PathSearchConfigBuilder {
    spend_amount: Money,
    min_tolerance_ratio: Decimal,
    max_tolerance_ratio: Decimal,
    min_hops: usize,
    max_hops: usize,
    result_limit: usize,
    max_expansions: u64,
    max_visited_states: u64,
    time_budget_ms: Option<u64>,
    disjoint_plans: bool,
    throw_on_guard_breach: bool,
}

impl PathSearchConfigBuilder {
    pub fn new(spend_amount: Money) -> Self {
        Self {
            spend_amount,
            min_tolerance_ratio: Decimal::zero(0),
            max_tolerance_ratio: Decimal::zero(0),
            min_hops: 1,
            max_hops: DEFAULT_MAX_HOPS,
            result_limit: 1,
            max_expansions: DEFAULT_MAX_EXPANSIONS,
            max_visited_states: DEFAULT_MAX_VISITED_STATES,
            time_budget_ms: None,
            disjoint_plans: true,
            throw_on_guard_breach: false,
        }
    }

    pub fn tolerance(mut self, min_ratio: Decimal, max_ratio: Decimal) -> Self {
        self.min_tolerance_ratio = min_ratio;
        self.max_tolerance_ratio = max_ratio;
        self
    }

    pub fn hops(mut self, min_hops: usize, max_hops: usize) -> Self {
        self.min_hops = min_hops;
        self.max_hops = max_hops;
        self
    }

    pub fn result_limit(mut self, limit: usize) -> Self {
        self.result_limit = limit;
        self
    }

    pub fn max_expansions(mut self, limit: u64) -> Self {
        self.max_expansions = limit;
        self
    }

    pub fn max_visited_states(mut self, limit: u64) -> Self {
        self.max_visited_states = limit;
        self
    }

    pub fn time_budget_ms(mut self, budget: Option<u64>) -> Self {
        self.time_budget_ms = budget;
        self
    }

    pub fn disjoint_plans(mut self, disjoint: bool) -> Self {
        self.disjoint_plans = disjoint;
        self
    }

    pub fn throw_on_guard_breach(mut self, throw: bool) -> Self {
        self.throw_on_guard_breach = throw;
        self
    }

    pub fn build(self) -> Result<PathSearchConfig, EngineError> {
        if self.spend_amount.is_zero() {
            return Err(EngineError::InvalidInput(
                "spend amount must be positive".to_string(),
            ));
        }
        // Validates both ratios.
        ToleranceWindow::new(
            self.min_tolerance_ratio.clone(),
            self.max_tolerance_ratio.clone(),
        )?;
        if self.min_hops < 1 || self.min_hops > self.max_hops {
            return Err(EngineError::InvalidInput(format!(
                "hops must satisfy 1 <= min <= max, got {}..{}",
                self.min_hops, self.max_hops
            )));
        }
        if self.result_limit < 1 {
            return Err(EngineError::InvalidInput(
                "result limit must be at least 1".to_string(),
            ));
        }
        if self.max_expansions < 1 || self.max_visited_states < 1 {
            return Err(EngineError::InvalidInput(
                "guard limits must be at least 1".to_string(),
            ));
        }
        Ok(PathSearchConfig {
            spend_amount: self.spend_amount,
            min_tolerance_ratio: self.min_tolerance_ratio,
            max_tolerance_ratio: self.max_tolerance_ratio,
            min_hops: self.min_hops,
            max_hops: self.max_hops,
            result_limit: self.result_limit,
            max_expansions: self.max_expansions,
            max_visited_states: self.max_visited_states,
            time_budget_ms: self.time_budget_ms,
            disjoint_plans: self.disjoint_plans,
            throw_on_guard_breach: self.throw_on_guard_breach,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spend() -> Money {
        Money::parse("USD", "100.00").unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = PathSearchConfig::builder(spend()).build().unwrap();
        assert_eq!(config.min_hops(), 1);
        assert_eq!(config.max_hops(), DEFAULT_MAX_HOPS);
        assert_eq!(config.result_limit(), 1);
        assert_eq!(config.max_expansions(), DEFAULT_MAX_EXPANSIONS);
        assert_eq!(config.max_visited_states(), DEFAULT_MAX_VISITED_STATES);
        assert!(config.disjoint_plans());
        assert!(!config.throw_on_guard_breach());
        assert!(config.time_budget_ms().is_none());
    }

    #[test]
    fn test_spend_range_derivation() {
        let config = PathSearchConfig::builder(spend())
            .tolerance(
                Decimal::parse("0.05").unwrap(),
                Decimal::parse("0.10").unwrap(),
            )
            .build()
            .unwrap();
        let range = config.spend_range().unwrap();
        assert_eq!(range.min().amount().to_string(), "95.00");
        assert_eq!(range.max().amount().to_string(), "110.00");
        assert_eq!(range.desired().unwrap().amount().to_string(), "100.00");
    }

    #[test]
    fn test_validation() {
        assert!(PathSearchConfig::builder(Money::zero("USD", 2).unwrap())
            .build()
            .is_err());
        assert!(PathSearchConfig::builder(spend()).hops(0, 3).build().is_err());
        assert!(PathSearchConfig::builder(spend()).hops(4, 3).build().is_err());
        assert!(PathSearchConfig::builder(spend())
            .result_limit(0)
            .build()
            .is_err());
        assert!(PathSearchConfig::builder(spend())
            .tolerance(Decimal::zero(0), Decimal::one(0))
            .build()
            .is_err());
        assert!(PathSearchConfig::builder(spend())
            .max_expansions(0)
            .build()
            .is_err());
    }
}
