//! Search and result types
//!
//! Shared value types flowing through the pipeline: the spend window, the
//! abstract candidate produced by the search, the materialized execution
//! plan, and the guard report.

use petgraph::graph::EdgeIndex;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::sync::Arc;

use crate::decimal::Decimal;
use crate::error::EngineError;
use crate::money::{Money, MoneyMap};
use crate::order::Order;

/// Inclusive spend window carried through the search, optionally with the
/// desired amount inside it. Constructed normalized (`min <= max`).
#[derive(Debug, Clone)]
pub struct SpendRange {
    min: Money,
    max: Money,
    desired: Option<Money>,
}

impl SpendRange {
    pub fn new(min: Money, max: Money, desired: Option<Money>) -> Result<Self, EngineError> {
        if min.currency() != max.currency() {
            return Err(EngineError::currency_mismatch(min.currency(), max.currency()));
        }
        if let Some(d) = &desired {
            if d.currency() != min.currency() {
                return Err(EngineError::currency_mismatch(min.currency(), d.currency()));
            }
        }
        let (min, max) = if min.amount() > max.amount() {
            (max, min)
        } else {
            (min, max)
        };
        Ok(Self { min, max, desired })
    }

    pub fn min(&self) -> &Money {
        &self.min
    }

    pub fn max(&self) -> &Money {
        &self.max
    }

    pub fn desired(&self) -> Option<&Money> {
        self.desired.as_ref()
    }

    pub fn currency(&self) -> &str {
        self.min.currency()
    }

    pub fn contains(&self, amount: &Money) -> Result<bool, EngineError> {
        Ok(amount.cmp_amount(&self.min)? != std::cmp::Ordering::Less
            && amount.cmp_amount(&self.max)? != std::cmp::Ordering::Greater)
    }
}

/// Abstract route surfaced by the search, before materialization.
#[derive(Debug, Clone)]
pub struct CandidatePath {
    /// Accumulated inverse-rate cost; smaller is better.
    pub cost: Decimal,
    /// Accumulated effective rate along the route.
    pub product: Decimal,
    pub hops: usize,
    pub edges: Vec<EdgeIndex>,
    pub range: Option<SpendRange>,
    /// Node currencies along the route, source first.
    pub route: Vec<String>,
    /// Route signature: node currencies joined with `->`.
    pub signature: String,
}

/// One materialized leg of an execution plan.
#[derive(Debug, Clone)]
pub struct ExecutionStep {
    /// 1-based position in the plan.
    pub sequence_number: usize,
    pub from: String,
    pub to: String,
    pub spent: Money,
    pub received: Money,
    pub fees: MoneyMap,
    pub order: Arc<Order>,
}

impl Serialize for ExecutionStep {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ExecutionStep", 7)?;
        state.serialize_field("sequence_number", &self.sequence_number)?;
        state.serialize_field("from", &self.from)?;
        state.serialize_field("to", &self.to)?;
        state.serialize_field("spent", &self.spent)?;
        state.serialize_field("received", &self.received)?;
        state.serialize_field("fees", &self.fees)?;
        state.serialize_field("order_id", self.order.id())?;
        state.end()
    }
}

/// Fully materialized conversion plan.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionPlan {
    pub source_currency: String,
    pub target_currency: String,
    pub total_spent: Money,
    pub total_received: Money,
    /// Signed relative deviation of the actual spend from the requested
    /// spend.
    pub residual_tolerance: Decimal,
    pub steps: Vec<ExecutionStep>,
    pub fee_breakdown: MoneyMap,
    pub signature: String,
}

impl ExecutionPlan {
    pub fn hops(&self) -> usize {
        self.steps.len()
    }
}

/// State of a single guard: whether it fired, the observed count and the
/// configured limit (absent for an unset time budget).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardLimitStatus {
    pub reached: bool,
    pub observed: u64,
    pub limit: Option<u64>,
}

impl GuardLimitStatus {
    pub fn with_limit(limit: Option<u64>) -> Self {
        Self {
            reached: false,
            observed: 0,
            limit,
        }
    }

    fn merge(&mut self, other: &GuardLimitStatus) {
        self.reached |= other.reached;
        self.observed += other.observed;
    }
}

/// Guard telemetry for one search (or the sum over reusable-mode
/// iterations). Always populated, even when no paths were found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchGuardReport {
    pub expansions: GuardLimitStatus,
    pub visited_states: GuardLimitStatus,
    /// `observed` carries elapsed wall-clock milliseconds.
    pub time_budget: GuardLimitStatus,
}

impl SearchGuardReport {
    pub fn for_limits(
        max_expansions: u64,
        max_visited_states: u64,
        time_budget_ms: Option<u64>,
    ) -> Self {
        Self {
            expansions: GuardLimitStatus::with_limit(Some(max_expansions)),
            visited_states: GuardLimitStatus::with_limit(Some(max_visited_states)),
            time_budget: GuardLimitStatus::with_limit(time_budget_ms),
        }
    }

    pub fn any_reached(&self) -> bool {
        self.expansions.reached || self.visited_states.reached || self.time_budget.reached
    }

    /// Names of the guards that fired, for error messages.
    pub fn breached(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.expansions.reached {
            names.push("expansions");
        }
        if self.visited_states.reached {
            names.push("visited_states");
        }
        if self.time_budget.reached {
            names.push("time_budget");
        }
        names
    }

    /// Accumulates another report: counters add up, flags OR together,
    /// limits keep their configured values.
    pub fn merge(&mut self, other: &SearchGuardReport) {
        self.expansions.merge(&other.expansions);
        self.visited_states.merge(&other.visited_states);
        self.time_budget.merge(&other.time_budget);
    }
}

/// Result of one routing request: plans in priority order plus guard
/// telemetry.
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub paths: Vec<ExecutionPlan>,
    pub guard_limits: SearchGuardReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spend_range_normalizes() {
        let range = SpendRange::new(
            Money::parse("USD", "110").unwrap(),
            Money::parse("USD", "100").unwrap(),
            None,
        )
        .unwrap();
        assert_eq!(range.min().amount().to_string(), "100");
        assert_eq!(range.max().amount().to_string(), "110");
    }

    #[test]
    fn test_spend_range_rejects_mixed_currencies() {
        assert!(SpendRange::new(
            Money::parse("USD", "100").unwrap(),
            Money::parse("EUR", "110").unwrap(),
            None,
        )
        .is_err());
    }

    #[test]
    fn test_guard_report_merge() {
        let mut a = SearchGuardReport::for_limits(100, 50, Some(1000));
        a.expansions.observed = 10;
        let mut b = SearchGuardReport::for_limits(100, 50, Some(1000));
        b.expansions.observed = 5;
        b.expansions.reached = true;
        b.time_budget.observed = 7;

        a.merge(&b);
        assert_eq!(a.expansions.observed, 15);
        assert!(a.expansions.reached);
        assert_eq!(a.expansions.limit, Some(100));
        assert_eq!(a.time_budget.observed, 7);
        assert_eq!(a.breached(), vec!["expansions"]);
    }
}
