//! Fill resolution and plan materialization
//!
//! Turns an abstract edge sequence into a concrete execution plan. Each leg
//! solves the nonlinear relationship between spend, receive, fees and order
//! bounds: BUY legs shrink a net base amount until its gross (fee-inclusive)
//! cost fits the ceiling; SELL legs iterate a base amount until its
//! effective quote matches the target within a relative tolerance. A route
//! whose legs cannot all be resolved, or whose total spend leaves the
//! tolerance window, is rejected and the search simply tries the next
//! candidate.

use std::cmp::Ordering;
use tracing::debug;

use crate::decimal::{Decimal, MAX_SCALE};
use crate::error::EngineError;
use crate::evaluator::OrderFillEvaluator;
use crate::fees::FeeBreakdown;
use crate::graph::{ConversionEdge, ConversionGraph};
use crate::money::{Money, MoneyMap};
use crate::order::{Order, Side};
use crate::tolerance::ToleranceWindow;
use crate::types::{CandidatePath, ExecutionPlan, ExecutionStep};

/// Iteration caps for the fixed-point resolvers.
const BUY_RESOLUTION_MAX_ITERATIONS: usize = 12;
const SELL_RESOLUTION_MAX_ITERATIONS: usize = 16;

/// Scale for ratio computations inside the resolvers.
const RATIO_SCALE: u32 = 24;
/// Scale for convergence and budget-overshoot comparisons.
const CONVERGENCE_SCALE: u32 = 12;

/// Relative tolerance for convergence and budget overshoot.
fn convergence_epsilon() -> Decimal {
    Decimal::from_raw(1, 6)
}

/// First-leg seed derived by the spend analyzer: the net amount fed into
/// leg one, its gross (fee-inclusive) spend, and the overall gross budget
/// in the source currency.
#[derive(Debug, Clone)]
pub struct InitialSeed {
    pub net: Money,
    pub gross: Money,
    pub gross_ceiling: Money,
}

/// Resolved BUY leg: what the taker pays (gross base) and receives (quote).
#[derive(Debug, Clone)]
pub struct BuyLegFill {
    pub net_base: Money,
    pub gross_base: Money,
    pub quote: Money,
    pub fees: FeeBreakdown,
}

/// Resolved SELL leg: what the taker pays (gross quote) and receives
/// (net base).
#[derive(Debug, Clone)]
pub struct SellLegFill {
    pub gross_quote: Money,
    pub net_base: Money,
    pub fees: FeeBreakdown,
}

/// Materializes candidate routes into execution plans.
pub struct LegMaterializer<'a> {
    evaluator: &'a dyn OrderFillEvaluator,
}

impl<'a> LegMaterializer<'a> {
    pub fn new(evaluator: &'a dyn OrderFillEvaluator) -> Self {
        Self { evaluator }
    }

    /// Finds the largest net base within the order's bounds whose gross
    /// (net + base fee) cost stays under `gross_ceiling`, starting from
    /// `net_seed`. Returns `None` when even the minimum fill does not fit
    /// or the iteration stalls.
    pub fn resolve_buy_leg(
        &self,
        order: &Order,
        net_seed: &Money,
        gross_ceiling: &Money,
    ) -> Result<Option<BuyLegFill>, EngineError> {
        let bounds = order.bounds();
        if net_seed.currency() != bounds.currency() {
            return Err(EngineError::currency_mismatch(
                bounds.currency(),
                net_seed.currency(),
            ));
        }

        let min_fill = self.evaluator.evaluate_fill(order, bounds.min())?;
        if min_fill.gross_base.cmp_amount(gross_ceiling)? == Ordering::Greater {
            return Ok(None);
        }

        let mut net = net_seed.clamp(bounds.min(), bounds.max())?;
        for _ in 0..BUY_RESOLUTION_MAX_ITERATIONS {
            let fill = self.evaluator.evaluate_fill(order, &net)?;
            if fill.gross_base.cmp_amount(gross_ceiling)? != Ordering::Greater {
                return Ok(Some(BuyLegFill {
                    net_base: net,
                    gross_base: fill.gross_base,
                    quote: fill.quote,
                    fees: fill.fees,
                }));
            }
            let ratio_scale = gross_ceiling
                .scale()
                .max(fill.gross_base.scale())
                .saturating_add(4)
                .min(MAX_SCALE);
            let ratio = gross_ceiling.ratio_to(&fill.gross_base, ratio_scale)?;
            if !ratio.is_positive() {
                return Ok(None);
            }
            let next = net
                .mul_decimal(&ratio, net.scale())?
                .clamp(bounds.min(), bounds.max())?;
            if next.amount() == net.amount() {
                return Ok(None);
            }
            net = next;
        }
        Ok(None)
    }

    /// Finds a base amount whose effective quote matches
    /// `target_effective_quote` within the relative tolerance, optionally
    /// capped by a gross-quote budget. Fee-free orders resolve in closed
    /// form.
    pub fn resolve_sell_leg(
        &self,
        order: &Order,
        target_effective_quote: &Money,
        quote_budget: Option<&Money>,
    ) -> Result<Option<SellLegFill>, EngineError> {
        let bounds = order.bounds();
        if target_effective_quote.currency() != order.pair().quote() {
            return Err(EngineError::currency_mismatch(
                order.pair().quote(),
                target_effective_quote.currency(),
            ));
        }
        if target_effective_quote.is_zero() {
            return Ok(None);
        }
        let epsilon = convergence_epsilon();
        let bounds_scale = bounds.scale();
        let rate = order.rate().rate();

        let seed_amount = target_effective_quote
            .amount()
            .div_with_scale(rate, bounds_scale)?;
        if seed_amount.is_negative() {
            return Ok(None);
        }
        let mut base = Money::new(bounds.currency(), seed_amount)?;

        if order.fee_policy().is_none() {
            if !bounds.contains(&base)? {
                return Ok(None);
            }
            let fill = self.evaluator.evaluate_sell_quote(order, &base)?;
            if let Some(budget) = quote_budget {
                if Self::overshoot(&fill.gross_quote, budget)? > epsilon {
                    return Ok(None);
                }
            }
            return Ok(Some(SellLegFill {
                gross_quote: fill.gross_quote,
                net_base: fill.net_base,
                fees: fill.fees,
            }));
        }

        let mut target = target_effective_quote.clone();
        for _ in 0..SELL_RESOLUTION_MAX_ITERATIONS {
            let fill = self.evaluator.evaluate_sell_quote(order, &base)?;

            if let Some(budget) = quote_budget {
                let overshoot = Self::overshoot(&fill.gross_quote, budget)?;
                if overshoot > epsilon {
                    let ratio = budget.ratio_to(&fill.gross_quote, RATIO_SCALE)?;
                    let next = base.mul_decimal(&ratio, base.scale())?;
                    if next.amount() == base.amount() {
                        return Ok(None);
                    }
                    target = target.mul_decimal(&ratio, target.scale())?;
                    base = next;
                    continue;
                }
            }

            if target.is_zero() || fill.effective_quote.is_zero() {
                return Ok(None);
            }
            let deviation = fill
                .effective_quote
                .amount()
                .sub(target.amount())
                .abs()
                .div_with_scale(target.amount(), CONVERGENCE_SCALE)?;
            if deviation <= epsilon {
                if !bounds.contains(&base)? {
                    return Ok(None);
                }
                if let Some(budget) = quote_budget {
                    if Self::overshoot(&fill.gross_quote, budget)? > epsilon {
                        return Ok(None);
                    }
                }
                return Ok(Some(SellLegFill {
                    gross_quote: fill.gross_quote,
                    net_base: fill.net_base,
                    fees: fill.fees,
                }));
            }

            let ratio = target.ratio_to(&fill.effective_quote, RATIO_SCALE)?;
            let next = base.mul_decimal(&ratio, base.scale())?;
            if next.amount() == base.amount() {
                return Ok(None);
            }
            base = next;
        }
        Ok(None)
    }

    /// Relative overshoot of `amount` above `budget` (zero when under).
    fn overshoot(amount: &Money, budget: &Money) -> Result<Decimal, EngineError> {
        if amount.cmp_amount(budget)? != Ordering::Greater {
            return Ok(Decimal::zero(CONVERGENCE_SCALE));
        }
        if budget.is_zero() {
            // Any positive spend against a zero budget is unbounded
            // overshoot.
            return Ok(Decimal::one(CONVERGENCE_SCALE));
        }
        amount
            .amount()
            .sub(budget.amount())
            .div_with_scale(budget.amount(), CONVERGENCE_SCALE)
    }

    /// Materializes a candidate route. Returns `Ok(None)` when any leg
    /// cannot be resolved or the total spend leaves the tolerance window;
    /// a non-contiguous edge sequence is a contract violation.
    pub fn materialize(
        &self,
        graph: &ConversionGraph,
        candidate: &CandidatePath,
        requested_spend: &Money,
        seed: &InitialSeed,
        target_currency: &str,
        window: &ToleranceWindow,
    ) -> Result<Option<ExecutionPlan>, EngineError> {
        if candidate.edges.is_empty() {
            return Ok(None);
        }
        if requested_spend.is_zero() || seed.net.is_zero() {
            return Ok(None);
        }

        let mut edges: Vec<&ConversionEdge> = Vec::with_capacity(candidate.edges.len());
        for index in &candidate.edges {
            let edge = graph.edge(*index).ok_or_else(|| {
                EngineError::ContractViolation("candidate references an unknown edge".to_string())
            })?;
            edges.push(edge);
        }
        for pair in edges.windows(2) {
            if pair[0].to_currency() != pair[1].from_currency() {
                return Err(EngineError::ContractViolation(format!(
                    "edge sequence is not contiguous: {} does not feed {}",
                    pair[0].to_currency(),
                    pair[1].from_currency()
                )));
            }
        }

        let source = requested_spend.currency();
        let mut current = seed.net.clone();
        let mut remaining_budget = seed.gross_ceiling.clone();
        let mut apply_tolerance = true;
        let mut gross_spent = Money::zero(source, requested_spend.scale())?;
        let mut fee_breakdown = MoneyMap::new();
        let mut steps: Vec<ExecutionStep> = Vec::with_capacity(edges.len());

        for (index, edge) in edges.iter().enumerate() {
            if edge.from_currency() != current.currency() {
                return Ok(None);
            }
            if current.is_zero() {
                return Ok(None);
            }

            let (spent, received, fees) = match edge.side() {
                Side::Buy => {
                    let ceiling = if apply_tolerance {
                        remaining_budget.clone()
                    } else {
                        current.clone()
                    };
                    match self.resolve_buy_leg(edge.order(), &current, &ceiling)? {
                        Some(fill) => (fill.gross_base, fill.quote, fill.fees),
                        None => return Ok(None),
                    }
                }
                Side::Sell => {
                    let budget = if apply_tolerance {
                        remaining_budget.clone()
                    } else {
                        current.clone()
                    };
                    match self.resolve_sell_leg(edge.order(), &current, Some(&budget))? {
                        Some(fill) => (fill.gross_quote, fill.net_base, fill.fees),
                        None => return Ok(None),
                    }
                }
            };

            let mut step_fees = MoneyMap::new();
            if let Some(fee) = &fees.base_fee {
                step_fees.add(fee)?;
            }
            if let Some(fee) = &fees.quote_fee {
                step_fees.add(fee)?;
            }
            fee_breakdown.merge(&step_fees)?;

            if spent.currency() == source {
                gross_spent = gross_spent.add(&spent)?;
                remaining_budget = match remaining_budget.sub(&spent) {
                    Ok(rest) => rest,
                    Err(_) => Money::zero(source, remaining_budget.scale())?,
                };
            }

            steps.push(ExecutionStep {
                sequence_number: index + 1,
                from: edge.from_currency().to_string(),
                to: edge.to_currency().to_string(),
                spent,
                received: received.clone(),
                fees: step_fees,
                order: edge.order().clone(),
            });

            current = received;
            apply_tolerance = false;
        }

        if current.currency() != target_currency {
            return Ok(None);
        }

        let residual = match window.evaluate(requested_spend, &gross_spent)? {
            Some(residual) => residual,
            None => {
                debug!(
                    "route {} rejected: spend {} outside tolerance of requested {}",
                    candidate.signature, gross_spent, requested_spend
                );
                return Ok(None);
            }
        };

        Ok(Some(ExecutionPlan {
            source_currency: source.to_string(),
            target_currency: target_currency.to_string(),
            total_spent: gross_spent,
            total_received: current,
            residual_tolerance: residual,
            steps,
            fee_breakdown,
            signature: candidate.signature.clone(),
        }))
    }
}
