//! Spend analysis
//!
//! Two jobs ahead of the search: filter the order book down to orders whose
//! spend-side capacity can touch the user's window, and derive the initial
//! seed that the materializer feeds into a candidate's first leg.

use std::cmp::Ordering;
use std::sync::Arc;
use tracing::debug;

use crate::error::EngineError;
use crate::evaluator::OrderFillEvaluator;
use crate::graph::{CapacityRange, ConversionEdge};
use crate::materializer::{InitialSeed, LegMaterializer};
use crate::order::{Order, OrderBook, Side};
use crate::types::SpendRange;

pub struct SpendAnalyzer<'a> {
    evaluator: &'a dyn OrderFillEvaluator,
}

impl<'a> SpendAnalyzer<'a> {
    pub fn new(evaluator: &'a dyn OrderFillEvaluator) -> Self {
        Self { evaluator }
    }

    /// Spend-side capacity of an order in its spend currency: gross base
    /// for a BUY, raw quote for a SELL.
    fn spend_interval(&self, order: &Order) -> Result<CapacityRange, EngineError> {
        let min_fill = self.evaluator.evaluate_fill(order, order.bounds().min())?;
        let max_fill = self.evaluator.evaluate_fill(order, order.bounds().max())?;
        match order.side() {
            Side::Buy => CapacityRange::new(min_fill.gross_base, max_fill.gross_base),
            Side::Sell => CapacityRange::new(min_fill.quote, max_fill.quote),
        }
    }

    /// Keeps orders whose spend currency differs from the source (they may
    /// serve as later legs) and source-currency orders whose spend interval
    /// overlaps the user's window.
    pub fn filter_orders(
        &self,
        book: &OrderBook,
        source: &str,
        window: &SpendRange,
    ) -> Result<Vec<Arc<Order>>, EngineError> {
        let mut kept = Vec::with_capacity(book.len());
        let mut skipped = 0usize;
        for order in book.orders() {
            if order.spend_currency() != source {
                kept.push(order.clone());
                continue;
            }
            let interval = self.spend_interval(order)?;
            let overlaps = interval.min().cmp_amount(window.max())? != Ordering::Greater
                && window.min().cmp_amount(interval.max())? != Ordering::Greater;
            if overlaps {
                kept.push(order.clone());
            } else {
                skipped += 1;
            }
        }
        debug!(
            "order filter: {} kept, {} outside the {} spend window",
            kept.len(),
            skipped,
            source
        );
        Ok(kept)
    }

    /// Derives the first-leg seed for a candidate's first edge, honoring
    /// both the user's window and the order's capacity. Returns `None` when
    /// they cannot be reconciled.
    pub fn initial_seed(
        &self,
        materializer: &LegMaterializer<'_>,
        edge: &ConversionEdge,
        window: &SpendRange,
    ) -> Result<Option<InitialSeed>, EngineError> {
        match edge.side() {
            Side::Buy => self.buy_seed(materializer, edge, window),
            Side::Sell => self.sell_seed(materializer, edge, window),
        }
    }

    fn buy_seed(
        &self,
        materializer: &LegMaterializer<'_>,
        edge: &ConversionEdge,
        window: &SpendRange,
    ) -> Result<Option<InitialSeed>, EngineError> {
        let capacity = edge.gross_base_capacity();
        let lo = window.min().max(capacity.min())?;
        let hi = window.max().min(capacity.max())?;
        if lo.amount() > hi.amount() {
            return Ok(None);
        }

        let desired = match window.desired() {
            Some(desired) => desired.clone(),
            None => hi.clone(),
        };
        let target_gross = desired.clamp(&lo, &hi)?;

        let Some(fill) = materializer.resolve_buy_leg(edge.order(), &target_gross, &hi)? else {
            return Ok(None);
        };
        if fill.gross_base.cmp_amount(&lo)? == Ordering::Less {
            return Ok(None);
        }
        Ok(Some(InitialSeed {
            net: fill.net_base,
            gross: fill.gross_base,
            gross_ceiling: hi,
        }))
    }

    fn sell_seed(
        &self,
        materializer: &LegMaterializer<'_>,
        edge: &ConversionEdge,
        window: &SpendRange,
    ) -> Result<Option<InitialSeed>, EngineError> {
        let order = edge.order();
        let min_quote = self
            .evaluator
            .evaluate_sell_quote(order, order.bounds().min())?;
        let max_quote = self
            .evaluator
            .evaluate_sell_quote(order, order.bounds().max())?;
        let envelope =
            CapacityRange::new(min_quote.effective_quote, max_quote.effective_quote)?;

        let lo = window.min().max(envelope.min())?;
        let hi = window.max().min(envelope.max())?;
        if lo.amount() > hi.amount() {
            return Ok(None);
        }

        let desired = match window.desired() {
            Some(desired) => desired.clone(),
            None => hi.clone(),
        };
        let target = desired.clamp(&lo, &hi)?;

        let Some(fill) = materializer.resolve_sell_leg(order, &target, Some(window.max()))? else {
            return Ok(None);
        };
        Ok(Some(InitialSeed {
            net: target,
            gross: fill.gross_quote,
            gross_ceiling: window.max().clone(),
        }))
    }
}
