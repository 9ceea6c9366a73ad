//! Order → edge compilation
//!
//! Compiles an order list into a directed multigraph keyed by currency.
//! Each order becomes one edge (`base → quote` for BUY, `quote → base` for
//! SELL) annotated with its capacity envelopes; orders with non-zero fees
//! additionally carry segments splitting the envelope into the mandatory
//! minimum fill and the optional remainder.

use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::decimal::Decimal;
use crate::error::EngineError;
use crate::evaluator::OrderFillEvaluator;
use crate::money::Money;
use crate::order::{Order, Side};

/// Scale at which effective conversion rates are carried and compared.
pub const EFFECTIVE_RATE_SCALE: u32 = 18;

/// Inclusive money interval, normalized so `min <= max`.
#[derive(Debug, Clone)]
pub struct CapacityRange {
    min: Money,
    max: Money,
}

impl CapacityRange {
    pub fn new(min: Money, max: Money) -> Result<Self, EngineError> {
        if min.currency() != max.currency() {
            return Err(EngineError::currency_mismatch(min.currency(), max.currency()));
        }
        if min.amount() > max.amount() {
            return Ok(Self { min: max, max: min });
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

    pub fn is_zero(&self) -> bool {
        self.min.is_zero() && self.max.is_zero()
    }
}

/// One capacity slice of an edge. The mandatory segment covers the order's
/// minimum fill; the optional segment covers the remainder above it.
#[derive(Debug, Clone)]
pub struct EdgeSegment {
    pub mandatory: bool,
    pub base: CapacityRange,
    pub quote: CapacityRange,
    pub gross_base: CapacityRange,
}

/// Directed conversion step derived from one order.
#[derive(Debug, Clone)]
pub struct ConversionEdge {
    from: String,
    to: String,
    side: Side,
    order: Arc<Order>,
    rate: Decimal,
    base_capacity: CapacityRange,
    quote_capacity: CapacityRange,
    gross_base_capacity: CapacityRange,
    segments: Vec<EdgeSegment>,
}

impl ConversionEdge {
    pub fn from_currency(&self) -> &str {
        &self.from
    }

    pub fn to_currency(&self) -> &str {
        &self.to
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn order(&self) -> &Arc<Order> {
        &self.order
    }

    pub fn rate(&self) -> &Decimal {
        &self.rate
    }

    pub fn base_capacity(&self) -> &CapacityRange {
        &self.base_capacity
    }

    pub fn quote_capacity(&self) -> &CapacityRange {
        &self.quote_capacity
    }

    pub fn gross_base_capacity(&self) -> &CapacityRange {
        &self.gross_base_capacity
    }

    pub fn segments(&self) -> &[EdgeSegment] {
        &self.segments
    }

    /// Capacity constraining what flows *into* this edge, in the `from`
    /// currency: gross base for a BUY, quote for a SELL.
    pub fn input_capacity(&self) -> &CapacityRange {
        match self.side {
            Side::Buy => &self.gross_base_capacity,
            Side::Sell => &self.quote_capacity,
        }
    }

    /// Realized conversion ratio from the `from` currency into the `to`
    /// currency. BUY edges convert at the order rate; SELL edges use the
    /// capacity-envelope ratio, which is zero when the quote side has no
    /// capacity.
    pub fn effective_rate(&self) -> Result<Decimal, EngineError> {
        match self.side {
            Side::Buy => self.rate.with_scale(EFFECTIVE_RATE_SCALE),
            Side::Sell => {
                if self.quote_capacity.max().is_zero() {
                    return Ok(Decimal::zero(EFFECTIVE_RATE_SCALE));
                }
                self.base_capacity
                    .max()
                    .amount()
                    .div_with_scale(self.quote_capacity.max().amount(), EFFECTIVE_RATE_SCALE)
            }
        }
    }
}

/// Directed multigraph of conversion edges, nodes keyed by currency.
#[derive(Debug, Default)]
pub struct ConversionGraph {
    graph: DiGraph<String, ConversionEdge>,
    nodes: HashMap<String, NodeIndex>,
}

impl ConversionGraph {
    pub fn node(&self, currency: &str) -> Option<NodeIndex> {
        self.nodes.get(currency).copied()
    }

    pub fn contains(&self, currency: &str) -> bool {
        self.nodes.contains_key(currency)
    }

    pub fn currency(&self, node: NodeIndex) -> Option<&str> {
        self.graph.node_weight(node).map(String::as_str)
    }

    pub fn edge(&self, index: EdgeIndex) -> Option<&ConversionEdge> {
        self.graph.edge_weight(index)
    }

    /// Outgoing edges of a node as `(edge index, target node, edge)`.
    pub fn edges_from(
        &self,
        node: NodeIndex,
    ) -> impl Iterator<Item = (EdgeIndex, NodeIndex, &ConversionEdge)> {
        self.graph.edges(node).map(|e| (e.id(), e.target(), e.weight()))
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

/// Compiles orders into a `ConversionGraph`.
pub struct GraphBuilder<'a> {
    evaluator: &'a dyn OrderFillEvaluator,
    zero_cache: HashMap<(String, u32), Money>,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(evaluator: &'a dyn OrderFillEvaluator) -> Self {
        Self {
            evaluator,
            zero_cache: HashMap::new(),
        }
    }

    fn zero(&mut self, currency: &str, scale: u32) -> Result<Money, EngineError> {
        if let Some(cached) = self.zero_cache.get(&(currency.to_string(), scale)) {
            return Ok(cached.clone());
        }
        let zero = Money::zero(currency, scale)?;
        self.zero_cache
            .insert((currency.to_string(), scale), zero.clone());
        Ok(zero)
    }

    pub fn build(&mut self, orders: &[Arc<Order>]) -> Result<ConversionGraph, EngineError> {
        let mut graph = DiGraph::new();
        let mut nodes: HashMap<String, NodeIndex> = HashMap::new();

        for order in orders {
            let (from, to) = match order.side() {
                Side::Buy => (order.pair().base(), order.pair().quote()),
                Side::Sell => (order.pair().quote(), order.pair().base()),
            };
            let from_index = *nodes
                .entry(from.to_string())
                .or_insert_with(|| graph.add_node(from.to_string()));
            let to_index = *nodes
                .entry(to.to_string())
                .or_insert_with(|| graph.add_node(to.to_string()));

            let min_fill = self.evaluator.evaluate_fill(order, order.bounds().min())?;
            let max_fill = self.evaluator.evaluate_fill(order, order.bounds().max())?;

            let base_capacity =
                CapacityRange::new(min_fill.net_base.clone(), max_fill.net_base.clone())?;
            let quote_capacity = CapacityRange::new(min_fill.quote.clone(), max_fill.quote.clone())?;
            let gross_base_capacity =
                CapacityRange::new(min_fill.gross_base.clone(), max_fill.gross_base.clone())?;

            let segments = if !min_fill.fees.is_zero() || !max_fill.fees.is_zero() {
                self.build_segments(&base_capacity, &quote_capacity, &gross_base_capacity)?
            } else {
                Vec::new()
            };

            graph.add_edge(
                from_index,
                to_index,
                ConversionEdge {
                    from: from.to_string(),
                    to: to.to_string(),
                    side: order.side(),
                    order: order.clone(),
                    rate: order.rate().rate().clone(),
                    base_capacity,
                    quote_capacity,
                    gross_base_capacity,
                    segments,
                },
            );
        }

        debug!(
            "conversion graph built: {} currencies, {} edges from {} orders",
            graph.node_count(),
            graph.edge_count(),
            orders.len()
        );
        Ok(ConversionGraph { graph, nodes })
    }

    /// Splits a fee-bearing edge into the mandatory minimum fill and the
    /// optional remainder above it.
    fn build_segments(
        &mut self,
        base: &CapacityRange,
        quote: &CapacityRange,
        gross: &CapacityRange,
    ) -> Result<Vec<EdgeSegment>, EngineError> {
        let mut segments = Vec::new();

        let min_is_zero = base.min().is_zero();
        if !min_is_zero {
            segments.push(EdgeSegment {
                mandatory: true,
                base: CapacityRange::new(base.min().clone(), base.min().clone())?,
                quote: CapacityRange::new(quote.min().clone(), quote.min().clone())?,
                gross_base: CapacityRange::new(gross.min().clone(), gross.min().clone())?,
            });
        }

        let base_width = base.max().sub(base.min())?;
        let quote_width = quote.max().sub(quote.min())?;
        let gross_width = gross.max().sub(gross.min())?;
        let remainder_exists =
            !base_width.is_zero() || !quote_width.is_zero() || !gross_width.is_zero();

        if remainder_exists {
            segments.push(EdgeSegment {
                mandatory: false,
                base: CapacityRange::new(
                    self.zero(base.currency(), base_width.scale())?,
                    base_width,
                )?,
                quote: CapacityRange::new(
                    self.zero(quote.currency(), quote_width.scale())?,
                    quote_width,
                )?,
                gross_base: CapacityRange::new(
                    self.zero(gross.currency(), gross_width.scale())?,
                    gross_width,
                )?,
            });
        }

        if segments.is_empty() {
            // Degenerate edge: zero minimum and zero width.
            segments.push(EdgeSegment {
                mandatory: false,
                base: CapacityRange::new(
                    self.zero(base.currency(), base.min().scale())?,
                    self.zero(base.currency(), base.min().scale())?,
                )?,
                quote: CapacityRange::new(
                    self.zero(quote.currency(), quote.min().scale())?,
                    self.zero(quote.currency(), quote.min().scale())?,
                )?,
                gross_base: CapacityRange::new(
                    self.zero(gross.currency(), gross.min().scale())?,
                    self.zero(gross.currency(), gross.min().scale())?,
                )?,
            });
        }

        Ok(segments)
    }
}
