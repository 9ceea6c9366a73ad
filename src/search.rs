//! Best-first path search
//!
//! Bounded branch-and-bound traversal of the conversion graph. States are
//! expanded cheapest-first under the shared priority tuple; relaxation
//! trims the spend window against each edge's input capacity, projects it
//! through the effective rate, and registers the new state against a
//! per-node dominance store. Completed routes to the target are handed to
//! a callback that decides (by materializing) whether they enter the
//! bounded result heap. Expansion, visited-state and wall-time guards bound
//! the whole traversal.

use petgraph::graph::{EdgeIndex, NodeIndex};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::decimal::Decimal;
use crate::error::EngineError;
use crate::graph::{ConversionEdge, ConversionGraph};
use crate::heap::HeapBy;
use crate::money::Money;
use crate::results::{PathOrderStrategy, PlanHeap, PlanPriority};
use crate::tolerance::tolerance_amplifier;
use crate::types::{CandidatePath, ExecutionPlan, SearchGuardReport, SpendRange};

/// Scale at which path costs are accumulated and compared.
pub const COST_SCALE: u32 = 18;

/// Separator between node currencies in route signatures.
pub const ROUTE_SEPARATOR: &str = "->";

/// Guard budgets for one search.
#[derive(Debug, Clone)]
pub struct SearchLimits {
    pub max_expansions: u64,
    pub max_visited_states: u64,
    pub time_budget: Option<Duration>,
}

impl SearchLimits {
    fn time_budget_ms(&self) -> Option<u64> {
        self.time_budget.map(|d| d.as_millis() as u64)
    }
}

/// Cooperative cancellation flag, checked at the same points as the time
/// budget. Cancelling stops the sweep; results accumulated so far are
/// still returned and no guard flag is raised.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Everything accumulated by one search sweep.
pub struct SearchSweep {
    pub accepted: Vec<(PlanPriority, ExecutionPlan)>,
    pub report: SearchGuardReport,
}

/// Callback deciding whether a completed candidate enters the results.
pub type CandidateCallback<'c> =
    dyn FnMut(&CandidatePath) -> Result<Option<ExecutionPlan>, EngineError> + 'c;

struct SearchState {
    node: NodeIndex,
    product: Decimal,
    edges: Vec<EdgeIndex>,
    route: Vec<String>,
    range: SpendRange,
}

struct FrontierEntry {
    priority: PlanPriority,
    state: SearchState,
}

struct StateRecord {
    cost: Decimal,
    hops: usize,
}

/// Per-node store of `(signature -> non-dominated records)`.
#[derive(Default)]
struct DominanceRegistry {
    records: HashMap<NodeIndex, HashMap<String, Vec<StateRecord>>>,
}

enum RegisterOutcome {
    /// An existing record is at least as good on both cost and hops.
    Dominated,
    /// First record for this signature at this node.
    InsertedNew,
    /// Added alongside (or replacing) records under an existing signature.
    InsertedExisting,
}

impl DominanceRegistry {
    fn contains(&self, node: NodeIndex, signature: &str) -> bool {
        self.records
            .get(&node)
            .is_some_and(|by_signature| by_signature.contains_key(signature))
    }

    fn register(
        &mut self,
        node: NodeIndex,
        signature: &str,
        cost: &Decimal,
        hops: usize,
    ) -> RegisterOutcome {
        let by_signature = self.records.entry(node).or_default();
        match by_signature.get_mut(signature) {
            Some(records) => {
                if records.iter().any(|r| r.cost <= *cost && r.hops <= hops) {
                    return RegisterOutcome::Dominated;
                }
                // Evict records the new one strictly dominates.
                records.retain(|r| {
                    !(*cost <= r.cost && hops <= r.hops && (*cost < r.cost || hops < r.hops))
                });
                records.push(StateRecord {
                    cost: cost.clone(),
                    hops,
                });
                RegisterOutcome::InsertedExisting
            }
            None => {
                by_signature.insert(
                    signature.to_string(),
                    vec![StateRecord {
                        cost: cost.clone(),
                        hops,
                    }],
                );
                RegisterOutcome::InsertedNew
            }
        }
    }
}

/// Canonical signature of a search state: the trimmed range and the desired
/// amount, rendered deterministically.
pub fn state_signature(range: Option<&SpendRange>) -> Result<String, EngineError> {
    let range_str = match range {
        Some(r) => {
            let scale = r.min().scale().max(r.max().scale());
            format!(
                "{}:{}:{}:{}",
                r.currency(),
                r.min().amount().with_scale(scale)?,
                r.max().amount().with_scale(scale)?,
                scale
            )
        }
        None => "null".to_string(),
    };
    let desired_str = match range.and_then(SpendRange::desired) {
        Some(d) => format!("{}:{}:{}", d.currency(), d.amount(), d.scale()),
        None => "null".to_string(),
    };
    Ok(format!("range:{range_str}|desired:{desired_str}"))
}

/// Intersects the incoming spend window with the edge's input capacity.
/// Returns `None` when they do not overlap; a zero-width zero window is
/// only valid against an exactly-zero capacity.
pub fn edge_supports_amount(
    edge: &ConversionEdge,
    range: &SpendRange,
) -> Result<Option<SpendRange>, EngineError> {
    let capacity = edge.input_capacity();
    if range.currency() != capacity.currency() {
        return Err(EngineError::ContractViolation(format!(
            "spend window in {} reached an edge expecting {}",
            range.currency(),
            capacity.currency()
        )));
    }
    let lo = range.min().max(capacity.min())?;
    let hi = range.max().min(capacity.max())?;
    if lo.amount() > hi.amount() {
        return Ok(None);
    }
    if lo.is_zero() && hi.is_zero() && !capacity.max().is_zero() {
        return Ok(None);
    }
    let desired = match range.desired() {
        Some(d) => Some(d.clamp(&lo, &hi)?),
        None => None,
    };
    Ok(Some(SpendRange::new(lo, hi, desired)?))
}

/// Projects a feasible window through the edge's effective rate into the
/// output currency (swapping the ends if the projection inverts them).
pub fn calculate_next_range(
    edge: &ConversionEdge,
    feasible: &SpendRange,
    effective_rate: &Decimal,
) -> Result<SpendRange, EngineError> {
    let scale = feasible
        .min()
        .scale()
        .max(feasible.max().scale())
        .max(effective_rate.scale());
    let to = edge.to_currency();
    let min = Money::new(to, feasible.min().amount().mul_with_scale(effective_rate, scale)?)?;
    let max = Money::new(to, feasible.max().amount().mul_with_scale(effective_rate, scale)?)?;
    let desired = match feasible.desired() {
        Some(d) => Some(Money::new(
            to,
            d.amount().mul_with_scale(effective_rate, scale)?,
        )?),
        None => None,
    };
    SpendRange::new(min, max, desired)
}

/// One bounded best-first sweep over a conversion graph.
pub struct PathSearch<'a> {
    graph: &'a ConversionGraph,
    strategy: &'a dyn PathOrderStrategy,
    limits: SearchLimits,
    max_hops: usize,
    result_limit: usize,
    max_tolerance_ratio: Decimal,
    insertion_bias: u64,
    cancellation: Option<CancellationToken>,
}

impl<'a> PathSearch<'a> {
    pub fn new(
        graph: &'a ConversionGraph,
        strategy: &'a dyn PathOrderStrategy,
        limits: SearchLimits,
        max_hops: usize,
        result_limit: usize,
        max_tolerance_ratio: Decimal,
        insertion_bias: u64,
    ) -> Self {
        Self {
            graph,
            strategy,
            limits,
            max_hops,
            result_limit,
            max_tolerance_ratio,
            insertion_bias,
            cancellation: None,
        }
    }

    /// Attaches an external cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    fn time_exceeded(&self, started: Instant) -> bool {
        match self.limits.time_budget {
            Some(budget) => started.elapsed() >= budget,
            None => false,
        }
    }

    fn cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    /// Runs the sweep from `source` toward `target`. Every completed route
    /// with at least one hop is offered to `on_candidate`; accepted plans
    /// compete within a bounded top-K heap.
    pub fn run(
        &self,
        source: &str,
        target: &str,
        initial_range: SpendRange,
        on_candidate: &mut CandidateCallback<'_>,
    ) -> Result<SearchSweep, EngineError> {
        let started = Instant::now();
        let mut report = SearchGuardReport::for_limits(
            self.limits.max_expansions,
            self.limits.max_visited_states,
            self.limits.time_budget_ms(),
        );

        let (Some(source_node), Some(target_node)) =
            (self.graph.node(source), self.graph.node(target))
        else {
            report.time_budget.observed = started.elapsed().as_millis() as u64;
            return Ok(SearchSweep {
                accepted: Vec::new(),
                report,
            });
        };

        let amplifier = tolerance_amplifier(&self.max_tolerance_ratio)?;
        let strategy = self.strategy;
        let mut frontier = HeapBy::new(move |a: &FrontierEntry, b: &FrontierEntry| {
            strategy.compare(&a.priority, &b.priority)
        });
        let mut registry = DominanceRegistry::default();
        let mut results = PlanHeap::new(self.result_limit, self.strategy);
        let mut best_accepted: Option<Decimal> = None;

        let mut expansions: u64 = 0;
        let mut visited_states: u64 = 0;
        let mut insertion: u64 = self.insertion_bias;

        // Bootstrap at the source with the multiplicative unit cost and the
        // full spend window.
        let bootstrap_signature = state_signature(Some(&initial_range))?;
        registry.register(
            source_node,
            &bootstrap_signature,
            &Decimal::one(COST_SCALE),
            0,
        );
        visited_states = visited_states.saturating_add(1);
        frontier.push(FrontierEntry {
            priority: PlanPriority::new(
                Decimal::one(COST_SCALE),
                0,
                source.to_string(),
                next_insertion(&mut insertion),
            ),
            state: SearchState {
                node: source_node,
                product: Decimal::one(COST_SCALE),
                edges: Vec::new(),
                route: vec![source.to_string()],
                range: initial_range,
            },
        });

        let mut halted = false;
        while !halted {
            if self.cancelled() {
                debug!("search cancelled externally after {expansions} expansions");
                break;
            }
            if self.time_exceeded(started) {
                report.time_budget.reached = true;
                break;
            }
            if frontier.is_empty() {
                break;
            }
            if expansions >= self.limits.max_expansions {
                report.expansions.reached = true;
                break;
            }
            let entry = match frontier.pop() {
                Some(entry) => entry,
                None => break,
            };
            expansions += 1;

            if entry.state.node == target_node && entry.priority.hops >= 1 {
                let candidate = CandidatePath {
                    cost: entry.priority.cost.clone(),
                    product: entry.state.product.clone(),
                    hops: entry.priority.hops,
                    edges: entry.state.edges.clone(),
                    range: Some(entry.state.range.clone()),
                    route: entry.state.route.clone(),
                    signature: entry.priority.signature.clone(),
                };
                if let Some(plan) = on_candidate(&candidate)? {
                    if self.cancelled() {
                        break;
                    }
                    if self.time_exceeded(started) {
                        report.time_budget.reached = true;
                        break;
                    }
                    best_accepted = Some(match best_accepted.take() {
                        Some(best) => best.min(entry.priority.cost.clone()),
                        None => entry.priority.cost.clone(),
                    });
                    results.offer(entry.priority.clone(), plan);
                }
                continue;
            }

            for (edge_index, next_node, edge) in self.graph.edges_from(entry.state.node) {
                let to = edge.to_currency();
                if entry.state.route.iter().any(|c| c == to) {
                    continue;
                }
                let next_hops = entry.priority.hops + 1;
                if next_hops > self.max_hops {
                    continue;
                }
                let Some(feasible) = edge_supports_amount(edge, &entry.state.range)? else {
                    continue;
                };
                let effective_rate = edge.effective_rate()?;
                let next_range = calculate_next_range(edge, &feasible, &effective_rate)?;

                let inverse = if effective_rate.is_zero() {
                    Decimal::one(COST_SCALE)
                } else {
                    Decimal::one(COST_SCALE).div_with_scale(&effective_rate, COST_SCALE)?
                };
                let next_cost = entry.priority.cost.mul_with_scale(&inverse, COST_SCALE)?;
                let next_product = entry
                    .state
                    .product
                    .mul_with_scale(&effective_rate, COST_SCALE)?;

                if let Some(best) = &best_accepted {
                    let bound = best.mul_with_scale(&amplifier, COST_SCALE)?;
                    if next_cost > bound {
                        continue;
                    }
                }

                let signature = state_signature(Some(&next_range))?;
                let is_new = !registry.contains(next_node, &signature);
                if is_new && visited_states >= self.limits.max_visited_states {
                    report.visited_states.reached = true;
                    halted = true;
                    break;
                }
                match registry.register(next_node, &signature, &next_cost, next_hops) {
                    RegisterOutcome::Dominated => continue,
                    RegisterOutcome::InsertedNew => visited_states += 1,
                    RegisterOutcome::InsertedExisting => {}
                }

                let mut route = entry.state.route.clone();
                route.push(to.to_string());
                let mut edges = entry.state.edges.clone();
                edges.push(edge_index);
                frontier.push(FrontierEntry {
                    priority: PlanPriority::new(
                        next_cost,
                        next_hops,
                        route.join(ROUTE_SEPARATOR),
                        next_insertion(&mut insertion),
                    ),
                    state: SearchState {
                        node: next_node,
                        product: next_product,
                        edges,
                        route,
                        range: next_range,
                    },
                });
            }
        }

        report.expansions.observed = expansions;
        report.visited_states.observed = visited_states;
        report.time_budget.observed = started.elapsed().as_millis() as u64;

        if report.any_reached() {
            warn!(
                "search guards breached ({:?}): expansions={}, visited={}, elapsed={}ms",
                report.breached(),
                expansions,
                visited_states,
                report.time_budget.observed
            );
        } else {
            debug!(
                "search finished: {} expansions, {} visited states, {} accepted, {}ms",
                expansions,
                visited_states,
                results.len(),
                report.time_budget.observed
            );
        }

        Ok(SearchSweep {
            accepted: results.into_sorted(),
            report,
        })
    }
}

fn next_insertion(counter: &mut u64) -> u64 {
    let value = *counter;
    *counter += 1;
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::Decimal;
    use crate::evaluator::StandardFillEvaluator;
    use crate::graph::GraphBuilder;
    use crate::money::{Money, MoneyMap};
    use crate::order::{Order, OrderBounds, OrderBook, Side};
    use crate::rate::{AssetPair, ExchangeRate};
    use crate::results::DefaultPathOrder;

    fn buy(id: &str, base: &str, quote: &str, min: &str, max: &str, rate: &str) -> Order {
        Order::new(
            id,
            Side::Buy,
            AssetPair::new(base, quote).unwrap(),
            OrderBounds::new(
                Money::parse(base, min).unwrap(),
                Money::parse(base, max).unwrap(),
            )
            .unwrap(),
            ExchangeRate::new(base, quote, Decimal::parse(rate).unwrap()).unwrap(),
            None,
        )
        .unwrap()
    }

    fn graph_of(orders: Vec<Order>) -> crate::graph::ConversionGraph {
        let evaluator = StandardFillEvaluator;
        let book = OrderBook::new(orders);
        GraphBuilder::new(&evaluator)
            .build(book.orders())
            .unwrap()
    }

    fn limits() -> SearchLimits {
        SearchLimits {
            max_expansions: 1000,
            max_visited_states: 1000,
            time_budget: None,
        }
    }

    fn window(currency: &str, min: &str, max: &str, desired: &str) -> SpendRange {
        SpendRange::new(
            Money::parse(currency, min).unwrap(),
            Money::parse(currency, max).unwrap(),
            Some(Money::parse(currency, desired).unwrap()),
        )
        .unwrap()
    }

    fn accept_all(candidate: &CandidatePath) -> Result<Option<ExecutionPlan>, EngineError> {
        Ok(Some(ExecutionPlan {
            source_currency: candidate.route.first().cloned().unwrap_or_default(),
            target_currency: candidate.route.last().cloned().unwrap_or_default(),
            total_spent: Money::parse("USD", "1").unwrap(),
            total_received: Money::parse("USD", "1").unwrap(),
            residual_tolerance: Decimal::zero(18),
            steps: Vec::new(),
            fee_breakdown: MoneyMap::new(),
            signature: candidate.signature.clone(),
        }))
    }

    #[test]
    fn test_dominance_skips_dominated_records() {
        let mut registry = DominanceRegistry::default();
        let node = NodeIndex::new(0);
        let cheap = Decimal::new("1.0", 18).unwrap();
        let pricey = Decimal::new("2.0", 18).unwrap();

        assert!(matches!(
            registry.register(node, "sig", &cheap, 2),
            RegisterOutcome::InsertedNew
        ));
        // Worse on both axes: skipped.
        assert!(matches!(
            registry.register(node, "sig", &pricey, 3),
            RegisterOutcome::Dominated
        ));
        // Equal on both axes counts as dominated too.
        assert!(matches!(
            registry.register(node, "sig", &cheap, 2),
            RegisterOutcome::Dominated
        ));
        // Incomparable (cheaper but longer) coexists.
        let cheaper = Decimal::new("0.5", 18).unwrap();
        assert!(matches!(
            registry.register(node, "sig", &cheaper, 5),
            RegisterOutcome::InsertedExisting
        ));
    }

    #[test]
    fn test_dominance_evicts_strictly_dominated_records() {
        let mut registry = DominanceRegistry::default();
        let node = NodeIndex::new(0);
        let pricey = Decimal::new("2.0", 18).unwrap();
        let cheap = Decimal::new("1.0", 18).unwrap();

        registry.register(node, "sig", &pricey, 4);
        // Strictly better on both axes: evicts the old record.
        assert!(matches!(
            registry.register(node, "sig", &cheap, 2),
            RegisterOutcome::InsertedExisting
        ));
        let records = &registry.records[&node]["sig"];
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].hops, 2);

        // Different signature at the same node is a fresh insertion.
        assert!(matches!(
            registry.register(node, "other", &pricey, 4),
            RegisterOutcome::InsertedNew
        ));
    }

    #[test]
    fn test_signature_is_deterministic() {
        let range = window("USD", "100.0", "110.00", "100.00");
        let a = state_signature(Some(&range)).unwrap();
        let b = state_signature(Some(&range)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, "range:USD:100.00:110.00:2|desired:USD:100.00:2");
        assert_eq!(state_signature(None).unwrap(), "range:null|desired:null");
    }

    #[test]
    fn test_finds_direct_route() {
        let graph = graph_of(vec![buy("o-1", "USD", "BTC", "10", "1000", "0.00002")]);
        let search = PathSearch::new(
            &graph,
            &DefaultPathOrder,
            limits(),
            3,
            4,
            Decimal::zero(0),
            0,
        );
        let sweep = search
            .run("USD", "BTC", window("USD", "100", "110", "100"), &mut accept_all)
            .unwrap();
        assert_eq!(sweep.accepted.len(), 1);
        let (priority, plan) = &sweep.accepted[0];
        assert_eq!(plan.signature, "USD->BTC");
        assert_eq!(priority.hops, 1);
        // Cost of a 0.00002 rate edge is 1/0.00002 = 50000.
        assert_eq!(priority.cost.to_string(), "50000.000000000000000000");
        assert!(!sweep.report.any_reached());
        assert_eq!(sweep.report.visited_states.observed, 2);
    }

    #[test]
    fn test_orders_routes_by_cost() {
        // Direct route at a worse rate than the two-hop route.
        let graph = graph_of(vec![
            buy("direct", "USD", "BTC", "10", "1000", "0.000018"),
            buy("hop-1", "USD", "USDT", "10", "1000", "1.00"),
            buy("hop-2", "USDT", "BTC", "10", "1000", "0.00002"),
        ]);
        let search = PathSearch::new(
            &graph,
            &DefaultPathOrder,
            limits(),
            3,
            4,
            Decimal::zero(0),
            0,
        );
        let sweep = search
            .run("USD", "BTC", window("USD", "100", "110", "100"), &mut accept_all)
            .unwrap();
        assert_eq!(sweep.accepted.len(), 2);
        assert_eq!(sweep.accepted[0].1.signature, "USD->USDT->BTC");
        assert_eq!(sweep.accepted[1].1.signature, "USD->BTC");
        assert!(sweep.accepted[0].0.cost < sweep.accepted[1].0.cost);
    }

    #[test]
    fn test_max_hops_is_enforced() {
        let graph = graph_of(vec![
            buy("hop-1", "USD", "USDT", "10", "1000", "1.00"),
            buy("hop-2", "USDT", "BTC", "10", "1000", "0.00002"),
        ]);
        let search = PathSearch::new(
            &graph,
            &DefaultPathOrder,
            limits(),
            1,
            4,
            Decimal::zero(0),
            0,
        );
        let sweep = search
            .run("USD", "BTC", window("USD", "100", "110", "100"), &mut accept_all)
            .unwrap();
        assert!(sweep.accepted.is_empty());
    }

    #[test]
    fn test_infeasible_window_yields_nothing() {
        // Window far above the order's capacity.
        let graph = graph_of(vec![buy("o-1", "USD", "BTC", "10", "50", "0.00002")]);
        let search = PathSearch::new(
            &graph,
            &DefaultPathOrder,
            limits(),
            3,
            4,
            Decimal::zero(0),
            0,
        );
        let sweep = search
            .run("USD", "BTC", window("USD", "100", "110", "100"), &mut accept_all)
            .unwrap();
        assert!(sweep.accepted.is_empty());
    }

    #[test]
    fn test_expansion_guard_fires() {
        let graph = graph_of(vec![
            buy("hop-1", "USD", "USDT", "10", "1000", "1.00"),
            buy("hop-2", "USDT", "BTC", "10", "1000", "0.00002"),
        ]);
        let search = PathSearch::new(
            &graph,
            &DefaultPathOrder,
            SearchLimits {
                max_expansions: 1,
                max_visited_states: 1000,
                time_budget: None,
            },
            3,
            4,
            Decimal::zero(0),
            0,
        );
        let sweep = search
            .run("USD", "BTC", window("USD", "100", "110", "100"), &mut accept_all)
            .unwrap();
        assert!(sweep.report.expansions.reached);
        assert!(sweep.report.expansions.observed <= 1);
        assert!(sweep.accepted.is_empty());
    }

    #[test]
    fn test_visited_states_guard_fires() {
        let graph = graph_of(vec![
            buy("hop-1", "USD", "USDT", "10", "1000", "1.00"),
            buy("hop-2", "USDT", "BTC", "10", "1000", "0.00002"),
        ]);
        let search = PathSearch::new(
            &graph,
            &DefaultPathOrder,
            SearchLimits {
                max_expansions: 1000,
                max_visited_states: 1,
                time_budget: None,
            },
            3,
            4,
            Decimal::zero(0),
            0,
        );
        let sweep = search
            .run("USD", "BTC", window("USD", "100", "110", "100"), &mut accept_all)
            .unwrap();
        assert!(sweep.report.visited_states.reached);
        assert_eq!(sweep.report.visited_states.observed, 1);
    }

    #[test]
    fn test_time_budget_guard_fires() {
        let graph = graph_of(vec![buy("o-1", "USD", "BTC", "10", "1000", "0.00002")]);
        let search = PathSearch::new(
            &graph,
            &DefaultPathOrder,
            SearchLimits {
                max_expansions: 1000,
                max_visited_states: 1000,
                time_budget: Some(Duration::from_millis(0)),
            },
            3,
            4,
            Decimal::zero(0),
            0,
        );
        let sweep = search
            .run("USD", "BTC", window("USD", "100", "110", "100"), &mut accept_all)
            .unwrap();
        assert!(sweep.report.time_budget.reached);
        assert!(sweep.accepted.is_empty());
    }

    #[test]
    fn test_cancellation_stops_the_sweep() {
        let graph = graph_of(vec![buy("o-1", "USD", "BTC", "10", "1000", "0.00002")]);
        let token = CancellationToken::new();
        token.cancel();
        let search = PathSearch::new(
            &graph,
            &DefaultPathOrder,
            limits(),
            3,
            4,
            Decimal::zero(0),
            0,
        )
        .with_cancellation(token);
        let sweep = search
            .run("USD", "BTC", window("USD", "100", "110", "100"), &mut accept_all)
            .unwrap();
        assert!(sweep.accepted.is_empty());
        // Cancellation is not a guard breach.
        assert!(!sweep.report.any_reached());
    }

    #[test]
    fn test_missing_nodes_return_empty_sweep() {
        let graph = graph_of(vec![buy("o-1", "USD", "BTC", "10", "1000", "0.00002")]);
        let search = PathSearch::new(
            &graph,
            &DefaultPathOrder,
            limits(),
            3,
            4,
            Decimal::zero(0),
            0,
        );
        let sweep = search
            .run("USD", "XRP", window("USD", "100", "110", "100"), &mut accept_all)
            .unwrap();
        assert!(sweep.accepted.is_empty());
        assert!(!sweep.report.any_reached());
    }

    #[test]
    fn test_rejected_candidates_are_not_retained() {
        let graph = graph_of(vec![buy("o-1", "USD", "BTC", "10", "1000", "0.00002")]);
        let search = PathSearch::new(
            &graph,
            &DefaultPathOrder,
            limits(),
            3,
            4,
            Decimal::zero(0),
            0,
        );
        let mut reject_all =
            |_: &CandidatePath| -> Result<Option<ExecutionPlan>, EngineError> { Ok(None) };
        let sweep = search
            .run("USD", "BTC", window("USD", "100", "110", "100"), &mut reject_all)
            .unwrap();
        assert!(sweep.accepted.is_empty());
        assert!(!sweep.report.any_reached());
    }
}
