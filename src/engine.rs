//! Routing engine orchestration
//!
//! Wires the pipeline for one request: filter the order book against the
//! spend window, compile the graph, sweep it best-first, materialize every
//! completed candidate, and collate the surviving plans. Disjoint mode runs
//! a single sweep; reusable mode re-runs the sweep with an insertion bias
//! and a returned-signature skip set until enough distinct plans are
//! collected.

use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::PathSearchConfig;
use crate::error::EngineError;
use crate::evaluator::{OrderFillEvaluator, StandardFillEvaluator};
use crate::graph::{ConversionGraph, GraphBuilder};
use crate::materializer::LegMaterializer;
use crate::money::validate_currency;
use crate::order::OrderBook;
use crate::results::{collate_plans, DefaultPathOrder, PathOrderStrategy, PlanPriority};
use crate::search::{CancellationToken, PathSearch, SearchLimits};
use crate::spend::SpendAnalyzer;
use crate::tolerance::ToleranceWindow;
use crate::types::{CandidatePath, ExecutionPlan, SearchGuardReport, SearchOutcome, SpendRange};

/// Reusable mode stops after this many consecutive sweeps that surface
/// nothing new.
const MAX_CONSECUTIVE_DUPLICATES: u32 = 3;
/// Insertion-order offset applied per reusable-mode sweep.
const REUSABLE_INSERTION_BIAS: u64 = 1_000_000;

/// One routing request: the book to route over, the search configuration,
/// and the asset to convert into.
#[derive(Debug, Clone)]
pub struct RouteRequest {
    pub order_book: OrderBook,
    pub config: PathSearchConfig,
    pub target_asset: String,
}

/// Entry point of the routing pipeline.
pub struct RoutingEngine {
    evaluator: Box<dyn OrderFillEvaluator>,
    order_strategy: Box<dyn PathOrderStrategy>,
    cancellation: Option<CancellationToken>,
}

impl Default for RoutingEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RoutingEngine {
    pub fn new() -> Self {
        Self {
            evaluator: Box::new(StandardFillEvaluator),
            order_strategy: Box::new(DefaultPathOrder),
            cancellation: None,
        }
    }

    /// Replaces the fill evaluator (fee semantics plug-in).
    pub fn with_evaluator(mut self, evaluator: Box<dyn OrderFillEvaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// Replaces the priority comparator used by the frontier and results.
    pub fn with_order_strategy(mut self, strategy: Box<dyn PathOrderStrategy>) -> Self {
        self.order_strategy = strategy;
        self
    }

    /// Attaches an external cancellation token checked alongside the
    /// search's time budget.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    fn search<'g>(
        &'g self,
        graph: &'g ConversionGraph,
        config: &PathSearchConfig,
        limits: &SearchLimits,
        result_limit: usize,
        insertion_bias: u64,
    ) -> PathSearch<'g> {
        let search = PathSearch::new(
            graph,
            &*self.order_strategy,
            limits.clone(),
            config.max_hops(),
            result_limit,
            config.max_tolerance_ratio().clone(),
            insertion_bias,
        );
        match &self.cancellation {
            Some(token) => search.with_cancellation(token.clone()),
            None => search,
        }
    }

    /// Finds the best execution plans for the request. The guard report is
    /// always populated, even when no path exists.
    pub fn find_best_plans(&self, request: &RouteRequest) -> Result<SearchOutcome, EngineError> {
        if request.target_asset.trim().is_empty() {
            return Err(EngineError::InvalidInput(
                "target asset must not be empty".to_string(),
            ));
        }
        let target = validate_currency(&request.target_asset)?;
        let config = &request.config;
        let source = config.spend_amount().currency().to_string();
        let window = config.spend_range()?;
        let tolerance_window = config.tolerance_window()?;

        let evaluator = &*self.evaluator;
        let analyzer = SpendAnalyzer::new(evaluator);
        let materializer = LegMaterializer::new(evaluator);

        let orders = analyzer.filter_orders(&request.order_book, &source, &window)?;
        let graph = GraphBuilder::new(evaluator).build(&orders)?;

        let limits = SearchLimits {
            max_expansions: config.max_expansions(),
            max_visited_states: config.max_visited_states(),
            time_budget: config.time_budget_ms().map(Duration::from_millis),
        };

        let (entries, report) = if !graph.contains(&source) || !graph.contains(&target) {
            debug!(
                "no routable graph for {} -> {}: {} nodes after filtering",
                source,
                target,
                graph.node_count()
            );
            (
                Vec::new(),
                SearchGuardReport::for_limits(
                    limits.max_expansions,
                    limits.max_visited_states,
                    config.time_budget_ms(),
                ),
            )
        } else if config.disjoint_plans() {
            self.run_disjoint(
                &graph,
                &analyzer,
                &materializer,
                config,
                &window,
                &tolerance_window,
                &source,
                &target,
                &limits,
            )?
        } else {
            self.run_reusable(
                &graph,
                &analyzer,
                &materializer,
                config,
                &window,
                &tolerance_window,
                &source,
                &target,
                &limits,
            )?
        };

        let paths = collate_plans(entries, &*self.order_strategy, config.result_limit());

        if config.throw_on_guard_breach() && report.any_reached() {
            return Err(EngineError::GuardLimitExceeded(report.breached().join(", ")));
        }

        info!(
            "routing {} -> {}: {} plan(s), {} expansions, {} visited states",
            source,
            target,
            paths.len(),
            report.expansions.observed,
            report.visited_states.observed
        );
        Ok(SearchOutcome {
            paths,
            guard_limits: report,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn run_disjoint(
        &self,
        graph: &ConversionGraph,
        analyzer: &SpendAnalyzer<'_>,
        materializer: &LegMaterializer<'_>,
        config: &PathSearchConfig,
        window: &SpendRange,
        tolerance_window: &ToleranceWindow,
        source: &str,
        target: &str,
        limits: &SearchLimits,
    ) -> Result<(Vec<(PlanPriority, ExecutionPlan)>, SearchGuardReport), EngineError> {
        let search = self.search(graph, config, limits, config.result_limit(), 0);
        let mut callback = |candidate: &CandidatePath| {
            evaluate_candidate(
                graph,
                analyzer,
                materializer,
                config,
                window,
                tolerance_window,
                target,
                candidate,
            )
        };
        let sweep = search.run(source, target, window.clone(), &mut callback)?;
        Ok((sweep.accepted, sweep.report))
    }

    #[allow(clippy::too_many_arguments)]
    fn run_reusable(
        &self,
        graph: &ConversionGraph,
        analyzer: &SpendAnalyzer<'_>,
        materializer: &LegMaterializer<'_>,
        config: &PathSearchConfig,
        window: &SpendRange,
        tolerance_window: &ToleranceWindow,
        source: &str,
        target: &str,
        limits: &SearchLimits,
    ) -> Result<(Vec<(PlanPriority, ExecutionPlan)>, SearchGuardReport), EngineError> {
        let result_limit = config.result_limit();
        let mut collected: Vec<(PlanPriority, ExecutionPlan)> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut total_report = SearchGuardReport::for_limits(
            limits.max_expansions,
            limits.max_visited_states,
            config.time_budget_ms(),
        );
        let mut consecutive_duplicates = 0u32;
        let mut iteration = 0u64;

        while collected.len() < result_limit && consecutive_duplicates < MAX_CONSECUTIVE_DUPLICATES
        {
            let search = self.search(
                graph,
                config,
                limits,
                result_limit,
                iteration * REUSABLE_INSERTION_BIAS,
            );
            let seen_snapshot = &seen;
            let mut callback = |candidate: &CandidatePath| {
                if seen_snapshot.contains(&candidate.signature) {
                    return Ok(None);
                }
                evaluate_candidate(
                    graph,
                    analyzer,
                    materializer,
                    config,
                    window,
                    tolerance_window,
                    target,
                    candidate,
                )
            };
            let sweep = search.run(source, target, window.clone(), &mut callback)?;
            total_report.merge(&sweep.report);

            if sweep.accepted.is_empty() {
                break;
            }
            let mut new_found = false;
            for (priority, plan) in sweep.accepted {
                if collected.len() >= result_limit {
                    break;
                }
                if seen.insert(priority.signature.clone()) {
                    collected.push((priority, plan));
                    new_found = true;
                }
            }
            if new_found {
                consecutive_duplicates = 0;
            } else {
                consecutive_duplicates += 1;
            }
            iteration += 1;
        }

        debug!(
            "reusable top-K finished after {} sweep(s): {} distinct plan(s)",
            iteration,
            collected.len()
        );
        Ok((collected, total_report))
    }
}

/// Decides one completed candidate: enforce the hop minimum, derive the
/// first-leg seed, and materialize.
#[allow(clippy::too_many_arguments)]
fn evaluate_candidate(
    graph: &ConversionGraph,
    analyzer: &SpendAnalyzer<'_>,
    materializer: &LegMaterializer<'_>,
    config: &PathSearchConfig,
    window: &SpendRange,
    tolerance_window: &ToleranceWindow,
    target: &str,
    candidate: &CandidatePath,
) -> Result<Option<ExecutionPlan>, EngineError> {
    if candidate.hops < config.min_hops() {
        return Ok(None);
    }
    let Some(first_index) = candidate.edges.first() else {
        return Ok(None);
    };
    let first_edge = graph.edge(*first_index).ok_or_else(|| {
        EngineError::ContractViolation("candidate references an unknown edge".to_string())
    })?;
    let Some(seed) = analyzer.initial_seed(materializer, first_edge, window)? else {
        return Ok(None);
    };
    materializer.materialize(
        graph,
        candidate,
        config.spend_amount(),
        &seed,
        target,
        tolerance_window,
    )
}
