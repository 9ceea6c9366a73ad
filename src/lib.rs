//! Multi-hop conversion routing engine for peer-to-peer order books
//!
//! Given a spend amount in a source asset, a target asset, a tolerance
//! window and hop limits, the engine compiles the order book into a
//! directed currency graph, enumerates candidate routes best-first under
//! expansion/visited-state/wall-time guards, materializes each candidate
//! into concrete per-leg fills (fees included), and returns the surviving
//! plans in a deterministic priority order.
//!
//! All amounts are exact decimals with explicit currency and scale; no
//! floating point appears in any result-affecting path.
//!
//! ```
//! use routing_engine::{
//!     AssetPair, Decimal, ExchangeRate, Money, Order, OrderBook, OrderBounds,
//!     PathSearchConfig, RouteRequest, RoutingEngine, Side,
//! };
//!
//! let order = Order::new(
//!     "order-1",
//!     Side::Buy,
//!     AssetPair::new("USD", "BTC").unwrap(),
//!     OrderBounds::new(
//!         Money::parse("USD", "10").unwrap(),
//!         Money::parse("USD", "1000").unwrap(),
//!     )
//!     .unwrap(),
//!     ExchangeRate::new("USD", "BTC", Decimal::parse("0.00002").unwrap()).unwrap(),
//!     None,
//! )
//! .unwrap();
//!
//! let request = RouteRequest {
//!     order_book: OrderBook::new(vec![order]),
//!     config: PathSearchConfig::builder(Money::parse("USD", "100.00").unwrap())
//!         .tolerance(Decimal::zero(0), Decimal::parse("0.10").unwrap())
//!         .build()
//!         .unwrap(),
//!     target_asset: "BTC".to_string(),
//! };
//!
//! let outcome = RoutingEngine::new().find_best_plans(&request).unwrap();
//! assert_eq!(outcome.paths[0].total_received.amount(), &Decimal::parse("0.002").unwrap());
//! ```

mod config;
mod decimal;
mod engine;
mod error;
mod evaluator;
mod fees;
mod graph;
mod heap;
mod materializer;
mod money;
mod order;
mod rate;
mod results;
mod search;
mod spend;
mod tolerance;
mod types;

pub use config::{PathSearchConfig, PathSearchConfigBuilder, DEFAULT_MAX_EXPANSIONS,
    DEFAULT_MAX_HOPS, DEFAULT_MAX_VISITED_STATES};
pub use decimal::{Decimal, MAX_SCALE};
pub use engine::{RouteRequest, RoutingEngine};
pub use error::EngineError;
pub use evaluator::{OrderFill, OrderFillEvaluator, SellQuote, StandardFillEvaluator};
pub use fees::{FeeBreakdown, FeePolicy, FixedFee, RelativeFee};
pub use graph::{
    CapacityRange, ConversionEdge, ConversionGraph, EdgeSegment, GraphBuilder,
    EFFECTIVE_RATE_SCALE,
};
pub use materializer::{BuyLegFill, InitialSeed, LegMaterializer, SellLegFill};
pub use money::{validate_currency, Money, MoneyMap};
pub use order::{Order, OrderBook, OrderBounds, Side};
pub use rate::{AssetPair, ExchangeRate};
pub use results::{collate_plans, DefaultPathOrder, PathOrderStrategy, PlanPriority};
pub use search::{
    calculate_next_range, edge_supports_amount, state_signature, CancellationToken, PathSearch,
    SearchLimits, SearchSweep, COST_SCALE, ROUTE_SEPARATOR,
};
pub use spend::SpendAnalyzer;
pub use tolerance::{residual_epsilon, tolerance_amplifier, ToleranceWindow};
pub use types::{
    CandidatePath, ExecutionPlan, ExecutionStep, GuardLimitStatus, SearchGuardReport,
    SearchOutcome, SpendRange,
};
