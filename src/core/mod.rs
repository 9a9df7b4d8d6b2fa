//! 콤보 주문 구성과 지정가 추격의 핵심 구현체

pub mod chase_supervisor;
pub mod combo_builder;
pub mod order_registry;
pub mod order_submitter;
pub mod price_chaser;
pub mod snapshot_aggregator;

pub use chase_supervisor::ChaseSupervisor;
pub use combo_builder::ComboBuilder;
pub use order_registry::OrderRegistry;
pub use order_submitter::OrderSubmitter;
pub use price_chaser::{next_price, ChaseOutcome, ChaseParams, ChaseReport, ChaseState, PriceChaser, PriceStep};
pub use snapshot_aggregator::{CostEstimate, LegQuote, MarketSnapshotAggregator};
