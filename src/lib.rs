//! 옵션 콤보 주문 및 지정가 추격 라이브러리
//!
//! 다리 목록을 서로소 비율의 콤보로 정리해 게이트웨이에 제출하고,
//! 체결될 때까지 지정가를 목표가 방향으로 조금씩 옮긴다.

pub mod config;
pub mod core;
pub mod error;
pub mod gateway;
pub mod models;
pub mod utils;

// 핵심 타입 재노출
pub use crate::core::{ChaseOutcome, ChaseParams, ChaseReport, ChaseSupervisor, ComboBuilder, OrderRegistry, OrderSubmitter};
pub use crate::error::TradingError;
pub use crate::gateway::traits::{ContractResolver, EventSink, Gateway, QuoteSource};
pub use crate::models::combo::ComboSpecification;
pub use crate::models::leg::{Action, Leg, OptionRight};
pub use crate::models::order::{OrderId, OrderStatus, OrderType};

/// 버전 정보
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 결과 타입 별칭
pub type Result<T> = std::result::Result<T, TradingError>;
