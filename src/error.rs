/**
* filename : error
* author : HAMA
* date: 2025. 5. 8.
* description:
**/

use thiserror::Error;

use crate::models::order::OrderId;

#[derive(Error, Debug)]
pub enum TradingError {
    #[error("Combo requires at least one leg")]
    EmptyLegs,

    #[error("Mismatched underlying: leg {leg_index} is {found}, expected {expected}")]
    MismatchedUnderlying {
        leg_index: usize,
        expected: String,
        found: String,
    },

    #[error("Invalid ratio on leg {leg_index}: ratio must be positive")]
    InvalidRatio { leg_index: usize },

    #[error("Contract resolution failed for leg {leg_index}: {reason}")]
    ResolutionFailed { leg_index: usize, reason: String },

    #[error("Contract not found: {0}")]
    ContractNotFound(String),

    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Gateway error: {0}")]
    GatewayError(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("Already running: {0}")]
    AlreadyRunning(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Task failed: {0}")]
    TaskFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl From<config::ConfigError> for TradingError {
    fn from(err: config::ConfigError) -> Self {
        TradingError::ConfigError(err.to_string())
    }
}

impl TradingError {
    /// 입력 오류 여부 (주문 상태를 만들기 전에 실패한 경우)
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            TradingError::EmptyLegs
                | TradingError::MismatchedUnderlying { .. }
                | TradingError::InvalidRatio { .. }
                | TradingError::InvalidParameter(_)
        )
    }
}
