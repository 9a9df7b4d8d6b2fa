use async_trait::async_trait;

use crate::error::TradingError;
use crate::models::contract::{ContractSpec, OrderContract, ResolvedContract};
use crate::models::execution::Execution;
use crate::models::market_data::MarketSnapshot;
use crate::models::order::{OrderId, OrderParams};

/// Correlation id for contract-detail and market-data requests
pub type ReqId = i64;

/// Request side of the brokerage gateway.
///
/// Responses never come back through these calls: they arrive later on the
/// `EventSink` the implementation was built with.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Open the session
    async fn connect(&mut self, host: &str, port: u16, client_id: i32) -> Result<(), TradingError>;

    /// Close the session
    async fn disconnect(&mut self) -> Result<(), TradingError>;

    fn is_connected(&self) -> bool;

    /// First order id the broker will accept, known once connected
    fn next_valid_id(&self) -> Option<u64>;

    /// Ask the contract master for every instrument matching `spec`
    async fn req_contract_details(&self, req_id: ReqId, spec: &ContractSpec) -> Result<(), TradingError>;

    /// Ask for a one-shot quote; ends with `tick_snapshot_end`
    async fn req_market_snapshot(&self, req_id: ReqId, contract: &ResolvedContract) -> Result<(), TradingError>;

    async fn cancel_market_data(&self, req_id: ReqId) -> Result<(), TradingError>;

    /// Place a new order, or amend a live one when `order_id` is already known to the broker
    async fn place_order(
        &self,
        order_id: OrderId,
        contract: &OrderContract,
        params: &OrderParams,
    ) -> Result<(), TradingError>;
}

/// Callback side of the gateway. Implementations must not block.
pub trait EventSink: Send + Sync {
    fn order_status(
        &self,
        order_id: OrderId,
        status: &str,
        filled: f64,
        remaining: f64,
        avg_fill_price: f64,
        last_fill_price: f64,
    );

    fn exec_details(&self, req_id: ReqId, execution: Execution);

    fn tick_price(&self, req_id: ReqId, tick_type: i32, price: f64);

    fn contract_details(&self, req_id: ReqId, contract: ResolvedContract);

    fn contract_details_end(&self, req_id: ReqId);

    fn tick_snapshot_end(&self, req_id: ReqId);

    fn error(&self, req_id: ReqId, code: i32, message: &str);
}

/// Turns an abstract contract description into a tradable instrument
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContractResolver: Send + Sync {
    async fn resolve(&self, spec: &ContractSpec) -> Result<ResolvedContract, TradingError>;
}

/// One-shot quotes for resolved instruments
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Whatever arrived within the bounded wait; fields may be missing
    async fn snapshot(&self, contract: &ResolvedContract) -> Result<MarketSnapshot, TradingError>;
}
