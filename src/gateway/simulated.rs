use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::TradingError;
use crate::gateway::traits::{EventSink, Gateway, ReqId};
use crate::models::contract::{ContractSpec, OrderContract, ResolvedContract};
use crate::models::execution::Execution;
use crate::models::leg::{Action, OptionRight};
use crate::models::market_data::MarketSnapshot;
use crate::models::order::{OrderId, OrderParams, OrderType};

const FIRST_CON_ID: i64 = 700_000;
const FILL_TOLERANCE: f64 = 1e-9;

/// One `place_order` call as the simulated broker saw it
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub order_id: OrderId,
    pub contract: OrderContract,
    pub params: OrderParams,
}

#[derive(Debug, Clone)]
struct SimOrder {
    params: OrderParams,
    filled: f64,
    done: bool,
}

#[derive(Default)]
struct SimState {
    con_ids: HashMap<String, i64>,
    next_con_id: i64,
    orders: HashMap<OrderId, SimOrder>,
    placements: Vec<Placement>,
}

impl SimState {
    fn con_id_for(&mut self, key: String) -> i64 {
        if self.next_con_id == 0 {
            self.next_con_id = FIRST_CON_ID;
        }
        let next = &mut self.next_con_id;
        *self.con_ids.entry(key).or_insert_with(|| {
            let id = *next;
            *next += 1;
            id
        })
    }
}

/// Deterministic in-process broker.
///
/// Resolves any option contract to a stable con id, serves configured quotes,
/// acknowledges orders, and fills a limit order in full once its price reaches
/// the configured fill level. Every response goes through the `EventSink`.
pub struct SimulatedGateway {
    sink: Arc<dyn EventSink>,
    connected: bool,
    first_order_id: u64,
    quotes: HashMap<String, MarketSnapshot>,
    unknown_symbols: HashSet<String>,
    ambiguous_symbols: HashSet<String>,
    fill_level: Option<f64>,
    fail_amends: bool,
    silent_quotes: bool,
    state: Mutex<SimState>,
}

fn contract_key(symbol: &str, expiry: &str, strike: f64, right: Option<OptionRight>) -> String {
    format!(
        "{}|{}|{}|{}",
        symbol,
        expiry,
        strike,
        right.map(|r| r.as_str()).unwrap_or("")
    )
}

fn local_symbol(spec: &ContractSpec) -> String {
    let expiry = spec.expiry.get(2..).unwrap_or(&spec.expiry);
    format!(
        "{:<6}{}{}{:08}",
        spec.symbol,
        expiry,
        spec.right.as_str(),
        (spec.strike * 1000.0).round() as u64
    )
}

impl SimulatedGateway {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        SimulatedGateway {
            sink,
            connected: false,
            first_order_id: 1,
            quotes: HashMap::new(),
            unknown_symbols: HashSet::new(),
            ambiguous_symbols: HashSet::new(),
            fill_level: None,
            fail_amends: false,
            silent_quotes: false,
            state: Mutex::new(SimState::default()),
        }
    }

    pub fn with_quote(mut self, spec: &ContractSpec, snapshot: MarketSnapshot) -> Self {
        let key = contract_key(&spec.symbol, &spec.expiry, spec.strike, Some(spec.right));
        self.quotes.insert(key, snapshot);
        self
    }

    /// Contract lookups for `symbol` come back empty
    pub fn with_unknown_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.unknown_symbols.insert(symbol.into());
        self
    }

    /// Contract lookups for `symbol` return two matches
    pub fn with_ambiguous_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.ambiguous_symbols.insert(symbol.into());
        self
    }

    /// Limit orders fill once a buy is at or above, or a sell at or below, this price
    pub fn with_fill_level(mut self, price: f64) -> Self {
        self.fill_level = Some(price);
        self
    }

    /// Reject every re-placement of a known order id
    pub fn with_failing_amends(mut self) -> Self {
        self.fail_amends = true;
        self
    }

    /// Snapshot requests never answer
    pub fn with_silent_quotes(mut self) -> Self {
        self.silent_quotes = true;
        self
    }

    pub fn with_first_order_id(mut self, id: u64) -> Self {
        self.first_order_id = id;
        self
    }

    /// Every accepted placement and amendment, oldest first
    pub async fn placements(&self) -> Vec<Placement> {
        self.state.lock().await.placements.clone()
    }

    /// Broker-side cancel of a live order
    pub async fn cancel(&self, order_id: OrderId) -> Result<(), TradingError> {
        let mut state = self.state.lock().await;
        let order = state.orders.get_mut(&order_id).ok_or(TradingError::OrderNotFound(order_id))?;
        if order.done {
            return Err(TradingError::InvalidParameter(format!("Order {} is no longer live", order_id)));
        }
        order.done = true;
        let remaining = order.params.total_quantity as f64 - order.filled;
        self.sink.order_status(order_id, "Cancelled", order.filled, remaining, 0.0, 0.0);
        Ok(())
    }

    /// Report a fill of `shares` at `price` without completing the order
    pub async fn fill_partially(&self, order_id: OrderId, shares: f64, price: f64) -> Result<(), TradingError> {
        let mut state = self.state.lock().await;
        let order = state.orders.get_mut(&order_id).ok_or(TradingError::OrderNotFound(order_id))?;
        let total = order.params.total_quantity as f64;
        let remaining = total - order.filled;
        if order.done || shares <= 0.0 || shares >= remaining {
            return Err(TradingError::InvalidParameter(format!(
                "Partial fill of {} does not fit order {} with {} remaining",
                shares, order_id, remaining
            )));
        }
        order.filled += shares;
        self.sink
            .exec_details(-1, Execution::new(Uuid::new_v4().to_string(), order_id, shares, price));
        self.sink
            .order_status(order_id, "Submitted", order.filled, total - order.filled, price, price);
        Ok(())
    }

    fn ensure_connected(&self) -> Result<(), TradingError> {
        if self.connected {
            Ok(())
        } else {
            Err(TradingError::NotConnected)
        }
    }

    fn crosses(&self, params: &OrderParams) -> bool {
        match params.order_type {
            OrderType::Market => true,
            OrderType::Limit => match (params.limit_price, self.fill_level) {
                (Some(limit), Some(level)) => match params.action {
                    Action::Buy => limit >= level - FILL_TOLERANCE,
                    Action::Sell => limit <= level + FILL_TOLERANCE,
                },
                _ => false,
            },
        }
    }

    fn resolved(&self, spec: &ContractSpec, con_id: i64) -> ResolvedContract {
        ResolvedContract {
            con_id,
            symbol: spec.symbol.clone(),
            sec_type: spec.sec_type.clone(),
            expiry: spec.expiry.clone(),
            strike: spec.strike,
            right: Some(spec.right),
            exchange: spec.exchange.clone(),
            currency: spec.currency.clone(),
            multiplier: Some(spec.multiplier.clone()),
            local_symbol: Some(local_symbol(spec)),
        }
    }
}

#[async_trait]
impl Gateway for SimulatedGateway {
    async fn connect(&mut self, host: &str, port: u16, client_id: i32) -> Result<(), TradingError> {
        log::info!("Simulated gateway session opened ({}:{} client {})", host, port, client_id);
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TradingError> {
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn next_valid_id(&self) -> Option<u64> {
        self.connected.then_some(self.first_order_id)
    }

    async fn req_contract_details(&self, req_id: ReqId, spec: &ContractSpec) -> Result<(), TradingError> {
        self.ensure_connected()?;

        if !self.unknown_symbols.contains(&spec.symbol) {
            let key = contract_key(&spec.symbol, &spec.expiry, spec.strike, Some(spec.right));
            let mut state = self.state.lock().await;
            let con_id = state.con_id_for(key.clone());
            self.sink.contract_details(req_id, self.resolved(spec, con_id));

            if self.ambiguous_symbols.contains(&spec.symbol) {
                let alternate = state.con_id_for(format!("{}|alt", key));
                self.sink.contract_details(req_id, self.resolved(spec, alternate));
            }
        }

        self.sink.contract_details_end(req_id);
        Ok(())
    }

    async fn req_market_snapshot(&self, req_id: ReqId, contract: &ResolvedContract) -> Result<(), TradingError> {
        self.ensure_connected()?;
        if self.silent_quotes {
            return Ok(());
        }

        let key = contract_key(&contract.symbol, &contract.expiry, contract.strike, contract.right);
        if let Some(quote) = self.quotes.get(&key) {
            if let Some(bid) = quote.bid {
                self.sink.tick_price(req_id, 1, bid);
            }
            if let Some(ask) = quote.ask {
                self.sink.tick_price(req_id, 2, ask);
            }
            if let Some(last) = quote.last {
                self.sink.tick_price(req_id, 4, last);
            }
        }
        self.sink.tick_snapshot_end(req_id);
        Ok(())
    }

    async fn cancel_market_data(&self, req_id: ReqId) -> Result<(), TradingError> {
        self.ensure_connected()?;
        log::debug!("Simulated market data request {} cancelled", req_id);
        Ok(())
    }

    async fn place_order(
        &self,
        order_id: OrderId,
        contract: &OrderContract,
        params: &OrderParams,
    ) -> Result<(), TradingError> {
        self.ensure_connected()?;
        let mut state = self.state.lock().await;

        match state.orders.get(&order_id) {
            Some(existing) if existing.done => {
                self.sink.error(order_id.0 as ReqId, 104, "Cannot modify a filled or cancelled order");
                return Ok(());
            }
            Some(_) if self.fail_amends => {
                return Err(TradingError::GatewayError(format!("Amendment of order {} rejected", order_id)));
            }
            _ => {}
        }

        state.placements.push(Placement {
            order_id,
            contract: contract.clone(),
            params: params.clone(),
        });

        let filled = state.orders.get(&order_id).map(|o| o.filled).unwrap_or(0.0);
        let total = params.total_quantity as f64;

        if self.crosses(params) {
            let price = params.limit_price.or(self.fill_level).unwrap_or(0.0);
            let shares = total - filled;
            self.sink
                .exec_details(-1, Execution::new(Uuid::new_v4().to_string(), order_id, shares, price));
            self.sink.order_status(order_id, "Filled", total, 0.0, price, price);
            state.orders.insert(
                order_id,
                SimOrder {
                    params: params.clone(),
                    filled: total,
                    done: true,
                },
            );
        } else {
            self.sink.order_status(order_id, "Submitted", filled, total - filled, 0.0, 0.0);
            state.orders.insert(
                order_id,
                SimOrder {
                    params: params.clone(),
                    filled,
                    done: false,
                },
            );
        }
        Ok(())
    }
}
