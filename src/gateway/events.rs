use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::order_registry::OrderRegistry;
use crate::error::TradingError;
use crate::gateway::session::PendingRequests;
use crate::gateway::traits::{EventSink, ReqId};
use crate::models::contract::ResolvedContract;
use crate::models::execution::Execution;
use crate::models::market_data::TickType;
use crate::models::order::{OrderId, OrderStatus, StatusSnapshot};

/// Error codes the gateway uses for connectivity notices rather than failures
const INFORMATIONAL_CODES: [i32; 3] = [2104, 2106, 2158];

/// Gateway callback, queued for the dispatcher task
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    OrderStatus {
        order_id: OrderId,
        status: String,
        filled: f64,
        remaining: f64,
        avg_fill_price: f64,
        last_fill_price: f64,
    },
    Execution {
        req_id: ReqId,
        execution: Execution,
    },
    TickPrice {
        req_id: ReqId,
        tick_type: i32,
        price: f64,
    },
    ContractDetails {
        req_id: ReqId,
        contract: ResolvedContract,
    },
    ContractDetailsEnd {
        req_id: ReqId,
    },
    TickSnapshotEnd {
        req_id: ReqId,
    },
    Error {
        req_id: ReqId,
        code: i32,
        message: String,
    },
}

/// `EventSink` that forwards every callback onto an unbounded channel
#[derive(Clone)]
pub struct ChannelEventSink {
    sender: UnboundedSender<GatewayEvent>,
}

impl ChannelEventSink {
    pub fn new() -> (Self, UnboundedReceiver<GatewayEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (ChannelEventSink { sender }, receiver)
    }

    fn send(&self, event: GatewayEvent) {
        if self.sender.send(event).is_err() {
            log::debug!("Event dispatcher stopped; dropping gateway callback");
        }
    }
}

impl EventSink for ChannelEventSink {
    fn order_status(
        &self,
        order_id: OrderId,
        status: &str,
        filled: f64,
        remaining: f64,
        avg_fill_price: f64,
        last_fill_price: f64,
    ) {
        self.send(GatewayEvent::OrderStatus {
            order_id,
            status: status.to_string(),
            filled,
            remaining,
            avg_fill_price,
            last_fill_price,
        });
    }

    fn exec_details(&self, req_id: ReqId, execution: Execution) {
        self.send(GatewayEvent::Execution { req_id, execution });
    }

    fn tick_price(&self, req_id: ReqId, tick_type: i32, price: f64) {
        self.send(GatewayEvent::TickPrice { req_id, tick_type, price });
    }

    fn contract_details(&self, req_id: ReqId, contract: ResolvedContract) {
        self.send(GatewayEvent::ContractDetails { req_id, contract });
    }

    fn contract_details_end(&self, req_id: ReqId) {
        self.send(GatewayEvent::ContractDetailsEnd { req_id });
    }

    fn tick_snapshot_end(&self, req_id: ReqId) {
        self.send(GatewayEvent::TickSnapshotEnd { req_id });
    }

    fn error(&self, req_id: ReqId, code: i32, message: &str) {
        self.send(GatewayEvent::Error {
            req_id,
            code,
            message: message.to_string(),
        });
    }
}

/// Applies queued gateway callbacks to the registry and the pending-request table, in arrival order
#[derive(Clone)]
pub struct EventDispatcher {
    registry: OrderRegistry,
    pending: PendingRequests,
}

impl EventDispatcher {
    pub fn new(registry: OrderRegistry, pending: PendingRequests) -> Self {
        EventDispatcher { registry, pending }
    }

    /// Drain `receiver` on a background task until the channel closes or `token` is cancelled
    pub fn spawn(self, mut receiver: UnboundedReceiver<GatewayEvent>, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        log::debug!("Event dispatcher cancelled");
                        break;
                    }
                    event = receiver.recv() => match event {
                        Some(event) => self.dispatch(event).await,
                        None => {
                            log::debug!("Gateway event channel closed");
                            break;
                        }
                    }
                }
            }
        })
    }

    /// Cancel a spawned dispatcher and wait for it to wind down
    pub async fn stop(token: CancellationToken, handle: JoinHandle<()>) -> Result<(), TradingError> {
        token.cancel();
        handle
            .await
            .map_err(|e| TradingError::TaskFailed(format!("Event dispatcher panicked or was aborted: {}", e)))
    }

    pub async fn dispatch(&self, event: GatewayEvent) {
        match event {
            GatewayEvent::OrderStatus {
                order_id,
                status,
                filled,
                remaining,
                avg_fill_price,
                last_fill_price,
            } => {
                let mut snapshot = StatusSnapshot::new(OrderStatus::from_broker(&status), filled, remaining);
                if avg_fill_price != 0.0 {
                    snapshot = snapshot.with_avg_fill_price(avg_fill_price);
                }
                if last_fill_price != 0.0 {
                    snapshot = snapshot.with_last_fill_price(last_fill_price);
                }
                log::debug!("Order {} status {} filled={} remaining={}", order_id, status, filled, remaining);
                self.ignore_unknown(self.registry.update_status(order_id, snapshot).await);
            }
            GatewayEvent::Execution { req_id, execution } => {
                log::debug!(
                    "Execution {} (req {}) order {}: {} @ {}",
                    execution.exec_id,
                    req_id,
                    execution.order_id,
                    execution.shares,
                    execution.price
                );
                self.ignore_unknown(self.registry.record_execution(execution).await);
            }
            GatewayEvent::TickPrice { req_id, tick_type, price } => {
                if !self.pending.push_tick(req_id, TickType::from_code(tick_type), price).await {
                    log::trace!("Tick for unknown request {}", req_id);
                }
            }
            GatewayEvent::ContractDetails { req_id, contract } => {
                if !self.pending.push_contract(req_id, contract).await {
                    log::debug!("Contract details for unknown request {}", req_id);
                }
            }
            GatewayEvent::ContractDetailsEnd { req_id } | GatewayEvent::TickSnapshotEnd { req_id } => {
                if !self.pending.complete(req_id).await {
                    log::debug!("End signal for unknown request {}", req_id);
                }
            }
            GatewayEvent::Error { req_id, code, message } => {
                self.handle_error(req_id, code, &message).await;
            }
        }
    }

    async fn handle_error(&self, req_id: ReqId, code: i32, message: &str) {
        if INFORMATIONAL_CODES.contains(&code) {
            log::info!("Gateway notice {}: {}", code, message);
            return;
        }

        // Order ids and request ids share one id space; a tracked order wins
        if let Ok(id) = u64::try_from(req_id) {
            if self.registry.contains(OrderId(id)).await {
                log::error!("Order {} error {}: {}", id, code, message);
                return;
            }
        }

        if self.pending.fail(req_id, code, message).await {
            log::warn!("Request {} failed with gateway error {}: {}", req_id, code, message);
        } else {
            log::error!("Gateway error {} (id {}): {}", code, req_id, message);
        }
    }

    fn ignore_unknown(&self, result: Result<(), TradingError>) {
        match result {
            Ok(()) => {}
            Err(TradingError::OrderNotFound(id)) => log::debug!("Callback for untracked order {}", id),
            Err(e) => log::warn!("Failed to apply gateway callback: {}", e),
        }
    }
}
