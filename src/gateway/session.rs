use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex, RwLock};
use tokio::time::timeout;

use crate::config::GatewayConfig;
use crate::error::TradingError;
use crate::gateway::traits::{ContractResolver, Gateway, QuoteSource, ReqId};
use crate::models::contract::{ContractSpec, ResolvedContract};
use crate::models::market_data::{MarketSnapshot, TickType};

/// Request ids below this are left to the broker's own order ids
pub const FIRST_REQ_ID: ReqId = 1000;

/// Data accumulated for one outstanding request
#[derive(Debug, Clone, PartialEq)]
pub enum PendingReply {
    Contracts(Vec<ResolvedContract>),
    Snapshot(MarketSnapshot),
}

/// Outcome of waiting on a pending request
enum Reply {
    Complete(PendingReply),
    /// Deadline passed; carries whatever arrived before it
    TimedOut(Option<PendingReply>),
}

struct Pending {
    partial: PendingReply,
    reply: oneshot::Sender<Result<PendingReply, TradingError>>,
}

/// Outstanding request table shared by the session and the dispatcher
#[derive(Clone, Default)]
pub struct PendingRequests {
    inner: Arc<Mutex<HashMap<ReqId, Pending>>>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    async fn register(
        &self,
        req_id: ReqId,
        partial: PendingReply,
    ) -> oneshot::Receiver<Result<PendingReply, TradingError>> {
        let (reply, receiver) = oneshot::channel();
        self.inner.lock().await.insert(req_id, Pending { partial, reply });
        receiver
    }

    pub async fn register_contracts(&self, req_id: ReqId) -> oneshot::Receiver<Result<PendingReply, TradingError>> {
        self.register(req_id, PendingReply::Contracts(Vec::new())).await
    }

    pub async fn register_snapshot(&self, req_id: ReqId) -> oneshot::Receiver<Result<PendingReply, TradingError>> {
        self.register(req_id, PendingReply::Snapshot(MarketSnapshot::default())).await
    }

    /// Append a contract match; false if `req_id` is not a pending contract request
    pub async fn push_contract(&self, req_id: ReqId, contract: ResolvedContract) -> bool {
        let mut table = self.inner.lock().await;
        match table.get_mut(&req_id) {
            Some(Pending { partial: PendingReply::Contracts(found), .. }) => {
                found.push(contract);
                true
            }
            _ => false,
        }
    }

    /// Merge a price tick; false if `req_id` is not a pending snapshot request
    pub async fn push_tick(&self, req_id: ReqId, tick_type: TickType, price: f64) -> bool {
        let mut table = self.inner.lock().await;
        match table.get_mut(&req_id) {
            Some(Pending { partial: PendingReply::Snapshot(snapshot), .. }) => {
                snapshot.apply_tick(tick_type, price);
                true
            }
            _ => false,
        }
    }

    /// Resolve the request with what has been accumulated
    pub async fn complete(&self, req_id: ReqId) -> bool {
        match self.inner.lock().await.remove(&req_id) {
            Some(pending) => {
                // Receiver may already be gone after a timeout
                let _ = pending.reply.send(Ok(pending.partial));
                true
            }
            None => false,
        }
    }

    /// Resolve the request early with a gateway error
    pub async fn fail(&self, req_id: ReqId, code: i32, message: &str) -> bool {
        match self.inner.lock().await.remove(&req_id) {
            Some(pending) => {
                let _ = pending
                    .reply
                    .send(Err(TradingError::GatewayError(format!("[{}] {}", code, message))));
                true
            }
            None => false,
        }
    }

    /// Drop the request and hand back whatever arrived so far
    pub async fn abandon(&self, req_id: ReqId) -> Option<PendingReply> {
        self.inner.lock().await.remove(&req_id).map(|p| p.partial)
    }

    pub async fn contains(&self, req_id: ReqId) -> bool {
        self.inner.lock().await.contains_key(&req_id)
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Request/response layer over the asynchronous gateway
pub struct GatewaySession {
    gateway: Arc<RwLock<dyn Gateway>>,
    pending: PendingRequests,
    next_req_id: AtomicI64,
    resolve_timeout: Duration,
    snapshot_timeout: Duration,
}

impl GatewaySession {
    pub fn new(gateway: Arc<RwLock<dyn Gateway>>, pending: PendingRequests, config: &GatewayConfig) -> Self {
        GatewaySession {
            gateway,
            pending,
            next_req_id: AtomicI64::new(FIRST_REQ_ID),
            resolve_timeout: config.resolve_timeout(),
            snapshot_timeout: config.snapshot_timeout(),
        }
    }

    pub fn pending(&self) -> &PendingRequests {
        &self.pending
    }

    /// Connect and return the first usable order id
    pub async fn connect(&self, config: &GatewayConfig) -> Result<u64, TradingError> {
        let mut gateway = self.gateway.write().await;
        gateway.connect(&config.host, config.port, config.client_id).await?;
        log::info!(
            "Connected to gateway {}:{} (client id {})",
            config.host,
            config.port,
            config.client_id
        );
        gateway
            .next_valid_id()
            .ok_or_else(|| TradingError::GatewayError("Gateway did not report a next valid order id".to_string()))
    }

    pub async fn disconnect(&self) -> Result<(), TradingError> {
        self.gateway.write().await.disconnect().await
    }

    fn next_req_id(&self) -> ReqId {
        self.next_req_id.fetch_add(1, Ordering::SeqCst)
    }

    async fn await_reply(
        &self,
        req_id: ReqId,
        receiver: oneshot::Receiver<Result<PendingReply, TradingError>>,
        wait: Duration,
    ) -> Result<Reply, TradingError> {
        match timeout(wait, receiver).await {
            Ok(Ok(reply)) => reply.map(Reply::Complete),
            Ok(Err(_)) => Err(TradingError::GatewayError(format!("Request {} was dropped", req_id))),
            Err(_) => Ok(Reply::TimedOut(self.pending.abandon(req_id).await)),
        }
    }
}

#[async_trait]
impl ContractResolver for GatewaySession {
    async fn resolve(&self, spec: &ContractSpec) -> Result<ResolvedContract, TradingError> {
        let req_id = self.next_req_id();
        let receiver = self.pending.register_contracts(req_id).await;

        if let Err(e) = self.gateway.read().await.req_contract_details(req_id, spec).await {
            self.pending.abandon(req_id).await;
            return Err(e);
        }

        let matches = match self.await_reply(req_id, receiver, self.resolve_timeout).await? {
            Reply::Complete(PendingReply::Contracts(found)) if !found.is_empty() => found,
            Reply::Complete(_) => return Err(TradingError::ContractNotFound(spec.to_string())),
            Reply::TimedOut(Some(PendingReply::Contracts(found))) if !found.is_empty() => {
                log::debug!("Contract details for {} timed out; using {} partial match(es)", spec, found.len());
                found
            }
            Reply::TimedOut(_) => return Err(TradingError::Timeout(format!("contract details for {}", spec))),
        };

        if matches.len() > 1 {
            log::warn!(
                "{} contracts match {}; using the first ({})",
                matches.len(),
                spec,
                matches[0]
            );
        }

        matches
            .into_iter()
            .next()
            .ok_or_else(|| TradingError::ContractNotFound(spec.to_string()))
    }
}

#[async_trait]
impl QuoteSource for GatewaySession {
    async fn snapshot(&self, contract: &ResolvedContract) -> Result<MarketSnapshot, TradingError> {
        let req_id = self.next_req_id();
        let receiver = self.pending.register_snapshot(req_id).await;

        if let Err(e) = self.gateway.read().await.req_market_snapshot(req_id, contract).await {
            self.pending.abandon(req_id).await;
            return Err(e);
        }

        match self.await_reply(req_id, receiver, self.snapshot_timeout).await? {
            Reply::Complete(PendingReply::Snapshot(snapshot)) => Ok(snapshot),
            Reply::Complete(_) => Ok(MarketSnapshot::default()),
            Reply::TimedOut(partial) => {
                log::debug!("Snapshot for {} timed out; using partial quote", contract);
                if let Err(e) = self.gateway.read().await.cancel_market_data(req_id).await {
                    log::warn!("Failed to cancel market data request {}: {}", req_id, e);
                }
                match partial {
                    Some(PendingReply::Snapshot(snapshot)) => Ok(snapshot),
                    _ => Ok(MarketSnapshot::default()),
                }
            }
        }
    }
}
