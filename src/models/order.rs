use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::combo::ComboSpecification;
use crate::models::contract::OrderContract;
use crate::models::execution::{average_fill_price, Execution};
use crate::models::leg::Action;

/// Session-unique order identity handed out by the submitter
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderType {
    #[serde(alias = "MKT")]
    Market,
    #[serde(alias = "LMT")]
    Limit,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Market => "MKT",
            OrderType::Limit => "LMT",
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Broker-reported order state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum OrderStatus {
    PendingSubmit,
    PreSubmitted,
    Submitted,
    PendingCancel,
    Filled,
    Cancelled,
    Inactive,
    Unknown(String),
}

impl OrderStatus {
    /// Map the gateway's status string, tolerating its cancel spellings
    pub fn from_broker(status: &str) -> Self {
        match status.trim() {
            "PendingSubmit" | "ApiPending" => OrderStatus::PendingSubmit,
            "PreSubmitted" => OrderStatus::PreSubmitted,
            "Submitted" => OrderStatus::Submitted,
            "PendingCancel" => OrderStatus::PendingCancel,
            "Filled" => OrderStatus::Filled,
            "Cancelled" | "Canceled" | "ApiCancelled" | "ApiCanceled" => OrderStatus::Cancelled,
            "Inactive" => OrderStatus::Inactive,
            other => OrderStatus::Unknown(other.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Filled | OrderStatus::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Unknown(raw) => write!(f, "Unknown({})", raw),
            other => write!(f, "{:?}", other),
        }
    }
}

/// Why an order stopped being live
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TerminalReason {
    Filled,
    Cancelled,
}

/// Latest status callback for one order; overwritten wholesale on every update
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusSnapshot {
    pub status: OrderStatus,
    pub filled: f64,
    pub remaining: f64,
    pub avg_fill_price: Option<f64>,
    pub last_fill_price: Option<f64>,
}

impl StatusSnapshot {
    /// Snapshot held between submission and the first broker callback
    pub fn pending(total_quantity: u32) -> Self {
        StatusSnapshot {
            status: OrderStatus::PendingSubmit,
            filled: 0.0,
            remaining: total_quantity as f64,
            avg_fill_price: None,
            last_fill_price: None,
        }
    }

    pub fn new(status: OrderStatus, filled: f64, remaining: f64) -> Self {
        StatusSnapshot {
            status,
            filled,
            remaining,
            avg_fill_price: None,
            last_fill_price: None,
        }
    }

    pub fn with_avg_fill_price(mut self, price: f64) -> Self {
        self.avg_fill_price = Some(price);
        self
    }

    pub fn with_last_fill_price(mut self, price: f64) -> Self {
        self.last_fill_price = Some(price);
        self
    }

    /// Terminal if the broker says so, or nothing is left to fill
    pub fn terminal_reason(&self) -> Option<TerminalReason> {
        match self.status {
            OrderStatus::Filled => Some(TerminalReason::Filled),
            OrderStatus::Cancelled => Some(TerminalReason::Cancelled),
            _ if self.remaining <= 0.0 => Some(TerminalReason::Filled),
            _ => None,
        }
    }
}

/// Parameters sent with every placement or amendment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderParams {
    pub action: Action,
    pub order_type: OrderType,
    pub total_quantity: u32,
    pub limit_price: Option<f64>,
}

impl OrderParams {
    pub fn limit(action: Action, total_quantity: u32, limit_price: f64) -> Self {
        OrderParams {
            action,
            order_type: OrderType::Limit,
            total_quantity,
            limit_price: Some(limit_price),
        }
    }

    pub fn market(action: Action, total_quantity: u32) -> Self {
        OrderParams {
            action,
            order_type: OrderType::Market,
            total_quantity,
            limit_price: None,
        }
    }

    pub fn with_limit_price(&self, limit_price: f64) -> Self {
        OrderParams {
            limit_price: Some(limit_price),
            ..self.clone()
        }
    }
}

/// Tracked order. Only `limit_price`, `status` and `executions` change after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: OrderId,
    pub spec: ComboSpecification,
    pub contract: OrderContract,
    pub action: Action,
    pub order_type: OrderType,
    pub limit_price: Option<f64>,
    pub total_quantity: u32,
    pub status: StatusSnapshot,
    pub executions: Vec<Execution>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderRecord {
    pub fn new(id: OrderId, spec: ComboSpecification, contract: OrderContract, params: &OrderParams) -> Self {
        let now = Utc::now();
        OrderRecord {
            id,
            spec,
            contract,
            action: params.action,
            order_type: params.order_type,
            limit_price: params.limit_price,
            total_quantity: params.total_quantity,
            status: StatusSnapshot::pending(params.total_quantity),
            executions: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn params(&self) -> OrderParams {
        OrderParams {
            action: self.action,
            order_type: self.order_type,
            total_quantity: self.total_quantity,
            limit_price: self.limit_price,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.terminal_reason().is_some()
    }

    /// Reported average, or the execution-weighted average when the report is zero/absent
    pub fn average_fill_price(&self) -> Option<f64> {
        match self.status.avg_fill_price {
            Some(avg) if avg != 0.0 => Some(avg),
            _ => average_fill_price(&self.executions),
        }
    }

    /// Most recent fill price, from the status callback or the execution log
    pub fn last_fill_price(&self) -> Option<f64> {
        self.status
            .last_fill_price
            .filter(|p| *p != 0.0)
            .or_else(|| self.executions.last().map(|e| e.price))
            .or(self.status.avg_fill_price.filter(|p| *p != 0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_broker_spellings() {
        assert_eq!(OrderStatus::from_broker("Filled"), OrderStatus::Filled);
        assert_eq!(OrderStatus::from_broker("Cancelled"), OrderStatus::Cancelled);
        assert_eq!(OrderStatus::from_broker("ApiCanceled"), OrderStatus::Cancelled);
        assert_eq!(OrderStatus::from_broker("ApiCancelled"), OrderStatus::Cancelled);
        assert_eq!(OrderStatus::from_broker("Submitted"), OrderStatus::Submitted);
        assert_eq!(
            OrderStatus::from_broker("Weird"),
            OrderStatus::Unknown("Weird".to_string())
        );
        assert!(!OrderStatus::Submitted.is_terminal());
    }

    #[test]
    fn test_terminal_reason() {
        let pending = StatusSnapshot::pending(2);
        assert_eq!(pending.terminal_reason(), None);

        let done = StatusSnapshot::new(OrderStatus::Submitted, 2.0, 0.0);
        assert_eq!(done.terminal_reason(), Some(TerminalReason::Filled));

        let cancelled = StatusSnapshot::new(OrderStatus::Cancelled, 0.0, 2.0);
        assert_eq!(cancelled.terminal_reason(), Some(TerminalReason::Cancelled));
    }

    #[test]
    fn test_params_with_limit_price() {
        let params = OrderParams::limit(Action::Buy, 1, -0.35);
        let amended = params.with_limit_price(-0.34);
        assert_eq!(amended.limit_price, Some(-0.34));
        assert_eq!(amended.action, Action::Buy);
        assert_eq!(amended.total_quantity, 1);
        assert_eq!(OrderParams::market(Action::Sell, 3).limit_price, None);
    }
}
