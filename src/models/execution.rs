use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::order::OrderId;
use crate::utils::math::weighted_average;

/// Single fill reported by the execution-detail callback
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Execution {
    pub exec_id: String,
    pub order_id: OrderId,
    pub shares: f64,
    pub price: f64,
    pub time: DateTime<Utc>,
}

impl Execution {
    pub fn new(exec_id: impl Into<String>, order_id: OrderId, shares: f64, price: f64) -> Self {
        Execution {
            exec_id: exec_id.into(),
            order_id,
            shares,
            price,
            time: Utc::now(),
        }
    }
}

/// `Σ(price·shares) / Σ(shares)`, absent when nothing was filled
pub fn average_fill_price(executions: &[Execution]) -> Option<f64> {
    let prices: Vec<f64> = executions.iter().map(|e| e.price).collect();
    let shares: Vec<f64> = executions.iter().map(|e| e.shares).collect();
    weighted_average(&prices, &shares)
}
