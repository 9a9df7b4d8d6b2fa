use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::ChaseConfig;
use crate::core::price_chaser::ChaseParams;
use crate::error::TradingError;
use crate::models::leg::{Action, Leg, OptionRight};
use crate::models::order::OrderType;
use crate::utils::secs_to_duration;

fn default_ratio() -> u32 {
    1
}

fn default_quantity() -> u32 {
    1
}

fn default_order_type() -> OrderType {
    OrderType::Limit
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TicketLeg {
    pub expiry: String,
    pub strike: f64,
    pub right: OptionRight,
    pub action: Action,
    #[serde(default = "default_ratio")]
    pub ratio: u32,
    #[serde(default)]
    pub exchange: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub multiplier: Option<String>,
}

/// Operator-supplied parameter set for one chased order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderTicket {
    pub underlying: String,
    pub legs: Vec<TicketLeg>,
    /// Combo direction; defaults to the first leg's action
    #[serde(default)]
    pub action: Option<Action>,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default = "default_order_type")]
    pub order_type: OrderType,
    pub initial_price: f64,
    pub step: f64,
    pub final_price: f64,
    /// Seconds between price steps; falls back to `chase.interval_secs`
    #[serde(default)]
    pub interval_secs: Option<f64>,
}

impl OrderTicket {
    /// Legs with the ticket quantity folded into each ratio, ready for `ComboBuilder`
    pub fn legs(&self) -> Result<Vec<Leg>, TradingError> {
        let quantity = self.quantity.max(1);
        self.legs
            .iter()
            .enumerate()
            .map(|(leg_index, t)| {
                let ratio = t.ratio.checked_mul(quantity).ok_or_else(|| {
                    TradingError::InvalidParameter(format!(
                        "Leg {} ratio {} times quantity {} overflows",
                        leg_index, t.ratio, quantity
                    ))
                })?;
                Ok(Leg {
                    underlying: self.underlying.clone(),
                    expiry: t.expiry.clone(),
                    strike: t.strike,
                    right: t.right,
                    action: t.action,
                    ratio,
                    exchange: t.exchange.clone(),
                    currency: t.currency.clone(),
                    multiplier: t.multiplier.clone(),
                })
            })
            .collect()
    }

    pub fn interval(&self, chase: &ChaseConfig) -> Duration {
        secs_to_duration(self.interval_secs.unwrap_or(chase.interval_secs))
    }

    pub fn chase_params(&self, chase: &ChaseConfig) -> ChaseParams {
        ChaseParams::from_config(self.step, self.final_price, chase).with_interval(self.interval(chase))
    }

    pub fn validate(&self) -> Result<(), TradingError> {
        if self.underlying.trim().is_empty() {
            return Err(TradingError::InvalidParameter("Ticket underlying is empty".to_string()));
        }
        if self.legs.is_empty() {
            return Err(TradingError::EmptyLegs);
        }
        if self.quantity == 0 {
            return Err(TradingError::InvalidParameter("Ticket quantity must be positive".to_string()));
        }
        if !self.step.is_finite() || self.step <= 0.0 {
            return Err(TradingError::InvalidParameter(format!("Price step must be positive, got {}", self.step)));
        }
        if !self.initial_price.is_finite() || !self.final_price.is_finite() {
            return Err(TradingError::InvalidParameter("Ticket prices must be finite".to_string()));
        }
        self.legs().map(|_| ())
    }
}
