use serde::{Deserialize, Serialize};

/// Price tick kinds the core consumes; everything else is ignored
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TickType {
    Bid,
    Ask,
    Last,
    Other(i32),
}

impl TickType {
    /// Gateway tick codes (live 1/2/4, delayed 66/67/68)
    pub fn from_code(code: i32) -> Self {
        match code {
            1 | 66 => TickType::Bid,
            2 | 67 => TickType::Ask,
            4 | 68 => TickType::Last,
            other => TickType::Other(other),
        }
    }
}

/// One-shot quote for a single instrument
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MarketSnapshot {
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    pub last: Option<f64>,
}

impl MarketSnapshot {
    pub fn new(bid: Option<f64>, ask: Option<f64>, last: Option<f64>) -> Self {
        MarketSnapshot { bid, ask, last }
    }

    pub fn apply_tick(&mut self, tick_type: TickType, price: f64) {
        match tick_type {
            TickType::Bid => self.bid = Some(price),
            TickType::Ask => self.ask = Some(price),
            TickType::Last => self.last = Some(price),
            TickType::Other(_) => {}
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bid.is_none() && self.ask.is_none() && self.last.is_none()
    }

    /// (bid+ask)/2 when both are positive, else last; the gateway's -1 placeholder counts as absent
    pub fn mid(&self) -> Option<f64> {
        match (self.bid, self.ask) {
            (Some(bid), Some(ask)) if bid > 0.0 && ask > 0.0 => Some((bid + ask) / 2.0),
            _ => self.last.filter(|last| last.is_finite() && *last > 0.0),
        }
    }
}
