use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::leg::{Action, OptionRight};

/// Abstract instrument description sent to the contract master
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContractSpec {
    pub symbol: String,
    pub sec_type: String,
    pub expiry: String,
    pub strike: f64,
    pub right: OptionRight,
    pub exchange: String,
    pub currency: String,
    pub multiplier: String,
}

impl fmt::Display for ContractSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}{} @{}",
            self.symbol, self.sec_type, self.expiry, self.strike, self.right, self.exchange
        )
    }
}

/// Uniquely identified tradable instrument returned by the contract master
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResolvedContract {
    pub con_id: i64,
    pub symbol: String,
    pub sec_type: String,
    pub expiry: String,
    pub strike: f64,
    pub right: Option<OptionRight>,
    pub exchange: String,
    pub currency: String,
    pub multiplier: Option<String>,
    pub local_symbol: Option<String>,
}

impl ResolvedContract {
    pub fn multiplier_value(&self) -> Option<f64> {
        self.multiplier
            .as_deref()
            .and_then(|m| m.trim().parse::<f64>().ok())
            .filter(|m| *m > 0.0)
    }
}

impl fmt::Display for ResolvedContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.local_symbol {
            Some(local) => write!(f, "{} (conId={})", local, self.con_id),
            None => write!(
                f,
                "{} {} {}{} (conId={})",
                self.symbol,
                self.expiry,
                self.strike,
                self.right.map(|r| r.as_str()).unwrap_or(""),
                self.con_id
            ),
        }
    }
}

/// One leg of a BAG contract
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComboLeg {
    pub con_id: i64,
    pub ratio: u32,
    pub action: Action,
    pub exchange: String,
}

/// What a placement request is sent against
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum OrderContract {
    Single(ResolvedContract),
    Combo {
        symbol: String,
        currency: String,
        exchange: String,
        legs: Vec<ComboLeg>,
    },
}

impl OrderContract {
    pub fn sec_type(&self) -> &str {
        match self {
            OrderContract::Single(contract) => &contract.sec_type,
            OrderContract::Combo { .. } => "BAG",
        }
    }
}

impl fmt::Display for OrderContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderContract::Single(contract) => write!(f, "{}", contract),
            OrderContract::Combo { symbol, legs, .. } => {
                write!(f, "{} BAG [", symbol)?;
                for (i, leg) in legs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} {}x{}", leg.action, leg.ratio, leg.con_id)?;
                }
                write!(f, "]")
            }
        }
    }
}
