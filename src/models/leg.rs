use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TradingError;
use crate::models::contract::ContractSpec;

pub const DEFAULT_EXCHANGE: &str = "SMART";
pub const DEFAULT_CURRENCY: &str = "USD";
pub const DEFAULT_MULTIPLIER: f64 = 100.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Buy,
    Sell,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Buy => "BUY",
            Action::Sell => "SELL",
        }
    }

    /// Cost sign: buying pays (+1), selling receives (-1)
    pub fn sign(&self) -> f64 {
        match self {
            Action::Buy => 1.0,
            Action::Sell => -1.0,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Action {
    type Err = TradingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BUY" | "BOT" => Ok(Action::Buy),
            "SELL" | "SLD" => Ok(Action::Sell),
            other => Err(TradingError::InvalidParameter(format!("Unknown action: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum OptionRight {
    #[serde(rename = "C", alias = "CALL", alias = "Call")]
    Call,
    #[serde(rename = "P", alias = "PUT", alias = "Put")]
    Put,
}

impl OptionRight {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptionRight::Call => "C",
            OptionRight::Put => "P",
        }
    }
}

impl fmt::Display for OptionRight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OptionRight {
    type Err = TradingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "C" | "CALL" => Ok(OptionRight::Call),
            "P" | "PUT" => Ok(OptionRight::Put),
            other => Err(TradingError::InvalidParameter(format!("Unknown option right: {}", other))),
        }
    }
}

/// One option position inside a (possibly degenerate) combo order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Leg {
    pub underlying: String,
    /// Expiry as `YYYYMMDD`
    pub expiry: String,
    pub strike: f64,
    pub right: OptionRight,
    pub action: Action,
    pub ratio: u32,
    pub exchange: Option<String>,
    pub currency: Option<String>,
    pub multiplier: Option<String>,
}

impl Leg {
    pub fn new(
        underlying: impl Into<String>,
        expiry: impl Into<String>,
        strike: f64,
        right: OptionRight,
        action: Action,
        ratio: u32,
    ) -> Self {
        Leg {
            underlying: underlying.into(),
            expiry: expiry.into(),
            strike,
            right,
            action,
            ratio,
            exchange: None,
            currency: None,
            multiplier: None,
        }
    }

    pub fn with_exchange(mut self, exchange: impl Into<String>) -> Self {
        self.exchange = Some(exchange.into());
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }

    pub fn with_multiplier(mut self, multiplier: impl Into<String>) -> Self {
        self.multiplier = Some(multiplier.into());
        self
    }

    pub fn exchange(&self) -> &str {
        self.exchange.as_deref().unwrap_or(DEFAULT_EXCHANGE)
    }

    pub fn currency(&self) -> &str {
        self.currency.as_deref().unwrap_or(DEFAULT_CURRENCY)
    }

    /// Contract multiplier, falling back to 100 when absent or unparsable
    pub fn multiplier_value(&self) -> f64 {
        self.multiplier
            .as_deref()
            .and_then(|m| m.trim().parse::<f64>().ok())
            .filter(|m| *m > 0.0)
            .unwrap_or(DEFAULT_MULTIPLIER)
    }

    /// Signed contract count for this leg when the combo is traded `combo_quantity` times
    pub fn signed_quantity(&self, combo_quantity: u32) -> f64 {
        self.ratio as f64 * combo_quantity as f64 * self.action.sign()
    }

    pub(crate) fn with_ratio(&self, ratio: u32) -> Self {
        Leg { ratio, ..self.clone() }
    }

    /// Lookup description handed to the contract resolver
    pub fn contract_spec(&self) -> ContractSpec {
        ContractSpec {
            symbol: self.underlying.clone(),
            sec_type: "OPT".to_string(),
            expiry: self.expiry.clone(),
            strike: self.strike,
            right: self.right,
            exchange: self.exchange().to_string(),
            currency: self.currency().to_string(),
            multiplier: self
                .multiplier
                .clone()
                .unwrap_or_else(|| format!("{}", DEFAULT_MULTIPLIER as u32)),
        }
    }
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {}{}",
            self.action, self.ratio, self.underlying, self.expiry, self.strike, self.right
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_parsing_and_sign() {
        assert_eq!("buy".parse::<Action>().unwrap(), Action::Buy);
        assert_eq!("SELL".parse::<Action>().unwrap(), Action::Sell);
        assert!("HOLD".parse::<Action>().is_err());
        assert_eq!(Action::Buy.sign(), 1.0);
        assert_eq!(Action::Sell.sign(), -1.0);
    }

    #[test]
    fn test_leg_defaults() {
        let leg = Leg::new("UVXY", "20250307", 17.5, OptionRight::Put, Action::Sell, 2);
        assert_eq!(leg.exchange(), "SMART");
        assert_eq!(leg.currency(), "USD");
        assert_eq!(leg.multiplier_value(), 100.0);
        assert_eq!(leg.signed_quantity(3), -6.0);

        let spec = leg.contract_spec();
        assert_eq!(spec.sec_type, "OPT");
        assert_eq!(spec.multiplier, "100");
        assert_eq!(spec.right, OptionRight::Put);
    }

    #[test]
    fn test_leg_overrides() {
        let leg = Leg::new("XSP", "20250321", 560.0, OptionRight::Call, Action::Buy, 1)
            .with_exchange("CBOE")
            .with_multiplier("10");
        assert_eq!(leg.exchange(), "CBOE");
        assert_eq!(leg.multiplier_value(), 10.0);
        assert_eq!(leg.to_string(), "BUY 1 XSP 20250321 560C");
    }

    #[test]
    fn test_right_serde() {
        let right: OptionRight = serde_json::from_str("\"P\"").unwrap();
        assert_eq!(right, OptionRight::Put);
        let right: OptionRight = serde_json::from_str("\"CALL\"").unwrap();
        assert_eq!(right, OptionRight::Call);
        let action: Action = serde_json::from_str("\"SELL\"").unwrap();
        assert_eq!(action, Action::Sell);
    }
}
