/**
* filename : config
* author : HAMA
* date: 2025. 5. 8.
* description:
**/

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::TradingError;
use crate::models::ticket::OrderTicket;
use crate::utils::{millis_to_duration, secs_to_duration};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub gateway: GatewayConfig,
    pub chase: ChaseConfig,
    pub logging: LoggingConfig,
    pub ticket: Option<OrderTicket>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub client_id: i32,
    /// Bounded wait for contract details
    pub resolve_timeout_ms: u64,
    /// Bounded wait for a one-shot quote
    pub snapshot_timeout_ms: u64,
    /// Route orders to the in-process simulated gateway
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChaseConfig {
    /// Seconds between price steps
    pub interval_secs: f64,
    /// Price equality tolerance
    pub epsilon: f64,
    /// Stop the chase task once the price sits at the target instead of idling until fill
    pub stop_on_converge: bool,
    /// Skip the price step for an interval in which new fills arrived
    pub hold_on_partial_fill: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig {
            host: "127.0.0.1".to_string(),
            port: 7496,
            client_id: 1,
            resolve_timeout_ms: 5000,
            snapshot_timeout_ms: 5000,
            dry_run: true,
        }
    }
}

impl Default for ChaseConfig {
    fn default() -> Self {
        ChaseConfig {
            interval_secs: 5.0,
            epsilon: 1e-10,
            stop_on_converge: false,
            hold_on_partial_fill: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
        }
    }
}

impl GatewayConfig {
    pub fn resolve_timeout(&self) -> Duration {
        millis_to_duration(self.resolve_timeout_ms)
    }

    pub fn snapshot_timeout(&self) -> Duration {
        millis_to_duration(self.snapshot_timeout_ms)
    }
}

impl ChaseConfig {
    pub fn interval(&self) -> Duration {
        secs_to_duration(self.interval_secs)
    }
}

impl Config {
    /// Load configuration from `config.{json,toml,yaml}` in the working directory
    pub fn load() -> Result<Self, TradingError> {
        Self::load_from("config")
    }

    /// Defaults, then the optional file named by `path`, then environment overrides
    pub fn load_from(path: &str) -> Result<Self, TradingError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .build()?;

        let mut cfg: Config = settings.try_deserialize()?;
        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Apply environment variable overrides for runtime fields
    fn apply_env_overrides(&mut self) {
        use std::env;
        if let Ok(v) = env::var("GATEWAY_HOST") {
            if !v.is_empty() {
                self.gateway.host = v;
            }
        }
        if let Ok(v) = env::var("GATEWAY_PORT") {
            match v.parse() {
                Ok(port) => self.gateway.port = port,
                Err(_) => log::warn!("Ignoring invalid GATEWAY_PORT={}", v),
            }
        }
        if let Ok(v) = env::var("GATEWAY_CLIENT_ID") {
            match v.parse() {
                Ok(id) => self.gateway.client_id = id,
                Err(_) => log::warn!("Ignoring invalid GATEWAY_CLIENT_ID={}", v),
            }
        }
        if let Ok(v) = env::var("CHASE_INTERVAL_SECS") {
            match v.parse() {
                Ok(secs) => self.chase.interval_secs = secs,
                Err(_) => log::warn!("Ignoring invalid CHASE_INTERVAL_SECS={}", v),
            }
        }
        if let Ok(v) = env::var("DRY_RUN") {
            self.gateway.dry_run = parse_flag(&v).unwrap_or(self.gateway.dry_run);
        }
        if let Ok(v) = env::var("CHASE_STOP_ON_CONVERGE") {
            match parse_flag(&v) {
                Some(flag) => self.chase.stop_on_converge = flag,
                None => log::warn!("Ignoring invalid CHASE_STOP_ON_CONVERGE={}", v),
            }
        }
    }

    pub fn validate(&self) -> Result<(), TradingError> {
        if !self.chase.interval_secs.is_finite() || self.chase.interval_secs <= 0.0 {
            return Err(TradingError::ConfigError(format!(
                "chase.interval_secs must be positive, got {}",
                self.chase.interval_secs
            )));
        }
        if !self.chase.epsilon.is_finite() || self.chase.epsilon <= 0.0 {
            return Err(TradingError::ConfigError("chase.epsilon must be positive".to_string()));
        }
        if self.gateway.resolve_timeout_ms == 0 || self.gateway.snapshot_timeout_ms == 0 {
            return Err(TradingError::ConfigError("gateway timeouts must be non-zero".to_string()));
        }
        if let Some(ticket) = &self.ticket {
            ticket
                .validate()
                .map_err(|e| TradingError::ConfigError(format!("ticket: {}", e)))?;
        }
        Ok(())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
