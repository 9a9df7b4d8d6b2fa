/**
* filename : price_chaser
* author : HAMA
* date: 2025. 5. 8.
* description:
**/

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;

use crate::config::ChaseConfig;
use crate::core::order_registry::OrderRegistry;
use crate::error::TradingError;
use crate::gateway::traits::Gateway;
use crate::models::order::{OrderId, OrderType, TerminalReason};
use crate::utils::logging;
use crate::utils::math::approx_eq;

/// 가격 비교 허용 오차
pub const PRICE_EPSILON: f64 = 1e-10;

/// 가격 추격 파라미터
#[derive(Debug, Clone, PartialEq)]
pub struct ChaseParams {
  /// 틱당 가격 변경 폭 (양수)
  pub step: f64,
  /// 목표 가격
  pub final_price: f64,
  /// 틱 간격
  pub interval: Duration,
  pub epsilon: f64,
  /// 목표가 도달 시 추격 종료
  pub stop_on_converge: bool,
  /// 직전 간격에 체결이 늘었으면 한 틱 쉬기
  pub hold_on_partial_fill: bool,
}

impl ChaseParams {
  pub fn new(step: f64, final_price: f64, interval: Duration) -> Self {
    ChaseParams {
      step,
      final_price,
      interval,
      epsilon: PRICE_EPSILON,
      stop_on_converge: false,
      hold_on_partial_fill: false,
    }
  }

  pub fn from_config(step: f64, final_price: f64, config: &ChaseConfig) -> Self {
    ChaseParams {
      step,
      final_price,
      interval: config.interval(),
      epsilon: config.epsilon,
      stop_on_converge: config.stop_on_converge,
      hold_on_partial_fill: config.hold_on_partial_fill,
    }
  }

  pub fn with_interval(mut self, interval: Duration) -> Self {
    self.interval = interval;
    self
  }

  pub fn with_stop_on_converge(mut self, stop: bool) -> Self {
    self.stop_on_converge = stop;
    self
  }

  pub fn with_hold_on_partial_fill(mut self, hold: bool) -> Self {
    self.hold_on_partial_fill = hold;
    self
  }

  pub fn validate(&self) -> Result<(), TradingError> {
    if !self.step.is_finite() || self.step <= 0.0 {
      return Err(TradingError::InvalidParameter(format!("Chase step must be positive, got {}", self.step)));
    }
    if !self.final_price.is_finite() {
      return Err(TradingError::InvalidParameter("Chase target price must be finite".to_string()));
    }
    if self.interval.is_zero() {
      return Err(TradingError::InvalidParameter("Chase interval must be non-zero".to_string()));
    }
    if !self.epsilon.is_finite() || self.epsilon <= 0.0 {
      return Err(TradingError::InvalidParameter("Chase epsilon must be positive".to_string()));
    }
    Ok(())
  }
}

/// 한 틱의 가격 결정
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PriceStep {
  Amend(f64),
  Converged,
}

/// 다음 지정가 계산
///
/// 목표 방향으로 `step`만큼 이동하되 목표를 넘지 않는다. 목표와 `epsilon` 이내면 목표가로 맞춘다.
pub fn next_price(current: f64, final_price: f64, step: f64, epsilon: f64) -> PriceStep {
  if approx_eq(current, final_price, epsilon) {
    return PriceStep::Converged;
  }

  let direction = if final_price > current { 1.0 } else { -1.0 };
  let mut candidate = current + direction * step;

  if (direction > 0.0 && candidate > final_price) || (direction < 0.0 && candidate < final_price) {
    candidate = final_price;
  }
  if approx_eq(candidate, final_price, epsilon) {
    candidate = final_price;
  }
  if approx_eq(candidate, current, epsilon) {
    return PriceStep::Converged;
  }

  PriceStep::Amend(candidate)
}

/// 추격 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChaseState {
  Active,
  Converged,
  Terminal(TerminalReason),
}

/// 추격 종료 사유
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ChaseOutcome {
  Filled,
  Cancelled,
  /// 목표가에 도달한 채로 종료 (`stop_on_converge`)
  Converged,
  /// 취소 토큰으로 중지
  Stopped,
  /// 가격 변경 요청 실패, 주문은 마지막 정상 가격에 남는다
  AmendFailed(String),
  /// 저장소에서 주문이 사라짐
  OrderMissing,
}

impl fmt::Display for ChaseOutcome {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ChaseOutcome::AmendFailed(reason) => write!(f, "AmendFailed({})", reason),
      other => write!(f, "{:?}", other),
    }
  }
}

/// 추격 결과 요약
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChaseReport {
  pub order_id: OrderId,
  pub outcome: ChaseOutcome,
  /// 마지막으로 확인된 지정가
  pub last_price: Option<f64>,
  /// 성공한 가격 변경 횟수
  pub amendments: u32,
  pub average_fill_price: Option<f64>,
}

/// 지정가 추격기
///
/// 일정 간격마다 주문 상태를 확인하고, 살아 있으면 지정가를 목표 방향으로 한 단계 옮겨
/// 같은 주문 ID로 다시 제출한다.
pub struct PriceChaser {
  /// 게이트웨이 인스턴스
  gateway: Arc<RwLock<dyn Gateway>>,
  /// 주문 저장소
  registry: OrderRegistry,
  order_id: OrderId,
  params: ChaseParams,
  state: ChaseState,
  amendments: u32,
  /// 마지막으로 본 체결 수량
  last_filled: f64,
}

impl PriceChaser {
  /// 추격기 생성 (시장가 주문이나 지정가가 없는 주문은 추격할 수 없다)
  pub async fn new(
    gateway: Arc<RwLock<dyn Gateway>>,
    registry: OrderRegistry,
    order_id: OrderId,
    params: ChaseParams,
  ) -> Result<Self, TradingError> {
    params.validate()?;

    let record = registry.get(order_id).await.ok_or(TradingError::OrderNotFound(order_id))?;
    if record.order_type == OrderType::Market || record.limit_price.is_none() {
      return Err(TradingError::InvalidParameter(format!(
        "Order {} has no limit price to chase",
        order_id
      )));
    }

    Ok(PriceChaser {
      gateway,
      registry,
      order_id,
      params,
      state: ChaseState::Active,
      amendments: 0,
      last_filled: record.status.filled,
    })
  }

  pub fn order_id(&self) -> OrderId {
    self.order_id
  }

  pub fn state(&self) -> ChaseState {
    self.state
  }

  pub fn amendments(&self) -> u32 {
    self.amendments
  }

  /// 한 틱 평가 (대기 없이)
  ///
  /// 주문이 사라졌으면 `OrderNotFound`, 가격 변경이 실패하면 게이트웨이 오류를 돌려준다.
  pub async fn tick(&mut self) -> Result<ChaseState, TradingError> {
    if let ChaseState::Terminal(_) = self.state {
      return Ok(self.state);
    }

    let record = self
      .registry
      .get(self.order_id)
      .await
      .ok_or(TradingError::OrderNotFound(self.order_id))?;

    if let Some(reason) = record.status.terminal_reason() {
      match reason {
        TerminalReason::Filled => {
          logging::log_order_filled(self.order_id, record.status.filled, record.average_fill_price())
        }
        TerminalReason::Cancelled => logging::log_order_cancelled(self.order_id),
      }
      self.state = ChaseState::Terminal(reason);
      return Ok(self.state);
    }

    let filled = record.status.filled;
    let new_fill = filled > self.last_filled;
    if new_fill {
      logging::log_partial_fill(self.order_id, filled, record.status.remaining, record.last_fill_price());
      self.last_filled = filled;
      if self.params.hold_on_partial_fill {
        log::debug!("Order {} filled partially; holding price this tick", self.order_id);
        return Ok(self.state);
      }
    }

    let current = record
      .limit_price
      .ok_or_else(|| TradingError::InvalidParameter(format!("Order {} lost its limit price", self.order_id)))?;

    let price = match next_price(current, self.params.final_price, self.params.step, self.params.epsilon) {
      PriceStep::Converged => {
        if self.state != ChaseState::Converged {
          log::info!("Order {} reached target price {:.2}; waiting for fill", self.order_id, current);
        }
        self.state = ChaseState::Converged;
        return Ok(self.state);
      }
      PriceStep::Amend(price) => price,
    };

    let previous = self.registry.update_price(self.order_id, price).await?;
    let params = record.params().with_limit_price(price);
    let amended = {
      let gateway = self.gateway.read().await;
      gateway.place_order(self.order_id, &record.contract, &params).await
    };

    if let Err(e) = amended {
      let restore = previous.unwrap_or(current);
      if let Err(rollback) = self.registry.update_price(self.order_id, restore).await {
        log::debug!("Could not restore price of order {}: {}", self.order_id, rollback);
      }
      logging::log_error(&format!("amending order {} to {:.2}", self.order_id, price), &e);
      return Err(e);
    }

    self.amendments += 1;
    logging::log_price_amended(
      self.order_id,
      current,
      price,
      approx_eq(price, self.params.final_price, self.params.epsilon),
    );
    self.state = ChaseState::Active;
    Ok(self.state)
  }

  /// 종료 조건까지 추격 (매 틱마다 먼저 대기)
  pub async fn run(mut self, token: CancellationToken) -> ChaseReport {
    log::info!(
      "Chasing order {} toward {:.2} by {} every {:?}",
      self.order_id,
      self.params.final_price,
      self.params.step,
      self.params.interval
    );

    let outcome = loop {
      tokio::select! {
        biased;
        _ = token.cancelled() => break ChaseOutcome::Stopped,
        _ = sleep(self.params.interval) => {}
      }

      match self.tick().await {
        Ok(ChaseState::Terminal(TerminalReason::Filled)) => break ChaseOutcome::Filled,
        Ok(ChaseState::Terminal(TerminalReason::Cancelled)) => break ChaseOutcome::Cancelled,
        Ok(ChaseState::Converged) if self.params.stop_on_converge => break ChaseOutcome::Converged,
        Ok(_) => {}
        Err(TradingError::OrderNotFound(_)) => break ChaseOutcome::OrderMissing,
        Err(e) => break ChaseOutcome::AmendFailed(e.to_string()),
      }
    };

    let record = match outcome {
      ChaseOutcome::Filled | ChaseOutcome::Cancelled => self.registry.remove(self.order_id).await,
      _ => self.registry.get(self.order_id).await,
    };

    let report = ChaseReport {
      order_id: self.order_id,
      outcome,
      last_price: record.as_ref().and_then(|r| r.limit_price),
      amendments: self.amendments,
      average_fill_price: record.as_ref().and_then(|r| r.average_fill_price()),
    };
    logging::log_chase_finished(&report);
    report
  }
}
