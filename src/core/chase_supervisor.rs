/**
* filename : chase_supervisor
* author : HAMA
* date: 2025. 5. 8.
* description:
**/

use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::order_registry::OrderRegistry;
use crate::core::price_chaser::{ChaseParams, ChaseReport, PriceChaser};
use crate::error::TradingError;
use crate::gateway::traits::Gateway;
use crate::models::order::OrderId;

struct ChaseTask {
  token: CancellationToken,
  handle: JoinHandle<ChaseReport>,
}

/// 가격 추격 태스크 관리자
///
/// 주문마다 하나의 추격 태스크를 띄우고, 개별 중지와 전체 종료 시 합류를 맡는다.
pub struct ChaseSupervisor {
  gateway: Arc<RwLock<dyn Gateway>>,
  registry: OrderRegistry,
  /// 모든 추격 토큰의 부모
  shutdown: CancellationToken,
  tasks: Mutex<HashMap<OrderId, ChaseTask>>,
}

impl ChaseSupervisor {
  pub fn new(gateway: Arc<RwLock<dyn Gateway>>, registry: OrderRegistry) -> Self {
    ChaseSupervisor {
      gateway,
      registry,
      shutdown: CancellationToken::new(),
      tasks: Mutex::new(HashMap::new()),
    }
  }

  /// 종료 토큰 (취소하면 모든 추격이 멈춘다)
  pub fn shutdown_token(&self) -> CancellationToken {
    self.shutdown.clone()
  }

  /// 추격 시작
  pub async fn start(&self, order_id: OrderId, params: ChaseParams) -> Result<(), TradingError> {
    let mut tasks = self.tasks.lock().await;
    if let Some(task) = tasks.get(&order_id) {
      if !task.handle.is_finished() {
        return Err(TradingError::AlreadyRunning(format!("Chase for order {}", order_id)));
      }
    }

    let chaser = PriceChaser::new(self.gateway.clone(), self.registry.clone(), order_id, params).await?;
    let token = self.shutdown.child_token();
    let handle = tokio::spawn(chaser.run(token.clone()));

    if let Some(stale) = tasks.insert(order_id, ChaseTask { token, handle }) {
      // 이미 끝난 이전 추격의 결과는 버린다
      stale.token.cancel();
    }
    log::debug!("Chase task started for order {}", order_id);
    Ok(())
  }

  /// 추격 중지 후 결과 반환
  pub async fn stop(&self, order_id: OrderId) -> Result<ChaseReport, TradingError> {
    let task = self.take(order_id).await?;
    task.token.cancel();
    Self::finish(order_id, task.handle).await
  }

  /// 추격이 스스로 끝날 때까지 대기
  pub async fn join(&self, order_id: OrderId) -> Result<ChaseReport, TradingError> {
    let task = self.take(order_id).await?;
    Self::finish(order_id, task.handle).await
  }

  /// 모든 추격 합류 (주문 ID 순)
  pub async fn join_all(&self) -> Vec<ChaseReport> {
    let mut drained: Vec<(OrderId, ChaseTask)> = self.tasks.lock().await.drain().collect();
    drained.sort_by_key(|(id, _)| *id);

    let results = join_all(
      drained
        .into_iter()
        .map(|(order_id, task)| Self::finish(order_id, task.handle)),
    )
    .await;

    results
      .into_iter()
      .filter_map(|result| match result {
        Ok(report) => Some(report),
        Err(e) => {
          log::error!("{}", e);
          None
        }
      })
      .collect()
  }

  /// 모든 추격 중지 후 합류
  pub async fn shutdown(&self) -> Vec<ChaseReport> {
    log::info!("Stopping all chase tasks");
    self.shutdown.cancel();
    self.join_all().await
  }

  /// 실행 중인 추격의 주문 ID 목록
  pub async fn active_chases(&self) -> Vec<OrderId> {
    let tasks = self.tasks.lock().await;
    let mut ids: Vec<OrderId> = tasks
      .iter()
      .filter(|(_, task)| !task.handle.is_finished())
      .map(|(id, _)| *id)
      .collect();
    ids.sort();
    ids
  }

  async fn take(&self, order_id: OrderId) -> Result<ChaseTask, TradingError> {
    self
      .tasks
      .lock()
      .await
      .remove(&order_id)
      .ok_or_else(|| TradingError::TaskNotFound(format!("No chase for order {}", order_id)))
  }

  async fn finish(order_id: OrderId, handle: JoinHandle<ChaseReport>) -> Result<ChaseReport, TradingError> {
    handle
      .await
      .map_err(|e| TradingError::TaskFailed(format!("Chase for order {} panicked or was aborted: {}", order_id, e)))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::core::combo_builder::ComboBuilder;
  use crate::core::price_chaser::ChaseOutcome;
  use crate::gateway::traits::MockGateway;
  use crate::models::contract::{OrderContract, ResolvedContract};
  use crate::models::leg::{Action, Leg, OptionRight};
  use crate::models::order::{OrderParams, OrderRecord};
  use std::time::Duration;

  async fn setup(ids: &[u64]) -> ChaseSupervisor {
    let mut gateway = MockGateway::new();
    gateway.expect_place_order().returning(|_, _, _| Ok(()));
    let gateway: Arc<RwLock<dyn Gateway>> = Arc::new(RwLock::new(gateway));

    let registry = OrderRegistry::new();
    for id in ids {
      let leg = Leg::new("XSP", "20250321", 560.0, OptionRight::Put, Action::Sell, 1);
      let spec = ComboBuilder::build(vec![leg]).unwrap();
      let contract = OrderContract::Single(ResolvedContract {
        con_id: 9,
        symbol: "XSP".to_string(),
        sec_type: "OPT".to_string(),
        expiry: "20250321".to_string(),
        strike: 560.0,
        right: Some(OptionRight::Put),
        exchange: "SMART".to_string(),
        currency: "USD".to_string(),
        multiplier: None,
        local_symbol: None,
      });
      let params = OrderParams::limit(Action::Sell, 1, 3.00);
      registry.insert(OrderRecord::new(OrderId(*id), spec, contract, &params)).await;
    }
    ChaseSupervisor::new(gateway, registry)
  }

  fn slow() -> ChaseParams {
    ChaseParams::new(0.05, 2.00, Duration::from_secs(60))
  }

  #[tokio::test]
  async fn test_start_twice_is_rejected() {
    let supervisor = setup(&[1]).await;
    supervisor.start(OrderId(1), slow()).await.unwrap();
    let again = supervisor.start(OrderId(1), slow()).await;
    assert!(matches!(again, Err(TradingError::AlreadyRunning(_))));
    assert_eq!(supervisor.active_chases().await, vec![OrderId(1)]);

    let report = supervisor.stop(OrderId(1)).await.unwrap();
    assert_eq!(report.outcome, ChaseOutcome::Stopped);
    assert!(supervisor.active_chases().await.is_empty());
  }

  #[tokio::test]
  async fn test_stop_unknown_task() {
    let supervisor = setup(&[]).await;
    assert!(matches!(supervisor.stop(OrderId(3)).await, Err(TradingError::TaskNotFound(_))));
  }

  #[tokio::test]
  async fn test_start_unknown_order() {
    let supervisor = setup(&[]).await;
    let result = supervisor.start(OrderId(8), slow()).await;
    assert!(matches!(result, Err(TradingError::OrderNotFound(OrderId(8)))));
  }

  #[tokio::test]
  async fn test_shutdown_stops_every_chase() {
    let supervisor = setup(&[1, 2, 3]).await;
    for id in 1..=3 {
      supervisor.start(OrderId(id), slow()).await.unwrap();
    }

    let reports = supervisor.shutdown().await;
    assert_eq!(reports.len(), 3);
    assert!(reports.iter().all(|r| r.outcome == ChaseOutcome::Stopped));
    assert_eq!(reports[0].order_id, OrderId(1));
    assert!(supervisor.shutdown_token().is_cancelled());
  }

  #[tokio::test]
  async fn test_join_converged_chase() {
    let supervisor = setup(&[1]).await;
    let params = ChaseParams::new(0.50, 2.00, Duration::from_millis(5)).with_stop_on_converge(true);
    supervisor.start(OrderId(1), params).await.unwrap();

    let report = supervisor.join(OrderId(1)).await.unwrap();
    assert_eq!(report.outcome, ChaseOutcome::Converged);
    assert_eq!(report.amendments, 2);
    assert_eq!(report.last_price, Some(2.00));
  }
}
