/**
* filename : order_registry
* author : HAMA
* date: 2025. 5. 8.
* description: 
**/

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::TradingError;
use crate::models::execution::Execution;
use crate::models::order::{OrderId, OrderRecord, StatusSnapshot};

/// 주문 상태 저장소
///
/// 복제 가능한 핸들이며 모든 복제본이 같은 맵을 공유한다.
/// 콜백 디스패처가 쓰고 가격 추격 태스크가 읽는다.
#[derive(Clone, Default)]
pub struct OrderRegistry {
  orders: Arc<RwLock<HashMap<OrderId, OrderRecord>>>,
}

impl OrderRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// 주문 등록 (같은 ID가 있으면 교체)
  pub async fn insert(&self, record: OrderRecord) {
    self.orders.write().await.insert(record.id, record);
  }

  /// 주문 조회 (복사본)
  pub async fn get(&self, id: OrderId) -> Option<OrderRecord> {
    self.orders.read().await.get(&id).cloned()
  }

  pub async fn contains(&self, id: OrderId) -> bool {
    self.orders.read().await.contains_key(&id)
  }

  /// 상태 스냅샷 덮어쓰기 (마지막 쓰기 우선)
  pub async fn update_status(&self, id: OrderId, snapshot: StatusSnapshot) -> Result<(), TradingError> {
    let mut orders = self.orders.write().await;
    let record = orders.get_mut(&id).ok_or(TradingError::OrderNotFound(id))?;
    record.status = snapshot;
    record.updated_at = Utc::now();
    Ok(())
  }

  /// 지정가만 변경하고 이전 지정가를 돌려준다
  pub async fn update_price(&self, id: OrderId, price: f64) -> Result<Option<f64>, TradingError> {
    let mut orders = self.orders.write().await;
    let record = orders.get_mut(&id).ok_or(TradingError::OrderNotFound(id))?;
    let previous = record.limit_price.replace(price);
    record.updated_at = Utc::now();
    Ok(previous)
  }

  /// 체결 내역 추가 (같은 체결 ID는 한 번만)
  pub async fn record_execution(&self, execution: Execution) -> Result<(), TradingError> {
    let mut orders = self.orders.write().await;
    let record = orders
      .get_mut(&execution.order_id)
      .ok_or(TradingError::OrderNotFound(execution.order_id))?;

    if record.executions.iter().any(|e| e.exec_id == execution.exec_id) {
      log::debug!("Duplicate execution {} for order {}", execution.exec_id, record.id);
      return Ok(());
    }
    record.executions.push(execution);
    record.updated_at = Utc::now();
    Ok(())
  }

  pub async fn remove(&self, id: OrderId) -> Option<OrderRecord> {
    self.orders.write().await.remove(&id)
  }

  /// 종료되지 않은 주문 ID 목록 (오름차순)
  pub async fn active_orders(&self) -> Vec<OrderId> {
    let orders = self.orders.read().await;
    let mut ids: Vec<OrderId> = orders
      .values()
      .filter(|record| !record.is_terminal())
      .map(|record| record.id)
      .collect();
    ids.sort();
    ids
  }

  pub async fn len(&self) -> usize {
    self.orders.read().await.len()
  }

  pub async fn is_empty(&self) -> bool {
    self.orders.read().await.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::core::combo_builder::ComboBuilder;
  use crate::models::contract::{OrderContract, ResolvedContract};
  use crate::models::leg::{Action, Leg, OptionRight};
  use crate::models::order::{OrderParams, OrderStatus};

  fn record(id: u64) -> OrderRecord {
    let leg = Leg::new("UVXY", "20250307", 17.5, OptionRight::Put, Action::Sell, 1);
    let spec = ComboBuilder::build(vec![leg]).unwrap();
    let contract = OrderContract::Single(ResolvedContract {
      con_id: 1,
      symbol: "UVXY".to_string(),
      sec_type: "OPT".to_string(),
      expiry: "20250307".to_string(),
      strike: 17.5,
      right: Some(OptionRight::Put),
      exchange: "SMART".to_string(),
      currency: "USD".to_string(),
      multiplier: Some("100".to_string()),
      local_symbol: None,
    });
    OrderRecord::new(OrderId(id), spec, contract, &OrderParams::limit(Action::Sell, 1, 0.80))
  }

  #[tokio::test]
  async fn test_update_price_touches_only_limit() {
    let registry = OrderRegistry::new();
    registry.insert(record(1)).await;

    let previous = registry.update_price(OrderId(1), 0.79).await.unwrap();
    assert_eq!(previous, Some(0.80));

    let updated = registry.get(OrderId(1)).await.unwrap();
    assert_eq!(updated.limit_price, Some(0.79));
    assert_eq!(updated.total_quantity, 1);
    assert_eq!(updated.status.status, OrderStatus::PendingSubmit);
  }

  #[tokio::test]
  async fn test_status_last_write_wins() {
    let registry = OrderRegistry::new();
    registry.insert(record(2)).await;

    registry
      .update_status(OrderId(2), StatusSnapshot::new(OrderStatus::Submitted, 0.0, 1.0))
      .await
      .unwrap();
    registry
      .update_status(OrderId(2), StatusSnapshot::new(OrderStatus::Filled, 1.0, 0.0))
      .await
      .unwrap();

    let updated = registry.get(OrderId(2)).await.unwrap();
    assert_eq!(updated.status.status, OrderStatus::Filled);
    assert!(registry.active_orders().await.is_empty());
  }

  #[tokio::test]
  async fn test_unknown_order() {
    let registry = OrderRegistry::new();
    let result = registry.update_status(OrderId(5), StatusSnapshot::pending(1)).await;
    assert!(matches!(result, Err(TradingError::OrderNotFound(OrderId(5)))));
    assert!(registry.update_price(OrderId(5), 1.0).await.is_err());
  }

  #[tokio::test]
  async fn test_executions_deduplicated_and_averaged() {
    let registry = OrderRegistry::new();
    registry.insert(record(3)).await;

    registry.record_execution(Execution::new("a", OrderId(3), 1.0, 2.20)).await.unwrap();
    registry.record_execution(Execution::new("b", OrderId(3), 2.0, 2.18)).await.unwrap();
    registry.record_execution(Execution::new("b", OrderId(3), 2.0, 2.18)).await.unwrap();

    let updated = registry.get(OrderId(3)).await.unwrap();
    assert_eq!(updated.executions.len(), 2);
    let avg = updated.average_fill_price().unwrap();
    assert!((avg - 2.18666).abs() < 1e-4);
  }

  #[tokio::test]
  async fn test_concurrent_updates_from_clones() {
    let registry = OrderRegistry::new();
    for id in 0..10 {
      registry.insert(record(id)).await;
    }

    let handles: Vec<_> = (0..10)
      .map(|id| {
        let registry = registry.clone();
        tokio::spawn(async move {
          registry.update_price(OrderId(id), 1.0 + id as f64).await.unwrap();
        })
      })
      .collect();
    for handle in handles {
      handle.await.unwrap();
    }

    assert_eq!(registry.len().await, 10);
    assert_eq!(registry.get(OrderId(9)).await.unwrap().limit_price, Some(10.0));
    assert_eq!(registry.active_orders().await.len(), 10);
  }
}
