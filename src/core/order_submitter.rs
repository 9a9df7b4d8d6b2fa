/**
* filename : order_submitter
* author : HAMA
* date: 2025. 5. 8.
* description:
**/

use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::core::order_registry::OrderRegistry;
use crate::error::TradingError;
use crate::gateway::traits::{ContractResolver, Gateway};
use crate::models::combo::ComboSpecification;
use crate::models::contract::{ComboLeg, OrderContract, ResolvedContract};
use crate::models::order::{OrderId, OrderParams, OrderRecord, OrderType};
use crate::utils::logging;

/// 주문 제출기
///
/// 다리별 계약을 확정하고 주문 ID를 발급한 뒤 게이트웨이에 주문을 낸다.
pub struct OrderSubmitter {
  /// 게이트웨이 인스턴스
  gateway: Arc<RwLock<dyn Gateway>>,
  /// 계약 확인기
  resolver: Arc<dyn ContractResolver>,
  /// 주문 저장소
  registry: OrderRegistry,
  /// 다음 주문 ID
  next_id: Mutex<u64>,
}

impl OrderSubmitter {
  pub fn new(
    gateway: Arc<RwLock<dyn Gateway>>,
    resolver: Arc<dyn ContractResolver>,
    registry: OrderRegistry,
    first_order_id: u64,
  ) -> Self {
    OrderSubmitter {
      gateway,
      resolver,
      registry,
      next_id: Mutex::new(first_order_id),
    }
  }

  pub fn registry(&self) -> &OrderRegistry {
    &self.registry
  }

  /// 주문 제출
  ///
  /// 지정가 주문은 유한한 가격이 필요하다. 계약 확인에 실패하면 아무 주문도 내지 않는다.
  pub async fn submit(
    &self,
    spec: &ComboSpecification,
    order_type: OrderType,
    limit_price: Option<f64>,
  ) -> Result<OrderId, TradingError> {
    let params = match (order_type, limit_price) {
      (OrderType::Limit, Some(price)) if price.is_finite() => {
        OrderParams::limit(spec.action(), spec.quantity(), price)
      }
      (OrderType::Limit, _) => {
        return Err(TradingError::InvalidParameter(
          "Limit orders require a finite limit price".to_string(),
        ));
      }
      (OrderType::Market, price) => {
        if price.is_some() {
          log::warn!("Ignoring limit price on a market order");
        }
        OrderParams::market(spec.action(), spec.quantity())
      }
    };

    let resolved = self.resolve_legs(spec).await?;
    let contract = Self::order_contract(spec, &resolved);

    let order_id = self.allocate_id().await;
    self
      .registry
      .insert(OrderRecord::new(order_id, spec.clone(), contract.clone(), &params))
      .await;

    let placed = {
      let gateway = self.gateway.read().await;
      gateway.place_order(order_id, &contract, &params).await
    };

    if let Err(e) = placed {
      self.registry.remove(order_id).await;
      logging::log_error(&format!("placing order {}", order_id), &e);
      return Err(e);
    }

    logging::log_order_submitted(order_id, &contract.to_string(), &params);
    Ok(order_id)
  }

  /// 모든 다리의 계약 확정 (하나라도 실패하면 해당 다리 번호와 함께 실패)
  pub async fn resolve_legs(&self, spec: &ComboSpecification) -> Result<Vec<ResolvedContract>, TradingError> {
    let mut resolved = Vec::with_capacity(spec.legs().len());
    for (leg_index, leg) in spec.legs().iter().enumerate() {
      let contract = self
        .resolver
        .resolve(&leg.contract_spec())
        .await
        .map_err(|e| TradingError::ResolutionFailed {
          leg_index,
          reason: e.to_string(),
        })?;
      log::debug!("Leg {} ({}) resolved to {}", leg_index, leg, contract);
      resolved.push(contract);
    }
    Ok(resolved)
  }

  /// 단일 다리는 해당 계약, 그 외에는 BAG 콤보 계약
  pub fn order_contract(spec: &ComboSpecification, resolved: &[ResolvedContract]) -> OrderContract {
    if !spec.is_combo() {
      if let Some(contract) = resolved.first() {
        return OrderContract::Single(contract.clone());
      }
    }

    let legs = spec
      .legs()
      .iter()
      .zip(resolved.iter())
      .map(|(leg, contract)| ComboLeg {
        con_id: contract.con_id,
        ratio: leg.ratio,
        action: leg.action,
        exchange: if contract.exchange.is_empty() {
          leg.exchange().to_string()
        } else {
          contract.exchange.clone()
        },
      })
      .collect();

    OrderContract::Combo {
      symbol: spec.underlying().to_string(),
      currency: resolved
        .first()
        .map(|c| c.currency.clone())
        .unwrap_or_else(|| spec.legs()[0].currency().to_string()),
      exchange: spec.legs()[0].exchange().to_string(),
      legs,
    }
  }

  async fn allocate_id(&self) -> OrderId {
    let mut next = self.next_id.lock().await;
    let id = OrderId(*next);
    *next += 1;
    id
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::core::combo_builder::ComboBuilder;
  use crate::gateway::traits::{MockContractResolver, MockGateway};
  use crate::models::contract::ContractSpec;
  use crate::models::leg::{Action, Leg, OptionRight};

  fn resolved_from(spec: &ContractSpec) -> ResolvedContract {
    ResolvedContract {
      con_id: (spec.strike * 10.0) as i64,
      symbol: spec.symbol.clone(),
      sec_type: spec.sec_type.clone(),
      expiry: spec.expiry.clone(),
      strike: spec.strike,
      right: Some(spec.right),
      exchange: spec.exchange.clone(),
      currency: spec.currency.clone(),
      multiplier: Some(spec.multiplier.clone()),
      local_symbol: None,
    }
  }

  fn vertical() -> ComboSpecification {
    ComboBuilder::build(vec![
      Leg::new("UVXY", "20250307", 17.5, OptionRight::Put, Action::Sell, 2),
      Leg::new("UVXY", "20250307", 16.0, OptionRight::Put, Action::Buy, 2),
    ])
    .unwrap()
    .with_action(Action::Buy)
  }

  fn resolver_ok() -> Arc<dyn ContractResolver> {
    let mut resolver = MockContractResolver::new();
    resolver.expect_resolve().returning(|spec| Ok(resolved_from(spec)));
    Arc::new(resolver)
  }

  #[tokio::test]
  async fn test_submit_places_bag_combo() {
    let mut gateway = MockGateway::new();
    gateway
      .expect_place_order()
      .withf(|order_id, contract, params| {
        let bag = match contract {
          OrderContract::Combo { symbol, legs, .. } => {
            symbol == "UVXY"
              && legs.len() == 2
              && legs[0].con_id == 175
              && legs[0].ratio == 1
              && legs[0].action == Action::Sell
              && legs[1].con_id == 160
              && legs[1].action == Action::Buy
          }
          _ => false,
        };
        *order_id == OrderId(10)
          && bag
          && params.action == Action::Buy
          && params.total_quantity == 2
          && params.limit_price == Some(-0.35)
      })
      .times(1)
      .returning(|_, _, _| Ok(()));
    let gateway: Arc<RwLock<dyn Gateway>> = Arc::new(RwLock::new(gateway));

    let registry = OrderRegistry::new();
    let submitter = OrderSubmitter::new(gateway, resolver_ok(), registry.clone(), 10);

    let id = submitter.submit(&vertical(), OrderType::Limit, Some(-0.35)).await.unwrap();
    assert_eq!(id, OrderId(10));

    let record = registry.get(id).await.unwrap();
    assert_eq!(record.limit_price, Some(-0.35));
    assert_eq!(record.contract.sec_type(), "BAG");
  }

  #[tokio::test]
  async fn test_resolution_failure_places_nothing() {
    let mut resolver = MockContractResolver::new();
    resolver.expect_resolve().returning(|spec| {
      if spec.strike == 16.0 {
        Err(TradingError::ContractNotFound(spec.to_string()))
      } else {
        Ok(resolved_from(spec))
      }
    });

    let mut gateway = MockGateway::new();
    gateway.expect_place_order().times(0);
    let gateway: Arc<RwLock<dyn Gateway>> = Arc::new(RwLock::new(gateway));

    let registry = OrderRegistry::new();
    let submitter = OrderSubmitter::new(gateway, Arc::new(resolver), registry.clone(), 1);

    let result = submitter.submit(&vertical(), OrderType::Limit, Some(-0.35)).await;
    assert!(matches!(result, Err(TradingError::ResolutionFailed { leg_index: 1, .. })));
    assert!(registry.is_empty().await);
    assert_eq!(submitter.allocate_id().await, OrderId(1));
  }

  #[tokio::test]
  async fn test_limit_without_price_rejected() {
    let mut gateway = MockGateway::new();
    gateway.expect_place_order().times(0);
    let gateway: Arc<RwLock<dyn Gateway>> = Arc::new(RwLock::new(gateway));
    let submitter = OrderSubmitter::new(gateway, resolver_ok(), OrderRegistry::new(), 1);

    let missing = submitter.submit(&vertical(), OrderType::Limit, None).await;
    assert!(matches!(missing, Err(TradingError::InvalidParameter(_))));
    let nan = submitter.submit(&vertical(), OrderType::Limit, Some(f64::NAN)).await;
    assert!(matches!(nan, Err(TradingError::InvalidParameter(_))));
  }

  #[tokio::test]
  async fn test_placement_error_removes_record() {
    let mut gateway = MockGateway::new();
    gateway
      .expect_place_order()
      .returning(|_, _, _| Err(TradingError::NotConnected));
    let gateway: Arc<RwLock<dyn Gateway>> = Arc::new(RwLock::new(gateway));

    let registry = OrderRegistry::new();
    let submitter = OrderSubmitter::new(gateway, resolver_ok(), registry.clone(), 1);
    let result = submitter.submit(&vertical(), OrderType::Limit, Some(-0.35)).await;
    assert!(matches!(result, Err(TradingError::NotConnected)));
    assert!(registry.is_empty().await);
  }

  #[tokio::test]
  async fn test_single_leg_market_order() {
    let mut gateway = MockGateway::new();
    gateway
      .expect_place_order()
      .withf(|_, contract, params| {
        matches!(contract, OrderContract::Single(c) if c.con_id == 5600)
          && params.order_type == OrderType::Market
          && params.limit_price.is_none()
          && params.total_quantity == 3
      })
      .times(1)
      .returning(|_, _, _| Ok(()));
    let gateway: Arc<RwLock<dyn Gateway>> = Arc::new(RwLock::new(gateway));

    let spec = ComboBuilder::build(vec![Leg::new("XSP", "20250321", 560.0, OptionRight::Call, Action::Buy, 3)]).unwrap();
    let submitter = OrderSubmitter::new(gateway, resolver_ok(), OrderRegistry::new(), 1);
    assert!(submitter.submit(&spec, OrderType::Market, None).await.is_ok());
  }

  #[tokio::test]
  async fn test_ids_are_unique_under_concurrency() {
    let mut gateway = MockGateway::new();
    gateway.expect_place_order().returning(|_, _, _| Ok(()));
    let gateway: Arc<RwLock<dyn Gateway>> = Arc::new(RwLock::new(gateway));

    let submitter = Arc::new(OrderSubmitter::new(gateway, resolver_ok(), OrderRegistry::new(), 100));
    let handles: Vec<_> = (0..8)
      .map(|_| {
        let submitter = submitter.clone();
        tokio::spawn(async move { submitter.submit(&vertical(), OrderType::Limit, Some(-0.30)).await.unwrap() })
      })
      .collect();

    let mut ids = Vec::new();
    for handle in handles {
      ids.push(handle.await.unwrap());
    }
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 8);
    assert_eq!(submitter.registry().len().await, 8);
  }
}
