/**
* filename : snapshot_aggregator
* author : HAMA
* date: 2025. 5. 8.
* description:
**/

use futures::future::join_all;
use std::fmt::Write as _;
use std::sync::Arc;

use crate::gateway::traits::{ContractResolver, QuoteSource};
use crate::models::contract::ResolvedContract;
use crate::models::leg::Leg;
use crate::models::market_data::MarketSnapshot;

/// 다리별 호가와 추정 비용
#[derive(Debug, Clone, PartialEq)]
pub struct LegQuote {
  pub leg: Leg,
  pub contract: Option<ResolvedContract>,
  pub snapshot: MarketSnapshot,
  pub signed_quantity: f64,
  pub multiplier: f64,
}

impl LegQuote {
  pub fn mid(&self) -> Option<f64> {
    self.snapshot.mid()
  }

  /// mid × 승수 × 부호 있는 수량
  pub fn cost(&self) -> Option<f64> {
    self.mid().map(|mid| mid * self.multiplier * self.signed_quantity)
  }
}

/// 주문 전 비용 추정 (참고용)
#[derive(Debug, Clone, PartialEq)]
pub struct CostEstimate {
  pub legs: Vec<LegQuote>,
  /// 호가가 있는 다리들의 비용 합계
  pub net_estimate: Option<f64>,
}

fn price_or_dash(price: Option<f64>) -> String {
  price.map(|p| format!("{:.2}", p)).unwrap_or_else(|| "-".to_string())
}

impl CostEstimate {
  pub fn from_legs(legs: Vec<LegQuote>) -> Self {
    let costs: Vec<f64> = legs.iter().filter_map(|leg| leg.cost()).collect();
    let net_estimate = if costs.is_empty() { None } else { Some(costs.iter().sum()) };
    CostEstimate { legs, net_estimate }
  }

  /// 운영자 확인용 요약 문자열
  pub fn summary(&self) -> String {
    let mut out = String::new();
    for quote in &self.legs {
      let _ = write!(out, "  {:<32}", quote.leg.to_string());
      match quote.cost() {
        Some(cost) => {
          let _ = writeln!(
            out,
            " bid {:>7} ask {:>7} last {:>7} mid {:>7} cost {:>10.2}",
            price_or_dash(quote.snapshot.bid),
            price_or_dash(quote.snapshot.ask),
            price_or_dash(quote.snapshot.last),
            price_or_dash(quote.mid()),
            cost
          );
        }
        None => {
          let _ = writeln!(out, " no quote");
        }
      }
    }
    match self.net_estimate {
      Some(net) => {
        let _ = write!(out, "  Net estimate: {:.2}", net);
      }
      None => {
        let _ = write!(out, "  Net estimate: unavailable");
      }
    }
    out
  }
}

/// 다리별 스냅샷 수집기
pub struct MarketSnapshotAggregator {
  resolver: Arc<dyn ContractResolver>,
  quotes: Arc<dyn QuoteSource>,
}

impl MarketSnapshotAggregator {
  pub fn new(resolver: Arc<dyn ContractResolver>, quotes: Arc<dyn QuoteSource>) -> Self {
    MarketSnapshotAggregator { resolver, quotes }
  }

  /// 모든 다리의 호가를 동시에 받아 비용 추정
  ///
  /// 계약 확인이나 호가 요청이 실패한 다리는 호가 없음으로 처리한다.
  pub async fn estimate<F>(&self, legs: &[Leg], signed_quantity: F) -> CostEstimate
  where
    F: Fn(&Leg) -> f64,
  {
    let quotes = join_all(legs.iter().map(|leg| {
      let quantity = signed_quantity(leg);
      self.quote_leg(leg, quantity)
    }))
    .await;
    CostEstimate::from_legs(quotes)
  }

  async fn quote_leg(&self, leg: &Leg, signed_quantity: f64) -> LegQuote {
    let mut quote = LegQuote {
      leg: leg.clone(),
      contract: None,
      snapshot: MarketSnapshot::default(),
      signed_quantity,
      multiplier: leg.multiplier_value(),
    };

    let contract = match self.resolver.resolve(&leg.contract_spec()).await {
      Ok(contract) => contract,
      Err(e) => {
        log::warn!("No quote for {}: {}", leg, e);
        return quote;
      }
    };

    match self.quotes.snapshot(&contract).await {
      Ok(snapshot) => quote.snapshot = snapshot,
      Err(e) => log::warn!("No quote for {}: {}", leg, e),
    }
    if let Some(multiplier) = contract.multiplier_value() {
      quote.multiplier = multiplier;
    }
    quote.contract = Some(contract);
    quote
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::TradingError;
  use crate::gateway::traits::{MockContractResolver, MockQuoteSource};
  use crate::models::contract::ContractSpec;
  use crate::models::leg::{Action, OptionRight};

  fn resolved(spec: &ContractSpec) -> ResolvedContract {
    ResolvedContract {
      con_id: (spec.strike * 100.0) as i64,
      symbol: spec.symbol.clone(),
      sec_type: spec.sec_type.clone(),
      expiry: spec.expiry.clone(),
      strike: spec.strike,
      right: Some(spec.right),
      exchange: spec.exchange.clone(),
      currency: spec.currency.clone(),
      multiplier: Some("100".to_string()),
      local_symbol: None,
    }
  }

  fn legs() -> Vec<Leg> {
    vec![
      Leg::new("UVXY", "20250307", 17.5, OptionRight::Put, Action::Sell, 1),
      Leg::new("UVXY", "20250307", 16.0, OptionRight::Put, Action::Buy, 1),
    ]
  }

  #[tokio::test]
  async fn test_net_estimate_sums_signed_costs() {
    let mut resolver = MockContractResolver::new();
    resolver.expect_resolve().returning(|spec| Ok(resolved(spec)));
    let mut quotes = MockQuoteSource::new();
    quotes.expect_snapshot().returning(|contract| {
      if contract.strike == 17.5 {
        Ok(MarketSnapshot::new(Some(1.00), Some(1.10), None))
      } else {
        Ok(MarketSnapshot::new(Some(0.60), Some(0.70), None))
      }
    });

    let aggregator = MarketSnapshotAggregator::new(Arc::new(resolver), Arc::new(quotes));
    let estimate = aggregator.estimate(&legs(), |leg| leg.signed_quantity(1)).await;

    assert_eq!(estimate.legs.len(), 2);
    assert!((estimate.legs[0].cost().unwrap() + 105.0).abs() < 1e-9);
    assert!((estimate.legs[1].cost().unwrap() - 65.0).abs() < 1e-9);
    assert!((estimate.net_estimate.unwrap() + 40.0).abs() < 1e-9);
    assert!(estimate.summary().contains("Net estimate: -40.00"));
  }

  #[tokio::test]
  async fn test_failed_leg_has_no_quote() {
    let mut resolver = MockContractResolver::new();
    resolver.expect_resolve().returning(|spec| {
      if spec.strike == 16.0 {
        Err(TradingError::ContractNotFound(spec.to_string()))
      } else {
        Ok(resolved(spec))
      }
    });
    let mut quotes = MockQuoteSource::new();
    quotes
      .expect_snapshot()
      .times(1)
      .returning(|_| Ok(MarketSnapshot::new(None, None, Some(0.80))));

    let aggregator = MarketSnapshotAggregator::new(Arc::new(resolver), Arc::new(quotes));
    let estimate = aggregator.estimate(&legs(), |leg| leg.signed_quantity(2)).await;

    assert!(estimate.legs[1].contract.is_none());
    assert_eq!(estimate.legs[1].cost(), None);
    assert!((estimate.net_estimate.unwrap() + 160.0).abs() < 1e-9);
    assert!(estimate.summary().contains("no quote"));
  }

  #[tokio::test]
  async fn test_no_quotes_at_all() {
    let mut resolver = MockContractResolver::new();
    resolver.expect_resolve().returning(|spec| Ok(resolved(spec)));
    let mut quotes = MockQuoteSource::new();
    quotes.expect_snapshot().returning(|_| Ok(MarketSnapshot::default()));

    let aggregator = MarketSnapshotAggregator::new(Arc::new(resolver), Arc::new(quotes));
    let estimate = aggregator.estimate(&legs(), |leg| leg.signed_quantity(1)).await;
    assert_eq!(estimate.net_estimate, None);
    assert!(estimate.summary().ends_with("Net estimate: unavailable"));
  }
}
