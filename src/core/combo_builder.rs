/**
* filename : combo_builder
* author : HAMA
* date: 2025. 5. 8.
* description: 
**/

use crate::error::TradingError;
use crate::models::combo::ComboSpecification;
use crate::models::leg::Leg;
use crate::utils::math::gcd_multiple;

/// 콤보 명세 생성기
///
/// 다리 비율을 최대공약수로 나누어 서로소 비율로 만들고, 그 최대공약수를 콤보 수량으로 쓴다.
pub struct ComboBuilder;

impl ComboBuilder {
  /// 다리 목록으로 콤보 명세 생성
  pub fn build(legs: Vec<Leg>) -> Result<ComboSpecification, TradingError> {
    let first = legs.first().ok_or(TradingError::EmptyLegs)?;
    let underlying = first.underlying.clone();
    let action = first.action;

    for (leg_index, leg) in legs.iter().enumerate() {
      if leg.underlying != underlying {
        return Err(TradingError::MismatchedUnderlying {
          leg_index,
          expected: underlying,
          found: leg.underlying.clone(),
        });
      }
      if leg.ratio == 0 {
        return Err(TradingError::InvalidRatio { leg_index });
      }
    }

    // 단일 다리: 비율이 곧 수량
    if legs.len() == 1 {
      let quantity = legs[0].ratio;
      return Ok(ComboSpecification::new(legs, action, quantity));
    }

    let ratios: Vec<u32> = legs.iter().map(|leg| leg.ratio).collect();
    let g = match gcd_multiple(&ratios) {
      0 => 1,
      g => g,
    };

    let reduced = legs.iter().map(|leg| leg.with_ratio(leg.ratio / g)).collect();
    Ok(ComboSpecification::new(reduced, action, g))
  }
}
