//! 수학 관련 유틸리티
//!
//! 비율 정규화, 가중 평균, 가격 비교 함수

/// 두 수의 최대공약수 (유클리드 호제법)
pub fn gcd(a: u32, b: u32) -> u32 {
  if b == 0 { a } else { gcd(b, a % b) }
}

/// 여러 수의 최대공약수
///
/// 빈 목록이면 0을 반환한다.
pub fn gcd_multiple(numbers: &[u32]) -> u32 {
  numbers.iter().copied().fold(0, gcd)
}

/// 가중 평균 계산 (체결가 × 수량)
pub fn weighted_average(values: &[f64], weights: &[f64]) -> Option<f64> {
  if values.len() != weights.len() || values.is_empty() {
    return None;
  }

  let total_weight: f64 = weights.iter().sum();
  if total_weight <= 0.0 {
    return None;
  }

  let sum_vw: f64 = values.iter()
    .zip(weights.iter())
    .map(|(v, w)| v * w)
    .sum();

  Some(sum_vw / total_weight)
}

/// 두 가격이 허용 오차 내에서 같은지 확인
pub fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
  (a - b).abs() < epsilon
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_gcd() {
    assert_eq!(gcd(12, 8), 4);
    assert_eq!(gcd(7, 3), 1);
    assert_eq!(gcd(5, 0), 5);
    assert_eq!(gcd(0, 0), 0);
  }

  #[test]
  fn test_gcd_multiple() {
    assert_eq!(gcd_multiple(&[3, 1, 1]), 1);
    assert_eq!(gcd_multiple(&[2, 4]), 2);
    assert_eq!(gcd_multiple(&[6, 9, 15]), 3);
    assert_eq!(gcd_multiple(&[]), 0);
    assert_eq!(gcd_multiple(&[0, 0]), 0);
  }

  #[test]
  fn test_weighted_average() {
    let prices = vec![2.20, 2.18];
    let shares = vec![1.0, 2.0];

    let avg = weighted_average(&prices, &shares).unwrap();
    // (2.20*1 + 2.18*2) / 3 = 6.56 / 3
    assert!((avg - 2.186_666).abs() < 1e-5);

    assert!(weighted_average(&[], &[]).is_none());
    assert!(weighted_average(&[1.0], &[0.0]).is_none());
    assert!(weighted_average(&[1.0, 2.0], &[1.0]).is_none());
  }

  #[test]
  fn test_approx_eq() {
    assert!(approx_eq(0.1 + 0.2, 0.3, 1e-10));
    assert!(!approx_eq(0.30, 0.31, 1e-10));
  }
}
