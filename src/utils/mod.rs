//! 공용 유틸리티
//!
//! 로깅, 수학, 시간 보조 함수

pub mod logging;
pub mod math;

use std::time::Duration;

/// 초 단위 실수를 Duration으로 변환 (음수/NaN은 0)
pub fn secs_to_duration(secs: f64) -> Duration {
  if secs.is_finite() && secs > 0.0 {
    Duration::from_secs_f64(secs)
  } else {
    Duration::ZERO
  }
}

/// 밀리초를 Duration으로 변환
pub fn millis_to_duration(millis: u64) -> Duration {
  Duration::from_millis(millis)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_secs_to_duration() {
    assert_eq!(secs_to_duration(5.0), Duration::from_secs(5));
    assert_eq!(secs_to_duration(0.25), Duration::from_millis(250));
    assert_eq!(secs_to_duration(-1.0), Duration::ZERO);
    assert_eq!(secs_to_duration(f64::NAN), Duration::ZERO);
  }

  #[test]
  fn test_millis_to_duration() {
    assert_eq!(millis_to_duration(3000), Duration::from_secs(3));
  }
}
