//! 로깅 유틸리티
//!
//! 로그 초기화 및 주문 생명주기 로그 함수 제공

use env_logger::Builder;
use log::LevelFilter;
use std::env;

use crate::config::LoggingConfig;
use crate::core::price_chaser::ChaseReport;
use crate::error::TradingError;
use crate::models::order::{OrderId, OrderParams};

/// 로깅 시스템 초기화
///
/// `RUST_LOG`가 설정되어 있으면 설정 파일의 레벨보다 우선한다.
pub fn init(config: &LoggingConfig) -> Result<(), TradingError> {
    let mut builder = Builder::from_default_env();

    let log_level = env::var("RUST_LOG").unwrap_or_else(|_| config.level.clone());
    let level_filter = parse_level(&log_level);

    builder
        .filter_level(level_filter)
        .format_timestamp_millis()
        .try_init()
        .map_err(|e| TradingError::ConfigError(format!("Failed to initialise logger: {}", e)))?;

    log::info!("로깅 시스템 초기화 완료: 레벨 = {}", log_level);

    Ok(())
}

fn parse_level(level: &str) -> LevelFilter {
    match level.to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        "off" => LevelFilter::Off,
        _ => LevelFilter::Info,
    }
}

/// 주문 제출 로그
pub fn log_order_submitted(order_id: OrderId, contract: &str, params: &OrderParams) {
    log::info!(
        "주문 제출: {} - 계약: {} - 방향: {} - 수량: {} - 가격: {}",
        order_id,
        contract,
        params.action,
        params.total_quantity,
        params
            .limit_price
            .map(|p| format!("{:.2}", p))
            .unwrap_or_else(|| "MKT".to_string())
    );
}

/// 가격 조정 로그
pub fn log_price_amended(order_id: OrderId, from: f64, to: f64, at_final: bool) {
    log::info!(
        "가격 조정: {} - {:.2} -> {:.2}{}",
        order_id,
        from,
        to,
        if at_final { " (목표가 도달)" } else { "" }
    );
}

/// 부분 체결 로그
pub fn log_partial_fill(order_id: OrderId, filled: f64, remaining: f64, last_fill_price: Option<f64>) {
    match last_fill_price {
        Some(price) => log::info!(
            "부분 체결: {} - 체결 {} / 잔량 {} - 체결가 {:.2}",
            order_id, filled, remaining, price
        ),
        None => log::info!("부분 체결: {} - 체결 {} / 잔량 {}", order_id, filled, remaining),
    }
}

/// 주문 체결 로그
pub fn log_order_filled(order_id: OrderId, quantity: f64, average_price: Option<f64>) {
    match average_price {
        Some(price) => log::info!("주문 전량 체결: {} - 수량: {} - 평균 체결가: {:.4}", order_id, quantity, price),
        None => log::info!("주문 전량 체결: {} - 수량: {}", order_id, quantity),
    }
}

/// 주문 취소 로그
pub fn log_order_cancelled(order_id: OrderId) {
    log::info!("주문 취소: {}", order_id);
}

/// 추격 종료 로그
pub fn log_chase_finished(report: &ChaseReport) {
    log::info!(
        "가격 추격 종료: {} - 결과: {} - 조정 횟수: {} - 최종 가격: {}",
        report.order_id,
        report.outcome,
        report.amendments,
        report
            .last_price
            .map(|p| format!("{:.2}", p))
            .unwrap_or_else(|| "-".to_string())
    );
}

/// 오류 로그
pub fn log_error(context: &str, error: &TradingError) {
    log::error!("오류 발생 - {}: {}", context, error);
}
