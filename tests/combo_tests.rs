//! 콤보 구성 테스트
//!
//! 비율 정규화와 입력 검증

use combo_chase::core::ComboBuilder;
use combo_chase::models::leg::{Action, Leg, OptionRight};
use combo_chase::models::ticket::OrderTicket;
use combo_chase::TradingError;
use rstest::rstest;

fn legs_with_ratios(ratios: &[u32]) -> Vec<Leg> {
  ratios
    .iter()
    .enumerate()
    .map(|(i, ratio)| {
      let action = if i % 2 == 0 { Action::Buy } else { Action::Sell };
      Leg::new("XSP", "20250321", 550.0 + 5.0 * i as f64, OptionRight::Call, action, *ratio)
    })
    .collect()
}

#[rstest]
#[case(&[3, 1, 1], 1, &[3, 1, 1])]
#[case(&[2, 4], 2, &[1, 2])]
#[case(&[5, 5], 5, &[1, 1])]
#[case(&[4, 6, 8], 2, &[2, 3, 4])]
#[case(&[7], 7, &[7])]
fn test_ratio_normalisation(#[case] ratios: &[u32], #[case] quantity: u32, #[case] effective: &[u32]) {
  let spec = ComboBuilder::build(legs_with_ratios(ratios)).unwrap();
  assert_eq!(spec.quantity(), quantity);
  assert_eq!(spec.ratios(), effective.to_vec());
}

#[rstest]
#[case(&[3, 1, 1])]
#[case(&[2, 4])]
#[case(&[6, 9, 12])]
fn test_effective_times_quantity_restores_input(#[case] ratios: &[u32]) {
  let spec = ComboBuilder::build(legs_with_ratios(ratios)).unwrap();
  let restored: Vec<u32> = spec.ratios().iter().map(|r| r * spec.quantity()).collect();
  assert_eq!(restored, ratios.to_vec());
}

#[test]
fn test_leg_order_and_actions_preserved() {
  let spec = ComboBuilder::build(legs_with_ratios(&[2, 4, 6])).unwrap();
  let actions: Vec<Action> = spec.legs().iter().map(|leg| leg.action).collect();
  assert_eq!(actions, vec![Action::Buy, Action::Sell, Action::Buy]);
  let strikes: Vec<f64> = spec.legs().iter().map(|leg| leg.strike).collect();
  assert_eq!(strikes, vec![550.0, 555.0, 560.0]);
}

#[test]
fn test_mismatched_underlying_rejected() {
  let legs = vec![
    Leg::new("AAA", "20250321", 10.0, OptionRight::Call, Action::Buy, 1),
    Leg::new("BBB", "20250321", 10.0, OptionRight::Call, Action::Sell, 1),
  ];
  assert!(matches!(
    ComboBuilder::build(legs),
    Err(TradingError::MismatchedUnderlying { leg_index: 1, .. })
  ));
}

#[test]
fn test_input_errors_are_flagged() {
  let err = ComboBuilder::build(Vec::new()).unwrap_err();
  assert!(err.is_input_error());
}

#[test]
fn test_ticket_quantity_becomes_combo_quantity() {
  let ticket: OrderTicket = serde_json::from_str(
    r#"{
      "underlying": "UVXY",
      "legs": [
        { "expiry": "20250307", "strike": 17.5, "right": "P", "action": "SELL" },
        { "expiry": "20250307", "strike": 16.0, "right": "P", "action": "BUY" }
      ],
      "action": "BUY",
      "quantity": 3,
      "initial_price": -0.35,
      "step": 0.01,
      "final_price": -0.25
    }"#,
  )
  .unwrap();

  let spec = ComboBuilder::build(ticket.legs().unwrap()).unwrap().with_action(Action::Buy);
  assert_eq!(spec.quantity(), 3);
  assert_eq!(spec.ratios(), vec![1, 1]);
  assert_eq!(spec.action(), Action::Buy);
}
