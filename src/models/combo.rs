use serde::{Deserialize, Serialize};

use crate::error::TradingError;
use crate::models::leg::{Action, Leg};
use crate::utils::math::gcd_multiple;

/// Legs on one underlying traded as a unit at a net price.
///
/// Built by `ComboBuilder`; deserialized values are re-checked against the
/// same shared-underlying and coprime-ratio rules.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "ComboFields")]
pub struct ComboSpecification {
    legs: Vec<Leg>,
    action: Action,
    quantity: u32,
}

/// Wire form of `ComboSpecification` before validation
#[derive(Deserialize)]
struct ComboFields {
    legs: Vec<Leg>,
    action: Action,
    quantity: u32,
}

impl TryFrom<ComboFields> for ComboSpecification {
    type Error = TradingError;

    fn try_from(fields: ComboFields) -> Result<Self, Self::Error> {
        let first = fields.legs.first().ok_or(TradingError::EmptyLegs)?;
        for (leg_index, leg) in fields.legs.iter().enumerate() {
            if leg.underlying != first.underlying {
                return Err(TradingError::MismatchedUnderlying {
                    leg_index,
                    expected: first.underlying.clone(),
                    found: leg.underlying.clone(),
                });
            }
            if leg.ratio == 0 {
                return Err(TradingError::InvalidRatio { leg_index });
            }
        }
        if fields.quantity == 0 {
            return Err(TradingError::InvalidParameter("Combo quantity must be positive".to_string()));
        }

        let ratios: Vec<u32> = fields.legs.iter().map(|leg| leg.ratio).collect();
        if fields.legs.len() == 1 {
            if ratios[0] != fields.quantity {
                return Err(TradingError::InvalidParameter(format!(
                    "Single-leg ratio {} does not match quantity {}",
                    ratios[0], fields.quantity
                )));
            }
        } else if gcd_multiple(&ratios) != 1 {
            return Err(TradingError::InvalidParameter(format!(
                "Combo ratios {:?} are not reduced",
                ratios
            )));
        }

        Ok(ComboSpecification::new(fields.legs, fields.action, fields.quantity))
    }
}

impl ComboSpecification {
    pub(crate) fn new(legs: Vec<Leg>, action: Action, quantity: u32) -> Self {
        ComboSpecification { legs, action, quantity }
    }

    /// Legs carrying their effective (reduced) ratios
    pub fn legs(&self) -> &[Leg] {
        &self.legs
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn underlying(&self) -> &str {
        &self.legs[0].underlying
    }

    /// More than one leg, i.e. submitted as a BAG contract
    pub fn is_combo(&self) -> bool {
        self.legs.len() > 1
    }

    pub fn ratios(&self) -> Vec<u32> {
        self.legs.iter().map(|leg| leg.ratio).collect()
    }

    /// Override the combo direction; leg actions and ratios are untouched
    pub fn with_action(mut self, action: Action) -> Self {
        self.action = action;
        self
    }
}
