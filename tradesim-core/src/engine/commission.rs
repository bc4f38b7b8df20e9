//! Commission models, computed in fixed-point.

use crate::domain::Price;
use serde::{Deserialize, Serialize};

/// How much a simulated fill pays in commission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommissionModel {
    /// Frictionless.
    #[default]
    None,
    /// Flat fee per fill.
    PerTrade { amount: Price },
    /// Fee per unit with a floor per fill.
    PerShare {
        amount: Price,
        #[serde(default)]
        minimum: Price,
    },
    /// Basis points of notional.
    Percentage { bps: u32 },
}

impl CommissionModel {
    /// Commission for one fill. `None` if the cost does not fit in a `Price`.
    pub fn compute(&self, quantity: u64, price: Price) -> Option<Price> {
        let quantity = i64::try_from(quantity).ok()?;
        Some(match *self {
            Self::None => Price::ZERO,
            Self::PerTrade { amount } => amount,
            Self::PerShare { amount, minimum } => amount.checked_times(quantity)?.max(minimum),
            Self::Percentage { bps } => price
                .checked_times(quantity)?
                .abs()
                .mul_ratio(bps as i64, 10_000),
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::PerTrade { .. } => "PerTrade",
            Self::PerShare { .. } => "PerShare",
            Self::Percentage { .. } => "Percentage",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> Price {
        Price::parse(s).unwrap()
    }

    #[test]
    fn frictionless() {
        assert_eq!(CommissionModel::None.compute(100, p("10")), Some(Price::ZERO));
    }

    #[test]
    fn per_trade_is_flat() {
        let model = CommissionModel::PerTrade { amount: p("1") };
        assert_eq!(model.compute(1, p("10")), Some(p("1")));
        assert_eq!(model.compute(10_000, p("10")), Some(p("1")));
    }

    #[test]
    fn per_share_respects_minimum() {
        let model = CommissionModel::PerShare {
            amount: p("0.005"),
            minimum: p("1"),
        };
        assert_eq!(model.compute(100, p("10")), Some(p("1")));
        assert_eq!(model.compute(1000, p("10")), Some(p("5")));
    }

    #[test]
    fn percentage_of_notional() {
        // 100 * 12.34 = 1234; 5 bps = 0.617
        let model = CommissionModel::Percentage { bps: 5 };
        assert_eq!(model.compute(100, p("12.34")), Some(p("0.617")));
    }

    #[test]
    fn overflowing_cost_is_none() {
        let model = CommissionModel::Percentage { bps: 5 };
        assert_eq!(model.compute(10_000_000_000_000, p("100")), None);
        assert_eq!(model.compute(u64::MAX, p("1")), None);
    }

    #[test]
    fn serde_tagged() {
        let model: CommissionModel =
            serde_json::from_str(r#"{"type":"PER_TRADE","amount":"1.00"}"#).unwrap();
        assert_eq!(model, CommissionModel::PerTrade { amount: p("1") });
        let model: CommissionModel =
            serde_json::from_str(r#"{"type":"PER_SHARE","amount":0.01}"#).unwrap();
        assert_eq!(
            model,
            CommissionModel::PerShare {
                amount: p("0.01"),
                minimum: Price::ZERO
            }
        );
    }
}
