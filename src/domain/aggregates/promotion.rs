//! Promotion Code

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An already-validated promotion. The engine applies it; it never decides
/// whether a code is valid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PromotionCode {
    pub code: String,
    pub discount: Discount,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Discount {
    /// Fixed amount off the subtotal.
    Amount(Decimal),
    /// Fraction of the subtotal, `0.1` meaning 10%.
    Percent(Decimal),
}

impl PromotionCode {
    pub fn amount(code: impl Into<String>, amount: Decimal) -> Self { Self { code: code.into(), discount: Discount::Amount(amount) } }
    pub fn percent(code: impl Into<String>, percent: Decimal) -> Self { Self { code: code.into(), discount: Discount::Percent(percent) } }
}
