//! Totals calculation.
//!
//! Everything here is pure arithmetic over line items that were already priced
//! by the catalog. Nothing is cached: totals are rebuilt from the items on
//! every call.

use std::collections::BTreeMap;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use thiserror::Error;

use crate::domain::aggregates::{Discount, LineItem, PromotionCode};
use crate::domain::value_objects::Money;

/// Derived cart figures. Never persisted.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Totals {
    pub subtotal: Money,
    pub discount: Money,
    pub shipping: Money,
    pub total: Money,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown shipping method `{0}`")]
pub struct UnknownShippingMethod(pub String);

/// Flat shipping price per method id.
#[derive(Clone, Debug, PartialEq)]
pub struct ShippingRates {
    rates: BTreeMap<String, Decimal>,
}

impl Default for ShippingRates {
    fn default() -> Self {
        Self::new([
            ("standard", Decimal::new(1000, 0)),
            ("express", Decimal::new(2500, 0)),
            ("pickup", Decimal::ZERO),
        ])
    }
}

impl ShippingRates {
    pub fn new<K: Into<String>>(rates: impl IntoIterator<Item = (K, Decimal)>) -> Self {
        Self { rates: rates.into_iter().map(|(id, price)| (id.into(), price.max(Decimal::ZERO))).collect() }
    }

    /// No selected method ships free. An id that is not in the table is an
    /// error the caller has to handle.
    pub fn resolve(&self, method_id: Option<&str>) -> Result<Decimal, UnknownShippingMethod> {
        match method_id {
            None => Ok(Decimal::ZERO),
            Some(id) => self.rates.get(id).copied().ok_or_else(|| UnknownShippingMethod(id.to_string())),
        }
    }
}

#[derive(Clone, Debug)]
pub struct PricingCalculator {
    currency: String,
    rates: ShippingRates,
}

impl PricingCalculator {
    pub fn new(currency: impl Into<String>, rates: ShippingRates) -> Self { Self { currency: currency.into(), rates } }

    pub fn rates(&self) -> &ShippingRates { &self.rates }

    pub fn totals(
        &self,
        items: &[LineItem],
        shipping_method_id: Option<&str>,
        promotion: Option<&PromotionCode>,
    ) -> Result<Totals, UnknownShippingMethod> {
        let shipping = self.rates.resolve(shipping_method_id)?;
        let subtotal = subtotal(items);
        let discount = promotion.map_or(Decimal::ZERO, |p| resolve_discount(subtotal, &p.discount));
        let total = (subtotal - discount).checked_add(shipping).unwrap_or(Decimal::MAX).max(Decimal::ZERO);

        Ok(Totals {
            subtotal: Money::new(subtotal, &self.currency),
            discount: Money::new(discount, &self.currency),
            shipping: Money::new(shipping, &self.currency),
            total: Money::new(total, &self.currency),
        })
    }
}

/// Saturates at `Decimal::MAX` rather than overflowing.
pub fn subtotal(items: &[LineItem]) -> Decimal {
    items.iter().map(LineItem::line_total).fold(Decimal::ZERO, |sum, line| sum.checked_add(line).unwrap_or(Decimal::MAX))
}

/// Discount in `[0, subtotal]`.
pub fn resolve_discount(subtotal: Decimal, discount: &Discount) -> Decimal {
    let raw = match *discount {
        Discount::Amount(amount) => amount,
        Discount::Percent(percent) => match subtotal.checked_mul(percent) {
            Some(raw) => raw.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
            None if percent.is_sign_negative() => Decimal::ZERO,
            None => subtotal,
        },
    };
    raw.max(Decimal::ZERO).min(subtotal)
}
