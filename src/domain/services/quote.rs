//! Checkout quotes: a repriced cart plus its totals.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::domain::aggregates::{Cart, PromotionCode};
use crate::domain::ports::{ProductCatalog, PromotionError, PromotionService};
use crate::domain::services::pricing::{PricingCalculator, Totals, UnknownShippingMethod};
use crate::domain::services::repricing::{reprice, PriceWarning};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuoteWarning {
    Price(PriceWarning),
    PromotionInvalid { code: String },
    PromotionUnavailable { code: String, reason: String },
    /// A code was supplied for an empty cart and has been dropped.
    PromotionCleared { code: String },
}

#[derive(Clone, Debug, Serialize)]
pub struct Quote {
    pub cart: Cart,
    pub totals: Totals,
    pub promotion: Option<PromotionCode>,
    pub warnings: Vec<QuoteWarning>,
}

#[derive(Debug, Error, PartialEq)]
pub enum QuoteError {
    #[error(transparent)]
    UnknownShippingMethod(#[from] UnknownShippingMethod),
}

#[derive(Clone)]
pub struct QuoteService {
    calculator: PricingCalculator,
    catalog: Arc<dyn ProductCatalog>,
    promotions: Arc<dyn PromotionService>,
}

impl std::fmt::Debug for QuoteService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuoteService").field("calculator", &self.calculator).finish_non_exhaustive()
    }
}

impl QuoteService {
    pub fn new(calculator: PricingCalculator, catalog: Arc<dyn ProductCatalog>, promotions: Arc<dyn PromotionService>) -> Self {
        Self { calculator, catalog, promotions }
    }

    pub async fn quote(&self, cart: Cart, shipping_method_id: Option<&str>, promotion_code: Option<&str>) -> Result<Quote, QuoteError> {
        // Fail before any catalog round trips.
        self.calculator.rates().resolve(shipping_method_id)?;

        let repriced = reprice(cart, self.catalog.as_ref()).await;
        let mut warnings: Vec<QuoteWarning> = repriced.warnings.iter().cloned().map(QuoteWarning::Price).collect();
        let items = repriced.priceable_items();

        let promotion = match promotion_code.map(str::trim).filter(|c| !c.is_empty()) {
            None => None,
            Some(code) if repriced.cart.is_empty() => {
                warnings.push(QuoteWarning::PromotionCleared { code: code.to_string() });
                None
            }
            Some(code) => match self.promotions.validate(code).await {
                Ok(promotion) => Some(promotion),
                Err(PromotionError::Invalid) => {
                    warnings.push(QuoteWarning::PromotionInvalid { code: code.to_string() });
                    None
                }
                Err(PromotionError::Unavailable(reason)) => {
                    warn!(code, error = %reason, "promotion service unavailable, quoting without discount");
                    warnings.push(QuoteWarning::PromotionUnavailable { code: code.to_string(), reason });
                    None
                }
            },
        };

        let totals = self.calculator.totals(&items, shipping_method_id, promotion.as_ref())?;
        Ok(Quote { cart: repriced.cart, totals, promotion, warnings })
    }
}
