//! Refreshes line item prices from the catalog.

use serde::Serialize;
use tracing::warn;

use crate::domain::aggregates::{Cart, LineItem};
use crate::domain::ports::{CatalogError, ProductCatalog};
use crate::domain::value_objects::LineKey;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PriceWarning {
    /// The product is gone from the catalog; the item was removed.
    Discontinued { item: LineKey },
    /// The price could not be confirmed; the item is kept but left out of totals.
    Unavailable { item: LineKey, reason: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Repriced {
    pub cart: Cart,
    pub warnings: Vec<PriceWarning>,
}

impl Repriced {
    /// Items whose price was confirmed by the catalog.
    pub fn priceable_items(&self) -> Vec<LineItem> {
        self.cart
            .items()
            .iter()
            .filter(|item| !self.is_unavailable(item))
            .cloned()
            .collect()
    }

    fn is_unavailable(&self, item: &LineItem) -> bool {
        self.warnings.iter().any(|w| matches!(w, PriceWarning::Unavailable { item: key, .. } if item.matches(key)))
    }
}

pub async fn reprice(cart: Cart, catalog: &dyn ProductCatalog) -> Repriced {
    let last_updated = cart.last_updated();
    let merge_version = cart.merge_version();
    let mut items = Vec::with_capacity(cart.item_count());
    let mut warnings = Vec::new();

    for mut item in cart.into_items() {
        match catalog.lookup(&item.product_id).await {
            Ok(snapshot) => {
                item.unit_price = snapshot.effective_price().max(rust_decimal::Decimal::ZERO);
                item.name = Some(snapshot.name);
                item.image = snapshot.image;
                item.vendor_id = snapshot.vendor_id;
                items.push(item);
            }
            Err(CatalogError::NotFound) => {
                warn!(product_id = %item.product_id, "dropping discontinued product from cart");
                warnings.push(PriceWarning::Discontinued { item: item.key() });
            }
            Err(CatalogError::Unavailable(reason)) => {
                warn!(product_id = %item.product_id, error = %reason, "price lookup failed");
                warnings.push(PriceWarning::Unavailable { item: item.key(), reason });
                items.push(item);
            }
        }
    }

    Repriced { cart: Cart::from_parts(items, last_updated, merge_version), warnings }
}
