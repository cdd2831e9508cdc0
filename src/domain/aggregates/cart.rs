//! Cart Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::value_objects::{LineKey, ProductId, Quantity, VariantAttributes};

/// Items are unique by `LineKey` and never carry a negative price, however the
/// cart was built. Deserialized carts are folded through `StoredCart`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(from = "StoredCart")]
pub struct Cart {
    items: Vec<LineItem>,
    last_updated: DateTime<Utc>,
    merge_version: Option<Uuid>,
}

/// Wire shape of a cart before its items are folded by key.
#[derive(Deserialize)]
struct StoredCart {
    items: Vec<LineItem>,
    last_updated: DateTime<Utc>,
    #[serde(default)]
    merge_version: Option<Uuid>,
}

impl From<StoredCart> for Cart {
    fn from(stored: StoredCart) -> Self { Self::from_parts(stored.items, stored.last_updated, stored.merge_version) }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: ProductId,
    #[serde(default, skip_serializing_if = "VariantAttributes::is_empty")]
    pub variant: VariantAttributes,
    pub quantity: Quantity,
    pub unit_price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<String>,
}

impl LineItem {
    pub fn new(product_id: impl Into<String>, quantity: Quantity, unit_price: Decimal) -> Self {
        Self {
            product_id: ProductId::new(product_id), variant: VariantAttributes::none(),
            quantity, unit_price, name: None, image: None, vendor_id: None,
        }
    }

    pub fn with_variant(mut self, variant: VariantAttributes) -> Self { self.variant = variant; self }

    pub fn key(&self) -> LineKey { LineKey::new(self.product_id.clone(), self.variant.clone()) }

    pub fn matches(&self, key: &LineKey) -> bool { self.product_id == key.product_id && self.variant == key.variant }

    /// Saturates at `Decimal::MAX`.
    pub fn line_total(&self) -> Decimal {
        self.unit_price.max(Decimal::ZERO).checked_mul(Decimal::from(self.quantity.value())).unwrap_or(Decimal::MAX)
    }
}

impl Default for Cart {
    fn default() -> Self { Self::empty() }
}

impl Cart {
    pub fn empty() -> Self { Self { items: vec![], last_updated: Utc::now(), merge_version: None } }

    /// Later duplicates of a key are folded into the first occurrence.
    pub fn from_items(items: impl IntoIterator<Item = LineItem>) -> Self {
        let mut cart = Self::empty();
        for item in items { cart.add_item(item); }
        cart
    }

    /// Like `from_items`, but keeps stored metadata.
    pub(crate) fn from_parts(items: Vec<LineItem>, last_updated: DateTime<Utc>, merge_version: Option<Uuid>) -> Self {
        let mut cart = Self::from_items(items);
        cart.last_updated = last_updated;
        cart.merge_version = merge_version;
        cart
    }

    pub fn items(&self) -> &[LineItem] { &self.items }
    pub fn into_items(self) -> Vec<LineItem> { self.items }
    pub fn last_updated(&self) -> DateTime<Utc> { self.last_updated }
    pub fn merge_version(&self) -> Option<Uuid> { self.merge_version }
    pub fn item_count(&self) -> usize { self.items.len() }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }
    pub fn get(&self, key: &LineKey) -> Option<&LineItem> { self.items.iter().find(|i| i.matches(key)) }

    pub fn add_item(&mut self, mut item: LineItem) {
        item.unit_price = item.unit_price.max(Decimal::ZERO);
        if let Some(existing) = self.items.iter_mut().find(|i| i.product_id == item.product_id && i.variant == item.variant) {
            existing.quantity = existing.quantity.add(item.quantity);
        } else {
            self.items.push(item);
        }
        self.touch();
    }

    pub fn update_quantity(&mut self, key: &LineKey, quantity: Quantity) -> Result<(), CartError> {
        let item = self.items.iter_mut().find(|i| i.matches(key)).ok_or(CartError::ItemNotFound)?;
        item.quantity = quantity;
        self.touch();
        Ok(())
    }

    pub fn remove_item(&mut self, key: &LineKey) -> Result<(), CartError> {
        let before = self.items.len();
        self.items.retain(|i| !i.matches(key));
        if self.items.len() == before { return Err(CartError::ItemNotFound); }
        self.touch();
        Ok(())
    }

    pub fn clear(&mut self) { self.items.clear(); self.touch(); }

    /// Marks the cart as the product of a reconciliation.
    pub fn stamp_merge_version(&mut self, version: Uuid) { self.merge_version = Some(version); }

    /// Two carts with the same merge token have not been mutated since they
    /// were written together.
    pub fn shares_merge_version(&self, other: &Cart) -> bool {
        self.merge_version.is_some() && self.merge_version == other.merge_version
    }

    pub(crate) fn stamp_now(&mut self) { self.last_updated = Utc::now(); }

    fn touch(&mut self) {
        self.last_updated = Utc::now();
        self.merge_version = None;
    }
}

/// Equality ignores `last_updated`, which is metadata only.
impl PartialEq for Cart {
    fn eq(&self, other: &Self) -> bool { self.items == other.items && self.merge_version == other.merge_version }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum CartError { ItemNotFound }
impl std::error::Error for CartError {}
impl std::fmt::Display for CartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "Item not found") }
}
