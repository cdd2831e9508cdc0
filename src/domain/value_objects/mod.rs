//! Value Objects for the cart engine

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Opaque product identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    pub fn new(value: impl Into<String>) -> Self { Self(value.into()) }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// Authenticated account identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(value: impl Into<String>) -> Self { Self(value.into()) }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// Quantity value object. Never zero: removing an item is how it leaves a cart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    pub const ONE: Quantity = Quantity(1);

    pub fn new(value: u32) -> Result<Self, QuantityError> {
        if value == 0 { return Err(QuantityError::Zero); }
        Ok(Self(value))
    }
    pub fn value(&self) -> u32 { self.0 }
    pub fn add(&self, other: Quantity) -> Self { Self(self.0.saturating_add(other.0)) }
}

impl TryFrom<u32> for Quantity {
    type Error = QuantityError;
    fn try_from(value: u32) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<Quantity> for u32 {
    fn from(value: Quantity) -> Self { value.0 }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum QuantityError { Zero }
impl std::error::Error for QuantityError {}
impl fmt::Display for QuantityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "quantity must be at least 1") }
}

/// Selected variant attributes (size, color, ...), normalized so that
/// `{" Size ": "M"}` and `{"size": "M "}` compare equal.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, String>")]
pub struct VariantAttributes(BTreeMap<String, String>);

impl VariantAttributes {
    pub fn none() -> Self { Self::default() }

    pub fn new<K, V>(attributes: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let normalized = attributes
            .into_iter()
            .filter_map(|(name, value)| {
                let name = name.as_ref().trim().to_lowercase();
                let value = value.as_ref().trim();
                if name.is_empty() || value.is_empty() { return None; }
                Some((name, value.to_string()))
            })
            .collect();
        Self(normalized)
    }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }
    pub fn get(&self, name: &str) -> Option<&str> { self.0.get(name).map(String::as_str) }
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> { self.0.iter().map(|(k, v)| (k.as_str(), v.as_str())) }
}

impl From<BTreeMap<String, String>> for VariantAttributes {
    fn from(raw: BTreeMap<String, String>) -> Self { Self::new(raw) }
}

/// Identity of a line item within a cart.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct LineKey {
    pub product_id: ProductId,
    pub variant: VariantAttributes,
}

impl LineKey {
    pub fn new(product_id: ProductId, variant: VariantAttributes) -> Self { Self { product_id, variant } }
    pub fn product(product_id: impl Into<String>) -> Self { Self::new(ProductId::new(product_id), VariantAttributes::none()) }
}

impl fmt::Display for LineKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.product_id)?;
        for (name, value) in self.variant.iter() { write!(f, " {name}={value}")?; }
        Ok(())
    }
}

/// Money value object
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money { amount: Decimal, currency: String }

impl Money {
    pub fn new(amount: Decimal, currency: &str) -> Self { Self { amount, currency: currency.to_string() } }
    pub fn amount(&self) -> Decimal { self.amount }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn is_zero(&self) -> bool { self.amount.is_zero() }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{} {}", self.amount, self.currency) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_rejects_zero() {
        assert_eq!(Quantity::new(0), Err(QuantityError::Zero));
        assert_eq!(Quantity::new(3).map(|q| q.value()), Ok(3));
    }

    #[test]
    fn test_quantity_deserialize_rejects_zero() {
        assert!(serde_json::from_str::<Quantity>("0").is_err());
        assert_eq!(serde_json::from_str::<Quantity>("2").ok(), Quantity::new(2).ok());
    }

    #[test]
    fn test_variant_normalization() {
        let a = VariantAttributes::new([(" Size ", "M"), ("color", " red")]);
        let b = VariantAttributes::new([("color", "red"), ("SIZE", "M ")]);
        assert_eq!(a, b);
        assert_eq!(a.get("size"), Some("M"));
    }

    #[test]
    fn test_variant_drops_empty_values() {
        let v = VariantAttributes::new([("size", ""), ("color", "blue")]);
        assert_eq!(v.iter().count(), 1);
        assert!(VariantAttributes::new([("size", "  ")]).is_empty());
    }

    #[test]
    fn test_variant_deserialize_normalizes() {
        let v: VariantAttributes = serde_json::from_str(r#"{"Size":" L"}"#).unwrap();
        assert_eq!(v, VariantAttributes::new([("size", "L")]));
    }

    #[test]
    fn test_line_key_display() {
        let key = LineKey::new(ProductId::new("P1"), VariantAttributes::new([("size", "M")]));
        assert_eq!(key.to_string(), "P1 size=M");
    }
}
