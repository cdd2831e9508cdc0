//! Boundaries between the engine and its storage and catalog collaborators.
//!
//! Every collaborator is an injected trait object; nothing in the engine holds
//! a global client handle.

use async_trait::async_trait;
use mockall::automock;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::{Cart, PromotionCode};
use crate::domain::value_objects::{ProductId, UserId};

/// Client-side persistence of the anonymous cart.
#[automock]
#[async_trait]
pub trait LocalCartStore: Send + Sync {
    /// Returns the persisted cart, or an empty cart when nothing usable is stored.
    async fn read(&self) -> Cart;

    /// Persists the cart, stamping `last_updated`. Failures are logged and
    /// reported as `false`, never raised.
    async fn write(&self, cart: &Cart) -> bool;
}

/// Outcome of a remote cart read. A failed fetch is not the same as no cart.
#[derive(Clone, Debug, PartialEq)]
pub enum RemoteRead {
    Found(Cart),
    NotFound,
    FetchError(String),
}

/// Server-side persistence of a user's cart.
#[automock]
#[async_trait]
pub trait RemoteCartStore: Send + Sync {
    async fn read(&self, user_id: &UserId) -> RemoteRead;

    /// Replaces the whole remote item set, creating the cart row if needed.
    async fn write(&self, user_id: &UserId, cart: &Cart) -> Result<Uuid, StoreError>;
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("stored cart is invalid: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self { Self::Storage(error.to_string()) }
}

/// Current catalog data for a product.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProductSnapshot {
    pub price: Decimal,
    pub sale_price: Option<Decimal>,
    pub name: String,
    pub image: Option<String>,
    pub vendor_id: Option<String>,
}

impl ProductSnapshot {
    /// Price a buyer pays right now.
    pub fn effective_price(&self) -> Decimal { self.sale_price.unwrap_or(self.price) }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CatalogError {
    #[error("product not found")]
    NotFound,

    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

#[automock]
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn lookup(&self, product_id: &ProductId) -> Result<ProductSnapshot, CatalogError>;
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PromotionError {
    #[error("promotion code is invalid")]
    Invalid,

    #[error("promotion service unavailable: {0}")]
    Unavailable(String),
}

#[automock]
#[async_trait]
pub trait PromotionService: Send + Sync {
    async fn validate(&self, code: &str) -> Result<PromotionCode, PromotionError>;
}
