//! Marketplace cart engine
//!
//! Keeps a shopper's cart consistent between the device and their account,
//! and prices it for checkout.
//!
//! ## Features
//! - Local (device) and remote (account) cart stores
//! - Sign-in reconciliation of the two carts, larger quantity wins
//! - Repricing against the product catalog
//! - Totals with promotion codes and shipping rates

use thiserror::Error;

pub mod config;
pub mod domain;
pub mod infrastructure;

pub use domain::aggregates::{Cart, LineItem, PromotionCode};
pub use domain::services::{PricingCalculator, Quote, QuoteService, Reconciler, Reconciliation, Totals};

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum MarketplaceError {
    #[error("Cart not found")]
    CartNotFound,

    #[error("Item not found")]
    ItemNotFound,

    #[error("Invalid quantity")]
    InvalidQuantity,

    #[error(transparent)]
    UnknownShippingMethod(#[from] domain::services::UnknownShippingMethod),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error(transparent)]
    Config(#[from] config::ConfigError),
}

impl From<domain::aggregates::CartError> for MarketplaceError {
    fn from(error: domain::aggregates::CartError) -> Self {
        match error {
            domain::aggregates::CartError::ItemNotFound => Self::ItemNotFound,
        }
    }
}

impl From<domain::value_objects::QuantityError> for MarketplaceError {
    fn from(_: domain::value_objects::QuantityError) -> Self { Self::InvalidQuantity }
}

impl From<domain::ports::StoreError> for MarketplaceError {
    fn from(error: domain::ports::StoreError) -> Self { Self::StorageError(error.to_string()) }
}

impl From<domain::services::QuoteError> for MarketplaceError {
    fn from(error: domain::services::QuoteError) -> Self {
        match error {
            domain::services::QuoteError::UnknownShippingMethod(e) => Self::UnknownShippingMethod(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, MarketplaceError>;
