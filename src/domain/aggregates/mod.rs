//! Aggregates module
pub mod cart;
pub mod promotion;

pub use cart::{Cart, CartError, LineItem};
pub use promotion::{Discount, PromotionCode};
