//! Adapters for the domain ports.
pub mod events;
pub mod local_store;
pub mod postgres;

pub use events::EventPublisher;
pub use local_store::{FileCartStore, SubmittedCart};
pub use postgres::{PgProductCatalog, PgPromotionService, PgRemoteCartStore};
