//! Domain services
pub mod pricing;
pub mod quote;
pub mod reconciler;
pub mod repricing;

pub use pricing::{PricingCalculator, ShippingRates, Totals, UnknownShippingMethod};
pub use quote::{Quote, QuoteError, QuoteService, QuoteWarning};
pub use reconciler::{merge, Reconciler, Reconciliation, RemoteStatus};
pub use repricing::{reprice, PriceWarning, Repriced};
