//! Checkout hand-off: summary text and outbound links.
pub mod links;
pub mod summary;

pub use links::{LinkConfig, OutboundLinks, PaymentLinks};
pub use summary::CheckoutSummary;
