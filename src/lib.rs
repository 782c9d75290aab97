//! Storefront Engine
//!
//! Pricing and cart engine behind a product storefront.
//!
//! ## Features
//! - Variant selection with per-card state reset
//! - Coupon codes (percentage or fixed, clamped at zero)
//! - Display-only currency conversion with latest-request-wins semantics
//! - Session cart with price snapshots and duplicate line items
//! - Checkout summary and pre-filled contact/payment links

pub mod api;
pub mod auth;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod domain;
pub mod pricing;
pub mod session;

use thiserror::Error;

pub use auth::{AuthError, Identity, IdentityProvider, LocalIdentityProvider};
pub use catalog::{Catalog, CatalogError};
pub use checkout::{CheckoutSummary, LinkConfig, OutboundLinks};
pub use config::Config;
pub use domain::aggregates::{Cart, CartLineItem, Product, ProductCard, Variant};
pub use pricing::{ConversionError, CouponRegistry, CurrencyConverter};
pub use session::Session;

// =============================================================================
// Error Types
// =============================================================================

/// Everything here is recoverable; callers surface it as a notice or a 4xx.
#[derive(Error, Debug)]
pub enum StorefrontError {
    #[error("invalid coupon code {0:?}")]
    InvalidCoupon(String),

    #[error("coupons are not accepted for product {0}")]
    CouponsDisabled(String),

    #[error("currency conversion failed: {0}")]
    Conversion(#[from] ConversionError),

    #[error("sign in required")]
    AuthenticationRequired,

    #[error("sign in failed: {0}")]
    AuthenticationFailed(#[from] AuthError),

    #[error("product not found: {0}")]
    ProductNotFound(String),

    #[error("product {product_id} has no variant {label:?}")]
    VariantNotFound { product_id: String, label: String },

    #[error("product {0} is not purchasable")]
    NotPurchasable(String),

    #[error("product {0} is not available yet")]
    ProductUnavailable(String),

    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),
}

pub type Result<T> = std::result::Result<T, StorefrontError>;
