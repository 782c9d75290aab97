//! Pricing: coupon registry, price resolver and display currency conversion.
pub mod coupons;
pub mod currency;
pub mod resolver;

pub use coupons::{AppliedCoupon, CouponRegistry, CouponRule, DiscountKind};
pub use currency::{
    ConversionCommit, ConversionError, ConversionState, ConversionTicket, CurrencyConverter, HttpRateSource,
    RateSource, SUPPORTED_CURRENCIES,
};
pub use resolver::{accept_coupon, resolve};
