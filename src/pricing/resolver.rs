//! Price resolution: base price from the selected variant, then the coupon.

use rust_decimal::Decimal;
use tracing::debug;
use crate::domain::aggregates::{Product, Variant};
use crate::pricing::coupons::{AppliedCoupon, CouponRegistry};
use crate::StorefrontError;

/// Final display price. Never negative.
pub fn resolve(product: &Product, variant: Option<&Variant>, coupon: Option<&AppliedCoupon>) -> Decimal {
    let base = product.base_price(variant);
    match coupon {
        Some(applied) => applied.rule.apply(base),
        None => base,
    }
}

/// Looks the code up for this product. Rejections leave the caller's state untouched.
pub fn accept_coupon(product: &Product, code: &str, registry: &CouponRegistry) -> Result<AppliedCoupon, StorefrontError> {
    if !product.is_purchasable() {
        debug!(product_id = %product.id, "coupon rejected: product not purchasable");
        return Err(StorefrontError::NotPurchasable(product.id.clone()));
    }
    if product.coupons_disabled {
        debug!(product_id = %product.id, "coupon rejected: coupons disabled");
        return Err(StorefrontError::CouponsDisabled(product.id.clone()));
    }
    registry.redeem(code).ok_or_else(|| {
        debug!(product_id = %product.id, code, "coupon rejected: unknown code");
        StorefrontError::InvalidCoupon(code.trim().to_uppercase())
    })
}
