//! Coupon registry: fixed code to discount rule table.
//!
//! Codes never expire and carry no redemption counter.

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use crate::domain::value_objects::CouponCode;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum DiscountKind {
    /// Multiplicative fraction, strictly between 0 and 1.
    Percentage(Decimal),
    /// Absolute USD amount.
    Fixed(Decimal),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct CouponRule { kind: DiscountKind }

impl CouponRule {
    pub fn percentage(fraction: Decimal) -> Result<Self, CouponRuleError> {
        if fraction <= Decimal::ZERO || fraction >= Decimal::ONE {
            return Err(CouponRuleError::PercentageOutOfRange(fraction));
        }
        Ok(Self { kind: DiscountKind::Percentage(fraction) })
    }

    pub fn fixed(amount: Decimal) -> Result<Self, CouponRuleError> {
        if amount <= Decimal::ZERO {
            return Err(CouponRuleError::NonPositiveAmount(amount));
        }
        Ok(Self { kind: DiscountKind::Fixed(amount) })
    }

    pub fn kind(&self) -> DiscountKind { self.kind }

    /// Discounted price, clamped at zero.
    pub fn apply(&self, base: Decimal) -> Decimal {
        let discounted = match self.kind {
            DiscountKind::Percentage(d) => base * (Decimal::ONE - d),
            DiscountKind::Fixed(d) => base - d,
        };
        discounted.max(Decimal::ZERO)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CouponRuleError {
    #[error("percentage discount must be between 0 and 1, got {0}")]
    PercentageOutOfRange(Decimal),
    #[error("fixed discount must be positive, got {0}")]
    NonPositiveAmount(Decimal),
}

/// A coupon that passed registry lookup, held by a product card.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AppliedCoupon {
    pub code: CouponCode,
    pub rule: CouponRule,
}

#[derive(Clone, Debug, Default)]
pub struct CouponRegistry { rules: HashMap<String, CouponRule> }

impl CouponRegistry {
    pub fn new(rules: impl IntoIterator<Item = (String, CouponRule)>) -> Self {
        Self { rules: rules.into_iter().map(|(code, rule)| (code.trim().to_uppercase(), rule)).collect() }
    }

    /// The shop's standing codes: ten each at 10%, 20% and 30%, five at 50%.
    pub fn builtin() -> Self {
        let pct = |n: i64| CouponRule { kind: DiscountKind::Percentage(Decimal::new(n, 2)) };
        let mut rules = Vec::new();
        for suffix in 'A'..='J' {
            rules.push((format!("IAMBIRD10{suffix}"), pct(10)));
        }
        for n in 1..=10 {
            rules.push((format!("IAMBIRD20_{n:02}"), pct(20)));
        }
        for n in 0..=9 {
            rules.push((format!("IAMBIRD30X{n}"), pct(30)));
        }
        for n in 1..=5 {
            rules.push((format!("IAMBIRDHALF{n}"), pct(50)));
        }
        Self::new(rules)
    }

    pub fn lookup(&self, code: &str) -> Option<&CouponRule> {
        self.rules.get(&code.trim().to_uppercase())
    }

    pub fn redeem(&self, code: &str) -> Option<AppliedCoupon> {
        let code = CouponCode::new(code).ok()?;
        let rule = *self.rules.get(code.as_str())?;
        Some(AppliedCoupon { code, rule })
    }

    pub fn len(&self) -> usize { self.rules.len() }
    pub fn is_empty(&self) -> bool { self.rules.is_empty() }
}
