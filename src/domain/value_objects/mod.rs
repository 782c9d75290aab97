//! Value Objects for the storefront

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// ISO-4217 style currency code, always three uppercase ASCII letters.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    pub const BASE: &'static str = "USD";

    pub fn new(value: impl Into<String>) -> Result<Self, CurrencyCodeError> {
        let value = value.into().trim().to_uppercase();
        if value.len() != 3 || !value.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(CurrencyCodeError::Malformed(value));
        }
        Ok(Self(value))
    }
    pub fn usd() -> Self { Self(Self::BASE.to_string()) }
    pub fn is_base(&self) -> bool { self.0 == Self::BASE }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl Default for CurrencyCode { fn default() -> Self { Self::usd() } }

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl TryFrom<String> for CurrencyCode {
    type Error = CurrencyCodeError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self { code.0 }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CurrencyCodeError {
    #[error("malformed currency code: {0:?}")]
    Malformed(String),
}

/// Coupon code as entered by a visitor, normalized to uppercase.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CouponCode(String);

impl CouponCode {
    pub fn new(value: impl Into<String>) -> Result<Self, CouponCodeError> {
        let value = value.into().trim().to_uppercase();
        if value.is_empty() { return Err(CouponCodeError::Empty); }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for CouponCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CouponCodeError {
    #[error("coupon code is empty")]
    Empty,
}

/// Cart line identifier: product id, suffixed with the variant label when one is selected.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineItemId(String);

impl LineItemId {
    pub fn new(product_id: &str, variant_label: Option<&str>) -> Self {
        match variant_label {
            Some(label) => Self(format!("{product_id}-{label}")),
            None => Self(product_id.to_string()),
        }
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl From<String> for LineItemId {
    fn from(value: String) -> Self { Self(value) }
}

impl fmt::Display for LineItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

/// Money value object
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money { amount: Decimal, currency: CurrencyCode }

impl Money {
    pub fn new(amount: Decimal, currency: CurrencyCode) -> Self { Self { amount, currency } }
    pub fn usd(amount: Decimal) -> Self { Self::new(amount, CurrencyCode::usd()) }
    pub fn zero(currency: CurrencyCode) -> Self { Self::new(Decimal::ZERO, currency) }
    pub fn amount(&self) -> Decimal { self.amount }
    pub fn currency(&self) -> &CurrencyCode { &self.currency }

    /// Amount rounded to cents, midpoint away from zero.
    pub fn rounded(&self) -> Money {
        Money::new(round_cents(self.amount), self.currency.clone())
    }

    /// Two-decimal amount without any currency marker, e.g. `18.00`.
    pub fn display_amount(&self) -> String { format!("{:.2}", round_cents(self.amount)) }

    /// `$18.00` for the base currency, `19.80 EUR` for everything else.
    pub fn display(&self) -> String {
        if self.currency.is_base() {
            format!("${}", self.display_amount())
        } else {
            format!("{} {}", self.display_amount(), self.currency)
        }
    }
}

impl Default for Money { fn default() -> Self { Self::zero(CurrencyCode::usd()) } }

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.display()) }
}

pub fn round_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_currency_code() {
        assert_eq!(CurrencyCode::new(" eur ").unwrap().as_str(), "EUR");
        assert!(CurrencyCode::new("EURO").is_err());
        assert!(CurrencyCode::new("E1R").is_err());
        assert!(CurrencyCode::usd().is_base());
    }
    #[test]
    fn test_coupon_code() {
        assert_eq!(CouponCode::new("iambird10a").unwrap().as_str(), "IAMBIRD10A");
        assert_eq!(CouponCode::new("   "), Err(CouponCodeError::Empty));
    }
    #[test]
    fn test_line_item_id() {
        assert_eq!(LineItemId::new("panel", Some("30 days")).as_str(), "panel-30 days");
        assert_eq!(LineItemId::new("panel", None).as_str(), "panel");
    }
    #[test]
    fn test_money_display() {
        assert_eq!(Money::usd(Decimal::new(18, 0)).display(), "$18.00");
        let eur = Money::new(Decimal::new(19795, 3), CurrencyCode::new("EUR").unwrap());
        assert_eq!(eur.display(), "19.80 EUR");
        assert_eq!(eur.rounded().amount(), Decimal::new(1980, 2));
    }
}
