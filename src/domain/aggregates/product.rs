//! Product Aggregate

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use validator::{Validate, ValidationError};

/// Catalog entry. Supplied externally and never mutated at runtime.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[validate(length(min = 1))]
    pub id: String,
    #[validate(length(min = 1))]
    pub name: String,
    /// Advisory only when the product has variants.
    #[validate(custom = "non_negative")]
    pub price: Decimal,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variants: Vec<Variant>,
    /// Non-purchasable banner such as "Sold out".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub coupons_disabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_link_id: Option<String>,
    #[serde(default)]
    pub is_monthly: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
pub struct Variant {
    #[validate(length(min = 1))]
    pub label: String,
    #[validate(custom = "non_negative")]
    pub price: Decimal,
    /// Placeholder name to replacement text, used when rendering feature lines.
    #[serde(default, alias = "features", skip_serializing_if = "BTreeMap::is_empty")]
    pub substitutions: BTreeMap<String, String>,
}

fn non_negative(price: &Decimal) -> Result<(), ValidationError> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(ValidationError::new("negative_price"));
    }
    Ok(())
}

impl Product {
    pub fn new(id: impl Into<String>, name: impl Into<String>, price: Decimal) -> Self {
        Self {
            id: id.into(), name: name.into(), price, features: vec![], variants: vec![],
            status: None, coupons_disabled: false, theme: None, payment_link_id: None, is_monthly: false,
        }
    }

    pub fn with_variant(mut self, label: impl Into<String>, price: Decimal) -> Self {
        self.variants.push(Variant { label: label.into(), price, substitutions: BTreeMap::new() });
        self
    }

    pub fn has_variants(&self) -> bool { !self.variants.is_empty() }
    pub fn is_purchasable(&self) -> bool { self.status.is_none() }
    pub fn variant(&self, label: &str) -> Option<&Variant> { self.variants.iter().find(|v| v.label == label) }
    pub fn default_variant(&self) -> Option<&Variant> { self.variants.first() }

    /// The active variant's price governs; the product price is the fallback.
    pub fn base_price(&self, variant: Option<&Variant>) -> Decimal {
        variant.map(|v| v.price).unwrap_or(self.price)
    }

    /// Replaces each `{key}` placeholder with the active variant's substitution.
    pub fn render_feature(&self, feature: &str, variant: Option<&Variant>) -> String {
        match variant {
            Some(v) if self.has_variants() => v.substitutions.iter().fold(feature.to_string(), |acc, (key, value)| {
                acc.replacen(&format!("{{{key}}}"), value, 1)
            }),
            _ => feature.to_string(),
        }
    }

    pub fn rendered_features(&self, variant: Option<&Variant>) -> Vec<String> {
        self.features.iter().map(|f| self.render_feature(f, variant)).collect()
    }

    /// Field validation plus variant label uniqueness.
    pub fn check(&self) -> Result<(), ProductError> {
        self.validate().map_err(|e| ProductError::Invalid(e.to_string()))?;
        let mut labels = HashSet::new();
        for variant in &self.variants {
            variant.validate().map_err(|e| ProductError::Invalid(format!("variant {}: {e}", variant.label)))?;
            if !labels.insert(variant.label.as_str()) {
                return Err(ProductError::DuplicateVariant(variant.label.clone()));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProductError {
    #[error("invalid product: {0}")]
    Invalid(String),
    #[error("duplicate variant label {0:?}")]
    DuplicateVariant(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn panel() -> Product {
        let mut p = Product::new("panel", "Panel", Decimal::new(10, 0))
            .with_variant("7 days", Decimal::new(5, 0))
            .with_variant("30 days", Decimal::new(15, 0));
        p.features = vec!["Access for {duration}".into(), "Support".into()];
        p.variants[1].substitutions.insert("duration".into(), "a month".into());
        p
    }

    #[test]
    fn test_base_price() {
        let p = panel();
        assert_eq!(p.base_price(p.variant("30 days")), Decimal::new(15, 0));
        assert_eq!(p.base_price(None), Decimal::new(10, 0));
        assert_eq!(p.default_variant().unwrap().label, "7 days");
    }

    #[test]
    fn test_render_feature() {
        let p = panel();
        assert_eq!(p.rendered_features(p.variant("30 days")), vec!["Access for a month", "Support"]);
        assert_eq!(p.render_feature("Access for {duration}", p.variant("7 days")), "Access for {duration}");
        let plain = Product::new("file", "File", Decimal::ONE);
        assert_eq!(plain.render_feature("{duration}", None), "{duration}");
    }

    #[test]
    fn test_check() {
        assert!(panel().check().is_ok());
        let dup = panel().with_variant("7 days", Decimal::ONE);
        assert_eq!(dup.check(), Err(ProductError::DuplicateVariant("7 days".into())));
        let negative = Product::new("x", "X", Decimal::new(-1, 0));
        assert!(matches!(negative.check(), Err(ProductError::Invalid(_))));
        assert!(matches!(Product::new("", "X", Decimal::ONE).check(), Err(ProductError::Invalid(_))));
    }

    #[test]
    fn test_deserialize_catalog_shape() {
        let p: Product = serde_json::from_str(r#"{
            "id": "mod", "name": "Mod", "price": 20, "features": ["f"],
            "variants": [{"label": "Basic", "price": 20, "features": {"tier": "basic"}}],
            "couponsDisabled": true, "status": "Coming soon"
        }"#).unwrap();
        assert!(p.coupons_disabled);
        assert!(!p.is_purchasable());
        assert_eq!(p.variants[0].substitutions["tier"], "basic");
    }
}
