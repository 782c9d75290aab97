//! Immutable product catalog, built once at startup.

use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use crate::domain::aggregates::{Product, ProductError};

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog file could not be read: {0}")]
    Io(#[from] std::io::Error),
    #[error("catalog file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("product {product_id}: {source}")]
    InvalidProduct { product_id: String, #[source] source: ProductError },
    #[error("duplicate product id {0}")]
    DuplicateProduct(String),
}

#[derive(Clone, Debug, Default)]
pub struct Catalog {
    products: Vec<Arc<Product>>,
    unavailable: HashSet<String>,
}

impl Catalog {
    pub fn from_products(products: Vec<Product>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::new();
        for product in &products {
            product.check().map_err(|source| CatalogError::InvalidProduct { product_id: product.id.clone(), source })?;
            if !seen.insert(product.id.clone()) {
                return Err(CatalogError::DuplicateProduct(product.id.clone()));
            }
        }
        Ok(Self { products: products.into_iter().map(Arc::new).collect(), unavailable: HashSet::new() })
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let products: Vec<Product> = serde_json::from_str(&raw)?;
        let catalog = Self::from_products(products)?;
        info!(path = %path.as_ref().display(), products = catalog.len(), "catalog loaded");
        Ok(catalog)
    }

    /// Marks products as "coming soon": listed, but refused by the cart.
    pub fn with_unavailable(mut self, ids: impl IntoIterator<Item = String>) -> Self {
        self.unavailable.extend(ids);
        self
    }

    pub fn products(&self) -> &[Arc<Product>] { &self.products }
    pub fn get(&self, id: &str) -> Option<&Arc<Product>> { self.products.iter().find(|p| p.id == id) }
    pub fn is_unavailable(&self, id: &str) -> bool { self.unavailable.contains(id) }
    pub fn len(&self) -> usize { self.products.len() }
    pub fn is_empty(&self) -> bool { self.products.is_empty() }

    /// Small demo catalog used when no catalog file is configured.
    pub fn builtin() -> Self {
        let mut file = Product::new("file-basic", "Config File", Decimal::new(10, 0));
        file.features = vec!["Lifetime updates".into(), "Setup guide".into()];

        let mut injector = Product::new("injector", "Injector", Decimal::new(20, 0))
            .with_variant("7 days", Decimal::new(10, 0))
            .with_variant("30 days", Decimal::new(25, 0));
        injector.features = vec!["Access for {duration}".into(), "Priority support".into()];
        injector.variants[0].substitutions = BTreeMap::from([("duration".into(), "one week".into())]);
        injector.variants[1].substitutions = BTreeMap::from([("duration".into(), "one month".into())]);
        injector.is_monthly = true;

        let mut module = Product::new("module-pro", "Pro Module", Decimal::new(50, 0));
        module.coupons_disabled = true;
        module.payment_link_id = Some("module-pro-link".into());
        module.theme = Some("gold".into());

        let mut elite = Product::new("injector-elite", "Elite Injector", Decimal::new(30, 0));
        elite.status = Some("Sold out".into());

        Self {
            products: vec![file, injector, module, elite].into_iter().map(Arc::new).collect(),
            unavailable: HashSet::new(),
        }
    }
}
