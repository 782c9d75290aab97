//! Environment configuration.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use crate::checkout::LinkConfig;

pub const DEFAULT_RATE_SOURCE_URL: &str = "https://api.exchangerate-api.com/v4/latest/USD";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} has an invalid value {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub rate_source_url: String,
    pub rate_timeout: Duration,
    pub catalog_path: Option<PathBuf>,
    pub unavailable_products: Vec<String>,
    pub links: LinkConfig,
    /// Idle time after which a session is dropped.
    pub session_ttl: Duration,
    pub max_sessions: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8083,
            rate_source_url: DEFAULT_RATE_SOURCE_URL.to_string(),
            rate_timeout: Duration::from_secs(5),
            catalog_path: None,
            unavailable_products: vec![],
            links: LinkConfig::default(),
            session_ttl: Duration::from_secs(30 * 60),
            max_sessions: 10_000,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Config::default();
        if let Some(port) = lookup("PORT") {
            config.port = port.parse().map_err(|_| ConfigError::Invalid { key: "PORT", value: port })?;
        }
        if let Some(url) = lookup("RATE_SOURCE_URL") {
            config.rate_source_url = url;
        }
        if let Some(ms) = lookup("RATE_TIMEOUT_MS") {
            let millis: u64 = ms.parse().map_err(|_| ConfigError::Invalid { key: "RATE_TIMEOUT_MS", value: ms.clone() })?;
            config.rate_timeout = Duration::from_millis(millis);
        }
        if let Some(secs) = lookup("SESSION_TTL_SECS") {
            let secs: u64 = secs.parse().map_err(|_| ConfigError::Invalid { key: "SESSION_TTL_SECS", value: secs.clone() })?;
            config.session_ttl = Duration::from_secs(secs);
        }
        if let Some(max) = lookup("MAX_SESSIONS") {
            config.max_sessions = max.parse().map_err(|_| ConfigError::Invalid { key: "MAX_SESSIONS", value: max })?;
        }
        config.catalog_path = lookup("CATALOG_PATH").filter(|p| !p.is_empty()).map(PathBuf::from);
        if let Some(ids) = lookup("UNAVAILABLE_PRODUCTS") {
            config.unavailable_products = split_list(&ids).map(str::to_string).collect();
        }
        if let Some(url) = lookup("CONTACT_URL") {
            config.links.contact_url = url;
        }
        if let Some(url) = lookup("PAYPAL_URL") {
            config.links.paypal_url = url;
        }
        if let Some(url) = lookup("ASTROPAY_URL") {
            config.links.astropay_url = url;
        }
        if let Some(reference) = lookup("ASTROPAY_DEFAULT_REF") {
            config.links.astropay_default_ref = reference;
        }
        if let Some(refs) = lookup("ASTROPAY_REFS") {
            config.links.astropay_price_refs = parse_price_refs(&refs)?;
        }
        Ok(config)
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

/// `5=ref5,10=ref10` into a price-point table.
fn parse_price_refs(raw: &str) -> Result<BTreeMap<u32, String>, ConfigError> {
    split_list(raw)
        .map(|pair| {
            let invalid = || ConfigError::Invalid { key: "ASTROPAY_REFS", value: pair.to_string() };
            let (price, reference) = pair.split_once('=').ok_or_else(invalid)?;
            let price = price.trim().parse::<u32>().map_err(|_| invalid())?;
            Ok((price, reference.trim().to_string()))
        })
        .collect()
}
