//! Storefront Engine - pricing, coupon, currency and cart service

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use storefront_engine::api::{router, AppState};
use storefront_engine::pricing::HttpRateSource;
use storefront_engine::{Catalog, Config, CouponRegistry, CurrencyConverter, LocalIdentityProvider, OutboundLinks};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();
    let config = Config::from_env()?;

    let catalog = match &config.catalog_path {
        Some(path) => Catalog::from_json_file(path)?,
        None => Catalog::builtin(),
    }
    .with_unavailable(config.unavailable_products.clone());
    tracing::info!(products = catalog.len(), "catalog loaded");

    let converter = CurrencyConverter::new(Arc::new(HttpRateSource::new(config.rate_source_url.clone())), config.rate_timeout);
    let state = AppState::new(catalog, CouponRegistry::builtin(), converter, Arc::new(LocalIdentityProvider), OutboundLinks::new(config.links.clone()))
        .with_session_limits(config.session_ttl, config.max_sessions);

    let sweeper = state.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(60));
        loop {
            tick.tick().await;
            sweeper.prune_expired().await;
        }
    });

    tracing::info!("🚀 Storefront Engine listening on 0.0.0.0:{}", config.port);
    axum::serve(tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?, router(state)).await?;
    Ok(())
}
