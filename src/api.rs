//! HTTP surface over the engine.
//!
//! Sessions live in memory behind one async mutex. Rate lookups run with the
//! lock released; the card's ticket check decides whether the result lands.

use axum::{extract::{Path, State}, http::StatusCode, routing::{delete, get, post, put}, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn};
use uuid::Uuid;
use crate::auth::{Identity, IdentityProvider};
use crate::catalog::Catalog;
use crate::checkout::{CheckoutSummary, OutboundLinks, PaymentLinks};
use crate::domain::aggregates::{CartLineItem, Product, ProductCard};
use crate::domain::value_objects::{CurrencyCode, LineItemId, Money};
use crate::pricing::currency::{ConversionError, ConversionState, ConversionTicket, SUPPORTED_CURRENCIES};
use crate::pricing::{CouponRegistry, CurrencyConverter};
use crate::session::{Notice, Session};
use crate::StorefrontError;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<Catalog>,
    pub coupons: Arc<CouponRegistry>,
    pub converter: CurrencyConverter,
    pub identities: Arc<dyn IdentityProvider>,
    pub links: Arc<OutboundLinks>,
    pub sessions: Arc<Mutex<HashMap<Uuid, Session>>>,
    pub session_ttl: Duration,
    pub max_sessions: usize,
}

impl AppState {
    pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);
    pub const DEFAULT_MAX_SESSIONS: usize = 10_000;

    pub fn new(catalog: Catalog, coupons: CouponRegistry, converter: CurrencyConverter, identities: Arc<dyn IdentityProvider>, links: OutboundLinks) -> Self {
        Self {
            catalog: Arc::new(catalog), coupons: Arc::new(coupons), converter, identities,
            links: Arc::new(links), sessions: Arc::new(Mutex::new(HashMap::new())),
            session_ttl: Self::DEFAULT_SESSION_TTL, max_sessions: Self::DEFAULT_MAX_SESSIONS,
        }
    }

    pub fn with_session_limits(mut self, ttl: Duration, max_sessions: usize) -> Self {
        self.session_ttl = ttl;
        self.max_sessions = max_sessions;
        self
    }

    /// Drops every session idle for longer than the TTL. Returns how many went.
    pub async fn prune_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(now, self.session_ttl));
        let pruned = before - sessions.len();
        if pruned > 0 {
            info!(pruned, remaining = sessions.len(), "expired sessions dropped");
        }
        pruned
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "storefront-engine"})) }))
        .route("/api/v1/products", get(list_products))
        .route("/api/v1/currencies", get(list_currencies))
        .route("/api/v1/sessions", post(create_session))
        .route("/api/v1/sessions/:sid", delete(end_session))
        .route("/api/v1/sessions/:sid/sign-in", post(sign_in))
        .route("/api/v1/sessions/:sid/cards/:pid", get(get_card))
        .route("/api/v1/sessions/:sid/cards/:pid/variant", put(select_variant))
        .route("/api/v1/sessions/:sid/cards/:pid/coupon", post(apply_coupon).delete(remove_coupon))
        .route("/api/v1/sessions/:sid/cards/:pid/currency", put(select_currency))
        .route("/api/v1/sessions/:sid/cart", get(get_cart).post(add_to_cart))
        .route("/api/v1/sessions/:sid/cart/:item_id", delete(remove_from_cart))
        .route("/api/v1/sessions/:sid/notices", get(take_notices))
        .layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()).with_state(state)
}

type ApiResult<T> = Result<T, (StatusCode, String)>;

fn reject(e: StorefrontError) -> (StatusCode, String) {
    let status = match &e {
        StorefrontError::InvalidCoupon(_) | StorefrontError::CouponsDisabled(_)
        | StorefrontError::VariantNotFound { .. } | StorefrontError::Conversion(_) => StatusCode::UNPROCESSABLE_ENTITY,
        StorefrontError::AuthenticationRequired => StatusCode::UNAUTHORIZED,
        StorefrontError::AuthenticationFailed(_) => StatusCode::BAD_GATEWAY,
        StorefrontError::ProductNotFound(_) => StatusCode::NOT_FOUND,
        StorefrontError::NotPurchasable(_) | StorefrontError::ProductUnavailable(_) => StatusCode::CONFLICT,
        StorefrontError::Catalog(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.to_string())
}

/// Live session by id. An expired one is dropped on sight; a live one is touched.
fn session_mut(sessions: &mut HashMap<Uuid, Session>, sid: Uuid, ttl: Duration) -> ApiResult<&mut Session> {
    if sessions.get(&sid).is_some_and(|session| session.is_expired(Utc::now(), ttl)) {
        sessions.remove(&sid);
        debug!(session = %sid, "expired session dropped");
    }
    let session = sessions.get_mut(&sid).ok_or((StatusCode::NOT_FOUND, "Session not found".to_string()))?;
    session.touch();
    Ok(session)
}

#[derive(Debug, Serialize)]
pub struct VariantOption { pub label: String, pub price: String }

#[derive(Debug, Serialize)]
pub struct CardView {
    pub product_id: String,
    pub name: String,
    pub variants: Vec<VariantOption>,
    pub selected_variant: Option<String>,
    pub base_price: String,
    pub final_price: String,
    pub monthly: bool,
    /// `$18.00`, or `$18.00/month` for subscription products.
    pub price_label: String,
    pub applied_coupon: Option<String>,
    pub coupon_error: Option<String>,
    pub currency: CurrencyCode,
    pub conversion: ConversionState,
    pub converted_price: Option<String>,
    pub features: Vec<String>,
    pub status: Option<String>,
    pub payment: PaymentLinks,
}

impl CardView {
    fn build(card: &ProductCard, links: &OutboundLinks) -> Self {
        let product = card.product();
        let converted_price = match card.conversion() {
            ConversionState::Converted(amount) => Some(amount.display()),
            _ => None,
        };
        Self {
            product_id: product.id.clone(),
            name: product.name.clone(),
            variants: product.variants.iter().map(|v| VariantOption { label: v.label.clone(), price: Money::usd(v.price).display_amount() }).collect(),
            selected_variant: card.selected_variant().map(|v| v.label.clone()),
            base_price: Money::usd(card.base_price()).display_amount(),
            final_price: Money::usd(card.final_price()).display_amount(),
            monthly: product.is_monthly,
            price_label: format!("{}{}", Money::usd(card.final_price()).display(), if product.is_monthly { "/month" } else { "" }),
            applied_coupon: card.applied_coupon().map(|c| c.code.to_string()),
            coupon_error: card.coupon_error().map(str::to_string),
            currency: card.currency().clone(),
            conversion: card.conversion().clone(),
            converted_price,
            features: card.rendered_features(),
            status: product.status.clone(),
            payment: links.for_product(product, card.selected_variant(), card.base_price()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CartView {
    pub items: Vec<CartLineItem>,
    pub total: String,
    pub summary: Option<CheckoutSummary>,
    pub contact_link: Option<String>,
    pub paypal_link: String,
}

impl CartView {
    fn build(session: &Session, links: &OutboundLinks) -> Self {
        let summary = session.checkout_summary().ok();
        Self {
            items: session.cart().items().to_vec(),
            total: session.cart().total_money().display_amount(),
            contact_link: summary.as_ref().map(|s| links.cart_message_link(s)),
            summary,
            paypal_link: links.paypal_link().to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CurrencyOption { pub code: &'static str, pub name: &'static str }

#[derive(Debug, Serialize)] pub struct SessionCreated { pub id: Uuid }
#[derive(Debug, Deserialize)] pub struct VariantRequest { pub label: String }
#[derive(Debug, Deserialize)] pub struct CouponRequest { pub code: String }
#[derive(Debug, Deserialize)] pub struct CurrencyRequest { pub code: String }
#[derive(Debug, Deserialize)] pub struct AddToCartRequest { pub product_id: String }

async fn list_products(State(s): State<AppState>) -> Json<Vec<Product>> {
    Json(s.catalog.products().iter().map(|p| (**p).clone()).collect())
}

async fn list_currencies() -> Json<Vec<CurrencyOption>> {
    Json(SUPPORTED_CURRENCIES.iter().map(|&(code, name)| CurrencyOption { code, name }).collect())
}

async fn create_session(State(s): State<AppState>) -> ApiResult<(StatusCode, Json<SessionCreated>)> {
    s.prune_expired().await;
    let mut sessions = s.sessions.lock().await;
    if sessions.len() >= s.max_sessions {
        warn!(limit = s.max_sessions, "session limit reached");
        return Err((StatusCode::SERVICE_UNAVAILABLE, "Session limit reached".to_string()));
    }
    let session = Session::new();
    let id = session.id();
    sessions.insert(id, session);
    info!(session = %id, "session created");
    Ok((StatusCode::CREATED, Json(SessionCreated { id })))
}

async fn end_session(State(s): State<AppState>, Path(sid): Path<Uuid>) -> StatusCode {
    match s.sessions.lock().await.remove(&sid) {
        Some(_) => {
            info!(session = %sid, "session ended");
            StatusCode::NO_CONTENT
        }
        None => StatusCode::NOT_FOUND,
    }
}

async fn sign_in(State(s): State<AppState>, Path(sid): Path<Uuid>) -> ApiResult<Json<Identity>> {
    {
        let mut sessions = s.sessions.lock().await;
        let session = session_mut(&mut sessions, sid, s.session_ttl)?;
        if let Some(identity) = session.identity() {
            return Ok(Json(identity.clone()));
        }
        session.begin_sign_in();
    }
    let result = s.identities.sign_in_anonymously().await;
    let mut sessions = s.sessions.lock().await;
    let session = session_mut(&mut sessions, sid, s.session_ttl)?;
    session.complete_sign_in(result).cloned().map(Json).map_err(reject)
}

async fn card_view(s: &AppState, sid: Uuid, pid: &str) -> ApiResult<Json<CardView>> {
    let mut sessions = s.sessions.lock().await;
    let session = session_mut(&mut sessions, sid, s.session_ttl)?;
    let card = session.card_mut(&s.catalog, pid).map_err(reject)?;
    Ok(Json(CardView::build(card, &s.links)))
}

/// Runs a card's conversion outside the session lock, then hands the result back for the ticket check.
/// The work is spawned so the commit lands even if the caller goes away mid-fetch.
async fn settle(s: &AppState, sid: Uuid, ticket: Option<ConversionTicket>) {
    let Some(ticket) = ticket else { return };
    let fallback = ticket.clone();
    let state = s.clone();
    let task = tokio::spawn(async move {
        let result = state.converter.run(&ticket).await;
        let mut sessions = state.sessions.lock().await;
        if let Some(session) = sessions.get_mut(&sid) {
            session.finish_conversion(ticket, result);
        }
    });
    if let Err(e) = task.await {
        warn!(session = %sid, error = %e, "conversion task ended early");
        let mut sessions = s.sessions.lock().await;
        if let Some(session) = sessions.get_mut(&sid) {
            session.finish_conversion(fallback, Err(ConversionError::Aborted(e.to_string())));
        }
    }
}

async fn get_card(State(s): State<AppState>, Path((sid, pid)): Path<(Uuid, String)>) -> ApiResult<Json<CardView>> {
    card_view(&s, sid, &pid).await
}

async fn select_variant(State(s): State<AppState>, Path((sid, pid)): Path<(Uuid, String)>, Json(r): Json<VariantRequest>) -> ApiResult<Json<CardView>> {
    let ticket = {
        let mut sessions = s.sessions.lock().await;
        let session = session_mut(&mut sessions, sid, s.session_ttl)?;
        let ticket = session.card_mut(&s.catalog, &pid).map_err(reject)?.select_variant(&r.label).map_err(reject)?;
        session.flush_events();
        ticket
    };
    settle(&s, sid, ticket).await;
    card_view(&s, sid, &pid).await
}

async fn apply_coupon(State(s): State<AppState>, Path((sid, pid)): Path<(Uuid, String)>, Json(r): Json<CouponRequest>) -> ApiResult<Json<CardView>> {
    let ticket = {
        let mut sessions = s.sessions.lock().await;
        let session = session_mut(&mut sessions, sid, s.session_ttl)?;
        let ticket = session.card_mut(&s.catalog, &pid).map_err(reject)?.apply_coupon(&r.code, &s.coupons).map_err(reject)?;
        session.flush_events();
        ticket
    };
    settle(&s, sid, ticket).await;
    card_view(&s, sid, &pid).await
}

async fn remove_coupon(State(s): State<AppState>, Path((sid, pid)): Path<(Uuid, String)>) -> ApiResult<Json<CardView>> {
    let ticket = {
        let mut sessions = s.sessions.lock().await;
        let session = session_mut(&mut sessions, sid, s.session_ttl)?;
        let ticket = session.card_mut(&s.catalog, &pid).map_err(reject)?.remove_coupon();
        session.flush_events();
        ticket
    };
    settle(&s, sid, ticket).await;
    card_view(&s, sid, &pid).await
}

async fn select_currency(State(s): State<AppState>, Path((sid, pid)): Path<(Uuid, String)>, Json(r): Json<CurrencyRequest>) -> ApiResult<Json<CardView>> {
    let code = CurrencyCode::new(r.code.as_str())
        .map_err(|_| reject(StorefrontError::Conversion(ConversionError::UnsupportedCurrency(r.code.clone()))))?;
    let ticket = {
        let mut sessions = s.sessions.lock().await;
        let session = session_mut(&mut sessions, sid, s.session_ttl)?;
        let ticket = session.card_mut(&s.catalog, &pid).map_err(reject)?.select_currency(code);
        session.flush_events();
        ticket
    };
    settle(&s, sid, ticket).await;
    card_view(&s, sid, &pid).await
}

async fn get_cart(State(s): State<AppState>, Path(sid): Path<Uuid>) -> ApiResult<Json<CartView>> {
    let mut sessions = s.sessions.lock().await;
    let session = session_mut(&mut sessions, sid, s.session_ttl)?;
    Ok(Json(CartView::build(session, &s.links)))
}

async fn add_to_cart(State(s): State<AppState>, Path(sid): Path<Uuid>, Json(r): Json<AddToCartRequest>) -> ApiResult<(StatusCode, Json<CartLineItem>)> {
    let mut sessions = s.sessions.lock().await;
    let session = session_mut(&mut sessions, sid, s.session_ttl)?;
    let item = session.add_to_cart(&s.catalog, &r.product_id).map_err(reject)?;
    Ok((StatusCode::CREATED, Json(item)))
}

async fn remove_from_cart(State(s): State<AppState>, Path((sid, item_id)): Path<(Uuid, String)>) -> ApiResult<Json<CartView>> {
    let mut sessions = s.sessions.lock().await;
    let session = session_mut(&mut sessions, sid, s.session_ttl)?;
    session.remove_from_cart(&LineItemId::from(item_id));
    Ok(Json(CartView::build(session, &s.links)))
}

async fn take_notices(State(s): State<AppState>, Path(sid): Path<Uuid>) -> ApiResult<Json<Vec<Notice>>> {
    let mut sessions = s.sessions.lock().await;
    let session = session_mut(&mut sessions, sid, s.session_ttl)?;
    Ok(Json(session.take_notices()))
}
