//! One visitor's session: identity, per-product card state, the cart and
//! pending notices. Everything here is in-memory and dies with the session.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;
use crate::auth::{AuthError, AuthState, Identity};
use crate::catalog::Catalog;
use crate::checkout::CheckoutSummary;
use crate::domain::aggregates::{Cart, CartLineItem, ProductCard};
use crate::domain::events::DomainEvent;
use crate::domain::value_objects::{LineItemId, Money};
use crate::pricing::currency::{ConversionCommit, ConversionError, ConversionTicket};
use crate::StorefrontError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel { Info, Error }

/// Transient, dismissible message for the visitor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub message: String,
    pub raised_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct Session {
    id: Uuid,
    auth: AuthState,
    cards: HashMap<String, ProductCard>,
    cart: Cart,
    notices: Vec<Notice>,
    created_at: DateTime<Utc>,
    last_seen: DateTime<Utc>,
}

impl Default for Session { fn default() -> Self { Self::new() } }

impl Session {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(), auth: AuthState::SignedOut, cards: HashMap::new(), cart: Cart::new(),
            notices: vec![], created_at: now, last_seen: now,
        }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn last_seen(&self) -> DateTime<Utc> { self.last_seen }

    pub fn touch(&mut self) { self.last_seen = Utc::now(); }

    /// Idle for at least `ttl` as of `now`.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        (now - self.last_seen).to_std().map_or(false, |idle| idle >= ttl)
    }

    pub fn auth(&self) -> &AuthState { &self.auth }
    pub fn identity(&self) -> Option<&Identity> { self.auth.identity() }
    pub fn is_authenticated(&self) -> bool { self.auth.is_present() }
    pub fn cart(&self) -> &Cart { &self.cart }

    /// Marks the session as waiting on the identity provider.
    pub fn begin_sign_in(&mut self) {
        if !self.auth.is_present() {
            self.auth = AuthState::Loading;
        }
    }

    pub fn complete_sign_in(&mut self, result: Result<Identity, AuthError>) -> Result<&Identity, StorefrontError> {
        match result {
            Ok(identity) => {
                info!(session = %self.id, uid = %identity.uid, "visitor signed in");
                self.notify(NoticeLevel::Info, "Welcome!", "You can now add products to your cart.");
                self.auth = AuthState::SignedIn(identity);
                self.auth.identity().ok_or(StorefrontError::AuthenticationRequired)
            }
            Err(e) => {
                warn!(session = %self.id, error = %e, "anonymous sign-in failed");
                self.auth = AuthState::SignedOut;
                self.notify(NoticeLevel::Error, "Authentication error", "Could not sign you in. Please try again.");
                Err(StorefrontError::AuthenticationFailed(e))
            }
        }
    }

    pub fn card(&self, product_id: &str) -> Option<&ProductCard> { self.cards.get(product_id) }

    /// Card state for a catalog product, created on first touch.
    pub fn card_mut(&mut self, catalog: &Catalog, product_id: &str) -> Result<&mut ProductCard, StorefrontError> {
        let product = catalog.get(product_id).ok_or_else(|| StorefrontError::ProductNotFound(product_id.to_string()))?;
        let card = self.cards.entry(product_id.to_string()).or_insert_with(|| ProductCard::new(product.clone()));
        Ok(card)
    }

    /// Snapshots the card's current final price into the cart.
    pub fn add_to_cart(&mut self, catalog: &Catalog, product_id: &str) -> Result<CartLineItem, StorefrontError> {
        if catalog.is_unavailable(product_id) {
            self.notify(NoticeLevel::Info, "Product unavailable", "This product will be available soon.");
            return Err(StorefrontError::ProductUnavailable(product_id.to_string()));
        }
        if !self.is_authenticated() {
            debug!(session = %self.id, product_id, "add to cart needs sign-in");
            return Err(StorefrontError::AuthenticationRequired);
        }
        let card = self.card_mut(catalog, product_id)?;
        if !card.product().is_purchasable() {
            return Err(StorefrontError::NotPurchasable(product_id.to_string()));
        }
        let item = CartLineItem::snapshot(card.product(), card.selected_variant(), card.final_price());
        let added = self.cart.add(item).clone();
        info!(session = %self.id, line_id = %added.id, unit_price = %added.unit_price, total = %self.cart.total(), "added to cart");
        self.notify(NoticeLevel::Info, "Product added", &format!("{} has been added to the cart.", added.name));
        self.flush_events();
        Ok(added)
    }

    pub fn remove_from_cart(&mut self, id: &LineItemId) -> Option<CartLineItem> {
        let removed = self.cart.remove(id);
        self.flush_events();
        removed
    }

    pub fn checkout_summary(&self) -> Result<CheckoutSummary, StorefrontError> {
        let identity = self.identity().ok_or(StorefrontError::AuthenticationRequired)?;
        Ok(CheckoutSummary::build(&self.cart, identity))
    }

    /// Applies a finished conversion to its card. A failure on the live request
    /// becomes a notice; the card has already fallen back to USD.
    pub fn finish_conversion(&mut self, ticket: ConversionTicket, result: Result<Money, ConversionError>) -> Option<ConversionError> {
        let card = self.cards.get_mut(&ticket.product_id)?;
        let outcome = card.complete_conversion(ticket, result);
        self.flush_events();
        match outcome {
            Ok(ConversionCommit::Applied(_)) | Ok(ConversionCommit::Discarded) => None,
            Err(e) => {
                self.notify(NoticeLevel::Error, "Conversion error", "Could not fetch the exchange rate. Please try again later.");
                Some(e)
            }
        }
    }

    pub fn notify(&mut self, level: NoticeLevel, title: &str, message: &str) {
        self.notices.push(Notice { level, title: title.to_string(), message: message.to_string(), raised_at: Utc::now() });
    }

    pub fn take_notices(&mut self) -> Vec<Notice> { std::mem::take(&mut self.notices) }

    /// Drains card and cart events into the log.
    pub fn flush_events(&mut self) {
        let mut events = self.cart.take_events();
        for card in self.cards.values_mut() {
            events.extend(card.take_events());
        }
        for event in events {
            match event {
                DomainEvent::Card(e) => debug!(session = %self.id, event = ?e, "card event"),
                DomainEvent::Cart(e) => debug!(session = %self.id, event = ?e, "cart event"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::CouponRegistry;
    use crate::domain::value_objects::CurrencyCode;
    use rust_decimal::Decimal;

    fn signed_in() -> Session {
        let mut s = Session::new();
        s.complete_sign_in(Ok(Identity::anonymous("guest"))).unwrap();
        s.take_notices();
        s
    }

    #[test]
    fn test_add_requires_authentication() {
        let catalog = Catalog::builtin();
        let mut s = Session::new();
        assert!(matches!(s.add_to_cart(&catalog, "file-basic"), Err(StorefrontError::AuthenticationRequired)));
        assert!(s.cart().is_empty());
    }

    #[test]
    fn test_add_snapshots_final_price() {
        let catalog = Catalog::builtin();
        let registry = CouponRegistry::builtin();
        let mut s = signed_in();
        s.card_mut(&catalog, "injector").unwrap().select_variant("30 days").unwrap();
        s.card_mut(&catalog, "injector").unwrap().apply_coupon("IAMBIRD20_05", &registry).unwrap();
        let line = s.add_to_cart(&catalog, "injector").unwrap();
        assert_eq!(line.id.as_str(), "injector-30 days");
        assert_eq!(line.name, "Injector - 30 days");
        assert_eq!(line.unit_price, Decimal::new(20, 0));

        // later coupon changes do not touch the snapshot
        s.card_mut(&catalog, "injector").unwrap().remove_coupon();
        assert_eq!(s.cart().items()[0].unit_price, Decimal::new(20, 0));
        assert_eq!(s.take_notices().len(), 1);
    }

    #[test]
    fn test_duplicate_adds_and_single_remove() {
        let catalog = Catalog::builtin();
        let mut s = signed_in();
        s.add_to_cart(&catalog, "file-basic").unwrap();
        s.add_to_cart(&catalog, "file-basic").unwrap();
        assert_eq!(s.cart().item_count(), 2);
        assert!(s.remove_from_cart(&LineItemId::new("file-basic", None)).is_some());
        assert_eq!(s.cart().item_count(), 1);
        assert!(s.remove_from_cart(&LineItemId::new("missing", None)).is_none());
    }

    #[test]
    fn test_blocked_products() {
        let catalog = Catalog::builtin().with_unavailable(vec!["module-pro".to_string()]);
        let mut s = Session::new();
        assert!(matches!(s.add_to_cart(&catalog, "module-pro"), Err(StorefrontError::ProductUnavailable(_))));
        assert_eq!(s.take_notices()[0].title, "Product unavailable");

        let mut s = signed_in();
        assert!(matches!(s.add_to_cart(&catalog, "injector-elite"), Err(StorefrontError::NotPurchasable(_))));
        assert!(matches!(s.add_to_cart(&catalog, "ghost"), Err(StorefrontError::ProductNotFound(_))));
        assert!(s.cart().is_empty());
    }

    #[test]
    fn test_sign_in_failure() {
        let mut s = Session::new();
        s.begin_sign_in();
        assert!(s.auth().is_loading());
        let err = s.complete_sign_in(Err(AuthError::Unavailable("down".into()))).unwrap_err();
        assert!(matches!(err, StorefrontError::AuthenticationFailed(_)));
        assert!(!s.is_authenticated());
        assert_eq!(s.take_notices()[0].level, NoticeLevel::Error);
    }

    #[test]
    fn test_conversion_failure_keeps_cart() {
        let catalog = Catalog::builtin();
        let mut s = signed_in();
        s.add_to_cart(&catalog, "file-basic").unwrap();
        s.take_notices();
        let ticket = s.card_mut(&catalog, "file-basic").unwrap().select_currency(CurrencyCode::new("EUR").unwrap()).unwrap();
        let err = s.finish_conversion(ticket, Err(ConversionError::Timeout(std::time::Duration::from_secs(5))));
        assert!(matches!(err, Some(ConversionError::Timeout(_))));
        assert!(s.card("file-basic").unwrap().currency().is_base());
        assert_eq!(s.cart().item_count(), 1);
        assert_eq!(s.take_notices()[0].title, "Conversion error");
    }

    #[test]
    fn test_expiry_follows_last_touch() {
        let mut s = Session::new();
        let ttl = Duration::from_secs(60);
        let later = s.last_seen() + chrono::Duration::seconds(61);
        assert!(!s.is_expired(s.last_seen(), ttl));
        assert!(s.is_expired(later, ttl));
        assert!(!s.is_expired(s.last_seen() - chrono::Duration::seconds(5), ttl));

        s.touch();
        assert!(s.last_seen() >= s.created_at());
        assert!(s.is_expired(s.last_seen(), Duration::ZERO));
    }

    #[test]
    fn test_checkout_summary_needs_identity() {
        let s = Session::new();
        assert!(matches!(s.checkout_summary(), Err(StorefrontError::AuthenticationRequired)));
        let summary = signed_in().checkout_summary().unwrap();
        assert!(summary.text.ends_with("User ID: guest"));
    }
}
