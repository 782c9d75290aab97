//! Product card selection state.
//!
//! Tracks the selected variant, the applied coupon and the display currency
//! for one product. Changing the variant or the product always drops the
//! coupon and reprices from the new base with no discount.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info};
use crate::domain::aggregates::product::{Product, Variant};
use crate::domain::events::{CardEvent, DomainEvent};
use crate::domain::value_objects::{CurrencyCode, Money};
use crate::pricing::coupons::{AppliedCoupon, CouponRegistry};
use crate::pricing::currency::{ConversionCommit, ConversionError, ConversionState, ConversionTicket};
use crate::pricing::resolver;
use crate::StorefrontError;

#[derive(Clone, Debug)]
pub struct ProductCard {
    product: Arc<Product>,
    selected_label: Option<String>,
    applied_coupon: Option<AppliedCoupon>,
    coupon_error: Option<String>,
    final_price: Decimal,
    currency: CurrencyCode,
    conversion: ConversionState,
    generation: u64,
    events: Vec<DomainEvent>,
}

impl ProductCard {
    pub fn new(product: Arc<Product>) -> Self {
        let selected_label = product.default_variant().map(|v| v.label.clone());
        let mut card = Self {
            product, selected_label, applied_coupon: None, coupon_error: None, final_price: Decimal::ZERO,
            currency: CurrencyCode::usd(), conversion: ConversionState::Idle, generation: 0, events: vec![],
        };
        card.final_price = card.resolve();
        card
    }

    pub fn product(&self) -> &Product { &self.product }
    pub fn selected_variant(&self) -> Option<&Variant> {
        self.selected_label.as_deref().and_then(|label| self.product.variant(label))
    }
    pub fn base_price(&self) -> Decimal { self.product.base_price(self.selected_variant()) }
    pub fn final_price(&self) -> Decimal { self.final_price }
    pub fn applied_coupon(&self) -> Option<&AppliedCoupon> { self.applied_coupon.as_ref() }
    pub fn coupon_error(&self) -> Option<&str> { self.coupon_error.as_deref() }
    pub fn currency(&self) -> &CurrencyCode { &self.currency }
    pub fn conversion(&self) -> &ConversionState { &self.conversion }
    pub fn is_converting(&self) -> bool { self.conversion == ConversionState::Pending }
    pub fn rendered_features(&self) -> Vec<String> { self.product.rendered_features(self.selected_variant()) }

    /// Switches variant. Selecting the current variant again changes nothing.
    pub fn select_variant(&mut self, label: &str) -> Result<Option<ConversionTicket>, StorefrontError> {
        let variant = self.product.variant(label).ok_or_else(|| StorefrontError::VariantNotFound {
            product_id: self.product.id.clone(),
            label: label.to_string(),
        })?;
        if self.selected_label.as_deref() == Some(label) {
            return Ok(None);
        }
        let base_price = variant.price;
        self.selected_label = Some(label.to_string());
        self.clear_coupon();
        info!(product_id = %self.product.id, label, %base_price, "variant selected");
        self.raise_event(DomainEvent::Card(CardEvent::VariantSelected {
            product_id: self.product.id.clone(), label: label.to_string(), base_price,
        }));
        Ok(self.reprice())
    }

    /// Rejections are recorded on the card and returned; price and coupon stay as they were.
    pub fn apply_coupon(&mut self, code: &str, registry: &CouponRegistry) -> Result<Option<ConversionTicket>, StorefrontError> {
        let applied = match resolver::accept_coupon(&self.product, code, registry) {
            Ok(applied) => applied,
            Err(e) => {
                self.coupon_error = Some(e.to_string());
                return Err(e);
            }
        };
        self.coupon_error = None;
        let code = applied.code.clone();
        self.applied_coupon = Some(applied);
        let ticket = self.reprice();
        info!(product_id = %self.product.id, %code, final_price = %self.final_price, "coupon applied");
        self.raise_event(DomainEvent::Card(CardEvent::CouponApplied {
            product_id: self.product.id.clone(), code, final_price: self.final_price,
        }));
        Ok(ticket)
    }

    pub fn remove_coupon(&mut self) -> Option<ConversionTicket> {
        self.coupon_error = None;
        let removed = self.applied_coupon.take()?;
        self.raise_event(DomainEvent::Card(CardEvent::CouponRemoved {
            product_id: self.product.id.clone(), code: removed.code,
        }));
        self.reprice()
    }

    /// Picks the display currency. Any request still in flight is superseded.
    pub fn select_currency(&mut self, currency: CurrencyCode) -> Option<ConversionTicket> {
        self.raise_event(DomainEvent::Card(CardEvent::CurrencySelected {
            product_id: self.product.id.clone(), currency: currency.clone(),
        }));
        self.currency = currency;
        self.request_conversion()
    }

    /// Commits a finished conversion if its ticket is still the newest one.
    /// A failure on the newest ticket reverts the card to USD and is returned to the caller.
    pub fn complete_conversion(&mut self, ticket: ConversionTicket, result: Result<Money, ConversionError>) -> Result<ConversionCommit, ConversionError> {
        if ticket.generation != self.generation {
            debug!(product_id = %self.product.id, generation = ticket.generation, current = self.generation, "stale conversion discarded");
            self.raise_event(DomainEvent::Card(CardEvent::ConversionDiscarded {
                product_id: self.product.id.clone(), generation: ticket.generation,
            }));
            return Ok(ConversionCommit::Discarded);
        }
        match result {
            Ok(amount) => {
                self.conversion = ConversionState::Converted(amount.clone());
                Ok(ConversionCommit::Applied(amount))
            }
            Err(e) => {
                self.currency = CurrencyCode::usd();
                self.conversion = ConversionState::Idle;
                Err(e)
            }
        }
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }

    fn resolve(&self) -> Decimal {
        resolver::resolve(&self.product, self.selected_variant(), self.applied_coupon.as_ref())
    }

    fn clear_coupon(&mut self) {
        self.applied_coupon = None;
        self.coupon_error = None;
    }

    fn reprice(&mut self) -> Option<ConversionTicket> {
        self.final_price = self.resolve();
        self.request_conversion()
    }

    fn request_conversion(&mut self) -> Option<ConversionTicket> {
        self.generation += 1;
        if self.currency.is_base() {
            self.conversion = ConversionState::Idle;
            return None;
        }
        self.conversion = ConversionState::Pending;
        Some(ConversionTicket {
            product_id: self.product.id.clone(),
            generation: self.generation,
            amount: self.final_price,
            currency: self.currency.clone(),
        })
    }

    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}
