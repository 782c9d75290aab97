//! Domain events
use crate::domain::value_objects::{CouponCode, CurrencyCode, LineItemId};
use rust_decimal::Decimal;

#[derive(Clone, Debug, PartialEq)]
pub enum DomainEvent {
    Card(CardEvent),
    Cart(CartEvent),
}

#[derive(Clone, Debug, PartialEq)]
pub enum CardEvent {
    VariantSelected { product_id: String, label: String, base_price: Decimal },
    CouponApplied { product_id: String, code: CouponCode, final_price: Decimal },
    CouponRemoved { product_id: String, code: CouponCode },
    CurrencySelected { product_id: String, currency: CurrencyCode },
    ConversionDiscarded { product_id: String, generation: u64 },
}

#[derive(Clone, Debug, PartialEq)]
pub enum CartEvent {
    ItemAdded { line_id: LineItemId, unit_price: Decimal },
    ItemRemoved { line_id: LineItemId },
}
