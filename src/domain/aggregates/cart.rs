//! Cart Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use crate::domain::aggregates::product::{Product, Variant};
use crate::domain::events::{CartEvent, DomainEvent};
use crate::domain::value_objects::{LineItemId, Money};

/// Price snapshot of one purchased unit. Never mutated once in the cart.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartLineItem {
    pub id: LineItemId,
    pub product_id: String,
    pub name: String,
    pub unit_price: Decimal,
    pub added_at: DateTime<Utc>,
}

impl CartLineItem {
    pub fn snapshot(product: &Product, variant: Option<&Variant>, unit_price: Decimal) -> Self {
        let label = variant.map(|v| v.label.as_str());
        let name = match label {
            Some(label) => format!("{} - {}", product.name, label),
            None => product.name.clone(),
        };
        Self { id: LineItemId::new(&product.id, label), product_id: product.id.clone(), name, unit_price, added_at: Utc::now() }
    }
}

/// Ordered ledger of line items. Duplicates are kept as separate entries.
#[derive(Clone, Debug, Default)]
pub struct Cart {
    items: Vec<CartLineItem>,
    events: Vec<DomainEvent>,
}

impl Cart {
    pub fn new() -> Self { Self::default() }

    pub fn items(&self) -> &[CartLineItem] { &self.items }
    pub fn item_count(&self) -> usize { self.items.len() }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    pub fn add(&mut self, item: CartLineItem) -> &CartLineItem {
        self.raise_event(DomainEvent::Cart(CartEvent::ItemAdded { line_id: item.id.clone(), unit_price: item.unit_price }));
        self.items.push(item);
        &self.items[self.items.len() - 1]
    }

    /// Removes the first entry with this id. Unknown ids are a no-op.
    pub fn remove(&mut self, id: &LineItemId) -> Option<CartLineItem> {
        let index = self.items.iter().position(|i| &i.id == id)?;
        let removed = self.items.remove(index);
        self.raise_event(DomainEvent::Cart(CartEvent::ItemRemoved { line_id: removed.id.clone() }));
        Some(removed)
    }

    /// Sum of unit prices, saturating at `Decimal::MAX`.
    pub fn total(&self) -> Decimal { self.items.iter().fold(Decimal::ZERO, |acc, i| acc.saturating_add(i.unit_price)) }
    pub fn total_money(&self) -> Money { Money::usd(self.total()) }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn item(id: &str, cents: i64) -> CartLineItem {
        CartLineItem::snapshot(&Product::new(id, id.to_uppercase(), Decimal::ZERO), None, Decimal::new(cents, 2))
    }

    #[test]
    fn test_cart_operations() {
        let mut cart = Cart::new();
        assert_eq!(cart.total(), Decimal::ZERO);
        cart.add(item("a", 1800));
        cart.add(item("b", 500));
        cart.add(item("a", 2000));
        assert_eq!(cart.item_count(), 3);
        assert_eq!(cart.total(), Decimal::new(4300, 2));

        let removed = cart.remove(&LineItemId::new("a", None)).unwrap();
        assert_eq!(removed.unit_price, Decimal::new(1800, 2)); // first match
        let ids: Vec<_> = cart.items().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(cart.total_money().display(), "$25.00");
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let mut cart = Cart::new();
        cart.add(item("a", 100));
        cart.take_events();
        assert!(cart.remove(&LineItemId::new("zzz", None)).is_none());
        assert_eq!(cart.item_count(), 1);
        assert!(cart.take_events().is_empty());
    }

    #[test]
    fn test_snapshot_with_variant() {
        let p = Product::new("panel", "Panel", Decimal::ONE).with_variant("30 days", Decimal::new(15, 0));
        let line = CartLineItem::snapshot(&p, p.variant("30 days"), Decimal::new(1350, 2));
        assert_eq!(line.id.as_str(), "panel-30 days");
        assert_eq!(line.name, "Panel - 30 days");
        assert_eq!(line.unit_price, Decimal::new(1350, 2));
    }

    #[test]
    fn test_total_saturates() {
        let mut cart = Cart::new();
        let huge = CartLineItem::snapshot(&Product::new("big", "Big", Decimal::ZERO), None, Decimal::MAX);
        cart.add(huge.clone());
        cart.add(huge);
        assert_eq!(cart.total(), Decimal::MAX);
    }

    #[test]
    fn test_duplicates_remove_one() {
        let mut cart = Cart::new();
        cart.add(item("a", 100));
        cart.add(item("a", 100));
        cart.remove(&LineItemId::new("a", None));
        assert_eq!(cart.item_count(), 1);
        assert_eq!(cart.items()[0].id.as_str(), "a");
    }

    proptest! {
        #[test]
        fn total_is_sum_of_prices(prices in prop::collection::vec(0i64..1_000_000, 0..20)) {
            let mut cart = Cart::new();
            for (i, cents) in prices.iter().enumerate() {
                cart.add(item(&format!("p{i}"), *cents));
            }
            let expected: i64 = prices.iter().sum();
            prop_assert_eq!(cart.total(), Decimal::new(expected, 2));
        }

        #[test]
        fn add_then_remove_restores_sequence(count in 0usize..10, cents in 0i64..100_000) {
            let mut cart = Cart::new();
            for i in 0..count {
                cart.add(item(&format!("p{i}"), 100));
            }
            let before = cart.items().to_vec();
            let added = cart.add(item("fresh", cents)).id.clone();
            cart.remove(&added);
            prop_assert_eq!(cart.items(), before.as_slice());
        }
    }
}
