//! Order summary text handed to the contact channel.

use rust_decimal::Decimal;
use serde::Serialize;
use crate::auth::Identity;
use crate::domain::aggregates::Cart;
use crate::domain::value_objects::Money;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CheckoutSummary {
    pub text: String,
    pub total: Decimal,
    pub item_count: usize,
}

impl CheckoutSummary {
    /// One `- name` line per item in cart order, the USD total and the requester id.
    pub fn build(cart: &Cart, requester: &Identity) -> Self {
        let lines: Vec<String> = cart.items().iter().map(|i| format!("- {}", i.name)).collect();
        let total = cart.total();
        let text = format!(
            "Hi, I'm interested in purchasing the following products:\n{}\nTotal: {}\n\nMy details:\nUser ID: {}",
            lines.join("\n"),
            Money::usd(total).display(),
            requester.uid,
        );
        Self { text, total, item_count: cart.item_count() }
    }
}
