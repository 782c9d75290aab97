//! Aggregates module
pub mod product;
pub mod card;
pub mod cart;

pub use product::{Product, ProductError, Variant};
pub use card::ProductCard;
pub use cart::{Cart, CartLineItem};
