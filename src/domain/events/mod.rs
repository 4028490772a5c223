//! Domain events
use crate::domain::value_objects::LineKey;

#[derive(Clone, Debug, PartialEq)]
pub enum DomainEvent {
    Cart(CartEvent),
    Wishlist(WishlistEvent),
}

#[derive(Clone, Debug, PartialEq)]
pub enum CartEvent {
    ItemAdded { key: LineKey, quantity: u32, merged: bool },
    QuantityChanged { key: LineKey, quantity: u32 },
    ItemRemoved { key: LineKey },
    Cleared { lines: usize },
}

#[derive(Clone, Debug, PartialEq)]
pub enum WishlistEvent {
    Saved { product_id: String },
    Removed { product_id: String },
    Cleared { entries: usize },
}
