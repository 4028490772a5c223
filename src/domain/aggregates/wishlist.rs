//! Wishlist Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::domain::events::{DomainEvent, WishlistEvent};
use crate::domain::value_objects::ProductSnapshot;

/// Products the shopper saved for later. Presence only: no size, color or quantity.
#[derive(Clone, Debug, Default)]
pub struct Wishlist {
    entries: Vec<WishlistEntry>,
    events: Vec<DomainEvent>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WishlistEntry {
    pub product_id: String,
    pub product: ProductSnapshot,
    pub added_at: DateTime<Utc>,
}

impl Wishlist {
    pub fn new() -> Self { Self::default() }

    /// Rebuilds a wishlist from persisted entries, keeping the first entry per product.
    ///
    /// An entry's `product_id` is taken from its product snapshot.
    pub fn restore(entries: Vec<WishlistEntry>) -> Self {
        let mut wishlist = Self::new();
        for mut entry in entries {
            if entry.product_id != entry.product.id { entry.product_id = entry.product.id.clone(); }
            if !wishlist.is_wishlisted(&entry.product_id) { wishlist.entries.push(entry); }
        }
        wishlist
    }

    pub fn entries(&self) -> &[WishlistEntry] { &self.entries }
    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn is_wishlisted(&self, product_id: &str) -> bool {
        self.entries.iter().any(|e| e.product_id == product_id)
    }

    /// Returns whether the product was newly saved.
    pub fn add_item(&mut self, product: ProductSnapshot) -> bool { self.add_item_at(product, Utc::now()) }

    pub fn add_item_at(&mut self, product: ProductSnapshot, added_at: DateTime<Utc>) -> bool {
        if self.is_wishlisted(&product.id) { return false; }
        let product_id = product.id.clone();
        self.entries.push(WishlistEntry { product_id: product_id.clone(), product, added_at });
        self.raise_event(WishlistEvent::Saved { product_id });
        true
    }

    /// Returns whether an entry was removed.
    pub fn remove_item(&mut self, product_id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.product_id != product_id);
        if self.entries.len() == before { return false; }
        self.raise_event(WishlistEvent::Removed { product_id: product_id.to_string() });
        true
    }

    pub fn clear(&mut self) {
        if self.entries.is_empty() { return; }
        let entries = self.entries.len();
        self.entries.clear();
        self.raise_event(WishlistEvent::Cleared { entries });
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: WishlistEvent) { self.events.push(DomainEvent::Wishlist(e)); }
}
