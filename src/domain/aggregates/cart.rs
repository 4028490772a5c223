//! Cart Aggregate

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use crate::domain::events::{CartEvent, DomainEvent};
use crate::domain::value_objects::{same_line, LineKey, Money, ProductSnapshot};

#[derive(Clone, Debug)]
pub struct Cart {
    lines: Vec<CartLine>,
    currency: String,
    events: Vec<DomainEvent>,
}

/// One product in one size and color, with how many of it the shopper wants.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: String,
    pub product: ProductSnapshot,
    pub quantity: u32,
    pub size: String,
    pub color: String,
}

impl CartLine {
    pub fn key(&self) -> LineKey { LineKey::new(&self.product_id, &self.size, &self.color) }
    pub fn is_line(&self, product_id: &str, size: &str, color: &str) -> bool {
        same_line((&self.product_id, &self.size, &self.color), (product_id, size, color))
    }
    pub fn unit_price(&self) -> Decimal { self.product.unit_price() }
    pub fn line_total(&self) -> Decimal { self.unit_price().saturating_mul(Decimal::from(self.quantity)) }
}

fn checked_line_total(unit_price: Decimal, quantity: u32) -> Option<Decimal> { unit_price.checked_mul(Decimal::from(quantity)) }

impl Cart {
    pub fn new(currency: &str) -> Self {
        Self { lines: vec![], currency: currency.to_string(), events: vec![] }
    }

    /// Rebuilds a cart from persisted lines.
    ///
    /// Lines that repeat an identity are merged, and lines with a zero
    /// quantity or a blank size/color are dropped, so a hand-edited or stale
    /// snapshot cannot break the one-line-per-identity invariant. The line's
    /// `product_id` is taken from its product snapshot. A line that would push
    /// the subtotal past what a `Decimal` can hold is dropped.
    pub fn restore(currency: &str, lines: Vec<CartLine>) -> Self {
        let mut cart = Self::new(currency);
        for mut line in lines {
            if line.quantity == 0 || line.size.is_empty() || line.color.is_empty() { continue; }
            if line.product_id != line.product.id { line.product_id = line.product.id.clone(); }
            if !cart.fits_merge(&line) { continue; }
            cart.merge(line);
        }
        cart.events.clear();
        cart
    }

    pub fn currency(&self) -> &str { &self.currency }
    pub fn lines(&self) -> &[CartLine] { &self.lines }
    pub fn len(&self) -> usize { self.lines.len() }
    pub fn is_empty(&self) -> bool { self.lines.is_empty() }

    pub fn line(&self, product_id: &str, size: &str, color: &str) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.is_line(product_id, size, color))
    }

    /// Total number of units across all lines.
    pub fn item_count(&self) -> u64 { self.lines.iter().map(|l| u64::from(l.quantity)).sum() }

    /// Sum of `unit price * quantity`, recomputed from the lines on every call.
    ///
    /// Mutations refuse any change whose subtotal would overflow, so the
    /// saturating arithmetic here never actually clamps.
    pub fn subtotal(&self) -> Money {
        let total = self.lines.iter().map(CartLine::line_total).fold(Decimal::ZERO, Decimal::saturating_add);
        Money::new(total, &self.currency)
    }

    pub fn add_item(&mut self, product: ProductSnapshot, quantity: u32, size: impl Into<String>, color: impl Into<String>) -> Result<(), CartError> {
        let (size, color) = (size.into(), color.into());
        if quantity == 0 { return Err(CartError::InvalidQuantity); }
        if size.is_empty() { return Err(CartError::MissingSize); }
        if color.is_empty() { return Err(CartError::MissingColor); }
        let line = CartLine { product_id: product.id.clone(), product, quantity, size, color };
        if !self.fits_merge(&line) { return Err(CartError::TotalOverflow); }
        self.merge(line);
        Ok(())
    }

    /// Sets the quantity of a line. Zero or negative removes it.
    ///
    /// Returns whether a line was found.
    pub fn update_quantity(&mut self, product_id: &str, size: &str, color: &str, quantity: i64) -> Result<bool, CartError> {
        if quantity <= 0 { return Ok(self.remove_item(product_id, size, color)); }
        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        let Some(idx) = self.lines.iter().position(|l| l.is_line(product_id, size, color)) else { return Ok(false) };
        if self.total_with(idx, self.lines[idx].unit_price(), quantity).is_none() { return Err(CartError::TotalOverflow); }
        let line = &mut self.lines[idx];
        line.quantity = quantity;
        let key = line.key();
        self.raise_event(CartEvent::QuantityChanged { key, quantity });
        Ok(true)
    }

    /// Returns whether a line was removed.
    pub fn remove_item(&mut self, product_id: &str, size: &str, color: &str) -> bool {
        let Some(idx) = self.lines.iter().position(|l| l.is_line(product_id, size, color)) else { return false };
        let line = self.lines.remove(idx);
        self.raise_event(CartEvent::ItemRemoved { key: line.key() });
        true
    }

    pub fn clear(&mut self) {
        if self.lines.is_empty() { return; }
        let lines = self.lines.len();
        self.lines.clear();
        self.raise_event(CartEvent::Cleared { lines });
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }

    /// Whether merging `line` in keeps the subtotal representable.
    fn fits_merge(&self, line: &CartLine) -> bool {
        match self.lines.iter().position(|l| l.is_line(&line.product_id, &line.size, &line.color)) {
            Some(idx) => {
                let existing = &self.lines[idx];
                self.total_with(idx, existing.unit_price(), existing.quantity.saturating_add(line.quantity)).is_some()
            }
            None => self.total_with(self.lines.len(), line.unit_price(), line.quantity).is_some(),
        }
    }

    /// Subtotal with the line at `idx` (or a new one when `idx == len`) priced at `unit_price * quantity`.
    fn total_with(&self, idx: usize, unit_price: Decimal, quantity: u32) -> Option<Decimal> {
        let others = self.lines.iter().enumerate().filter(|(i, _)| *i != idx)
            .try_fold(Decimal::ZERO, |acc, (_, l)| acc.checked_add(checked_line_total(l.unit_price(), l.quantity)?))?;
        others.checked_add(checked_line_total(unit_price, quantity)?)
    }

    fn merge(&mut self, line: CartLine) {
        let key = line.key();
        if let Some(existing) = self.lines.iter_mut().find(|l| l.is_line(&line.product_id, &line.size, &line.color)) {
            // No stock cap: reservations are confirmed by staff, not deducted here.
            existing.quantity = existing.quantity.saturating_add(line.quantity);
            let quantity = existing.quantity;
            self.raise_event(CartEvent::ItemAdded { key, quantity, merged: true });
        } else {
            let quantity = line.quantity;
            self.lines.push(line);
            self.raise_event(CartEvent::ItemAdded { key, quantity, merged: false });
        }
    }

    fn raise_event(&mut self, e: CartEvent) { self.events.push(DomainEvent::Cart(e)); }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("Quantity must be at least 1")]
    InvalidQuantity,
    #[error("A size must be selected")]
    MissingSize,
    #[error("A color must be selected")]
    MissingColor,
    #[error("Cart total is too large")]
    TotalOverflow,
}
