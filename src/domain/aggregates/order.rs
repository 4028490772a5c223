//! Order Aggregate
//!
//! The storefront takes reservations, not payments: placing an order puts a
//! hold on the items and staff follow up to arrange payment and delivery.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};
use crate::domain::aggregates::cart::{Cart, CartLine};
use crate::domain::value_objects::Money;

#[derive(Clone, Debug, Serialize)]
pub struct Reservation {
    id: Uuid,
    status: OrderStatus,
    customer_email: String,
    items: Vec<ReservationItem>,
    total_price: Money,
    shipping_address: Address,
    billing_address: Address,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReservationItem { pub product_id: String, pub name: String, pub quantity: u32, pub unit_price: Decimal, pub size: String, pub color: String }

impl ReservationItem {
    pub fn line_total(&self) -> Decimal { self.unit_price.saturating_mul(Decimal::from(self.quantity)) }
}

impl From<&CartLine> for ReservationItem {
    fn from(line: &CartLine) -> Self {
        Self {
            product_id: line.product_id.clone(), name: line.product.name.clone(), quantity: line.quantity,
            unit_price: line.unit_price(), size: line.size.clone(), color: line.color.clone(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address { pub first_name: String, pub last_name: String, pub phone: Option<String>, pub address: String, pub city: String, pub state: String, pub zip_code: String, pub country: String }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus { #[default] Pending, Processing, Shipped, Delivered, Cancelled }

impl OrderStatus {
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!((self, next), (Pending, Processing) | (Processing, Shipped) | (Shipped, Delivered))
            || (next == Cancelled && !matches!(self, Delivered | Cancelled))
    }
}

/// Contact and delivery details collected at checkout.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct ShippingInfo {
    #[validate(length(min = 1))] pub first_name: String,
    #[validate(length(min = 1))] pub last_name: String,
    #[validate(email)] pub email: String,
    #[validate(length(min = 1))] pub phone: String,
    #[validate(length(min = 1))] pub address: String,
    #[validate(length(min = 1))] pub city: String,
    #[validate(length(min = 1))] pub state: String,
    #[validate(length(min = 1))] pub zip_code: String,
    #[validate(length(min = 1))] pub country: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct BillingInfo {
    #[validate(length(min = 1))] pub first_name: String,
    #[validate(length(min = 1))] pub last_name: String,
    #[validate(length(min = 1))] pub address: String,
    #[validate(length(min = 1))] pub city: String,
    #[validate(length(min = 1))] pub state: String,
    #[validate(length(min = 1))] pub zip_code: String,
    #[validate(length(min = 1))] pub country: String,
}

/// Checkout form. A missing `billing` means "same as shipping".
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckoutDetails {
    pub shipping: ShippingInfo,
    #[serde(default)]
    pub billing: Option<BillingInfo>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl CheckoutDetails {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        self.shipping.validate()?;
        if let Some(billing) = &self.billing { billing.validate()?; }
        Ok(())
    }
}

impl From<&ShippingInfo> for Address {
    fn from(s: &ShippingInfo) -> Self {
        Self {
            first_name: s.first_name.clone(), last_name: s.last_name.clone(), phone: Some(s.phone.clone()),
            address: s.address.clone(), city: s.city.clone(), state: s.state.clone(), zip_code: s.zip_code.clone(), country: s.country.clone(),
        }
    }
}

impl From<&BillingInfo> for Address {
    fn from(b: &BillingInfo) -> Self {
        Self {
            first_name: b.first_name.clone(), last_name: b.last_name.clone(), phone: None,
            address: b.address.clone(), city: b.city.clone(), state: b.state.clone(), zip_code: b.zip_code.clone(), country: b.country.clone(),
        }
    }
}

impl Reservation {
    /// Builds a pending reservation from the cart's current lines.
    ///
    /// The cart itself is left untouched; clearing it is the caller's job once
    /// the reservation has been accepted.
    pub fn place(cart: &Cart, details: &CheckoutDetails) -> Result<Self, CheckoutError> {
        if cart.is_empty() { return Err(CheckoutError::EmptyCart); }
        details.validate()?;
        let items: Vec<ReservationItem> = cart.lines().iter().map(ReservationItem::from).collect();
        let total = items.iter().map(ReservationItem::line_total).fold(Decimal::ZERO, Decimal::saturating_add);
        let shipping_address = Address::from(&details.shipping);
        let billing_address = details.billing.as_ref().map_or_else(|| shipping_address.clone(), Address::from);
        let notes = details.notes.as_deref().map(str::trim).filter(|n| !n.is_empty()).map(str::to_string);
        let now = Utc::now();
        Ok(Self {
            id: Uuid::now_v7(), status: OrderStatus::Pending, customer_email: details.shipping.email.clone(),
            items, total_price: Money::new(total, cart.currency()), shipping_address, billing_address, notes,
            created_at: now, updated_at: now,
        })
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn status(&self) -> OrderStatus { self.status }
    pub fn customer_email(&self) -> &str { &self.customer_email }
    pub fn items(&self) -> &[ReservationItem] { &self.items }
    pub fn total_price(&self) -> &Money { &self.total_price }
    pub fn shipping_address(&self) -> &Address { &self.shipping_address }
    pub fn billing_address(&self) -> &Address { &self.billing_address }
    pub fn notes(&self) -> Option<&str> { self.notes.as_deref() }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }

    pub fn transition_to(&mut self, next: OrderStatus) -> Result<(), OrderError> {
        if !self.status.can_transition_to(next) { return Err(OrderError::InvalidTransition { from: self.status, to: next }); }
        self.status = next;
        self.touch();
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), OrderError> { self.transition_to(OrderStatus::Cancelled) }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Cart is empty")]
    EmptyCart,
    #[error("Invalid checkout details: {0}")]
    InvalidDetails(#[from] ValidationErrors),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("Cannot move order from {from:?} to {to:?}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
}
