//! Product snapshot carried inside cart lines and wishlist entries

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Denormalized product data captured when the shopper saved or added it.
///
/// Snapshots are never re-fetched: a price change in the catalog does not
/// move the price of a line already sitting in the cart.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub id: String,
    pub name: String,
    pub price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sale_price: Option<Decimal>,
    #[serde(default)]
    pub images: Vec<ProductImage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sizes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub colors: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductImage {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<String>,
}

impl ProductSnapshot {
    pub fn new(id: impl Into<String>, name: impl Into<String>, price: Decimal) -> Self {
        Self { id: id.into(), name: name.into(), price, sale_price: None, images: vec![], sizes: vec![], colors: vec![] }
    }

    pub fn with_sale_price(mut self, sale_price: Decimal) -> Self { self.sale_price = Some(sale_price); self }

    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.images.push(ProductImage { url: url.into(), alt_text: None });
        self
    }

    /// Price charged per unit: the sale price when one is set, the list price otherwise.
    pub fn unit_price(&self) -> Decimal { self.sale_price.unwrap_or(self.price) }

    pub fn is_on_sale(&self) -> bool { self.sale_price.is_some() }

    pub fn primary_image(&self) -> Option<&ProductImage> { self.images.first() }
}
