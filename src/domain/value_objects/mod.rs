//! Value Objects for the storefront session

mod product;

pub use product::{ProductImage, ProductSnapshot};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Money value object
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money { amount: Decimal, currency: String }

impl Money {
    pub fn new(amount: Decimal, currency: &str) -> Self { Self { amount, currency: currency.to_string() } }
    pub fn zero(currency: &str) -> Self { Self::new(Decimal::ZERO, currency) }
    pub fn amount(&self) -> Decimal { self.amount }
    pub fn currency(&self) -> &str { &self.currency }
}

impl Default for Money { fn default() -> Self { Self::zero(DEFAULT_CURRENCY) } }

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{} {:.2}", self.currency, self.amount) }
}

/// Ghanaian cedi; the storefront prices everything in ₵ unless configured otherwise.
pub const DEFAULT_CURRENCY: &str = "GHS";

/// Identity of a cart line: the product plus the selected size and color.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineKey {
    pub product_id: String,
    pub size: String,
    pub color: String,
}

impl LineKey {
    pub fn new(product_id: impl Into<String>, size: impl Into<String>, color: impl Into<String>) -> Self {
        Self { product_id: product_id.into(), size: size.into(), color: color.into() }
    }

    pub fn matches(&self, product_id: &str, size: &str, color: &str) -> bool {
        same_line((&self.product_id, &self.size, &self.color), (product_id, size, color))
    }
}

impl fmt::Display for LineKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{} ({} / {})", self.product_id, self.size, self.color) }
}

/// Whether two `(product_id, size, color)` triples denote the same cart line.
///
/// Exact string comparison on all three fields: no case folding, no trimming.
pub fn same_line(a: (&str, &str, &str), b: (&str, &str, &str)) -> bool {
    a.0 == b.0 && a.1 == b.1 && a.2 == b.2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_line_exact_match() {
        assert!(same_line(("P1", "M", "Black"), ("P1", "M", "Black")));
        assert!(!same_line(("P1", "M", "Black"), ("P2", "M", "Black")));
        assert!(!same_line(("P1", "M", "Black"), ("P1", "L", "Black")));
        assert!(!same_line(("P1", "M", "Black"), ("P1", "M", "White")));
    }

    #[test]
    fn test_same_line_is_case_and_whitespace_sensitive() {
        assert!(!same_line(("P1", "M", "Black"), ("P1", "m", "Black")));
        assert!(!same_line(("P1", "M", "Black"), ("P1", "M", "black")));
        assert!(!same_line(("P1", "M", "Black"), ("P1", "M ", "Black")));
    }

    #[test]
    fn test_line_key_matches() {
        let key = LineKey::new("P1", "M", "Black");
        assert!(key.matches("P1", "M", "Black"));
        assert!(!key.matches("P1", "M", "Navy"));
        assert_eq!(key.to_string(), "P1 (M / Black)");
    }

    #[test]
    fn test_money_display() {
        let price = Money::new(Decimal::new(4950, 2), "GHS");
        assert_eq!(price.to_string(), "GHS 49.50");
        assert_eq!(Money::default().currency(), DEFAULT_CURRENCY);
    }
}
