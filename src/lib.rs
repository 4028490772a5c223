//! Storefront session core
//!
//! Client-side shopping state for a direct-to-consumer fashion storefront.
//!
//! ## Features
//! - Cart with size/color-aware line merging and derived totals
//! - Wishlist of saved products
//! - Write-through persistence to a pluggable key-value store
//! - Reservation checkout (orders are held, not paid)
//! - Debounced reloads for screens fed by realtime change notifications

pub mod config;
pub mod domain;
pub mod http;
pub mod persistence;
pub mod realtime;
pub mod session;

use thiserror::Error;

pub use config::{Config, ConfigError};
pub use domain::aggregates::{CartError, CheckoutError};
pub use persistence::StoreError;
pub use session::{SessionError, SessionRegistry, SessionSettings, StorefrontSession};

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum StorefrontError {
    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

pub type Result<T> = std::result::Result<T, StorefrontError>;
