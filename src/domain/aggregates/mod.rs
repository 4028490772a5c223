//! Aggregates module
pub mod cart;
pub mod order;
pub mod wishlist;

pub use cart::{Cart, CartError, CartLine};
pub use order::{Address, BillingInfo, CheckoutDetails, CheckoutError, OrderError, OrderStatus, Reservation, ReservationItem, ShippingInfo};
pub use wishlist::{Wishlist, WishlistEntry};
