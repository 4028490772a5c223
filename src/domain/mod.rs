//! Domain model: cart, wishlist and reservations
pub mod aggregates;
pub mod events;
pub mod value_objects;
