//! Durable storage for session state
pub mod bridge;
pub mod store;

pub use bridge::{namespaced_key, observer, PersistenceBridge, PersistenceFailure, PersistenceObserver};
pub use store::{FileStore, KeyValueStore, MemoryStore, StoreError};
