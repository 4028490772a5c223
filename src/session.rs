//! Session-scoped shopping state
//!
//! A [`StorefrontSession`] owns one cart and one wishlist and is the only
//! thing that mutates them. Every mutation writes the new snapshot through to
//! storage before returning, so reopening the session picks up where the
//! shopper left off.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use thiserror::Error;
use tracing::{debug, info};
use crate::config::Config;
use crate::domain::aggregates::{Cart, CartError, CartLine, CheckoutDetails, CheckoutError, Reservation, Wishlist, WishlistEntry};
use crate::domain::events::DomainEvent;
use crate::domain::value_objects::{Money, ProductSnapshot, DEFAULT_CURRENCY};
use crate::persistence::{namespaced_key, KeyValueStore, PersistenceBridge, PersistenceObserver};

const CART_SLOT: &str = "cart";
const WISHLIST_SLOT: &str = "wishlist";
const MAX_SESSION_ID_LEN: usize = 64;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Invalid session id {0:?}")]
    InvalidId(String),
    #[error("Session {0} lock poisoned")]
    LockPoisoned(String),
}

#[derive(Clone, Debug)]
pub struct SessionSettings {
    pub storage_prefix: String,
    pub currency: String,
}

impl Default for SessionSettings {
    fn default() -> Self { Self { storage_prefix: "storefront".to_string(), currency: DEFAULT_CURRENCY.to_string() } }
}

impl From<&Config> for SessionSettings {
    fn from(config: &Config) -> Self {
        Self { storage_prefix: config.storage_prefix.clone(), currency: config.currency.clone() }
    }
}

/// Session ids double as storage key segments: 1 to 64 characters of `[A-Za-z0-9_-]`.
pub fn validate_session_id(id: &str) -> Result<(), SessionError> {
    let valid = !id.is_empty() && id.len() <= MAX_SESSION_ID_LEN && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid { Ok(()) } else { Err(SessionError::InvalidId(id.to_string())) }
}

#[derive(Debug)]
pub struct StorefrontSession {
    id: String,
    cart: Cart,
    wishlist: Wishlist,
    cart_store: PersistenceBridge<CartLine>,
    wishlist_store: PersistenceBridge<WishlistEntry>,
}

impl StorefrontSession {
    pub fn open(store: Arc<dyn KeyValueStore>, id: &str, settings: &SessionSettings) -> Result<Self, SessionError> {
        Self::open_observed(store, id, settings, None)
    }

    /// Opens a session whose swallowed persistence failures are also reported to `observer`.
    pub fn open_observed(store: Arc<dyn KeyValueStore>, id: &str, settings: &SessionSettings, observer: Option<PersistenceObserver>) -> Result<Self, SessionError> {
        validate_session_id(id)?;
        let cart_store = PersistenceBridge::new(Arc::clone(&store), namespaced_key(&settings.storage_prefix, id, CART_SLOT))
            .with_observer(observer.clone());
        let wishlist_store = PersistenceBridge::new(store, namespaced_key(&settings.storage_prefix, id, WISHLIST_SLOT))
            .with_observer(observer);
        let cart = Cart::restore(&settings.currency, cart_store.load());
        let wishlist = Wishlist::restore(wishlist_store.load());
        debug!(session = %id, lines = cart.len(), saved = wishlist.len(), "session opened");
        Ok(Self { id: id.to_string(), cart, wishlist, cart_store, wishlist_store })
    }

    /// Re-reads both snapshots from storage, replacing the in-memory state.
    ///
    /// Memory wins over storage when the last write of a slot failed: that
    /// slot is written again instead of read. A snapshot that cannot be read
    /// or decoded leaves the in-memory state alone.
    pub fn rehydrate(&mut self) {
        if self.cart_store.has_unsaved_changes() {
            debug!(session = %self.id, "cart has unsaved changes, retrying write");
            self.cart_store.save(self.cart.lines());
        } else if let Some(lines) = self.cart_store.try_load() {
            self.cart = Cart::restore(self.cart.currency(), lines);
        }
        if self.wishlist_store.has_unsaved_changes() {
            debug!(session = %self.id, "wishlist has unsaved changes, retrying write");
            self.wishlist_store.save(self.wishlist.entries());
        } else if let Some(entries) = self.wishlist_store.try_load() {
            self.wishlist = Wishlist::restore(entries);
        }
    }

    pub fn id(&self) -> &str { &self.id }
    pub fn cart(&self) -> &Cart { &self.cart }
    pub fn wishlist(&self) -> &Wishlist { &self.wishlist }
    pub fn item_count(&self) -> u64 { self.cart.item_count() }
    pub fn subtotal(&self) -> Money { self.cart.subtotal() }
    pub fn is_wishlisted(&self, product_id: &str) -> bool { self.wishlist.is_wishlisted(product_id) }

    pub fn add_to_cart(&mut self, product: ProductSnapshot, quantity: u32, size: &str, color: &str) -> Result<(), CartError> {
        self.cart.add_item(product, quantity, size, color)?;
        self.persist_cart();
        Ok(())
    }

    pub fn update_cart_quantity(&mut self, product_id: &str, size: &str, color: &str, quantity: i64) -> Result<bool, CartError> {
        let changed = self.cart.update_quantity(product_id, size, color, quantity)?;
        if changed { self.persist_cart(); }
        Ok(changed)
    }

    pub fn remove_from_cart(&mut self, product_id: &str, size: &str, color: &str) -> bool {
        let removed = self.cart.remove_item(product_id, size, color);
        self.persist_cart();
        removed
    }

    /// Empties the cart and deletes its stored snapshot.
    pub fn clear_cart(&mut self) {
        self.cart.clear();
        let events = self.cart.take_events();
        self.log_events(events);
        self.cart_store.clear();
    }

    pub fn add_to_wishlist(&mut self, product: ProductSnapshot) -> bool {
        let added = self.wishlist.add_item(product);
        self.persist_wishlist();
        added
    }

    pub fn remove_from_wishlist(&mut self, product_id: &str) -> bool {
        let removed = self.wishlist.remove_item(product_id);
        self.persist_wishlist();
        removed
    }

    pub fn clear_wishlist(&mut self) {
        self.wishlist.clear();
        self.persist_wishlist();
    }

    /// Turns the cart into a pending reservation and empties the cart.
    ///
    /// On error the cart is left exactly as it was.
    pub fn place_reservation(&mut self, details: &CheckoutDetails) -> Result<Reservation, CheckoutError> {
        let reservation = Reservation::place(&self.cart, details)?;
        self.clear_cart();
        info!(session = %self.id, reservation = %reservation.id(), total = %reservation.total_price(), "reservation placed");
        Ok(reservation)
    }

    fn persist_cart(&mut self) {
        let events = self.cart.take_events();
        self.log_events(events);
        self.cart_store.save(self.cart.lines());
    }

    fn persist_wishlist(&mut self) {
        let events = self.wishlist.take_events();
        self.log_events(events);
        self.wishlist_store.save(self.wishlist.entries());
    }

    fn log_events(&self, events: Vec<DomainEvent>) {
        for event in events { debug!(session = %self.id, ?event, "session updated"); }
    }
}

pub type SharedSession = Arc<Mutex<StorefrontSession>>;

/// Open sessions keyed by id, all persisting into the same store.
pub struct SessionRegistry {
    store: Arc<dyn KeyValueStore>,
    settings: SessionSettings,
    observer: Option<PersistenceObserver>,
    sessions: RwLock<HashMap<String, SharedSession>>,
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry").field("settings", &self.settings).field("open", &self.len()).finish()
    }
}

impl SessionRegistry {
    pub fn new(store: Arc<dyn KeyValueStore>, settings: SessionSettings) -> Self {
        Self { store, settings, observer: None, sessions: RwLock::new(HashMap::new()) }
    }

    pub fn with_observer(mut self, observer: PersistenceObserver) -> Self { self.observer = Some(observer); self }

    pub fn settings(&self) -> &SessionSettings { &self.settings }

    pub fn len(&self) -> usize { self.sessions.read().map(|s| s.len()).unwrap_or(0) }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Returns the open session for `id`, opening it from storage on first use.
    pub fn session(&self, id: &str) -> Result<SharedSession, SessionError> {
        validate_session_id(id)?;
        if let Some(session) = self.sessions.read().map_err(|_| SessionError::LockPoisoned("registry".into()))?.get(id) {
            return Ok(Arc::clone(session));
        }
        let mut sessions = self.sessions.write().map_err(|_| SessionError::LockPoisoned("registry".into()))?;
        if let Some(session) = sessions.get(id) { return Ok(Arc::clone(session)); }
        let session = StorefrontSession::open_observed(Arc::clone(&self.store), id, &self.settings, self.observer.clone())?;
        let session = Arc::new(Mutex::new(session));
        sessions.insert(id.to_string(), Arc::clone(&session));
        Ok(session)
    }

    /// Re-reads every open session from storage. Returns how many were refreshed.
    pub fn rehydrate_all(&self) -> Result<usize, SessionError> {
        let sessions: Vec<SharedSession> = self.sessions.read()
            .map_err(|_| SessionError::LockPoisoned("registry".into()))?
            .values().cloned().collect();
        for session in &sessions {
            session.lock().map_err(|e| SessionError::LockPoisoned(e.get_ref().id.clone()))?.rehydrate();
        }
        Ok(sessions.len())
    }
}
