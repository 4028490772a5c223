//! JSON API over storefront sessions

use std::sync::{Arc, MutexGuard};
use std::time::Duration;
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        FromRequest, FromRequestParts, Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use crate::domain::aggregates::{Cart, CartLine, CheckoutDetails, CheckoutError, Reservation, Wishlist, WishlistEntry};
use crate::domain::value_objects::{LineKey, Money, ProductSnapshot};
use crate::realtime::DebouncedReloader;
use crate::session::{SessionError, SessionRegistry, SharedSession, StorefrontSession};
use crate::{Result, StorefrontError};

#[derive(Clone, Debug)]
pub struct AppState {
    pub sessions: Arc<SessionRegistry>,
    pub storage_events: Arc<DebouncedReloader>,
}

impl AppState {
    /// Builds the state and starts the reloader that re-reads sessions after storage events.
    ///
    /// Must be called from inside a tokio runtime.
    pub fn new(sessions: Arc<SessionRegistry>, debounce: Duration) -> Self {
        let registry = Arc::clone(&sessions);
        let storage_events = DebouncedReloader::spawn("storage-events", debounce, move || {
            let registry = Arc::clone(&registry);
            async move {
                let refreshed = registry.rehydrate_all()?;
                tracing::info!(refreshed, "sessions rehydrated from storage");
                Ok::<(), SessionError>(())
            }
        });
        Self { sessions, storage_events: Arc::new(storage_events) }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "storefront"})) }))
        .route("/api/v1/cart/:session", get(get_cart).delete(clear_cart))
        .route("/api/v1/cart/:session/items", post(add_to_cart).put(update_quantity).delete(remove_from_cart))
        .route("/api/v1/wishlist/:session", get(get_wishlist).post(add_to_wishlist).delete(clear_wishlist))
        .route("/api/v1/wishlist/:session/:product_id", get(is_wishlisted).delete(remove_from_wishlist))
        .route("/api/v1/checkout/:session", post(checkout))
        .route("/api/v1/storage-events", post(storage_event))
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct CartView { pub lines: Vec<CartLine>, pub item_count: u64, pub subtotal: Money, pub currency: String }

impl From<&Cart> for CartView {
    fn from(cart: &Cart) -> Self {
        Self { lines: cart.lines().to_vec(), item_count: cart.item_count(), subtotal: cart.subtotal(), currency: cart.currency().to_string() }
    }
}

#[derive(Debug, Serialize)]
pub struct WishlistView { pub entries: Vec<WishlistEntry>, pub count: usize }

impl From<&Wishlist> for WishlistView {
    fn from(wishlist: &Wishlist) -> Self { Self { entries: wishlist.entries().to_vec(), count: wishlist.len() } }
}

#[derive(Debug, Deserialize)]
pub struct AddToCartRequest { pub product: ProductSnapshot, #[serde(default = "one")] pub quantity: u32, pub size: String, pub color: String }

fn one() -> u32 { 1 }

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest { pub product_id: String, pub size: String, pub color: String, pub quantity: i64 }

#[derive(Debug, Deserialize)]
pub struct AddToWishlistRequest { pub product: ProductSnapshot }

/// `Json` whose rejections come back as `{ "error": ... }` like every other failure.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(StorefrontError))]
pub struct JsonBody<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(StorefrontError))]
pub struct QueryParams<T>(pub T);

impl From<JsonRejection> for StorefrontError {
    fn from(rejection: JsonRejection) -> Self { StorefrontError::InvalidRequest(rejection.body_text()) }
}

impl From<QueryRejection> for StorefrontError {
    fn from(rejection: QueryRejection) -> Self { StorefrontError::InvalidRequest(rejection.body_text()) }
}

fn open(state: &AppState, id: &str) -> Result<SharedSession> { Ok(state.sessions.session(id)?) }

fn lock<'a>(session: &'a SharedSession) -> Result<MutexGuard<'a, StorefrontSession>> {
    session.lock().map_err(|e| SessionError::LockPoisoned(e.get_ref().id().to_string()).into())
}

async fn get_cart(State(s): State<AppState>, Path(id): Path<String>) -> Result<Json<CartView>> {
    let session = open(&s, &id)?;
    let session = lock(&session)?;
    Ok(Json(CartView::from(session.cart())))
}

async fn add_to_cart(State(s): State<AppState>, Path(id): Path<String>, JsonBody(r): JsonBody<AddToCartRequest>) -> Result<(StatusCode, Json<CartView>)> {
    let session = open(&s, &id)?;
    let mut session = lock(&session)?;
    session.add_to_cart(r.product, r.quantity, &r.size, &r.color)?;
    Ok((StatusCode::CREATED, Json(CartView::from(session.cart()))))
}

async fn update_quantity(State(s): State<AppState>, Path(id): Path<String>, JsonBody(r): JsonBody<UpdateQuantityRequest>) -> Result<Json<CartView>> {
    let session = open(&s, &id)?;
    let mut session = lock(&session)?;
    session.update_cart_quantity(&r.product_id, &r.size, &r.color, r.quantity)?;
    Ok(Json(CartView::from(session.cart())))
}

async fn remove_from_cart(State(s): State<AppState>, Path(id): Path<String>, QueryParams(key): QueryParams<LineKey>) -> Result<Json<CartView>> {
    let session = open(&s, &id)?;
    let mut session = lock(&session)?;
    session.remove_from_cart(&key.product_id, &key.size, &key.color);
    Ok(Json(CartView::from(session.cart())))
}

async fn clear_cart(State(s): State<AppState>, Path(id): Path<String>) -> Result<StatusCode> {
    let session = open(&s, &id)?;
    lock(&session)?.clear_cart();
    Ok(StatusCode::NO_CONTENT)
}

async fn get_wishlist(State(s): State<AppState>, Path(id): Path<String>) -> Result<Json<WishlistView>> {
    let session = open(&s, &id)?;
    let session = lock(&session)?;
    Ok(Json(WishlistView::from(session.wishlist())))
}

async fn add_to_wishlist(State(s): State<AppState>, Path(id): Path<String>, JsonBody(r): JsonBody<AddToWishlistRequest>) -> Result<(StatusCode, Json<WishlistView>)> {
    let session = open(&s, &id)?;
    let mut session = lock(&session)?;
    let status = if session.add_to_wishlist(r.product) { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(WishlistView::from(session.wishlist()))))
}

async fn clear_wishlist(State(s): State<AppState>, Path(id): Path<String>) -> Result<StatusCode> {
    let session = open(&s, &id)?;
    lock(&session)?.clear_wishlist();
    Ok(StatusCode::NO_CONTENT)
}

async fn is_wishlisted(State(s): State<AppState>, Path((id, product_id)): Path<(String, String)>) -> Result<Json<serde_json::Value>> {
    let session = open(&s, &id)?;
    let wishlisted = lock(&session)?.is_wishlisted(&product_id);
    Ok(Json(serde_json::json!({ "product_id": product_id, "wishlisted": wishlisted })))
}

async fn remove_from_wishlist(State(s): State<AppState>, Path((id, product_id)): Path<(String, String)>) -> Result<Json<WishlistView>> {
    let session = open(&s, &id)?;
    let mut session = lock(&session)?;
    session.remove_from_wishlist(&product_id);
    Ok(Json(WishlistView::from(session.wishlist())))
}

async fn checkout(State(s): State<AppState>, Path(id): Path<String>, JsonBody(details): JsonBody<CheckoutDetails>) -> Result<(StatusCode, Json<Reservation>)> {
    let session = open(&s, &id)?;
    let reservation = lock(&session)?.place_reservation(&details)?;
    Ok((StatusCode::CREATED, Json(reservation)))
}

/// Another writer touched the shared storage; re-read open sessions once things settle.
async fn storage_event(State(s): State<AppState>) -> StatusCode {
    s.storage_events.notify();
    StatusCode::ACCEPTED
}

impl IntoResponse for StorefrontError {
    fn into_response(self) -> Response {
        let status = match &self {
            StorefrontError::Cart(_) | StorefrontError::Session(SessionError::InvalidId(_)) | StorefrontError::InvalidRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            StorefrontError::Checkout(CheckoutError::EmptyCart) => StatusCode::CONFLICT,
            StorefrontError::Checkout(CheckoutError::InvalidDetails(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            StorefrontError::Session(SessionError::LockPoisoned(_)) | StorefrontError::Storage(_) | StorefrontError::Config(_) => {
                tracing::error!(error = %self, "request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
