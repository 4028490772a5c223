use std::sync::{Arc, Mutex};

use rust_decimal::Decimal;
use storefront::domain::aggregates::{CheckoutDetails, ShippingInfo};
use storefront::domain::value_objects::ProductSnapshot;
use storefront::persistence::{observer, FileStore, KeyValueStore, MemoryStore};
use storefront::{SessionSettings, StorefrontSession};

fn product_a() -> ProductSnapshot {
    ProductSnapshot::new("A", "Pleated Midi Skirt", Decimal::new(180, 0)).with_image("https://cdn.example.com/a.jpg")
}

fn shipping() -> ShippingInfo {
    ShippingInfo {
        first_name: "Efua".into(),
        last_name: "Owusu".into(),
        email: "efua@example.com".into(),
        phone: "+233244000111".into(),
        address: "7 Cantonments Rd".into(),
        city: "Accra".into(),
        state: "Greater Accra".into(),
        zip_code: "GA-001".into(),
        country: "Ghana".into(),
    }
}

#[test]
fn cart_walkthrough_survives_reload() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(dir.path()).unwrap());
    let settings = SessionSettings::default();

    let mut session = StorefrontSession::open(Arc::clone(&store), "guest-1", &settings).unwrap();
    session.add_to_cart(product_a(), 2, "M", "Black").unwrap();
    session.add_to_cart(product_a(), 1, "M", "Black").unwrap();
    assert_eq!(session.cart().len(), 1);
    assert_eq!(session.cart().lines()[0].quantity, 3);

    session.add_to_cart(product_a(), 1, "L", "Black").unwrap();
    assert_eq!(session.cart().len(), 2);

    session.update_cart_quantity("A", "M", "Black", 0).unwrap();
    assert_eq!(session.cart().len(), 1);
    assert_eq!(session.item_count(), 1);
    assert_eq!(session.subtotal().amount(), Decimal::new(180, 0));

    drop(session);
    let reopened = StorefrontSession::open(store, "guest-1", &settings).unwrap();
    assert_eq!(reopened.cart().len(), 1);
    assert_eq!(reopened.cart().lines()[0].size, "L");
    assert_eq!(reopened.cart().lines()[0].product.images[0].url, "https://cdn.example.com/a.jpg");
}

#[test]
fn corrupt_snapshot_opens_empty() {
    let store = MemoryStore::new();
    store.set("storefront:guest-2:cart", "this is not json").unwrap();
    store.set("storefront:guest-2:wishlist", r#"[{"id":"legacy"}]"#).unwrap();

    let session = StorefrontSession::open(Arc::new(store), "guest-2", &SessionSettings::default()).unwrap();
    assert!(session.cart().is_empty());
    assert!(session.wishlist().is_empty());
}

#[test]
fn failed_writes_keep_memory_state_and_reach_observer() {
    let failures = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&failures);
    let hook = observer(move |failure| sink.lock().unwrap().push(failure.key().to_string()));

    let store = MemoryStore::with_quota(64);
    let mut session = StorefrontSession::open_observed(Arc::new(store.clone()), "guest-3", &SessionSettings::default(), Some(hook)).unwrap();
    session.add_to_cart(product_a(), 1, "S", "Ivory").unwrap();

    assert_eq!(session.item_count(), 1);
    assert_eq!(store.get("storefront:guest-3:cart").unwrap(), None);
    assert_eq!(*failures.lock().unwrap(), vec!["storefront:guest-3:cart".to_string()]);
}

#[test]
fn reservation_empties_cart_everywhere() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let settings = SessionSettings::default();
    let mut session = StorefrontSession::open(Arc::clone(&store), "guest-4", &settings).unwrap();
    let sandals = ProductSnapshot::new("B", "Strappy Sandals", Decimal::new(120, 0)).with_sale_price(Decimal::new(99, 0));
    session.add_to_cart(product_a(), 2, "M", "Black").unwrap();
    session.add_to_cart(sandals, 1, "39", "Gold").unwrap();
    session.add_to_wishlist(product_a());
    let subtotal = session.subtotal();

    let details = CheckoutDetails { shipping: shipping(), billing: None, notes: None };
    let reservation = session.place_reservation(&details).unwrap();

    assert_eq!(reservation.total_price(), &subtotal);
    assert_eq!(reservation.total_price().amount(), Decimal::new(459, 0));
    assert!(session.cart().is_empty());
    assert_eq!(store.get("storefront:guest-4:cart").unwrap(), None);

    let reopened = StorefrontSession::open(store, "guest-4", &settings).unwrap();
    assert!(reopened.cart().is_empty());
    assert!(reopened.is_wishlisted("A"));
}

#[test]
fn rejected_checkout_leaves_cart_alone() {
    let mut session = StorefrontSession::open(Arc::new(MemoryStore::new()), "guest-5", &SessionSettings::default()).unwrap();
    session.add_to_cart(product_a(), 1, "M", "Black").unwrap();

    let mut details = CheckoutDetails { shipping: shipping(), billing: None, notes: None };
    details.shipping.phone.clear();
    assert!(session.place_reservation(&details).is_err());
    assert_eq!(session.item_count(), 1);
}
