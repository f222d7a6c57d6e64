//! Integration tests for the catalog and wishlist over HTTP.
//!
//! Verifies viewer-relative projection (`is_owner`, `is_wishlisted`),
//! owner-only listing management, and the confirm-then-refresh and
//! optimistic wishlist policies against a live backend.
//!
//! Verification command: `cargo test --test catalog_wishlist`

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use marketchat::backend::http::HttpMarketplace;
use marketchat::backend::{BackendError, Marketplace};
use marketchat::catalog::{CatalogError, CatalogView, WishlistPolicy, WishlistTransition};
use marketchat::identity::{Credential, IdentityContext};
use marketchat_proto::model::{ProductId, User, UserId};
use marketchat_proto::product::{ProductDraft, ProductStatus};
use marketchat_server::server::{AppState, start_server_with_state};

async fn start_backend() -> String {
    let state = AppState::with_accounts([
        ("tok-alice".to_string(), User::new(UserId::new(1), "alice")),
        ("tok-bob".to_string(), User::new(UserId::new(2), "bob")),
        ("tok-carol".to_string(), User::new(UserId::new(3), "carol")),
    ]);
    let (addr, _handle) = start_server_with_state("127.0.0.1:0", Arc::new(state))
        .await
        .expect("failed to start test backend");
    format!("http://{addr}")
}

fn backend(base: &str, id: u64, name: &str) -> (Arc<HttpMarketplace>, Arc<IdentityContext>) {
    let identity = Arc::new(IdentityContext::new(
        User::new(UserId::new(id), name),
        Credential::bearer(format!("tok-{name}")),
    ));
    let backend = Arc::new(
        HttpMarketplace::new(base, Arc::clone(&identity), Duration::from_secs(5)).unwrap(),
    );
    (backend, identity)
}

async fn catalog(
    base: &str,
    id: u64,
    name: &str,
    policy: WishlistPolicy,
) -> CatalogView<HttpMarketplace> {
    let (backend, identity) = backend(base, id, name);
    let mut view = CatalogView::new(backend, identity, policy);
    view.load().await.unwrap();
    view
}

async fn seed(base: &str) -> ProductId {
    let mut alice = catalog(base, 1, "alice", WishlistPolicy::Confirm).await;
    alice
        .create_listing(&ProductDraft::new("Camera", 300).with_description("  barely used  "))
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn listings_are_projected_per_viewer() {
    let base = start_backend().await;
    let product = seed(&base).await;

    let alice = catalog(&base, 1, "alice", WishlistPolicy::Confirm).await;
    let bob = catalog(&base, 2, "bob", WishlistPolicy::Confirm).await;

    let as_owner = alice.entry(product).unwrap();
    assert!(as_owner.is_owner);
    assert!(as_owner.actions().edit && !as_owner.actions().start_chat);
    assert_eq!(
        as_owner.product.description.as_deref(),
        Some("barely used")
    );

    let as_visitor = bob.entry(product).unwrap();
    assert!(!as_visitor.is_owner);
    assert!(as_visitor.actions().start_chat && as_visitor.actions().toggle_wishlist);
}

#[tokio::test]
async fn wishlist_is_per_user_and_confirmed_by_refresh() {
    let base = start_backend().await;
    let product = seed(&base).await;

    let mut bob = catalog(&base, 2, "bob", WishlistPolicy::Confirm).await;
    let outcome = bob.toggle_wishlist(product).await.unwrap();
    assert_eq!(
        outcome,
        WishlistTransition::Confirmed {
            product_id: product,
            wishlisted: true,
        }
    );
    assert!(bob.entry(product).unwrap().product.is_wishlisted);
    assert_eq!(bob.my_wishlist().await.unwrap().len(), 1);

    // Carol's view of the same product is unaffected.
    let carol = catalog(&base, 3, "carol", WishlistPolicy::Confirm).await;
    assert!(!carol.entry(product).unwrap().product.is_wishlisted);

    bob.toggle_wishlist(product).await.unwrap();
    assert!(!bob.entry(product).unwrap().product.is_wishlisted);
    assert!(bob.my_wishlist().await.unwrap().is_empty());
}

#[tokio::test]
async fn owner_cannot_wishlist_own_listing() {
    let base = start_backend().await;
    let product = seed(&base).await;

    let mut alice = catalog(&base, 1, "alice", WishlistPolicy::Confirm).await;
    assert!(matches!(
        alice.toggle_wishlist(product).await,
        Err(CatalogError::NotPermitted { .. })
    ));

    let (raw, _identity) = backend(&base, 1, "alice");
    assert!(matches!(
        raw.add_wishlist(product).await,
        Err(BackendError::Forbidden(_))
    ));
}

#[tokio::test]
async fn optimistic_toggle_rolls_back_when_listing_vanishes() {
    let base = start_backend().await;
    let product = seed(&base).await;
    let mut bob = catalog(&base, 2, "bob", WishlistPolicy::Optimistic).await;

    let mut alice = catalog(&base, 1, "alice", WishlistPolicy::Confirm).await;
    alice.delete_listing(product).await.unwrap();

    let outcome = bob.toggle_wishlist(product).await.unwrap();
    assert!(matches!(
        outcome,
        WishlistTransition::RolledBack {
            restored: false,
            error: BackendError::NotFound(_),
            ..
        }
    ));
    assert!(!bob.entry(product).unwrap().product.is_wishlisted);
    assert!(bob.notice().is_some());
}

#[tokio::test]
async fn only_the_owner_manages_a_listing() {
    let base = start_backend().await;
    let product = seed(&base).await;

    let mut alice = catalog(&base, 1, "alice", WishlistPolicy::Confirm).await;
    let sold = alice
        .set_status(product, ProductStatus::SoldOut)
        .await
        .unwrap();
    assert_eq!(sold.status, ProductStatus::SoldOut);
    let renamed = alice
        .update_listing(product, &ProductDraft::new("Camera + lens", 350))
        .await
        .unwrap();
    assert_eq!(renamed.name, "Camera + lens");
    assert_eq!(alice.my_listings().await.unwrap().len(), 1);

    // Sold out still lets buyers chat.
    let bob = catalog(&base, 2, "bob", WishlistPolicy::Confirm).await;
    assert_eq!(
        bob.entry(product).unwrap().product.status,
        ProductStatus::SoldOut
    );
    assert!(bob.chat_target(product).is_ok());

    // Bypassing the client-side gate still hits the backend's check.
    let (raw, _identity) = backend(&base, 2, "bob");
    assert!(matches!(
        raw.update_product(product, &ProductDraft::new("stolen", 1))
            .await,
        Err(BackendError::Forbidden(_))
    ));
    assert!(matches!(
        raw.delete_product(product).await,
        Err(BackendError::Forbidden(_))
    ));
}
