//! Integration tests for the HTTP backend contract.
//!
//! Checks that `HttpMarketplace` maps every failure class the backend can
//! produce onto the right `BackendError` variant.
//!
//! Verification command: `cargo test --test http_backend`

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use marketchat::backend::http::HttpMarketplace;
use marketchat::backend::{BackendError, Marketplace};
use marketchat::identity::{Credential, IdentityContext};
use marketchat_proto::message::MAX_MESSAGE_SIZE;
use marketchat_proto::model::{User, UserId};
use marketchat_proto::product::ProductDraft;
use marketchat_server::server::{AppState, start_server_with_state};

async fn start_backend() -> String {
    let state = AppState::with_accounts([
        ("tok-alice".to_string(), User::new(UserId::new(1), "alice")),
        ("tok-bob".to_string(), User::new(UserId::new(2), "bob")),
    ]);
    let (addr, _handle) = start_server_with_state("127.0.0.1:0", Arc::new(state))
        .await
        .expect("failed to start test backend");
    format!("http://{addr}")
}

fn client(base: &str, id: u64, name: &str, token: &str) -> HttpMarketplace {
    let identity = Arc::new(IdentityContext::new(
        User::new(UserId::new(id), name),
        Credential::bearer(token),
    ));
    HttpMarketplace::new(base, identity, Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn unknown_token_is_unauthorized() {
    let base = start_backend().await;
    let mallory = client(&base, 9, "mallory", "forged");
    assert_eq!(
        mallory.list_products().await.unwrap_err(),
        BackendError::Unauthorized
    );
    assert_eq!(
        mallory.list_my_rooms().await.unwrap_err(),
        BackendError::Unauthorized
    );
}

#[tokio::test]
async fn invalid_bodies_are_validation_errors() {
    let base = start_backend().await;
    let alice = client(&base, 1, "alice", "tok-alice");
    let bob = client(&base, 2, "bob", "tok-bob");

    assert!(matches!(
        alice.create_product(&ProductDraft::new("", 5)).await,
        Err(BackendError::Validation(_))
    ));

    let product = alice
        .create_product(&ProductDraft::new("Guitar", 80))
        .await
        .unwrap();
    let room = bob.create_or_get_room(product.id).await.unwrap();

    assert!(matches!(
        bob.send_message(room.id, "   ").await,
        Err(BackendError::Validation(_))
    ));
    let oversized = "x".repeat(MAX_MESSAGE_SIZE + 1);
    assert!(matches!(
        bob.send_message(room.id, &oversized).await,
        Err(BackendError::Validation(_))
    ));
    assert!(bob.list_messages(room.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn messages_come_back_in_order_and_trimmed() {
    let base = start_backend().await;
    let alice = client(&base, 1, "alice", "tok-alice");
    let bob = client(&base, 2, "bob", "tok-bob");
    let product = alice
        .create_product(&ProductDraft::new("Sofa", 200))
        .await
        .unwrap();
    let room = bob.create_or_get_room(product.id).await.unwrap();

    for text in ["one", "  two  ", "three"] {
        bob.send_message(room.id, text).await.unwrap();
    }
    alice.send_message(room.id, "four").await.unwrap();

    let messages = alice.list_messages(room.id).await.unwrap();
    let contents: Vec<_> = messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, ["one", "two", "three", "four"]);
    assert!(
        messages
            .windows(2)
            .all(|pair| pair[0].ordering_key() < pair[1].ordering_key())
    );
}

#[tokio::test]
async fn products_are_listed_newest_first() {
    let base = start_backend().await;
    let alice = client(&base, 1, "alice", "tok-alice");
    for name in ["first", "second", "third"] {
        alice
            .create_product(&ProductDraft::new(name, 1))
            .await
            .unwrap();
    }
    let names: Vec<_> = alice
        .list_products()
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(names, ["third", "second", "first"]);
}
