//! Integration tests for buyer-seller chat over HTTP.
//!
//! Drives `ChatController` and `CatalogView` against an in-process
//! `marketchat-server`: room entry from a listing, polling delivery of the
//! counterpart's replies, room list previews, and access control.
//!
//! Verification command: `cargo test --test chat_flow`

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::similar_names)]

use std::sync::Arc;
use std::time::Duration;

use marketchat::backend::http::HttpMarketplace;
use marketchat::backend::{BackendError, Marketplace};
use marketchat::catalog::{CatalogError, CatalogView, WishlistPolicy};
use marketchat::chat::{BackOutcome, ChatController, ChatState, EntryMode, IntervalRefresh};
use marketchat::identity::{Credential, IdentityContext};
use marketchat_proto::model::{ProductId, User, UserId};
use marketchat_proto::product::ProductDraft;
use marketchat_server::server::{AppState, start_server_with_state};

// =============================================================================
// Test helpers
// =============================================================================

const ALICE: (u64, &str, &str) = (1, "alice", "tok-alice");
const BOB: (u64, &str, &str) = (2, "bob", "tok-bob");
const CAROL: (u64, &str, &str) = (3, "carol", "tok-carol");

/// Starts a backend with alice, bob and carol provisioned.
async fn start_backend() -> String {
    let state = AppState::with_accounts([ALICE, BOB, CAROL].map(|(id, name, token)| {
        (token.to_string(), User::new(UserId::new(id), name))
    }));
    let (addr, _handle) = start_server_with_state("127.0.0.1:0", Arc::new(state))
        .await
        .expect("failed to start test backend");
    format!("http://{addr}")
}

struct Client {
    identity: Arc<IdentityContext>,
    backend: Arc<HttpMarketplace>,
}

impl Client {
    fn new(base: &str, (id, name, token): (u64, &str, &str)) -> Self {
        let identity = Arc::new(IdentityContext::new(
            User::new(UserId::new(id), name),
            Credential::bearer(token),
        ));
        let backend = Arc::new(
            HttpMarketplace::new(base, Arc::clone(&identity), Duration::from_secs(5)).unwrap(),
        );
        Self { identity, backend }
    }

    fn catalog(&self) -> CatalogView<HttpMarketplace> {
        CatalogView::new(
            Arc::clone(&self.backend),
            Arc::clone(&self.identity),
            WishlistPolicy::Confirm,
        )
    }

    fn chat(&self) -> ChatController<HttpMarketplace> {
        ChatController::new(
            Arc::clone(&self.backend),
            Arc::clone(&self.identity),
            IntervalRefresh::new(Duration::from_millis(100)),
        )
    }
}

/// Pumps `chat` until `done` holds, failing after five seconds.
async fn pump_until(
    chat: &mut ChatController<HttpMarketplace>,
    done: impl Fn(&ChatController<HttpMarketplace>) -> bool,
) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !done(chat) {
            chat.pump().await;
        }
    })
    .await
    .expect("chat never reached the expected state");
}

async fn list_product(seller: &Client, name: &str) -> ProductId {
    seller
        .catalog()
        .create_listing(&ProductDraft::new(name, 120))
        .await
        .unwrap()
        .id
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn buyer_and_seller_exchange_messages() {
    let base = start_backend().await;
    let alice = Client::new(&base, ALICE);
    let bob = Client::new(&base, BOB);
    let product = list_product(&alice, "Road bike").await;

    // Bob finds the listing and opens a chat from it.
    let mut catalog = bob.catalog();
    catalog.load().await.unwrap();
    let target = catalog.chat_target(product).unwrap();

    let mut chat = bob.chat();
    chat.start_chat(target, EntryMode::FromProduct).unwrap();
    pump_until(&mut chat, |c| matches!(c.state(), ChatState::Conversation { .. })).await;
    let room = chat.state().room().unwrap().clone();
    assert_eq!(room.product_id, product);
    assert_eq!(room.counterpart_name, "alice");
    assert!(chat.state().messages().is_empty());

    chat.set_input("hello");
    chat.send().unwrap();
    pump_until(&mut chat, |c| c.state().messages().len() == 1).await;
    assert_eq!(chat.state().messages()[0].content, "hello");
    assert_eq!(chat.input(), "");

    // A few poll cycles later the snapshot still holds exactly one message.
    tokio::time::sleep(Duration::from_millis(250)).await;
    while chat.try_pump().is_some() {}
    assert_eq!(chat.state().messages().len(), 1);

    // Entered from the listing, so back leaves the chat feature.
    assert_eq!(chat.back(), BackOutcome::ExitChat);
    assert_eq!(chat.state(), &ChatState::Idle);

    // Re-entering without a target shows the room with its preview.
    chat.open().unwrap();
    pump_until(&mut chat, |c| matches!(c.state(), ChatState::RoomList { .. })).await;
    let rooms = chat.state().rooms();
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0].id, room.id);
    assert_eq!(rooms[0].counterpart_name, "alice");
    assert_eq!(rooms[0].last_message.as_deref(), Some("hello"));

    // Alice sees the room with Bob's preview and the message itself.
    let alice_rooms = alice.backend.list_my_rooms().await.unwrap();
    assert_eq!(alice_rooms.len(), 1);
    assert_eq!(alice_rooms[0].id, room.id);
    assert_eq!(alice_rooms[0].counterpart_name, "bob");
    assert_eq!(alice_rooms[0].last_message.as_deref(), Some("hello"));
    let seen_by_alice = alice.backend.list_messages(room.id).await.unwrap();
    assert_eq!(seen_by_alice.len(), 1);
    assert_eq!(seen_by_alice[0].sender_id, UserId::new(BOB.0));

    // Bob reopens the room; Alice replies and polling picks it up.
    chat.select_room(room.id).unwrap();
    assert_eq!(chat.entry_mode(), Some(EntryMode::FromRoomList));
    pump_until(&mut chat, |c| c.state().messages().len() == 1).await;
    alice.backend.send_message(room.id, "hi bob").await.unwrap();
    pump_until(&mut chat, |c| c.state().messages().len() == 2).await;
    let reply = &chat.state().messages()[1];
    assert_eq!(reply.content, "hi bob");
    assert!(!chat.is_own(reply));
    assert!(chat.is_own(&chat.state().messages()[0]));
}

#[tokio::test]
async fn room_from_list_returns_to_list() {
    let base = start_backend().await;
    let alice = Client::new(&base, ALICE);
    let bob = Client::new(&base, BOB);
    let product = list_product(&alice, "Lamp").await;
    let room = bob.backend.create_or_get_room(product).await.unwrap();

    let mut chat = alice.chat();
    chat.open().unwrap();
    pump_until(&mut chat, |c| matches!(c.state(), ChatState::RoomList { .. })).await;
    chat.select_room(room.id).unwrap();
    assert_eq!(chat.entry_mode(), Some(EntryMode::FromRoomList));

    chat.set_input("  still available  ");
    chat.send().unwrap();
    pump_until(&mut chat, |c| c.state().messages().len() == 1).await;
    assert_eq!(chat.state().messages()[0].content, "still available");

    assert_eq!(chat.back(), BackOutcome::ShowRoomList);
    pump_until(&mut chat, |c| {
        c.state()
            .rooms()
            .first()
            .is_some_and(|r| r.last_message.as_deref() == Some("still available"))
    })
    .await;
}

#[tokio::test]
async fn room_creation_is_idempotent_per_buyer() {
    let base = start_backend().await;
    let alice = Client::new(&base, ALICE);
    let bob = Client::new(&base, BOB);
    let carol = Client::new(&base, CAROL);
    let product = list_product(&alice, "Desk").await;

    let (first, second) = tokio::join!(
        bob.backend.create_or_get_room(product),
        bob.backend.create_or_get_room(product)
    );
    let first = first.unwrap();
    assert_eq!(first.id, second.unwrap().id);
    assert_eq!(
        bob.backend.create_or_get_room(product).await.unwrap().id,
        first.id
    );

    let carols = carol.backend.create_or_get_room(product).await.unwrap();
    assert_ne!(carols.id, first.id);
    assert_eq!(alice.backend.list_my_rooms().await.unwrap().len(), 2);
    assert_eq!(bob.backend.list_my_rooms().await.unwrap().len(), 1);
}

#[tokio::test]
async fn owner_cannot_chat_about_own_listing() {
    let base = start_backend().await;
    let alice = Client::new(&base, ALICE);
    let product = list_product(&alice, "Chair").await;

    let mut catalog = alice.catalog();
    catalog.load().await.unwrap();
    assert!(matches!(
        catalog.chat_target(product),
        Err(CatalogError::NotPermitted { .. })
    ));

    // The backend enforces the same rule, and the controller falls back.
    let mut chat = alice.chat();
    chat.start_chat(product, EntryMode::FromProduct).unwrap();
    pump_until(&mut chat, |c| !c.is_entering()).await;
    assert_eq!(chat.state(), &ChatState::Idle);
    assert!(matches!(
        chat.notice().map(|n| &n.error),
        Some(BackendError::Forbidden(_))
    ));
}

#[tokio::test]
async fn outsiders_cannot_read_or_write_a_room() {
    let base = start_backend().await;
    let alice = Client::new(&base, ALICE);
    let bob = Client::new(&base, BOB);
    let carol = Client::new(&base, CAROL);
    let product = list_product(&alice, "Kettle").await;
    let room = bob.backend.create_or_get_room(product).await.unwrap();

    assert!(matches!(
        carol.backend.list_messages(room.id).await,
        Err(BackendError::Forbidden(_))
    ));
    assert!(matches!(
        carol.backend.send_message(room.id, "let me in").await,
        Err(BackendError::Forbidden(_))
    ));
    assert!(bob.backend.list_messages(room.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_product_and_room_are_not_found() {
    let base = start_backend().await;
    let bob = Client::new(&base, BOB);
    assert!(matches!(
        bob.backend.create_or_get_room(ProductId::new(999)).await,
        Err(BackendError::NotFound(_))
    ));
    assert!(matches!(
        bob.backend
            .list_messages(marketchat_proto::model::RoomId::new(999))
            .await,
        Err(BackendError::NotFound(_))
    ));
}

#[tokio::test]
async fn rooms_survive_listing_deletion() {
    let base = start_backend().await;
    let alice = Client::new(&base, ALICE);
    let bob = Client::new(&base, BOB);
    let product = list_product(&alice, "Tent").await;
    let room = bob.backend.create_or_get_room(product).await.unwrap();
    bob.backend.send_message(room.id, "is it waterproof?").await.unwrap();

    let mut catalog = alice.catalog();
    catalog.load().await.unwrap();
    catalog.delete_listing(product).await.unwrap();

    let rooms = bob.backend.list_my_rooms().await.unwrap();
    assert_eq!(rooms.len(), 1);
    assert_eq!(bob.backend.list_messages(room.id).await.unwrap().len(), 1);
}
