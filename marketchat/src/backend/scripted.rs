//! Scripted in-memory [`Marketplace`] for controller unit tests.
//!
//! Holds canned rooms, messages and products. Individual calls can be held
//! open behind a gate so tests control completion order, or made to fail.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};

use marketchat_proto::message::ChatMessage;
use marketchat_proto::model::{MessageId, ProductId, RoomId, Timestamp, UserId};
use marketchat_proto::product::{Product, ProductDraft, ProductStatus};
use marketchat_proto::room::ChatRoom;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use super::{BackendError, Marketplace};

type Gate<T> = oneshot::Receiver<Result<T, BackendError>>;

#[derive(Default)]
pub(crate) struct ScriptedMarketplace {
    pub rooms: Mutex<Vec<ChatRoom>>,
    pub messages: Mutex<HashMap<RoomId, Vec<ChatMessage>>>,
    pub products: Mutex<Vec<Product>>,
    pub wishlist: Mutex<Vec<ProductId>>,
    fail_next: Mutex<HashMap<&'static str, BackendError>>,
    fetch_gates: Mutex<VecDeque<Gate<Vec<ChatMessage>>>>,
    create_gates: Mutex<VecDeque<Gate<ChatRoom>>>,
    send_gates: Mutex<VecDeque<Gate<ChatMessage>>>,
    pub create_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
    pub send_calls: AtomicUsize,
    pub list_room_calls: AtomicUsize,
    pub wishlist_calls: AtomicUsize,
}

impl ScriptedMarketplace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_room(self, room: ChatRoom) -> Self {
        self.messages.lock().entry(room.id).or_default();
        self.rooms.lock().push(room);
        self
    }

    pub fn with_product(self, product: Product) -> Self {
        self.products.lock().push(product);
        self
    }

    /// The next call named `call` fails with `error`.
    pub fn fail_next(&self, call: &'static str, error: BackendError) {
        self.fail_next.lock().insert(call, error);
    }

    /// The next `list_messages` call waits for the returned sender.
    pub fn gate_fetch(&self) -> oneshot::Sender<Result<Vec<ChatMessage>, BackendError>> {
        let (tx, rx) = oneshot::channel();
        self.fetch_gates.lock().push_back(rx);
        tx
    }

    /// The next `create_or_get_room` call waits for the returned sender.
    pub fn gate_create(&self) -> oneshot::Sender<Result<ChatRoom, BackendError>> {
        let (tx, rx) = oneshot::channel();
        self.create_gates.lock().push_back(rx);
        tx
    }

    /// The next `send_message` call waits for the returned sender.
    pub fn gate_send(&self) -> oneshot::Sender<Result<ChatMessage, BackendError>> {
        let (tx, rx) = oneshot::channel();
        self.send_gates.lock().push_back(rx);
        tx
    }

    pub fn push_message(&self, room: RoomId, sender: UserId, content: &str) -> ChatMessage {
        let mut messages = self.messages.lock();
        let log = messages.entry(room).or_default();
        let message = ChatMessage {
            id: MessageId::new(log.len() as u64 + 1),
            room_id: room,
            sender_id: sender,
            sender_name: format!("user-{sender}"),
            content: content.to_string(),
            created_at: Timestamp::from_millis(log.len() as u64 + 1),
        };
        log.push(message.clone());
        message
    }

    fn take_failure(&self, call: &'static str) -> Result<(), BackendError> {
        self.fail_next.lock().remove(call).map_or(Ok(()), Err)
    }

    async fn wait_gate<T>(gate: Option<Gate<T>>) -> Option<Result<T, BackendError>> {
        match gate {
            Some(rx) => Some(
                rx.await
                    .unwrap_or_else(|_| Err(BackendError::Transport("gate dropped".into()))),
            ),
            None => None,
        }
    }
}

pub(crate) fn room(id: u64, product: u64, buyer: u64, seller: u64) -> ChatRoom {
    ChatRoom {
        id: RoomId::new(id),
        product_id: ProductId::new(product),
        product_name: format!("product-{product}"),
        product_image_url: None,
        buyer_id: UserId::new(buyer),
        seller_id: UserId::new(seller),
        counterpart_name: format!("user-{seller}"),
        last_message: None,
        created_at: Timestamp::from_millis(id),
    }
}

pub(crate) fn product(id: u64, owner: u64) -> Product {
    Product {
        id: ProductId::new(id),
        name: format!("product-{id}"),
        description: None,
        price: 10,
        status: ProductStatus::OnSale,
        owner_id: UserId::new(owner),
        owner_name: format!("user-{owner}"),
        image_url: None,
        video_url: None,
        is_wishlisted: false,
        created_at: Timestamp::from_millis(id),
    }
}

pub(crate) fn message(id: u64, room: u64, content: &str) -> ChatMessage {
    ChatMessage {
        id: MessageId::new(id),
        room_id: RoomId::new(room),
        sender_id: UserId::new(1),
        sender_name: "user-1".to_string(),
        content: content.to_string(),
        created_at: Timestamp::from_millis(id),
    }
}

impl Marketplace for ScriptedMarketplace {
    async fn list_products(&self) -> Result<Vec<Product>, BackendError> {
        self.take_failure("list_products")?;
        let wishlist = self.wishlist.lock().clone();
        Ok(self
            .products
            .lock()
            .iter()
            .cloned()
            .map(|mut p| {
                p.is_wishlisted = wishlist.contains(&p.id);
                p
            })
            .collect())
    }

    async fn my_products(&self) -> Result<Vec<Product>, BackendError> {
        self.take_failure("my_products")?;
        Ok(self.products.lock().clone())
    }

    async fn my_wishlist(&self) -> Result<Vec<Product>, BackendError> {
        self.take_failure("my_wishlist")?;
        let wishlist = self.wishlist.lock().clone();
        Ok(self
            .products
            .lock()
            .iter()
            .filter(|p| wishlist.contains(&p.id))
            .cloned()
            .collect())
    }

    async fn create_product(&self, draft: &ProductDraft) -> Result<Product, BackendError> {
        self.take_failure("create_product")?;
        let mut products = self.products.lock();
        let mut created = product(products.len() as u64 + 1, 1);
        created.name.clone_from(&draft.name);
        created.price = draft.price;
        products.push(created.clone());
        Ok(created)
    }

    async fn update_product(
        &self,
        id: ProductId,
        draft: &ProductDraft,
    ) -> Result<Product, BackendError> {
        self.take_failure("update_product")?;
        let mut products = self.products.lock();
        let existing = products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| BackendError::NotFound("product".into()))?;
        existing.name.clone_from(&draft.name);
        existing.price = draft.price;
        Ok(existing.clone())
    }

    async fn set_product_status(
        &self,
        id: ProductId,
        status: ProductStatus,
    ) -> Result<Product, BackendError> {
        self.take_failure("set_product_status")?;
        let mut products = self.products.lock();
        let existing = products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| BackendError::NotFound("product".into()))?;
        existing.status = status;
        Ok(existing.clone())
    }

    async fn delete_product(&self, id: ProductId) -> Result<(), BackendError> {
        self.take_failure("delete_product")?;
        self.products.lock().retain(|p| p.id != id);
        Ok(())
    }

    async fn add_wishlist(&self, id: ProductId) -> Result<(), BackendError> {
        self.wishlist_calls.fetch_add(1, Ordering::SeqCst);
        self.take_failure("add_wishlist")?;
        let mut wishlist = self.wishlist.lock();
        if !wishlist.contains(&id) {
            wishlist.push(id);
        }
        Ok(())
    }

    async fn remove_wishlist(&self, id: ProductId) -> Result<(), BackendError> {
        self.wishlist_calls.fetch_add(1, Ordering::SeqCst);
        self.take_failure("remove_wishlist")?;
        self.wishlist.lock().retain(|p| *p != id);
        Ok(())
    }

    async fn create_or_get_room(&self, product: ProductId) -> Result<ChatRoom, BackendError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.create_gates.lock().pop_front();
        if let Some(result) = Self::wait_gate(gate).await {
            return result;
        }
        self.take_failure("create_or_get_room")?;
        self.rooms
            .lock()
            .iter()
            .find(|r| r.product_id == product)
            .cloned()
            .ok_or_else(|| BackendError::NotFound("product".into()))
    }

    async fn list_my_rooms(&self) -> Result<Vec<ChatRoom>, BackendError> {
        self.list_room_calls.fetch_add(1, Ordering::SeqCst);
        self.take_failure("list_my_rooms")?;
        Ok(self.rooms.lock().clone())
    }

    async fn list_messages(&self, room: RoomId) -> Result<Vec<ChatMessage>, BackendError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.fetch_gates.lock().pop_front();
        if let Some(result) = Self::wait_gate(gate).await {
            return result;
        }
        self.take_failure("list_messages")?;
        Ok(self.messages.lock().get(&room).cloned().unwrap_or_default())
    }

    async fn send_message(&self, room: RoomId, content: &str) -> Result<ChatMessage, BackendError> {
        self.send_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.send_gates.lock().pop_front();
        if let Some(result) = Self::wait_gate(gate).await {
            return result;
        }
        self.take_failure("send_message")?;
        Ok(self.push_message(room, UserId::new(1), content))
    }
}
