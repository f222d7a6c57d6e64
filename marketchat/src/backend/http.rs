//! HTTP implementation of [`Marketplace`].
//!
//! Speaks the JSON API served by `marketchat-server`: bearer token in the
//! `Authorization` header, structured [`ErrorBody`] on every non-2xx
//! response.

use std::sync::Arc;
use std::time::Duration;

use marketchat_proto::api::{self, ErrorBody};
use marketchat_proto::message::{ChatMessage, SendMessageRequest};
use marketchat_proto::model::{ProductId, RoomId};
use marketchat_proto::product::{Product, ProductDraft, ProductStatus, StatusUpdate};
use marketchat_proto::room::{ChatRoom, CreateRoomRequest};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use super::{BackendError, Marketplace};
use crate::identity::IdentityContext;

/// [`Marketplace`] over HTTP for one signed-in identity.
#[derive(Debug, Clone)]
pub struct HttpMarketplace {
    client: Client,
    base: Url,
    identity: Arc<IdentityContext>,
}

impl HttpMarketplace {
    /// Creates a client for the backend at `base_url` (scheme, host and
    /// port; any path is replaced by the API routes).
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Transport`] if `base_url` is not a valid
    /// http(s) URL or the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        identity: Arc<IdentityContext>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let base = Url::parse(base_url)
            .map_err(|e| BackendError::Transport(format!("invalid backend URL {base_url}: {e}")))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(BackendError::Transport(format!(
                "unsupported backend URL scheme: {}",
                base.scheme()
            )));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base,
            identity,
        })
    }

    /// The identity every request is made as.
    #[must_use]
    pub fn identity(&self) -> &IdentityContext {
        &self.identity
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, BackendError> {
        let url = self
            .base
            .join(path)
            .map_err(|e| BackendError::Transport(format!("bad request path {path}: {e}")))?;
        Ok(self
            .client
            .request(method, url)
            .bearer_auth(self.identity.credential().expose()))
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Response, BackendError> {
        let response = request.send().await.map_err(|e| {
            tracing::debug!(error = %e, "backend request failed");
            BackendError::Transport(e.to_string())
        })?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(error_from_response(response).await)
        }
    }

    async fn json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, BackendError> {
        self.execute(request)
            .await?
            .json()
            .await
            .map_err(|e| BackendError::Transport(format!("malformed response: {e}")))
    }
}

/// Maps a non-2xx response to a [`BackendError`], preferring the structured
/// body and falling back to the status code.
async fn error_from_response(response: Response) -> BackendError {
    let status = response.status();
    match response.json::<ErrorBody>().await {
        Ok(body) => BackendError::from_code(body.code, body.error),
        Err(_) => error_from_status(status),
    }
}

fn error_from_status(status: StatusCode) -> BackendError {
    let message = status.to_string();
    match status {
        StatusCode::UNAUTHORIZED => BackendError::Unauthorized,
        StatusCode::FORBIDDEN => BackendError::Forbidden(message),
        StatusCode::NOT_FOUND => BackendError::NotFound(message),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            BackendError::Validation(message)
        }
        _ => BackendError::Transport(format!("unexpected status {message}")),
    }
}

impl Marketplace for HttpMarketplace {
    async fn list_products(&self) -> Result<Vec<Product>, BackendError> {
        self.json(self.request(Method::GET, api::PRODUCTS)?).await
    }

    async fn my_products(&self) -> Result<Vec<Product>, BackendError> {
        self.json(self.request(Method::GET, api::MY_PRODUCTS)?).await
    }

    async fn my_wishlist(&self) -> Result<Vec<Product>, BackendError> {
        self.json(self.request(Method::GET, api::WISHLIST)?).await
    }

    async fn create_product(&self, draft: &ProductDraft) -> Result<Product, BackendError> {
        self.json(self.request(Method::POST, api::PRODUCTS)?.json(draft))
            .await
    }

    async fn update_product(
        &self,
        id: ProductId,
        draft: &ProductDraft,
    ) -> Result<Product, BackendError> {
        self.json(
            self.request(Method::PUT, &api::product_path(id))?
                .json(draft),
        )
        .await
    }

    async fn set_product_status(
        &self,
        id: ProductId,
        status: ProductStatus,
    ) -> Result<Product, BackendError> {
        self.json(
            self.request(Method::PUT, &api::product_status_path(id))?
                .json(&StatusUpdate { status }),
        )
        .await
    }

    async fn delete_product(&self, id: ProductId) -> Result<(), BackendError> {
        self.execute(self.request(Method::DELETE, &api::product_path(id))?)
            .await
            .map(drop)
    }

    async fn add_wishlist(&self, id: ProductId) -> Result<(), BackendError> {
        self.execute(self.request(Method::POST, &api::wishlist_path(id))?)
            .await
            .map(drop)
    }

    async fn remove_wishlist(&self, id: ProductId) -> Result<(), BackendError> {
        self.execute(self.request(Method::DELETE, &api::wishlist_path(id))?)
            .await
            .map(drop)
    }

    async fn create_or_get_room(&self, product: ProductId) -> Result<ChatRoom, BackendError> {
        let room: ChatRoom = self
            .json(
                self.request(Method::POST, api::ROOMS)?
                    .json(&CreateRoomRequest {
                        product_id: product,
                    }),
            )
            .await?;
        tracing::debug!(room_id = %room.id, product_id = %product, "room opened");
        Ok(room)
    }

    async fn list_my_rooms(&self) -> Result<Vec<ChatRoom>, BackendError> {
        self.json(self.request(Method::GET, api::ROOMS)?).await
    }

    async fn list_messages(&self, room: RoomId) -> Result<Vec<ChatMessage>, BackendError> {
        self.json(self.request(Method::GET, &api::messages_path(room))?)
            .await
    }

    async fn send_message(&self, room: RoomId, content: &str) -> Result<ChatMessage, BackendError> {
        self.json(
            self.request(Method::POST, &api::messages_path(room))?
                .json(&SendMessageRequest {
                    content: content.to_string(),
                }),
        )
        .await
    }
}
