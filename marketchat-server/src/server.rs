//! HTTP server core: shared state, bearer identity extraction, and the JSON
//! handlers for catalog, wishlist, room and message endpoints.

use std::sync::Arc;

use axum::extract::{FromRequestParts, Path, State};
use axum::http::request::Parts;
use axum::http::{StatusCode, header};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use marketchat_proto::api::{self, Health};
use marketchat_proto::message::{ChatMessage, SendMessageRequest};
use marketchat_proto::model::{ProductId, RoomId, User};
use marketchat_proto::product::{Product, ProductDraft, StatusUpdate};
use marketchat_proto::room::{ChatRoom, CreateRoomRequest};

use crate::accounts::Accounts;
use crate::error::ApiError;
use crate::rooms::RoomRegistry;
use crate::store::CatalogStore;

/// Shared server state: token table, catalog, and room registry.
#[derive(Default)]
pub struct AppState {
    /// Bearer token table.
    pub accounts: Accounts,
    /// Products and wishlist marks.
    pub catalog: CatalogStore,
    /// Chat rooms and message logs.
    pub rooms: RoomRegistry,
}

impl AppState {
    /// Creates empty state with no provisioned accounts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates state with the given `(token, user)` accounts provisioned.
    pub fn with_accounts(accounts: impl IntoIterator<Item = (String, User)>) -> Self {
        let state = Self::new();
        for (token, user) in accounts {
            state.accounts.insert(token, user);
        }
        state
    }
}

/// The authenticated caller, resolved from `Authorization: Bearer <token>`.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(ApiError::Unauthorized)?;
        state.accounts.resolve(token.trim()).map_or_else(
            || {
                tracing::debug!("rejected unknown bearer token");
                Err(ApiError::Unauthorized)
            },
            |user| Ok(Self(user)),
        )
    }
}

/// Builds the API router over the given state.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(api::HEALTH, get(health))
        .route(api::PRODUCTS, get(list_products).post(create_product))
        .route(api::MY_PRODUCTS, get(my_products))
        .route(
            "/api/products/{id}",
            put(update_product).delete(delete_product),
        )
        .route("/api/products/{id}/status", put(set_status))
        .route(api::WISHLIST, get(my_wishlist))
        .route(
            "/api/wishlist/{id}",
            post(add_wishlist).delete(remove_wishlist),
        )
        .route(api::ROOMS, get(list_rooms).post(create_room))
        .route(
            "/api/chat/rooms/{id}/messages",
            get(list_messages).post(send_message),
        )
        .with_state(state)
}

async fn health() -> Json<Health> {
    Json(Health {
        status: "healthy".to_string(),
    })
}

async fn list_products(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Json<Vec<Product>> {
    Json(state.catalog.list(user.id).await)
}

async fn my_products(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Json<Vec<Product>> {
    Json(state.catalog.list_owned(user.id).await)
}

async fn create_product(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(draft): Json<ProductDraft>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let product = state.catalog.create(&user, &draft).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

async fn update_product(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<ProductId>,
    Json(draft): Json<ProductDraft>,
) -> Result<Json<Product>, ApiError> {
    Ok(Json(state.catalog.update(user.id, id, &draft).await?))
}

async fn set_status(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<ProductId>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<Product>, ApiError> {
    Ok(Json(
        state.catalog.set_status(user.id, id, update.status).await?,
    ))
}

async fn delete_product(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<ProductId>,
) -> Result<StatusCode, ApiError> {
    state.catalog.delete(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn my_wishlist(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Json<Vec<Product>> {
    Json(state.catalog.list_wishlisted(user.id).await)
}

async fn add_wishlist(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<ProductId>,
) -> Result<StatusCode, ApiError> {
    state.catalog.add_wishlist(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn remove_wishlist(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<ProductId>,
) -> StatusCode {
    state.catalog.remove_wishlist(user.id, id).await;
    StatusCode::NO_CONTENT
}

async fn create_room(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<CreateRoomRequest>,
) -> Result<(StatusCode, Json<ChatRoom>), ApiError> {
    let product = state
        .catalog
        .get(request.product_id)
        .await
        .ok_or(ApiError::NotFound("product"))?;
    let opened = state.rooms.create_or_get(&product, &user).await?;
    let status = if opened.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(opened.room)))
}

async fn list_rooms(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Json<Vec<ChatRoom>> {
    Json(state.rooms.list_for(user.id).await)
}

async fn list_messages(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<RoomId>,
) -> Result<Json<Vec<ChatMessage>>, ApiError> {
    Ok(Json(state.rooms.messages(id, user.id).await?))
}

async fn send_message(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<RoomId>,
    Json(request): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<ChatMessage>), ApiError> {
    let message = state.rooms.append(id, &user, &request.content).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// Starts the server on the given address with empty state.
///
/// # Errors
///
/// Returns an error if binding to the address fails.
pub async fn start_server(
    addr: &str,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    start_server_with_state(addr, Arc::new(AppState::new())).await
}

/// Starts the server with pre-populated [`AppState`].
///
/// This is the primary entry point used by both `main.rs` and test code.
/// Returns the bound address (useful with port `0`) and the serve task.
///
/// # Errors
///
/// Returns an error if binding to the address fails.
pub async fn start_server_with_state(
    addr: &str,
    state: Arc<AppState>,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "marketchat server error");
        }
    });

    Ok((bound_addr, handle))
}
