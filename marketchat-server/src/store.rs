//! In-memory product catalog and wishlist marks.
//!
//! The [`CatalogStore`] owns every listing and the set of `(user, product)`
//! wishlist marks. `is_wishlisted` is never stored on a product; it is
//! projected for the requesting viewer each time a listing is read.

use std::collections::{BTreeMap, HashSet};

use marketchat_proto::model::{ProductId, Timestamp, User, UserId};
use marketchat_proto::product::{Product, ProductDraft, ProductStatus};
use tokio::sync::RwLock;

use crate::error::ApiError;

/// A listing as held by the store, without viewer-relative fields.
#[derive(Debug, Clone)]
pub struct StoredProduct {
    /// Listing identifier.
    pub id: ProductId,
    /// Owner-supplied fields.
    pub draft: ProductDraft,
    /// Sale status.
    pub status: ProductStatus,
    /// Owning account.
    pub owner: User,
    /// Creation time.
    pub created_at: Timestamp,
}

impl StoredProduct {
    fn project(&self, wishlisted: bool) -> Product {
        Product {
            id: self.id,
            name: self.draft.name.clone(),
            description: self.draft.description.clone(),
            price: self.draft.price,
            status: self.status,
            owner_id: self.owner.id,
            owner_name: self.owner.display_name.clone(),
            image_url: self.draft.image_url.clone(),
            video_url: self.draft.video_url.clone(),
            is_wishlisted: wishlisted,
            created_at: self.created_at,
        }
    }
}

#[derive(Default)]
struct CatalogInner {
    next_id: u64,
    products: BTreeMap<ProductId, StoredProduct>,
    wishlist: HashSet<(UserId, ProductId)>,
}

impl CatalogInner {
    fn project_for(&self, viewer: UserId, product: &StoredProduct) -> Product {
        product.project(self.wishlist.contains(&(viewer, product.id)))
    }

    fn owned_mut(&mut self, viewer: UserId, id: ProductId) -> Result<&mut StoredProduct, ApiError> {
        let product = self
            .products
            .get_mut(&id)
            .ok_or(ApiError::NotFound("product"))?;
        if product.owner.id != viewer {
            return Err(ApiError::Forbidden(
                "only the owner may modify a listing".to_string(),
            ));
        }
        Ok(product)
    }
}

/// Thread-safe product catalog.
#[derive(Default)]
pub struct CatalogStore {
    inner: RwLock<CatalogInner>,
}

impl CatalogStore {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lists every product, newest first, projected for `viewer`.
    pub async fn list(&self, viewer: UserId) -> Vec<Product> {
        let inner = self.inner.read().await;
        inner
            .products
            .values()
            .rev()
            .map(|p| inner.project_for(viewer, p))
            .collect()
    }

    /// Lists the products owned by `viewer`, newest first.
    pub async fn list_owned(&self, viewer: UserId) -> Vec<Product> {
        let inner = self.inner.read().await;
        inner
            .products
            .values()
            .rev()
            .filter(|p| p.owner.id == viewer)
            .map(|p| inner.project_for(viewer, p))
            .collect()
    }

    /// Lists the products `viewer` has wishlisted, newest first.
    pub async fn list_wishlisted(&self, viewer: UserId) -> Vec<Product> {
        let inner = self.inner.read().await;
        inner
            .products
            .values()
            .rev()
            .filter(|p| inner.wishlist.contains(&(viewer, p.id)))
            .map(|p| p.project(true))
            .collect()
    }

    /// Returns a copy of a stored listing.
    pub async fn get(&self, id: ProductId) -> Option<StoredProduct> {
        self.inner.read().await.products.get(&id).cloned()
    }

    /// Creates a listing owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Validation`] if the draft is rejected.
    pub async fn create(&self, owner: &User, draft: &ProductDraft) -> Result<Product, ApiError> {
        draft
            .validate()
            .map_err(|e| ApiError::Validation(e.to_string()))?;
        let mut inner = self.inner.write().await;
        inner.next_id += 1;
        let id = ProductId::new(inner.next_id);
        let stored = StoredProduct {
            id,
            draft: draft.normalized(),
            status: ProductStatus::OnSale,
            owner: owner.clone(),
            created_at: Timestamp::now(),
        };
        let product = stored.project(false);
        inner.products.insert(id, stored);
        drop(inner);
        tracing::info!(product_id = %id, owner = %owner.id, "listing created");
        Ok(product)
    }

    /// Replaces the owner-supplied fields of a listing.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`], [`ApiError::Forbidden`] for non-owners,
    /// or [`ApiError::Validation`].
    pub async fn update(
        &self,
        viewer: UserId,
        id: ProductId,
        draft: &ProductDraft,
    ) -> Result<Product, ApiError> {
        draft
            .validate()
            .map_err(|e| ApiError::Validation(e.to_string()))?;
        let mut inner = self.inner.write().await;
        let product = inner.owned_mut(viewer, id)?;
        product.draft = draft.normalized();
        let product = product.clone();
        Ok(inner.project_for(viewer, &product))
    }

    /// Changes the sale status of a listing.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] or [`ApiError::Forbidden`] for non-owners.
    pub async fn set_status(
        &self,
        viewer: UserId,
        id: ProductId,
        status: ProductStatus,
    ) -> Result<Product, ApiError> {
        let mut inner = self.inner.write().await;
        let product = inner.owned_mut(viewer, id)?;
        product.status = status;
        let product = product.clone();
        tracing::info!(product_id = %id, %status, "listing status changed");
        Ok(inner.project_for(viewer, &product))
    }

    /// Deletes a listing and every wishlist mark pointing at it.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] or [`ApiError::Forbidden`] for non-owners.
    pub async fn delete(&self, viewer: UserId, id: ProductId) -> Result<(), ApiError> {
        let mut inner = self.inner.write().await;
        inner.owned_mut(viewer, id)?;
        inner.products.remove(&id);
        inner.wishlist.retain(|(_, product)| *product != id);
        drop(inner);
        tracing::info!(product_id = %id, "listing deleted");
        Ok(())
    }

    /// Marks `id` as wishlisted by `viewer`. Repeating the call is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] for a missing product, or
    /// [`ApiError::Forbidden`] when the viewer owns it.
    pub async fn add_wishlist(&self, viewer: UserId, id: ProductId) -> Result<(), ApiError> {
        let mut inner = self.inner.write().await;
        let product = inner
            .products
            .get(&id)
            .ok_or(ApiError::NotFound("product"))?;
        if product.owner.id == viewer {
            return Err(ApiError::Forbidden(
                "cannot wishlist your own listing".to_string(),
            ));
        }
        inner.wishlist.insert((viewer, id));
        Ok(())
    }

    /// Removes a wishlist mark. Removing an absent mark is a no-op.
    pub async fn remove_wishlist(&self, viewer: UserId, id: ProductId) {
        self.inner.write().await.wishlist.remove(&(viewer, id));
    }
}
