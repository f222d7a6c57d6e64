//! Product catalog as seen by the signed-in user.
//!
//! Every listing is paired with what the viewer may do with it. Owners can
//! edit, delete and change the status of their own listings; everyone else
//! can start a chat about it and wishlist it. The two sets never overlap.

pub mod wishlist;

use std::fmt;
use std::sync::Arc;

use marketchat_proto::model::{ProductId, UserId};
use marketchat_proto::product::{DraftError, Product, ProductDraft, ProductStatus};

pub use wishlist::{WishlistPolicy, WishlistToggle, WishlistTransition};

use crate::backend::{BackendError, Marketplace};
use crate::identity::IdentityContext;

/// Actions offered on one listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductActions {
    /// Open a chat with the owner.
    pub start_chat: bool,
    /// Add to or remove from the wishlist.
    pub toggle_wishlist: bool,
    /// Edit the listing.
    pub edit: bool,
    /// Delete the listing.
    pub delete: bool,
    /// Mark on sale or sold out.
    pub change_status: bool,
}

impl ProductActions {
    /// Actions for an owner (`true`) or anyone else (`false`).
    #[must_use]
    pub const fn for_owner(is_owner: bool) -> Self {
        Self {
            start_chat: !is_owner,
            toggle_wishlist: !is_owner,
            edit: is_owner,
            delete: is_owner,
            change_status: is_owner,
        }
    }
}

/// A listing projected for the viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductEntry {
    /// The listing, with `is_wishlisted` as the backend reported it.
    pub product: Product,
    /// Whether the viewer owns it.
    pub is_owner: bool,
}

impl ProductEntry {
    /// Projects `product` for `viewer`.
    #[must_use]
    pub fn for_viewer(product: Product, viewer: UserId) -> Self {
        let is_owner = product.owner_id == viewer;
        Self { product, is_owner }
    }

    /// What the viewer may do with this listing.
    #[must_use]
    pub const fn actions(&self) -> ProductActions {
        ProductActions::for_owner(self.is_owner)
    }
}

/// The catalog operation a [`CatalogNotice`] reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogAction {
    /// Loading listings.
    Load,
    /// Toggling a wishlist mark.
    ToggleWishlist,
    /// Creating a listing.
    CreateListing,
    /// Editing a listing.
    UpdateListing,
    /// Changing a listing's status.
    ChangeStatus,
    /// Deleting a listing.
    DeleteListing,
}

impl fmt::Display for CatalogAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Load => "load products",
            Self::ToggleWishlist => "update wishlist",
            Self::CreateListing => "create listing",
            Self::UpdateListing => "update listing",
            Self::ChangeStatus => "change listing status",
            Self::DeleteListing => "delete listing",
        };
        f.write_str(text)
    }
}

/// A dismissable report of a failed catalog operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogNotice {
    /// What was attempted.
    pub action: CatalogAction,
    /// Why it failed.
    pub error: BackendError,
}

impl fmt::Display for CatalogNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "could not {}: {}", self.action, self.error)
    }
}

/// Errors from catalog operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    /// The viewer's relationship to the listing does not allow this.
    #[error("cannot {action} product {product}")]
    NotPermitted {
        /// Listing concerned.
        product: ProductId,
        /// What was attempted.
        action: &'static str,
    },

    /// The listing is not in the loaded catalog.
    #[error("product {0} is not in the catalog")]
    UnknownProduct(ProductId),

    /// The draft was rejected before sending.
    #[error(transparent)]
    Draft(#[from] DraftError),

    /// The backend call failed.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Catalog listings for one signed-in user.
pub struct CatalogView<M> {
    backend: Arc<M>,
    identity: Arc<IdentityContext>,
    wishlist: WishlistToggle,
    entries: Vec<ProductEntry>,
    notice: Option<CatalogNotice>,
}

impl<M: Marketplace> CatalogView<M> {
    /// Creates an empty view; call [`CatalogView::load`] to populate it.
    pub fn new(backend: Arc<M>, identity: Arc<IdentityContext>, policy: WishlistPolicy) -> Self {
        Self {
            backend,
            identity,
            wishlist: WishlistToggle::new(policy),
            entries: Vec::new(),
            notice: None,
        }
    }

    /// Loaded listings, newest first.
    #[must_use]
    pub fn entries(&self) -> &[ProductEntry] {
        &self.entries
    }

    /// The loaded listing with `id`.
    #[must_use]
    pub fn entry(&self, id: ProductId) -> Option<&ProductEntry> {
        self.entries.iter().find(|e| e.product.id == id)
    }

    /// The last failure to report, if not dismissed.
    #[must_use]
    pub const fn notice(&self) -> Option<&CatalogNotice> {
        self.notice.as_ref()
    }

    /// Clears the current notice.
    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    /// Re-fetches all listings.
    ///
    /// # Errors
    ///
    /// Returns the backend error; previously loaded entries are kept.
    pub async fn load(&mut self) -> Result<(), CatalogError> {
        let result = self.backend.list_products().await;
        let products = self.record(CatalogAction::Load, result)?;
        self.entries = self.project(products);
        tracing::debug!(count = self.entries.len(), "catalog loaded");
        Ok(())
    }

    /// Checks that a chat may be started about `id` and returns the product
    /// to open a room for. Sold-out listings still qualify.
    ///
    /// # Errors
    ///
    /// [`CatalogError::NotPermitted`] for the viewer's own listing, or
    /// [`CatalogError::UnknownProduct`].
    pub fn chat_target(&self, id: ProductId) -> Result<ProductId, CatalogError> {
        let entry = self.entry(id).ok_or(CatalogError::UnknownProduct(id))?;
        if !entry.actions().start_chat {
            return Err(CatalogError::NotPermitted {
                product: id,
                action: "chat about",
            });
        }
        Ok(id)
    }

    /// Toggles the wishlist mark on another user's listing, then refreshes
    /// the catalog if the backend accepted it.
    ///
    /// A backend refusal is not an `Err`: it comes back as a
    /// [`WishlistTransition::Rejected`] or [`WishlistTransition::RolledBack`]
    /// and is also recorded as the current notice.
    ///
    /// # Errors
    ///
    /// [`CatalogError::NotPermitted`] for the viewer's own listing, or
    /// [`CatalogError::UnknownProduct`].
    pub async fn toggle_wishlist(
        &mut self,
        id: ProductId,
    ) -> Result<WishlistTransition, CatalogError> {
        let toggle = self.wishlist;
        let backend = Arc::clone(&self.backend);
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.product.id == id)
            .ok_or(CatalogError::UnknownProduct(id))?;
        if !entry.actions().toggle_wishlist {
            return Err(CatalogError::NotPermitted {
                product: id,
                action: "wishlist",
            });
        }

        let transition = toggle.toggle(backend.as_ref(), entry).await;
        match transition.error() {
            Some(error) => {
                self.notice = Some(CatalogNotice {
                    action: CatalogAction::ToggleWishlist,
                    error: error.clone(),
                });
            }
            None => self.reload_after(CatalogAction::ToggleWishlist).await,
        }
        Ok(transition)
    }

    /// Lists a new product owned by the viewer.
    ///
    /// # Errors
    ///
    /// [`CatalogError::Draft`] if the draft is invalid (nothing is sent), or
    /// [`CatalogError::Backend`].
    pub async fn create_listing(&mut self, draft: &ProductDraft) -> Result<Product, CatalogError> {
        let draft = draft.normalized();
        draft.validate()?;
        let result = self.backend.create_product(&draft).await;
        let product = self.record(CatalogAction::CreateListing, result)?;
        tracing::info!(product_id = %product.id, "listing created");
        self.reload_after(CatalogAction::CreateListing).await;
        Ok(product)
    }

    /// Replaces the editable fields of one of the viewer's listings.
    ///
    /// # Errors
    ///
    /// [`CatalogError::NotPermitted`] unless the viewer owns it,
    /// [`CatalogError::Draft`] if the draft is invalid, or
    /// [`CatalogError::Backend`].
    pub async fn update_listing(
        &mut self,
        id: ProductId,
        draft: &ProductDraft,
    ) -> Result<Product, CatalogError> {
        self.require_owner(id, "edit")?;
        let draft = draft.normalized();
        draft.validate()?;
        let result = self.backend.update_product(id, &draft).await;
        let product = self.record(CatalogAction::UpdateListing, result)?;
        self.reload_after(CatalogAction::UpdateListing).await;
        Ok(product)
    }

    /// Marks one of the viewer's listings on sale or sold out.
    ///
    /// # Errors
    ///
    /// [`CatalogError::NotPermitted`] unless the viewer owns it, or
    /// [`CatalogError::Backend`].
    pub async fn set_status(
        &mut self,
        id: ProductId,
        status: ProductStatus,
    ) -> Result<Product, CatalogError> {
        self.require_owner(id, "change the status of")?;
        let result = self.backend.set_product_status(id, status).await;
        let product = self.record(CatalogAction::ChangeStatus, result)?;
        tracing::info!(product_id = %id, %status, "listing status changed");
        self.reload_after(CatalogAction::ChangeStatus).await;
        Ok(product)
    }

    /// Deletes one of the viewer's listings.
    ///
    /// # Errors
    ///
    /// [`CatalogError::NotPermitted`] unless the viewer owns it, or
    /// [`CatalogError::Backend`].
    pub async fn delete_listing(&mut self, id: ProductId) -> Result<(), CatalogError> {
        self.require_owner(id, "delete")?;
        let result = self.backend.delete_product(id).await;
        self.record(CatalogAction::DeleteListing, result)?;
        tracing::info!(product_id = %id, "listing deleted");
        self.reload_after(CatalogAction::DeleteListing).await;
        Ok(())
    }

    /// The viewer's own listings.
    ///
    /// # Errors
    ///
    /// Returns the backend error.
    pub async fn my_listings(&mut self) -> Result<Vec<ProductEntry>, CatalogError> {
        let result = self.backend.my_products().await;
        let products = self.record(CatalogAction::Load, result)?;
        Ok(self.project(products))
    }

    /// Listings the viewer has wishlisted.
    ///
    /// # Errors
    ///
    /// Returns the backend error.
    pub async fn my_wishlist(&mut self) -> Result<Vec<ProductEntry>, CatalogError> {
        let result = self.backend.my_wishlist().await;
        let products = self.record(CatalogAction::Load, result)?;
        Ok(self.project(products))
    }

    fn project(&self, products: Vec<Product>) -> Vec<ProductEntry> {
        let viewer = self.identity.user_id();
        products
            .into_iter()
            .map(|p| ProductEntry::for_viewer(p, viewer))
            .collect()
    }

    fn require_owner(&self, id: ProductId, action: &'static str) -> Result<(), CatalogError> {
        let entry = self.entry(id).ok_or(CatalogError::UnknownProduct(id))?;
        if entry.is_owner {
            Ok(())
        } else {
            Err(CatalogError::NotPermitted {
                product: id,
                action,
            })
        }
    }

    fn record<T>(
        &mut self,
        action: CatalogAction,
        result: Result<T, BackendError>,
    ) -> Result<T, CatalogError> {
        result.map_err(|error| {
            tracing::warn!(%action, error = %error, "catalog operation failed");
            self.notice = Some(CatalogNotice {
                action,
                error: error.clone(),
            });
            CatalogError::Backend(error)
        })
    }

    async fn reload_after(&mut self, action: CatalogAction) {
        if let Err(e) = self.load().await {
            tracing::debug!(%action, error = %e, "catalog refresh after change failed");
        }
    }
}
