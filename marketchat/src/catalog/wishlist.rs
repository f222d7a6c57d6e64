//! Wishlist toggle.
//!
//! Under [`WishlistPolicy::Confirm`] the displayed flag only changes after
//! the backend accepts the change. [`WishlistPolicy::Optimistic`] flips it
//! first and restores the pre-toggle value if the backend refuses.

use marketchat_proto::model::ProductId;

use super::ProductEntry;
use crate::backend::{BackendError, Marketplace};

/// When the displayed wishlist flag changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WishlistPolicy {
    /// Change after the backend confirms.
    #[default]
    Confirm,
    /// Change immediately, roll back on failure.
    Optimistic,
}

/// Result of one toggle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WishlistTransition {
    /// The backend accepted the change.
    Confirmed {
        /// Toggled product.
        product_id: ProductId,
        /// Flag after the change.
        wishlisted: bool,
    },
    /// The backend refused; nothing was changed locally.
    Rejected {
        /// Product the toggle was for.
        product_id: ProductId,
        /// Why.
        error: BackendError,
    },
    /// The backend refused an optimistic change; the flag was restored.
    RolledBack {
        /// Product the toggle was for.
        product_id: ProductId,
        /// Flag value restored from before the toggle.
        restored: bool,
        /// Why.
        error: BackendError,
    },
}

impl WishlistTransition {
    /// The backend error, if the toggle did not go through.
    #[must_use]
    pub const fn error(&self) -> Option<&BackendError> {
        match self {
            Self::Confirmed { .. } => None,
            Self::Rejected { error, .. } | Self::RolledBack { error, .. } => Some(error),
        }
    }
}

/// Applies wishlist toggles under a fixed policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct WishlistToggle {
    policy: WishlistPolicy,
}

impl WishlistToggle {
    /// Creates a toggle with the given policy.
    #[must_use]
    pub const fn new(policy: WishlistPolicy) -> Self {
        Self { policy }
    }

    /// The policy in effect.
    #[must_use]
    pub const fn policy(&self) -> WishlistPolicy {
        self.policy
    }

    /// Flips the wishlist flag of `entry` through `backend`.
    ///
    /// The caller is responsible for ownership gating.
    pub async fn toggle<M: Marketplace>(
        &self,
        backend: &M,
        entry: &mut ProductEntry,
    ) -> WishlistTransition {
        let product_id = entry.product.id;
        let before = entry.product.is_wishlisted;
        if self.policy == WishlistPolicy::Optimistic {
            entry.product.is_wishlisted = !before;
        }

        let result = if before {
            backend.remove_wishlist(product_id).await
        } else {
            backend.add_wishlist(product_id).await
        };

        match (result, self.policy) {
            (Ok(()), _) => {
                entry.product.is_wishlisted = !before;
                tracing::debug!(%product_id, wishlisted = !before, "wishlist updated");
                WishlistTransition::Confirmed {
                    product_id,
                    wishlisted: !before,
                }
            }
            (Err(error), WishlistPolicy::Confirm) => {
                tracing::warn!(%product_id, error = %error, "wishlist change rejected");
                WishlistTransition::Rejected { product_id, error }
            }
            (Err(error), WishlistPolicy::Optimistic) => {
                entry.product.is_wishlisted = before;
                tracing::warn!(%product_id, error = %error, "wishlist change rolled back");
                WishlistTransition::RolledBack {
                    product_id,
                    restored: before,
                    error,
                }
            }
        }
    }
}
