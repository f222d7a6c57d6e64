//! Product listings and the owner-side draft used to create or edit them.

use serde::{Deserialize, Serialize};

use crate::model::{ProductId, Timestamp, UserId};

/// Maximum length of a product name in characters.
pub const MAX_NAME_LEN: usize = 100;

/// Maximum length of a product description in characters.
pub const MAX_DESCRIPTION_LEN: usize = 2000;

/// Sale status of a listing. Only the owner may change it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    /// The item is still available.
    #[default]
    OnSale,
    /// The item has been sold.
    SoldOut,
}

impl std::fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OnSale => write!(f, "on sale"),
            Self::SoldOut => write!(f, "sold out"),
        }
    }
}

/// A product listing as returned by the catalog endpoints.
///
/// `is_wishlisted` is a viewer-relative projection computed by the backend
/// for the caller; it is not stored on the product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Listing identifier.
    pub id: ProductId,
    /// Short title.
    pub name: String,
    /// Optional free-form description.
    #[serde(default)]
    pub description: Option<String>,
    /// Asking price in whole currency units.
    pub price: u64,
    /// Sale status.
    pub status: ProductStatus,
    /// Account that listed the product.
    pub owner_id: UserId,
    /// Display name of the owner.
    pub owner_name: String,
    /// Opaque image URL, resolved by the backend.
    #[serde(default)]
    pub image_url: Option<String>,
    /// Opaque video URL, resolved by the backend.
    #[serde(default)]
    pub video_url: Option<String>,
    /// Whether the requesting viewer has wishlisted this product.
    #[serde(default)]
    pub is_wishlisted: bool,
    /// When the listing was created.
    pub created_at: Timestamp,
}

/// Errors produced when a [`ProductDraft`] is rejected before sending.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DraftError {
    /// The name is empty after trimming.
    #[error("product name is required")]
    MissingName,
    /// The name exceeds [`MAX_NAME_LEN`].
    #[error("product name too long (max {MAX_NAME_LEN} characters)")]
    NameTooLong,
    /// The description exceeds [`MAX_DESCRIPTION_LEN`].
    #[error("description too long (max {MAX_DESCRIPTION_LEN} characters)")]
    DescriptionTooLong,
}

/// Owner-supplied fields for creating or replacing a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDraft {
    /// Short title. Required.
    pub name: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Asking price in whole currency units.
    pub price: u64,
    /// Opaque image URL from the media collaborator.
    #[serde(default)]
    pub image_url: Option<String>,
    /// Opaque video URL from the media collaborator.
    #[serde(default)]
    pub video_url: Option<String>,
}

impl ProductDraft {
    /// Creates a draft with only the required fields set.
    pub fn new(name: impl Into<String>, price: u64) -> Self {
        Self {
            name: name.into(),
            description: None,
            price,
            image_url: None,
            video_url: None,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Checks the draft for missing or oversized fields.
    ///
    /// # Errors
    ///
    /// Returns the first [`DraftError`] found.
    pub fn validate(&self) -> Result<(), DraftError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(DraftError::MissingName);
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(DraftError::NameTooLong);
        }
        if self
            .description
            .as_deref()
            .is_some_and(|d| d.chars().count() > MAX_DESCRIPTION_LEN)
        {
            return Err(DraftError::DescriptionTooLong);
        }
        Ok(())
    }

    /// Returns a copy with surrounding whitespace removed and an empty
    /// description collapsed to `None`.
    #[must_use]
    pub fn normalized(&self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            description: self
                .description
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
            price: self.price,
            image_url: self.image_url.clone(),
            video_url: self.video_url.clone(),
        }
    }
}

/// Body of a status change request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    /// The new status.
    pub status: ProductStatus,
}
