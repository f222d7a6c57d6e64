//! The signed-in user and the credential that authenticates them.
//!
//! Components never receive a user id as a bare number passed around by
//! hand: they hold an [`IdentityContext`] and derive ownership and
//! counterpart decisions from it.

use std::fmt;

use marketchat_proto::model::{User, UserId};

/// Bearer credential presented to the backend.
///
/// `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wraps a bearer token.
    pub fn bearer(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw token for the `Authorization` header.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Who the client is acting as.
#[derive(Debug, Clone)]
pub struct IdentityContext {
    user: User,
    credential: Credential,
}

impl IdentityContext {
    /// Creates a context for `user` authenticated by `credential`.
    #[must_use]
    pub const fn new(user: User, credential: Credential) -> Self {
        Self { user, credential }
    }

    /// The signed-in user.
    #[must_use]
    pub const fn user(&self) -> &User {
        &self.user
    }

    /// The signed-in user's id.
    #[must_use]
    pub const fn user_id(&self) -> UserId {
        self.user.id
    }

    /// The credential presented on every request.
    #[must_use]
    pub const fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Returns `true` if `id` refers to the signed-in user.
    #[must_use]
    pub fn is_self(&self, id: UserId) -> bool {
        self.user.id == id
    }
}
