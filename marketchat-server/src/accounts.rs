//! Bearer token table.
//!
//! Accounts are provisioned from configuration at startup; issuing tokens is
//! the job of an external auth service. Lookups are synchronous so they can
//! run inside the request extractor without awaiting.

use std::collections::HashMap;

use marketchat_proto::model::User;
use parking_lot::RwLock;

/// Maps bearer tokens to the accounts they authenticate.
#[derive(Default)]
pub struct Accounts {
    by_token: RwLock<HashMap<String, User>>,
}

impl Accounts {
    /// Creates an empty token table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `token` for `user`, replacing any previous holder.
    pub fn insert(&self, token: impl Into<String>, user: User) {
        self.by_token.write().insert(token.into(), user);
    }

    /// Resolves a bearer token to its account.
    pub fn resolve(&self, token: &str) -> Option<User> {
        self.by_token.read().get(token).cloned()
    }

    /// Number of provisioned tokens.
    pub fn len(&self) -> usize {
        self.by_token.read().len()
    }

    /// Returns true if no tokens are provisioned.
    pub fn is_empty(&self) -> bool {
        self.by_token.read().is_empty()
    }
}
