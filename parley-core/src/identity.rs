use async_trait::async_trait;

use crate::error::Result;
use crate::types::{AccountProfile, Identity};

/// The external identity subsystem as seen by the core.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolves a bearer credential. Fails with `InvalidToken`.
    async fn verify(&self, token: &str) -> Result<Identity>;

    /// Fails with `AccountNotFound` when the account does not resolve.
    async fn account_profile(&self, account_id: &str) -> Result<AccountProfile>;
}

/// Read-only source of account profiles.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    async fn find_profile(&self, account_id: &str) -> Result<Option<AccountProfile>>;
}
