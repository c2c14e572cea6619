use async_trait::async_trait;
use shared::{domain::ProfileId, error::ApiError};
use storage::Storage;

use crate::internal;

/// Account creation, owned by whatever service holds user credentials.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Creates an account and returns its id, which also keys the profile.
    async fn sign_up(&self, email: &str, password: &str) -> Result<ProfileId, ApiError>;
}

/// Local accounts keep only the email; credentials never reach this store.
#[async_trait]
impl IdentityProvider for Storage {
    async fn sign_up(&self, email: &str, _password: &str) -> Result<ProfileId, ApiError> {
        self.create_identity(email)
            .await
            .map_err(internal)?
            .ok_or_else(|| ApiError::conflict("An account with this email already exists"))
    }
}
