use std::sync::Arc;

use shared::{
    domain::{ProfileId, UserProfile, UserType},
    error::{ApiError, ErrorCode},
};
use storage::Storage;

pub mod favorites;
pub mod identity;
pub mod ideas;
pub mod profile;
pub mod registration;
pub mod relations;
pub mod statistics;

pub use identity::IdentityProvider;

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
    pub identity: Arc<dyn IdentityProvider>,
}

impl ApiContext {
    /// Context that allocates accounts in the local `identities` table.
    pub fn new(storage: Storage) -> Self {
        let identity: Arc<dyn IdentityProvider> = Arc::new(storage.clone());
        Self { storage, identity }
    }
}

pub(crate) async fn load_profile(ctx: &ApiContext, id: ProfileId) -> Result<UserProfile, ApiError> {
    ctx.storage
        .get_profile(id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found(format!("profile {id} not found")))
}

/// Loads a profile that an operation addresses rather than acts as.
pub(crate) async fn load_profile_of_type(
    ctx: &ApiContext,
    id: ProfileId,
    user_type: UserType,
) -> Result<UserProfile, ApiError> {
    let profile = load_profile(ctx, id).await?;
    if profile.user_type != user_type {
        return Err(ApiError::validation(format!(
            "profile {id} is not a {user_type}"
        )));
    }
    Ok(profile)
}

pub(crate) fn internal(err: anyhow::Error) -> ApiError {
    tracing::error!(error = ?err, "storage operation failed");
    ApiError::new(ErrorCode::Internal, err.to_string())
}

#[cfg(test)]
mod tests;
