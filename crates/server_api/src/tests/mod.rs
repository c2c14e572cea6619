use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use async_trait::async_trait;
use shared::{
    domain::{AccessLevel, NewProfile, ProfileId, UserProfile, UserType, VerificationStatus},
    error::ApiError,
};
use storage::Storage;

use crate::{ApiContext, IdentityProvider};


async fn context() -> ApiContext {
    ApiContext::new(Storage::new("sqlite::memory:").await.expect("db"))
}

async fn seed(
    ctx: &ApiContext,
    name: &str,
    user_type: UserType,
    verification_status: VerificationStatus,
    access_level: AccessLevel,
) -> UserProfile {
    ctx.storage
        .insert_profile(&NewProfile {
            id: ProfileId::new_random(),
            full_name: name.to_string(),
            email: format!("{}@example.org", name.to_lowercase().replace(' ', ".")),
            location: "Warsaw".into(),
            bio: String::new(),
            user_type,
            skills: Vec::new(),
            interests: Vec::new(),
            verification_status,
            access_level,
        })
        .await
        .expect("profile")
}

async fn volunteer(ctx: &ApiContext, name: &str) -> UserProfile {
    seed(
        ctx,
        name,
        UserType::Volunteer,
        VerificationStatus::Verified,
        AccessLevel::FullAccess,
    )
    .await
}

async fn partner(ctx: &ApiContext, name: &str) -> UserProfile {
    seed(
        ctx,
        name,
        UserType::BusinessPartner,
        VerificationStatus::Verified,
        AccessLevel::FullAccess,
    )
    .await
}

/// Identity provider that only counts sign-up attempts.
#[derive(Default)]
struct CountingIdentity {
    calls: AtomicUsize,
}

#[async_trait]
impl IdentityProvider for CountingIdentity {
    async fn sign_up(&self, _email: &str, _password: &str) -> Result<ProfileId, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ProfileId::new_random())
    }
}

async fn counting_context() -> (ApiContext, Arc<CountingIdentity>) {
    let identity = Arc::new(CountingIdentity::default());
    let mut ctx = context().await;
    ctx.identity = identity.clone();
    (ctx, identity)
}
