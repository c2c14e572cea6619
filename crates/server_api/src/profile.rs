use shared::{
    domain::{Activity, ProfileId, UserProfile},
    error::ApiError,
    protocol::ProfileOverview,
};
use tracing::info;

use crate::{favorites, internal, load_profile, ApiContext};

pub async fn get_profile(ctx: &ApiContext, user_id: ProfileId) -> Result<UserProfile, ApiError> {
    load_profile(ctx, user_id).await
}

pub async fn profile_overview(
    ctx: &ApiContext,
    user_id: ProfileId,
) -> Result<ProfileOverview, ApiError> {
    let profile = load_profile(ctx, user_id).await?;
    let activities = ctx
        .storage
        .list_activities(user_id, None)
        .await
        .map_err(internal)?;
    let assigned_opportunities = ctx
        .storage
        .list_assigned_opportunities(user_id)
        .await
        .map_err(internal)?;
    let saved = ctx
        .storage
        .list_favorites(user_id)
        .await
        .map_err(internal)?;
    let favorites = favorites::enrich(ctx, saved).await?;

    Ok(ProfileOverview {
        verification_label: profile.verification_status.label().to_string(),
        is_read_only: profile.is_read_only(),
        profile,
        activities,
        assigned_opportunities,
        favorites,
    })
}

/// Logs an activity and credits its points to the profile.
pub async fn record_activity(
    ctx: &ApiContext,
    user_id: ProfileId,
    activity_type: &str,
    description: &str,
    points: u32,
) -> Result<Activity, ApiError> {
    if activity_type.trim().is_empty() {
        return Err(ApiError::validation("Activity type is required"));
    }
    load_profile(ctx, user_id).await?;
    let activity = ctx
        .storage
        .record_activity(user_id, activity_type.trim(), description.trim(), points)
        .await
        .map_err(internal)?;
    info!(%user_id, activity_id = %activity.id, points, "activity recorded");
    Ok(activity)
}
