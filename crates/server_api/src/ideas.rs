use shared::{
    domain::{IdeaSubmission, ProfileId},
    error::ApiError,
    forms::IdeaForm,
};
use tracing::info;

use crate::{internal, load_profile, ApiContext};

pub async fn submit_idea(ctx: &ApiContext, form: &IdeaForm) -> Result<IdeaSubmission, ApiError> {
    form.validate()?;
    load_profile(ctx, form.user_id).await?;

    let idea = ctx
        .storage
        .insert_idea(
            form.user_id,
            form.title.trim(),
            form.description.trim(),
            form.category(),
        )
        .await
        .map_err(internal)?;
    info!(user_id = %form.user_id, idea_id = %idea.id, "idea submitted");
    Ok(idea)
}

pub async fn list_ideas(
    ctx: &ApiContext,
    user_id: ProfileId,
) -> Result<Vec<IdeaSubmission>, ApiError> {
    load_profile(ctx, user_id).await?;
    ctx.storage.list_ideas(user_id).await.map_err(internal)
}
