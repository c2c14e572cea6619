use shared::{
    domain::{Favorite, ProfileId},
    error::ApiError,
    forms::FavoriteTarget,
    protocol::{FavoriteItem, FavoriteState},
};
use tracing::debug;

use crate::{internal, load_profile, ApiContext};

pub async fn is_favorite(
    ctx: &ApiContext,
    target: &FavoriteTarget,
) -> Result<FavoriteState, ApiError> {
    let is_favorite = ctx
        .storage
        .favorite_exists(target)
        .await
        .map_err(internal)?;
    Ok(FavoriteState { is_favorite })
}

/// Flips the favorite and returns the new state. Read-only profiles may
/// toggle too.
pub async fn toggle_favorite(
    ctx: &ApiContext,
    target: &FavoriteTarget,
) -> Result<FavoriteState, ApiError> {
    load_profile(ctx, target.user_id).await?;

    let is_favorite = if ctx
        .storage
        .favorite_exists(target)
        .await
        .map_err(internal)?
    {
        ctx.storage
            .remove_favorite(target)
            .await
            .map_err(internal)?;
        false
    } else {
        // A concurrent toggle may have inserted it first; either way it is
        // now a favorite.
        ctx.storage.add_favorite(target).await.map_err(internal)?;
        true
    };

    debug!(
        user_id = %target.user_id,
        item_type = %target.item_type,
        item_id = target.item_id,
        is_favorite,
        "favorite toggled"
    );
    Ok(FavoriteState { is_favorite })
}

pub async fn list_favorites(
    ctx: &ApiContext,
    user_id: ProfileId,
) -> Result<Vec<FavoriteItem>, ApiError> {
    load_profile(ctx, user_id).await?;
    let favorites = ctx
        .storage
        .list_favorites(user_id)
        .await
        .map_err(internal)?;
    enrich(ctx, favorites).await
}

pub(crate) async fn enrich(
    ctx: &ApiContext,
    favorites: Vec<Favorite>,
) -> Result<Vec<FavoriteItem>, ApiError> {
    let mut items = Vec::with_capacity(favorites.len());
    for favorite in favorites {
        let summary = ctx
            .storage
            .item_summary(favorite.item_type, favorite.item_id)
            .await
            .map_err(internal)?;
        let (item_title, item_location) = match summary {
            Some((title, location)) => (Some(title), location),
            None => (None, None),
        };
        items.push(FavoriteItem {
            favorite,
            item_title,
            item_location,
        });
    }
    Ok(items)
}
