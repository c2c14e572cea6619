//! Volunteer/partner relation lifecycle and the views built on it.
//!
//! Every write goes through [`plan`] first and is then applied as a
//! conditional storage write, so a second submission of the same action
//! surfaces as a conflict instead of applying twice.

use chrono::Utc;
use shared::{
    domain::{
        Activity, AccessLevel, InvitationType, NewProfile, NewRelation, ProfileId, Relation,
        RelationId, RelationStatus, RelationWithProfile, UserProfile, UserType,
        VerificationStatus,
    },
    error::{ApiError, ErrorCode},
    filter::{filter_team, partner_matches, volunteer_matches},
    forms::VolunteerRegistrationForm,
    lifecycle::{plan, Effect, LifecycleError, RelationAction},
    protocol::{RegisteredVolunteer, ServerEvent, TeamQuery, TeamSummary},
};
use storage::RelationWrite;
use tracing::info;

use crate::{internal, load_profile, load_profile_of_type, ApiContext};

const TEAM_STATUSES: &[RelationStatus] = &[RelationStatus::Active, RelationStatus::Invited];
const VOLUNTEER_PARTNER_STATUSES: &[RelationStatus] = &[
    RelationStatus::Active,
    RelationStatus::Pending,
    RelationStatus::Invited,
];
pub const RECENT_ACTIVITY_LIMIT: u32 = 10;

fn lifecycle_error(err: LifecycleError) -> ApiError {
    match err {
        LifecycleError::NotRelated => ApiError::not_found(err.to_string()),
        LifecycleError::AlreadyRelated(_) | LifecycleError::InvalidTransition { .. } => {
            ApiError::conflict(err.to_string())
        }
    }
}

fn unexpected_effect(action: RelationAction, effect: Effect) -> ApiError {
    ApiError::new(
        ErrorCode::Internal,
        format!("{action} planned unexpected effect {effect:?}"),
    )
}

/// Loads the acting profile and checks it may perform `action` at all.
async fn load_actor(
    ctx: &ApiContext,
    actor_id: ProfileId,
    action: RelationAction,
) -> Result<UserProfile, ApiError> {
    let actor = load_profile(ctx, actor_id).await?;
    if actor.user_type != action.actor() {
        return Err(ApiError::forbidden(format!(
            "a {} profile cannot {action}",
            actor.user_type
        )));
    }
    if actor.is_read_only() {
        return Err(ApiError::forbidden(
            "read-only profiles cannot change relations",
        ));
    }
    Ok(actor)
}

fn resolve_write(id: RelationId, write: RelationWrite) -> Result<Relation, ApiError> {
    match write {
        RelationWrite::Applied(relation) => Ok(relation),
        RelationWrite::Missing => Err(ApiError::not_found(format!("relation {id} not found"))),
        RelationWrite::Stale(status) => Err(ApiError::conflict(format!(
            "relation {id} is already {status}"
        ))),
    }
}

async fn create_relation(
    ctx: &ApiContext,
    action: RelationAction,
    volunteer_id: ProfileId,
    business_partner_id: ProfileId,
) -> Result<Relation, ApiError> {
    let current = ctx
        .storage
        .relation_between(volunteer_id, business_partner_id)
        .await
        .map_err(internal)?;
    let effect = plan(action, current.map(|r| r.status)).map_err(lifecycle_error)?;
    let Effect::Insert {
        status,
        invitation_type,
    } = effect
    else {
        return Err(unexpected_effect(action, effect));
    };

    ctx.storage
        .insert_relation(&NewRelation {
            volunteer_id,
            business_partner_id,
            status,
            invitation_type,
            joined_at: effect.stamps_joined_at().then(Utc::now),
        })
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::conflict("volunteer and partner are already related"))
}

pub async fn invite_volunteer(
    ctx: &ApiContext,
    partner_id: ProfileId,
    volunteer_id: ProfileId,
) -> Result<Relation, ApiError> {
    load_actor(ctx, partner_id, RelationAction::Invite).await?;
    load_profile_of_type(ctx, volunteer_id, UserType::Volunteer).await?;
    let relation = create_relation(ctx, RelationAction::Invite, volunteer_id, partner_id).await?;
    info!(relation_id = %relation.id, %partner_id, %volunteer_id, "volunteer invited");
    Ok(relation)
}

pub async fn request_to_join(
    ctx: &ApiContext,
    volunteer_id: ProfileId,
    partner_id: ProfileId,
) -> Result<Relation, ApiError> {
    load_actor(ctx, volunteer_id, RelationAction::RequestToJoin).await?;
    let partner = load_profile_of_type(ctx, partner_id, UserType::BusinessPartner).await?;
    if partner.verification_status != VerificationStatus::Verified {
        return Err(ApiError::validation(format!(
            "partner {partner_id} is not verified"
        )));
    }
    let relation =
        create_relation(ctx, RelationAction::RequestToJoin, volunteer_id, partner_id).await?;
    info!(relation_id = %relation.id, %partner_id, %volunteer_id, "join request sent");
    Ok(relation)
}

/// Applies a transition or deletion to an existing relation on behalf of
/// the party the action belongs to. Returns the relation as it now stands,
/// or as it was just before deletion.
pub async fn apply_action(
    ctx: &ApiContext,
    actor_id: ProfileId,
    relation_id: RelationId,
    action: RelationAction,
) -> Result<Relation, ApiError> {
    let actor = load_actor(ctx, actor_id, action).await?;
    let relation = ctx
        .storage
        .get_relation(relation_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found(format!("relation {relation_id} not found")))?;
    let owner = match actor.user_type {
        UserType::Volunteer => relation.volunteer_id,
        _ => relation.business_partner_id,
    };
    if owner != actor.id {
        return Err(ApiError::forbidden(format!(
            "relation {relation_id} belongs to another profile"
        )));
    }

    let write = match plan(action, Some(relation.status)).map_err(lifecycle_error)? {
        Effect::Transition { from, to } => ctx
            .storage
            .transition_relation(relation_id, from, to, Utc::now())
            .await
            .map_err(internal)?,
        Effect::Delete { from } => ctx
            .storage
            .delete_relation(relation_id, from)
            .await
            .map_err(internal)?,
        effect @ Effect::Insert { .. } => return Err(unexpected_effect(action, effect)),
    };
    let updated = resolve_write(relation_id, write)?;
    info!(
        %relation_id,
        %actor_id,
        %action,
        from = %relation.status,
        "relation action applied"
    );
    Ok(updated)
}

pub async fn accept_request(
    ctx: &ApiContext,
    partner_id: ProfileId,
    relation_id: RelationId,
) -> Result<Relation, ApiError> {
    apply_action(ctx, partner_id, relation_id, RelationAction::Accept).await
}

pub async fn reject_request(
    ctx: &ApiContext,
    partner_id: ProfileId,
    relation_id: RelationId,
) -> Result<Relation, ApiError> {
    apply_action(ctx, partner_id, relation_id, RelationAction::Reject).await
}

pub async fn release_volunteer(
    ctx: &ApiContext,
    partner_id: ProfileId,
    relation_id: RelationId,
) -> Result<Relation, ApiError> {
    apply_action(ctx, partner_id, relation_id, RelationAction::Release).await
}

pub async fn cancel_request(
    ctx: &ApiContext,
    volunteer_id: ProfileId,
    relation_id: RelationId,
) -> Result<Relation, ApiError> {
    apply_action(ctx, volunteer_id, relation_id, RelationAction::Cancel).await
}

pub async fn accept_invitation(
    ctx: &ApiContext,
    volunteer_id: ProfileId,
    relation_id: RelationId,
) -> Result<Relation, ApiError> {
    apply_action(ctx, volunteer_id, relation_id, RelationAction::AcceptInvitation).await
}

/// Replaces the partner's notes on a relation; blank notes clear them.
pub async fn update_notes(
    ctx: &ApiContext,
    partner_id: ProfileId,
    relation_id: RelationId,
    notes: Option<&str>,
) -> Result<Relation, ApiError> {
    let partner = load_profile(ctx, partner_id).await?;
    if partner.user_type != UserType::BusinessPartner || partner.is_read_only() {
        return Err(ApiError::forbidden("only writable partners can edit notes"));
    }
    let relation = ctx
        .storage
        .get_relation(relation_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found(format!("relation {relation_id} not found")))?;
    if relation.business_partner_id != partner_id {
        return Err(ApiError::forbidden(format!(
            "relation {relation_id} belongs to another profile"
        )));
    }

    let notes = notes.map(str::trim).filter(|n| !n.is_empty());
    ctx.storage
        .update_relation_notes(relation_id, notes)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found(format!("relation {relation_id} not found")))
}

/// Creates a volunteer profile for someone without an account and links it
/// to the partner as an active member. Nothing is written unless the form
/// is valid; a failed relation insert leaves the new profile in place.
pub async fn register_volunteer(
    ctx: &ApiContext,
    partner_id: ProfileId,
    form: &VolunteerRegistrationForm,
) -> Result<RegisteredVolunteer, ApiError> {
    form.validate()?;
    load_actor(ctx, partner_id, RelationAction::RegisterOnBehalf).await?;

    let profile = ctx
        .storage
        .insert_profile(&NewProfile {
            id: ProfileId::new_random(),
            full_name: form.full_name.trim().to_string(),
            email: form.email.trim().to_string(),
            location: form.location.trim().to_string(),
            bio: form.bio.trim().to_string(),
            user_type: UserType::Volunteer,
            skills: form.skill_list(),
            interests: form.interest_list(),
            verification_status: VerificationStatus::Verified,
            access_level: AccessLevel::FullAccess,
        })
        .await
        .map_err(internal)?;
    let relation =
        create_relation(ctx, RelationAction::RegisterOnBehalf, profile.id, partner_id).await?;
    info!(%partner_id, volunteer_id = %profile.id, "volunteer registered on behalf");
    Ok(RegisteredVolunteer { profile, relation })
}

/// The event subscribers of both parties receive after `action`.
pub fn relation_event(action: RelationAction, relation: &Relation) -> ServerEvent {
    match action {
        RelationAction::Reject | RelationAction::Cancel => ServerEvent::RelationRemoved {
            relation_id: relation.id,
            volunteer_id: relation.volunteer_id,
            business_partner_id: relation.business_partner_id,
        },
        _ => ServerEvent::RelationUpdated {
            relation: relation.clone(),
        },
    }
}

pub async fn team(
    ctx: &ApiContext,
    partner_id: ProfileId,
    query: &TeamQuery,
) -> Result<Vec<RelationWithProfile>, ApiError> {
    load_profile_of_type(ctx, partner_id, UserType::BusinessPartner).await?;
    let members = ctx
        .storage
        .partner_relations(partner_id, TEAM_STATUSES, None)
        .await
        .map_err(internal)?;
    Ok(filter_team(
        members,
        query.status,
        query.q.as_deref().unwrap_or_default(),
    ))
}

pub async fn team_summary(ctx: &ApiContext, partner_id: ProfileId) -> Result<TeamSummary, ApiError> {
    let members = team(ctx, partner_id, &TeamQuery::default()).await?;
    let count = |status: RelationStatus| {
        members
            .iter()
            .filter(|m| m.relation.status == status)
            .count()
    };
    Ok(TeamSummary {
        total: members.len(),
        active: count(RelationStatus::Active),
        invited: count(RelationStatus::Invited),
        total_points: members.iter().map(|m| m.counterpart.points).sum(),
    })
}

pub async fn pending_requests(
    ctx: &ApiContext,
    partner_id: ProfileId,
) -> Result<Vec<RelationWithProfile>, ApiError> {
    load_profile_of_type(ctx, partner_id, UserType::BusinessPartner).await?;
    ctx.storage
        .partner_relations(
            partner_id,
            &[RelationStatus::Pending],
            Some(InvitationType::VolunteerRequest),
        )
        .await
        .map_err(internal)
}

/// Volunteers the partner could invite: everyone with no stored relation
/// to the partner, in any status.
pub async fn available_volunteers(
    ctx: &ApiContext,
    partner_id: ProfileId,
    search: Option<&str>,
) -> Result<Vec<UserProfile>, ApiError> {
    load_profile_of_type(ctx, partner_id, UserType::BusinessPartner).await?;
    let related = ctx
        .storage
        .related_volunteer_ids(partner_id)
        .await
        .map_err(internal)?;
    let volunteers = ctx
        .storage
        .list_profiles(UserType::Volunteer, None)
        .await
        .map_err(internal)?;
    let term = search.unwrap_or_default();
    Ok(volunteers
        .into_iter()
        .filter(|v| !related.contains(&v.id))
        .filter(|v| volunteer_matches(v, term))
        .collect())
}

pub async fn volunteer_partners(
    ctx: &ApiContext,
    volunteer_id: ProfileId,
) -> Result<Vec<RelationWithProfile>, ApiError> {
    load_profile_of_type(ctx, volunteer_id, UserType::Volunteer).await?;
    ctx.storage
        .volunteer_relations(volunteer_id, VOLUNTEER_PARTNER_STATUSES)
        .await
        .map_err(internal)
}

pub async fn available_partners(
    ctx: &ApiContext,
    volunteer_id: ProfileId,
    search: Option<&str>,
) -> Result<Vec<UserProfile>, ApiError> {
    load_profile_of_type(ctx, volunteer_id, UserType::Volunteer).await?;
    let related = ctx
        .storage
        .related_partner_ids(volunteer_id)
        .await
        .map_err(internal)?;
    let partners = ctx
        .storage
        .list_profiles(UserType::BusinessPartner, Some(VerificationStatus::Verified))
        .await
        .map_err(internal)?;
    let term = search.unwrap_or_default();
    Ok(partners
        .into_iter()
        .filter(|p| !related.contains(&p.id))
        .filter(|p| partner_matches(p, term))
        .collect())
}

/// Recent activity of a volunteer, visible only to partners whose team
/// the volunteer is on.
pub async fn volunteer_activity(
    ctx: &ApiContext,
    partner_id: ProfileId,
    volunteer_id: ProfileId,
) -> Result<Vec<Activity>, ApiError> {
    let relation = ctx
        .storage
        .relation_between(volunteer_id, partner_id)
        .await
        .map_err(internal)?;
    let on_team = relation.is_some_and(|r| TEAM_STATUSES.contains(&r.status));
    if !on_team {
        return Err(ApiError::forbidden(format!(
            "volunteer {volunteer_id} is not on the team of partner {partner_id}"
        )));
    }
    ctx.storage
        .list_activities(volunteer_id, Some(RECENT_ACTIVITY_LIMIT))
        .await
        .map_err(internal)
}
