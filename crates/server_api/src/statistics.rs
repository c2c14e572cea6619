use shared::{
    domain::{ApplicationStatus, OrganisationVolunteerStatus, ProfileId, UserType},
    error::ApiError,
    protocol::{active_ratio, OrganisationStatistics},
};

use crate::{internal, load_profile_of_type, ApiContext};

pub const RECENT_ORGANISATION_ACTIVITY_LIMIT: u32 = 10;

pub async fn organisation_statistics(
    ctx: &ApiContext,
    organisation_id: ProfileId,
) -> Result<OrganisationStatistics, ApiError> {
    load_profile_of_type(ctx, organisation_id, UserType::CareFacilityNgo).await?;

    let applications = ctx
        .storage
        .list_application_statuses(organisation_id)
        .await
        .map_err(internal)?;
    let volunteers = ctx
        .storage
        .list_organisation_volunteer_statuses(organisation_id)
        .await
        .map_err(internal)?;
    let recent_activities = ctx
        .storage
        .recent_organisation_activities(organisation_id, RECENT_ORGANISATION_ACTIVITY_LIMIT)
        .await
        .map_err(internal)?;

    let applications_in = |status: ApplicationStatus| {
        applications.iter().filter(|s| **s == status).count()
    };
    let active_volunteers = volunteers
        .iter()
        .filter(|s| **s == OrganisationVolunteerStatus::Active)
        .count();
    Ok(OrganisationStatistics {
        total_applications: applications.len(),
        in_application: applications_in(ApplicationStatus::InApplication),
        in_progress: applications_in(ApplicationStatus::InProgress),
        completed: applications_in(ApplicationStatus::Completed),
        total_volunteers: volunteers.len(),
        active_volunteers,
        active_ratio: active_ratio(active_volunteers, volunteers.len()),
        recent_activities,
    })
}
