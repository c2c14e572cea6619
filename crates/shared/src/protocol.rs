use serde::{Deserialize, Serialize};

use crate::{
    domain::{
        Activity, AssignedOpportunity, BusinessPartnerRegistration, CareFacilityDocument,
        CareFacilityRegistration, Favorite, OrganisationActivity, ProfileId, Relation, RelationId,
        UserProfile,
    },
    error::ApiError,
    filter::TeamStatusFilter,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorQuery {
    pub user_id: ProfileId,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TeamQuery {
    #[serde(default)]
    pub status: TeamStatusFilter,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InviteVolunteerRequest {
    pub volunteer_id: ProfileId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinPartnerRequest {
    pub partner_id: ProfileId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateNotesRequest {
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoriteState {
    pub is_favorite: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamSummary {
    pub total: usize,
    pub active: usize,
    pub invited: usize,
    pub total_points: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisteredVolunteer {
    pub profile: UserProfile,
    pub relation: Relation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessPartnerRegistrationResponse {
    pub profile: UserProfile,
    pub registration: BusinessPartnerRegistration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CareFacilityRegistrationResponse {
    pub profile: UserProfile,
    pub registration: CareFacilityRegistration,
    pub documents: Vec<CareFacilityDocument>,
    pub required_documents: String,
}

/// A favorite enriched with the title and location of what it points at.
/// Both are absent when the referenced item no longer exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FavoriteItem {
    #[serde(flatten)]
    pub favorite: Favorite,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_location: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileOverview {
    pub profile: UserProfile,
    pub verification_label: String,
    pub is_read_only: bool,
    pub activities: Vec<Activity>,
    pub assigned_opportunities: Vec<AssignedOpportunity>,
    pub favorites: Vec<FavoriteItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrganisationStatistics {
    pub total_applications: usize,
    pub in_application: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub total_volunteers: usize,
    pub active_volunteers: usize,
    /// Share of volunteers currently active, in `0.0..=1.0`.
    pub active_ratio: f64,
    pub recent_activities: Vec<OrganisationActivity>,
}

/// `active / total`, or zero for an organisation without volunteers.
pub fn active_ratio(active: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    active as f64 / total as f64
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerEvent {
    RelationUpdated {
        relation: Relation,
    },
    RelationRemoved {
        relation_id: RelationId,
        volunteer_id: ProfileId,
        business_partner_id: ProfileId,
    },
    Error(ApiError),
}

impl ServerEvent {
    /// Whether `user_id` is a party to the relation the event is about.
    pub fn concerns(&self, user_id: ProfileId) -> bool {
        match self {
            ServerEvent::RelationUpdated { relation } => relation.involves(user_id),
            ServerEvent::RelationRemoved {
                volunteer_id,
                business_partner_id,
                ..
            } => *volunteer_id == user_id || *business_partner_id == user_id,
            ServerEvent::Error(_) => false,
        }
    }
}
