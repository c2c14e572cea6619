use serde::{Deserialize, Serialize};

use crate::domain::{RelationStatus, RelationWithProfile, UserProfile};

/// Case-insensitive substring match of `term` against any of `fields`.
/// A blank term matches everything.
pub fn matches_search(term: &str, fields: &[&str]) -> bool {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    fields
        .iter()
        .any(|field| field.to_lowercase().contains(&needle))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamStatusFilter {
    #[default]
    All,
    Active,
    Invited,
}

impl TeamStatusFilter {
    pub fn admits(self, status: RelationStatus) -> bool {
        match self {
            TeamStatusFilter::All => true,
            TeamStatusFilter::Active => status == RelationStatus::Active,
            TeamStatusFilter::Invited => status == RelationStatus::Invited,
        }
    }
}

/// Narrows a partner's team by status and by volunteer name or email.
pub fn filter_team(
    team: Vec<RelationWithProfile>,
    status: TeamStatusFilter,
    term: &str,
) -> Vec<RelationWithProfile> {
    team.into_iter()
        .filter(|entry| status.admits(entry.relation.status))
        .filter(|entry| {
            matches_search(
                term,
                &[
                    entry.counterpart.full_name.as_str(),
                    entry.counterpart.email.as_str(),
                ],
            )
        })
        .collect()
}

pub fn volunteer_matches(profile: &UserProfile, term: &str) -> bool {
    matches_search(term, &[profile.full_name.as_str(), profile.email.as_str()])
}

pub fn partner_matches(profile: &UserProfile, term: &str) -> bool {
    matches_search(term, &[profile.full_name.as_str(), profile.location.as_str()])
}
