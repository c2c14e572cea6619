//! Transition table for volunteer/partner relations.
//!
//! `plan` decides what a lifecycle action does to the stored relation
//! without touching storage. Callers apply the returned [`Effect`] with a
//! conditional write so a stale view of the relation cannot double-apply.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{InvitationType, RelationStatus, UserType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationAction {
    Invite,
    RequestToJoin,
    Accept,
    Reject,
    Release,
    Cancel,
    AcceptInvitation,
    RegisterOnBehalf,
}

impl RelationAction {
    /// The side of the relation allowed to perform the action.
    pub fn actor(self) -> UserType {
        match self {
            RelationAction::RequestToJoin
            | RelationAction::Cancel
            | RelationAction::AcceptInvitation => UserType::Volunteer,
            RelationAction::Invite
            | RelationAction::Accept
            | RelationAction::Reject
            | RelationAction::Release
            | RelationAction::RegisterOnBehalf => UserType::BusinessPartner,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RelationAction::Invite => "invite",
            RelationAction::RequestToJoin => "request_to_join",
            RelationAction::Accept => "accept",
            RelationAction::Reject => "reject",
            RelationAction::Release => "release",
            RelationAction::Cancel => "cancel",
            RelationAction::AcceptInvitation => "accept_invitation",
            RelationAction::RegisterOnBehalf => "register_on_behalf",
        }
    }
}

impl std::fmt::Display for RelationAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Insert {
        status: RelationStatus,
        invitation_type: InvitationType,
    },
    Transition {
        from: RelationStatus,
        to: RelationStatus,
    },
    Delete {
        from: RelationStatus,
    },
}

impl Effect {
    pub fn stamps_joined_at(self) -> bool {
        matches!(
            self,
            Effect::Insert {
                status: RelationStatus::Active,
                ..
            } | Effect::Transition {
                to: RelationStatus::Active,
                ..
            }
        )
    }

    pub fn stamps_released_at(self) -> bool {
        matches!(
            self,
            Effect::Transition {
                to: RelationStatus::Released,
                ..
            }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("volunteer and partner are already related (status {0})")]
    AlreadyRelated(RelationStatus),
    #[error("relation not found")]
    NotRelated,
    #[error("cannot {action} a relation in status {status}")]
    InvalidTransition {
        action: RelationAction,
        status: RelationStatus,
    },
}

pub fn plan(
    action: RelationAction,
    current: Option<RelationStatus>,
) -> Result<Effect, LifecycleError> {
    use RelationAction::*;
    use RelationStatus::*;

    match (action, current) {
        (Invite | RequestToJoin | RegisterOnBehalf, Some(status)) => {
            Err(LifecycleError::AlreadyRelated(status))
        }
        (Invite, None) => Ok(Effect::Insert {
            status: Invited,
            invitation_type: InvitationType::PartnerInvite,
        }),
        (RequestToJoin, None) => Ok(Effect::Insert {
            status: Pending,
            invitation_type: InvitationType::VolunteerRequest,
        }),
        (RegisterOnBehalf, None) => Ok(Effect::Insert {
            status: Active,
            invitation_type: InvitationType::PartnerInvite,
        }),
        (_, None) => Err(LifecycleError::NotRelated),
        (Accept, Some(Pending)) => Ok(Effect::Transition {
            from: Pending,
            to: Active,
        }),
        (AcceptInvitation, Some(Invited)) => Ok(Effect::Transition {
            from: Invited,
            to: Active,
        }),
        (Release, Some(Active)) => Ok(Effect::Transition {
            from: Active,
            to: Released,
        }),
        (Reject | Cancel, Some(Pending)) => Ok(Effect::Delete { from: Pending }),
        (action, Some(status)) => Err(LifecycleError::InvalidTransition { action, status }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creation_actions_pick_status_and_type() {
        assert_eq!(
            plan(RelationAction::Invite, None),
            Ok(Effect::Insert {
                status: RelationStatus::Invited,
                invitation_type: InvitationType::PartnerInvite,
            })
        );
        assert_eq!(
            plan(RelationAction::RequestToJoin, None),
            Ok(Effect::Insert {
                status: RelationStatus::Pending,
                invitation_type: InvitationType::VolunteerRequest,
            })
        );
        let on_behalf = plan(RelationAction::RegisterOnBehalf, None).expect("insert");
        assert!(on_behalf.stamps_joined_at());
    }

    #[test]
    fn creation_is_refused_for_every_existing_status() {
        for status in RelationStatus::ALL {
            for action in [RelationAction::Invite, RelationAction::RequestToJoin] {
                assert_eq!(
                    plan(action, Some(*status)),
                    Err(LifecycleError::AlreadyRelated(*status))
                );
            }
        }
    }

    #[test]
    fn only_entry_into_active_stamps_joined_at() {
        for status in RelationStatus::ALL {
            for action in [
                RelationAction::Accept,
                RelationAction::AcceptInvitation,
                RelationAction::Release,
                RelationAction::Reject,
                RelationAction::Cancel,
            ] {
                if let Ok(effect) = plan(action, Some(*status)) {
                    let enters_active = matches!(
                        effect,
                        Effect::Transition {
                            to: RelationStatus::Active,
                            ..
                        }
                    );
                    assert_eq!(effect.stamps_joined_at(), enters_active);
                    assert_eq!(
                        effect.stamps_released_at(),
                        action == RelationAction::Release
                    );
                }
            }
        }
    }

    #[test]
    fn pending_leaves_only_by_accept_or_delete() {
        assert_eq!(
            plan(RelationAction::Reject, Some(RelationStatus::Pending)),
            Ok(Effect::Delete {
                from: RelationStatus::Pending
            })
        );
        assert_eq!(
            plan(RelationAction::Cancel, Some(RelationStatus::Pending)),
            Ok(Effect::Delete {
                from: RelationStatus::Pending
            })
        );
        assert!(matches!(
            plan(RelationAction::Release, Some(RelationStatus::Pending)),
            Err(LifecycleError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn released_is_terminal() {
        for action in [
            RelationAction::Accept,
            RelationAction::AcceptInvitation,
            RelationAction::Release,
            RelationAction::Reject,
            RelationAction::Cancel,
        ] {
            assert_eq!(
                plan(action, Some(RelationStatus::Released)),
                Err(LifecycleError::InvalidTransition {
                    action,
                    status: RelationStatus::Released,
                })
            );
        }
    }

    #[test]
    fn transitions_on_missing_relation_are_not_found() {
        assert_eq!(
            plan(RelationAction::Accept, None),
            Err(LifecycleError::NotRelated)
        );
        assert_eq!(
            plan(RelationAction::Cancel, None),
            Err(LifecycleError::NotRelated)
        );
    }

    #[test]
    fn actors_match_the_side_of_the_relation() {
        assert_eq!(RelationAction::Invite.actor(), UserType::BusinessPartner);
        assert_eq!(RelationAction::Cancel.actor(), UserType::Volunteer);
        assert_eq!(RelationAction::AcceptInvitation.actor(), UserType::Volunteer);
        assert_eq!(RelationAction::Release.actor(), UserType::BusinessPartner);
    }
}
