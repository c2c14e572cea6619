use chrono::Utc;
use shared::{
    domain::{
        AccessLevel, NewProfile, NewRelation, ProfileId, RelationStatus, UserProfile, UserType,
        VerificationStatus,
    },
    lifecycle::{plan, Effect, RelationAction},
};
use storage::{RelationWrite, Storage};

async fn profile(storage: &Storage, name: &str, user_type: UserType) -> UserProfile {
    storage
        .insert_profile(&NewProfile {
            id: ProfileId::new_random(),
            full_name: name.to_string(),
            email: format!("{name}@example.org"),
            location: "Krakow".into(),
            bio: String::new(),
            user_type,
            skills: Vec::new(),
            interests: Vec::new(),
            verification_status: VerificationStatus::Verified,
            access_level: AccessLevel::FullAccess,
        })
        .await
        .expect("profile")
}

/// Runs one planned action against storage the way the service layer does.
async fn apply(
    storage: &Storage,
    action: RelationAction,
    volunteer: &UserProfile,
    partner: &UserProfile,
) -> Option<RelationStatus> {
    let current = storage
        .relation_between(volunteer.id, partner.id)
        .await
        .expect("lookup");
    let effect = plan(action, current.as_ref().map(|r| r.status)).expect("allowed");
    match effect {
        Effect::Insert {
            status,
            invitation_type,
        } => {
            let inserted = storage
                .insert_relation(&NewRelation {
                    volunteer_id: volunteer.id,
                    business_partner_id: partner.id,
                    status,
                    invitation_type,
                    joined_at: effect.stamps_joined_at().then(Utc::now),
                })
                .await
                .expect("insert")
                .expect("fresh pair");
            Some(inserted.status)
        }
        Effect::Transition { from, to } => {
            let id = current.expect("planned on existing").id;
            match storage
                .transition_relation(id, from, to, Utc::now())
                .await
                .expect("transition")
            {
                RelationWrite::Applied(rel) => Some(rel.status),
                other => panic!("unexpected {other:?}"),
            }
        }
        Effect::Delete { from } => {
            let id = current.expect("planned on existing").id;
            let write = storage.delete_relation(id, from).await.expect("delete");
            assert!(matches!(write, RelationWrite::Applied(_)));
            None
        }
    }
}

#[tokio::test]
async fn request_accept_release_keeps_first_joined_at() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let ann = profile(&storage, "ann", UserType::Volunteer).await;
    let acme = profile(&storage, "acme", UserType::BusinessPartner).await;

    assert_eq!(
        apply(&storage, RelationAction::RequestToJoin, &ann, &acme).await,
        Some(RelationStatus::Pending)
    );
    let pending = storage
        .relation_between(ann.id, acme.id)
        .await
        .expect("lookup")
        .expect("stored");
    assert!(pending.joined_at.is_none());

    assert_eq!(
        apply(&storage, RelationAction::Accept, &ann, &acme).await,
        Some(RelationStatus::Active)
    );
    assert_eq!(
        apply(&storage, RelationAction::Release, &ann, &acme).await,
        Some(RelationStatus::Released)
    );

    let released = storage
        .relation_between(ann.id, acme.id)
        .await
        .expect("lookup")
        .expect("stored");
    assert!(released.joined_at.is_some());
    assert!(released.released_at.is_some());

    // Released pairs stay related and cannot be invited again.
    assert!(plan(RelationAction::Invite, Some(released.status)).is_err());
}

#[tokio::test]
async fn rejected_request_disappears_from_both_sides() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let ann = profile(&storage, "ann", UserType::Volunteer).await;
    let acme = profile(&storage, "acme", UserType::BusinessPartner).await;

    apply(&storage, RelationAction::RequestToJoin, &ann, &acme).await;
    assert_eq!(apply(&storage, RelationAction::Reject, &ann, &acme).await, None);

    let partner_side = storage
        .partner_relations(acme.id, RelationStatus::ALL, None)
        .await
        .expect("partner side");
    let volunteer_side = storage
        .volunteer_relations(ann.id, RelationStatus::ALL)
        .await
        .expect("volunteer side");
    assert!(partner_side.is_empty());
    assert!(volunteer_side.is_empty());
    assert!(storage.related_volunteer_ids(acme.id).await.expect("ids").is_empty());
}

#[tokio::test]
async fn register_on_behalf_starts_active() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let ann = profile(&storage, "ann", UserType::Volunteer).await;
    let acme = profile(&storage, "acme", UserType::BusinessPartner).await;

    assert_eq!(
        apply(&storage, RelationAction::RegisterOnBehalf, &ann, &acme).await,
        Some(RelationStatus::Active)
    );
    let relation = storage
        .relation_between(ann.id, acme.id)
        .await
        .expect("lookup")
        .expect("stored");
    assert!(relation.joined_at.is_some());
}
