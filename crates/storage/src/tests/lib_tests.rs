use super::*;

use chrono::Utc;
use shared::{
    domain::{
        AccessLevel, ApplicationStatus, FavoriteItemType, InvitationType, NewProfile,
        NewRelation, OrganisationActivityType, OrganisationVolunteerStatus, RelationId, RelationStatus,
        UserType, VerificationStatus,
    },
    forms::{DocumentUpload, FavoriteTarget},
};

async fn profile(storage: &Storage, name: &str, user_type: UserType) -> UserProfile {
    storage
        .insert_profile(&NewProfile {
            id: ProfileId::new_random(),
            full_name: name.to_string(),
            email: format!("{}@example.org", name.to_lowercase()),
            location: "Warsaw".into(),
            bio: String::new(),
            user_type,
            skills: vec!["Teaching".into()],
            interests: Vec::new(),
            verification_status: VerificationStatus::Verified,
            access_level: AccessLevel::FullAccess,
        })
        .await
        .expect("profile")
}

fn invite(volunteer: &UserProfile, partner: &UserProfile) -> NewRelation {
    NewRelation {
        volunteer_id: volunteer.id,
        business_partner_id: partner.id,
        status: RelationStatus::Invited,
        invitation_type: InvitationType::PartnerInvite,
        joined_at: None,
    }
}

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("coordinator.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );
}

#[test]
fn memory_urls_have_no_file_path() {
    assert_eq!(sqlite_path("sqlite::memory:"), None);
    assert_eq!(sqlite_path("postgres://localhost/db"), None);
    assert_eq!(
        sqlite_path("sqlite://data/app.db?mode=rwc"),
        Some(PathBuf::from("data/app.db"))
    );
}

#[tokio::test]
async fn identity_emails_are_unique_ignoring_case() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let first = storage.create_identity("ann@example.org").await.expect("identity");
    assert!(first.is_some());
    let again = storage.create_identity("ANN@example.org ").await.expect("identity");
    assert_eq!(again, None);
}

#[tokio::test]
async fn profile_lists_round_trip_through_json_columns() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let ann = profile(&storage, "Ann", UserType::Volunteer).await;
    let fetched = storage.get_profile(ann.id).await.expect("get").expect("present");
    assert_eq!(fetched.skills, vec!["Teaching".to_string()]);
    assert_eq!(fetched.points, 0);
    assert!(storage
        .get_profile(ProfileId::new_random())
        .await
        .expect("get")
        .is_none());
}

#[tokio::test]
async fn list_profiles_filters_by_type_and_verification() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    profile(&storage, "Zed", UserType::Volunteer).await;
    profile(&storage, "amy", UserType::Volunteer).await;
    let acme = profile(&storage, "Acme", UserType::BusinessPartner).await;
    storage
        .set_verification(acme.id, VerificationStatus::InVerification, AccessLevel::ReadOnly)
        .await
        .expect("verify")
        .expect("present");

    let volunteers = storage
        .list_profiles(UserType::Volunteer, None)
        .await
        .expect("list");
    let names: Vec<_> = volunteers.iter().map(|p| p.full_name.as_str()).collect();
    assert_eq!(names, vec!["amy", "Zed"]);

    let verified_partners = storage
        .list_profiles(UserType::BusinessPartner, Some(VerificationStatus::Verified))
        .await
        .expect("list");
    assert!(verified_partners.is_empty());
}

#[tokio::test]
async fn duplicate_relation_insert_writes_nothing() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let ann = profile(&storage, "Ann", UserType::Volunteer).await;
    let acme = profile(&storage, "Acme", UserType::BusinessPartner).await;

    let first = storage.insert_relation(&invite(&ann, &acme)).await.expect("insert");
    assert!(first.is_some());
    let second = storage.insert_relation(&invite(&ann, &acme)).await.expect("insert");
    assert_eq!(second, None);
}

#[tokio::test]
async fn transition_stamps_joined_at_and_refuses_stale_status() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let ann = profile(&storage, "Ann", UserType::Volunteer).await;
    let acme = profile(&storage, "Acme", UserType::BusinessPartner).await;
    let relation = storage
        .insert_relation(&invite(&ann, &acme))
        .await
        .expect("insert")
        .expect("new");
    assert!(relation.joined_at.is_none());

    let joined = match storage
        .transition_relation(relation.id, RelationStatus::Invited, RelationStatus::Active, Utc::now())
        .await
        .expect("transition")
    {
        RelationWrite::Applied(rel) => rel,
        other => panic!("unexpected {other:?}"),
    };
    assert_eq!(joined.status, RelationStatus::Active);
    assert!(joined.joined_at.is_some());

    let again = storage
        .transition_relation(relation.id, RelationStatus::Invited, RelationStatus::Active, Utc::now())
        .await
        .expect("transition");
    assert_eq!(again, RelationWrite::Stale(RelationStatus::Active));

    let released = match storage
        .transition_relation(relation.id, RelationStatus::Active, RelationStatus::Released, Utc::now())
        .await
        .expect("release")
    {
        RelationWrite::Applied(rel) => rel,
        other => panic!("unexpected {other:?}"),
    };
    assert!(released.released_at.is_some());
    assert_eq!(released.joined_at, joined.joined_at);
}

#[tokio::test]
async fn delete_only_applies_in_expected_status() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let ann = profile(&storage, "Ann", UserType::Volunteer).await;
    let acme = profile(&storage, "Acme", UserType::BusinessPartner).await;
    let relation = storage
        .insert_relation(&invite(&ann, &acme))
        .await
        .expect("insert")
        .expect("new");

    let refused = storage
        .delete_relation(relation.id, RelationStatus::Pending)
        .await
        .expect("delete");
    assert_eq!(refused, RelationWrite::Stale(RelationStatus::Invited));

    let missing = storage
        .delete_relation(RelationId(relation.id.0 + 100), RelationStatus::Pending)
        .await
        .expect("delete");
    assert_eq!(missing, RelationWrite::Missing);
}

#[tokio::test]
async fn relation_listings_join_the_other_side() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let ann = profile(&storage, "Ann", UserType::Volunteer).await;
    let bob = profile(&storage, "Bob", UserType::Volunteer).await;
    let acme = profile(&storage, "Acme", UserType::BusinessPartner).await;
    storage.insert_relation(&invite(&ann, &acme)).await.expect("insert");
    storage
        .insert_relation(&NewRelation {
            status: RelationStatus::Pending,
            invitation_type: InvitationType::VolunteerRequest,
            ..invite(&bob, &acme)
        })
        .await
        .expect("insert");

    let team = storage
        .partner_relations(acme.id, &[RelationStatus::Active, RelationStatus::Invited], None)
        .await
        .expect("team");
    assert_eq!(team.len(), 1);
    assert_eq!(team[0].counterpart.id, ann.id);

    let requests = storage
        .partner_relations(
            acme.id,
            &[RelationStatus::Pending],
            Some(InvitationType::VolunteerRequest),
        )
        .await
        .expect("requests");
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].counterpart.full_name, "Bob");

    let partners = storage
        .volunteer_relations(bob.id, &[RelationStatus::Pending])
        .await
        .expect("partners");
    assert_eq!(partners[0].counterpart.id, acme.id);

    let related = storage.related_volunteer_ids(acme.id).await.expect("ids");
    assert!(related.contains(&ann.id) && related.contains(&bob.id));
    assert!(storage
        .partner_relations(acme.id, &[], None)
        .await
        .expect("empty")
        .is_empty());
}

#[tokio::test]
async fn record_activity_credits_points_atomically() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let ann = profile(&storage, "Ann", UserType::Volunteer).await;
    storage
        .record_activity(ann.id, "event", "Food bank shift", 15)
        .await
        .expect("activity");
    storage
        .record_activity(ann.id, "event", "Park cleanup", 10)
        .await
        .expect("activity");

    let refreshed = storage.get_profile(ann.id).await.expect("get").expect("present");
    assert_eq!(refreshed.points, 25);

    let latest = storage.list_activities(ann.id, Some(1)).await.expect("list");
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].description, "Park cleanup");
    assert_eq!(storage.list_activities(ann.id, None).await.expect("list").len(), 2);

    let unknown = storage
        .record_activity(ProfileId::new_random(), "event", "ghost", 5)
        .await;
    assert!(unknown.is_err());
}

#[tokio::test]
async fn favorites_are_unique_per_item() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let ann = profile(&storage, "Ann", UserType::Volunteer).await;
    let event = storage
        .create_event("Charity run", Some("Gdansk"))
        .await
        .expect("event");
    let target = FavoriteTarget {
        user_id: ann.id,
        item_type: FavoriteItemType::Event,
        item_id: event.0,
    };

    assert!(!storage.favorite_exists(&target).await.expect("exists"));
    assert!(storage.add_favorite(&target).await.expect("add").is_some());
    assert!(storage.add_favorite(&target).await.expect("add").is_none());
    assert!(storage.favorite_exists(&target).await.expect("exists"));
    assert_eq!(
        storage
            .item_summary(FavoriteItemType::Event, event.0)
            .await
            .expect("summary"),
        Some(("Charity run".to_string(), Some("Gdansk".to_string())))
    );
    assert!(storage.remove_favorite(&target).await.expect("remove"));
    assert!(!storage.remove_favorite(&target).await.expect("remove"));
}

#[tokio::test]
async fn documents_keep_metadata_only() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let home = profile(&storage, "Home", UserType::CareFacilityNgo).await;
    let form = shared::forms::CareFacilityRegistrationForm {
        organisation_type: Some(shared::domain::OrganisationType::School),
        name: "Home".into(),
        date_of_establishment: chrono::NaiveDate::from_ymd_opt(2001, 9, 1).expect("date"),
        business_profile: "Primary school".into(),
        detailed_description: String::new(),
        address: "Oak 1".into(),
        secondary_address: None,
        krs: Some("  ".into()),
        email: "home@example.org".into(),
        password: "secret-password".into(),
        confirm_password: "secret-password".into(),
        documents: Vec::new(),
    };
    let registration = storage
        .insert_care_facility_registration(home.id, shared::domain::OrganisationType::School, &form)
        .await
        .expect("registration");
    assert_eq!(registration.krs, None);

    let doc = storage
        .insert_care_facility_document(
            registration.id,
            &DocumentUpload {
                file_name: "statute.pdf".into(),
                file_size: 2048,
            },
        )
        .await
        .expect("document");
    assert_eq!(doc.document_type, "pdf");
    assert_eq!(doc.file_url, "");
    assert_eq!(
        storage
            .list_care_facility_documents(registration.id)
            .await
            .expect("list"),
        vec![doc]
    );
}

#[tokio::test]
async fn organisation_records_are_scoped_per_organisation() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let home = profile(&storage, "Home", UserType::CareFacilityNgo).await;
    let other = profile(&storage, "Other", UserType::CareFacilityNgo).await;
    let ann = profile(&storage, "Ann", UserType::Volunteer).await;

    storage
        .insert_organisation_application(home.id, ApplicationStatus::InProgress)
        .await
        .expect("application");
    storage
        .insert_organisation_application(other.id, ApplicationStatus::Completed)
        .await
        .expect("application");
    storage
        .insert_organisation_volunteer(home.id, ann.id, OrganisationVolunteerStatus::Active)
        .await
        .expect("volunteer");
    for n in 0..3 {
        storage
            .log_organisation_activity(home.id, OrganisationActivityType::Other, &format!("entry {n}"))
            .await
            .expect("log");
    }

    assert_eq!(
        storage.list_application_statuses(home.id).await.expect("apps"),
        vec![ApplicationStatus::InProgress]
    );
    assert_eq!(
        storage
            .list_organisation_volunteer_statuses(home.id)
            .await
            .expect("volunteers"),
        vec![OrganisationVolunteerStatus::Active]
    );
    let recent = storage
        .recent_organisation_activities(home.id, 2)
        .await
        .expect("recent");
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].description, "entry 2");
}
