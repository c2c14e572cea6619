use super::*;

async fn api_with_volunteer() -> (ApiContext, ProfileId) {
    let api = ApiContext::new(Storage::new("sqlite::memory:").await.expect("db"));
    let profile = api
        .storage
        .insert_profile(&NewProfile {
            id: ProfileId::new_random(),
            full_name: "Ann".into(),
            email: "ann@example.org".into(),
            location: "Krakow".into(),
            bio: String::new(),
            user_type: UserType::Volunteer,
            skills: Vec::new(),
            interests: Vec::new(),
            verification_status: VerificationStatus::Verified,
            access_level: AccessLevel::FullAccess,
        })
        .await
        .expect("profile");
    (api, profile.id)
}

#[tokio::test]
async fn record_activity_rejects_blank_type() {
    let (api, user_id) = api_with_volunteer().await;

    let err = run(
        &api,
        Command::RecordActivity {
            user_id: user_id.0,
            activity_type: "   ".into(),
            points: 5,
            description: String::new(),
        },
    )
    .await
    .expect_err("blank type");
    assert!(err.to_string().contains("Activity type is required"));

    let stored = api
        .storage
        .list_activities(user_id, None)
        .await
        .expect("activities");
    assert!(stored.is_empty());
}

#[tokio::test]
async fn record_activity_credits_points() {
    let (api, user_id) = api_with_volunteer().await;

    run(
        &api,
        Command::RecordActivity {
            user_id: user_id.0,
            activity_type: " event ".into(),
            points: 15,
            description: "Park cleanup".into(),
        },
    )
    .await
    .expect("recorded");

    let stored = api
        .storage
        .list_activities(user_id, None)
        .await
        .expect("activities");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].activity_type, "event");
    let profile = api
        .storage
        .get_profile(user_id)
        .await
        .expect("lookup")
        .expect("profile");
    assert_eq!(profile.points, 15);

    let err = run(
        &api,
        Command::RecordActivity {
            user_id: ProfileId::new_random().0,
            activity_type: "event".into(),
            points: 1,
            description: String::new(),
        },
    )
    .await
    .expect_err("unknown profile");
    assert!(err.to_string().contains("not found"));
}
