use anyhow::{Context, Result};

use shared::domain::{AccessLevel, NewProfile, ProfileId, UserProfile, UserType, VerificationStatus};

use crate::{profile_from_row, Storage, PROFILE_COLUMNS};

impl Storage {
    pub async fn insert_profile(&self, profile: &NewProfile) -> Result<UserProfile> {
        let skills = serde_json::to_string(&profile.skills)?;
        let interests = serde_json::to_string(&profile.interests)?;
        let row = sqlx::query(&format!(
            "INSERT INTO user_profiles
                (id, full_name, email, location, bio, user_type, skills, interests,
                 verification_status, access_level)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING {PROFILE_COLUMNS}"
        ))
        .bind(profile.id.0)
        .bind(profile.full_name.trim())
        .bind(profile.email.trim())
        .bind(profile.location.trim())
        .bind(profile.bio.trim())
        .bind(profile.user_type.as_str())
        .bind(skills)
        .bind(interests)
        .bind(profile.verification_status.as_str())
        .bind(profile.access_level.as_str())
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("failed to insert profile {}", profile.id))?;
        profile_from_row(&row, "")
    }

    pub async fn get_profile(&self, id: ProfileId) -> Result<Option<UserProfile>> {
        let row = sqlx::query(&format!(
            "SELECT {PROFILE_COLUMNS} FROM user_profiles WHERE id = ?"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| profile_from_row(&r, "")).transpose()
    }

    /// Profiles of one type ordered by name, optionally narrowed to a
    /// verification status.
    pub async fn list_profiles(
        &self,
        user_type: UserType,
        verification: Option<VerificationStatus>,
    ) -> Result<Vec<UserProfile>> {
        let rows = sqlx::query(&format!(
            "SELECT {PROFILE_COLUMNS} FROM user_profiles
             WHERE user_type = ?1 AND (?2 IS NULL OR verification_status = ?2)
             ORDER BY full_name COLLATE NOCASE ASC, id ASC"
        ))
        .bind(user_type.as_str())
        .bind(verification.map(VerificationStatus::as_str))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(|r| profile_from_row(r, "")).collect()
    }

    pub async fn set_verification(
        &self,
        id: ProfileId,
        verification: VerificationStatus,
        access_level: AccessLevel,
    ) -> Result<Option<UserProfile>> {
        let row = sqlx::query(&format!(
            "UPDATE user_profiles SET verification_status = ?, access_level = ?
             WHERE id = ?
             RETURNING {PROFILE_COLUMNS}"
        ))
        .bind(verification.as_str())
        .bind(access_level.as_str())
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| profile_from_row(&r, "")).transpose()
    }
}
