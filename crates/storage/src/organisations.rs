use anyhow::{Context, Result};
use sqlx::{sqlite::SqliteRow, Row};

use shared::domain::{
    ApplicationStatus, OrganisationActivity, OrganisationActivityType, OrganisationVolunteerStatus,
    ProfileId,
};

use crate::{parse_column, Storage};

fn organisation_activity_from_row(row: &SqliteRow) -> Result<OrganisationActivity> {
    Ok(OrganisationActivity {
        id: row.try_get("id")?,
        organisation_id: ProfileId(row.try_get("organisation_id")?),
        activity_type: parse_column(row, "activity_type")?,
        description: row.try_get("description")?,
        created_at: row.try_get("created_at")?,
    })
}

impl Storage {
    pub async fn insert_organisation_application(
        &self,
        organisation_id: ProfileId,
        status: ApplicationStatus,
    ) -> Result<i64> {
        let rec = sqlx::query(
            "INSERT INTO organisation_applications (organisation_id, status) VALUES (?, ?) RETURNING id",
        )
        .bind(organisation_id.0)
        .bind(status.as_str())
        .fetch_one(&self.pool)
        .await
        .context("failed to insert organisation application")?;
        Ok(rec.get::<i64, _>(0))
    }

    pub async fn list_application_statuses(
        &self,
        organisation_id: ProfileId,
    ) -> Result<Vec<ApplicationStatus>> {
        let rows = sqlx::query("SELECT status FROM organisation_applications WHERE organisation_id = ?")
            .bind(organisation_id.0)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(|r| parse_column(r, "status")).collect()
    }

    pub async fn insert_organisation_volunteer(
        &self,
        organisation_id: ProfileId,
        volunteer_id: ProfileId,
        status: OrganisationVolunteerStatus,
    ) -> Result<i64> {
        let rec = sqlx::query(
            "INSERT INTO organisation_volunteers (organisation_id, volunteer_id, status)
             VALUES (?, ?, ?) RETURNING id",
        )
        .bind(organisation_id.0)
        .bind(volunteer_id.0)
        .bind(status.as_str())
        .fetch_one(&self.pool)
        .await
        .context("failed to insert organisation volunteer")?;
        Ok(rec.get::<i64, _>(0))
    }

    pub async fn list_organisation_volunteer_statuses(
        &self,
        organisation_id: ProfileId,
    ) -> Result<Vec<OrganisationVolunteerStatus>> {
        let rows = sqlx::query("SELECT status FROM organisation_volunteers WHERE organisation_id = ?")
            .bind(organisation_id.0)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(|r| parse_column(r, "status")).collect()
    }

    pub async fn log_organisation_activity(
        &self,
        organisation_id: ProfileId,
        activity_type: OrganisationActivityType,
        description: &str,
    ) -> Result<OrganisationActivity> {
        let row = sqlx::query(
            "INSERT INTO organisation_activities_log (organisation_id, activity_type, description)
             VALUES (?, ?, ?)
             RETURNING id, organisation_id, activity_type, description, created_at",
        )
        .bind(organisation_id.0)
        .bind(activity_type.as_str())
        .bind(description)
        .fetch_one(&self.pool)
        .await
        .context("failed to log organisation activity")?;
        organisation_activity_from_row(&row)
    }

    pub async fn recent_organisation_activities(
        &self,
        organisation_id: ProfileId,
        limit: u32,
    ) -> Result<Vec<OrganisationActivity>> {
        let rows = sqlx::query(
            "SELECT id, organisation_id, activity_type, description, created_at
             FROM organisation_activities_log
             WHERE organisation_id = ?
             ORDER BY created_at DESC, id DESC
             LIMIT ?",
        )
        .bind(organisation_id.0)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(organisation_activity_from_row).collect()
    }
}
