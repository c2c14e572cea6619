//! Points, assignments, favorites and idea submissions.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use sqlx::{sqlite::SqliteRow, Row};

use shared::{
    domain::{
        Activity, ActivityId, AssignedOpportunity, AssignmentId, AssignmentStatus, EventId,
        Favorite, FavoriteId, FavoriteItemType, IdeaId, IdeaSubmission, OpportunityId, ProfileId,
    },
    forms::FavoriteTarget,
};

use crate::{non_negative, parse_column, Storage};

fn activity_from_row(row: &SqliteRow) -> Result<Activity> {
    Ok(Activity {
        id: ActivityId(row.try_get("id")?),
        user_id: ProfileId(row.try_get("user_id")?),
        activity_type: row.try_get("activity_type")?,
        description: row.try_get("description")?,
        points_earned: non_negative(row.try_get("points_earned")?),
        created_at: row.try_get("created_at")?,
    })
}

fn favorite_from_row(row: &SqliteRow) -> Result<Favorite> {
    Ok(Favorite {
        id: FavoriteId(row.try_get("id")?),
        user_id: ProfileId(row.try_get("user_id")?),
        item_type: parse_column(row, "item_type")?,
        item_id: row.try_get("item_id")?,
        created_at: row.try_get("created_at")?,
    })
}

impl Storage {
    /// Logs an activity and credits its points to the user in one
    /// transaction.
    pub async fn record_activity(
        &self,
        user_id: ProfileId,
        activity_type: &str,
        description: &str,
        points: u32,
    ) -> Result<Activity> {
        let mut tx = self.pool.begin().await?;

        let credited = sqlx::query("UPDATE user_profiles SET points = points + ? WHERE id = ?")
            .bind(i64::from(points))
            .bind(user_id.0)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if credited == 0 {
            bail!("profile {user_id} not found");
        }

        let row = sqlx::query(
            "INSERT INTO user_activities (user_id, activity_type, description, points_earned)
             VALUES (?, ?, ?, ?)
             RETURNING id, user_id, activity_type, description, points_earned, created_at",
        )
        .bind(user_id.0)
        .bind(activity_type)
        .bind(description)
        .bind(i64::from(points))
        .fetch_one(&mut *tx)
        .await
        .context("failed to insert activity")?;
        let activity = activity_from_row(&row)?;

        tx.commit().await?;
        Ok(activity)
    }

    /// Newest activities first, at most `limit` of them when given.
    pub async fn list_activities(
        &self,
        user_id: ProfileId,
        limit: Option<u32>,
    ) -> Result<Vec<Activity>> {
        let rows = sqlx::query(
            "SELECT id, user_id, activity_type, description, points_earned, created_at
             FROM user_activities
             WHERE user_id = ?
             ORDER BY created_at DESC, id DESC
             LIMIT ?",
        )
        .bind(user_id.0)
        .bind(limit.map(i64::from).unwrap_or(-1))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(activity_from_row).collect()
    }

    pub async fn assign_opportunity(
        &self,
        user_id: ProfileId,
        opportunity_title: &str,
        status: AssignmentStatus,
        start_date: Option<NaiveDate>,
    ) -> Result<AssignedOpportunity> {
        let row = sqlx::query(
            "INSERT INTO assigned_opportunities (user_id, opportunity_title, status, start_date)
             VALUES (?, ?, ?, ?)
             RETURNING id, created_at",
        )
        .bind(user_id.0)
        .bind(opportunity_title)
        .bind(status.as_str())
        .bind(start_date)
        .fetch_one(&self.pool)
        .await
        .context("failed to assign opportunity")?;
        Ok(AssignedOpportunity {
            id: AssignmentId(row.get::<i64, _>(0)),
            user_id,
            opportunity_title: opportunity_title.to_string(),
            status,
            start_date,
            created_at: row.get(1),
        })
    }

    pub async fn list_assigned_opportunities(
        &self,
        user_id: ProfileId,
    ) -> Result<Vec<AssignedOpportunity>> {
        let rows = sqlx::query(
            "SELECT id, user_id, opportunity_title, status, start_date, created_at
             FROM assigned_opportunities
             WHERE user_id = ?
             ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| {
                Ok(AssignedOpportunity {
                    id: AssignmentId(row.try_get("id")?),
                    user_id: ProfileId(row.try_get("user_id")?),
                    opportunity_title: row.try_get("opportunity_title")?,
                    status: parse_column(row, "status")?,
                    start_date: row.try_get("start_date")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }

    pub async fn create_opportunity(
        &self,
        title: &str,
        location: Option<&str>,
    ) -> Result<OpportunityId> {
        let rec = sqlx::query("INSERT INTO opportunities (title, location) VALUES (?, ?) RETURNING id")
            .bind(title)
            .bind(location)
            .fetch_one(&self.pool)
            .await?;
        Ok(OpportunityId(rec.get::<i64, _>(0)))
    }

    pub async fn create_event(&self, title: &str, location: Option<&str>) -> Result<EventId> {
        let rec = sqlx::query("INSERT INTO events (title, location) VALUES (?, ?) RETURNING id")
            .bind(title)
            .bind(location)
            .fetch_one(&self.pool)
            .await?;
        Ok(EventId(rec.get::<i64, _>(0)))
    }

    /// Title and location of the item a favorite points at. Urgent needs are
    /// opportunities.
    pub async fn item_summary(
        &self,
        item_type: FavoriteItemType,
        item_id: i64,
    ) -> Result<Option<(String, Option<String>)>> {
        let sql = match item_type {
            FavoriteItemType::UrgentNeed => "SELECT title, location FROM opportunities WHERE id = ?",
            FavoriteItemType::Event => "SELECT title, location FROM events WHERE id = ?",
        };
        let row = sqlx::query(sql)
            .bind(item_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| (r.get::<String, _>(0), r.get::<Option<String>, _>(1))))
    }

    pub async fn favorite_exists(&self, target: &FavoriteTarget) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM favorites WHERE user_id = ? AND item_type = ? AND item_id = ?",
        )
        .bind(target.user_id.0)
        .bind(target.item_type.as_str())
        .bind(target.item_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(found.is_some())
    }

    /// Returns `None` when the favorite already existed.
    pub async fn add_favorite(&self, target: &FavoriteTarget) -> Result<Option<Favorite>> {
        let row = sqlx::query(
            "INSERT INTO favorites (user_id, item_type, item_id) VALUES (?, ?, ?)
             ON CONFLICT(user_id, item_type, item_id) DO NOTHING
             RETURNING id, user_id, item_type, item_id, created_at",
        )
        .bind(target.user_id.0)
        .bind(target.item_type.as_str())
        .bind(target.item_id)
        .fetch_optional(&self.pool)
        .await
        .context("failed to add favorite")?;
        row.as_ref().map(favorite_from_row).transpose()
    }

    /// Returns whether a favorite was removed.
    pub async fn remove_favorite(&self, target: &FavoriteTarget) -> Result<bool> {
        let removed = sqlx::query(
            "DELETE FROM favorites WHERE user_id = ? AND item_type = ? AND item_id = ?",
        )
        .bind(target.user_id.0)
        .bind(target.item_type.as_str())
        .bind(target.item_id)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(removed > 0)
    }

    pub async fn list_favorites(&self, user_id: ProfileId) -> Result<Vec<Favorite>> {
        let rows = sqlx::query(
            "SELECT id, user_id, item_type, item_id, created_at
             FROM favorites
             WHERE user_id = ?
             ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(favorite_from_row).collect()
    }

    pub async fn insert_idea(
        &self,
        user_id: ProfileId,
        title: &str,
        description: &str,
        category: Option<&str>,
    ) -> Result<IdeaSubmission> {
        let row = sqlx::query(
            "INSERT INTO idea_submissions (user_id, title, description, category)
             VALUES (?, ?, ?, ?)
             RETURNING id, user_id, title, description, category, status, created_at",
        )
        .bind(user_id.0)
        .bind(title)
        .bind(description)
        .bind(category)
        .fetch_one(&self.pool)
        .await
        .context("failed to insert idea")?;
        idea_from_row(&row)
    }

    pub async fn list_ideas(&self, user_id: ProfileId) -> Result<Vec<IdeaSubmission>> {
        let rows = sqlx::query(
            "SELECT id, user_id, title, description, category, status, created_at
             FROM idea_submissions
             WHERE user_id = ?
             ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(idea_from_row).collect()
    }
}

fn idea_from_row(row: &SqliteRow) -> Result<IdeaSubmission> {
    Ok(IdeaSubmission {
        id: IdeaId(row.try_get("id")?),
        user_id: ProfileId(row.try_get("user_id")?),
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        category: row.try_get("category")?,
        status: parse_column(row, "status")?,
        created_at: row.try_get("created_at")?,
    })
}
