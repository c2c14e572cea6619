use std::collections::HashSet;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite};

use shared::domain::{
    InvitationType, NewRelation, ProfileId, Relation, RelationId, RelationStatus,
    RelationWithProfile,
};

use crate::{parse_column, profile_from_row, Storage, JOINED_PROFILE_COLUMNS};

const RELATION_COLUMNS: &str = "id, volunteer_id, business_partner_id, status, invitation_type, \
     joined_at, released_at, notes, created_at";

const ALIASED_RELATION_COLUMNS: &str = "r.id AS id, r.volunteer_id AS volunteer_id, \
     r.business_partner_id AS business_partner_id, r.status AS status, \
     r.invitation_type AS invitation_type, r.joined_at AS joined_at, \
     r.released_at AS released_at, r.notes AS notes, r.created_at AS created_at";

/// Outcome of a write that only applies while the relation is still in the
/// status the caller last saw.
#[derive(Debug, Clone, PartialEq)]
pub enum RelationWrite {
    Applied(Relation),
    Missing,
    Stale(RelationStatus),
}

/// Which profile of a relation a listing joins in.
#[derive(Clone, Copy)]
enum Counterpart {
    Volunteer,
    Partner,
}

impl Counterpart {
    fn join_column(self) -> &'static str {
        match self {
            Counterpart::Volunteer => "r.volunteer_id",
            Counterpart::Partner => "r.business_partner_id",
        }
    }

    fn owner_column(self) -> &'static str {
        match self {
            Counterpart::Volunteer => "r.business_partner_id",
            Counterpart::Partner => "r.volunteer_id",
        }
    }
}

fn relation_from_row(row: &SqliteRow) -> Result<Relation> {
    Ok(Relation {
        id: RelationId(row.try_get("id")?),
        volunteer_id: ProfileId(row.try_get("volunteer_id")?),
        business_partner_id: ProfileId(row.try_get("business_partner_id")?),
        status: parse_column(row, "status")?,
        invitation_type: parse_column(row, "invitation_type")?,
        joined_at: row.try_get("joined_at")?,
        released_at: row.try_get("released_at")?,
        notes: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
    })
}

impl Storage {
    /// Inserts a relation unless the pair is already related, in which case
    /// nothing is written and `None` is returned.
    pub async fn insert_relation(&self, relation: &NewRelation) -> Result<Option<Relation>> {
        let row = sqlx::query(&format!(
            "INSERT INTO volunteer_business_partner_relations
                (volunteer_id, business_partner_id, status, invitation_type, joined_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(volunteer_id, business_partner_id) DO NOTHING
             RETURNING {RELATION_COLUMNS}"
        ))
        .bind(relation.volunteer_id.0)
        .bind(relation.business_partner_id.0)
        .bind(relation.status.as_str())
        .bind(relation.invitation_type.as_str())
        .bind(relation.joined_at)
        .fetch_optional(&self.pool)
        .await
        .context("failed to insert relation")?;
        row.as_ref().map(relation_from_row).transpose()
    }

    pub async fn get_relation(&self, id: RelationId) -> Result<Option<Relation>> {
        let row = sqlx::query(&format!(
            "SELECT {RELATION_COLUMNS} FROM volunteer_business_partner_relations WHERE id = ?"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(relation_from_row).transpose()
    }

    pub async fn relation_between(
        &self,
        volunteer_id: ProfileId,
        business_partner_id: ProfileId,
    ) -> Result<Option<Relation>> {
        let row = sqlx::query(&format!(
            "SELECT {RELATION_COLUMNS} FROM volunteer_business_partner_relations
             WHERE volunteer_id = ? AND business_partner_id = ?"
        ))
        .bind(volunteer_id.0)
        .bind(business_partner_id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(relation_from_row).transpose()
    }

    /// Moves a relation from `from` to `to`. Entering `active` stamps
    /// `joined_at` and entering `released` stamps `released_at`; no other
    /// timestamp is touched.
    pub async fn transition_relation(
        &self,
        id: RelationId,
        from: RelationStatus,
        to: RelationStatus,
        at: DateTime<Utc>,
    ) -> Result<RelationWrite> {
        let joined_at = (to == RelationStatus::Active).then_some(at);
        let released_at = (to == RelationStatus::Released).then_some(at);
        let row = sqlx::query(&format!(
            "UPDATE volunteer_business_partner_relations
             SET status = ?,
                 joined_at = COALESCE(?, joined_at),
                 released_at = COALESCE(?, released_at)
             WHERE id = ? AND status = ?
             RETURNING {RELATION_COLUMNS}"
        ))
        .bind(to.as_str())
        .bind(joined_at)
        .bind(released_at)
        .bind(id.0)
        .bind(from.as_str())
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("failed to move relation {id} from {from} to {to}"))?;

        match row {
            Some(row) => Ok(RelationWrite::Applied(relation_from_row(&row)?)),
            None => self.missed_write(id).await,
        }
    }

    /// Deletes a relation that is still in status `from`, returning the row
    /// as it was.
    pub async fn delete_relation(
        &self,
        id: RelationId,
        from: RelationStatus,
    ) -> Result<RelationWrite> {
        let row = sqlx::query(&format!(
            "DELETE FROM volunteer_business_partner_relations
             WHERE id = ? AND status = ?
             RETURNING {RELATION_COLUMNS}"
        ))
        .bind(id.0)
        .bind(from.as_str())
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("failed to delete relation {id}"))?;

        match row {
            Some(row) => Ok(RelationWrite::Applied(relation_from_row(&row)?)),
            None => self.missed_write(id).await,
        }
    }

    async fn missed_write(&self, id: RelationId) -> Result<RelationWrite> {
        Ok(match self.get_relation(id).await? {
            Some(current) => RelationWrite::Stale(current.status),
            None => RelationWrite::Missing,
        })
    }

    pub async fn update_relation_notes(
        &self,
        id: RelationId,
        notes: Option<&str>,
    ) -> Result<Option<Relation>> {
        let row = sqlx::query(&format!(
            "UPDATE volunteer_business_partner_relations SET notes = ?
             WHERE id = ?
             RETURNING {RELATION_COLUMNS}"
        ))
        .bind(notes)
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(relation_from_row).transpose()
    }

    /// A partner's relations in any of `statuses`, each with the volunteer's
    /// profile, newest first.
    pub async fn partner_relations(
        &self,
        business_partner_id: ProfileId,
        statuses: &[RelationStatus],
        invitation_type: Option<InvitationType>,
    ) -> Result<Vec<RelationWithProfile>> {
        self.relations_with_counterpart(
            business_partner_id,
            Counterpart::Volunteer,
            statuses,
            invitation_type,
        )
        .await
    }

    /// A volunteer's relations in any of `statuses`, each with the partner's
    /// profile, newest first.
    pub async fn volunteer_relations(
        &self,
        volunteer_id: ProfileId,
        statuses: &[RelationStatus],
    ) -> Result<Vec<RelationWithProfile>> {
        self.relations_with_counterpart(volunteer_id, Counterpart::Partner, statuses, None)
            .await
    }

    async fn relations_with_counterpart(
        &self,
        owner: ProfileId,
        counterpart: Counterpart,
        statuses: &[RelationStatus],
        invitation_type: Option<InvitationType>,
    ) -> Result<Vec<RelationWithProfile>> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {ALIASED_RELATION_COLUMNS}, {JOINED_PROFILE_COLUMNS}
             FROM volunteer_business_partner_relations r
             INNER JOIN user_profiles p ON p.id = {}
             WHERE {} = ",
            counterpart.join_column(),
            counterpart.owner_column(),
        ));
        qb.push_bind(owner.0);
        qb.push(" AND r.status IN (");
        let mut separated = qb.separated(", ");
        for status in statuses {
            separated.push_bind(status.as_str());
        }
        separated.push_unseparated(")");
        if let Some(invitation_type) = invitation_type {
            qb.push(" AND r.invitation_type = ");
            qb.push_bind(invitation_type.as_str());
        }
        qb.push(" ORDER BY r.created_at DESC, r.id DESC");

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("failed to list relations of {owner}"))?;
        rows.iter()
            .map(|row| {
                Ok(RelationWithProfile {
                    relation: relation_from_row(row)?,
                    counterpart: profile_from_row(row, "p_")?,
                })
            })
            .collect()
    }

    /// Every volunteer related to the partner, whatever the status.
    pub async fn related_volunteer_ids(
        &self,
        business_partner_id: ProfileId,
    ) -> Result<HashSet<ProfileId>> {
        let rows = sqlx::query(
            "SELECT volunteer_id FROM volunteer_business_partner_relations
             WHERE business_partner_id = ?",
        )
        .bind(business_partner_id.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| ProfileId(r.get::<uuid::Uuid, _>(0)))
            .collect())
    }

    /// Every partner related to the volunteer, whatever the status.
    pub async fn related_partner_ids(&self, volunteer_id: ProfileId) -> Result<HashSet<ProfileId>> {
        let rows = sqlx::query(
            "SELECT business_partner_id FROM volunteer_business_partner_relations
             WHERE volunteer_id = ?",
        )
        .bind(volunteer_id.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| ProfileId(r.get::<uuid::Uuid, _>(0)))
            .collect())
    }
}
