use anyhow::{anyhow, Context, Result};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::domain::{ProfileId, UnknownVariant, UserProfile};

mod engagement;
mod organisations;
mod profiles;
mod registrations;
mod relations;

pub use relations::RelationWrite;

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("failed to run migrations")?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    /// Creates an account for `email` and returns its id, or `None` when the
    /// email is already taken.
    pub async fn create_identity(&self, email: &str) -> Result<Option<ProfileId>> {
        let id = ProfileId::new_random();
        let row = sqlx::query(
            "INSERT INTO identities (id, email) VALUES (?, ?)
             ON CONFLICT(email) DO NOTHING
             RETURNING id",
        )
        .bind(id.0)
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await
        .context("failed to create identity")?;
        Ok(row.map(|r| ProfileId(r.get::<uuid::Uuid, _>(0))))
    }
}

pub(crate) fn parse_column<T>(row: &SqliteRow, column: &str) -> Result<T>
where
    T: FromStr<Err = UnknownVariant>,
{
    let raw: String = row.try_get(column)?;
    raw.parse::<T>()
        .map_err(|err| anyhow!("corrupt column '{column}': {err}"))
}

pub(crate) fn non_negative(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

pub(crate) const PROFILE_COLUMNS: &str = "id, full_name, email, location, bio, user_type, skills, \
     interests, points, verification_status, access_level, avatar_url, created_at";

/// Profile columns of alias `p`, renamed with a `p_` prefix so they can sit
/// next to another table's columns in a join.
pub(crate) const JOINED_PROFILE_COLUMNS: &str = "p.id AS p_id, p.full_name AS p_full_name, \
     p.email AS p_email, p.location AS p_location, p.bio AS p_bio, p.user_type AS p_user_type, \
     p.skills AS p_skills, p.interests AS p_interests, p.points AS p_points, \
     p.verification_status AS p_verification_status, p.access_level AS p_access_level, \
     p.avatar_url AS p_avatar_url, p.created_at AS p_created_at";

pub(crate) fn profile_from_row(row: &SqliteRow, prefix: &str) -> Result<UserProfile> {
    let col = |name: &str| format!("{prefix}{name}");
    let skills: String = row.try_get(col("skills").as_str())?;
    let interests: String = row.try_get(col("interests").as_str())?;
    Ok(UserProfile {
        id: ProfileId(row.try_get(col("id").as_str())?),
        full_name: row.try_get(col("full_name").as_str())?,
        email: row.try_get(col("email").as_str())?,
        location: row.try_get(col("location").as_str())?,
        bio: row.try_get(col("bio").as_str())?,
        user_type: parse_column(row, &col("user_type"))?,
        skills: serde_json::from_str(&skills).context("corrupt skills list")?,
        interests: serde_json::from_str(&interests).context("corrupt interests list")?,
        points: non_negative(row.try_get(col("points").as_str())?),
        verification_status: parse_column(row, &col("verification_status"))?,
        access_level: parse_column(row, &col("access_level"))?,
        avatar_url: row.try_get(col("avatar_url").as_str())?,
        created_at: row.try_get(col("created_at").as_str())?,
    })
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if !database_url.starts_with("sqlite:") || database_url.contains(":memory:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
