//! Profile repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{postgres::PgRow, Pool, Postgres, Row};
use uuid::Uuid;

use mdpro_core::{Error, ProfileRepository, Result, UpdateProfileRequest, UserProfile};

fn profile_from_row(r: &PgRow) -> UserProfile {
    UserProfile {
        id: r.get("id"),
        email: r.get("email"),
        full_name: r.get("full_name"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    }
}

/// PostgreSQL implementation of ProfileRepository.
#[derive(Clone)]
pub struct PgProfileRepository {
    pool: Pool<Postgres>,
}

impl PgProfileRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileRepository for PgProfileRepository {
    async fn get(&self, user_id: Uuid) -> Result<UserProfile> {
        let row = sqlx::query(
            "SELECT id, email, full_name, created_at, updated_at FROM profiles WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.as_ref()
            .map(profile_from_row)
            .ok_or_else(|| Error::NotFound(format!("profile {}", user_id)))
    }

    async fn update(&self, user_id: Uuid, req: UpdateProfileRequest) -> Result<UserProfile> {
        let row = sqlx::query(
            "UPDATE profiles SET full_name = $2, updated_at = $3
             WHERE id = $1
             RETURNING id, email, full_name, created_at, updated_at",
        )
        .bind(user_id)
        .bind(req.full_name)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.as_ref()
            .map(profile_from_row)
            .ok_or_else(|| Error::NotFound(format!("profile {}", user_id)))
    }
}
