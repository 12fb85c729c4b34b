//! Share settings repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{postgres::PgRow, Pool, Postgres, Row};
use uuid::Uuid;

use mdpro_core::{new_v7, Error, NewShareSettings, Result, ShareRepository, ShareSettings};

use crate::map_unique;

const SHARE_COLUMNS: &str =
    "s.id, s.document_id, s.share_id, s.is_public, s.password_hash, s.expiry_date, s.created_at";

fn share_from_row(r: &PgRow) -> ShareSettings {
    ShareSettings {
        id: r.get("id"),
        document_id: r.get("document_id"),
        share_id: r.get("share_id"),
        is_public: r.get("is_public"),
        password_hash: r.get("password_hash"),
        expiry_date: r.get("expiry_date"),
        created_at: r.get("created_at"),
    }
}

/// PostgreSQL implementation of ShareRepository.
#[derive(Clone)]
pub struct PgShareRepository {
    pool: Pool<Postgres>,
}

impl PgShareRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ShareRepository for PgShareRepository {
    async fn insert(&self, user_id: Uuid, share: NewShareSettings) -> Result<ShareSettings> {
        // Only the owner may share; the INSERT ... SELECT yields no row otherwise.
        let row = sqlx::query(&format!(
            "INSERT INTO share_settings AS s (id, document_id, share_id, is_public, password_hash, expiry_date, created_at)
             SELECT $1, d.id, $3, $4, $5, $6, $7
             FROM documents d
             WHERE d.id = $2 AND d.user_id = $8
             RETURNING {}",
            SHARE_COLUMNS
        ))
        .bind(new_v7())
        .bind(share.document_id)
        .bind(&share.share_id)
        .bind(share.is_public)
        .bind(&share.password_hash)
        .bind(share.expiry_date)
        .bind(Utc::now())
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_unique(e, "A share with this token already exists"))?;

        row.as_ref()
            .map(share_from_row)
            .ok_or(Error::DocumentNotFound(share.document_id))
    }

    async fn find_by_token(&self, share_id: &str) -> Result<Option<ShareSettings>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM share_settings s WHERE s.share_id = $1",
            SHARE_COLUMNS
        ))
        .bind(share_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.as_ref().map(share_from_row))
    }

    async fn list_for_document(
        &self,
        user_id: Uuid,
        document_id: Uuid,
    ) -> Result<Vec<ShareSettings>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM share_settings s
             JOIN documents d ON d.id = s.document_id
             WHERE s.document_id = $1 AND d.user_id = $2
             ORDER BY s.created_at DESC",
            SHARE_COLUMNS
        ))
        .bind(document_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(share_from_row).collect())
    }
}
