//! Account, session and recovery-token repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use mdpro_core::{
    new_v7, AccountRepository, Error, Result, SessionRecord, StoredCredentials, UserIdentity,
};

use crate::map_unique;

/// PostgreSQL implementation of AccountRepository.
#[derive(Clone)]
pub struct PgAccountRepository {
    pool: Pool<Postgres>,
}

impl PgAccountRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Remove expired sessions and recovery tokens. Returns the number of rows removed.
    pub async fn purge_expired(&self) -> Result<u64> {
        let now = Utc::now();
        let sessions = sqlx::query("DELETE FROM sessions WHERE expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        let tokens = sqlx::query("DELETE FROM recovery_tokens WHERE expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(sessions.rows_affected() + tokens.rows_affected())
    }
}

#[async_trait]
impl AccountRepository for PgAccountRepository {
    async fn create_account(&self, email: &str, password_hash: &str) -> Result<UserIdentity> {
        let id = new_v7();
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        sqlx::query(
            "INSERT INTO users (id, email, password_hash, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(id)
        .bind(email)
        .bind(password_hash)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_unique(e, "An account with this email already exists"))?;

        sqlx::query("INSERT INTO profiles (id, email, created_at) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(email)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;

        Ok(UserIdentity {
            id,
            email: email.to_string(),
        })
    }

    async fn find_credentials(&self, email: &str) -> Result<Option<StoredCredentials>> {
        let row = sqlx::query("SELECT id, email, password_hash FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(row.map(|r| StoredCredentials {
            user: UserIdentity {
                id: r.get("id"),
                email: r.get("email"),
            },
            password_hash: r.get("password_hash"),
        }))
    }

    async fn set_password_hash(&self, user_id: Uuid, password_hash: &str) -> Result<()> {
        let result =
            sqlx::query("UPDATE users SET password_hash = $2, updated_at = $3 WHERE id = $1")
                .bind(user_id)
                .bind(password_hash)
                .bind(Utc::now())
                .execute(&self.pool)
                .await
                .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("user {}", user_id)));
        }
        Ok(())
    }

    async fn create_session(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
        recovery: bool,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO sessions (token_hash, user_id, expires_at, recovery, created_at)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(token_hash)
        .bind(user_id)
        .bind(expires_at)
        .bind(recovery)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn find_session(&self, token_hash: &str) -> Result<Option<SessionRecord>> {
        let row = sqlx::query(
            "SELECT u.id, u.email, s.expires_at, s.recovery
             FROM sessions s
             JOIN users u ON u.id = s.user_id
             WHERE s.token_hash = $1 AND s.expires_at > $2",
        )
        .bind(token_hash)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(|r| SessionRecord {
            user: UserIdentity {
                id: r.get("id"),
                email: r.get("email"),
            },
            expires_at: r.get("expires_at"),
            recovery: r.get("recovery"),
        }))
    }

    async fn delete_session(&self, token_hash: &str) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    async fn end_recovery(&self, token_hash: &str) -> Result<()> {
        sqlx::query("UPDATE sessions SET recovery = FALSE WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    async fn create_recovery_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO recovery_tokens (token_hash, user_id, expires_at, created_at)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(token_hash)
        .bind(user_id)
        .bind(expires_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn redeem_recovery_token(&self, token_hash: &str) -> Result<Option<UserIdentity>> {
        // Single use: the token row is deleted whether or not it has expired.
        let row = sqlx::query(
            "WITH redeemed AS (
                 DELETE FROM recovery_tokens WHERE token_hash = $1
                 RETURNING user_id, expires_at
             )
             SELECT u.id, u.email
             FROM redeemed r
             JOIN users u ON u.id = r.user_id
             WHERE r.expires_at > $2",
        )
        .bind(token_hash)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(|r| UserIdentity {
            id: r.get("id"),
            email: r.get("email"),
        }))
    }
}
