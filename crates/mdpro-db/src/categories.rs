//! Category repository implementation.
//!
//! Categories carry a materialized `path` (names joined with `/`). Renames and
//! deletes rewrite the paths of the affected subtree inside one transaction.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{postgres::PgRow, Pool, Postgres, Row, Transaction};
use uuid::Uuid;

use mdpro_core::{
    category_path, models::validate_category_name, new_v7, Category, CategoryRepository,
    CreateCategoryRequest, Error, Result,
};

const CATEGORY_COLUMNS: &str = "id, name, parent_id, user_id, path, created_at, updated_at";

/// Rewrites the path prefix of every descendant of `$1`.
///
/// `$3` is the new prefix and `$4` the 1-based offset where the part of the
/// old path to keep begins.
const REWRITE_SUBTREE_PATHS: &str = r#"
    WITH RECURSIVE subtree AS (
        SELECT id FROM categories WHERE parent_id = $1 AND user_id = $2
        UNION ALL
        SELECT c.id FROM categories c JOIN subtree s ON c.parent_id = s.id
    )
    UPDATE categories
    SET path = $3 || substring(path from $4), updated_at = $5
    WHERE id IN (SELECT id FROM subtree)
"#;

fn category_from_row(r: &PgRow) -> Category {
    Category {
        id: r.get("id"),
        name: r.get("name"),
        parent_id: r.get("parent_id"),
        user_id: r.get("user_id"),
        path: r.get("path"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    }
}

/// PostgreSQL implementation of CategoryRepository.
#[derive(Clone)]
pub struct PgCategoryRepository {
    pool: Pool<Postgres>,
}

impl PgCategoryRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn fetch_tx(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Category> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM categories WHERE id = $1 AND user_id = $2 FOR UPDATE",
            CATEGORY_COLUMNS
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?;

        row.as_ref()
            .map(category_from_row)
            .ok_or(Error::CategoryNotFound(id))
    }
}

#[async_trait]
impl CategoryRepository for PgCategoryRepository {
    async fn insert(&self, user_id: Uuid, req: CreateCategoryRequest) -> Result<Category> {
        validate_category_name(&req.name)?;
        let name = req.name.trim();

        let parent_path: Option<String> = match req.parent_id {
            Some(parent_id) => Some(
                sqlx::query_scalar("SELECT path FROM categories WHERE id = $1 AND user_id = $2")
                    .bind(parent_id)
                    .bind(user_id)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(Error::Database)?
                    .ok_or(Error::CategoryNotFound(parent_id))?,
            ),
            None => None,
        };

        let now = Utc::now();
        let row = sqlx::query(&format!(
            "INSERT INTO categories (id, name, parent_id, user_id, path, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $6)
             RETURNING {}",
            CATEGORY_COLUMNS
        ))
        .bind(new_v7())
        .bind(name)
        .bind(req.parent_id)
        .bind(user_id)
        .bind(category_path(parent_path.as_deref(), name))
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(category_from_row(&row))
    }

    async fn fetch(&self, user_id: Uuid, id: Uuid) -> Result<Category> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM categories WHERE id = $1 AND user_id = $2",
            CATEGORY_COLUMNS
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.as_ref()
            .map(category_from_row)
            .ok_or(Error::CategoryNotFound(id))
    }

    async fn list(&self, user_id: Uuid) -> Result<Vec<Category>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM categories WHERE user_id = $1 ORDER BY path, id",
            CATEGORY_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(category_from_row).collect())
    }

    async fn rename(&self, user_id: Uuid, id: Uuid, name: &str) -> Result<Category> {
        validate_category_name(name)?;
        let name = name.trim();
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let current = Self::fetch_tx(&mut tx, user_id, id).await?;
        let parent_prefix = current.path.strip_suffix(&current.name).unwrap_or("");
        let new_path = format!("{}{}", parent_prefix, name);
        let now = Utc::now();

        let row = sqlx::query(&format!(
            "UPDATE categories SET name = $3, path = $4, updated_at = $5
             WHERE id = $1 AND user_id = $2
             RETURNING {}",
            CATEGORY_COLUMNS
        ))
        .bind(id)
        .bind(user_id)
        .bind(name)
        .bind(&new_path)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(Error::Database)?;

        // Descendant "old/rest" becomes "new/rest".
        sqlx::query(REWRITE_SUBTREE_PATHS)
            .bind(id)
            .bind(user_id)
            .bind(&new_path)
            .bind(current.path.chars().count() as i32 + 1)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;
        Ok(category_from_row(&row))
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let current = Self::fetch_tx(&mut tx, user_id, id).await?;

        // Detach documents
        sqlx::query("UPDATE documents SET category_id = NULL WHERE category_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        // Descendant "deleted/child/rest" becomes "child/rest".
        sqlx::query(REWRITE_SUBTREE_PATHS)
            .bind(id)
            .bind(user_id)
            .bind("")
            .bind(current.path.chars().count() as i32 + 2)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        // Move child categories to root
        sqlx::query("UPDATE categories SET parent_id = NULL WHERE parent_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }
}
