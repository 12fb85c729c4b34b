//! Document repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{postgres::PgRow, Pool, Postgres, Row};
use uuid::Uuid;

use mdpro_core::{
    new_v7, CreateDocumentRequest, Document, DocumentRepository, Error, Result, SharedDocument,
    UpdateDocumentRequest,
};

const DOCUMENT_COLUMNS: &str =
    "id, title, content, user_id, category_id, is_public, created_at, updated_at";

fn document_from_row(r: &PgRow) -> Document {
    Document {
        id: r.get("id"),
        title: r.get("title"),
        content: r.get("content"),
        user_id: r.get("user_id"),
        category_id: r.get("category_id"),
        is_public: r.get("is_public"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    }
}

/// PostgreSQL implementation of DocumentRepository.
#[derive(Clone)]
pub struct PgDocumentRepository {
    pool: Pool<Postgres>,
}

impl PgDocumentRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn ensure_category(&self, user_id: Uuid, category_id: Uuid) -> Result<()> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM categories WHERE id = $1 AND user_id = $2)",
        )
        .bind(category_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        if exists {
            Ok(())
        } else {
            Err(Error::CategoryNotFound(category_id))
        }
    }
}

#[async_trait]
impl DocumentRepository for PgDocumentRepository {
    async fn insert(&self, user_id: Uuid, req: CreateDocumentRequest) -> Result<Document> {
        if let Some(category_id) = req.category_id {
            self.ensure_category(user_id, category_id).await?;
        }

        let now = Utc::now();
        let row = sqlx::query(&format!(
            "INSERT INTO documents (id, title, content, user_id, category_id, is_public, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
             RETURNING {}",
            DOCUMENT_COLUMNS
        ))
        .bind(new_v7())
        .bind(&req.title)
        .bind(&req.content)
        .bind(user_id)
        .bind(req.category_id)
        .bind(req.is_public)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(document_from_row(&row))
    }

    async fn fetch(&self, user_id: Uuid, id: Uuid) -> Result<Document> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM documents WHERE id = $1 AND user_id = $2",
            DOCUMENT_COLUMNS
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.as_ref()
            .map(document_from_row)
            .ok_or(Error::DocumentNotFound(id))
    }

    async fn list(&self, user_id: Uuid) -> Result<Vec<Document>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM documents WHERE user_id = $1 ORDER BY updated_at DESC, id DESC",
            DOCUMENT_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(document_from_row).collect())
    }

    async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        req: UpdateDocumentRequest,
    ) -> Result<Document> {
        let row = sqlx::query(&format!(
            "UPDATE documents
             SET title = COALESCE($3, title),
                 content = COALESCE($4, content),
                 is_public = COALESCE($5, is_public),
                 updated_at = $6
             WHERE id = $1 AND user_id = $2
             RETURNING {}",
            DOCUMENT_COLUMNS
        ))
        .bind(id)
        .bind(user_id)
        .bind(req.title)
        .bind(req.content)
        .bind(req.is_public)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.as_ref()
            .map(document_from_row)
            .ok_or(Error::DocumentNotFound(id))
    }

    async fn set_category(
        &self,
        user_id: Uuid,
        id: Uuid,
        category_id: Option<Uuid>,
    ) -> Result<Document> {
        if let Some(category_id) = category_id {
            self.ensure_category(user_id, category_id).await?;
        }

        let row = sqlx::query(&format!(
            "UPDATE documents SET category_id = $3, updated_at = $4
             WHERE id = $1 AND user_id = $2
             RETURNING {}",
            DOCUMENT_COLUMNS
        ))
        .bind(id)
        .bind(user_id)
        .bind(category_id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.as_ref()
            .map(document_from_row)
            .ok_or(Error::DocumentNotFound(id))
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<()> {
        // share_settings rows go with it (ON DELETE CASCADE)
        let result = sqlx::query("DELETE FROM documents WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::DocumentNotFound(id));
        }
        Ok(())
    }

    async fn fetch_shared(&self, id: Uuid) -> Result<Option<SharedDocument>> {
        let row = sqlx::query("SELECT title, content FROM documents WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(row.map(|r| SharedDocument {
            title: r.get("title"),
            content: r.get("content"),
        }))
    }
}
