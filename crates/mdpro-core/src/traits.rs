//! Repository traits for mdpro storage backends.
//!
//! Every row-level operation takes the owning user id and behaves as if the
//! rows of other users do not exist. The PostgreSQL backend and the in-memory
//! store both implement these traits, and the API server only sees them
//! through [`Repositories`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// DOCUMENT REPOSITORY
// =============================================================================

/// Repository for document rows.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Insert a new document owned by `user_id`.
    ///
    /// A `category_id` that does not name one of the user's categories is an
    /// error (`CategoryNotFound`).
    async fn insert(&self, user_id: Uuid, req: CreateDocumentRequest) -> Result<Document>;

    /// Fetch one document.
    async fn fetch(&self, user_id: Uuid, id: Uuid) -> Result<Document>;

    /// All documents of a user, most recently updated first.
    async fn list(&self, user_id: Uuid) -> Result<Vec<Document>>;

    /// Apply a partial update and bump `updated_at`.
    async fn update(&self, user_id: Uuid, id: Uuid, req: UpdateDocumentRequest)
        -> Result<Document>;

    /// Move a document into a category, or to the root.
    async fn set_category(
        &self,
        user_id: Uuid,
        id: Uuid,
        category_id: Option<Uuid>,
    ) -> Result<Document>;

    /// Delete a document along with its share settings.
    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<()>;

    /// Title and content of any document, bypassing ownership.
    ///
    /// Only the share resolver calls this, after the share checks pass.
    async fn fetch_shared(&self, id: Uuid) -> Result<Option<SharedDocument>>;
}

// =============================================================================
// CATEGORY REPOSITORY
// =============================================================================

/// Repository for category rows.
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// Create a category. The parent, if any, must belong to the same user.
    async fn insert(&self, user_id: Uuid, req: CreateCategoryRequest) -> Result<Category>;

    /// Fetch one category.
    async fn fetch(&self, user_id: Uuid, id: Uuid) -> Result<Category>;

    /// All categories of a user ordered by path.
    async fn list(&self, user_id: Uuid) -> Result<Vec<Category>>;

    /// Rename a category and rewrite the paths of its subtree.
    async fn rename(&self, user_id: Uuid, id: Uuid, name: &str) -> Result<Category>;

    /// Delete a category (detaches its documents, re-roots its children).
    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<()>;
}

// =============================================================================
// SHARE REPOSITORY
// =============================================================================

/// Repository for share settings.
#[async_trait]
pub trait ShareRepository: Send + Sync {
    /// Store share settings for a document owned by `user_id`.
    ///
    /// A duplicate token is a `Conflict`.
    async fn insert(&self, user_id: Uuid, share: NewShareSettings) -> Result<ShareSettings>;

    /// Anonymous lookup by token.
    async fn find_by_token(&self, share_id: &str) -> Result<Option<ShareSettings>>;

    /// Share settings of one of the user's documents, newest first.
    async fn list_for_document(&self, user_id: Uuid, document_id: Uuid)
        -> Result<Vec<ShareSettings>>;
}

// =============================================================================
// PROFILE REPOSITORY
// =============================================================================

/// Repository for user profiles.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn get(&self, user_id: Uuid) -> Result<UserProfile>;

    async fn update(&self, user_id: Uuid, req: UpdateProfileRequest) -> Result<UserProfile>;
}

// =============================================================================
// ACCOUNT REPOSITORY
// =============================================================================

/// Accounts, sessions, and recovery tokens.
///
/// Tokens are only ever handled as digests here; generating and hashing
/// them is the caller's job.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Create an account and its profile. A taken e-mail is a `Conflict`.
    async fn create_account(&self, email: &str, password_hash: &str) -> Result<UserIdentity>;

    /// Look up login credentials by (normalized) e-mail.
    async fn find_credentials(&self, email: &str) -> Result<Option<StoredCredentials>>;

    async fn set_password_hash(&self, user_id: Uuid, password_hash: &str) -> Result<()>;

    async fn create_session(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
        recovery: bool,
    ) -> Result<()>;

    /// Find an unexpired session by token digest.
    async fn find_session(&self, token_hash: &str) -> Result<Option<SessionRecord>>;

    async fn delete_session(&self, token_hash: &str) -> Result<()>;

    /// Turn a recovery session into a regular one once the password is reset.
    async fn end_recovery(&self, token_hash: &str) -> Result<()>;

    async fn create_recovery_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Consume a recovery token. Returns the account if it was valid and unexpired.
    async fn redeem_recovery_token(&self, token_hash: &str) -> Result<Option<UserIdentity>>;
}

// =============================================================================
// BUNDLE
// =============================================================================

/// All repositories behind trait objects, as handed to the API layer.
#[derive(Clone)]
pub struct Repositories {
    pub documents: Arc<dyn DocumentRepository>,
    pub categories: Arc<dyn CategoryRepository>,
    pub shares: Arc<dyn ShareRepository>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub accounts: Arc<dyn AccountRepository>,
}
