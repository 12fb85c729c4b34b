//! The backend gateway.
//!
//! Everything the editor needs from the server goes through [`Backend`]:
//! authentication, owner-scoped row CRUD, profile and share records, and the
//! realtime change feed. [`crate::http::HttpBackend`] talks to `mdpro-api`;
//! [`crate::mock::MockBackend`] runs in-process for tests.

use async_trait::async_trait;
use futures::stream::BoxStream;
use tokio::sync::broadcast;
use uuid::Uuid;

use mdpro_core::{
    Category, ChangeEnvelope, CreateCategoryRequest, CreateDocumentRequest, CreateShareRequest,
    Credentials, Document, Result, Session, ShareLink, ShareResolution, Table,
    UpdateDocumentRequest, UpdateProfileRequest, UserIdentity, UserProfile,
};

/// Capacity of the auth-event channel.
pub const AUTH_EVENT_CAPACITY: usize = 16;

/// Auth-state changes observed by the gateway.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    SignedIn(Session),
    SignedOut,
    /// A recovery link was redeemed; the user should pick a new password.
    PasswordRecovery(Session),
    UserUpdated,
}

impl AuthEvent {
    /// Short label for logs; never includes the session token.
    pub fn label(&self) -> &'static str {
        match self {
            AuthEvent::SignedIn(_) => "signed_in",
            AuthEvent::SignedOut => "signed_out",
            AuthEvent::PasswordRecovery(_) => "password_recovery",
            AuthEvent::UserUpdated => "user_updated",
        }
    }
}

/// Live change notifications. Dropping the stream cancels the subscription.
pub type ChangeStream = BoxStream<'static, ChangeEnvelope>;

#[async_trait]
pub trait Backend: Send + Sync {
    // Auth

    /// Session held by this gateway, if any.
    async fn session(&self) -> Option<Session>;

    /// Identity behind the current session, validated against the server.
    async fn current_user(&self) -> Result<Option<UserIdentity>>;

    async fn sign_up(&self, credentials: Credentials) -> Result<Session>;

    async fn sign_in(&self, credentials: Credentials) -> Result<Session>;

    async fn sign_out(&self) -> Result<()>;

    async fn update_user_password(&self, password: &str) -> Result<()>;

    /// Ask the server to issue a recovery token for `email`.
    async fn request_recovery(&self, email: &str) -> Result<()>;

    /// Redeem a recovery token; emits [`AuthEvent::PasswordRecovery`].
    async fn verify_recovery(&self, token: &str) -> Result<Session>;

    fn auth_events(&self) -> broadcast::Receiver<AuthEvent>;

    // Documents

    /// Current user's documents, most recently updated first.
    async fn list_documents(&self) -> Result<Vec<Document>>;

    async fn fetch_document(&self, id: Uuid) -> Result<Document>;

    async fn insert_document(&self, req: CreateDocumentRequest) -> Result<Document>;

    async fn update_document(&self, id: Uuid, req: UpdateDocumentRequest) -> Result<Document>;

    async fn move_document(&self, id: Uuid, category_id: Option<Uuid>) -> Result<Document>;

    async fn delete_document(&self, id: Uuid) -> Result<()>;

    // Categories

    /// Current user's categories ordered by path.
    async fn list_categories(&self) -> Result<Vec<Category>>;

    async fn insert_category(&self, req: CreateCategoryRequest) -> Result<Category>;

    async fn rename_category(&self, id: Uuid, name: &str) -> Result<Category>;

    async fn delete_category(&self, id: Uuid) -> Result<()>;

    // Profile

    async fn get_profile(&self) -> Result<UserProfile>;

    async fn update_profile(&self, req: UpdateProfileRequest) -> Result<UserProfile>;

    // Sharing

    async fn insert_share(&self, document_id: Uuid, req: CreateShareRequest) -> Result<ShareLink>;

    /// Anonymous lookup; needs no session.
    async fn resolve_share(&self, token: &str, password: Option<&str>)
        -> Result<ShareResolution>;

    // Realtime

    async fn subscribe_to_changes(&self, tables: &[Table]) -> Result<ChangeStream>;
}
