//! Domain models for mdpro.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::defaults;
use crate::error::{Error, Result};

// =============================================================================
// DOCUMENT TYPES
// =============================================================================

/// A Markdown document owned by one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub user_id: Uuid,
    pub category_id: Option<Uuid>,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Title to show in lists; blank titles fall back to a placeholder.
    pub fn display_title(&self) -> &str {
        let title = self.title.trim();
        if title.is_empty() {
            defaults::BLANK_TITLE_PLACEHOLDER
        } else {
            title
        }
    }
}

/// Request for creating a new document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateDocumentRequest {
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub is_public: bool,
}

impl Default for CreateDocumentRequest {
    /// The "New Document" starter: untitled, starter content, private.
    fn default() -> Self {
        Self {
            title: defaults::NEW_DOCUMENT_TITLE.to_string(),
            content: defaults::NEW_DOCUMENT_CONTENT.to_string(),
            category_id: None,
            is_public: false,
        }
    }
}

impl CreateDocumentRequest {
    pub fn validate(&self) -> Result<()> {
        validate_title(&self.title)
    }
}

/// Partial update of a document. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateDocumentRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
}

impl UpdateDocumentRequest {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none() && self.is_public.is_none()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        Ok(())
    }
}

/// Move a document into a category, or to the root with `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MoveDocumentRequest {
    pub category_id: Option<Uuid>,
}

fn validate_title(title: &str) -> Result<()> {
    if title.chars().count() > defaults::TITLE_MAX_CHARS {
        return Err(Error::InvalidInput(format!(
            "title exceeds {} characters",
            defaults::TITLE_MAX_CHARS
        )));
    }
    Ok(())
}

// =============================================================================
// CATEGORY TYPES
// =============================================================================

/// A folder in a user's document hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub parent_id: Option<Uuid>,
    pub user_id: Uuid,
    /// Chain of names from the root, e.g. `work/projects`.
    pub path: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Materialized path of a category named `name` under `parent_path`.
pub fn category_path(parent_path: Option<&str>, name: &str) -> String {
    match parent_path {
        Some(parent) if !parent.is_empty() => {
            format!("{}{}{}", parent, defaults::CATEGORY_PATH_SEPARATOR, name)
        }
        _ => name.to_string(),
    }
}

/// Request for creating a category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
}

impl CreateCategoryRequest {
    pub fn validate(&self) -> Result<()> {
        validate_category_name(&self.name)
    }
}

/// Request for renaming a category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenameCategoryRequest {
    pub name: String,
}

/// Category names are non-empty and cannot contain the path separator.
pub fn validate_category_name(name: &str) -> Result<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput("category name is required".to_string()));
    }
    if trimmed.contains(defaults::CATEGORY_PATH_SEPARATOR) {
        return Err(Error::InvalidInput(format!(
            "category name cannot contain '{}'",
            defaults::CATEGORY_PATH_SEPARATOR
        )));
    }
    if trimmed.chars().count() > defaults::CATEGORY_NAME_MAX_CHARS {
        return Err(Error::InvalidInput(format!(
            "category name exceeds {} characters",
            defaults::CATEGORY_NAME_MAX_CHARS
        )));
    }
    Ok(())
}

// =============================================================================
// SHARE TYPES
// =============================================================================

/// Share settings for one share link of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareSettings {
    pub id: Uuid,
    pub document_id: Uuid,
    /// Public token embedded in the share URL.
    pub share_id: String,
    pub is_public: bool,
    /// Argon2id PHC string. Never serialized.
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ShareSettings {
    /// Whether a password must be presented before content is revealed.
    pub fn requires_password(&self) -> bool {
        self.password_hash.is_some() && !self.is_public
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expiry_date, Some(expiry) if expiry < now)
    }

    /// Serializable flag for API responses, since the hash itself is hidden.
    pub fn has_password(&self) -> bool {
        self.password_hash.is_some()
    }
}

/// Request for creating share settings. The token is generated by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateShareRequest {
    pub share_id: String,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub expiry_date: Option<DateTime<Utc>>,
}

impl CreateShareRequest {
    /// The password, with empty strings treated as no password.
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref().filter(|p| !p.is_empty())
    }

    pub fn validate(&self) -> Result<()> {
        if self.share_id.trim().is_empty() {
            return Err(Error::InvalidInput("share_id is required".to_string()));
        }
        Ok(())
    }
}

/// Share settings ready for storage, with the password already hashed.
#[derive(Debug, Clone, PartialEq)]
pub struct NewShareSettings {
    pub document_id: Uuid,
    pub share_id: String,
    pub is_public: bool,
    pub password_hash: Option<String>,
    pub expiry_date: Option<DateTime<Utc>>,
}

/// Share settings as returned to the document owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareLink {
    #[serde(flatten)]
    pub settings: ShareSettings,
    pub has_password: bool,
    /// Absolute URL visitors open.
    pub url: String,
}

impl ShareLink {
    pub fn new(settings: ShareSettings, url: String) -> Self {
        Self {
            has_password: settings.has_password(),
            settings,
            url,
        }
    }
}

/// Password submitted to unlock a protected share.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnlockShareRequest {
    pub password: String,
}

/// The part of a document revealed through a share link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedDocument {
    pub title: String,
    pub content: String,
}

// =============================================================================
// USER TYPES
// =============================================================================

/// Public profile of a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserProfile {
    /// Full name if set, otherwise the e-mail address.
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(self.email.as_str())
    }
}

/// Request for updating a profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
}

/// The authenticated user as seen by the auth layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: Uuid,
    pub email: String,
}

/// An authenticated session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub user: UserIdentity,
    pub expires_at: DateTime<Utc>,
    /// Session obtained through password recovery. Only good for setting a new
    /// password; it becomes a regular session once that succeeds.
    #[serde(default)]
    pub recovery: bool,
}

/// A stored session looked up by token digest.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub user: UserIdentity,
    pub expires_at: DateTime<Utc>,
    pub recovery: bool,
}

/// Stored login credentials for an e-mail address.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredCredentials {
    pub user: UserIdentity,
    pub password_hash: String,
}

/// E-mail and password for sign-up and sign-in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Lower-cased, trimmed e-mail address used as the account key.
    pub fn normalized_email(&self) -> String {
        self.email.trim().to_lowercase()
    }

    pub fn validate(&self) -> Result<()> {
        let email = self.normalized_email();
        if email.is_empty() || !email.contains('@') {
            return Err(Error::InvalidInput("a valid email is required".to_string()));
        }
        validate_password(&self.password)
    }
}

/// Request for changing the signed-in user's password.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangePasswordRequest {
    pub password: String,
}

/// Request for a password recovery token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryRequest {
    pub email: String,
}

/// Exchange a recovery token for a recovery session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryVerifyRequest {
    pub token: String,
}

/// Minimum length check shared by sign-up and password change.
pub fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < defaults::PASSWORD_MIN_CHARS {
        return Err(Error::InvalidInput(format!(
            "password must be at least {} characters",
            defaults::PASSWORD_MIN_CHARS
        )));
    }
    Ok(())
}
