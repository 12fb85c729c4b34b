//! Share-link resolution.
//!
//! A share token is looked up anonymously and checked in a fixed order:
//! existence, then expiry, then password. Only when all checks pass is the
//! document's title and content revealed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{ShareSettings, SharedDocument};
use crate::password::verify_password;
use crate::traits::{DocumentRepository, ShareRepository};

/// Generate a fresh share token (random UUID v4).
pub fn generate_share_token() -> String {
    Uuid::new_v4().to_string()
}

/// Outcome of the share checks, before the document is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareCheck {
    Granted { document_id: Uuid },
    NotFound,
    Expired,
    NeedsPassword,
    WrongPassword,
}

impl ShareCheck {
    /// Short label for structured logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ShareCheck::Granted { .. } => "granted",
            ShareCheck::NotFound => "not_found",
            ShareCheck::Expired => "expired",
            ShareCheck::NeedsPassword => "needs_password",
            ShareCheck::WrongPassword => "wrong_password",
        }
    }
}

/// Apply the share checks in order.
///
/// `password` is the value presented by the visitor, if any; empty strings
/// count as absent.
pub fn evaluate_share(
    settings: Option<&ShareSettings>,
    now: DateTime<Utc>,
    password: Option<&str>,
) -> Result<ShareCheck> {
    let Some(settings) = settings else {
        return Ok(ShareCheck::NotFound);
    };
    if settings.is_expired_at(now) {
        return Ok(ShareCheck::Expired);
    }
    if settings.requires_password() {
        let (Some(hash), Some(presented)) = (
            settings.password_hash.as_deref(),
            password.filter(|p| !p.is_empty()),
        ) else {
            return Ok(ShareCheck::NeedsPassword);
        };
        if !verify_password(presented, hash)? {
            return Ok(ShareCheck::WrongPassword);
        }
    }
    Ok(ShareCheck::Granted {
        document_id: settings.document_id,
    })
}

/// What a visitor of a share link gets back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ShareResolution {
    Document(SharedDocument),
    NeedsPassword,
    NotFound,
    Expired,
    WrongPassword,
}

impl ShareResolution {
    /// User-facing message for every non-document outcome.
    pub fn message(&self) -> Option<&'static str> {
        match self {
            ShareResolution::Document(_) => None,
            ShareResolution::NeedsPassword => Some("This document requires an access password"),
            ShareResolution::NotFound => Some("Share link does not exist"),
            ShareResolution::Expired => Some("Share link has expired"),
            ShareResolution::WrongPassword => Some("Incorrect password"),
        }
    }

    pub fn document(&self) -> Option<&SharedDocument> {
        match self {
            ShareResolution::Document(doc) => Some(doc),
            _ => None,
        }
    }
}

/// Resolve a share token against the repositories.
pub async fn resolve_share(
    shares: &dyn ShareRepository,
    documents: &dyn DocumentRepository,
    token: &str,
    password: Option<&str>,
    now: DateTime<Utc>,
) -> Result<ShareResolution> {
    let settings = shares.find_by_token(token).await?;
    let check = evaluate_share(settings.as_ref(), now, password)?;
    tracing::debug!(
        share_outcome = check.as_str(),
        password_presented = password.is_some_and(|p| !p.is_empty()),
        "Share checks evaluated"
    );
    let resolution = match check {
        ShareCheck::Granted { document_id } => match documents.fetch_shared(document_id).await? {
            Some(doc) => ShareResolution::Document(doc),
            // Share outlived its document.
            None => ShareResolution::NotFound,
        },
        ShareCheck::NotFound => ShareResolution::NotFound,
        ShareCheck::Expired => ShareResolution::Expired,
        ShareCheck::NeedsPassword => ShareResolution::NeedsPassword,
        ShareCheck::WrongPassword => ShareResolution::WrongPassword,
    };
    Ok(resolution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::password::hash_password;
    use chrono::Duration;

    fn settings(
        password: Option<&str>,
        is_public: bool,
        expiry: Option<DateTime<Utc>>,
    ) -> ShareSettings {
        ShareSettings {
            id: Uuid::new_v4(),
            document_id: Uuid::new_v4(),
            share_id: generate_share_token(),
            is_public,
            password_hash: password.map(|p| hash_password(p).unwrap()),
            expiry_date: expiry,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_token_is_uuid_v4() {
        let token = generate_share_token();
        let parsed = Uuid::parse_str(&token).unwrap();
        assert_eq!(parsed.get_version_num(), 4);
        assert_ne!(token, generate_share_token());
    }

    #[test]
    fn test_unknown_token_is_not_found() {
        let now = Utc::now();
        assert_eq!(evaluate_share(None, now, None).unwrap(), ShareCheck::NotFound);
        assert_eq!(
            evaluate_share(None, now, Some("anything")).unwrap(),
            ShareCheck::NotFound
        );
    }

    #[test]
    fn test_open_share_is_granted() {
        let s = settings(None, false, None);
        assert_eq!(
            evaluate_share(Some(&s), Utc::now(), None).unwrap(),
            ShareCheck::Granted {
                document_id: s.document_id
            }
        );
    }

    #[test]
    fn test_expired_beats_correct_password() {
        let now = Utc::now();
        let s = settings(Some("secret"), false, Some(now - Duration::hours(1)));
        assert_eq!(
            evaluate_share(Some(&s), now, Some("secret")).unwrap(),
            ShareCheck::Expired
        );
    }

    #[test]
    fn test_future_expiry_is_not_expired() {
        let now = Utc::now();
        let s = settings(None, true, Some(now + Duration::days(1)));
        assert!(matches!(
            evaluate_share(Some(&s), now, None).unwrap(),
            ShareCheck::Granted { .. }
        ));
    }

    #[test]
    fn test_password_checks() {
        let now = Utc::now();
        let s = settings(Some("secret"), false, None);

        assert_eq!(evaluate_share(Some(&s), now, None).unwrap(), ShareCheck::NeedsPassword);
        assert_eq!(evaluate_share(Some(&s), now, Some("")).unwrap(), ShareCheck::NeedsPassword);
        assert_eq!(
            evaluate_share(Some(&s), now, Some("guess")).unwrap(),
            ShareCheck::WrongPassword
        );
        assert!(matches!(
            evaluate_share(Some(&s), now, Some("secret")).unwrap(),
            ShareCheck::Granted { .. }
        ));
    }

    #[test]
    fn test_public_share_ignores_password() {
        let s = settings(Some("secret"), true, None);
        assert!(matches!(
            evaluate_share(Some(&s), Utc::now(), None).unwrap(),
            ShareCheck::Granted { .. }
        ));
    }

    #[test]
    fn test_resolution_serialization_and_messages() {
        let doc = ShareResolution::Document(SharedDocument {
            title: "T".to_string(),
            content: "C".to_string(),
        });
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["status"], "document");
        assert_eq!(json["title"], "T");
        assert!(doc.message().is_none());

        let expired = serde_json::to_value(ShareResolution::Expired).unwrap();
        assert_eq!(expired, serde_json::json!({ "status": "expired" }));
        assert_eq!(
            ShareResolution::NotFound.message(),
            Some("Share link does not exist")
        );
    }
}
