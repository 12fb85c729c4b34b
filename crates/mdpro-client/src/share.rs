//! Share links from the owner's and the visitor's side.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::info;
use uuid::Uuid;

use mdpro_core::{
    defaults, generate_share_token, CreateShareRequest, Error, Result, ShareLink,
    ShareResolution,
};

use crate::backend::Backend;

/// Owner-chosen settings for a new share link.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShareOptions {
    pub is_public: bool,
    /// Empty strings mean no password.
    pub password: Option<String>,
    pub expiry_date: Option<DateTime<Utc>>,
}

pub struct ShareClient {
    backend: Arc<dyn Backend>,
    public_url: String,
}

impl ShareClient {
    pub fn new(backend: Arc<dyn Backend>, public_url: impl Into<String>) -> Self {
        Self {
            backend,
            public_url: public_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// URL a visitor opens for `token`.
    pub fn share_url(&self, token: &str) -> String {
        format!(
            "{}/{}/{}",
            self.public_url,
            defaults::SHARE_PATH_SEGMENT,
            token
        )
    }

    /// Store share settings under a fresh random token.
    pub async fn create_share(
        &self,
        document_id: Uuid,
        options: ShareOptions,
    ) -> Result<ShareLink> {
        let req = CreateShareRequest {
            share_id: generate_share_token(),
            is_public: options.is_public,
            password: options.password.filter(|p| !p.is_empty()),
            expiry_date: options.expiry_date,
        };
        let mut link = self.backend.insert_share(document_id, req).await?;
        link.url = self.share_url(&link.settings.share_id);
        info!(
            subsystem = "client",
            op = "create_share",
            document_id = %document_id,
            has_password = link.has_password,
            "Share link created"
        );
        Ok(link)
    }

    /// First visit of a link; protected shares answer `NeedsPassword`.
    pub async fn open(&self, token: &str) -> Result<ShareResolution> {
        self.backend.resolve_share(token, None).await
    }

    /// Retry a protected share with a password.
    pub async fn unlock(&self, token: &str, password: &str) -> Result<ShareResolution> {
        self.backend.resolve_share(token, Some(password)).await
    }
}

/// Extract the token from a share URL, or accept a bare token.
pub fn parse_share_token(input: &str) -> Option<String> {
    let input = input.trim();
    let marker = format!("/{}/", defaults::SHARE_PATH_SEGMENT);
    let token = match input.rfind(&marker) {
        Some(pos) => &input[pos + marker.len()..],
        None if input.contains('/') => return None,
        None => input,
    };
    let token = token
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim_end_matches('/');
    (!token.is_empty() && !token.contains('/')).then(|| token.to_string())
}

/// Parse an expiry given as RFC 3339 or as a relative `<n>h` / `<n>d`.
pub fn parse_expiry(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(input) {
        return Ok(at.with_timezone(&Utc));
    }

    let invalid = || {
        Error::InvalidInput(format!(
            "invalid expiry '{}': use RFC 3339 or a duration like 12h or 7d",
            input
        ))
    };
    let unit = input.chars().last().ok_or_else(invalid)?;
    let amount: i64 = input[..input.len() - unit.len_utf8()]
        .parse()
        .map_err(|_| invalid())?;
    if amount <= 0 {
        return Err(invalid());
    }
    let offset = match unit {
        'h' => Duration::try_hours(amount),
        'd' => Duration::try_days(amount),
        _ => None,
    }
    .ok_or_else(invalid)?;
    now.checked_add_signed(offset).ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockBackend;
    use chrono::TimeZone;
    use mdpro_core::CreateDocumentRequest;

    #[test]
    fn test_parse_share_token() {
        let token = "0b6f6c5e-3f1a-4b8e-9a55-2c1b3a4d5e6f";
        assert_eq!(parse_share_token(token).as_deref(), Some(token));
        assert_eq!(
            parse_share_token(&format!("https://md.example.com/share/{}", token)).as_deref(),
            Some(token)
        );
        assert_eq!(
            parse_share_token(&format!("http://localhost:5173/share/{}/?ref=x", token)).as_deref(),
            Some(token)
        );
        assert_eq!(parse_share_token("https://md.example.com/docs/abc"), None);
        assert_eq!(parse_share_token("https://md.example.com/share/"), None);
        assert_eq!(parse_share_token("  "), None);
    }

    #[test]
    fn test_parse_expiry() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_expiry("12h", now).unwrap(), now + Duration::hours(12));
        assert_eq!(parse_expiry("7d", now).unwrap(), now + Duration::days(7));
        assert_eq!(
            parse_expiry("2026-02-01T00:00:00Z", now).unwrap(),
            Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap()
        );
        assert!(parse_expiry("0d", now).is_err());
        assert!(parse_expiry("soon", now).is_err());
        assert!(parse_expiry("", now).is_err());
    }

    async fn share_setup() -> (ShareClient, Uuid) {
        let backend = MockBackend::new();
        backend.signed_in("owner@example.com").await.unwrap();
        let doc = backend
            .insert_document(CreateDocumentRequest {
                title: "Shared".to_string(),
                content: "secret".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        (ShareClient::new(Arc::new(backend), "https://md.example.com/"), doc.id)
    }

    #[tokio::test]
    async fn test_create_share_composes_url() {
        let (client, doc_id) = share_setup().await;
        let link = client
            .create_share(doc_id, ShareOptions::default())
            .await
            .unwrap();

        assert!(Uuid::parse_str(&link.settings.share_id).is_ok());
        assert_eq!(
            link.url,
            format!("https://md.example.com/share/{}", link.settings.share_id)
        );
    }

    #[tokio::test]
    async fn test_empty_password_means_unprotected() {
        let (client, doc_id) = share_setup().await;
        let link = client
            .create_share(
                doc_id,
                ShareOptions {
                    password: Some(String::new()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(!link.has_password);

        let resolution = client.open(&link.settings.share_id).await.unwrap();
        assert_eq!(resolution.document().unwrap().content, "secret");
    }

    #[tokio::test]
    async fn test_password_flow() {
        let (client, doc_id) = share_setup().await;
        let link = client
            .create_share(
                doc_id,
                ShareOptions {
                    password: Some("open sesame".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let token = link.settings.share_id.as_str();

        assert_eq!(client.open(token).await.unwrap(), ShareResolution::NeedsPassword);
        assert_eq!(
            client.unlock(token, "wrong").await.unwrap(),
            ShareResolution::WrongPassword
        );
        let granted = client.unlock(token, "open sesame").await.unwrap();
        assert_eq!(granted.document().unwrap().title, "Shared");
    }

    #[tokio::test]
    async fn test_expired_share_stays_expired() {
        let (client, doc_id) = share_setup().await;
        let link = client
            .create_share(
                doc_id,
                ShareOptions {
                    password: Some("pw".to_string()),
                    expiry_date: Some(Utc::now() - Duration::hours(1)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let resolution = client.unlock(&link.settings.share_id, "pw").await.unwrap();
        assert_eq!(resolution, ShareResolution::Expired);
        assert_eq!(resolution.message(), Some("Share link has expired"));
    }

    #[tokio::test]
    async fn test_unknown_token() {
        let (client, _) = share_setup().await;
        assert_eq!(
            client.open("no-such-token").await.unwrap(),
            ShareResolution::NotFound
        );
    }
}
