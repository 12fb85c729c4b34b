//! Share resolution against the in-memory store.
//!
//! Covers the ordered checks: unknown token, expiry, password, and the
//! document lookup once every check passes.

use chrono::{Duration, Utc};
use mdpro_db::{
    generate_share_token, password::hash_password, resolve_share, CreateDocumentRequest,
    DocumentRepository, MemoryStore, NewShareSettings, ShareRepository, ShareResolution,
    SharedDocument,
};
use uuid::Uuid;

struct Fixture {
    store: MemoryStore,
    user_id: Uuid,
    document_id: Uuid,
}

async fn fixture() -> Fixture {
    let store = MemoryStore::new();
    let user_id = mdpro_db::AccountRepository::create_account(&store, "owner@example.com", "h")
        .await
        .unwrap()
        .id;
    let doc = DocumentRepository::insert(
        &store,
        user_id,
        CreateDocumentRequest {
            title: "Shared notes".to_string(),
            content: "# Hello".to_string(),
            category_id: None,
            is_public: false,
        },
    )
    .await
    .unwrap();
    Fixture {
        store,
        user_id,
        document_id: doc.id,
    }
}

impl Fixture {
    async fn share(
        &self,
        is_public: bool,
        password: Option<&str>,
        expiry_date: Option<chrono::DateTime<Utc>>,
    ) -> String {
        let token = generate_share_token();
        ShareRepository::insert(
            &self.store,
            self.user_id,
            NewShareSettings {
                document_id: self.document_id,
                share_id: token.clone(),
                is_public,
                password_hash: password.map(|p| hash_password(p).unwrap()),
                expiry_date,
            },
        )
        .await
        .unwrap();
        token
    }

    async fn resolve(&self, token: &str, password: Option<&str>) -> ShareResolution {
        resolve_share(&self.store, &self.store, token, password, Utc::now())
            .await
            .unwrap()
    }
}

fn shared_doc() -> ShareResolution {
    ShareResolution::Document(SharedDocument {
        title: "Shared notes".to_string(),
        content: "# Hello".to_string(),
    })
}

#[tokio::test]
async fn test_unknown_token_not_found() {
    let f = fixture().await;
    f.share(true, None, None).await;

    assert_eq!(f.resolve("no-such-token", None).await, ShareResolution::NotFound);
    assert_eq!(
        f.resolve("no-such-token", Some("secret")).await,
        ShareResolution::NotFound
    );
}

#[tokio::test]
async fn test_public_share_reveals_document() {
    let f = fixture().await;
    let token = f.share(true, None, None).await;

    assert_eq!(f.resolve(&token, None).await, shared_doc());
}

#[tokio::test]
async fn test_expired_share_stays_expired_with_password() {
    let f = fixture().await;
    let token = f
        .share(false, Some("secret"), Some(Utc::now() - Duration::minutes(1)))
        .await;

    assert_eq!(f.resolve(&token, None).await, ShareResolution::Expired);
    assert_eq!(f.resolve(&token, Some("secret")).await, ShareResolution::Expired);
}

#[tokio::test]
async fn test_password_protected_share() {
    let f = fixture().await;
    let token = f.share(false, Some("secret"), None).await;

    assert_eq!(f.resolve(&token, None).await, ShareResolution::NeedsPassword);
    assert_eq!(
        f.resolve(&token, Some("wrong")).await,
        ShareResolution::WrongPassword
    );
    assert_eq!(f.resolve(&token, Some("secret")).await, shared_doc());
}

#[tokio::test]
async fn test_share_of_deleted_document_not_found() {
    let f = fixture().await;
    let token = f.share(true, None, None).await;
    // Deleting cascades to the share, so the token itself is gone.
    DocumentRepository::delete(&f.store, f.user_id, f.document_id)
        .await
        .unwrap();

    assert_eq!(f.resolve(&token, None).await, ShareResolution::NotFound);
}
