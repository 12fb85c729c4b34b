//! HttpBackend against a live mdpro-api server on an ephemeral port.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use uuid::Uuid;

use mdpro_api::{auth::hash_secret, router, AppState, ServerConfig};
use mdpro_client::{
    Backend, ClientConfig, DocumentSession, HttpBackend, Navigator, NotificationQueue,
    ShareClient, ShareOptions, UserContext,
};
use mdpro_core::{CreateDocumentRequest, Credentials, Error, ShareResolution, Table};
use mdpro_db::MemoryStore;

async fn spawn_server() -> (String, AppState) {
    let config = ServerConfig {
        event_bus_capacity: 32,
        ..Default::default()
    };
    let state = AppState::new(MemoryStore::new().repositories(), config);
    let app = router(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), state)
}

async fn signed_up(base_url: &str, email: &str) -> HttpBackend {
    let config = ClientConfig::default().with_api_url(base_url);
    let backend = HttpBackend::new(&config).unwrap();
    backend
        .sign_up(Credentials::new(email, "hunter22"))
        .await
        .unwrap();
    backend
}

#[tokio::test]
async fn test_session_lifecycle() {
    let (base_url, _state) = spawn_server().await;
    let backend = signed_up(&base_url, "http@example.com").await;

    let user = backend.current_user().await.unwrap().unwrap();
    assert_eq!(user.email, "http@example.com");
    assert_eq!(backend.session().await.unwrap().user, user);

    backend.sign_out().await.unwrap();
    assert!(backend.session().await.is_none());
    assert!(backend.current_user().await.unwrap().is_none());
    assert!(backend.list_documents().await.unwrap_err().is_auth());
}

#[tokio::test]
async fn test_wrong_password_is_unauthorized() {
    let (base_url, _state) = spawn_server().await;
    let backend = signed_up(&base_url, "pw@example.com").await;
    backend.sign_out().await.unwrap();

    let err = backend
        .sign_in(Credentials::new("pw@example.com", "not-it"))
        .await
        .unwrap_err();
    assert!(err.is_auth());
}

#[tokio::test]
async fn test_error_mapping() {
    let (base_url, _state) = spawn_server().await;
    let backend = signed_up(&base_url, "errors@example.com").await;

    let err = backend.fetch_document(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    let err = backend
        .sign_up(Credentials::new("errors@example.com", "hunter22"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
}

#[tokio::test]
async fn test_editor_over_http() {
    let (base_url, _state) = spawn_server().await;
    let backend: Arc<dyn Backend> = Arc::new(signed_up(&base_url, "edit@example.com").await);
    let queue = NotificationQueue::new();

    let mut nav = Navigator::new(backend.clone(), Arc::new(queue.clone()));
    let doc = nav.create_document().await.unwrap();
    assert!(nav.refresh().await);
    assert_eq!(nav.tree().len(), 1);

    let mut session = DocumentSession::new(backend.clone(), Arc::new(queue.clone()));
    session.open(doc.id).await.unwrap();
    assert!(session.edit_content("# Over the wire").await);
    session.begin_title_edit();
    session.set_title_draft("Wire");
    assert!(session.confirm_title().await);

    let stored = backend.fetch_document(doc.id).await.unwrap();
    assert_eq!(stored.title, "Wire");
    assert_eq!(stored.content, "# Over the wire");
    assert!(queue.errors().is_empty());
}

#[tokio::test]
async fn test_share_over_http() {
    let (base_url, _state) = spawn_server().await;
    let backend: Arc<dyn Backend> = Arc::new(signed_up(&base_url, "share@example.com").await);
    let doc = backend
        .insert_document(CreateDocumentRequest {
            title: "Notes".to_string(),
            content: "hidden".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

    let client = ShareClient::new(backend.clone(), "https://md.example.com");
    let link = client
        .create_share(
            doc.id,
            ShareOptions {
                password: Some("letmein".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(link.has_password);
    assert!(link.url.starts_with("https://md.example.com/share/"));

    // Visitors need no session.
    let visitor: Arc<dyn Backend> = Arc::new(
        HttpBackend::new(&ClientConfig::default().with_api_url(&base_url)).unwrap(),
    );
    let visitor = ShareClient::new(visitor, "https://md.example.com");
    let token = link.settings.share_id.as_str();

    assert_eq!(visitor.open(token).await.unwrap(), ShareResolution::NeedsPassword);
    assert_eq!(
        visitor.unlock(token, "nope").await.unwrap(),
        ShareResolution::WrongPassword
    );
    let granted = visitor.unlock(token, "letmein").await.unwrap();
    assert_eq!(granted.document().unwrap().content, "hidden");
    assert_eq!(
        visitor.open("missing").await.unwrap(),
        ShareResolution::NotFound
    );
}

#[tokio::test]
async fn test_change_stream_over_websocket() {
    let (base_url, state) = spawn_server().await;
    let backend = signed_up(&base_url, "ws@example.com").await;

    let mut changes = backend
        .subscribe_to_changes(&[Table::Documents])
        .await
        .unwrap();
    for _ in 0..100 {
        if state.event_bus.subscriber_count() >= 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let doc = backend
        .insert_document(CreateDocumentRequest::default())
        .await
        .unwrap();
    let envelope = tokio::time::timeout(Duration::from_secs(2), changes.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(envelope.event_type, "documents.insert");
    assert_eq!(envelope.payload.record_id, doc.id);
}

#[tokio::test]
async fn test_password_reset_over_http() {
    let (base_url, state) = spawn_server().await;
    let owner = signed_up(&base_url, "reset@example.com").await;
    let user_id = owner.session().await.unwrap().user.id;

    let token = "mdp_rt_over_http";
    state
        .repos
        .accounts
        .create_recovery_token(
            user_id,
            &hash_secret(token),
            chrono::Utc::now() + chrono::Duration::minutes(5),
        )
        .await
        .unwrap();

    let backend: Arc<dyn Backend> = Arc::new(
        HttpBackend::new(&ClientConfig::default().with_api_url(&base_url)).unwrap(),
    );
    assert!(backend.verify_recovery(token).await.unwrap().recovery);
    assert!(matches!(
        backend.list_documents().await.unwrap_err(),
        Error::Forbidden(_)
    ));

    backend.update_user_password("brand-new-pass").await.unwrap();
    assert!(!backend.session().await.unwrap().recovery);
    assert!(backend.list_documents().await.unwrap().is_empty());

    let ctx = UserContext::init(backend, Arc::new(NotificationQueue::new())).await;
    assert!(!ctx.recovery_pending().await);
}
