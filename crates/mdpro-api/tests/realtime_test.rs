//! Realtime feed tests against a live server on an ephemeral port.

use std::time::Duration;

use futures::StreamExt;
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

use mdpro_api::{router, AppState, ServerConfig};
use mdpro_core::{ChangeEnvelope, ChangeEvent, ChangeKind, CreateDocumentRequest, Credentials};
use mdpro_db::MemoryStore;

async fn spawn_test_server() -> (String, AppState) {
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

/// Sign up over plain HTTP and return (user id, access token).
async fn sign_up(base_url: &str, email: &str) -> (Uuid, String) {
    let response = reqwest::Client::new()
        .post(format!("{}/api/v1/auth/signup", base_url))
        .json(&Credentials::new(email, "hunter22"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let session: mdpro_core::Session = response.json().await.unwrap();
    (session.user.id, session.access_token)
}

async fn wait_for_subscribers(state: &AppState, n: usize) {
    for _ in 0..100 {
        if state.event_bus.subscriber_count() >= n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("subscriber never registered");
}

async fn next_envelope<S>(ws: &mut S) -> ChangeEnvelope
where
    S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for event")
            .unwrap()
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

#[tokio::test]
async fn test_ws_requires_session() {
    let (base_url, _state) = spawn_test_server().await;
    let ws_url = base_url.replace("http://", "ws://") + "/api/v1/realtime";

    let err = tokio_tungstenite::connect_async(&ws_url).await.unwrap_err();
    match err {
        tokio_tungstenite::tungstenite::Error::Http(response) => {
            assert_eq!(response.status(), 401);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_ws_delivers_only_own_events_for_watched_tables() {
    let (base_url, state) = spawn_test_server().await;
    let (user_id, token) = sign_up(&base_url, "ws@example.com").await;
    let other_user = Uuid::new_v4();

    let ws_url = format!(
        "{}/api/v1/realtime?tables=documents&access_token={}",
        base_url.replace("http://", "ws://"),
        token
    );
    let (mut ws, response) = tokio_tungstenite::connect_async(&ws_url).await.unwrap();
    assert_eq!(response.status(), 101);
    wait_for_subscribers(&state, 1).await;

    // Filtered out: someone else's document, and a table not watched
    state.event_bus.emit(ChangeEvent::document(
        ChangeKind::Update,
        Uuid::new_v4(),
        other_user,
    ));
    state.event_bus.emit(ChangeEvent::category(
        ChangeKind::Insert,
        Uuid::new_v4(),
        user_id,
    ));
    let record_id = Uuid::new_v4();
    state
        .event_bus
        .emit(ChangeEvent::document(ChangeKind::Delete, record_id, user_id));

    let envelope = next_envelope(&mut ws).await;
    assert_eq!(envelope.event_type, "documents.delete");
    assert_eq!(envelope.payload.record_id, record_id);
    assert_eq!(envelope.payload.user_id, user_id);
}

#[tokio::test]
async fn test_ws_sees_documents_created_over_http() {
    let (base_url, state) = spawn_test_server().await;
    let (_user_id, token) = sign_up(&base_url, "live@example.com").await;

    let ws_url = format!(
        "{}/api/v1/realtime?access_token={}",
        base_url.replace("http://", "ws://"),
        token
    );
    let (mut ws, _) = tokio_tungstenite::connect_async(&ws_url).await.unwrap();
    wait_for_subscribers(&state, 1).await;

    let created: mdpro_core::Document = reqwest::Client::new()
        .post(format!("{}/api/v1/documents", base_url))
        .bearer_auth(&token)
        .json(&CreateDocumentRequest::default())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let envelope = next_envelope(&mut ws).await;
    assert_eq!(envelope.event_type, "documents.insert");
    assert_eq!(envelope.payload.record_id, created.id);
}

#[tokio::test]
async fn test_ws_connection_count_tracks_clients() {
    use std::sync::atomic::Ordering;

    let (base_url, state) = spawn_test_server().await;
    let (_user_id, token) = sign_up(&base_url, "count@example.com").await;
    let ws_url = format!(
        "{}/api/v1/realtime?access_token={}",
        base_url.replace("http://", "ws://"),
        token
    );

    let (ws, _) = tokio_tungstenite::connect_async(&ws_url).await.unwrap();
    wait_for_subscribers(&state, 1).await;
    assert_eq!(state.ws_connections.load(Ordering::Relaxed), 1);

    drop(ws);
    for _ in 0..100 {
        if state.ws_connections.load(Ordering::Relaxed) == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("connection count never dropped");
}
