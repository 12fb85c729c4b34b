//! Realtime change feeds.
//!
//! Both feeds deliver [`ChangeEnvelope`]s for the signed-in user only,
//! restricted to the tables named in `?tables=` (all tables when omitted).
//! Envelopes carry ids, never row contents; clients refetch.

use std::convert::Infallible;
use std::sync::atomic::Ordering;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use mdpro_core::{defaults, ChangeEnvelope, Table};

use crate::{auth::RequireAuth, ApiError, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct FeedQuery {
    /// Comma-separated table list, e.g. `documents,categories`.
    #[serde(default)]
    pub tables: String,
}

impl FeedQuery {
    fn tables(&self) -> Result<Vec<Table>, ApiError> {
        Ok(Table::parse_list(&self.tables)?)
    }
}

/// WebSocket upgrade for the change feed.
///
/// Browsers cannot set headers on WebSocket requests, so the session token may
/// be passed as `?access_token=`.
///
/// # Returns
/// - 101 Switching Protocols
/// - 400 Bad Request: unknown table name
/// - 401 Unauthorized: no valid session
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    auth: RequireAuth,
    Query(query): Query<FeedQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let tables = query.tables()?;
    let user_id = auth.user.id;
    Ok(ws.on_upgrade(move |socket| handle_ws_connection(socket, state, user_id, tables)))
}

async fn handle_ws_connection(
    socket: WebSocket,
    state: AppState,
    user_id: Uuid,
    tables: Vec<Table>,
) {
    use futures::{SinkExt, StreamExt};

    let count = state.ws_connections.fetch_add(1, Ordering::Relaxed) + 1;
    tracing::info!(active = count, user_id = %user_id, ?tables, "WebSocket connection opened");

    let (mut sender, mut receiver) = socket.split();
    let mut event_rx = state.event_bus.subscribe();

    // Forward matching events to the client
    let send_task = tokio::spawn(async move {
        let mut ping_interval =
            tokio::time::interval(Duration::from_secs(defaults::WS_PING_INTERVAL_SECS));
        loop {
            tokio::select! {
                event = event_rx.recv() => {
                    match event {
                        Ok(envelope) if envelope.is_visible_to(user_id, &tables) => {
                            if let Ok(json) = serde_json::to_string(&envelope) {
                                if sender.send(Message::Text(json)).await.is_err() {
                                    break;
                                }
                            }
                        }
                        Ok(_) => {}
                        Err(RecvError::Lagged(n)) => {
                            tracing::debug!(missed = n, "WebSocket client lagged");
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
                _ = ping_interval.tick() => {
                    if sender.send(Message::Ping(vec![])).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // The feed is one-way; only watch for the client going away
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    tokio::select! {
        _ = send_task => {}
        _ = recv_task => {}
    }
    let count = state.ws_connections.fetch_sub(1, Ordering::Relaxed) - 1;
    tracing::info!(active = count, user_id = %user_id, "WebSocket connection closed");
}

fn sse_event(envelope: &ChangeEnvelope) -> Option<Event> {
    let json = serde_json::to_string(envelope).ok()?;
    Some(
        Event::default()
            .event(envelope.event_type.clone())
            .id(envelope.event_id.to_string())
            .data(json),
    )
}

/// SSE change feed.
///
/// Events are named by type (`documents.update`, `categories.insert`, ...).
pub async fn sse_events(
    State(state): State<AppState>,
    auth: RequireAuth,
    Query(query): Query<FeedQuery>,
) -> Result<Sse<impl futures::Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let tables = query.tables()?;
    let user_id = auth.user.id;
    let rx = state.event_bus.subscribe();

    use tokio_stream::StreamExt as _;
    let stream = tokio_stream::wrappers::BroadcastStream::new(rx).filter_map(
        move |result: Result<ChangeEnvelope, _>| match result {
            Ok(envelope) if envelope.is_visible_to(user_id, &tables) => {
                sse_event(&envelope).map(Ok)
            }
            // Foreign events and lag notices are skipped
            _ => None,
        },
    );

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(defaults::SSE_KEEPALIVE_SECS))
            .text("keepalive"),
    ))
}
