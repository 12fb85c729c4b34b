//! Change-feed event types, envelope schema, and event bus.
//!
//! Every successful mutation of a document or category row is published on a
//! single broadcast channel. Downstream consumers (the WebSocket realtime
//! endpoint, the SSE stream, tests) subscribe independently and filter by
//! table and owner.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::Error;

/// Tables that publish change notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Documents,
    Categories,
}

impl Table {
    /// Every table with a change feed.
    pub const ALL: [Table; 2] = [Table::Documents, Table::Categories];

    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Documents => "documents",
            Table::Categories => "categories",
        }
    }

    /// Parse a comma-separated table list such as `documents,categories`.
    ///
    /// An empty list selects every table.
    pub fn parse_list(s: &str) -> Result<Vec<Table>, Error> {
        let mut tables = Vec::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let table: Table = part.parse()?;
            if !tables.contains(&table) {
                tables.push(table);
            }
        }
        if tables.is_empty() {
            tables.extend(Table::ALL);
        }
        Ok(tables)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Table {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "documents" => Ok(Table::Documents),
            "categories" => Ok(Table::Categories),
            other => Err(Error::InvalidInput(format!("unknown table: {}", other))),
        }
    }
}

/// Kind of row mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Insert => "insert",
            ChangeKind::Update => "update",
            ChangeKind::Delete => "delete",
        }
    }
}

/// A single row change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
    pub record_id: Uuid,
    /// Owner of the changed row. Feeds only deliver events to their owner.
    pub user_id: Uuid,
}

impl ChangeEvent {
    pub fn document(kind: ChangeKind, record_id: Uuid, user_id: Uuid) -> Self {
        Self {
            table: Table::Documents,
            kind,
            record_id,
            user_id,
        }
    }

    pub fn category(kind: ChangeKind, record_id: Uuid, user_id: Uuid) -> Self {
        Self {
            table: Table::Categories,
            kind,
            record_id,
            user_id,
        }
    }

    /// Dotted event type, e.g. `documents.update`.
    pub fn event_type(&self) -> String {
        format!("{}.{}", self.table.as_str(), self.kind.as_str())
    }
}

/// Envelope wrapping every change published on the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEnvelope {
    /// UUIDv7, time-ordered.
    pub event_id: Uuid,
    /// Dotted event type (`documents.insert`, `categories.delete`, ...).
    pub event_type: String,
    pub occurred_at: DateTime<Utc>,
    pub payload: ChangeEvent,
}

impl ChangeEnvelope {
    pub fn new(event: ChangeEvent) -> Self {
        Self {
            event_id: crate::uuid_utils::new_v7(),
            event_type: event.event_type(),
            occurred_at: Utc::now(),
            payload: event,
        }
    }

    /// True when this envelope should be delivered to `user_id` watching `tables`.
    pub fn is_visible_to(&self, user_id: Uuid, tables: &[Table]) -> bool {
        self.payload.user_id == user_id && tables.contains(&self.payload.table)
    }
}

/// Broadcast bus for change notifications.
///
/// Cloning the bus is cheap; all clones publish into the same channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ChangeEnvelope>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    ///
    /// Recommended: 256 for production, 32 for tests.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish a change to all subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped.
    pub fn emit(&self, event: ChangeEvent) {
        let envelope = ChangeEnvelope::new(event);
        let subscriber_count = self.tx.receiver_count();
        tracing::debug!(
            event_type = %envelope.event_type,
            event_id = %envelope.event_id,
            record_id = %envelope.payload.record_id,
            subscriber_count,
            "EventBus emit"
        );
        let _ = self.tx.send(envelope);
    }

    /// Subscribe to receive enveloped events. Each subscriber gets its own independent stream.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEnvelope> {
        self.tx.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(crate::defaults::EVENT_BUS_CAPACITY)
    }
}
