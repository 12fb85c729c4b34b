//! Structured logging schema and field name constants for mdpro.
//!
//! All crates use these constants for consistent structured logging fields so
//! log aggregation can query by the same names across subsystems.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, user-visible failure of one action |
//! | INFO  | Lifecycle events (startup, shutdown, sign-in), completed mutations |
//! | DEBUG | Decision points, refreshes, subscription changes |
//! | TRACE | Per-item iteration (tree assembly, event fan-out) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID propagated across a request (UUIDv7).
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "api", "db", "client", "realtime"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "pool", "documents", "shares", "navigator", "session"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "insert", "update_content", "resolve", "refresh"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Owning user UUID.
pub const USER_ID: &str = "user_id";

/// Document UUID being operated on.
pub const DOCUMENT_ID: &str = "document_id";

/// Category UUID being operated on.
pub const CATEGORY_ID: &str = "category_id";

/// Change-feed table name.
pub const TABLE: &str = "table";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of rows returned by a query.
pub const RESULT_COUNT: &str = "result_count";

/// Number of nodes in a built tree.
pub const NODE_COUNT: &str = "node_count";

// ─── Database fields ───────────────────────────────────────────────────────

/// Number of active connections in the pool.
pub const POOL_SIZE: &str = "pool_size";

/// Number of idle connections in the pool.
pub const POOL_IDLE: &str = "pool_idle";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

/// Share resolution outcome ("granted", "not_found", "expired", ...).
pub const SHARE_OUTCOME: &str = "share_outcome";

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_field_names_are_unique_snake_case() {
        let fields = [
            REQUEST_ID,
            SUBSYSTEM,
            COMPONENT,
            OPERATION,
            USER_ID,
            DOCUMENT_ID,
            CATEGORY_ID,
            TABLE,
            DURATION_MS,
            RESULT_COUNT,
            NODE_COUNT,
            POOL_SIZE,
            POOL_IDLE,
            SUCCESS,
            ERROR_MSG,
            SHARE_OUTCOME,
        ];
        let unique: HashSet<_> = fields.iter().collect();
        assert_eq!(unique.len(), fields.len());
        for field in fields {
            assert!(field
                .chars()
                .all(|c| c.is_ascii_lowercase() || c == '_'));
        }
    }
}
