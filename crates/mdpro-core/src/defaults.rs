//! Centralized default constants for mdpro.
//!
//! Every crate references these instead of defining its own magic numbers.

// =============================================================================
// DOCUMENTS
// =============================================================================

/// Title given to documents created from the "New Document" action.
pub const NEW_DOCUMENT_TITLE: &str = "Untitled Document";

/// Starter content for newly created documents.
pub const NEW_DOCUMENT_CONTENT: &str = "# New Document\n\nStart writing here...";

/// Fallback label for a document whose title is blank.
pub const BLANK_TITLE_PLACEHOLDER: &str = "Untitled";

/// Maximum accepted title length in characters.
pub const TITLE_MAX_CHARS: usize = 500;

// =============================================================================
// CATEGORIES
// =============================================================================

/// Separator between names in a category's materialized path.
pub const CATEGORY_PATH_SEPARATOR: char = '/';

/// Maximum accepted category name length in characters.
pub const CATEGORY_NAME_MAX_CHARS: usize = 200;

// =============================================================================
// ACCOUNTS & SESSIONS
// =============================================================================

/// Minimum password length for accounts.
pub const PASSWORD_MIN_CHARS: usize = 6;

/// Session lifetime when `SESSION_TTL_HOURS` is not set (7 days).
pub const SESSION_TTL_HOURS: i64 = 24 * 7;

/// Lifetime of a password recovery token.
pub const RECOVERY_TOKEN_TTL_MINUTES: i64 = 60;

/// Prefix for access tokens, so they are recognisable in logs and configs.
pub const ACCESS_TOKEN_PREFIX: &str = "mdp_at_";

/// Prefix for password recovery tokens.
pub const RECOVERY_TOKEN_PREFIX: &str = "mdp_rt_";

/// Random bytes behind each access or recovery token.
pub const TOKEN_BYTES: usize = 32;

// =============================================================================
// SHARING
// =============================================================================

/// Route segment under which public share links are served.
pub const SHARE_PATH_SEGMENT: &str = "share";

/// Share lookups allowed per period when rate limiting is enabled.
pub const SHARE_RATE_LIMIT_REQUESTS: u32 = 30;

/// Share lookup rate limiting period in seconds.
pub const SHARE_RATE_LIMIT_PERIOD_SECS: u64 = 60;

// =============================================================================
// EVENTS
// =============================================================================

/// Broadcast buffer for the change feed in production.
pub const EVENT_BUS_CAPACITY: usize = 256;

/// WebSocket keepalive ping interval.
pub const WS_PING_INTERVAL_SECS: u64 = 30;

/// SSE keepalive interval.
pub const SSE_KEEPALIVE_SECS: u64 = 15;

// =============================================================================
// SERVER & CLIENT
// =============================================================================

/// Default listen port for the API server.
pub const SERVER_PORT: u16 = 3000;

/// Default API base URL for clients.
pub const API_URL: &str = "http://localhost:3000";

/// Default timeout for client HTTP requests.
pub const CLIENT_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// EDITOR LAYOUT
// =============================================================================

/// Initial editor/preview split (fraction of width given to the editor).
pub const SPLIT_RATIO: f32 = 0.5;

/// Smallest fraction of the container either pane may shrink to.
pub const MIN_PANE_FRACTION: f32 = 0.15;
