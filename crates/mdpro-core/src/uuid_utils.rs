//! UUID v7 utilities for time-ordered identifiers.
//!
//! Record ids are UUIDv7 so that they sort by creation time, which keeps
//! insertion order stable in logs and in the in-memory store.

use uuid::Uuid;

/// Generate a new UUIDv7 identifier.
///
/// # Example
///
/// ```
/// use mdpro_core::uuid_utils::new_v7;
///
/// let a = new_v7();
/// let b = new_v7();
/// assert!(a <= b);
/// ```
#[inline]
pub fn new_v7() -> Uuid {
    Uuid::now_v7()
}
