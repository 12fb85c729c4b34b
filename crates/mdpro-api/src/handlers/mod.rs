//! HTTP handlers for mdpro-api.
//!
//! Every handler that mutates a document or category publishes a
//! [`mdpro_core::ChangeEvent`] on the shared event bus after the write
//! commits; the realtime module fans those out to subscribers.

pub mod auth;
pub mod categories;
pub mod documents;
pub mod health;
pub mod profile;
pub mod realtime;
pub mod shares;
