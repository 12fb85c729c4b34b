//! # mdpro-core
//!
//! Core types, traits, and abstractions for the mdpro Markdown editor.
//!
//! This crate provides the data model shared by the backend and the thin
//! client: documents, categories, share settings and profiles, the repository
//! traits the storage layer implements, the navigation tree builder, share
//! resolution rules, and the change-feed event bus.

pub mod defaults;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod password;
pub mod share;
pub mod traits;
pub mod tree;
pub mod uuid_utils;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use events::{ChangeEnvelope, ChangeEvent, ChangeKind, EventBus, Table};
pub use models::*;
pub use share::{evaluate_share, generate_share_token, resolve_share, ShareCheck, ShareResolution};
pub use traits::*;
pub use tree::{build_tree, category_options, CategoryOption, TreeNode};
pub use uuid_utils::new_v7;
