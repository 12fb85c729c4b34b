//! # mdpro-client
//!
//! Thin client for the mdpro Markdown editor.
//!
//! This crate provides:
//! - The [`Backend`] gateway trait, with an HTTP/WebSocket implementation
//!   and an in-process mock
//! - [`UserContext`]: session and profile, following auth-state changes
//! - [`DocumentSession`]: the open document with optimistic content saves and
//!   confirm-then-commit title edits
//! - [`Navigator`]: the category/document tree, refreshed on change notifications
//! - Share link creation and resolution, with QR codes for share URLs
//! - Editor helpers: split pane, Markdown preview, toolbar snippets
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mdpro_client::{ClientConfig, HttpBackend, LogNotifier, Navigator};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let backend = Arc::new(HttpBackend::new(&ClientConfig::from_env())?);
//!     let mut nav = Navigator::new(backend, Arc::new(LogNotifier));
//!     nav.refresh().await;
//!     println!("{} top-level entries", nav.tree().len());
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod config;
pub mod context;
pub mod http;
pub mod layout;
pub mod mock;
pub mod navigator;
pub mod notify;
pub mod preview;
pub mod qr;
pub mod session;
pub mod share;
pub mod toolbar;

pub use backend::{AuthEvent, Backend, ChangeStream};
pub use config::ClientConfig;
pub use context::UserContext;
pub use http::HttpBackend;
pub use layout::SplitPane;
pub use mock::MockBackend;
pub use navigator::{ChangeWatch, Navigator};
pub use notify::{Level, LogNotifier, Notification, NotificationQueue, Notifier};
pub use preview::render_markdown;
pub use qr::{qr_svg, qr_terminal};
pub use session::DocumentSession;
pub use share::{parse_expiry, parse_share_token, ShareClient, ShareOptions};
