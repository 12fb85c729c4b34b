//! The open document.
//!
//! Content and title are saved with two different strategies:
//!
//! - **Content** is optimistic. The edit is applied locally right away and
//!   then persisted. A failed save raises one error notification and leaves
//!   the local text as typed; nothing is rolled back or retried.
//! - **Title** is confirm-then-commit. Typing only changes a draft. On
//!   confirmation the draft is persisted and the local document is replaced
//!   by the record the backend returns; on failure the local document keeps
//!   its old title.
//!
//! Every operation takes `&mut self` across its await points, so a session
//! that has been closed or dropped can never apply a late result.

use std::sync::Arc;

use tracing::{debug, instrument, warn};
use uuid::Uuid;

use mdpro_core::{Document, Result, UpdateDocumentRequest};

use crate::backend::Backend;
use crate::notify::{Notification, Notifier};

pub struct DocumentSession {
    backend: Arc<dyn Backend>,
    notifier: Arc<dyn Notifier>,
    current: Option<Document>,
    title_draft: Option<String>,
}

impl DocumentSession {
    pub fn new(backend: Arc<dyn Backend>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            backend,
            notifier,
            current: None,
            title_draft: None,
        }
    }

    /// Load a document from the backend and make it current.
    pub async fn open(&mut self, id: Uuid) -> Result<&Document> {
        match self.backend.fetch_document(id).await {
            Ok(doc) => Ok(self.show(doc)),
            Err(e) => {
                self.notifier.notify(
                    Notification::error("Error fetching document").with_detail(e.to_string()),
                );
                Err(e)
            }
        }
    }

    /// Make an already loaded document current, e.g. a navigator selection.
    pub fn show(&mut self, doc: Document) -> &Document {
        self.title_draft = None;
        self.current.insert(doc)
    }

    pub fn close(&mut self) {
        self.current = None;
        self.title_draft = None;
    }

    pub fn current(&self) -> Option<&Document> {
        self.current.as_ref()
    }

    /// Replace the content locally, then persist it.
    ///
    /// Returns whether the save reached the backend. Empty content is saved
    /// like any other value.
    #[instrument(
        skip(self, content),
        fields(subsystem = "client", component = "session", op = "edit_content")
    )]
    pub async fn edit_content(&mut self, content: impl Into<String>) -> bool {
        let content = content.into();
        let Some(doc) = self.current.as_mut() else {
            return false;
        };
        doc.content = content.clone();
        let id = doc.id;

        match self
            .backend
            .update_document(id, UpdateDocumentRequest::content(content))
            .await
        {
            Ok(saved) => {
                if let Some(doc) = self.current.as_mut().filter(|d| d.id == saved.id) {
                    doc.updated_at = saved.updated_at;
                }
                debug!(document_id = %id, "Content saved");
                true
            }
            Err(e) => {
                warn!(document_id = %id, error = %e, "Content save failed");
                self.notifier.notify(
                    Notification::error("Error saving document").with_detail(e.to_string()),
                );
                false
            }
        }
    }

    /// Start editing the title; the draft starts as the current title.
    pub fn begin_title_edit(&mut self) {
        if let Some(doc) = &self.current {
            self.title_draft = Some(doc.title.clone());
        }
    }

    pub fn set_title_draft(&mut self, title: impl Into<String>) {
        if self.current.is_some() {
            self.title_draft = Some(title.into());
        }
    }

    pub fn title_draft(&self) -> Option<&str> {
        self.title_draft.as_deref()
    }

    pub fn is_editing_title(&self) -> bool {
        self.title_draft.is_some()
    }

    pub fn cancel_title_edit(&mut self) {
        self.title_draft = None;
    }

    /// Persist the title draft.
    ///
    /// An unchanged title ends editing without a backend call. On failure the
    /// draft is kept so the user can retry or cancel.
    #[instrument(
        skip(self),
        fields(subsystem = "client", component = "session", op = "confirm_title")
    )]
    pub async fn confirm_title(&mut self) -> bool {
        let (Some(doc), Some(draft)) = (self.current.as_ref(), self.title_draft.take()) else {
            return false;
        };
        if draft == doc.title {
            return true;
        }
        let id = doc.id;

        match self
            .backend
            .update_document(id, UpdateDocumentRequest::title(draft.clone()))
            .await
        {
            Ok(saved) => {
                // Only the title is taken from the backend; local content may be
                // ahead of what was last saved.
                if let Some(doc) = self.current.as_mut() {
                    doc.title = saved.title;
                    doc.updated_at = saved.updated_at;
                }
                self.notifier.notify(Notification::success("Title updated"));
                true
            }
            Err(e) => {
                warn!(document_id = %id, error = %e, "Title save failed");
                self.title_draft = Some(draft);
                self.notifier.notify(
                    Notification::error("Error updating title").with_detail(e.to_string()),
                );
                false
            }
        }
    }
}
