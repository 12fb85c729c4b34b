//! Sidebar navigation.
//!
//! The navigator keeps the signed-in user's categories and documents and the
//! tree built from them. Every refresh refetches everything; the tree is
//! never patched incrementally.

use std::collections::HashSet;
use std::sync::Arc;

use futures::{FutureExt, StreamExt};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use mdpro_core::{
    build_tree, tree, Category, CreateCategoryRequest, CreateDocumentRequest, Document, Result,
    Table, TreeNode,
};

use crate::backend::{Backend, ChangeStream};
use crate::notify::{Notification, Notifier};

pub struct Navigator {
    backend: Arc<dyn Backend>,
    notifier: Arc<dyn Notifier>,
    categories: Vec<Category>,
    documents: Vec<Document>,
    tree: Vec<TreeNode>,
    expanded: HashSet<Uuid>,
    selected: Option<Uuid>,
}

/// Change feed for the navigator's tables.
pub struct ChangeWatch {
    stream: ChangeStream,
}

impl ChangeWatch {
    /// Wait for the next change, then absorb every change already queued
    /// behind it. Returns how many changes were absorbed, or `None` once the
    /// feed has ended.
    pub async fn next_batch(&mut self) -> Option<usize> {
        self.stream.next().await?;
        let mut count = 1;
        while let Some(Some(_)) = self.stream.next().now_or_never() {
            count += 1;
        }
        Some(count)
    }
}

impl Navigator {
    pub fn new(backend: Arc<dyn Backend>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            backend,
            notifier,
            categories: Vec::new(),
            documents: Vec::new(),
            tree: Vec::new(),
            expanded: HashSet::new(),
            selected: None,
        }
    }

    /// Refetch categories and documents and rebuild the tree.
    ///
    /// Signed out means an empty tree. Failures raise a notification and keep
    /// the previous tree.
    #[instrument(
        skip(self),
        fields(subsystem = "client", component = "navigator", op = "refresh")
    )]
    pub async fn refresh(&mut self) -> bool {
        match self.fetch().await {
            Ok(()) => true,
            Err(e) => {
                self.notifier.notify(
                    Notification::error("Error fetching documents").with_detail(e.to_string()),
                );
                false
            }
        }
    }

    async fn fetch(&mut self) -> Result<()> {
        if self.backend.current_user().await?.is_none() {
            self.categories.clear();
            self.documents.clear();
            self.selected = None;
            self.rebuild();
            return Ok(());
        }

        let (categories, documents) = futures::try_join!(
            self.backend.list_categories(),
            self.backend.list_documents()
        )?;
        self.categories = categories;
        self.documents = documents;
        if let Some(id) = self.selected {
            if !self.documents.iter().any(|d| d.id == id) {
                self.selected = None;
            }
        }
        self.rebuild();
        debug!(
            categories = self.categories.len(),
            documents = self.documents.len(),
            "Navigator refreshed"
        );
        Ok(())
    }

    fn rebuild(&mut self) {
        self.tree = build_tree(&self.categories, &self.documents);
    }

    pub fn tree(&self) -> &[TreeNode] {
        &self.tree
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Rows as shown in the sidebar, honoring collapsed categories.
    pub fn visible_rows(&self) -> Vec<tree::TreeRow<'_>> {
        tree::visible_rows(&self.tree, &self.expanded)
    }

    pub fn category_options(&self) -> Vec<mdpro_core::CategoryOption> {
        mdpro_core::category_options(&self.categories)
    }

    pub fn is_expanded(&self, category_id: Uuid) -> bool {
        self.expanded.contains(&category_id)
    }

    pub fn expand(&mut self, category_id: Uuid) {
        self.expanded.insert(category_id);
    }

    pub fn collapse(&mut self, category_id: Uuid) {
        self.expanded.remove(&category_id);
    }

    /// Flip a category between expanded and collapsed; returns the new state.
    pub fn toggle(&mut self, category_id: Uuid) -> bool {
        if self.expanded.remove(&category_id) {
            false
        } else {
            self.expanded.insert(category_id);
            true
        }
    }

    pub fn expand_all(&mut self) {
        self.expanded = self.categories.iter().map(|c| c.id).collect();
    }

    /// Select a document by id. Unknown ids clear the selection.
    pub fn select(&mut self, document_id: Uuid) -> Option<&Document> {
        self.selected = self
            .documents
            .iter()
            .any(|d| d.id == document_id)
            .then_some(document_id);
        self.selected_document()
    }

    pub fn selected_document(&self) -> Option<&Document> {
        let id = self.selected?;
        self.documents.iter().find(|d| d.id == id)
    }

    /// Create an untitled starter document at the top of the list and select it.
    pub async fn create_document(&mut self) -> Option<Document> {
        match self
            .backend
            .insert_document(CreateDocumentRequest::default())
            .await
        {
            Ok(doc) => {
                info!(
                    subsystem = "client",
                    op = "create_document",
                    document_id = %doc.id,
                    "Document created"
                );
                self.documents.insert(0, doc.clone());
                self.selected = Some(doc.id);
                self.rebuild();
                self.notifier.notify(Notification::success("New document created"));
                Some(doc)
            }
            Err(e) => {
                self.notifier.notify(
                    Notification::error("Error creating document").with_detail(e.to_string()),
                );
                None
            }
        }
    }

    /// Create a category, optionally under `parent_id`, which is expanded.
    pub async fn create_category(
        &mut self,
        name: &str,
        parent_id: Option<Uuid>,
    ) -> Option<Category> {
        let req = CreateCategoryRequest {
            name: name.trim().to_string(),
            parent_id,
        };
        match self.backend.insert_category(req).await {
            Ok(category) => {
                self.categories.push(category.clone());
                self.categories.sort_by(|a, b| a.path.cmp(&b.path));
                if let Some(parent) = parent_id {
                    self.expanded.insert(parent);
                }
                self.rebuild();
                self.notifier.notify(Notification::success("Category created"));
                Some(category)
            }
            Err(e) => {
                self.notifier.notify(
                    Notification::error("Error creating category").with_detail(e.to_string()),
                );
                None
            }
        }
    }

    /// Subscribe to document and category changes.
    pub async fn watch(&self) -> Result<ChangeWatch> {
        let stream = self.backend.subscribe_to_changes(&Table::ALL).await?;
        Ok(ChangeWatch { stream })
    }

    /// Wait for the next batch of changes and refresh once for all of them.
    ///
    /// Returns `None` when the feed has ended.
    pub async fn follow(&mut self, watch: &mut ChangeWatch) -> Option<usize> {
        let changes = watch.next_batch().await?;
        debug!(subsystem = "client", changes, "Change batch received");
        self.refresh().await;
        Some(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockBackend;
    use crate::notify::NotificationQueue;
    use mdpro_core::defaults;

    async fn signed_in_navigator() -> (Navigator, MockBackend, NotificationQueue) {
        let backend = MockBackend::new();
        backend.signed_in("nav@example.com").await.unwrap();
        let queue = NotificationQueue::new();
        let nav = Navigator::new(Arc::new(backend.clone()), Arc::new(queue.clone()));
        (nav, backend, queue)
    }

    #[tokio::test]
    async fn test_signed_out_tree_is_empty() {
        let backend = MockBackend::new();
        let mut nav = Navigator::new(Arc::new(backend.clone()), Arc::new(NotificationQueue::new()));
        assert!(nav.refresh().await);
        assert!(nav.tree().is_empty());
        assert_eq!(backend.call_count("list_documents"), 0);
    }

    #[tokio::test]
    async fn test_create_document_prepends_and_selects() {
        let (mut nav, _backend, queue) = signed_in_navigator().await;
        let first = nav.create_document().await.unwrap();
        let second = nav.create_document().await.unwrap();

        assert_eq!(nav.documents()[0].id, second.id);
        assert_eq!(nav.documents()[1].id, first.id);
        assert_eq!(nav.selected_document().unwrap().id, second.id);
        assert_eq!(second.title, defaults::NEW_DOCUMENT_TITLE);
        assert_eq!(second.content, defaults::NEW_DOCUMENT_CONTENT);
        assert!(!second.is_public);
        assert_eq!(queue.drain()[0].title, "New document created");
    }

    #[tokio::test]
    async fn test_refresh_failure_notifies_and_keeps_tree() {
        let (mut nav, backend, queue) = signed_in_navigator().await;
        nav.create_document().await.unwrap();
        queue.drain();

        backend.set_failing("list_documents", true);
        assert!(!nav.refresh().await);
        assert_eq!(nav.tree().len(), 1);
        let errors = queue.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].title, "Error fetching documents");
    }

    #[tokio::test]
    async fn test_toggle_and_visible_rows() {
        let (mut nav, backend, _) = signed_in_navigator().await;
        let parent = nav.create_category("work", None).await.unwrap();
        let child = nav.create_category("projects", Some(parent.id)).await.unwrap();
        backend
            .insert_document(CreateDocumentRequest {
                category_id: Some(child.id),
                ..Default::default()
            })
            .await
            .unwrap();
        nav.refresh().await;

        // Creating under a parent expands the parent only.
        assert!(nav.is_expanded(parent.id));
        assert_eq!(nav.visible_rows().len(), 2);

        assert!(nav.toggle(child.id));
        assert_eq!(nav.visible_rows().len(), 3);
        assert!(!nav.toggle(parent.id));
        assert_eq!(nav.visible_rows().len(), 1);
    }

    #[tokio::test]
    async fn test_select_unknown_clears() {
        let (mut nav, _, _) = signed_in_navigator().await;
        let doc = nav.create_document().await.unwrap();
        assert!(nav.select(doc.id).is_some());
        assert!(nav.select(Uuid::new_v4()).is_none());
        assert!(nav.selected_document().is_none());
    }

    #[tokio::test]
    async fn test_category_options_indent() {
        let (mut nav, _, _) = signed_in_navigator().await;
        let parent = nav.create_category("a", None).await.unwrap();
        nav.create_category("b", Some(parent.id)).await.unwrap();

        let labels: Vec<_> = nav
            .category_options()
            .into_iter()
            .map(|o| o.label)
            .collect();
        assert_eq!(labels, vec!["a", "  b"]);
    }
}
