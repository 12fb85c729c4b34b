//! In-memory storage implementing every repository trait.
//!
//! Behaves like the PostgreSQL repositories (ownership scoping, ordering,
//! path rewriting, cascades) without a database. Used by the API tests and
//! for running the server locally with `DATABASE_URL=memory`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use mdpro_core::{
    category_path, models::validate_category_name, new_v7, AccountRepository, Category,
    CategoryRepository, CreateCategoryRequest, CreateDocumentRequest, Document,
    DocumentRepository, Error, NewShareSettings, ProfileRepository, Repositories, Result,
    SessionRecord, ShareRepository, ShareSettings, SharedDocument, StoredCredentials,
    UpdateDocumentRequest, UpdateProfileRequest, UserIdentity, UserProfile,
};

#[derive(Debug, Clone)]
struct Account {
    identity: UserIdentity,
    password_hash: String,
}

#[derive(Debug, Clone)]
struct StoredSession {
    user_id: Uuid,
    expires_at: DateTime<Utc>,
    recovery: bool,
}

#[derive(Default)]
struct State {
    accounts: HashMap<Uuid, Account>,
    profiles: HashMap<Uuid, UserProfile>,
    sessions: HashMap<String, StoredSession>,
    recovery_tokens: HashMap<String, (Uuid, DateTime<Utc>)>,
    documents: HashMap<Uuid, Document>,
    categories: HashMap<Uuid, Category>,
    shares: Vec<ShareSettings>,
}

impl State {
    fn owned_category(&self, user_id: Uuid, id: Uuid) -> Result<&Category> {
        self.categories
            .get(&id)
            .filter(|c| c.user_id == user_id)
            .ok_or(Error::CategoryNotFound(id))
    }

    fn owned_document_mut(&mut self, user_id: Uuid, id: Uuid) -> Result<&mut Document> {
        self.documents
            .get_mut(&id)
            .filter(|d| d.user_id == user_id)
            .ok_or(Error::DocumentNotFound(id))
    }

    /// Ids of all descendants of `id`.
    fn descendants(&self, id: Uuid) -> Vec<Uuid> {
        let mut out = Vec::new();
        let mut frontier = vec![id];
        while let Some(parent) = frontier.pop() {
            for cat in self.categories.values() {
                if cat.parent_id == Some(parent) && !out.contains(&cat.id) {
                    out.push(cat.id);
                    frontier.push(cat.id);
                }
            }
        }
        out
    }

    /// Replace the `old_prefix` of every descendant's path with `new_prefix`.
    fn rewrite_paths(&mut self, id: Uuid, old_prefix: &str, new_prefix: &str, now: DateTime<Utc>) {
        for child in self.descendants(id) {
            if let Some(cat) = self.categories.get_mut(&child) {
                if let Some(rest) = cat.path.strip_prefix(old_prefix) {
                    cat.path = format!("{}{}", new_prefix, rest);
                    cat.updated_at = now;
                }
            }
        }
    }
}

/// Thread-safe in-memory store. Clones share the same state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All repositories backed by this store.
    pub fn repositories(&self) -> Repositories {
        Repositories {
            documents: Arc::new(self.clone()),
            categories: Arc::new(self.clone()),
            shares: Arc::new(self.clone()),
            profiles: Arc::new(self.clone()),
            accounts: Arc::new(self.clone()),
        }
    }
}

#[async_trait]
impl DocumentRepository for MemoryStore {
    async fn insert(&self, user_id: Uuid, req: CreateDocumentRequest) -> Result<Document> {
        let mut state = self.state.write().await;
        if let Some(category_id) = req.category_id {
            state.owned_category(user_id, category_id)?;
        }
        let now = Utc::now();
        let doc = Document {
            id: new_v7(),
            title: req.title,
            content: req.content,
            user_id,
            category_id: req.category_id,
            is_public: req.is_public,
            created_at: now,
            updated_at: now,
        };
        state.documents.insert(doc.id, doc.clone());
        Ok(doc)
    }

    async fn fetch(&self, user_id: Uuid, id: Uuid) -> Result<Document> {
        let state = self.state.read().await;
        state
            .documents
            .get(&id)
            .filter(|d| d.user_id == user_id)
            .cloned()
            .ok_or(Error::DocumentNotFound(id))
    }

    async fn list(&self, user_id: Uuid) -> Result<Vec<Document>> {
        let state = self.state.read().await;
        let mut docs: Vec<Document> = state
            .documents
            .values()
            .filter(|d| d.user_id == user_id)
            .cloned()
            .collect();
        docs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        Ok(docs)
    }

    async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        req: UpdateDocumentRequest,
    ) -> Result<Document> {
        let mut state = self.state.write().await;
        let doc = state.owned_document_mut(user_id, id)?;
        if let Some(title) = req.title {
            doc.title = title;
        }
        if let Some(content) = req.content {
            doc.content = content;
        }
        if let Some(is_public) = req.is_public {
            doc.is_public = is_public;
        }
        doc.updated_at = Utc::now();
        Ok(doc.clone())
    }

    async fn set_category(
        &self,
        user_id: Uuid,
        id: Uuid,
        category_id: Option<Uuid>,
    ) -> Result<Document> {
        let mut state = self.state.write().await;
        if let Some(category_id) = category_id {
            state.owned_category(user_id, category_id)?;
        }
        let doc = state.owned_document_mut(user_id, id)?;
        doc.category_id = category_id;
        doc.updated_at = Utc::now();
        Ok(doc.clone())
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<()> {
        let mut state = self.state.write().await;
        state.owned_document_mut(user_id, id)?;
        state.documents.remove(&id);
        state.shares.retain(|s| s.document_id != id);
        Ok(())
    }

    async fn fetch_shared(&self, id: Uuid) -> Result<Option<SharedDocument>> {
        let state = self.state.read().await;
        Ok(state.documents.get(&id).map(|d| SharedDocument {
            title: d.title.clone(),
            content: d.content.clone(),
        }))
    }
}

#[async_trait]
impl CategoryRepository for MemoryStore {
    async fn insert(&self, user_id: Uuid, req: CreateCategoryRequest) -> Result<Category> {
        validate_category_name(&req.name)?;
        let name = req.name.trim().to_string();
        let mut state = self.state.write().await;
        let parent_path = match req.parent_id {
            Some(parent_id) => Some(state.owned_category(user_id, parent_id)?.path.clone()),
            None => None,
        };
        let now = Utc::now();
        let category = Category {
            id: new_v7(),
            path: category_path(parent_path.as_deref(), &name),
            name,
            parent_id: req.parent_id,
            user_id,
            created_at: now,
            updated_at: now,
        };
        state.categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn fetch(&self, user_id: Uuid, id: Uuid) -> Result<Category> {
        let state = self.state.read().await;
        state.owned_category(user_id, id).cloned()
    }

    async fn list(&self, user_id: Uuid) -> Result<Vec<Category>> {
        let state = self.state.read().await;
        let mut cats: Vec<Category> = state
            .categories
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        cats.sort_by(|a, b| a.path.cmp(&b.path).then(a.id.cmp(&b.id)));
        Ok(cats)
    }

    async fn rename(&self, user_id: Uuid, id: Uuid, name: &str) -> Result<Category> {
        validate_category_name(name)?;
        let name = name.trim();
        let mut state = self.state.write().await;
        let current = state.owned_category(user_id, id)?.clone();
        let parent_prefix = current.path.strip_suffix(&current.name).unwrap_or("");
        let new_path = format!("{}{}", parent_prefix, name);
        let now = Utc::now();

        state.rewrite_paths(id, &current.path, &new_path, now);
        let cat = state
            .categories
            .get_mut(&id)
            .ok_or(Error::CategoryNotFound(id))?;
        cat.name = name.to_string();
        cat.path = new_path;
        cat.updated_at = now;
        Ok(cat.clone())
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<()> {
        let mut state = self.state.write().await;
        let current = state.owned_category(user_id, id)?.clone();
        let now = Utc::now();

        for doc in state.documents.values_mut() {
            if doc.category_id == Some(id) {
                doc.category_id = None;
            }
        }
        state.rewrite_paths(id, &format!("{}/", current.path), "", now);
        for cat in state.categories.values_mut() {
            if cat.parent_id == Some(id) {
                cat.parent_id = None;
            }
        }
        state.categories.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl ShareRepository for MemoryStore {
    async fn insert(&self, user_id: Uuid, share: NewShareSettings) -> Result<ShareSettings> {
        let mut state = self.state.write().await;
        state.owned_document_mut(user_id, share.document_id)?;
        if state.shares.iter().any(|s| s.share_id == share.share_id) {
            return Err(Error::Conflict(
                "A share with this token already exists".to_string(),
            ));
        }
        let settings = ShareSettings {
            id: new_v7(),
            document_id: share.document_id,
            share_id: share.share_id,
            is_public: share.is_public,
            password_hash: share.password_hash,
            expiry_date: share.expiry_date,
            created_at: Utc::now(),
        };
        state.shares.push(settings.clone());
        Ok(settings)
    }

    async fn find_by_token(&self, share_id: &str) -> Result<Option<ShareSettings>> {
        let state = self.state.read().await;
        Ok(state.shares.iter().find(|s| s.share_id == share_id).cloned())
    }

    async fn list_for_document(
        &self,
        user_id: Uuid,
        document_id: Uuid,
    ) -> Result<Vec<ShareSettings>> {
        let state = self.state.read().await;
        let owned = state
            .documents
            .get(&document_id)
            .is_some_and(|d| d.user_id == user_id);
        if !owned {
            return Err(Error::DocumentNotFound(document_id));
        }
        Ok(state
            .shares
            .iter()
            .rev()
            .filter(|s| s.document_id == document_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ProfileRepository for MemoryStore {
    async fn get(&self, user_id: Uuid) -> Result<UserProfile> {
        let state = self.state.read().await;
        state
            .profiles
            .get(&user_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("profile {}", user_id)))
    }

    async fn update(&self, user_id: Uuid, req: UpdateProfileRequest) -> Result<UserProfile> {
        let mut state = self.state.write().await;
        let profile = state
            .profiles
            .get_mut(&user_id)
            .ok_or_else(|| Error::NotFound(format!("profile {}", user_id)))?;
        profile.full_name = req.full_name;
        profile.updated_at = Some(Utc::now());
        Ok(profile.clone())
    }
}

#[async_trait]
impl AccountRepository for MemoryStore {
    async fn create_account(&self, email: &str, password_hash: &str) -> Result<UserIdentity> {
        let mut state = self.state.write().await;
        if state.accounts.values().any(|a| a.identity.email == email) {
            return Err(Error::Conflict(
                "An account with this email already exists".to_string(),
            ));
        }
        let identity = UserIdentity {
            id: new_v7(),
            email: email.to_string(),
        };
        state.accounts.insert(
            identity.id,
            Account {
                identity: identity.clone(),
                password_hash: password_hash.to_string(),
            },
        );
        state.profiles.insert(
            identity.id,
            UserProfile {
                id: identity.id,
                email: email.to_string(),
                full_name: None,
                created_at: Utc::now(),
                updated_at: None,
            },
        );
        Ok(identity)
    }

    async fn find_credentials(&self, email: &str) -> Result<Option<StoredCredentials>> {
        let state = self.state.read().await;
        Ok(state
            .accounts
            .values()
            .find(|a| a.identity.email == email)
            .map(|a| StoredCredentials {
                user: a.identity.clone(),
                password_hash: a.password_hash.clone(),
            }))
    }

    async fn set_password_hash(&self, user_id: Uuid, password_hash: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let account = state
            .accounts
            .get_mut(&user_id)
            .ok_or_else(|| Error::NotFound(format!("user {}", user_id)))?;
        account.password_hash = password_hash.to_string();
        Ok(())
    }

    async fn create_session(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
        recovery: bool,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        state.sessions.insert(
            token_hash.to_string(),
            StoredSession {
                user_id,
                expires_at,
                recovery,
            },
        );
        Ok(())
    }

    async fn find_session(&self, token_hash: &str) -> Result<Option<SessionRecord>> {
        let state = self.state.read().await;
        let now = Utc::now();
        Ok(state
            .sessions
            .get(token_hash)
            .filter(|s| s.expires_at > now)
            .and_then(|s| {
                state.accounts.get(&s.user_id).map(|a| SessionRecord {
                    user: a.identity.clone(),
                    expires_at: s.expires_at,
                    recovery: s.recovery,
                })
            }))
    }

    async fn delete_session(&self, token_hash: &str) -> Result<()> {
        self.state.write().await.sessions.remove(token_hash);
        Ok(())
    }

    async fn end_recovery(&self, token_hash: &str) -> Result<()> {
        if let Some(session) = self.state.write().await.sessions.get_mut(token_hash) {
            session.recovery = false;
        }
        Ok(())
    }

    async fn create_recovery_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        self.state
            .write()
            .await
            .recovery_tokens
            .insert(token_hash.to_string(), (user_id, expires_at));
        Ok(())
    }

    async fn redeem_recovery_token(&self, token_hash: &str) -> Result<Option<UserIdentity>> {
        let mut state = self.state.write().await;
        let Some((user_id, expires_at)) = state.recovery_tokens.remove(token_hash) else {
            return Ok(None);
        };
        if expires_at <= Utc::now() {
            return Ok(None);
        }
        Ok(state.accounts.get(&user_id).map(|a| a.identity.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn store_with_user() -> (MemoryStore, Uuid) {
        let store = MemoryStore::new();
        let user = store
            .create_account("ada@example.com", "hash")
            .await
            .unwrap();
        (store, user.id)
    }

    async fn category(
        store: &MemoryStore,
        user: Uuid,
        name: &str,
        parent: Option<Uuid>,
    ) -> Category {
        CategoryRepository::insert(
            store,
            user,
            CreateCategoryRequest {
                name: name.to_string(),
                parent_id: parent,
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_documents_are_scoped_by_owner() {
        let (store, alice) = store_with_user().await;
        let bob = store.create_account("bob@example.com", "h").await.unwrap().id;
        let doc = DocumentRepository::insert(&store, alice, CreateDocumentRequest::default())
            .await
            .unwrap();

        assert!(DocumentRepository::fetch(&store, bob, doc.id).await.is_err());
        assert!(DocumentRepository::list(&store, bob).await.unwrap().is_empty());
        assert!(matches!(
            DocumentRepository::delete(&store, bob, doc.id).await,
            Err(Error::DocumentNotFound(_))
        ));
        assert_eq!(DocumentRepository::list(&store, alice).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_documents_listed_most_recent_first() {
        let (store, user) = store_with_user().await;
        let first = DocumentRepository::insert(&store, user, CreateDocumentRequest::default())
            .await
            .unwrap();
        let second = DocumentRepository::insert(&store, user, CreateDocumentRequest::default())
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        DocumentRepository::update(&store, user, first.id, UpdateDocumentRequest::content("x"))
            .await
            .unwrap();

        let ids: Vec<Uuid> = DocumentRepository::list(&store, user)
            .await
            .unwrap()
            .iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec![first.id, second.id]);
    }

    #[tokio::test]
    async fn test_category_parent_must_be_owned() {
        let (store, alice) = store_with_user().await;
        let bob = store.create_account("bob@example.com", "h").await.unwrap().id;
        let alices = category(&store, alice, "work", None).await;

        let result = CategoryRepository::insert(
            &store,
            bob,
            CreateCategoryRequest {
                name: "sneaky".to_string(),
                parent_id: Some(alices.id),
            },
        )
        .await;
        assert!(matches!(result, Err(Error::CategoryNotFound(_))));
    }

    #[tokio::test]
    async fn test_rename_rewrites_subtree_paths() {
        let (store, user) = store_with_user().await;
        let work = category(&store, user, "work", None).await;
        let projects = category(&store, user, "projects", Some(work.id)).await;
        let rust = category(&store, user, "rust", Some(projects.id)).await;
        assert_eq!(rust.path, "work/projects/rust");

        let renamed = CategoryRepository::rename(&store, user, work.id, "job")
            .await
            .unwrap();
        assert_eq!(renamed.path, "job");

        let rust = CategoryRepository::fetch(&store, user, rust.id).await.unwrap();
        assert_eq!(rust.path, "job/projects/rust");
    }

    #[tokio::test]
    async fn test_delete_category_detaches_and_reroots() {
        let (store, user) = store_with_user().await;
        let work = category(&store, user, "work", None).await;
        let projects = category(&store, user, "projects", Some(work.id)).await;
        let rust = category(&store, user, "rust", Some(projects.id)).await;
        let doc = DocumentRepository::insert(
            &store,
            user,
            CreateDocumentRequest {
                category_id: Some(work.id),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        CategoryRepository::delete(&store, user, work.id).await.unwrap();

        let doc = DocumentRepository::fetch(&store, user, doc.id).await.unwrap();
        assert_eq!(doc.category_id, None);
        let projects = CategoryRepository::fetch(&store, user, projects.id).await.unwrap();
        assert_eq!(projects.parent_id, None);
        assert_eq!(projects.path, "projects");
        let rust = CategoryRepository::fetch(&store, user, rust.id).await.unwrap();
        assert_eq!(rust.path, "projects/rust");
    }

    #[tokio::test]
    async fn test_categories_listed_by_path() {
        let (store, user) = store_with_user().await;
        category(&store, user, "b", None).await;
        let a = category(&store, user, "a", None).await;
        category(&store, user, "z", Some(a.id)).await;

        let paths: Vec<String> = CategoryRepository::list(&store, user)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.path)
            .collect();
        assert_eq!(paths, vec!["a", "a/z", "b"]);
    }

    #[tokio::test]
    async fn test_share_requires_owner_and_unique_token() {
        let (store, alice) = store_with_user().await;
        let bob = store.create_account("bob@example.com", "h").await.unwrap().id;
        let doc = DocumentRepository::insert(&store, alice, CreateDocumentRequest::default())
            .await
            .unwrap();
        let new_share = NewShareSettings {
            document_id: doc.id,
            share_id: "tok".to_string(),
            is_public: true,
            password_hash: None,
            expiry_date: None,
        };

        assert!(ShareRepository::insert(&store, bob, new_share.clone()).await.is_err());
        ShareRepository::insert(&store, alice, new_share.clone())
            .await
            .unwrap();
        assert!(matches!(
            ShareRepository::insert(&store, alice, new_share).await,
            Err(Error::Conflict(_))
        ));

        DocumentRepository::delete(&store, alice, doc.id).await.unwrap();
        assert!(store.find_by_token("tok").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sessions_expire() {
        let (store, user) = store_with_user().await;
        store
            .create_session(user, "live", Utc::now() + Duration::hours(1), false)
            .await
            .unwrap();
        store
            .create_session(user, "stale", Utc::now() - Duration::hours(1), false)
            .await
            .unwrap();

        assert!(store.find_session("live").await.unwrap().is_some());
        assert!(store.find_session("stale").await.unwrap().is_none());

        store.delete_session("live").await.unwrap();
        assert!(store.find_session("live").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_recovery_token_is_single_use() {
        let (store, user) = store_with_user().await;
        store
            .create_recovery_token(user, "rt", Utc::now() + Duration::minutes(5))
            .await
            .unwrap();

        let redeemed = store.redeem_recovery_token("rt").await.unwrap();
        assert_eq!(redeemed.map(|u| u.id), Some(user));
        assert!(store.redeem_recovery_token("rt").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_end_recovery_keeps_session() {
        let (store, user) = store_with_user().await;
        store
            .create_session(user, "rs", Utc::now() + Duration::hours(1), true)
            .await
            .unwrap();
        assert!(store.find_session("rs").await.unwrap().unwrap().recovery);

        store.end_recovery("rs").await.unwrap();
        let session = store.find_session("rs").await.unwrap().unwrap();
        assert!(!session.recovery);
        assert_eq!(session.user.id, user);

        store.end_recovery("missing").await.unwrap();
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let (store, _) = store_with_user().await;
        assert!(matches!(
            store.create_account("ada@example.com", "x").await,
            Err(Error::Conflict(_))
        ));
    }
}
