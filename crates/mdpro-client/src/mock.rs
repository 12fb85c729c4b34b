//! In-process backend for deterministic testing.
//!
//! [`MockBackend`] runs the real repository semantics from
//! [`mdpro_db::MemoryStore`] and publishes changes on an [`EventBus`], so
//! editor state can be exercised end to end without a server. Failures are
//! injected per operation or for the whole backend.
//!
//! ```rust,ignore
//! let backend = MockBackend::new();
//! backend.signed_in("alice@example.com").await;
//! backend.set_offline(true);
//! assert!(backend.list_documents().await.is_err());
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use futures::StreamExt;
use tokio::sync::{broadcast, RwLock};
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use mdpro_core::{
    defaults, password::hash_password, password::verify_password, resolve_share,
    validate_password, Category, ChangeEvent, ChangeKind, CreateCategoryRequest,
    CreateDocumentRequest, CreateShareRequest, Credentials, Document, Error, EventBus,
    NewShareSettings, Repositories, Result, Session, ShareLink, ShareResolution, Table,
    UpdateDocumentRequest, UpdateProfileRequest, UserIdentity, UserProfile,
};
use mdpro_db::MemoryStore;

use crate::backend::{AuthEvent, Backend, ChangeStream, AUTH_EVENT_CAPACITY};

/// Password used by [`MockBackend::signed_in`].
pub const MOCK_PASSWORD: &str = "mock-password";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    pub operation: String,
    pub input: String,
}

struct MockState {
    session: RwLock<Option<Session>>,
    offline: AtomicBool,
    failing: Mutex<HashSet<String>>,
    call_log: Mutex<Vec<MockCall>>,
    recovery_tokens: Mutex<HashMap<String, UserIdentity>>,
    auth_tx: broadcast::Sender<AuthEvent>,
}

/// Mock [`Backend`] over an in-memory store.
#[derive(Clone)]
pub struct MockBackend {
    repos: Repositories,
    bus: EventBus,
    public_url: String,
    state: Arc<MockState>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        let (auth_tx, _) = broadcast::channel(AUTH_EVENT_CAPACITY);
        Self {
            repos: MemoryStore::new().repositories(),
            bus: EventBus::new(64),
            public_url: defaults::API_URL.to_string(),
            state: Arc::new(MockState {
                session: RwLock::new(None),
                offline: AtomicBool::new(false),
                failing: Mutex::new(HashSet::new()),
                call_log: Mutex::new(Vec::new()),
                recovery_tokens: Mutex::new(HashMap::new()),
                auth_tx,
            }),
        }
    }

    /// Base URL share links are composed from.
    pub fn with_public_url(mut self, url: impl Into<String>) -> Self {
        self.public_url = url.into();
        self
    }

    /// Make every operation fail with a request error.
    pub fn set_offline(&self, offline: bool) {
        self.state.offline.store(offline, Ordering::SeqCst);
    }

    /// Make one operation (by trait method name) fail with a request error.
    pub fn set_failing(&self, operation: &str, failing: bool) {
        let mut ops = lock(&self.state.failing);
        if failing {
            ops.insert(operation.to_string());
        } else {
            ops.remove(operation);
        }
    }

    /// Create an account and sign it in, bypassing validation.
    pub async fn signed_in(&self, email: &str) -> Result<Session> {
        let hash = hash_password(MOCK_PASSWORD)?;
        let user = self.repos.accounts.create_account(email, &hash).await?;
        let session = self.adopt(user, false).await;
        Ok(session)
    }

    /// The underlying repositories, for seeding and assertions.
    pub fn repositories(&self) -> &Repositories {
        &self.repos
    }

    /// The change bus, for publishing events as another client would.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Most recently issued recovery token for `email`.
    pub fn recovery_token_for(&self, email: &str) -> Option<String> {
        lock(&self.state.recovery_tokens)
            .iter()
            .find(|(_, user)| user.email == email)
            .map(|(token, _)| token.clone())
    }

    /// Get all logged calls for assertion.
    pub fn get_calls(&self) -> Vec<MockCall> {
        lock(&self.state.call_log).clone()
    }

    /// Number of logged calls of one operation.
    pub fn call_count(&self, operation: &str) -> usize {
        lock(&self.state.call_log)
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    pub fn clear_calls(&self) {
        lock(&self.state.call_log).clear()
    }

    /// Log the call, then fail if the backend or this operation is down.
    fn check(&self, operation: &str, input: impl Into<String>) -> Result<()> {
        lock(&self.state.call_log).push(MockCall {
            operation: operation.to_string(),
            input: input.into(),
        });
        if self.state.offline.load(Ordering::SeqCst)
            || lock(&self.state.failing).contains(operation)
        {
            return Err(Error::Request(format!("{}: backend unreachable", operation)));
        }
        Ok(())
    }

    async fn user(&self) -> Result<UserIdentity> {
        self.state
            .session
            .read()
            .await
            .as_ref()
            .map(|s| s.user.clone())
            .ok_or_else(|| Error::Unauthorized("not signed in".to_string()))
    }

    async fn adopt(&self, user: UserIdentity, recovery: bool) -> Session {
        let session = Session {
            access_token: format!("{}{}", defaults::ACCESS_TOKEN_PREFIX, Uuid::new_v4().simple()),
            user,
            expires_at: Utc::now() + Duration::hours(defaults::SESSION_TTL_HOURS),
            recovery,
        };
        *self.state.session.write().await = Some(session.clone());
        let event = if recovery {
            AuthEvent::PasswordRecovery(session.clone())
        } else {
            AuthEvent::SignedIn(session.clone())
        };
        let _ = self.state.auth_tx.send(event);
        session
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn session(&self) -> Option<Session> {
        self.state.session.read().await.clone()
    }

    async fn current_user(&self) -> Result<Option<UserIdentity>> {
        self.check("current_user", "")?;
        Ok(self.state.session.read().await.as_ref().map(|s| s.user.clone()))
    }

    async fn sign_up(&self, credentials: Credentials) -> Result<Session> {
        self.check("sign_up", credentials.email.as_str())?;
        credentials.validate()?;
        let hash = hash_password(&credentials.password)?;
        let user = self
            .repos
            .accounts
            .create_account(&credentials.normalized_email(), &hash)
            .await?;
        Ok(self.adopt(user, false).await)
    }

    async fn sign_in(&self, credentials: Credentials) -> Result<Session> {
        self.check("sign_in", credentials.email.as_str())?;
        let stored = self
            .repos
            .accounts
            .find_credentials(&credentials.normalized_email())
            .await?;
        match stored {
            Some(stored) if verify_password(&credentials.password, &stored.password_hash)? => {
                Ok(self.adopt(stored.user, false).await)
            }
            _ => Err(Error::Unauthorized("Invalid email or password".to_string())),
        }
    }

    async fn sign_out(&self) -> Result<()> {
        self.check("sign_out", "")?;
        *self.state.session.write().await = None;
        let _ = self.state.auth_tx.send(AuthEvent::SignedOut);
        Ok(())
    }

    async fn update_user_password(&self, password: &str) -> Result<()> {
        self.check("update_user_password", "")?;
        let user = self.user().await?;
        validate_password(password)?;
        let hash = hash_password(password)?;
        self.repos.accounts.set_password_hash(user.id, &hash).await?;
        if let Some(session) = self.state.session.write().await.as_mut() {
            session.recovery = false;
        }
        let _ = self.state.auth_tx.send(AuthEvent::UserUpdated);
        Ok(())
    }

    async fn request_recovery(&self, email: &str) -> Result<()> {
        self.check("request_recovery", email)?;
        let normalized = email.trim().to_lowercase();
        if let Some(stored) = self.repos.accounts.find_credentials(&normalized).await? {
            let token = format!("{}{}", defaults::RECOVERY_TOKEN_PREFIX, Uuid::new_v4().simple());
            lock(&self.state.recovery_tokens).insert(token, stored.user);
        }
        Ok(())
    }

    async fn verify_recovery(&self, token: &str) -> Result<Session> {
        self.check("verify_recovery", token)?;
        let user = lock(&self.state.recovery_tokens).remove(token);
        match user {
            Some(user) => Ok(self.adopt(user, true).await),
            None => Err(Error::Unauthorized(
                "Recovery link is invalid or has expired".to_string(),
            )),
        }
    }

    fn auth_events(&self) -> broadcast::Receiver<AuthEvent> {
        self.state.auth_tx.subscribe()
    }

    async fn list_documents(&self) -> Result<Vec<Document>> {
        self.check("list_documents", "")?;
        let user = self.user().await?;
        self.repos.documents.list(user.id).await
    }

    async fn fetch_document(&self, id: Uuid) -> Result<Document> {
        self.check("fetch_document", id.to_string())?;
        let user = self.user().await?;
        self.repos.documents.fetch(user.id, id).await
    }

    async fn insert_document(&self, req: CreateDocumentRequest) -> Result<Document> {
        self.check("insert_document", req.title.as_str())?;
        let user = self.user().await?;
        req.validate()?;
        let doc = self.repos.documents.insert(user.id, req).await?;
        self.bus
            .emit(ChangeEvent::document(ChangeKind::Insert, doc.id, user.id));
        Ok(doc)
    }

    async fn update_document(&self, id: Uuid, req: UpdateDocumentRequest) -> Result<Document> {
        self.check("update_document", id.to_string())?;
        let user = self.user().await?;
        if req.is_empty() {
            return Err(Error::InvalidInput("no fields to update".to_string()));
        }
        req.validate()?;
        let doc = self.repos.documents.update(user.id, id, req).await?;
        self.bus
            .emit(ChangeEvent::document(ChangeKind::Update, id, user.id));
        Ok(doc)
    }

    async fn move_document(&self, id: Uuid, category_id: Option<Uuid>) -> Result<Document> {
        self.check("move_document", id.to_string())?;
        let user = self.user().await?;
        let doc = self
            .repos
            .documents
            .set_category(user.id, id, category_id)
            .await?;
        self.bus
            .emit(ChangeEvent::document(ChangeKind::Update, id, user.id));
        Ok(doc)
    }

    async fn delete_document(&self, id: Uuid) -> Result<()> {
        self.check("delete_document", id.to_string())?;
        let user = self.user().await?;
        self.repos.documents.delete(user.id, id).await?;
        self.bus
            .emit(ChangeEvent::document(ChangeKind::Delete, id, user.id));
        Ok(())
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        self.check("list_categories", "")?;
        let user = self.user().await?;
        self.repos.categories.list(user.id).await
    }

    async fn insert_category(&self, req: CreateCategoryRequest) -> Result<Category> {
        self.check("insert_category", req.name.as_str())?;
        let user = self.user().await?;
        req.validate()?;
        let cat = self.repos.categories.insert(user.id, req).await?;
        self.bus
            .emit(ChangeEvent::category(ChangeKind::Insert, cat.id, user.id));
        Ok(cat)
    }

    async fn rename_category(&self, id: Uuid, name: &str) -> Result<Category> {
        self.check("rename_category", name)?;
        let user = self.user().await?;
        let cat = self.repos.categories.rename(user.id, id, name).await?;
        self.bus
            .emit(ChangeEvent::category(ChangeKind::Update, id, user.id));
        Ok(cat)
    }

    async fn delete_category(&self, id: Uuid) -> Result<()> {
        self.check("delete_category", id.to_string())?;
        let user = self.user().await?;
        self.repos.categories.delete(user.id, id).await?;
        self.bus
            .emit(ChangeEvent::category(ChangeKind::Delete, id, user.id));
        Ok(())
    }

    async fn get_profile(&self) -> Result<UserProfile> {
        self.check("get_profile", "")?;
        let user = self.user().await?;
        self.repos.profiles.get(user.id).await
    }

    async fn update_profile(&self, req: UpdateProfileRequest) -> Result<UserProfile> {
        self.check("update_profile", req.full_name.clone().unwrap_or_default())?;
        let user = self.user().await?;
        let profile = self.repos.profiles.update(user.id, req).await?;
        let _ = self.state.auth_tx.send(AuthEvent::UserUpdated);
        Ok(profile)
    }

    async fn insert_share(&self, document_id: Uuid, req: CreateShareRequest) -> Result<ShareLink> {
        self.check("insert_share", req.share_id.as_str())?;
        let user = self.user().await?;
        req.validate()?;
        let password_hash = req.password().map(hash_password).transpose()?;
        let settings = self
            .repos
            .shares
            .insert(
                user.id,
                NewShareSettings {
                    document_id,
                    share_id: req.share_id.clone(),
                    is_public: req.is_public,
                    password_hash,
                    expiry_date: req.expiry_date,
                },
            )
            .await?;
        let url = format!(
            "{}/{}/{}",
            self.public_url,
            defaults::SHARE_PATH_SEGMENT,
            settings.share_id
        );
        Ok(ShareLink::new(settings, url))
    }

    async fn resolve_share(
        &self,
        token: &str,
        password: Option<&str>,
    ) -> Result<ShareResolution> {
        self.check("resolve_share", token)?;
        resolve_share(
            self.repos.shares.as_ref(),
            self.repos.documents.as_ref(),
            token,
            password,
            Utc::now(),
        )
        .await
    }

    async fn subscribe_to_changes(&self, tables: &[Table]) -> Result<ChangeStream> {
        let names: Vec<&str> = tables.iter().map(Table::as_str).collect();
        self.check("subscribe_to_changes", names.join(","))?;
        let user = self.user().await?;
        let tables = tables.to_vec();

        let stream = BroadcastStream::new(self.bus.subscribe()).filter_map(move |item| {
            let visible = match item {
                Ok(envelope) if envelope.is_visible_to(user.id, &tables) => Some(envelope),
                _ => None,
            };
            futures::future::ready(visible)
        });
        Ok(stream.boxed())
    }
}
