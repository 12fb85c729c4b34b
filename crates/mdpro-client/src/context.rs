//! Signed-in user context.
//!
//! [`UserContext`] owns the session and profile for the lifetime of the
//! editor. It is created with [`UserContext::init`], follows auth-state
//! changes from the backend in a background task, and stops following them on
//! [`UserContext::dispose`] or drop.

use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use mdpro_core::{validate_password, Error, Result, Session, UpdateProfileRequest, UserProfile};

use crate::backend::{AuthEvent, Backend};
use crate::notify::{Notification, Notifier};

#[derive(Debug, Clone, Default)]
struct ContextState {
    session: Option<Session>,
    profile: Option<UserProfile>,
    recovery_pending: bool,
}

pub struct UserContext {
    backend: Arc<dyn Backend>,
    notifier: Arc<dyn Notifier>,
    state: Arc<RwLock<ContextState>>,
    listener: Option<JoinHandle<()>>,
}

async fn load_profile(backend: &dyn Backend) -> Option<UserProfile> {
    match backend.get_profile().await {
        Ok(profile) => Some(profile),
        Err(e) => {
            warn!(
                subsystem = "client",
                component = "context",
                error = %e,
                "Failed to load profile"
            );
            None
        }
    }
}

async fn apply_event(backend: &dyn Backend, state: &RwLock<ContextState>, event: AuthEvent) {
    match event {
        AuthEvent::SignedIn(session) => {
            let profile = load_profile(backend).await;
            let mut state = state.write().await;
            state.session = Some(session);
            state.profile = profile;
            state.recovery_pending = false;
        }
        AuthEvent::PasswordRecovery(session) => {
            let profile = load_profile(backend).await;
            let mut state = state.write().await;
            state.session = Some(session);
            state.profile = profile;
            state.recovery_pending = true;
        }
        AuthEvent::SignedOut => {
            *state.write().await = ContextState::default();
        }
        AuthEvent::UserUpdated => {
            if let Some(profile) = load_profile(backend).await {
                state.write().await.profile = Some(profile);
            }
        }
    }
}

impl UserContext {
    /// Load the current session and profile, then start following auth changes.
    pub async fn init(backend: Arc<dyn Backend>, notifier: Arc<dyn Notifier>) -> Self {
        // Subscribe before reading so no change between the two is missed.
        let mut events = backend.auth_events();

        let session = backend.session().await;
        let profile = match &session {
            Some(_) => load_profile(backend.as_ref()).await,
            None => None,
        };
        let recovery_pending = session.as_ref().is_some_and(|s| s.recovery);
        let state = Arc::new(RwLock::new(ContextState {
            session,
            profile,
            recovery_pending,
        }));

        let listener = {
            let backend = backend.clone();
            let state = state.clone();
            tokio::spawn(async move {
                loop {
                    match events.recv().await {
                        Ok(event) => {
                            debug!(
                                subsystem = "client",
                                component = "context",
                                event = event.label(),
                                "Auth event"
                            );
                            apply_event(backend.as_ref(), &state, event).await;
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!(subsystem = "client", skipped = n, "Auth listener lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            })
        };

        Self {
            backend,
            notifier,
            state,
            listener: Some(listener),
        }
    }

    pub async fn session(&self) -> Option<Session> {
        self.state.read().await.session.clone()
    }

    pub async fn profile(&self) -> Option<UserProfile> {
        self.state.read().await.profile.clone()
    }

    /// Full name if set, otherwise the e-mail address.
    pub async fn display_name(&self) -> Option<String> {
        let state = self.state.read().await;
        match (&state.profile, &state.session) {
            (Some(profile), _) => Some(profile.display_name().to_string()),
            (None, Some(session)) => Some(session.user.email.clone()),
            (None, None) => None,
        }
    }

    /// A recovery link was redeemed and a new password has not been set yet.
    pub async fn recovery_pending(&self) -> bool {
        self.state.read().await.recovery_pending
    }

    /// Persist the full name, then reload the profile from the backend.
    pub async fn update_profile(&self, full_name: Option<String>) -> Result<UserProfile> {
        let req = UpdateProfileRequest { full_name };
        let result = async {
            self.backend.update_profile(req).await?;
            self.backend.get_profile().await
        }
        .await;

        match result {
            Ok(profile) => {
                self.state.write().await.profile = Some(profile.clone());
                self.notifier.notify(Notification::success("Profile updated"));
                Ok(profile)
            }
            Err(e) => {
                self.notifier.notify(
                    Notification::error("Error updating profile").with_detail(e.to_string()),
                );
                Err(e)
            }
        }
    }

    pub async fn sign_out(&self) -> Result<()> {
        let result = self.backend.sign_out().await;
        *self.state.write().await = ContextState::default();
        result
    }

    /// Set a new password; `confirm` must repeat it.
    pub async fn change_password(&self, password: &str, confirm: &str) -> Result<()> {
        if password != confirm {
            return Err(Error::InvalidInput("Passwords do not match".to_string()));
        }
        validate_password(password)?;

        match self.backend.update_user_password(password).await {
            Ok(()) => {
                self.state.write().await.recovery_pending = false;
                info!(subsystem = "client", op = "change_password", "Password updated");
                self.notifier.notify(Notification::success("Password updated"));
                Ok(())
            }
            Err(e) => {
                self.notifier.notify(
                    Notification::error("Error updating password").with_detail(e.to_string()),
                );
                Err(e)
            }
        }
    }

    /// Stop following auth changes. State is kept as last seen.
    pub fn dispose(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }

    pub fn is_listening(&self) -> bool {
        self.listener.as_ref().is_some_and(|l| !l.is_finished())
    }
}

impl Drop for UserContext {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockBackend;
    use crate::notify::NotificationQueue;
    use std::time::Duration;

    async fn context_for(backend: &MockBackend) -> (UserContext, NotificationQueue) {
        let queue = NotificationQueue::new();
        let ctx = UserContext::init(Arc::new(backend.clone()), Arc::new(queue.clone())).await;
        (ctx, queue)
    }

    #[tokio::test]
    async fn test_init_loads_session_and_profile() {
        let backend = MockBackend::new();
        backend.signed_in("ctx@example.com").await.unwrap();

        let (ctx, _) = context_for(&backend).await;
        assert_eq!(ctx.session().await.unwrap().user.email, "ctx@example.com");
        assert_eq!(ctx.profile().await.unwrap().email, "ctx@example.com");
        assert_eq!(ctx.display_name().await.as_deref(), Some("ctx@example.com"));
        assert!(ctx.is_listening());
    }

    #[tokio::test]
    async fn test_update_profile_refetches() {
        let backend = MockBackend::new();
        backend.signed_in("named@example.com").await.unwrap();
        let (ctx, queue) = context_for(&backend).await;

        let profile = ctx
            .update_profile(Some("Ada Lovelace".to_string()))
            .await
            .unwrap();
        assert_eq!(profile.full_name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(ctx.display_name().await.as_deref(), Some("Ada Lovelace"));
        assert_eq!(backend.call_count("update_profile"), 1);
        assert!(queue.errors().is_empty());
    }

    #[tokio::test]
    async fn test_change_password_mismatch_and_length() {
        let backend = MockBackend::new();
        backend.signed_in("pw@example.com").await.unwrap();
        let (ctx, _) = context_for(&backend).await;

        let err = ctx.change_password("abcdef", "abcdeg").await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid input: Passwords do not match");
        assert!(ctx.change_password("abc", "abc").await.is_err());
        assert_eq!(backend.call_count("update_user_password"), 0);

        ctx.change_password("abcdef", "abcdef").await.unwrap();
        assert_eq!(backend.call_count("update_user_password"), 1);
    }

    #[tokio::test]
    async fn test_recovery_event_marks_pending() {
        let backend = MockBackend::new();
        backend.signed_in("lost@example.com").await.unwrap();
        let (ctx, _) = context_for(&backend).await;
        assert!(!ctx.recovery_pending().await);

        backend.request_recovery("lost@example.com").await.unwrap();
        let token = backend.recovery_token_for("lost@example.com").unwrap();
        backend.verify_recovery(&token).await.unwrap();

        for _ in 0..100 {
            if ctx.recovery_pending().await {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(ctx.recovery_pending().await);

        ctx.change_password("fresh-pass", "fresh-pass").await.unwrap();
        assert!(!ctx.recovery_pending().await);
    }

    #[tokio::test]
    async fn test_reset_password_ends_recovery_for_new_contexts() {
        let backend = MockBackend::new();
        backend.signed_in("reset@example.com").await.unwrap();
        backend.request_recovery("reset@example.com").await.unwrap();
        let token = backend.recovery_token_for("reset@example.com").unwrap();
        assert!(backend.verify_recovery(&token).await.unwrap().recovery);

        backend.update_user_password("brand-new-pass").await.unwrap();
        assert!(!backend.session().await.unwrap().recovery);

        let (ctx, _) = context_for(&backend).await;
        assert!(!ctx.recovery_pending().await);
    }

    #[tokio::test]
    async fn test_sign_out_clears_state() {
        let backend = MockBackend::new();
        backend.signed_in("bye@example.com").await.unwrap();
        let (ctx, _) = context_for(&backend).await;

        ctx.sign_out().await.unwrap();
        assert!(ctx.session().await.is_none());
        assert!(ctx.display_name().await.is_none());
    }

    #[tokio::test]
    async fn test_dispose_stops_listener() {
        let backend = MockBackend::new();
        let (mut ctx, _) = context_for(&backend).await;
        ctx.dispose();
        assert!(!ctx.is_listening());

        backend.signed_in("late@example.com").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(ctx.session().await.is_none());
    }
}
