//! Session tokens and the authentication extractor.
//!
//! Access tokens are opaque random strings (`mdp_at_` + 64 hex chars). Only
//! their SHA-256 digest is stored, so a leaked sessions table cannot be
//! replayed. Recovery tokens (`mdp_rt_`) follow the same scheme.

use axum::{
    extract::{FromRequestParts, Query},
    http::{header, request::Parts},
};
use rand::RngCore;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use mdpro_core::{defaults, Session, UserIdentity};

use crate::{ApiError, AppState};

/// Generate a cryptographically random token with the given prefix.
pub fn generate_secret(prefix: &str) -> String {
    let mut bytes = [0u8; defaults::TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{}{}", prefix, hex::encode(bytes))
}

/// Hash a token using SHA-256.
pub fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Create and persist a new session for `user`.
pub async fn issue_session(
    state: &AppState,
    user: UserIdentity,
    recovery: bool,
) -> Result<Session, ApiError> {
    let access_token = generate_secret(defaults::ACCESS_TOKEN_PREFIX);
    let expires_at = chrono::Utc::now() + state.config.session_ttl();
    state
        .repos
        .accounts
        .create_session(user.id, &hash_secret(&access_token), expires_at, recovery)
        .await?;

    tracing::info!(user_id = %user.id, recovery, "Session issued");
    Ok(Session {
        access_token,
        user,
        expires_at,
        recovery,
    })
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    access_token: Option<String>,
}

/// Bearer token from the `Authorization` header, or the `access_token` query
/// parameter for WebSocket and SSE clients that cannot set headers.
fn presented_token(parts: &Parts) -> Option<String> {
    let from_header = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string());

    from_header.or_else(|| {
        Query::<TokenQuery>::try_from_uri(&parts.uri)
            .ok()
            .and_then(|Query(q)| q.access_token)
    })
}

/// Look up the session behind the presented token.
async fn authenticate(parts: &Parts, state: &AppState) -> Result<RequireSession, ApiError> {
    let token = presented_token(parts)
        .filter(|t| t.starts_with(defaults::ACCESS_TOKEN_PREFIX))
        .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))?;

    let token_hash = hash_secret(&token);
    let record = state
        .repos
        .accounts
        .find_session(&token_hash)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Session expired or invalid".to_string()))?;

    Ok(RequireSession {
        user: record.user,
        token_hash,
        recovery: record.recovery,
    })
}

/// Extractor that accepts any valid session, including recovery sessions.
///
/// Only the account endpoints a recovering user needs take this one.
#[derive(Debug, Clone)]
pub struct RequireSession {
    pub user: UserIdentity,
    /// Digest of the presented token, for sign-out.
    pub token_hash: String,
    /// Session was opened from a recovery link.
    pub recovery: bool,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for RequireSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        authenticate(parts, state).await
    }
}

/// Extractor that requires a regular session.
///
/// Recovery sessions are refused with 403 until a new password is set.
///
/// Usage:
/// ```ignore
/// async fn my_handler(auth: RequireAuth) -> impl IntoResponse {
///     let documents = state.repos.documents.list(auth.user.id).await?;
///     // ...
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RequireAuth {
    pub user: UserIdentity,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = authenticate(parts, state).await?;
        if session.recovery {
            return Err(ApiError::Forbidden(
                "Set a new password before using this session".to_string(),
            ));
        }
        Ok(RequireAuth { user: session.user })
    }
}
