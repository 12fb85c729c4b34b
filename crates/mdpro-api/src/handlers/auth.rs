//! Account and session endpoints.
//!
//! Passwords are stored as Argon2id PHC strings. Sessions are opaque bearer
//! tokens, see [`crate::auth`].

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use mdpro_core::{
    defaults,
    password::{hash_password, verify_password},
    validate_password, ChangePasswordRequest, Credentials, RecoveryRequest, RecoveryVerifyRequest,
    Session, UserIdentity,
};

use crate::{
    auth::{generate_secret, hash_secret, issue_session, RequireSession},
    ApiError, AppState,
};

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Create an account and sign it in.
///
/// # Returns
/// - 201 Created: a new [`Session`]
/// - 400 Bad Request: malformed e-mail or password shorter than 6 characters
/// - 409 Conflict: an account with this e-mail already exists
pub async fn sign_up(
    State(state): State<AppState>,
    Json(body): Json<Credentials>,
) -> Result<impl IntoResponse, ApiError> {
    body.validate()?;
    let email = body.normalized_email();
    let password_hash = hash_password(&body.password)?;
    let user = state
        .repos
        .accounts
        .create_account(&email, &password_hash)
        .await?;

    tracing::info!(
        subsystem = "auth",
        op = "sign_up",
        user_id = %user.id,
        "Account created"
    );
    let session = issue_session(&state, user, false).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// Sign in with e-mail and password.
///
/// # Returns
/// - 200 OK: a new [`Session`]
/// - 401 Unauthorized: unknown e-mail or wrong password (indistinguishable)
pub async fn sign_in(
    State(state): State<AppState>,
    Json(body): Json<Credentials>,
) -> Result<Json<Session>, ApiError> {
    let email = body.normalized_email();
    let Some(stored) = state.repos.accounts.find_credentials(&email).await? else {
        tracing::debug!(op = "sign_in", "Unknown account");
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    };

    if !verify_password(&body.password, &stored.password_hash)? {
        tracing::warn!(
            op = "sign_in",
            user_id = %stored.user.id,
            "Wrong password"
        );
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    let session = issue_session(&state, stored.user, false).await?;
    Ok(Json(session))
}

/// Revoke the presented session.
///
/// # Returns
/// - 204 No Content
/// - 401 Unauthorized: no valid session
pub async fn sign_out(
    State(state): State<AppState>,
    auth: RequireSession,
) -> Result<StatusCode, ApiError> {
    state.repos.accounts.delete_session(&auth.token_hash).await?;
    tracing::info!(user_id = %auth.user.id, "Signed out");
    Ok(StatusCode::NO_CONTENT)
}

/// Identity behind the presented session.
pub async fn current_user(auth: RequireSession) -> Json<UserIdentity> {
    Json(auth.user)
}

/// Replace the caller's password.
///
/// A recovery session becomes a regular session once this succeeds.
///
/// # Returns
/// - 204 No Content
/// - 400 Bad Request: password shorter than 6 characters
/// - 401 Unauthorized: no valid session
pub async fn update_password(
    State(state): State<AppState>,
    auth: RequireSession,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<StatusCode, ApiError> {
    validate_password(&body.password)?;
    let password_hash = hash_password(&body.password)?;
    state
        .repos
        .accounts
        .set_password_hash(auth.user.id, &password_hash)
        .await?;
    if auth.recovery {
        state.repos.accounts.end_recovery(&auth.token_hash).await?;
    }

    tracing::info!(
        op = "update_password",
        user_id = %auth.user.id,
        recovery = auth.recovery,
        "Password updated"
    );
    Ok(StatusCode::NO_CONTENT)
}

/// Issue a single-use recovery token.
///
/// The response never reveals whether the e-mail is registered. Delivering the
/// token is left to an external mailer; the token is written to the log at
/// `info` level so operators can hand it over.
///
/// # Returns
/// - 202 Accepted
pub async fn request_recovery(
    State(state): State<AppState>,
    Json(body): Json<RecoveryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = body.email.trim().to_lowercase();
    if let Some(stored) = state.repos.accounts.find_credentials(&email).await? {
        let token = generate_secret(defaults::RECOVERY_TOKEN_PREFIX);
        let expires_at =
            chrono::Utc::now() + chrono::Duration::minutes(defaults::RECOVERY_TOKEN_TTL_MINUTES);
        state
            .repos
            .accounts
            .create_recovery_token(stored.user.id, &hash_secret(&token), expires_at)
            .await?;
        tracing::info!(
            subsystem = "auth",
            user_id = %stored.user.id,
            recovery_token = %token,
            expires_at = %expires_at,
            "Recovery token issued"
        );
    } else {
        tracing::debug!("Recovery requested for unknown account");
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "status": "accepted" })),
    ))
}

/// Exchange a recovery token for a recovery session.
///
/// # Returns
/// - 200 OK: a [`Session`] with `recovery: true`
/// - 401 Unauthorized: unknown, used or expired token
pub async fn verify_recovery(
    State(state): State<AppState>,
    Json(body): Json<RecoveryVerifyRequest>,
) -> Result<Json<Session>, ApiError> {
    let token = body.token.trim();
    let user = state
        .repos
        .accounts
        .redeem_recovery_token(&hash_secret(token))
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Recovery link is invalid or expired".to_string()))?;

    let session = issue_session(&state, user, true).await?;
    Ok(Json(session))
}
