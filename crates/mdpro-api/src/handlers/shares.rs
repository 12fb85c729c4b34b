//! Share-link endpoints.
//!
//! Owners create share settings for their documents; anyone holding the token
//! can resolve it. Resolution answers with a `status`-tagged body and a status
//! code per outcome:
//!
//! | status | HTTP |
//! |--------|------|
//! | `document` | 200 |
//! | `needs_password` | 401 |
//! | `wrong_password` | 403 |
//! | `not_found` | 404 |
//! | `expired` | 410 |

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use mdpro_core::{
    password::hash_password, resolve_share, CreateShareRequest, NewShareSettings, ShareLink,
    ShareResolution, UnlockShareRequest,
};

use crate::{auth::RequireAuth, ApiError, AppState};

fn resolution_status(resolution: &ShareResolution) -> StatusCode {
    match resolution {
        ShareResolution::Document(_) => StatusCode::OK,
        ShareResolution::NeedsPassword => StatusCode::UNAUTHORIZED,
        ShareResolution::WrongPassword => StatusCode::FORBIDDEN,
        ShareResolution::NotFound => StatusCode::NOT_FOUND,
        ShareResolution::Expired => StatusCode::GONE,
    }
}

/// Create share settings for one of the caller's documents.
///
/// An empty password means no password. The password is hashed before storage.
///
/// # Returns
/// - 201 Created: the share link
/// - 400 Bad Request: missing token
/// - 404 Not Found: document missing or owned by someone else
/// - 409 Conflict: token already in use
pub async fn create_share(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(document_id): Path<Uuid>,
    Json(body): Json<CreateShareRequest>,
) -> Result<impl IntoResponse, ApiError> {
    body.validate()?;
    let password_hash = body.password().map(hash_password).transpose()?;
    let settings = state
        .repos
        .shares
        .insert(
            auth.user.id,
            NewShareSettings {
                document_id,
                share_id: body.share_id.trim().to_string(),
                is_public: body.is_public,
                password_hash,
                expiry_date: body.expiry_date,
            },
        )
        .await?;

    tracing::info!(
        document_id = %document_id,
        is_public = settings.is_public,
        has_password = settings.has_password(),
        expires = settings.expiry_date.is_some(),
        "Share created"
    );
    let url = state.config.share_url(&settings.share_id);
    Ok((StatusCode::CREATED, Json(ShareLink::new(settings, url))))
}

/// List share links of one of the caller's documents.
///
/// # Returns
/// - 200 OK: array of share links, newest first
/// - 404 Not Found: document missing or owned by someone else
pub async fn list_shares(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(document_id): Path<Uuid>,
) -> Result<Json<Vec<ShareLink>>, ApiError> {
    let shares = state
        .repos
        .shares
        .list_for_document(auth.user.id, document_id)
        .await?;
    let links = shares
        .into_iter()
        .map(|s| {
            let url = state.config.share_url(&s.share_id);
            ShareLink::new(s, url)
        })
        .collect();
    Ok(Json(links))
}

async fn resolve(
    state: &AppState,
    token: &str,
    password: Option<&str>,
) -> Result<(StatusCode, Json<ShareResolution>), ApiError> {
    let resolution = resolve_share(
        state.repos.shares.as_ref(),
        state.repos.documents.as_ref(),
        token,
        password,
        chrono::Utc::now(),
    )
    .await?;
    Ok((resolution_status(&resolution), Json(resolution)))
}

/// Resolve a share token anonymously.
pub async fn get_shared_document(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    resolve(&state, &token, None).await
}

/// Resolve a password-protected share token.
///
/// Runs the same ordered checks as [`get_shared_document`], so an expired
/// share stays expired even with the right password.
pub async fn unlock_shared_document(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(body): Json<UnlockShareRequest>,
) -> Result<impl IntoResponse, ApiError> {
    resolve(&state, &token, Some(&body.password)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdpro_core::SharedDocument;

    #[test]
    fn test_resolution_status_codes() {
        let doc = ShareResolution::Document(SharedDocument {
            title: "t".into(),
            content: "c".into(),
        });
        assert_eq!(resolution_status(&doc), StatusCode::OK);
        assert_eq!(
            resolution_status(&ShareResolution::NeedsPassword),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            resolution_status(&ShareResolution::WrongPassword),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            resolution_status(&ShareResolution::NotFound),
            StatusCode::NOT_FOUND
        );
        assert_eq!(resolution_status(&ShareResolution::Expired), StatusCode::GONE);
    }
}
