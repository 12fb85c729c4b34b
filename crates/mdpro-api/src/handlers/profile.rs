//! Own-profile endpoints.

use axum::{extract::State, Json};

use mdpro_core::{UpdateProfileRequest, UserProfile};

use crate::{auth::RequireAuth, ApiError, AppState};

/// Get the caller's profile.
///
/// # Returns
/// - 200 OK: the profile
/// - 401 Unauthorized: no valid session
pub async fn get_profile(
    State(state): State<AppState>,
    auth: RequireAuth,
) -> Result<Json<UserProfile>, ApiError> {
    let profile = state.repos.profiles.get(auth.user.id).await?;
    Ok(Json(profile))
}

/// Update the caller's full name. A blank name clears it.
///
/// # Returns
/// - 200 OK: the updated profile
/// - 401 Unauthorized: no valid session
pub async fn update_profile(
    State(state): State<AppState>,
    auth: RequireAuth,
    Json(mut body): Json<UpdateProfileRequest>,
) -> Result<Json<UserProfile>, ApiError> {
    body.full_name = body
        .full_name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    let profile = state.repos.profiles.update(auth.user.id, body).await?;
    tracing::info!(user_id = %auth.user.id, "Profile updated");
    Ok(Json(profile))
}
