//! Category endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use tracing::instrument;
use uuid::Uuid;

use mdpro_core::{
    validate_category_name, Category, ChangeEvent, ChangeKind, CreateCategoryRequest,
    RenameCategoryRequest,
};

use crate::{auth::RequireAuth, ApiError, AppState};

/// List the caller's categories ordered by path.
#[instrument(skip(state, auth), fields(subsystem = "api", component = "categories", op = "list"))]
pub async fn list_categories(
    State(state): State<AppState>,
    auth: RequireAuth,
) -> Result<Json<Vec<Category>>, ApiError> {
    let categories = state.repos.categories.list(auth.user.id).await?;
    tracing::debug!(result_count = categories.len(), "Categories listed");
    Ok(Json(categories))
}

/// Create a category, optionally under a parent owned by the caller.
///
/// # Returns
/// - 201 Created: the new category with its materialized path
/// - 400 Bad Request: blank name, name containing `/`, or name too long
/// - 404 Not Found: parent missing or owned by someone else
pub async fn create_category(
    State(state): State<AppState>,
    auth: RequireAuth,
    Json(mut body): Json<CreateCategoryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    body.name = body.name.trim().to_string();
    body.validate()?;
    let category = state.repos.categories.insert(auth.user.id, body).await?;
    state.event_bus.emit(ChangeEvent::category(
        ChangeKind::Insert,
        category.id,
        auth.user.id,
    ));
    tracing::info!(category_id = %category.id, path = %category.path, "Category created");
    Ok((StatusCode::CREATED, Json(category)))
}

/// Rename a category. Paths of the whole subtree are rewritten.
///
/// # Returns
/// - 200 OK: the renamed category
/// - 400 Bad Request: invalid name
/// - 404 Not Found: missing or owned by someone else
pub async fn rename_category(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(id): Path<Uuid>,
    Json(body): Json<RenameCategoryRequest>,
) -> Result<Json<Category>, ApiError> {
    let name = body.name.trim();
    validate_category_name(name)?;
    let category = state.repos.categories.rename(auth.user.id, id, name).await?;
    state
        .event_bus
        .emit(ChangeEvent::category(ChangeKind::Update, id, auth.user.id));
    tracing::info!(category_id = %id, path = %category.path, "Category renamed");
    Ok(Json(category))
}

/// Delete a category. Its documents move to the root and its child
/// categories become roots.
///
/// # Returns
/// - 204 No Content
/// - 404 Not Found: missing or owned by someone else
pub async fn delete_category(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.repos.categories.delete(auth.user.id, id).await?;
    state
        .event_bus
        .emit(ChangeEvent::category(ChangeKind::Delete, id, auth.user.id));
    tracing::info!(category_id = %id, "Category deleted");
    Ok(StatusCode::NO_CONTENT)
}
