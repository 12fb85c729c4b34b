//! Document CRUD endpoints.
//!
//! All queries are scoped to the signed-in owner: another user's document is
//! indistinguishable from a missing one (404).

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use tracing::instrument;
use uuid::Uuid;

use mdpro_core::{
    ChangeEvent, ChangeKind, CreateDocumentRequest, Document, MoveDocumentRequest,
    UpdateDocumentRequest,
};

use crate::{auth::RequireAuth, ApiError, AppState};

/// List the caller's documents, most recently updated first.
///
/// # Returns
/// - 200 OK: array of documents
/// - 401 Unauthorized: no valid session
/// - 403 Forbidden: recovery session without a new password yet
#[instrument(skip(state, auth), fields(subsystem = "api", component = "documents", op = "list"))]
pub async fn list_documents(
    State(state): State<AppState>,
    auth: RequireAuth,
) -> Result<Json<Vec<Document>>, ApiError> {
    let documents = state.repos.documents.list(auth.user.id).await?;
    tracing::debug!(result_count = documents.len(), "Documents listed");
    Ok(Json(documents))
}

/// Create a document.
///
/// # Returns
/// - 201 Created: the new document
/// - 400 Bad Request: title too long
/// - 401 Unauthorized: no valid session
/// - 404 Not Found: category missing or owned by someone else
pub async fn create_document(
    State(state): State<AppState>,
    auth: RequireAuth,
    Json(body): Json<CreateDocumentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    body.validate()?;
    let document = state.repos.documents.insert(auth.user.id, body).await?;
    state.event_bus.emit(ChangeEvent::document(
        ChangeKind::Insert,
        document.id,
        auth.user.id,
    ));
    tracing::info!(document_id = %document.id, user_id = %auth.user.id, "Document created");
    Ok((StatusCode::CREATED, Json(document)))
}

/// Get one document.
///
/// # Returns
/// - 200 OK: the document
/// - 404 Not Found: missing or owned by someone else
pub async fn get_document(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(id): Path<Uuid>,
) -> Result<Json<Document>, ApiError> {
    let document = state.repos.documents.fetch(auth.user.id, id).await?;
    Ok(Json(document))
}

/// Update title, content and/or visibility. Absent fields are left as they are;
/// an empty content string is stored as empty.
///
/// # Returns
/// - 200 OK: the updated document
/// - 400 Bad Request: no fields, or title too long
/// - 404 Not Found: missing or owned by someone else
pub async fn update_document(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateDocumentRequest>,
) -> Result<Json<Document>, ApiError> {
    if body.is_empty() {
        return Err(ApiError::BadRequest("no fields to update".to_string()));
    }
    body.validate()?;
    let document = state.repos.documents.update(auth.user.id, id, body).await?;
    state
        .event_bus
        .emit(ChangeEvent::document(ChangeKind::Update, id, auth.user.id));
    tracing::debug!(document_id = %id, "Document updated");
    Ok(Json(document))
}

/// Move a document into a category, or to the root with `null`.
///
/// # Returns
/// - 200 OK: the updated document
/// - 404 Not Found: document or category missing
pub async fn move_document(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(id): Path<Uuid>,
    Json(body): Json<MoveDocumentRequest>,
) -> Result<Json<Document>, ApiError> {
    let document = state
        .repos
        .documents
        .set_category(auth.user.id, id, body.category_id)
        .await?;
    state
        .event_bus
        .emit(ChangeEvent::document(ChangeKind::Update, id, auth.user.id));
    tracing::info!(
        document_id = %id,
        category_id = ?body.category_id,
        "Document moved"
    );
    Ok(Json(document))
}

/// Delete a document and its share links.
///
/// # Returns
/// - 204 No Content
/// - 404 Not Found: missing or owned by someone else
pub async fn delete_document(
    State(state): State<AppState>,
    auth: RequireAuth,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.repos.documents.delete(auth.user.id, id).await?;
    state
        .event_bus
        .emit(ChangeEvent::document(ChangeKind::Delete, id, auth.user.id));
    tracing::info!(document_id = %id, "Document deleted");
    Ok(StatusCode::NO_CONTENT)
}
