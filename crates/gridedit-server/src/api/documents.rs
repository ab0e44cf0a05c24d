use axum::{
    extract::{Path, State},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::DocumentRecord;
use crate::AppState;

/// Request to create a new document
#[derive(Debug, Deserialize)]
pub struct CreateDocumentRequest {
    #[serde(default)]
    pub rows: Vec<Vec<String>>,
}

/// Request to set a single cell
#[derive(Debug, Deserialize)]
pub struct UpdateCellRequest {
    pub value: String,
}

/// Snapshot of a document
#[derive(Debug, Serialize)]
pub struct DocumentResponse {
    pub id: Uuid,
    pub rows: Vec<Vec<String>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<DocumentRecord> for DocumentResponse {
    fn from(record: DocumentRecord) -> Self {
        Self {
            id: record.id,
            rows: record.grid.into(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// Create a new document
async fn create_document(
    State(state): State<AppState>,
    Json(req): Json<CreateDocumentRequest>,
) -> Result<Json<DocumentResponse>, AppError> {
    let record = state.docs.create(req.rows).await?;
    tracing::info!("Created document {}", record.id);
    Ok(Json(record.into()))
}

/// Fetch a document snapshot
async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DocumentResponse>, AppError> {
    let record = state.docs.get(id).await?;
    Ok(Json(record.into()))
}

/// Delete a document
async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.docs.remove(id).await?;
    Ok(Json(json!({ "deleted": true })))
}

/// Set one cell
async fn update_cell(
    State(state): State<AppState>,
    Path((id, row, col)): Path<(Uuid, usize, usize)>,
    Json(req): Json<UpdateCellRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.docs.update_cell(id, row, col, req.value).await?;
    tracing::debug!("Updated cell ({}, {}) of {}", row, col, id);
    Ok(Json(json!({ "updated": true })))
}

/// Remove one column
async fn delete_column(
    State(state): State<AppState>,
    Path((id, col)): Path<(Uuid, usize)>,
) -> Result<Json<serde_json::Value>, AppError> {
    let columns = state.docs.delete_column(id, col).await?;
    tracing::debug!("Deleted column {} of {}", col, id);
    Ok(Json(json!({ "deleted": true, "columns": columns })))
}

/// Append a row
async fn add_row(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let rows = state.docs.add_row(id).await?;
    Ok(Json(json!({ "rows": rows })))
}

/// Append a column
async fn add_column(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let columns = state.docs.add_column(id).await?;
    Ok(Json(json!({ "columns": columns })))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/documents", post(create_document))
        .route(
            "/api/documents/:id",
            get(get_document).delete(delete_document),
        )
        .route("/api/documents/:id/cells/:row/:col", put(update_cell))
        .route("/api/documents/:id/rows", post(add_row))
        .route("/api/documents/:id/columns", post(add_column))
        .route("/api/documents/:id/columns/:col", delete(delete_column))
}
