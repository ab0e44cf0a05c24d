use std::collections::HashMap;

use gridedit_core::{GridDocument, MAX_COLS, MAX_ROWS};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::DocumentRecord;

/// In-memory store for grid documents
#[derive(Default)]
pub struct DocumentStore {
    documents: RwLock<HashMap<Uuid, DocumentRecord>>,
}

fn not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Document {} not found", id))
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new document
    pub async fn create(&self, rows: Vec<Vec<String>>) -> Result<DocumentRecord, AppError> {
        if rows.len() > MAX_ROWS || rows.iter().any(|r| r.len() > MAX_COLS) {
            return Err(AppError::BadRequest("Document exceeds grid limits".to_string()));
        }

        let record = DocumentRecord::new(rows);
        self.documents
            .write()
            .await
            .insert(record.id, record.clone());
        Ok(record)
    }

    pub async fn get(&self, id: Uuid) -> Result<DocumentRecord, AppError> {
        self.documents
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    /// Run `f` against a document under the write lock
    async fn modify<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut DocumentRecord) -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        let mut docs = self.documents.write().await;
        let record = docs.get_mut(&id).ok_or_else(|| not_found(id))?;
        let result = f(record)?;
        record.touch();
        Ok(result)
    }

    pub async fn update_cell(
        &self,
        id: Uuid,
        row: usize,
        col: usize,
        value: String,
    ) -> Result<(), AppError> {
        if !GridDocument::within_limits(row, col) {
            return Err(AppError::BadRequest(format!(
                "Cell ({}, {}) is outside the grid limits",
                row, col
            )));
        }

        self.modify(id, |record| {
            record.grid.set_cell(row, col, value);
            Ok(())
        })
        .await
    }

    pub async fn delete_column(&self, id: Uuid, col: usize) -> Result<usize, AppError> {
        self.modify(id, |record| {
            if col >= record.grid.max_cols() {
                return Err(AppError::BadRequest(format!(
                    "Column {} does not exist",
                    col
                )));
            }
            record.grid.remove_columns(&[col]);
            Ok(record.grid.max_cols())
        })
        .await
    }

    /// Append a row, returning the new row count
    pub async fn add_row(&self, id: Uuid) -> Result<usize, AppError> {
        self.modify(id, |record| {
            if record.grid.row_count() >= MAX_ROWS {
                return Err(AppError::BadRequest("Row limit reached".to_string()));
            }
            record.grid.add_row();
            Ok(record.grid.row_count())
        })
        .await
    }

    /// Append a column, returning the new column count
    pub async fn add_column(&self, id: Uuid) -> Result<usize, AppError> {
        self.modify(id, |record| {
            if record.grid.max_cols() >= MAX_COLS {
                return Err(AppError::BadRequest("Column limit reached".to_string()));
            }
            record.grid.add_column();
            Ok(record.grid.max_cols())
        })
        .await
    }

    pub async fn remove(&self, id: Uuid) -> Result<(), AppError> {
        self.documents
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found(id))
    }

    /// Get document count
    pub async fn count(&self) -> usize {
        self.documents.read().await.len()
    }
}
