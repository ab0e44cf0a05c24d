use chrono::{DateTime, Utc};
use gridedit_core::GridDocument;
use serde::Serialize;
use uuid::Uuid;

/// A stored grid document
#[derive(Debug, Clone, Serialize)]
pub struct DocumentRecord {
    pub id: Uuid,
    pub grid: GridDocument,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DocumentRecord {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            grid: GridDocument::from(rows),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
