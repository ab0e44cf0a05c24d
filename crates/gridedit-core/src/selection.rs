use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::EditError;

/// Column indices marked for batch deletion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionSet {
    columns: BTreeSet<usize>,
}

/// Explicit confirmation of a pending column deletion.
///
/// Holds the selected indices (highest first) as they were when the user
/// confirmed, so a selection that changes afterwards can be detected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteConfirmation {
    indices: Vec<usize>,
}

impl DeleteConfirmation {
    /// Indices to delete, highest first
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the column if absent, remove it if present. Returns whether it is
    /// selected afterwards.
    pub fn toggle(&mut self, col: usize) -> bool {
        if self.columns.remove(&col) {
            false
        } else {
            self.columns.insert(col);
            true
        }
    }

    pub fn contains(&self, col: usize) -> bool {
        self.columns.contains(&col)
    }

    pub fn remove(&mut self, col: usize) -> bool {
        self.columns.remove(&col)
    }

    pub fn clear(&mut self) {
        self.columns.clear();
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Selected columns, highest first
    pub fn descending(&self) -> Vec<usize> {
        self.columns.iter().rev().copied().collect()
    }

    /// Confirm the pending deletion. An empty selection cannot be confirmed.
    pub fn confirm_delete(&self) -> Result<DeleteConfirmation, EditError> {
        if self.is_empty() {
            return Err(EditError::Validation(
                "no columns selected for deletion".to_string(),
            ));
        }
        Ok(DeleteConfirmation {
            indices: self.descending(),
        })
    }

    /// Whether a confirmation still describes the current selection
    pub fn matches(&self, confirmation: &DeleteConfirmation) -> bool {
        confirmation.indices == self.descending()
    }
}
