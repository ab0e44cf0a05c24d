use gridedit_core::{CellPosition, GridDocument};
use serde::{Deserialize, Serialize};

/// A mutation applied to a grid document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EditOperation {
    UpdateCell {
        row: usize,
        col: usize,
        old_value: String,
        new_value: String,
    },
    AddRow,
    AddColumn,
    DeleteColumns { indices: Vec<usize> },
}

impl EditOperation {
    pub fn update_cell(
        row: usize,
        col: usize,
        old_value: impl Into<String>,
        new_value: impl Into<String>,
    ) -> Self {
        EditOperation::UpdateCell {
            row,
            col,
            old_value: old_value.into(),
            new_value: new_value.into(),
        }
    }

    /// Only single-cell updates can be reversed
    pub fn is_reversible(&self) -> bool {
        matches!(self, EditOperation::UpdateCell { .. })
    }

    /// Whether this operation moves existing cells to new coordinates
    pub fn shifts_coordinates(&self) -> bool {
        matches!(self, EditOperation::DeleteColumns { .. })
    }

    /// Apply the operation to a document
    pub fn apply(&self, doc: &mut GridDocument) {
        match self {
            EditOperation::UpdateCell {
                row, col, new_value, ..
            } => doc.set_cell(*row, *col, new_value.clone()),
            EditOperation::AddRow => doc.add_row(),
            EditOperation::AddColumn => doc.add_column(),
            EditOperation::DeleteColumns { indices } => doc.remove_columns(indices),
        }
    }

    /// Reverse the operation, returning the affected cell
    pub fn revert(&self, doc: &mut GridDocument) -> Option<CellPosition> {
        match self {
            EditOperation::UpdateCell {
                row, col, old_value, ..
            } => {
                doc.set_cell(*row, *col, old_value.clone());
                Some(CellPosition::new(*row, *col))
            }
            _ => None,
        }
    }

    /// Description for UI display
    pub fn description(&self) -> &'static str {
        match self {
            EditOperation::UpdateCell { .. } => "Edit cell",
            EditOperation::AddRow => "Add row",
            EditOperation::AddColumn => "Add column",
            EditOperation::DeleteColumns { .. } => "Delete columns",
        }
    }
}
