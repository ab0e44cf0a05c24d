use serde::{Deserialize, Serialize};

use crate::coord::CellPosition;

/// What the user is currently doing in the grid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum EditMode {
    /// Not editing, just viewing the grid
    #[default]
    Viewing,
    /// Editing a single cell
    Editing {
        position: CellPosition,
        content: String,
    },
}

impl EditMode {
    pub fn is_viewing(&self) -> bool {
        matches!(self, EditMode::Viewing)
    }

    pub fn is_editing(&self) -> bool {
        !self.is_viewing()
    }

    pub fn get_position(&self) -> Option<CellPosition> {
        match self {
            EditMode::Viewing => None,
            EditMode::Editing { position, .. } => Some(*position),
        }
    }
}

/// Per-cell lifecycle as seen by the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellStatus {
    Viewing,
    Editing,
    /// An optimistic value is shown while the remote store confirms it
    SyncPending,
}

/// Tracks the single cell being edited
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EditState {
    mode: EditMode,
    /// Content before editing started, handed back by `cancel`
    original_content: Option<String>,
}

impl EditState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_edit(&mut self, position: CellPosition, initial_content: String) {
        self.original_content = Some(initial_content.clone());
        self.mode = EditMode::Editing {
            position,
            content: initial_content,
        };
    }

    /// Replace the content being edited
    pub fn update_value(&mut self, new_content: String) -> Result<(), String> {
        match &mut self.mode {
            EditMode::Viewing => Err("Cannot update value while in viewing mode".to_string()),
            EditMode::Editing { content, .. } => {
                *content = new_content;
                Ok(())
            }
        }
    }

    /// Leave edit mode, returning the position and final content
    pub fn commit(&mut self) -> Option<(CellPosition, String)> {
        match std::mem::take(&mut self.mode) {
            EditMode::Viewing => None,
            EditMode::Editing { position, content } => {
                self.original_content = None;
                Some((position, content))
            }
        }
    }

    /// Leave edit mode, returning the original content
    pub fn cancel(&mut self) -> Option<String> {
        if self.mode.is_editing() {
            self.mode = EditMode::Viewing;
            self.original_content.take()
        } else {
            None
        }
    }

    pub fn is_editing(&self) -> bool {
        self.mode.is_editing()
    }

    pub fn mode(&self) -> &EditMode {
        &self.mode
    }

    pub fn editing_position(&self) -> Option<CellPosition> {
        self.mode.get_position()
    }
}
