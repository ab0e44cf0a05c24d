use std::collections::VecDeque;

use gridedit_core::GridDocument;

use crate::operation::EditOperation;

/// Default maximum number of undo levels
pub const DEFAULT_UNDO_DEPTH: usize = 100;

/// Bounded LIFO of reversible cell edits.
///
/// Structural operations are never undone. Deleting columns invalidates
/// every recorded coordinate, so recording one drops the whole history.
pub struct UndoStack {
    entries: VecDeque<EditOperation>,
    /// Maximum number of undo levels
    max_size: usize,
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::new(DEFAULT_UNDO_DEPTH)
    }
}

impl UndoStack {
    /// Create an undo stack holding at most `max_size` entries
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(max_size.min(DEFAULT_UNDO_DEPTH)),
            max_size,
        }
    }

    /// Record an operation that has already been applied
    pub fn record(&mut self, op: EditOperation) {
        if op.shifts_coordinates() {
            self.entries.clear();
            return;
        }
        if !op.is_reversible() || self.max_size == 0 {
            return;
        }

        self.entries.push_back(op);

        while self.entries.len() > self.max_size {
            self.entries.pop_front();
        }
    }

    /// Undo the last entry against `doc`
    pub fn undo(&mut self, doc: &mut GridDocument) -> Option<EditOperation> {
        let op = self.entries.pop_back()?;
        op.revert(doc);
        Some(op)
    }

    pub fn can_undo(&self) -> bool {
        !self.entries.is_empty()
    }

    /// Description of the entry that would be undone
    pub fn undo_description(&self) -> Option<&str> {
        self.entries.back().map(|op| op.description())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl std::fmt::Debug for UndoStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UndoStack")
            .field("undo_count", &self.entries.len())
            .field("max_size", &self.max_size)
            .finish()
    }
}
