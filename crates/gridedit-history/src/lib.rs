pub mod operation;
pub mod stack;

pub use operation::EditOperation;
pub use stack::{UndoStack, DEFAULT_UNDO_DEPTH};
