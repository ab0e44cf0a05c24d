pub mod classify;
pub mod coord;
pub mod document;
pub mod edit;
pub mod error;
pub mod selection;

pub use classify::{classify, is_phone_number, CellAction, CellIntent};
pub use coord::{col_to_label, CellPosition};
pub use document::{GridDocument, MAX_COLS, MAX_ROWS};
pub use edit::{CellStatus, EditMode, EditState};
pub use error::{EditError, StoreError};
pub use selection::{DeleteConfirmation, SelectionSet};
