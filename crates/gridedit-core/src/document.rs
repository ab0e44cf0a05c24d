use serde::{Deserialize, Serialize};

use crate::coord::{col_to_label, CellPosition};

/// Maximum number of rows (Excel compatibility)
pub const MAX_ROWS: usize = 1_048_576;
/// Maximum number of columns (Column XFD)
pub const MAX_COLS: usize = 16_384;

/// In-memory tabular model of string cells.
///
/// Rows may be ragged physically; every read pads them to `max_cols` with
/// blank cells so callers always see a rectangular grid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Vec<String>>", into = "Vec<Vec<String>>")]
pub struct GridDocument {
    rows: Vec<Vec<String>>,
    max_cols: usize,
}

impl From<Vec<Vec<String>>> for GridDocument {
    fn from(rows: Vec<Vec<String>>) -> Self {
        let mut doc = GridDocument::new();
        doc.load(rows);
        doc
    }
}

impl From<GridDocument> for Vec<Vec<String>> {
    fn from(doc: GridDocument) -> Self {
        doc.rows
    }
}

impl GridDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole contents with a fresh snapshot
    pub fn load(&mut self, rows: Vec<Vec<String>>) {
        self.rows = rows;
        self.recompute_max_cols();
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Width of the longest row
    pub fn max_cols(&self) -> usize {
        self.max_cols
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Physical rows, without padding
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Read a cell; anything out of bounds is blank
    pub fn get_cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn get(&self, pos: CellPosition) -> &str {
        self.get_cell(pos.row, pos.col)
    }

    /// Whether a cell address lies inside the grid limits
    pub fn within_limits(row: usize, col: usize) -> bool {
        row < MAX_ROWS && col < MAX_COLS
    }

    /// Write a cell, growing the document as needed.
    ///
    /// Addresses are expected to pass [`GridDocument::within_limits`].
    pub fn set_cell(&mut self, row: usize, col: usize, value: impl Into<String>) {
        if row >= self.rows.len() {
            self.rows.resize_with(row + 1, Vec::new);
        }

        let cells = &mut self.rows[row];
        if col >= cells.len() {
            cells.resize_with(col + 1, String::new);
        }
        cells[col] = value.into();

        self.max_cols = self.max_cols.max(col + 1);
    }

    pub fn set(&mut self, pos: CellPosition, value: impl Into<String>) {
        self.set_cell(pos.row, pos.col, value);
    }

    /// A row padded to `max_cols`
    pub fn padded_row(&self, row: usize) -> Vec<String> {
        (0..self.max_cols)
            .map(|col| self.get_cell(row, col).to_string())
            .collect()
    }

    /// Append a blank row as wide as the widest row
    pub fn add_row(&mut self) {
        let width = self.max_cols.max(1);
        self.rows.push(vec![String::new(); width]);
        self.max_cols = width;
    }

    /// Append a blank column to every row
    pub fn add_column(&mut self) {
        if self.rows.is_empty() {
            self.rows.push(vec![String::new()]);
            self.max_cols = 1;
            return;
        }

        let width = self.max_cols + 1;
        for row in &mut self.rows {
            row.resize_with(width, String::new);
        }
        self.max_cols = width;
    }

    /// Remove columns by index. Indices are applied highest first so that
    /// earlier removals never shift the positions of later ones.
    pub fn remove_columns(&mut self, indices: &[usize]) {
        let mut sorted: Vec<usize> = indices.to_vec();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        sorted.dedup();

        for col in sorted {
            for row in &mut self.rows {
                if col < row.len() {
                    row.remove(col);
                }
            }
        }

        self.recompute_max_cols();
    }

    /// Header label per column: the row-0 value, or the column letter when
    /// that value is blank
    pub fn column_headers(&self) -> Vec<String> {
        (0..self.max_cols)
            .map(|col| {
                let header = self.get_cell(0, col).trim();
                if header.is_empty() {
                    col_to_label(col)
                } else {
                    header.to_string()
                }
            })
            .collect()
    }

    fn recompute_max_cols(&mut self) {
        self.max_cols = self.rows.iter().map(Vec::len).max().unwrap_or(0);
    }
}
