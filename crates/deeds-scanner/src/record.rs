//! Deed record and raw row types.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Number of `<td>` cells in one results-grid row.
pub const ROW_CELL_COUNT: usize = 8;

/// One normalized registry entry.
///
/// `date`, `doc_type`, `doc_num` and `city` always come from the row;
/// optional fields are `None` rather than empty strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeedRecord {
    /// Recording date.
    pub date: NaiveDate,
    /// Document type as shown in the grid, e.g. `DEED`.
    #[serde(rename = "type")]
    pub doc_type: String,
    /// Registry book, if the entry was bound into one.
    pub book: Option<String>,
    /// Page within `book`.
    pub page_num: Option<String>,
    /// Registry document number.
    pub doc_num: String,
    /// Town of the property.
    pub city: String,
    /// Lot, sub-plan and remark text from the description cell.
    pub description: Option<String>,
    /// Consideration paid, from a trailing `$N.NN`.
    pub cost: Option<f64>,
    /// Property address from the description cell.
    pub street_address: Option<String>,
    /// Not published by the registry grid.
    pub state: Option<String>,
    /// Not published by the registry grid.
    pub zip: Option<String>,
}

/// Raw text of the eight cells of one grid row, in column order.
///
/// Column 0 holds the document image link and is not used.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowCells {
    cells: [String; ROW_CELL_COUNT],
}

impl RowCells {
    /// Wrap the cells of one row.
    #[must_use]
    pub fn new(cells: [String; ROW_CELL_COUNT]) -> Self {
        Self { cells }
    }

    /// Build from `(date, type, book, page, doc_num, city, description)`,
    /// leaving the image column empty.
    #[must_use]
    pub fn from_columns(columns: [&str; ROW_CELL_COUNT - 1]) -> Self {
        let mut cells: [String; ROW_CELL_COUNT] = Default::default();
        for (slot, value) in cells.iter_mut().skip(1).zip(columns) {
            *slot = value.to_string();
        }
        Self { cells }
    }

    /// Recording date, `MM/DD/YYYY`.
    pub fn date(&self) -> &str {
        &self.cells[1]
    }

    /// Document type.
    pub fn doc_type(&self) -> &str {
        &self.cells[2]
    }

    /// Book number.
    pub fn book(&self) -> &str {
        &self.cells[3]
    }

    /// Page number within the book.
    pub fn page_num(&self) -> &str {
        &self.cells[4]
    }

    /// Document number.
    pub fn doc_num(&self) -> &str {
        &self.cells[5]
    }

    /// Town of the property.
    pub fn city(&self) -> &str {
        &self.cells[6]
    }

    /// Free-text description cell.
    pub fn description(&self) -> &str {
        &self.cells[7]
    }

    /// All cells in column order.
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.cells
    }
}
