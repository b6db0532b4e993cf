//! Cell and range addresses.
//!
//! Rows and columns are 0-based here. A1-style text is 1-based, so `A1`
//! is `(row 0, col 0)`.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub type SheetId = u32;

/// Largest column letter run accepted in A1 text (`XFD` is three letters).
pub const MAX_COLUMN_LETTERS: usize = 3;

/// Convert column letters (`"A"`, `"bc"`) to a 1-based column number.
pub fn column_to_number(letters: &str) -> Option<u32> {
    let bytes = letters.as_bytes();
    if bytes.is_empty() || bytes.len() > MAX_COLUMN_LETTERS {
        return None;
    }
    let mut result = 0u32;
    for &b in bytes {
        if !b.is_ascii_alphabetic() {
            return None;
        }
        result = result * 26 + (b.to_ascii_uppercase() - b'A' + 1) as u32;
    }
    Some(result)
}

/// Convert a 1-based column number to its letters.
pub fn number_to_column(mut num: u32) -> String {
    let mut result = String::with_capacity(MAX_COLUMN_LETTERS);
    while num > 0 {
        num -= 1;
        result.insert(0, ((num % 26) as u8 + b'A') as char);
        num /= 26;
    }
    result
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellAddress {
    pub sheet: SheetId,
    pub row: u32,
    pub col: u32,
}

impl CellAddress {
    pub const fn new(sheet: SheetId, row: u32, col: u32) -> Self {
        Self { sheet, row, col }
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}]{}{}",
            self.sheet,
            number_to_column(self.col + 1),
            self.row + 1
        )
    }
}

/// A rectangular block of cells on one sheet. Corners are always ordered.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RangeRef {
    pub sheet: SheetId,
    pub start_row: u32,
    pub start_col: u32,
    pub end_row: u32,
    pub end_col: u32,
}

impl RangeRef {
    /// Build from any two corners; `B5:A1` becomes `A1:B5`.
    pub fn new(sheet: SheetId, row_a: u32, col_a: u32, row_b: u32, col_b: u32) -> Self {
        Self {
            sheet,
            start_row: row_a.min(row_b),
            start_col: col_a.min(col_b),
            end_row: row_a.max(row_b),
            end_col: col_a.max(col_b),
        }
    }

    pub fn rows(&self) -> u32 {
        self.end_row - self.start_row + 1
    }

    pub fn cols(&self) -> u32 {
        self.end_col - self.start_col + 1
    }

    pub fn area(&self) -> u64 {
        self.rows() as u64 * self.cols() as u64
    }

    pub fn top_left(&self) -> CellAddress {
        CellAddress::new(self.sheet, self.start_row, self.start_col)
    }

    pub fn bottom_right(&self) -> CellAddress {
        CellAddress::new(self.sheet, self.end_row, self.end_col)
    }

    #[inline]
    pub fn contains(&self, cell: &CellAddress) -> bool {
        cell.sheet == self.sheet
            && (self.start_row..=self.end_row).contains(&cell.row)
            && (self.start_col..=self.end_col).contains(&cell.col)
    }

    /// Cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = CellAddress> + '_ {
        (self.start_row..=self.end_row).flat_map(move |row| {
            (self.start_col..=self.end_col).map(move |col| CellAddress::new(self.sheet, row, col))
        })
    }
}

impl fmt::Display for RangeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}]{}{}:{}{}",
            self.sheet,
            number_to_column(self.start_col + 1),
            self.start_row + 1,
            number_to_column(self.end_col + 1),
            self.end_row + 1
        )
    }
}
