//! Utilities for Excel-style cell references.

use std::fmt;
use std::str::FromStr;

use crate::error::{ReportError, Result};

/// Largest column index a worksheet accepts (`XFD`).
pub const MAX_COL: u32 = 16_383;
/// Largest 1-based row number a worksheet accepts.
pub const MAX_ROW: u32 = 1_048_576;

/// A single cell position. Both coordinates are 0-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellAddress {
    pub row: u32,
    pub col: u32,
}

impl CellAddress {
    pub const fn new(col: u32, row: u32) -> Self {
        Self { row, col }
    }

    /// Build an address from a column label and a 1-based row number,
    /// the way addresses are written in a workbook (`"AB"`, `22`).
    pub fn from_excel(column: &str, row: u32) -> Result<Self> {
        let col = column_index(column)?;
        if row == 0 || row > MAX_ROW {
            return Err(ReportError::CellRef(format!("{column}{row}")));
        }
        Ok(Self::new(col, row - 1))
    }

    /// Parse a reference like `"E11"` or `"$B$4"`.
    pub fn parse(cell_ref: &str) -> Result<Self> {
        let (col, row) =
            parse_cell_ref(cell_ref).ok_or_else(|| ReportError::CellRef(cell_ref.to_string()))?;
        if col > MAX_COL || row >= MAX_ROW {
            return Err(ReportError::CellRef(cell_ref.to_string()));
        }
        Ok(Self::new(col, row))
    }

    /// The 1-based row number as shown in a spreadsheet.
    pub const fn excel_row(self) -> u32 {
        self.row + 1
    }

    /// Same row, `offset` columns to the right.
    pub fn right(self, offset: u32) -> Result<Self> {
        let col = self
            .col
            .checked_add(offset)
            .filter(|c| *c <= MAX_COL)
            .ok_or_else(|| ReportError::CellRef(format!("{self} + {offset} columns")))?;
        Ok(Self::new(col, self.row))
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", col_to_letter(self.col), self.excel_row())
    }
}

impl FromStr for CellAddress {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Convert a 0-indexed column to its letter label (0 -> `A`, 26 -> `AA`).
pub fn col_to_letter(col: u32) -> String {
    let mut result = String::new();
    let mut n = col + 1;
    while n > 0 {
        n -= 1;
        let c = u8::try_from(n % 26).map_or('A', |d| char::from(b'A' + d));
        result.insert(0, c);
        n /= 26;
    }
    result
}

/// Convert a column label (`"A"`, `"ay"`, `"$N"`) to a 0-indexed column.
pub fn column_index(label: &str) -> Result<u32> {
    let label = label.trim().trim_start_matches('$');
    if label.is_empty() || !label.bytes().all(|b| b.is_ascii_alphabetic()) {
        return Err(ReportError::CellRef(label.to_string()));
    }
    let mut col: u32 = 0;
    for b in label.bytes() {
        let digit = u32::from(b.to_ascii_uppercase() - b'A') + 1;
        col = col
            .checked_mul(26)
            .and_then(|c| c.checked_add(digit))
            .filter(|c| *c <= MAX_COL + 1)
            .ok_or_else(|| ReportError::CellRef(label.to_string()))?;
    }
    Ok(col - 1)
}

/// Parse a cell reference like "A1" into (col, row) where col and row are 0-indexed.
pub fn parse_cell_ref(cell_ref: &str) -> Option<(u32, u32)> {
    parse_cell_ref_bytes(cell_ref.trim().as_bytes())
}

/// Parse a cell reference from raw bytes (ASCII) into (col, row) where col and row are 0-indexed.
///
/// This is the bytes equivalent of [`parse_cell_ref`] for use when working with
/// raw XML attribute values (e.g., `attr.value` from quick-xml).
pub fn parse_cell_ref_bytes(ref_bytes: &[u8]) -> Option<(u32, u32)> {
    let mut col: u32 = 0;
    let mut row: u32 = 0;
    let mut saw_col = false;
    let mut saw_row = false;

    for &b in ref_bytes {
        if b == b'$' {
            continue;
        }
        if b.is_ascii_alphabetic() {
            if saw_row {
                return None;
            }
            let upper = b.to_ascii_uppercase();
            col = col.checked_mul(26)?.checked_add(u32::from(upper - b'A') + 1)?;
            saw_col = true;
        } else if b.is_ascii_digit() {
            row = row.checked_mul(10)?.checked_add(u32::from(b - b'0'))?;
            saw_row = true;
        } else {
            return None;
        }
    }

    if !saw_col || !saw_row || row == 0 {
        return None;
    }

    Some((col - 1, row - 1))
}
