//! The spreadsheet document the engine writes into.
//!
//! [`Document`] is the only surface the composer and rewriter touch. Two
//! backends implement it: [`MemoryDocument`], a plain in-memory grid, and
//! [`XlsxDocument`], which patches a template package.

mod memory;
mod xlsx;

use chrono::NaiveDate;
use serde::Serialize;

use crate::cell_ref::CellAddress;
use crate::error::{ReportError, Result};
use crate::formula::same_sheet_name;
use crate::highlight::Highlight;

pub use memory::{MemoryCell, MemoryDocument};
pub use xlsx::{DateSystem, XlsxDocument};

/// A typed cell value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDate),
}

impl CellValue {
    /// Text value; an empty string is [`CellValue::Empty`].
    pub fn text(s: impl Into<String>) -> Self {
        let s = s.into();
        if s.is_empty() {
            Self::Empty
        } else {
            Self::Text(s)
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        Self::text(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

/// A named formula or range, optionally scoped to one worksheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DefinedName {
    pub name: String,
    /// Formula text without a leading `=`.
    pub refers_to: String,
    /// Sheet the name is local to; `None` for workbook scope.
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub hidden: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl DefinedName {
    pub fn workbook(name: impl Into<String>, refers_to: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            refers_to: refers_to.into(),
            scope: None,
            hidden: false,
            comment: None,
        }
    }

    pub fn scoped(
        name: impl Into<String>,
        refers_to: impl Into<String>,
        sheet: impl Into<String>,
    ) -> Self {
        Self {
            scope: Some(sheet.into()),
            ..Self::workbook(name, refers_to)
        }
    }

    /// True when this name is local to `sheet`.
    pub fn is_scoped_to(&self, sheet: &str) -> bool {
        self.scope.as_deref().is_some_and(|s| same_sheet_name(s, sheet))
    }

    /// True when `name` and `scope` identify this entry.
    pub fn matches(&self, name: &str, scope: Option<&str>) -> bool {
        self.name.eq_ignore_ascii_case(name)
            && match (self.scope.as_deref(), scope) {
                (None, None) => true,
                (Some(a), Some(b)) => same_sheet_name(a, b),
                _ => false,
            }
    }
}

/// Mutable spreadsheet operations the engine relies on.
///
/// Sheet lookups are case-insensitive, like the spreadsheet applications.
/// Formulas are passed and returned without a leading `=`.
pub trait Document {
    /// Worksheet names in tab order.
    fn sheet_names(&self) -> Vec<String>;

    /// Tab position of `name`.
    fn sheet_index(&self, name: &str) -> Option<usize>;

    /// Rename a worksheet. Sheet-qualified references to `old` in stored cell
    /// formulas follow the sheet; defined names are left to the caller.
    fn rename_sheet(&mut self, old: &str, new: &str) -> Result<()>;

    fn set_value(&mut self, sheet: &str, cell: CellAddress, value: CellValue) -> Result<()>;

    fn set_formula(&mut self, sheet: &str, cell: CellAddress, formula: &str) -> Result<()>;

    /// Fill `cell` with a solid color and set its horizontal alignment.
    fn set_highlight(&mut self, sheet: &str, cell: CellAddress, highlight: Highlight) -> Result<()>;

    fn defined_names(&self) -> Vec<DefinedName>;

    fn delete_defined_name(&mut self, name: &str, scope: Option<&str>) -> Result<()>;

    fn add_defined_name(&mut self, name: DefinedName) -> Result<()>;

    fn set_active_sheet(&mut self, sheet: &str) -> Result<()>;

    fn value(&self, sheet: &str, cell: CellAddress) -> Result<CellValue>;

    fn formula(&self, sheet: &str, cell: CellAddress) -> Result<Option<String>>;

    fn has_sheet(&self, name: &str) -> bool {
        self.sheet_index(name).is_some()
    }
}

/// Position of `name` in `names`, case-insensitively.
pub(crate) fn position_of<'a, I>(names: I, name: &str) -> Option<usize>
where
    I: IntoIterator<Item = &'a str>,
{
    names.into_iter().position(|n| same_sheet_name(n, name))
}

/// Rename checks shared by the backends: `new` must be valid and must not
/// belong to another sheet. Returns the index of `old`.
pub(crate) fn check_rename<'a, I>(names: I, old: &str, new: &str) -> Result<usize>
where
    I: IntoIterator<Item = &'a str> + Clone,
{
    crate::sheet_name::validate_sheet_name(new)?;
    let index =
        position_of(names.clone(), old).ok_or_else(|| ReportError::MissingSheet(old.to_string()))?;
    match position_of(names, new) {
        Some(other) if other != index => Err(ReportError::DuplicateSheet(new.to_string())),
        _ => Ok(index),
    }
}

/// Strip the optional leading `=` of a formula.
pub(crate) fn formula_body(formula: &str) -> &str {
    formula.trim().strip_prefix('=').unwrap_or(formula.trim())
}
