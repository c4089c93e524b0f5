//! In-memory document used by tests and dry runs.

use std::collections::BTreeMap;

use crate::cell_ref::CellAddress;
use crate::error::{ReportError, Result};
use crate::formula::rewrite_sheet_references;
use crate::highlight::Highlight;

use super::{check_rename, formula_body, position_of, CellValue, DefinedName, Document};

/// Contents of one cell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryCell {
    pub value: CellValue,
    pub formula: Option<String>,
    pub highlight: Option<Highlight>,
}

#[derive(Debug, Clone)]
struct MemorySheet {
    name: String,
    cells: BTreeMap<CellAddress, MemoryCell>,
}

/// Defined names keep their scope as a sheet position, so they follow a
/// renamed sheet the way they do in a workbook file.
#[derive(Debug, Clone)]
struct StoredName {
    name: String,
    refers_to: String,
    scope: Option<usize>,
    hidden: bool,
    comment: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryDocument {
    sheets: Vec<MemorySheet>,
    names: Vec<StoredName>,
    active: usize,
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// A document with empty sheets named `names`, in order.
    pub fn with_sheets<'a, I>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut doc = Self::new();
        for name in names {
            doc.add_sheet(name)?;
        }
        Ok(doc)
    }

    pub fn add_sheet(&mut self, name: &str) -> Result<()> {
        crate::sheet_name::validate_sheet_name(name)?;
        if self.sheet_index(name).is_some() {
            return Err(ReportError::DuplicateSheet(name.to_string()));
        }
        self.sheets.push(MemorySheet {
            name: name.to_string(),
            cells: BTreeMap::new(),
        });
        Ok(())
    }

    /// Name of the selected tab.
    pub fn active_sheet(&self) -> Option<&str> {
        self.sheets.get(self.active).map(|s| s.name.as_str())
    }

    pub fn cell(&self, sheet: &str, cell: CellAddress) -> Option<&MemoryCell> {
        self.sheet(sheet).ok()?.cells.get(&cell)
    }

    pub fn highlight(&self, sheet: &str, cell: CellAddress) -> Option<Highlight> {
        self.cell(sheet, cell).and_then(|c| c.highlight)
    }

    /// Every formula on `sheet`, in cell order.
    pub fn formulas(&self, sheet: &str) -> Vec<(CellAddress, String)> {
        self.sheet(sheet)
            .map(|s| {
                s.cells
                    .iter()
                    .filter_map(|(addr, c)| c.formula.clone().map(|f| (*addr, f)))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn sheet(&self, name: &str) -> Result<&MemorySheet> {
        self.sheet_index(name)
            .and_then(|i| self.sheets.get(i))
            .ok_or_else(|| ReportError::MissingSheet(name.to_string()))
    }

    fn cell_mut(&mut self, sheet: &str, cell: CellAddress) -> Result<&mut MemoryCell> {
        let index = self
            .sheet_index(sheet)
            .ok_or_else(|| ReportError::MissingSheet(sheet.to_string()))?;
        let sheet = self
            .sheets
            .get_mut(index)
            .ok_or_else(|| ReportError::MissingSheet(sheet.to_string()))?;
        Ok(sheet.cells.entry(cell).or_default())
    }

    fn scope_index(&self, scope: Option<&str>) -> Result<Option<usize>> {
        scope
            .map(|s| {
                self.sheet_index(s)
                    .ok_or_else(|| ReportError::MissingSheet(s.to_string()))
            })
            .transpose()
    }
}

impl Document for MemoryDocument {
    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name.clone()).collect()
    }

    fn sheet_index(&self, name: &str) -> Option<usize> {
        position_of(self.sheets.iter().map(|s| s.name.as_str()), name)
    }

    fn rename_sheet(&mut self, old: &str, new: &str) -> Result<()> {
        let index = check_rename(self.sheets.iter().map(|s| s.name.as_str()), old, new)?;
        let old_name = match self.sheets.get_mut(index) {
            Some(sheet) => std::mem::replace(&mut sheet.name, new.to_string()),
            None => return Err(ReportError::MissingSheet(old.to_string())),
        };
        for cell in self.sheets.iter_mut().flat_map(|s| s.cells.values_mut()) {
            if let Some(rewritten) = cell
                .formula
                .as_deref()
                .and_then(|f| rewrite_sheet_references(f, &old_name, new))
            {
                cell.formula = Some(rewritten);
            }
        }
        Ok(())
    }

    fn set_value(&mut self, sheet: &str, cell: CellAddress, value: CellValue) -> Result<()> {
        let slot = self.cell_mut(sheet, cell)?;
        slot.value = value;
        slot.formula = None;
        Ok(())
    }

    fn set_formula(&mut self, sheet: &str, cell: CellAddress, formula: &str) -> Result<()> {
        let slot = self.cell_mut(sheet, cell)?;
        slot.formula = Some(formula_body(formula).to_string());
        slot.value = CellValue::Empty;
        Ok(())
    }

    fn set_highlight(&mut self, sheet: &str, cell: CellAddress, highlight: Highlight) -> Result<()> {
        self.cell_mut(sheet, cell)?.highlight = Some(highlight);
        Ok(())
    }

    fn defined_names(&self) -> Vec<DefinedName> {
        self.names
            .iter()
            .map(|n| DefinedName {
                name: n.name.clone(),
                refers_to: n.refers_to.clone(),
                scope: n
                    .scope
                    .and_then(|i| self.sheets.get(i))
                    .map(|s| s.name.clone()),
                hidden: n.hidden,
                comment: n.comment.clone(),
            })
            .collect()
    }

    fn delete_defined_name(&mut self, name: &str, scope: Option<&str>) -> Result<()> {
        let scope_index = self.scope_index(scope)?;
        let before = self.names.len();
        self.names
            .retain(|n| !(n.name.eq_ignore_ascii_case(name) && n.scope == scope_index));
        if self.names.len() == before {
            return Err(ReportError::MissingDefinedName {
                name: name.to_string(),
                scope: scope.map(str::to_string),
            });
        }
        Ok(())
    }

    fn add_defined_name(&mut self, name: DefinedName) -> Result<()> {
        let scope = self.scope_index(name.scope.as_deref())?;
        if self
            .names
            .iter()
            .any(|n| n.name.eq_ignore_ascii_case(&name.name) && n.scope == scope)
        {
            return Err(ReportError::Template(format!(
                "defined name {:?} already exists",
                name.name
            )));
        }
        self.names.push(StoredName {
            refers_to: formula_body(&name.refers_to).to_string(),
            name: name.name,
            scope,
            hidden: name.hidden,
            comment: name.comment,
        });
        Ok(())
    }

    fn set_active_sheet(&mut self, sheet: &str) -> Result<()> {
        self.active = self
            .sheet_index(sheet)
            .ok_or_else(|| ReportError::MissingSheet(sheet.to_string()))?;
        Ok(())
    }

    fn value(&self, sheet: &str, cell: CellAddress) -> Result<CellValue> {
        Ok(self
            .sheet(sheet)?
            .cells
            .get(&cell)
            .map(|c| c.value.clone())
            .unwrap_or_default())
    }

    fn formula(&self, sheet: &str, cell: CellAddress) -> Result<Option<String>> {
        Ok(self.sheet(sheet)?.cells.get(&cell).and_then(|c| c.formula.clone()))
    }
}
