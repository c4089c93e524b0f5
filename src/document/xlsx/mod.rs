//! XLSX backend: a template package patched in place.
//!
//! Opening reads the package once: workbook, relationships, styles, shared
//! strings and every worksheet. Saving copies each untouched entry raw and
//! writes only the parts that changed, plus the package-level fixes every
//! finished report needs (no calculation chain, full recalculation on load,
//! workbook content type instead of template content type).

mod package;
mod shared_strings;
mod styles;
mod workbook;
mod worksheet;
mod zip_patcher;

use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::path::Path;

use tracing::debug;
use zip::ZipArchive;

use crate::cell_ref::CellAddress;
use crate::error::{ReportError, Result};
use crate::highlight::Highlight;

use super::{check_rename, formula_body, position_of, CellValue, DefinedName, Document};

use package::{
    drop_relationships, override_type, parse_relationships, part_dir, patch_app_titles,
    patch_content_types, read_part, rels_path_for, require_part, Relationship, CONTENT_TYPES,
    PACKAGE_RELS, REL_CALC_CHAIN, REL_EXTENDED_PROPERTIES, REL_OFFICE_DOCUMENT,
    REL_SHARED_STRINGS, REL_STYLES,
};
use shared_strings::parse_shared_strings;
use styles::StylePart;
use workbook::{NameEntry, WorkbookPart};
use worksheet::SheetPart;
use zip_patcher::patch_package;

pub use workbook::DateSystem;

/// An open template, mutated in memory until [`XlsxDocument::to_bytes`].
#[derive(Debug, Clone)]
pub struct XlsxDocument {
    original: Vec<u8>,
    content_types: String,
    main_content_type: Option<String>,
    workbook: WorkbookPart,
    workbook_rels_path: String,
    workbook_rels: String,
    /// One entry per workbook sheet, `None` for chart sheets.
    sheets: Vec<Option<SheetPart>>,
    styles: Option<StylePart>,
    shared_strings: Vec<String>,
    calc_chain: Option<Relationship>,
    app: Option<(String, String)>,
}

impl XlsxDocument {
    /// Parse a workbook or template package.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let mut archive = ZipArchive::new(Cursor::new(bytes.as_slice()))?;

        let content_types = require_part(&mut archive, CONTENT_TYPES)?;
        let package_rels = parse_relationships(&require_part(&mut archive, PACKAGE_RELS)?, "")?;
        let workbook_path = package_rels
            .iter()
            .find(|r| r.is(REL_OFFICE_DOCUMENT))
            .map(|r| r.path.clone())
            .ok_or_else(|| ReportError::MissingPart("officeDocument relationship".into()))?;
        let app = match package_rels.iter().find(|r| r.is(REL_EXTENDED_PROPERTIES)) {
            Some(rel) => read_part(&mut archive, &rel.path)?.map(|xml| (rel.path.clone(), xml)),
            None => None,
        };

        let workbook_rels_path = rels_path_for(&workbook_path);
        let workbook_rels = require_part(&mut archive, &workbook_rels_path)?;
        let rels = parse_relationships(&workbook_rels, part_dir(&workbook_path))?;
        let workbook_xml = require_part(&mut archive, &workbook_path)?;
        let workbook = WorkbookPart::parse(&workbook_path, workbook_xml, &rels)?;

        let mut sheets = Vec::with_capacity(workbook.sheets.len());
        for entry in &workbook.sheets {
            let part = match &entry.path {
                Some(path) => Some(SheetPart::parse(path, require_part(&mut archive, path)?)?),
                None => None,
            };
            sheets.push(part);
        }

        let styles = match rels.iter().find(|r| r.is(REL_STYLES)) {
            Some(rel) => match read_part(&mut archive, &rel.path)? {
                Some(xml) => Some(StylePart::parse(&rel.path, xml)?),
                None => None,
            },
            None => None,
        };
        let shared_strings = match rels.iter().find(|r| r.is(REL_SHARED_STRINGS)) {
            Some(rel) => match read_part(&mut archive, &rel.path)? {
                Some(xml) => parse_shared_strings(&xml)?,
                None => Vec::new(),
            },
            None => Vec::new(),
        };
        let calc_chain = rels.iter().find(|r| r.is(REL_CALC_CHAIN)).cloned();
        let main_content_type = override_type(&content_types, &workbook_path)?;

        debug!(
            workbook = %workbook_path,
            sheets = sheets.len(),
            names = workbook.names.len(),
            "opened template package"
        );

        drop(archive);
        Ok(Self {
            original: bytes,
            content_types,
            main_content_type,
            workbook,
            workbook_rels_path,
            workbook_rels,
            sheets,
            styles,
            shared_strings,
            calc_chain,
            app,
        })
    }

    pub fn open(path: &Path) -> Result<Self> {
        Self::from_bytes(std::fs::read(path)?)
    }

    pub fn date_system(&self) -> DateSystem {
        self.workbook.date_system
    }

    /// True when the package carries VBA (`.xlsm` / `.xltm`).
    pub fn is_macro_enabled(&self) -> bool {
        self.main_content_type
            .as_deref()
            .is_some_and(package::is_macro_enabled)
    }

    /// Style index of a cell (0 when it has none).
    pub fn cell_style(&self, sheet: &str, cell: CellAddress) -> Result<u32> {
        Ok(self.sheet(sheet)?.style(cell))
    }

    /// Serialize the finished document.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut replaced: HashMap<String, String> = HashMap::new();
        let mut dropped: HashSet<String> = HashSet::new();
        let mut dropped_parts: Vec<String> = Vec::new();

        if let Some(calc) = &self.calc_chain {
            dropped.insert(calc.path.clone());
            dropped_parts.push(calc.path.clone());
            replaced.insert(
                self.workbook_rels_path.clone(),
                drop_relationships(&self.workbook_rels, &[calc.id.clone()])?,
            );
        }
        replaced.insert(
            CONTENT_TYPES.to_string(),
            patch_content_types(&self.content_types, &dropped_parts)?,
        );
        replaced.insert(self.workbook.path.clone(), self.workbook.to_xml()?);

        if let Some(styles) = self.styles.as_ref().filter(|s| s.is_dirty()) {
            replaced.insert(styles.path.clone(), styles.to_xml()?);
        }

        let dates = self.workbook.date_system;
        for (index, part) in self.sheets.iter().enumerate() {
            let Some(part) = part else { continue };
            let selected = self.workbook.active_tab.map(|active| active == index);
            if part.dirty || selected.is_some() {
                replaced.insert(part.path.clone(), part.to_xml(dates, selected)?);
            }
        }

        let renames: HashMap<String, String> = self
            .workbook
            .sheets
            .iter()
            .filter(|s| s.name != s.template_name)
            .map(|s| (s.template_name.clone(), s.name.clone()))
            .collect();
        if let Some((path, xml)) = self.app.as_ref().filter(|_| !renames.is_empty()) {
            replaced.insert(path.clone(), patch_app_titles(xml, &renames)?);
        }

        debug!(
            replaced = replaced.len(),
            dropped = dropped.len(),
            "writing package"
        );
        patch_package(&self.original, &replaced, &dropped)
    }

    /// Write the finished document to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    fn sheet_position(&self, name: &str) -> Result<usize> {
        self.sheet_index(name)
            .ok_or_else(|| ReportError::MissingSheet(name.to_string()))
    }

    fn sheet(&self, name: &str) -> Result<&SheetPart> {
        let index = self.sheet_position(name)?;
        self.sheets
            .get(index)
            .and_then(Option::as_ref)
            .ok_or_else(|| ReportError::Template(format!("{name:?} is not a worksheet")))
    }

    fn sheet_mut(&mut self, name: &str) -> Result<&mut SheetPart> {
        let index = self.sheet_position(name)?;
        self.sheets
            .get_mut(index)
            .and_then(Option::as_mut)
            .ok_or_else(|| ReportError::Template(format!("{name:?} is not a worksheet")))
    }

    fn scope_id(&self, scope: Option<&str>) -> Result<Option<usize>> {
        scope.map(|s| self.sheet_position(s)).transpose()
    }
}

impl Document for XlsxDocument {
    fn sheet_names(&self) -> Vec<String> {
        self.workbook.sheets.iter().map(|s| s.name.clone()).collect()
    }

    fn sheet_index(&self, name: &str) -> Option<usize> {
        position_of(self.workbook.sheets.iter().map(|s| s.name.as_str()), name)
    }

    fn rename_sheet(&mut self, old: &str, new: &str) -> Result<()> {
        let index = check_rename(self.workbook.sheets.iter().map(|s| s.name.as_str()), old, new)?;
        let entry = self
            .workbook
            .sheets
            .get_mut(index)
            .ok_or_else(|| ReportError::MissingSheet(old.to_string()))?;
        let old_name = std::mem::replace(&mut entry.name, new.to_string());

        let rewritten: usize = self
            .sheets
            .iter_mut()
            .flatten()
            .map(|part| part.rewrite_references(&old_name, new))
            .sum();
        debug!(old = %old_name, new, formulas = rewritten, "renamed worksheet");
        Ok(())
    }

    fn set_value(&mut self, sheet: &str, cell: CellAddress, value: CellValue) -> Result<()> {
        self.sheet_mut(sheet)?.set_value(cell, value);
        Ok(())
    }

    fn set_formula(&mut self, sheet: &str, cell: CellAddress, formula: &str) -> Result<()> {
        let body = formula_body(formula).to_string();
        self.sheet_mut(sheet)?.set_formula(cell, &body);
        Ok(())
    }

    fn set_highlight(&mut self, sheet: &str, cell: CellAddress, highlight: Highlight) -> Result<()> {
        let base = self.sheet(sheet)?.style(cell);
        let styles = self
            .styles
            .as_mut()
            .ok_or_else(|| ReportError::MissingPart("styles part".into()))?;
        let xf = styles.highlight_xf(base, highlight)?;
        self.sheet_mut(sheet)?.set_style(cell, xf);
        Ok(())
    }

    fn defined_names(&self) -> Vec<DefinedName> {
        self.workbook
            .names
            .iter()
            .map(|n| DefinedName {
                name: n.name.clone(),
                refers_to: n.refers_to.clone(),
                scope: self.workbook.scope_name(n.local_sheet_id),
                hidden: n.hidden,
                comment: n.comment.clone(),
            })
            .collect()
    }

    fn delete_defined_name(&mut self, name: &str, scope: Option<&str>) -> Result<()> {
        let id = self.scope_id(scope)?;
        let before = self.workbook.names.len();
        self.workbook
            .names
            .retain(|n| !(n.name.eq_ignore_ascii_case(name) && n.local_sheet_id == id));
        if self.workbook.names.len() == before {
            return Err(ReportError::MissingDefinedName {
                name: name.to_string(),
                scope: scope.map(str::to_string),
            });
        }
        Ok(())
    }

    fn add_defined_name(&mut self, name: DefinedName) -> Result<()> {
        let id = self.scope_id(name.scope.as_deref())?;
        if self
            .workbook
            .names
            .iter()
            .any(|n| n.name.eq_ignore_ascii_case(&name.name) && n.local_sheet_id == id)
        {
            return Err(ReportError::Template(format!(
                "defined name {:?} already exists",
                name.name
            )));
        }
        self.workbook.names.push(NameEntry {
            refers_to: formula_body(&name.refers_to).to_string(),
            name: name.name,
            local_sheet_id: id,
            hidden: name.hidden,
            comment: name.comment,
            extra: Vec::new(),
        });
        Ok(())
    }

    fn set_active_sheet(&mut self, sheet: &str) -> Result<()> {
        self.workbook.active_tab = Some(self.sheet_position(sheet)?);
        Ok(())
    }

    fn value(&self, sheet: &str, cell: CellAddress) -> Result<CellValue> {
        Ok(self.sheet(sheet)?.value(cell, &self.shared_strings))
    }

    fn formula(&self, sheet: &str, cell: CellAddress) -> Result<Option<String>> {
        Ok(self.sheet(sheet)?.formula(cell))
    }
}
