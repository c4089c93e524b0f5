//! Sheet identity rewriting: rename a filled group sheet and keep every
//! reference to it consistent.
//!
//! Renaming through [`Document::rename_sheet`] moves the sheet and the cell
//! formulas that point at it. This module handles the rest: defined names
//! local to the sheet, workbook names that reference it, and the summary
//! rows that aggregate one group sheet each.

use serde::Serialize;
use tracing::debug;

use crate::cell_ref::CellAddress;
use crate::document::{DefinedName, Document};
use crate::error::{ReportError, Result};
use crate::formula::{references_sheet, rewrite_sheet_references, sheet_cell_ref, sheet_qualifiers};
use crate::layout::{ReportLayout, SummaryBinding};

/// What one rename touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenameOutcome {
    pub old: String,
    pub new: String,
    /// Position relative to the first group sheet, when the layout has one.
    pub position: Option<usize>,
    pub names_rewritten: usize,
    pub summary_cells: usize,
}

/// Renames group sheets for one layout.
///
/// The sheet position used for summary rows is measured from the tab that
/// held the first placeholder when the rewriter was created, so it stays
/// correct after that placeholder itself has been renamed.
#[derive(Debug, Clone)]
pub struct SheetRewriter<'a> {
    summary_sheet: &'a str,
    bindings: &'a [SummaryBinding],
    origin: Option<usize>,
}

impl<'a> SheetRewriter<'a> {
    pub fn new(layout: &'a ReportLayout, doc: &dyn Document) -> Self {
        let origin = layout
            .placeholders
            .and_then(|_| doc.sheet_index(&placeholder_name(0)));
        Self {
            summary_sheet: layout.summary_sheet,
            bindings: layout.summary_bindings,
            origin,
        }
    }

    /// Tab offset of `sheet` from the first group sheet.
    pub fn position(&self, doc: &dyn Document, sheet: &str) -> Option<usize> {
        let index = doc.sheet_index(sheet)?;
        index.checked_sub(self.origin?)
    }

    /// Rename `old` to `new` and rewrite everything that depended on `old`.
    ///
    /// Every check that can fail runs before the document is touched.
    pub fn rename(&self, doc: &mut dyn Document, old: &str, new: &str) -> Result<RenameOutcome> {
        crate::sheet_name::validate_sheet_name(new)?;
        if !doc.has_sheet(old) {
            return Err(ReportError::MissingSheet(old.to_string()));
        }
        if doc.sheet_index(new).is_some_and(|i| Some(i) != doc.sheet_index(old)) {
            return Err(ReportError::DuplicateSheet(new.to_string()));
        }

        let position = self.position(doc, old);
        let summary = match position {
            Some(position) if !self.bindings.is_empty() => {
                if !doc.has_sheet(self.summary_sheet) {
                    return Err(ReportError::MissingSheet(self.summary_sheet.to_string()));
                }
                self.summary_cells(position)?
            }
            _ => Vec::new(),
        };

        doc.rename_sheet(old, new)?;

        let mut names_rewritten = 0;
        for name in doc.defined_names() {
            let scoped_here = name.is_scoped_to(new);
            let rewritten = rewrite_sheet_references(&name.refers_to, old, new);
            if !scoped_here && rewritten.is_none() {
                continue;
            }
            doc.delete_defined_name(&name.name, name.scope.as_deref())?;
            doc.add_defined_name(DefinedName {
                refers_to: rewritten.unwrap_or_else(|| name.refers_to.clone()),
                ..name
            })?;
            names_rewritten += 1;
        }

        for (target, source) in &summary {
            doc.set_formula(self.summary_sheet, *target, &sheet_cell_ref(new, *source))?;
        }

        debug!(
            old,
            new,
            position,
            names = names_rewritten,
            summary_cells = summary.len(),
            "rewrote sheet identity"
        );
        Ok(RenameOutcome {
            old: old.to_string(),
            new: new.to_string(),
            position,
            names_rewritten,
            summary_cells: summary.len(),
        })
    }

    fn summary_cells(&self, position: usize) -> Result<Vec<(CellAddress, CellAddress)>> {
        let mut cells = Vec::new();
        for binding in self.bindings {
            cells.extend(binding.cells(position)?);
        }
        Ok(cells)
    }
}

/// Name of the placeholder sheet for group `group` (`"1"` for the first).
pub fn placeholder_name(group: usize) -> String {
    (group + 1).to_string()
}

/// Fail when a defined name refers to a sheet that no longer exists, or
/// still refers to one of the renamed sheets in `renamed`.
pub fn check_references(doc: &dyn Document, renamed: &[RenameOutcome]) -> Result<()> {
    for name in doc.defined_names() {
        for qualifier in sheet_qualifiers(&name.refers_to) {
            let error_literal = name
                .refers_to
                .get(..qualifier.span.start)
                .is_some_and(|before| before.ends_with('#'));
            if !error_literal && !doc.has_sheet(&qualifier.name) {
                return Err(ReportError::Template(format!(
                    "defined name {:?} refers to missing sheet {:?}",
                    name.name, qualifier.name
                )));
            }
        }
        if let Some(stale) = renamed
            .iter()
            .find(|r| !doc.has_sheet(&r.old) && references_sheet(&name.refers_to, &r.old))
        {
            return Err(ReportError::Template(format!(
                "defined name {:?} still refers to {:?}",
                name.name, stale.old
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::document::MemoryDocument;
    use crate::layout::{layout_for, ReportKind, PROJECT_SUMMARY_INCH_FOOT};
    use crate::model::PricingModel;
    use pretty_assertions::assert_eq;

    fn cell(s: &str) -> CellAddress {
        CellAddress::parse(s).unwrap()
    }

    fn template() -> MemoryDocument {
        let mut doc = MemoryDocument::with_sheets(["SUMMARY", "1", "2", "3"]).unwrap();
        doc.add_defined_name(DefinedName::scoped("Print_Area", "'1'!$A$1:$AY$420", "1"))
            .unwrap();
        doc.add_defined_name(DefinedName::scoped("Print_Area", "'2'!$A$1:$AY$420", "2"))
            .unwrap();
        doc.add_defined_name(DefinedName::workbook("FirstDay", "'1'!$E$11"))
            .unwrap();
        doc.set_formula("SUMMARY", cell("B2"), "SUM('1'!J22:J421)").unwrap();
        doc
    }

    #[test]
    fn rename_rewrites_scoped_names_and_summary_rows() {
        let mut doc = template();
        let rewriter = SheetRewriter::new(&PROJECT_SUMMARY_INCH_FOOT, &doc);
        let outcome = rewriter.rename(&mut doc, "1", "01-02-2024").unwrap();

        assert_eq!(outcome.position, Some(0));
        assert_eq!(outcome.names_rewritten, 2);
        assert_eq!(outcome.summary_cells, 5 + 37);

        let names = doc.defined_names();
        let print_area = names
            .iter()
            .find(|n| n.matches("Print_Area", Some("01-02-2024")))
            .unwrap();
        assert_eq!(print_area.refers_to, "'01-02-2024'!$A$1:$AY$420");
        let first_day = names.iter().find(|n| n.matches("FirstDay", None)).unwrap();
        assert_eq!(first_day.refers_to, "'01-02-2024'!$E$11");

        assert_eq!(
            doc.formula("SUMMARY", cell("E49")).unwrap().as_deref(),
            Some("'01-02-2024'!O8")
        );
        assert_eq!(
            doc.formula("SUMMARY", cell("AK87")).unwrap().as_deref(),
            Some("'01-02-2024'!AY5")
        );
        assert_eq!(
            doc.formula("SUMMARY", cell("B2")).unwrap().as_deref(),
            Some("SUM('01-02-2024'!J22:J421)")
        );
        check_references(&doc, &[outcome]).unwrap();
    }

    #[test]
    fn later_sheets_feed_rows_above_the_base() {
        let mut doc = template();
        let rewriter = SheetRewriter::new(&PROJECT_SUMMARY_INCH_FOOT, &doc);
        rewriter.rename(&mut doc, "1", "01-02-2024").unwrap();
        let outcome = rewriter.rename(&mut doc, "2", "01-03-2024").unwrap();
        assert_eq!(outcome.position, Some(1));
        assert_eq!(
            doc.formula("SUMMARY", cell("E48")).unwrap().as_deref(),
            Some("'01-03-2024'!O8")
        );
        assert_eq!(
            doc.formula("SUMMARY", cell("E49")).unwrap().as_deref(),
            Some("'01-02-2024'!O8")
        );
    }

    #[test]
    fn failed_checks_leave_the_document_alone() {
        let mut doc = template();
        let rewriter = SheetRewriter::new(&PROJECT_SUMMARY_INCH_FOOT, &doc);
        assert!(matches!(
            rewriter.rename(&mut doc, "1", "2").unwrap_err(),
            ReportError::DuplicateSheet(_)
        ));
        assert!(matches!(
            rewriter.rename(&mut doc, "9", "x").unwrap_err(),
            ReportError::MissingSheet(_)
        ));
        assert!(rewriter.rename(&mut doc, "1", "a/b").is_err());
        assert_eq!(doc.sheet_names(), vec!["SUMMARY", "1", "2", "3"]);
        assert_eq!(doc.formula("SUMMARY", cell("E49")).unwrap(), None);
    }

    #[test]
    fn layouts_without_placeholders_have_no_position() {
        let layout = layout_for(ReportKind::PricingSheet, PricingModel::SquareFoot);
        let mut doc = MemoryDocument::with_sheets(["SUMMARY", "DATA1"]).unwrap();
        let rewriter = SheetRewriter::new(layout, &doc);
        let outcome = rewriter.rename(&mut doc, "DATA1", "Survey Data").unwrap();
        assert_eq!(outcome.position, None);
        assert_eq!(outcome.summary_cells, 0);
    }

    #[test]
    fn dangling_names_are_reported() {
        let mut doc = template();
        doc.add_defined_name(DefinedName::workbook("Gone", "'Deleted'!A1"))
            .unwrap();
        let err = check_references(&doc, &[]).unwrap_err();
        assert!(err.to_string().contains("Deleted"));

        let mut doc = template();
        doc.add_defined_name(DefinedName::workbook("Broken", "#REF!$A$1"))
            .unwrap();
        check_references(&doc, &[]).unwrap();
    }
}
