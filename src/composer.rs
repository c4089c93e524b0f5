//! Report composition: data in, filled document out.
//!
//! One [`ReportComposer`] serves every report variant; the [`ReportLayout`]
//! it is built with decides where things go. A run:
//!
//! 1. rebalances records into at most `max_groups` groups,
//! 2. indexes technicians across all groups, for layouts with indicator columns,
//! 3. checks every capacity and every sheet the run needs, before writing,
//! 4. writes project-level cells, then each group's rows,
//! 5. renames each group's placeholder sheet once the group is written.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cell_ref::CellAddress;
use crate::document::{CellValue, Document};
use crate::error::{ReportError, Result};
use crate::formula::same_sheet_name;
use crate::highlight::{Highlight, HighlightColor};
use crate::layout::{
    LabelValue, ReportKind, ReportLayout, Section, SheetTarget, TechnicianColumns,
};
use crate::model::{
    parse_iso_date, MeasurementGroup, MeasurementRecord, PricingModel, ReportData, SpecialCase,
    TechnicianIndex,
};
use crate::rebalance::{rebalance, TieBreak, MERGE_SEPARATOR};
use crate::rewriter::{check_references, placeholder_name, RenameOutcome, SheetRewriter};
use crate::rules::{indicator_formulas, RuleSet};
use crate::sheet_name::{unique_sheet_name, SheetNaming};

/// Text written next to a highlighted "Other" marker.
const OTHER_LABEL: &str = "Other";

/// Knobs that are not part of a layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComposeOptions {
    pub tie_break: TieBreak,
    pub rules: RuleSet,
    /// Date written as the report date.
    pub today: NaiveDate,
}

impl Default for ComposeOptions {
    fn default() -> Self {
        Self {
            tie_break: TieBreak::default(),
            rules: RuleSet::default(),
            today: chrono::Local::now().date_naive(),
        }
    }
}

/// Where one group ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupPlacement {
    pub name: String,
    pub sheet: String,
    pub rows: usize,
}

/// What a composition run produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompositionSummary {
    pub kind: ReportKind,
    pub model: PricingModel,
    pub records: usize,
    pub groups: Vec<GroupPlacement>,
    /// Technician initials in indicator column order.
    pub technicians: Vec<String>,
    pub renames: Vec<RenameOutcome>,
    /// Placeholder sheets no group was assigned to.
    pub unused_placeholders: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct ReportComposer<'a> {
    layout: &'a ReportLayout,
    options: ComposeOptions,
}

impl<'a> ReportComposer<'a> {
    pub fn new(layout: &'a ReportLayout, options: ComposeOptions) -> Self {
        Self { layout, options }
    }

    pub fn layout(&self) -> &'a ReportLayout {
        self.layout
    }

    /// Fill `doc` with `data`.
    pub fn compose(&self, doc: &mut dyn Document, data: &ReportData) -> Result<CompositionSummary> {
        let layout = self.layout;
        if data.pricing_model != layout.model {
            return Err(ReportError::Validation(format!(
                "project {:?} is priced {:?} but the {} layout is {:?}",
                data.name, data.pricing_model, layout.kind, layout.model
            )));
        }
        info!(
            kind = %layout.kind,
            model = ?layout.model,
            project = %data.name,
            records = data.record_count(),
            "composing report"
        );

        let mut records = data.records();
        if layout
            .placeholders
            .is_some_and(|p| p.naming == SheetNaming::WorkDate)
        {
            order_by_work_date(&mut records);
        }
        let record_count = records.len();
        let groups = rebalance(records, layout.max_groups, self.options.tie_break)?;
        // Pricing records carry no technician; only layouts with indicator
        // columns index (and require) one.
        let technicians = if layout.sections.iter().any(|s| s.technicians.is_some()) {
            TechnicianIndex::build(groups.iter().flat_map(|g| &g.records))?
        } else {
            TechnicianIndex::default()
        };

        self.check_fits(&*doc, data, &groups, &technicians)?;

        self.write_fixed(doc, data)?;
        self.write_clins(doc, data)?;
        self.write_summary_technicians(doc, &technicians)?;

        let rewriter = SheetRewriter::new(layout, &*doc);
        let mut placements = Vec::with_capacity(groups.len());
        let mut renames = Vec::new();

        for (index, group) in groups.iter().enumerate() {
            for section in layout.sections {
                self.write_group(doc, section, index, group, &technicians)?;
            }

            let sheet = match layout.placeholders {
                Some(placeholders) => {
                    let old = placeholder_name(index);
                    let taken = doc.sheet_names();
                    let new = unique_sheet_name(
                        &placeholders.naming.name_for(&group.name),
                        taken
                            .iter()
                            .map(String::as_str)
                            .filter(|name| !same_sheet_name(name, &old)),
                    );
                    let outcome = rewriter.rename(doc, &old, &new)?;
                    renames.push(outcome);
                    new
                }
                None => layout
                    .sections
                    .first()
                    .map_or_else(|| layout.summary_sheet.to_string(), |s| sheet_for(s, index)),
            };
            debug!(group = %group.name, sheet = %sheet, rows = group.len(), "group written");
            placements.push(GroupPlacement {
                name: group.name.clone(),
                sheet,
                rows: group.len(),
            });
        }

        let unused_placeholders = self.unused_placeholders(&*doc, groups.len());
        for sheet in &unused_placeholders {
            warn!(sheet = %sheet, "placeholder sheet left unused");
        }

        check_references(&*doc, &renames)?;
        if doc.has_sheet(layout.summary_sheet) {
            doc.set_active_sheet(layout.summary_sheet)?;
        }

        info!(
            groups = placements.len(),
            technicians = technicians.len(),
            "report composed"
        );
        Ok(CompositionSummary {
            kind: layout.kind,
            model: layout.model,
            records: record_count,
            groups: placements,
            technicians: technicians.iter().map(|t| t.initials.clone()).collect(),
            renames,
            unused_placeholders,
        })
    }

    /// Everything that can be known to fail, checked before the first write.
    fn check_fits(
        &self,
        doc: &dyn Document,
        data: &ReportData,
        groups: &[MeasurementGroup],
        technicians: &TechnicianIndex,
    ) -> Result<()> {
        let layout = self.layout;

        for sheet in layout.fixed_sheets() {
            if !doc.has_sheet(sheet) {
                return Err(ReportError::MissingSheet(sheet.to_string()));
            }
        }
        if layout.placeholders.is_some() {
            for index in 0..groups.len() {
                let sheet = placeholder_name(index);
                if !doc.has_sheet(&sheet) {
                    return Err(ReportError::MissingSheet(sheet));
                }
            }
        }

        for section in layout.sections {
            for (index, group) in groups.iter().enumerate() {
                section.check_capacity(index, &group.name, group.len())?;
            }
            if let Some(techs) = &section.technicians {
                let fits = usize::try_from(techs.capacity).is_ok_and(|c| technicians.len() <= c);
                if !fits {
                    return Err(ReportError::TechnicianCapacity {
                        technicians: technicians.len(),
                        capacity: techs.capacity,
                    });
                }
            }
        }

        if let Some(table) = layout.clins {
            let rows = data.pricing.clins.len();
            if usize::try_from(table.capacity).is_ok_and(|c| rows > c) {
                return Err(ReportError::Capacity {
                    section: "clins".into(),
                    group: table.sheet.into(),
                    rows,
                    capacity: table.capacity,
                });
            }
        }

        Ok(())
    }

    fn write_fixed(&self, doc: &mut dyn Document, data: &ReportData) -> Result<()> {
        for cell in self.layout.fixed {
            let value = cell.field.value(data, self.options.today)?;
            doc.set_value(cell.sheet, cell.address()?, value)?;
        }
        Ok(())
    }

    fn write_clins(&self, doc: &mut dyn Document, data: &ReportData) -> Result<()> {
        let Some(table) = self.layout.clins else {
            return Ok(());
        };
        for (index, clin) in data.pricing.clins.iter().enumerate() {
            let (name, value) = table.cells(index)?;
            doc.set_value(table.sheet, name, CellValue::text(&clin.name))?;
            doc.set_value(table.sheet, value, CellValue::Number(clin.value))?;
        }
        Ok(())
    }

    /// Technician initials above the summary sheet's per-technician totals.
    fn write_summary_technicians(
        &self,
        doc: &mut dyn Document,
        technicians: &TechnicianIndex,
    ) -> Result<()> {
        let header = self
            .layout
            .sections
            .iter()
            .filter_map(|s| s.technicians)
            .find_map(|t| t.summary_header);
        let Some((row, column)) = header else {
            return Ok(());
        };
        let first = CellAddress::from_excel(column, row)?;
        for (offset, tech) in technicians.iter().enumerate() {
            let cell = first.right(column_offset(offset)?)?;
            doc.set_value(self.layout.summary_sheet, cell, CellValue::text(&tech.initials))?;
        }
        Ok(())
    }

    fn write_group(
        &self,
        doc: &mut dyn Document,
        section: &Section,
        index: usize,
        group: &MeasurementGroup,
        technicians: &TechnicianIndex,
    ) -> Result<()> {
        let sheet = sheet_for(section, index);

        if let Some(label) = &section.label {
            let cell = section.label_address(label, index)?;
            doc.set_value(&sheet, cell, label_value(label.value, &group.name))?;
        }

        if let Some(techs) = &section.technicians {
            for (offset, tech) in technicians.iter().enumerate() {
                let cell = section.technician_header(techs, column_offset(offset)?, index)?;
                doc.set_value(&sheet, cell, CellValue::text(&tech.initials))?;
            }
        }

        for (row, record) in group.records.iter().enumerate() {
            let row = u32::try_from(row).map_err(|_| ReportError::Capacity {
                section: section.id.to_string(),
                group: group.name.clone(),
                rows: group.len(),
                capacity: section.capacity(index).unwrap_or(0),
            })?;
            let cursor = RowCursor {
                section,
                sheet: &sheet,
                group: index,
                row,
            };
            self.write_record(doc, &cursor, record, technicians)?;
        }
        Ok(())
    }

    fn write_record(
        &self,
        doc: &mut dyn Document,
        at: &RowCursor<'_>,
        record: &MeasurementRecord,
        technicians: &TechnicianIndex,
    ) -> Result<()> {
        let section = at.section;

        for (field, column) in section.columns {
            doc.set_value(at.sheet, at.cell(column)?, field.value(record))?;
        }

        if let Some(color) = self.options.rules.classify(record) {
            for column in section.highlight_columns {
                doc.set_highlight(at.sheet, at.cell(column)?, Highlight::centered(color))?;
            }
        }

        if let Some(blanking) = section.replace_blanking {
            if record.special_case == Some(SpecialCase::Replace) {
                for column in blanking.clear {
                    doc.set_value(at.sheet, at.cell(column)?, CellValue::Empty)?;
                }
                let (column, align) = blanking.highlight;
                doc.set_highlight(
                    at.sheet,
                    at.cell(column)?,
                    Highlight::new(HighlightColor::Yellow, align),
                )?;
            }
        }

        if let Some(marker) = section.other_marker {
            if record.is_other_sized() {
                let (column, align) = marker.marker;
                doc.set_highlight(
                    at.sheet,
                    at.cell(column)?,
                    Highlight::new(HighlightColor::Yellow, align),
                )?;
                let (column, align) = marker.label;
                let label = at.cell(column)?;
                doc.set_value(at.sheet, label, CellValue::text(OTHER_LABEL))?;
                doc.set_highlight(at.sheet, label, Highlight::new(HighlightColor::Yellow, align))?;
            }
        }

        if let Some(techs) = &section.technicians {
            self.write_indicators(doc, at, techs, record, technicians)?;
        }
        Ok(())
    }

    fn write_indicators(
        &self,
        doc: &mut dyn Document,
        at: &RowCursor<'_>,
        techs: &TechnicianColumns,
        record: &MeasurementRecord,
        technicians: &TechnicianIndex,
    ) -> Result<()> {
        let value_cell = at.cell(techs.value_column)?;
        let formulas = indicator_formulas(record, technicians, value_cell);
        for (offset, formula) in formulas.iter().enumerate() {
            let cell = at
                .section
                .technician_cell(techs, column_offset(offset)?, at.row, at.group)?;
            doc.set_formula(at.sheet, cell, formula)?;
        }
        Ok(())
    }

    fn unused_placeholders(&self, doc: &dyn Document, used: usize) -> Vec<String> {
        let Some(placeholders) = self.layout.placeholders else {
            return Vec::new();
        };
        (used..placeholders.count)
            .map(placeholder_name)
            .filter(|name| doc.has_sheet(name))
            .collect()
    }
}

/// One data row of one group.
struct RowCursor<'s> {
    section: &'s Section,
    sheet: &'s str,
    group: usize,
    row: u32,
}

impl RowCursor<'_> {
    fn cell(&self, column: &str) -> Result<CellAddress> {
        self.section.cell_at(column, self.row, self.group)
    }
}

fn sheet_for(section: &Section, group: usize) -> String {
    match section.sheet {
        SheetTarget::Group => placeholder_name(group),
        SheetTarget::Named(name) => name.to_string(),
    }
}

fn label_value(value: LabelValue, group_name: &str) -> CellValue {
    match value {
        LabelValue::GroupName => CellValue::text(group_name),
        // a merged day keeps every date as text
        LabelValue::WorkDate if group_name.contains(MERGE_SEPARATOR) => {
            CellValue::text(SheetNaming::WorkDate.name_for(group_name))
        }
        LabelValue::WorkDate => {
            parse_iso_date(group_name).map_or_else(|| CellValue::text(group_name), CellValue::Date)
        }
    }
}

fn column_offset(offset: usize) -> Result<u32> {
    u32::try_from(offset)
        .map_err(|_| ReportError::Template(format!("column offset {offset} is off the sheet")))
}

/// Stable sort by work date when every group key is a date; day sheets are
/// filled in calendar order.
fn order_by_work_date(records: &mut [MeasurementRecord]) {
    let dated = records
        .iter()
        .all(|r| parse_iso_date(&r.group_key).is_some());
    if dated {
        records.sort_by_key(|r| parse_iso_date(&r.group_key));
    }
}
