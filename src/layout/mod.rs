//! Static report layouts: where every value of every report variant lands.
//!
//! A [`ReportLayout`] is plain data. The composer walks it; nothing in here
//! touches a document. Cell positions are written the way they appear in the
//! workbook (`"E11"`, column `"AY"`, 1-based rows) and resolved through the
//! address calculator in [`address`].

mod address;
mod fields;
mod pricing_sheet;
mod project_summary;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ReportError;
use crate::highlight::Alignment;
use crate::model::PricingModel;
use crate::sheet_name::SheetNaming;

pub use fields::{FixedField, RowField};
pub use pricing_sheet::{PRICING_INCH_FOOT, PRICING_SQUARE_FOOT};
pub use project_summary::{PROJECT_SUMMARY_INCH_FOOT, PROJECT_SUMMARY_SQUARE_FOOT};

/// Which document is being produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportKind {
    PricingSheet,
    ProjectSummary,
}

impl ReportKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PricingSheet => "pricing-sheet",
            Self::ProjectSummary => "project-summary",
        }
    }

    /// Human title used in delivered file names.
    pub fn title(self) -> &'static str {
        match self {
            Self::PricingSheet => "Pricing Sheet",
            Self::ProjectSummary => "Project Summary",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportKind {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "pricing-sheet" | "pricing" => Ok(Self::PricingSheet),
            "project-summary" | "summary" => Ok(Self::ProjectSummary),
            other => Err(ReportError::Validation(format!("unknown report kind {other:?}"))),
        }
    }
}

/// Identifies a row-oriented block of a layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionId {
    /// Per-hazard survey rows of a pricing sheet.
    SurveyData,
    /// Per-hazard production rows of a project summary day sheet.
    Production,
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SurveyData => "survey data",
            Self::Production => "production",
        })
    }
}

/// The worksheet a section writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetTarget {
    /// The group's own placeholder sheet (`"1"`, `"2"`, ...).
    Group,
    /// One sheet shared by all groups.
    Named(&'static str),
}

/// How a group index and row index turn into a worksheet row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOrigin {
    /// `base + group * stride + row`, each group holding `capacity` rows.
    Uniform { base: u32, stride: u32, capacity: u32 },
    /// Literal starting row and capacity per group.
    Table(&'static [RowBlock]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowBlock {
    pub start: u32,
    pub capacity: u32,
}

/// Where a group's label goes, relative to its sheet or block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelRow {
    /// Absolute row on the group's sheet.
    Fixed(u32),
    /// Rows below the first row of the group's block.
    BlockOffset(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelValue {
    GroupName,
    /// The group's work date as a date cell (falls back to the name).
    WorkDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupLabel {
    pub column: &'static str,
    pub row: LabelRow,
    pub value: LabelValue,
}

/// Cells flagged when a hazard is sized "Other": a highlighted marker and a
/// highlighted label holding the text `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OtherMarker {
    pub marker: (&'static str, Alignment),
    pub label: (&'static str, Alignment),
}

/// Handling of the `Replace` special case: blank location columns and
/// highlight the description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplaceBlanking {
    pub clear: &'static [&'static str],
    pub highlight: (&'static str, Alignment),
}

/// Per-technician indicator columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TechnicianColumns {
    /// First indicator column on the group sheet.
    pub first_column: &'static str,
    /// Number of indicator columns the template provides.
    pub capacity: u32,
    /// Column the indicator formulas pick up when the technician matches.
    pub value_column: &'static str,
    /// The initials header sits this many rows above the group's first row.
    pub header_rows_above: u32,
    /// Initials header on the summary sheet: (row, first column).
    pub summary_header: Option<(u32, &'static str)>,
}

/// A row-oriented block of per-record values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Section {
    pub id: SectionId,
    pub sheet: SheetTarget,
    pub rows: RowOrigin,
    pub columns: &'static [(RowField, &'static str)],
    /// Columns that receive the row's rule-engine highlight.
    pub highlight_columns: &'static [&'static str],
    pub other_marker: Option<OtherMarker>,
    pub replace_blanking: Option<ReplaceBlanking>,
    pub label: Option<GroupLabel>,
    pub technicians: Option<TechnicianColumns>,
}

/// A single-value cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedCell {
    pub sheet: &'static str,
    pub cell: &'static str,
    pub field: FixedField,
}

/// CLIN name/value pairs listed downward from `first_row`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClinTable {
    pub sheet: &'static str,
    pub name_column: &'static str,
    pub value_column: &'static str,
    pub first_row: u32,
    pub capacity: u32,
}

/// Summary-sheet row that pulls one group sheet's subtotals.
///
/// The sheet at position `p` (0 for the first survey sheet) feeds summary row
/// `base_row - p`, columns `first_column ..` (`width` of them), each pointing
/// at the same-offset column of `source_row` on the group sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryBinding {
    pub quantity: &'static str,
    pub base_row: u32,
    /// Number of sheet positions the summary table has rows for.
    pub positions: u32,
    pub first_column: &'static str,
    pub width: u32,
    pub source_first_column: &'static str,
    pub source_row: u32,
}

/// Numbered placeholder sheets, one per group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placeholders {
    pub count: usize,
    pub naming: SheetNaming,
}

/// Everything that distinguishes one report variant from another.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportLayout {
    pub kind: ReportKind,
    pub model: PricingModel,
    /// Default template file name.
    pub template: &'static str,
    /// Extension of the finished document.
    pub extension: &'static str,
    pub max_groups: usize,
    pub summary_sheet: &'static str,
    pub placeholders: Option<Placeholders>,
    pub sections: &'static [Section],
    pub fixed: &'static [FixedCell],
    pub clins: Option<ClinTable>,
    pub summary_bindings: &'static [SummaryBinding],
}

/// Layout for a report kind and pricing model.
pub fn layout_for(kind: ReportKind, model: PricingModel) -> &'static ReportLayout {
    match (kind, model) {
        (ReportKind::PricingSheet, PricingModel::InchFoot) => &PRICING_INCH_FOOT,
        (ReportKind::PricingSheet, PricingModel::SquareFoot) => &PRICING_SQUARE_FOOT,
        (ReportKind::ProjectSummary, PricingModel::InchFoot) => &PROJECT_SUMMARY_INCH_FOOT,
        (ReportKind::ProjectSummary, PricingModel::SquareFoot) => &PROJECT_SUMMARY_SQUARE_FOOT,
    }
}

/// All built-in layouts.
pub fn all_layouts() -> [&'static ReportLayout; 4] {
    [
        &PRICING_INCH_FOOT,
        &PRICING_SQUARE_FOOT,
        &PROJECT_SUMMARY_INCH_FOOT,
        &PROJECT_SUMMARY_SQUARE_FOOT,
    ]
}

impl ReportLayout {
    /// Named worksheets the layout writes to, in first-use order, the
    /// summary sheet first.
    pub fn fixed_sheets(&self) -> Vec<&'static str> {
        let mut sheets = vec![self.summary_sheet];
        let named = self.sections.iter().filter_map(|s| match s.sheet {
            SheetTarget::Named(name) => Some(name),
            SheetTarget::Group => None,
        });
        let candidates = self
            .fixed
            .iter()
            .map(|c| c.sheet)
            .chain(self.clins.map(|c| c.sheet))
            .chain(named);
        for sheet in candidates {
            if !sheets.contains(&sheet) {
                sheets.push(sheet);
            }
        }
        sheets
    }

    /// Every worksheet a template for this layout must provide: the named
    /// sheets followed by the numbered placeholders.
    pub fn template_sheets(&self) -> Vec<String> {
        let placeholders = self.placeholders.map_or(0, |p| p.count);
        self.fixed_sheets()
            .into_iter()
            .map(str::to_string)
            .chain((1..=placeholders).map(|n| n.to_string()))
            .collect()
    }
}
