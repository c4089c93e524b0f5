//! Project summary layouts: one day sheet per work date, rolled up on SUMMARY.

use crate::model::PricingModel;
use crate::sheet_name::SheetNaming;

use super::{
    FixedCell, FixedField, GroupLabel, LabelRow, LabelValue, Placeholders, ReportKind,
    ReportLayout, RowBlock, RowField, RowOrigin, Section, SectionId, SheetTarget, SummaryBinding,
    TechnicianColumns,
};

const SUMMARY: &str = "SUMMARY";

const fn summary(cell: &'static str, field: FixedField) -> FixedCell {
    FixedCell {
        sheet: SUMMARY,
        cell,
        field,
    }
}

const INCH_FOOT_FIXED: [FixedCell; 17] = [
    summary("E1", FixedField::ReportDate),
    summary("D3", FixedField::ProjectName),
    summary("C8", FixedField::PoNumber),
    summary("P2", FixedField::BdmInitials),
    summary("P4", FixedField::SurveyorInitials),
    summary("Q2", FixedField::TerritoryName),
    summary("Q4", FixedField::SurveyDate),
    summary("R6", FixedField::HazardCount),
    summary("R10", FixedField::HazardInchFeet),
    summary("R17", FixedField::LinearFeetCurb),
    summary("BE89", FixedField::CustomerName),
    summary("CD89", FixedField::EstimatedSidewalkMiles),
    summary("BG89", FixedField::ContactAddress),
    summary("BI89", FixedField::ContactName),
    summary("BO89", FixedField::ContactTitle),
    summary("BS89", FixedField::ContactPhone),
    summary("BW89", FixedField::ContactEmail),
];

const SQUARE_FOOT_FIXED: [FixedCell; 11] = [
    summary("E1", FixedField::ReportDate),
    summary("D3", FixedField::ProjectName),
    summary("C8", FixedField::PoNumber),
    summary("M2", FixedField::CustomerName),
    summary("P2", FixedField::BdmInitials),
    summary("P4", FixedField::SurveyorInitials),
    summary("Q2", FixedField::TerritoryName),
    summary("Q4", FixedField::SurveyDate),
    summary("R6", FixedField::HazardCount),
    summary("R10", FixedField::HazardSquareFeet),
    summary("R17", FixedField::LinearFeetCurb),
];

const WORK_DATE: GroupLabel = GroupLabel {
    column: "E",
    row: LabelRow::Fixed(11),
    value: LabelValue::WorkDate,
};

const INCH_FOOT_COLUMNS: [(RowField, &str); 9] = [
    (RowField::Width, "A"),
    (RowField::Length, "B"),
    (RowField::H1, "D"),
    (RowField::H2, "E"),
    (RowField::MeasuredHazardLength, "F"),
    (RowField::Address, "G"),
    (RowField::Description, "H"),
    (RowField::TechInitials, "M"),
    (RowField::ObjectId, "N"),
];

const SQUARE_FOOT_COLUMNS: [(RowField, &str); 9] = [
    (RowField::Width, "A"),
    (RowField::Length, "B"),
    (RowField::Area, "C"),
    (RowField::HazardSize, "D"),
    (RowField::CurbLength, "F"),
    (RowField::Address, "G"),
    (RowField::Description, "H"),
    (RowField::TechInitials, "M"),
    (RowField::ObjectId, "N"),
];

const INCH_FOOT_SECTIONS: [Section; 1] = [Section {
    id: SectionId::Production,
    sheet: SheetTarget::Group,
    rows: RowOrigin::Uniform {
        base: 22,
        stride: 0,
        capacity: 400,
    },
    columns: &INCH_FOOT_COLUMNS,
    highlight_columns: &["E", "N"],
    other_marker: None,
    replace_blanking: None,
    label: Some(WORK_DATE),
    technicians: Some(TechnicianColumns {
        first_column: "P",
        capacity: 17,
        value_column: "J",
        header_rows_above: 1,
        summary_header: Some((57, "N")),
    }),
}];

const FULL_DAY: RowBlock = RowBlock {
    start: 22,
    capacity: 400,
};
const SHORT_DAY: RowBlock = RowBlock {
    start: 18,
    capacity: 150,
};

/// Day sheets 1-10 are full sheets, 11-20 short sheets with a smaller header.
const SQUARE_FOOT_BLOCKS: [RowBlock; 20] = [
    FULL_DAY, FULL_DAY, FULL_DAY, FULL_DAY, FULL_DAY, FULL_DAY, FULL_DAY, FULL_DAY, FULL_DAY,
    FULL_DAY, SHORT_DAY, SHORT_DAY, SHORT_DAY, SHORT_DAY, SHORT_DAY, SHORT_DAY, SHORT_DAY,
    SHORT_DAY, SHORT_DAY, SHORT_DAY,
];

const SQUARE_FOOT_SECTIONS: [Section; 1] = [Section {
    id: SectionId::Production,
    sheet: SheetTarget::Group,
    rows: RowOrigin::Table(&SQUARE_FOOT_BLOCKS),
    columns: &SQUARE_FOOT_COLUMNS,
    highlight_columns: &["D", "N"],
    other_marker: None,
    replace_blanking: None,
    label: Some(WORK_DATE),
    technicians: Some(TechnicianColumns {
        first_column: "P",
        capacity: 17,
        value_column: "C",
        header_rows_above: 1,
        summary_header: Some((47, "N")),
    }),
}];

const INCH_FOOT_BINDINGS: [SummaryBinding; 2] = [
    SummaryBinding {
        quantity: "completed curbs",
        base_row: 49,
        positions: 30,
        first_column: "E",
        width: 5,
        source_first_column: "O",
        source_row: 8,
    },
    SummaryBinding {
        quantity: "completed sidewalks",
        base_row: 87,
        positions: 30,
        first_column: "A",
        width: 37,
        source_first_column: "O",
        source_row: 5,
    },
];

const SQUARE_FOOT_BINDINGS: [SummaryBinding; 2] = [
    SummaryBinding {
        quantity: "completed curbs",
        base_row: 39,
        positions: 20,
        first_column: "E",
        width: 5,
        source_first_column: "O",
        source_row: 8,
    },
    SummaryBinding {
        quantity: "completed square feet",
        base_row: 67,
        positions: 20,
        first_column: "A",
        width: 37,
        source_first_column: "O",
        source_row: 5,
    },
];

pub const PROJECT_SUMMARY_INCH_FOOT: ReportLayout = ReportLayout {
    kind: ReportKind::ProjectSummary,
    model: PricingModel::InchFoot,
    template: "PS 30 tabs Template - MACRO RB 11-9-2023.xlsm",
    extension: "xlsm",
    max_groups: 30,
    summary_sheet: SUMMARY,
    placeholders: Some(Placeholders {
        count: 30,
        naming: SheetNaming::WorkDate,
    }),
    sections: &INCH_FOOT_SECTIONS,
    fixed: &INCH_FOOT_FIXED,
    clins: None,
    summary_bindings: &INCH_FOOT_BINDINGS,
};

/// Square-foot day sheets. No production template exists for this variant
/// yet; the cells below are this crate's own template map, laid out after the
/// inch-foot summary, and must be revisited once a real template is drawn.
pub const PROJECT_SUMMARY_SQUARE_FOOT: ReportLayout = ReportLayout {
    kind: ReportKind::ProjectSummary,
    model: PricingModel::SquareFoot,
    template: "PS SQFT 20 tabs Template.xlsx",
    extension: "xlsx",
    max_groups: 20,
    summary_sheet: SUMMARY,
    placeholders: Some(Placeholders {
        count: 20,
        naming: SheetNaming::WorkDate,
    }),
    sections: &SQUARE_FOOT_SECTIONS,
    fixed: &SQUARE_FOOT_FIXED,
    clins: None,
    summary_bindings: &SQUARE_FOOT_BINDINGS,
};

#[cfg(test)]
#[allow(clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn summary_tables_sit_below_their_headers() {
        // curbs: rows 20..=49, sidewalks 58..=87 under the initials header on 57
        let [curbs, sidewalks] = INCH_FOOT_BINDINGS;
        assert_eq!(curbs.base_row + 1 - curbs.positions, 20);
        assert_eq!(sidewalks.base_row + 1 - sidewalks.positions, 58);
        let [_, sqft] = SQUARE_FOOT_BINDINGS;
        assert_eq!(sqft.base_row + 1 - sqft.positions, 48);
    }

    #[test]
    fn short_day_sheets_start_higher() {
        assert_eq!(SQUARE_FOOT_BLOCKS[9].start, 22);
        assert_eq!(SQUARE_FOOT_BLOCKS[10].start, 18);
        assert_eq!(SQUARE_FOOT_BLOCKS[19].capacity, 150);
    }
}
