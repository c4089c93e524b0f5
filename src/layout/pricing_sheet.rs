//! Pricing sheet layouts: pricing parameters up front, survey hazards per group.

use crate::highlight::Alignment;
use crate::model::PricingModel;
use crate::sheet_name::SheetNaming;

use super::{
    ClinTable, FixedCell, FixedField, GroupLabel, LabelRow, LabelValue, OtherMarker,
    Placeholders, ReplaceBlanking, ReportKind, ReportLayout, RowField, RowOrigin, Section,
    SectionId, SheetTarget,
};

const SUMMARY: &str = "SUMMARY";
const SURVEY_COST: &str = "Project Survey Cost";
const FULL_SCOPE: &str = "JPC - Full Scope";
const GREEN_SAVINGS: &str = "GREEN SAVINGS";

const fn at(sheet: &'static str, cell: &'static str, field: FixedField) -> FixedCell {
    FixedCell { sheet, cell, field }
}

const INCH_FOOT_FIXED: [FixedCell; 26] = [
    at(SURVEY_COST, "D4", FixedField::EstimatedSidewalkMiles),
    at(SURVEY_COST, "D5", FixedField::SurveyorSpeed),
    at(SURVEY_COST, "D7", FixedField::SurveyHazardsIs(1)),
    at(SURVEY_COST, "D8", FixedField::SurveyHazardsIs(2)),
    at(SURVEY_COST, "D9", FixedField::SurveyHazardsIs(3)),
    at(SURVEY_COST, "D11", FixedField::HazardDensityIs(1)),
    at(SURVEY_COST, "D12", FixedField::HazardDensityIs(2)),
    at(SURVEY_COST, "D13", FixedField::HazardDensityIs(3)),
    at(SURVEY_COST, "D15", FixedField::PanelSizeIs(1)),
    at(SURVEY_COST, "D16", FixedField::PanelSizeIs(2)),
    at(SURVEY_COST, "D17", FixedField::PanelSizeIs(3)),
    at(FULL_SCOPE, "C6", FixedField::DistanceFromSurveyor),
    at(FULL_SCOPE, "C7", FixedField::DistanceFromOps),
    at(FULL_SCOPE, "C10", FixedField::RoyaltyRate),
    at(FULL_SCOPE, "C11", FixedField::CommissionRate),
    at(SUMMARY, "D3", FixedField::CustomerName),
    at(SUMMARY, "E3", FixedField::ContactAddress),
    at(SUMMARY, "F3", FixedField::BdmInitials),
    at(SUMMARY, "G3", FixedField::SurveyorInitials),
    at(SUMMARY, "H3", FixedField::AltDealOwner),
    at(SUMMARY, "I3", FixedField::ContactName),
    at(SUMMARY, "J3", FixedField::ContactTitle),
    at(SUMMARY, "K3", FixedField::ContactEmail),
    at(SUMMARY, "L3", FixedField::ContactPhone),
    at(GREEN_SAVINGS, "E44", FixedField::NumberOfTechnicians),
    at(GREEN_SAVINGS, "F44", FixedField::NumberOfTechnicians),
];

const INCH_FOOT_COLUMNS: [(RowField, &str); 10] = [
    (RowField::IsSmall, "B"),
    (RowField::IsMedium, "C"),
    (RowField::IsLarge, "D"),
    (RowField::CurbLength, "E"),
    (RowField::Description, "F"),
    (RowField::Width, "G"),
    (RowField::Length, "H"),
    (RowField::MeasuredHazardLength, "J"),
    (RowField::InchFeet, "K"),
    (RowField::ObjectId, "T"),
];

const INCH_FOOT_SECTIONS: [Section; 1] = [Section {
    id: SectionId::SurveyData,
    sheet: SheetTarget::Group,
    rows: RowOrigin::Uniform {
        base: 26,
        stride: 0,
        capacity: 400,
    },
    columns: &INCH_FOOT_COLUMNS,
    highlight_columns: &[],
    other_marker: Some(OtherMarker {
        marker: ("A", Alignment::Center),
        label: ("V", Alignment::Center),
    }),
    replace_blanking: None,
    label: Some(GroupLabel {
        column: "C",
        row: LabelRow::Fixed(1),
        value: LabelValue::GroupName,
    }),
    technicians: None,
}];

const SQUARE_FOOT_FIXED: [FixedCell; 7] = [
    at(SUMMARY, "B2", FixedField::CustomerName),
    at(SUMMARY, "B4", FixedField::ProjectName),
    at(SUMMARY, "K17", FixedField::EstimatedSidewalkMiles),
    at(SUMMARY, "H12", FixedField::SurveyDateText),
    at(SUMMARY, "M25", FixedField::TotalSurveyArea),
    at(SUMMARY, "M26", FixedField::TotalReplaceArea),
    at(SUMMARY, "K22", FixedField::SurveyorInitials),
];

const SQUARE_FOOT_COLUMNS: [(RowField, &str); 9] = [
    (RowField::AddressUpper, "B"),
    (RowField::Description, "C"),
    (RowField::Latitude, "D"),
    (RowField::Longitude, "E"),
    (RowField::HazardSize, "F"),
    (RowField::Area, "G"),
    (RowField::Width, "H"),
    (RowField::Length, "I"),
    (RowField::ObjectId, "X"),
];

const SQUARE_FOOT_SECTIONS: [Section; 1] = [Section {
    id: SectionId::SurveyData,
    sheet: SheetTarget::Named("DATA1"),
    rows: RowOrigin::Uniform {
        base: 4,
        stride: 401,
        capacity: 400,
    },
    columns: &SQUARE_FOOT_COLUMNS,
    highlight_columns: &[],
    other_marker: Some(OtherMarker {
        marker: ("A", Alignment::Center),
        label: ("F", Alignment::Left),
    }),
    replace_blanking: Some(ReplaceBlanking {
        clear: &["D", "E"],
        highlight: ("C", Alignment::Left),
    }),
    label: Some(GroupLabel {
        column: "B",
        row: LabelRow::BlockOffset(400),
        value: LabelValue::GroupName,
    }),
    technicians: None,
}];

pub const PRICING_INCH_FOOT: ReportLayout = ReportLayout {
    kind: ReportKind::PricingSheet,
    model: PricingModel::InchFoot,
    template: "TEMP Pricing Inch Foot - 10-2-2023- FINAL.xltx",
    extension: "xlsx",
    max_groups: 20,
    summary_sheet: SUMMARY,
    placeholders: Some(Placeholders {
        count: 20,
        naming: SheetNaming::GroupName,
    }),
    sections: &INCH_FOOT_SECTIONS,
    fixed: &INCH_FOOT_FIXED,
    clins: None,
    summary_bindings: &[],
};

pub const PRICING_SQUARE_FOOT: ReportLayout = ReportLayout {
    kind: ReportKind::PricingSheet,
    model: PricingModel::SquareFoot,
    template: "TEMPLATE - SQFT Pricing - 11-28-23.xlsx",
    extension: "xlsx",
    max_groups: 20,
    summary_sheet: SUMMARY,
    placeholders: None,
    sections: &SQUARE_FOOT_SECTIONS,
    fixed: &SQUARE_FOOT_FIXED,
    clins: Some(ClinTable {
        sheet: SUMMARY,
        name_column: "G",
        value_column: "H",
        first_row: 13,
        capacity: 8,
    }),
    summary_bindings: &[],
};
