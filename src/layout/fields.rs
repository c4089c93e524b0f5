//! Logical values a layout places, and how each is read from the data.

use chrono::NaiveDate;

use crate::document::CellValue;
use crate::error::Result;
use crate::model::{HazardSize, MeasurementRecord, ReportData};

/// A per-record value written on every data row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowField {
    Width,
    Length,
    H1,
    H2,
    InchFeet,
    CurbLength,
    MeasuredHazardLength,
    Area,
    Latitude,
    Longitude,
    Address,
    /// Address in upper case.
    AddressUpper,
    Description,
    HazardSize,
    TechInitials,
    ObjectId,
    /// `1` when the hazard is Small, else `0`.
    IsSmall,
    IsMedium,
    IsLarge,
}

impl RowField {
    pub fn value(self, record: &MeasurementRecord) -> CellValue {
        match self {
            Self::Width => CellValue::Number(record.width),
            Self::Length => CellValue::Number(record.length),
            Self::H1 => CellValue::Number(record.h1),
            Self::H2 => CellValue::Number(record.h2),
            Self::InchFeet => CellValue::Number(record.inch_feet),
            Self::CurbLength => CellValue::Number(record.curb_length),
            Self::MeasuredHazardLength => CellValue::Number(record.measured_hazard_length),
            Self::Area => CellValue::Number(record.area),
            Self::Latitude => CellValue::Number(record.latitude),
            Self::Longitude => CellValue::Number(record.longitude),
            Self::Address => CellValue::text(record.address.as_deref().unwrap_or("")),
            Self::AddressUpper => {
                CellValue::text(record.address.as_deref().unwrap_or("").to_uppercase())
            }
            Self::Description => CellValue::text(record.description()),
            Self::HazardSize => CellValue::text(record.hazard_label()),
            Self::TechInitials => CellValue::text(record.initials()),
            Self::ObjectId => CellValue::Number(record.object_id as f64),
            Self::IsSmall => flag(record.hazard_size == Some(HazardSize::Small)),
            Self::IsMedium => flag(record.hazard_size == Some(HazardSize::Medium)),
            Self::IsLarge => flag(record.hazard_size == Some(HazardSize::Large)),
        }
    }
}

/// A project-level value written once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FixedField {
    /// Date the report is generated.
    ReportDate,
    ProjectName,
    PoNumber,
    CustomerName,
    TerritoryName,
    BdmInitials,
    SurveyorInitials,
    /// Reserved cell for a second deal owner; written blank.
    AltDealOwner,
    SurveyDate,
    /// Survey date as `M/D/YYYY` text.
    SurveyDateText,
    ContactName,
    ContactTitle,
    ContactEmail,
    ContactPhone,
    ContactAddress,
    HazardCount,
    HazardInchFeet,
    HazardSquareFeet,
    LinearFeetCurb,
    EstimatedSidewalkMiles,
    SurveyorSpeed,
    /// `1` when the survey-hazards picklist equals the value.
    SurveyHazardsIs(i64),
    HazardDensityIs(i64),
    PanelSizeIs(i64),
    DistanceFromSurveyor,
    DistanceFromOps,
    /// Territory royalty as a fraction.
    RoyaltyRate,
    /// Commission as a fraction.
    CommissionRate,
    NumberOfTechnicians,
    TotalSurveyArea,
    TotalReplaceArea,
}

impl FixedField {
    pub fn value(self, data: &ReportData, today: NaiveDate) -> Result<CellValue> {
        let contact = data.contact.as_ref();
        let contact_text =
            |pick: fn(&crate::model::Contact) -> Option<&str>| CellValue::text(contact.and_then(pick).unwrap_or(""));

        Ok(match self {
            Self::ReportDate => CellValue::Date(today),
            Self::ProjectName => CellValue::text(&data.name),
            Self::PoNumber => CellValue::text(data.po_number.as_deref().unwrap_or("")),
            Self::CustomerName => CellValue::text(&data.customer.name),
            Self::TerritoryName => CellValue::text(&data.territory.name),
            Self::BdmInitials => CellValue::text(&data.bdm.initials),
            Self::SurveyorInitials => {
                CellValue::text(data.surveyor.as_ref().map_or("", |s| s.initials.as_str()))
            }
            Self::AltDealOwner => CellValue::Empty,
            Self::SurveyDate => data.survey_date()?.map_or(CellValue::Empty, CellValue::Date),
            Self::SurveyDateText => data
                .survey_date()?
                .map_or(CellValue::Empty, |d| CellValue::Text(d.format("%-m/%-d/%Y").to_string())),
            Self::ContactName => contact_text(|c| Some(c.name.as_str())),
            Self::ContactTitle => contact_text(|c| c.title.as_deref()),
            Self::ContactEmail => contact_text(|c| c.email.as_deref()),
            Self::ContactPhone => contact_text(|c| c.phone_number.as_deref()),
            Self::ContactAddress => contact_text(|c| c.address.as_deref()),
            Self::HazardCount => CellValue::Number(data.hazards.count as f64),
            Self::HazardInchFeet => CellValue::Number(data.hazards.inch_feet),
            Self::HazardSquareFeet => CellValue::Number(data.hazards.square_feet),
            Self::LinearFeetCurb => CellValue::Number(data.hazards.linear_feet_curb),
            Self::EstimatedSidewalkMiles => CellValue::Number(data.pricing.estimated_sidewalk_miles),
            Self::SurveyorSpeed => CellValue::Number(data.pricing.surveyor_speed),
            Self::SurveyHazardsIs(n) => flag(data.pricing.survey_hazards == n),
            Self::HazardDensityIs(n) => flag(data.pricing.hazard_density == n),
            Self::PanelSizeIs(n) => flag(data.pricing.panel_size == n),
            Self::DistanceFromSurveyor => CellValue::Number(data.pricing.distance_from_surveyor),
            Self::DistanceFromOps => CellValue::Number(data.pricing.distance_from_ops),
            Self::RoyaltyRate => CellValue::Number(data.territory.royalty_rate / 100.0),
            Self::CommissionRate => CellValue::Number(data.pricing.commission_rate / 100.0),
            Self::NumberOfTechnicians => {
                CellValue::Number(data.pricing.number_of_technicians as f64)
            }
            Self::TotalSurveyArea => CellValue::Number(data.total_survey_area()),
            Self::TotalReplaceArea => CellValue::Number(data.total_replace_area()),
        })
    }
}

fn flag(on: bool) -> CellValue {
    CellValue::Number(if on { 1.0 } else { 0.0 })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{Customer, Pricing, PricingModel, SpecialCase, Territory, User};

    fn data() -> ReportData {
        ReportData {
            id: 1,
            name: "Elm".into(),
            po_number: None,
            customer: Customer {
                name: "City".into(),
                ..Default::default()
            },
            territory: Territory {
                name: "North".into(),
                royalty_rate: 5.0,
                ..Default::default()
            },
            bdm: User {
                initials: "BD".into(),
                ..Default::default()
            },
            surveyor: None,
            survey_date: Some("2024-03-09".into()),
            contact: None,
            pricing: Pricing {
                panel_size: 2,
                commission_rate: 12.5,
                ..Default::default()
            },
            pricing_model: PricingModel::InchFoot,
            hazards: Default::default(),
            measurements: Vec::new(),
        }
    }

    #[test]
    fn fixed_values() {
        let today = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
        let d = data();
        let value = |f: FixedField| f.value(&d, today).unwrap();
        assert_eq!(value(FixedField::ReportDate), CellValue::Date(today));
        assert_eq!(value(FixedField::SurveyDateText), CellValue::Text("3/9/2024".into()));
        assert_eq!(value(FixedField::PanelSizeIs(2)), CellValue::Number(1.0));
        assert_eq!(value(FixedField::PanelSizeIs(3)), CellValue::Number(0.0));
        assert_eq!(value(FixedField::RoyaltyRate), CellValue::Number(0.05));
        assert_eq!(value(FixedField::CommissionRate), CellValue::Number(0.125));
        assert_eq!(value(FixedField::SurveyorInitials), CellValue::Empty);
        assert_eq!(value(FixedField::ContactEmail), CellValue::Empty);
        assert_eq!(value(FixedField::PoNumber), CellValue::Empty);
    }

    #[test]
    fn row_values() {
        let record = MeasurementRecord {
            object_id: 42,
            address: Some("1 Main St".into()),
            hazard_size: Some(HazardSize::Medium),
            special_case: Some(SpecialCase::Curb),
            tech: "jdoe@x.com".into(),
            ..Default::default()
        };
        assert_eq!(RowField::AddressUpper.value(&record), CellValue::Text("1 MAIN ST".into()));
        assert_eq!(RowField::IsMedium.value(&record), CellValue::Number(1.0));
        assert_eq!(RowField::IsSmall.value(&record), CellValue::Number(0.0));
        assert_eq!(RowField::ObjectId.value(&record), CellValue::Number(42.0));
        assert_eq!(RowField::Description.value(&record), CellValue::Text("Curb".into()));
        assert_eq!(RowField::TechInitials.value(&record), CellValue::Text("JO".into()));
    }
}
