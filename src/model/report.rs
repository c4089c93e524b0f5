use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{ReportError, Result};

use super::record::{HazardSize, MeasurementGroup, MeasurementRecord};

/// Report variant: how hazards are measured and priced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PricingModel {
    #[serde(rename = "Inch Foot", alias = "inch-foot", alias = "inch_foot")]
    InchFoot,
    #[serde(rename = "Square Foot", alias = "square-foot", alias = "square_foot")]
    SquareFoot,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub initials: String,
    #[serde(default)]
    pub work_phone: Option<String>,
    #[serde(default)]
    pub cell_phone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Territory {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub label: String,
    /// Percentage, e.g. `5.0` for 5%.
    #[serde(default)]
    pub royalty_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Clin {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    #[serde(default)]
    pub estimated_sidewalk_miles: f64,
    #[serde(default)]
    pub surveyor_speed: f64,
    /// Picklist choice 1..=3.
    #[serde(default)]
    pub survey_hazards: i64,
    /// Picklist choice 1..=3.
    #[serde(default)]
    pub hazard_density: i64,
    /// Picklist choice 1..=3.
    #[serde(default)]
    pub panel_size: i64,
    #[serde(default)]
    pub distance_from_surveyor: f64,
    #[serde(default)]
    pub distance_from_ops: f64,
    /// Percentage, e.g. `10.0` for 10%.
    #[serde(default)]
    pub commission_rate: f64,
    #[serde(default)]
    pub base_rate: f64,
    #[serde(default)]
    pub number_of_technicians: i64,
    #[serde(default)]
    pub clins: Vec<Clin>,
}

/// Project-wide hazard totals computed upstream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hazards {
    #[serde(default)]
    pub count: i64,
    #[serde(default)]
    pub inch_feet: f64,
    #[serde(default)]
    pub square_feet: f64,
    #[serde(default)]
    pub linear_feet_curb: f64,
}

/// Everything the engine needs to fill one report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportData {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub po_number: Option<String>,
    pub customer: Customer,
    pub territory: Territory,
    #[serde(rename = "business_development_manager")]
    pub bdm: User,
    #[serde(default)]
    pub surveyor: Option<User>,
    /// ISO `YYYY-MM-DD`.
    #[serde(default)]
    pub survey_date: Option<String>,
    #[serde(default)]
    pub contact: Option<Contact>,
    #[serde(default)]
    pub pricing: Pricing,
    pub pricing_model: PricingModel,
    #[serde(default)]
    pub hazards: Hazards,
    #[serde(default)]
    pub measurements: Vec<MeasurementGroup>,
}

impl ReportData {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// All records in payload order. A record without its own group key takes
    /// the name of the payload group it arrived in.
    pub fn records(&self) -> Vec<MeasurementRecord> {
        self.measurements
            .iter()
            .flat_map(|group| {
                group.records.iter().map(move |record| {
                    let mut record = record.clone();
                    if record.group_key.trim().is_empty() {
                        record.group_key.clone_from(&group.name);
                    }
                    record
                })
            })
            .collect()
    }

    pub fn record_count(&self) -> usize {
        self.measurements.iter().map(MeasurementGroup::len).sum()
    }

    pub fn survey_date(&self) -> Result<Option<NaiveDate>> {
        match self.survey_date.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => parse_iso_date(raw)
                .map(Some)
                .ok_or_else(|| ReportError::Validation(format!("survey date {raw:?} is not YYYY-MM-DD"))),
        }
    }

    pub fn total_survey_area(&self) -> f64 {
        self.measurements
            .iter()
            .flat_map(|g| &g.records)
            .map(|r| r.area)
            .sum()
    }

    /// Area of records sized `Replace`.
    pub fn total_replace_area(&self) -> f64 {
        self.measurements
            .iter()
            .flat_map(|g| &g.records)
            .filter(|r| r.hazard_size == Some(HazardSize::Replace))
            .map(|r| r.area)
            .sum()
    }
}

/// Parse `YYYY-MM-DD`, tolerating a trailing time component.
pub(crate) fn parse_iso_date(raw: &str) -> Option<NaiveDate> {
    let date_part = raw.trim().get(..10).unwrap_or(raw.trim());
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}
