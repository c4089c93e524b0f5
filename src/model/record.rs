use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use super::technician::technician_initials;

/// Special-case tag attached to a measurement by the field crew.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SpecialCase {
    Curb,
    BottomHc,
    GutterPan,
    CatchBasin,
    Sw2c,
    C2b,
    Asphalt,
    Driveway,
    Aprons,
    Leadwalk,
    Recuts,
    MetersManholes,
    Quality,
    Replace,
    /// Explicit "None" entry in the picklist.
    NotApplicable,
    /// A label this version does not know about, kept verbatim.
    Other(String),
}

impl SpecialCase {
    const KNOWN: [Self; 15] = [
        Self::Curb,
        Self::BottomHc,
        Self::GutterPan,
        Self::CatchBasin,
        Self::Sw2c,
        Self::C2b,
        Self::Asphalt,
        Self::Driveway,
        Self::Aprons,
        Self::Leadwalk,
        Self::Recuts,
        Self::MetersManholes,
        Self::Quality,
        Self::Replace,
        Self::NotApplicable,
    ];

    pub fn label(&self) -> &str {
        match self {
            Self::Curb => "Curb",
            Self::BottomHc => "Bottom HC",
            Self::GutterPan => "Gutter Pan",
            Self::CatchBasin => "Catch Basin",
            Self::Sw2c => "SW2C",
            Self::C2b => "C2B",
            Self::Asphalt => "Asphalt",
            Self::Driveway => "Driveway",
            Self::Aprons => "Aprons",
            Self::Leadwalk => "Leadwalk",
            Self::Recuts => "Recuts",
            Self::MetersManholes => "Meters - Manholes",
            Self::Quality => "Quality",
            Self::Replace => "Replace",
            Self::NotApplicable => "None",
            Self::Other(label) => label,
        }
    }
}

impl From<String> for SpecialCase {
    fn from(label: String) -> Self {
        let trimmed = label.trim();
        Self::KNOWN
            .into_iter()
            .find(|known| known.label().eq_ignore_ascii_case(trimmed))
            .unwrap_or_else(|| Self::Other(trimmed.to_string()))
    }
}

impl From<&str> for SpecialCase {
    fn from(label: &str) -> Self {
        Self::from(label.to_string())
    }
}

impl From<SpecialCase> for String {
    fn from(value: SpecialCase) -> Self {
        value.label().to_string()
    }
}

impl fmt::Display for SpecialCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Hazard size classification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum HazardSize {
    Small,
    Medium,
    Large,
    Replace,
    Other,
    /// A label this version does not know about, kept verbatim.
    Unlisted(String),
}

impl HazardSize {
    pub fn label(&self) -> &str {
        match self {
            Self::Small => "Small",
            Self::Medium => "Medium",
            Self::Large => "Large",
            Self::Replace => "Replace",
            Self::Other => "Other",
            Self::Unlisted(label) => label,
        }
    }

    /// Small, Medium or Large.
    pub fn is_graded(&self) -> bool {
        matches!(self, Self::Small | Self::Medium | Self::Large)
    }
}

impl From<String> for HazardSize {
    fn from(label: String) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "small" | "s" => Self::Small,
            "medium" | "m" => Self::Medium,
            "large" | "l" => Self::Large,
            "replace" => Self::Replace,
            "other" => Self::Other,
            _ => Self::Unlisted(label.trim().to_string()),
        }
    }
}

impl From<&str> for HazardSize {
    fn from(label: &str) -> Self {
        Self::from(label.to_string())
    }
}

impl From<HazardSize> for String {
    fn from(value: HazardSize) -> Self {
        value.label().to_string()
    }
}

impl fmt::Display for HazardSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One surveyed or produced item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    #[serde(default)]
    pub id: i64,
    pub object_id: i64,
    /// Work date or survey group name the record is bucketed by.
    #[serde(default, rename = "work_date", alias = "group_key")]
    pub group_key: String,
    #[serde(default)]
    pub longitude: f64,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub length: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub h1: f64,
    #[serde(default)]
    pub h2: f64,
    #[serde(default)]
    pub inch_feet: f64,
    #[serde(default)]
    pub curb_length: f64,
    #[serde(default)]
    pub measured_hazard_length: f64,
    #[serde(default)]
    pub area: f64,
    #[serde(default, deserialize_with = "optional_label")]
    pub special_case: Option<SpecialCase>,
    #[serde(default, deserialize_with = "optional_label")]
    pub hazard_size: Option<HazardSize>,
    #[serde(default, rename = "geocoded_address")]
    pub address: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    /// Precomputed description, when the data source already provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Technician identifier (their email address).
    #[serde(default)]
    pub tech: String,
    #[serde(default)]
    pub tech_initials: String,
}

impl MeasurementRecord {
    /// Text for the description column.
    ///
    /// `"<special case>. <note>."` when both are present, otherwise whichever
    /// one exists. A `None` special case only contributes when there is no note.
    pub fn description(&self) -> String {
        if let Some(text) = self.description.as_deref().filter(|d| !d.is_empty()) {
            return text.to_string();
        }
        let note = self.note.as_deref().filter(|n| !n.trim().is_empty());
        match (&self.special_case, note) {
            (Some(SpecialCase::NotApplicable), Some(note)) => note.to_string(),
            (Some(case), Some(note)) => format!("{case}. {note}."),
            (Some(SpecialCase::NotApplicable), None) => String::new(),
            (Some(case), None) => case.to_string(),
            (None, Some(note)) => note.to_string(),
            (None, None) => String::new(),
        }
    }

    /// Initials shown in the technician columns.
    pub fn initials(&self) -> String {
        if self.tech_initials.trim().is_empty() {
            technician_initials(&self.tech)
        } else {
            self.tech_initials.trim().to_uppercase()
        }
    }

    pub fn is_other_sized(&self) -> bool {
        self.hazard_size == Some(HazardSize::Other)
    }

    pub fn hazard_label(&self) -> &str {
        self.hazard_size.as_ref().map_or("", HazardSize::label)
    }
}

/// A named, ordered set of records that lands on one worksheet (or block).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeasurementGroup {
    pub name: String,
    #[serde(default, rename = "data")]
    pub records: Vec<MeasurementRecord>,
}

impl MeasurementGroup {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn optional_label<'de, D, T>(de: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: From<String>,
{
    let raw = Option::<String>::deserialize(de)?;
    Ok(raw
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(T::from))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("Meters - Manholes", SpecialCase::MetersManholes)]
    #[test_case("bottom hc", SpecialCase::BottomHc)]
    #[test_case("None", SpecialCase::NotApplicable)]
    #[test_case("Tree Root", SpecialCase::Other("Tree Root".into()))]
    fn special_case_labels(label: &str, expected: SpecialCase) {
        assert_eq!(SpecialCase::from(label), expected);
    }

    #[test_case("S", HazardSize::Small)]
    #[test_case("Large", HazardSize::Large)]
    #[test_case("other", HazardSize::Other)]
    #[test_case("XL", HazardSize::Unlisted("XL".into()))]
    fn hazard_size_labels(label: &str, expected: HazardSize) {
        assert_eq!(HazardSize::from(label), expected);
    }

    #[test]
    fn deserializes_payload_record() {
        let json = r#"{
            "object_id": 17, "work_date": "2024-01-02", "width": 1.5,
            "special_case": "Curb", "hazard_size": "", "geocoded_address": "1 Main St",
            "note": null, "tech": "jdoe@example.com"
        }"#;
        let record: MeasurementRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.object_id, 17);
        assert_eq!(record.group_key, "2024-01-02");
        assert_eq!(record.special_case, Some(SpecialCase::Curb));
        assert_eq!(record.hazard_size, None);
        assert_eq!(record.address.as_deref(), Some("1 Main St"));
        assert_eq!(record.initials(), "JO");
    }

    #[test]
    fn description_combines_case_and_note() {
        let mut record = MeasurementRecord {
            special_case: Some(SpecialCase::Curb),
            note: Some("Near hydrant".into()),
            ..Default::default()
        };
        assert_eq!(record.description(), "Curb. Near hydrant.");

        record.special_case = Some(SpecialCase::NotApplicable);
        assert_eq!(record.description(), "Near hydrant");

        record.note = None;
        assert_eq!(record.description(), "");

        record.special_case = Some(SpecialCase::Recuts);
        assert_eq!(record.description(), "Recuts");

        record.description = Some("Supplied".into());
        assert_eq!(record.description(), "Supplied");
    }
}
