//! Per-row business rules: highlight classification and technician
//! indicator formulas.

use serde::{Deserialize, Serialize};

use crate::cell_ref::CellAddress;
use crate::highlight::HighlightColor;
use crate::model::{HazardSize, MeasurementRecord, SpecialCase, TechnicianIndex};

/// How the `Replace` highlight rule is read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReplaceRule {
    /// The rule as the business wrote it: hazard size `Replace` that is also
    /// Small/Medium/Large. One field cannot hold both, so it never fires.
    #[default]
    AsWritten,
    /// Special case `Replace` with a graded (Small/Medium/Large) hazard size.
    SpecialCase,
}

/// Configurable rule set. `RuleSet::default()` is the production behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(default)]
    pub replace_rule: ReplaceRule,
}

impl RuleSet {
    /// Highlight for a record; first matching rule wins.
    pub fn classify(&self, record: &MeasurementRecord) -> Option<HighlightColor> {
        let size = record.hazard_size.as_ref();
        let special = record.special_case.as_ref();

        if special == Some(&SpecialCase::Curb)
            && (record.width + record.length > 0.0 || size != Some(&HazardSize::Other))
        {
            return Some(HighlightColor::Yellow);
        }

        if special == Some(&SpecialCase::Recuts) && size != Some(&HazardSize::Large) {
            return Some(HighlightColor::Pink);
        }

        let replace = match self.replace_rule {
            ReplaceRule::AsWritten => {
                size == Some(&HazardSize::Replace) && size.is_some_and(HazardSize::is_graded)
            }
            ReplaceRule::SpecialCase => {
                special == Some(&SpecialCase::Replace) && size.is_some_and(HazardSize::is_graded)
            }
        };
        if replace {
            return Some(HighlightColor::Green);
        }

        None
    }
}

/// Classify with the production rule set.
pub fn classify(record: &MeasurementRecord) -> Option<HighlightColor> {
    RuleSet::default().classify(record)
}

/// `IF(TRUE|FALSE,<value cell>,0)`. The technician match is decided here,
/// not by the spreadsheet's case-insensitive text comparison.
pub fn technician_indicator(matches: bool, value_cell: CellAddress) -> String {
    let flag = if matches { "TRUE" } else { "FALSE" };
    format!("IF({flag},{value_cell},0)")
}

/// One indicator formula per technician, in column order.
pub fn indicator_formulas(
    record: &MeasurementRecord,
    technicians: &TechnicianIndex,
    value_cell: CellAddress,
) -> Vec<String> {
    let own = technicians.offset(&record.tech);
    (0..technicians.len())
        .map(|column| technician_indicator(own == Some(column), value_cell))
        .collect()
}
