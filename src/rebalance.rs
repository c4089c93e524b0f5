//! Group rebalancing: bucket records by group key under a cap on the number
//! of groups.
//!
//! Buckets keep first-seen order and each bucket keeps record order. While
//! there are more buckets than the cap, the two smallest are merged into one
//! named `"<first> & <second>"`, placed where the earlier of the two was.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ReportError, Result};
use crate::model::{MeasurementGroup, MeasurementRecord};

/// How to choose between buckets of equal size when picking the two smallest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TieBreak {
    /// Earlier buckets (first-seen order) are merged first.
    #[default]
    FirstSeen,
    /// Lexically smaller bucket names are merged first.
    Lexical,
}

/// Separator between the names of merged groups.
pub const MERGE_SEPARATOR: &str = " & ";

/// Partition `records` into at most `max_groups` named groups.
pub fn rebalance(
    records: Vec<MeasurementRecord>,
    max_groups: usize,
    tie_break: TieBreak,
) -> Result<Vec<MeasurementGroup>> {
    if max_groups == 0 {
        return Err(ReportError::Validation(
            "maximum group count must be at least 1".into(),
        ));
    }

    let mut groups = bucket(records)?;

    while groups.len() > max_groups {
        let (first, second) = two_smallest(&groups, tie_break)?;
        let later = groups.remove(second);
        let Some(earlier) = groups.get_mut(first) else {
            return Err(ReportError::Validation(format!(
                "group index {first} out of range while merging"
            )));
        };
        debug!(
            first = %earlier.name,
            second = %later.name,
            rows = earlier.records.len() + later.records.len(),
            "merging smallest groups"
        );
        earlier.name = format!("{}{MERGE_SEPARATOR}{}", earlier.name, later.name);
        earlier.records.extend(later.records);
    }

    Ok(groups)
}

/// Bucket by group key, preserving first-seen bucket order.
fn bucket(records: Vec<MeasurementRecord>) -> Result<Vec<MeasurementGroup>> {
    let mut groups: Vec<MeasurementGroup> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for record in records {
        let key = record.group_key.trim().to_string();
        if key.is_empty() {
            return Err(ReportError::Validation(format!(
                "measurement {} has no group key",
                record.object_id
            )));
        }
        let position = *positions.entry(key.clone()).or_insert_with(|| {
            groups.push(MeasurementGroup {
                name: key,
                records: Vec::new(),
            });
            groups.len() - 1
        });
        if let Some(group) = groups.get_mut(position) {
            group.records.push(record);
        }
    }

    Ok(groups)
}

/// Positions of the two smallest groups, returned in document order.
fn two_smallest(groups: &[MeasurementGroup], tie_break: TieBreak) -> Result<(usize, usize)> {
    let mut order: Vec<(usize, &str, usize)> = groups
        .iter()
        .enumerate()
        .map(|(position, g)| (g.records.len(), g.name.as_str(), position))
        .collect();
    order.sort_by(|a, b| {
        a.0.cmp(&b.0).then_with(|| match tie_break {
            TieBreak::FirstSeen => a.2.cmp(&b.2),
            TieBreak::Lexical => a.1.cmp(b.1).then(a.2.cmp(&b.2)),
        })
    });

    match order.as_slice() {
        [(_, _, a), (_, _, b), ..] => Ok(((*a).min(*b), (*a).max(*b))),
        _ => Err(ReportError::Validation(
            "cannot merge fewer than two groups".into(),
        )),
    }
}
