use std::collections::HashMap;

use crate::error::{ReportError, Result};

use super::record::MeasurementRecord;

/// A technician and the initials printed above their indicator column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Technician {
    pub id: String,
    pub initials: String,
}

/// Technician identifier to zero-based indicator column offset, in first-seen
/// order. Built once per report from every record of every group. Identifiers
/// match case-insensitively; the first spelling seen is kept.
#[derive(Debug, Clone, Default)]
pub struct TechnicianIndex {
    technicians: Vec<Technician>,
    offsets: HashMap<String, usize>,
}

impl TechnicianIndex {
    /// Scan records in order. An empty technician identifier is rejected.
    pub fn build<'a, I>(records: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a MeasurementRecord>,
    {
        let mut index = Self::default();
        for record in records {
            let id = record.tech.trim();
            if id.is_empty() {
                return Err(ReportError::Validation(format!(
                    "measurement {} has no technician",
                    record.object_id
                )));
            }
            let key = id.to_lowercase();
            if !index.offsets.contains_key(&key) {
                index.offsets.insert(key, index.technicians.len());
                index.technicians.push(Technician {
                    id: id.to_string(),
                    initials: record.initials(),
                });
            }
        }
        Ok(index)
    }

    pub fn offset(&self, id: &str) -> Option<usize> {
        self.offsets.get(&id.trim().to_lowercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.technicians.len()
    }

    pub fn is_empty(&self) -> bool {
        self.technicians.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Technician> {
        self.technicians.iter()
    }
}

/// Initials derived from a technician's email: first and third characters,
/// upper-cased (`jdoe@x.com` -> `JO`).
pub fn technician_initials(id: &str) -> String {
    id.trim()
        .chars()
        .enumerate()
        .filter(|(i, _)| *i == 0 || *i == 2)
        .map(|(_, c)| c)
        .collect::<String>()
        .to_uppercase()
}
