//! Worksheet names: validation, sanitizing, and the names given to group
//! sheets once they are filled.

use crate::error::{ReportError, Result};
use crate::formula::same_sheet_name;
use crate::model::parse_iso_date;
use crate::rebalance::MERGE_SEPARATOR;

/// Longest name a worksheet may have.
pub const MAX_SHEET_NAME_CHARS: usize = 31;

const FORBIDDEN: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];

/// How a filled group sheet is named.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetNaming {
    /// ISO dates in the group name become `MM-DD-YYYY`.
    WorkDate,
    /// The group name as is.
    GroupName,
}

impl SheetNaming {
    /// Raw (unsanitized) sheet name for a group.
    pub fn name_for(self, group_name: &str) -> String {
        match self {
            Self::GroupName => group_name.to_string(),
            Self::WorkDate => group_name
                .split(MERGE_SEPARATOR)
                .map(|part| {
                    parse_iso_date(part)
                        .map_or_else(|| part.trim().to_string(), |d| d.format("%m-%d-%Y").to_string())
                })
                .collect::<Vec<_>>()
                .join(MERGE_SEPARATOR),
        }
    }
}

/// Reject names a spreadsheet application would refuse.
pub fn validate_sheet_name(name: &str) -> Result<()> {
    let invalid = |reason| {
        Err(ReportError::InvalidSheetName {
            name: name.to_string(),
            reason,
        })
    };
    if name.trim().is_empty() {
        return invalid("name is empty");
    }
    if name.chars().count() > MAX_SHEET_NAME_CHARS {
        return invalid("longer than 31 characters");
    }
    if name.contains(FORBIDDEN) {
        return invalid("contains one of [ ] : * ? / \\");
    }
    if name.starts_with('\'') || name.ends_with('\'') {
        return invalid("starts or ends with an apostrophe");
    }
    if name.eq_ignore_ascii_case("history") {
        return invalid("reserved name");
    }
    Ok(())
}

/// Make `raw` a valid sheet name: forbidden characters become `-`, outer
/// apostrophes are dropped, and the result is cut to 31 characters.
pub fn sanitize_sheet_name(raw: &str) -> String {
    let replaced: String = raw
        .trim()
        .chars()
        .map(|c| if FORBIDDEN.contains(&c) || c.is_control() { '-' } else { c })
        .collect();
    let trimmed = replaced.trim_matches('\'');
    let cut: String = trimmed.chars().take(MAX_SHEET_NAME_CHARS).collect();
    let cut = cut.trim_end_matches('\'').trim_end().to_string();
    if cut.is_empty() || cut.eq_ignore_ascii_case("history") {
        format!("Sheet {cut}").trim_end().to_string()
    } else {
        cut
    }
}

/// Sanitize `raw` and append ` (2)`, ` (3)` ... until no name in `taken`
/// matches (case-insensitively).
pub fn unique_sheet_name<'a, I>(raw: &str, taken: I) -> String
where
    I: IntoIterator<Item = &'a str> + Clone,
{
    let base = sanitize_sheet_name(raw);
    let clashes = |candidate: &str| taken.clone().into_iter().any(|t| same_sheet_name(t, candidate));
    if !clashes(&base) {
        return base;
    }
    (2..)
        .map(|n| {
            let suffix = format!(" ({n})");
            let room = MAX_SHEET_NAME_CHARS.saturating_sub(suffix.chars().count());
            let stem: String = base.chars().take(room).collect();
            format!("{}{suffix}", stem.trim_end())
        })
        .find(|candidate| !clashes(candidate))
        .unwrap_or(base)
}
