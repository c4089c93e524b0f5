//! Sheet-qualified references inside formula and defined-name text.
//!
//! Handles qualifiers written as `'Sheet Name'!$A$1` (quoted, with `''` as an
//! escaped apostrophe) and `Sheet1!A1` (bare). String literals and external
//! workbook references (`[1]Sheet1!A1`) are never touched.

use std::ops::Range;

use crate::cell_ref::CellAddress;

/// Sheet qualifier found in a formula.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetQualifier {
    /// Byte span of the qualifier, quotes included, `!` excluded.
    pub span: Range<usize>,
    /// Unescaped sheet name.
    pub name: String,
}

/// Quote a sheet name for use in a formula. Always quotes, which is valid for
/// every name and required for names like `01-02-2024` or `1`.
pub fn quote_sheet_name(name: &str) -> String {
    format!("'{}'", name.replace('\'', "''"))
}

/// `'Sheet'!A1` for a cell on another sheet.
pub fn sheet_cell_ref(sheet: &str, cell: CellAddress) -> String {
    format!("{}!{}", quote_sheet_name(sheet), cell)
}

/// Sheet names compare case-insensitively in spreadsheet applications.
pub fn same_sheet_name(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}

/// Every sheet qualifier in `formula`, in order of appearance.
pub fn sheet_qualifiers(formula: &str) -> Vec<SheetQualifier> {
    let bytes = formula.as_bytes();
    let mut found = Vec::new();
    let mut i = 0;

    while let Some(&b) = bytes.get(i) {
        match b {
            b'"' => i = skip_string_literal(bytes, i),
            b'\'' => {
                let (end, name) = read_quoted(formula, i);
                let external = name.starts_with('[');
                if bytes.get(end) == Some(&b'!') && !external {
                    found.push(SheetQualifier { span: i..end, name });
                }
                i = end.max(i + 1);
            }
            b if is_bare_name_byte(b) => {
                let end = bytes
                    .iter()
                    .skip(i)
                    .position(|c| !is_bare_name_byte(*c))
                    .map_or(bytes.len(), |n| i + n);
                let external = i > 0 && bytes.get(i - 1) == Some(&b']');
                if bytes.get(end) == Some(&b'!') && !external {
                    if let Some(name) = formula.get(i..end) {
                        found.push(SheetQualifier {
                            span: i..end,
                            name: name.to_string(),
                        });
                    }
                }
                i = end;
            }
            _ => i += 1,
        }
    }

    found
}

/// True when any qualifier in `formula` names `sheet`.
pub fn references_sheet(formula: &str, sheet: &str) -> bool {
    sheet_qualifiers(formula)
        .iter()
        .any(|q| same_sheet_name(&q.name, sheet))
}

/// Rewrite every qualifier naming `old` to a quoted `new`.
///
/// Returns `None` when the formula does not reference `old`.
pub fn rewrite_sheet_references(formula: &str, old: &str, new: &str) -> Option<String> {
    let targets: Vec<SheetQualifier> = sheet_qualifiers(formula)
        .into_iter()
        .filter(|q| same_sheet_name(&q.name, old))
        .collect();
    if targets.is_empty() {
        return None;
    }

    let replacement = quote_sheet_name(new);
    let mut out = String::with_capacity(formula.len() + targets.len() * replacement.len());
    let mut cursor = 0;
    for q in &targets {
        out.push_str(formula.get(cursor..q.span.start).unwrap_or(""));
        out.push_str(&replacement);
        cursor = q.span.end;
    }
    out.push_str(formula.get(cursor..).unwrap_or(""));
    Some(out)
}

fn is_bare_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'.' || b >= 0x80
}

/// Index just past a `"..."` literal starting at `start` (`""` escapes a quote).
fn skip_string_literal(bytes: &[u8], start: usize) -> usize {
    let mut i = start + 1;
    while let Some(&b) = bytes.get(i) {
        if b == b'"' {
            if bytes.get(i + 1) == Some(&b'"') {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

/// Read a `'...'` name starting at `start`. Returns the index just past the
/// closing quote and the unescaped name.
fn read_quoted(formula: &str, start: usize) -> (usize, String) {
    let bytes = formula.as_bytes();
    let mut name = String::new();
    let mut i = start + 1;
    let mut run_start = i;

    while let Some(&b) = bytes.get(i) {
        if b == b'\'' {
            name.push_str(formula.get(run_start..i).unwrap_or(""));
            if bytes.get(i + 1) == Some(&b'\'') {
                name.push('\'');
                i += 2;
                run_start = i;
                continue;
            }
            return (i + 1, name);
        }
        i += 1;
    }
    name.push_str(formula.get(run_start..).unwrap_or(""));
    (bytes.len(), name)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn finds_quoted_and_bare_qualifiers() {
        let names: Vec<String> = sheet_qualifiers("SUM('1'!A1:A5)+SUMMARY!B2*'It''s'!C3")
            .into_iter()
            .map(|q| q.name)
            .collect();
        assert_eq!(names, vec!["1", "SUMMARY", "It's"]);
    }

    #[test]
    fn ignores_string_literals_and_external_books() {
        assert!(sheet_qualifiers(r#"IF(A1="'1'!A1","x ""q"" y",0)"#).is_empty());
        assert!(sheet_qualifiers("[1]Sheet1!A1+'[2]Data'!B2").is_empty());
    }

    #[test]
    fn rewrites_only_the_named_sheet() {
        let out = rewrite_sheet_references("'1'!O8+'11'!O8+SUM('1'!A1:'1'!A3)", "1", "01-02-2024");
        assert_eq!(
            out.as_deref(),
            Some("'01-02-2024'!O8+'11'!O8+SUM('01-02-2024'!A1:'01-02-2024'!A3)")
        );
    }

    #[test]
    fn rewrites_bare_names_case_insensitively() {
        let out = rewrite_sheet_references("summary!$D$3&Summary2!A1", "SUMMARY", "Recap");
        assert_eq!(out.as_deref(), Some("'Recap'!$D$3&Summary2!A1"));
    }

    #[test]
    fn unchanged_formula_returns_none() {
        assert_eq!(rewrite_sheet_references("A1+B1", "1", "x"), None);
        assert!(!references_sheet("'2'!A1", "1"));
        assert!(references_sheet("'2'!A1", "2"));
    }

    #[test]
    fn quoting_escapes_apostrophes() {
        assert_eq!(quote_sheet_name("Bob's"), "'Bob''s'");
        let cell = CellAddress::parse("O8").unwrap();
        assert_eq!(sheet_cell_ref("01-02-2024", cell), "'01-02-2024'!O8");
        assert_eq!(
            sheet_qualifiers("'Bob''s'!A1")[0].name,
            "Bob's"
        );
    }
}
