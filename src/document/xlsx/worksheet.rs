//! Worksheet parts.
//!
//! `<sheetData>` is parsed once when the document opens. Cells the engine
//! never touches keep their original markup, and everything outside
//! `<sheetData>` is left as written apart from `<dimension>` and the
//! `tabSelected` flag. New strings are written inline (`t="inlineStr"`) so
//! the shared string table never has to be rebuilt.

use std::collections::BTreeMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::cell_ref::{parse_cell_ref, CellAddress};
use crate::document::CellValue;
use crate::error::{ReportError, Result};
use crate::formula::{references_sheet, rewrite_sheet_references};
use crate::xml_helpers::{
    attr_string, attr_u32, element_attributes, find_element, owned_attributes, push_start_tag,
    replace_start_tag, set_attr, xml_escape,
};

use super::workbook::DateSystem;

#[derive(Debug, Clone)]
struct CellFormula {
    attrs: Vec<(String, String)>,
    text: String,
}

#[derive(Debug, Clone, Default)]
struct SheetCell {
    /// Attributes other than `r`.
    attrs: Vec<(String, String)>,
    formula: Option<CellFormula>,
    /// `<v>` text as stored.
    cached: Option<String>,
    /// Text of an inline string.
    inline: Option<String>,
    /// Value written by the engine.
    written: Option<CellValue>,
    /// Original inner markup, kept while the cell is untouched.
    raw: Option<String>,
}

impl SheetCell {
    fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Forget the stored content before the engine writes its own.
    fn reset(&mut self) {
        self.attrs.retain(|(k, _)| k == "s");
        self.formula = None;
        self.cached = None;
        self.inline = None;
        self.written = None;
        self.raw = None;
    }

    fn value(&self, shared_strings: &[String]) -> CellValue {
        if let Some(value) = &self.written {
            return value.clone();
        }
        let cached = self.cached.as_deref().unwrap_or("");
        match self.attr("t").unwrap_or("n") {
            "s" => cached
                .trim()
                .parse::<usize>()
                .ok()
                .and_then(|i| shared_strings.get(i))
                .map_or(CellValue::Empty, |s| CellValue::text(s.as_str())),
            "inlineStr" => CellValue::text(self.inline.clone().unwrap_or_default()),
            "str" | "e" => CellValue::text(cached),
            "b" => CellValue::Bool(cached.trim() == "1"),
            _ => cached
                .trim()
                .parse::<f64>()
                .map_or(CellValue::Empty, CellValue::Number),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct SheetRow {
    /// Attributes other than `r`.
    attrs: Vec<(String, String)>,
    cells: BTreeMap<u32, SheetCell>,
}

#[derive(Debug, Clone)]
pub(super) struct SheetPart {
    pub path: String,
    xml: String,
    prefix: String,
    rows: BTreeMap<u32, SheetRow>,
    pub dirty: bool,
}

impl SheetPart {
    pub fn parse(path: &str, xml: String) -> Result<Self> {
        let range = find_element(&xml, b"sheetData")?
            .ok_or_else(|| ReportError::Template(format!("{path} has no sheetData")))?;
        let (prefix, rows) = parse_sheet_data(xml.get(range).unwrap_or(""))?;
        Ok(Self {
            path: path.to_string(),
            xml,
            prefix,
            rows,
            dirty: false,
        })
    }

    fn cell(&self, cell: CellAddress) -> Option<&SheetCell> {
        self.rows.get(&cell.row)?.cells.get(&cell.col)
    }

    fn cell_mut(&mut self, cell: CellAddress) -> &mut SheetCell {
        self.dirty = true;
        self.rows
            .entry(cell.row)
            .or_default()
            .cells
            .entry(cell.col)
            .or_default()
    }

    pub fn value(&self, cell: CellAddress, shared_strings: &[String]) -> CellValue {
        self.cell(cell)
            .map(|c| c.value(shared_strings))
            .unwrap_or_default()
    }

    pub fn formula(&self, cell: CellAddress) -> Option<String> {
        self.cell(cell)?.formula.as_ref().map(|f| f.text.clone())
    }

    /// Style index of a cell (0 when it has none).
    pub fn style(&self, cell: CellAddress) -> u32 {
        self.cell(cell)
            .and_then(|c| c.attr("s"))
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    }

    pub fn set_value(&mut self, cell: CellAddress, value: CellValue) {
        let slot = self.cell_mut(cell);
        slot.reset();
        slot.written = Some(value);
    }

    pub fn set_formula(&mut self, cell: CellAddress, formula: &str) {
        let slot = self.cell_mut(cell);
        slot.reset();
        slot.formula = Some(CellFormula {
            attrs: Vec::new(),
            text: formula.to_string(),
        });
    }

    pub fn set_style(&mut self, cell: CellAddress, xf: u32) {
        set_attr(&mut self.cell_mut(cell).attrs, "s", xf.to_string());
    }

    /// Point sheet-qualified references to `old` at `new` in every formula.
    /// Returns the number of formulas changed.
    pub fn rewrite_references(&mut self, old: &str, new: &str) -> usize {
        let mut changed = 0;
        for cell in self.rows.values_mut().flat_map(|r| r.cells.values_mut()) {
            let Some(formula) = cell.formula.as_mut() else {
                continue;
            };
            if !references_sheet(&formula.text, old) {
                continue;
            }
            if let Some(text) = rewrite_sheet_references(&formula.text, old, new) {
                formula.text = text;
                // the cached result is stale until the workbook recalculates
                cell.cached = None;
                cell.raw = None;
                cell.attrs.retain(|(k, _)| k != "t");
                changed += 1;
            }
        }
        if changed > 0 {
            self.dirty = true;
        }
        changed
    }

    /// Serialize the part. `tab_selected` rewrites the first sheet view's
    /// `tabSelected` flag when given.
    pub fn to_xml(&self, dates: DateSystem, tab_selected: Option<bool>) -> Result<String> {
        let mut xml = self.xml.clone();
        if self.dirty {
            let range = find_element(&xml, b"sheetData")?
                .ok_or_else(|| ReportError::Template(format!("{} has no sheetData", self.path)))?;
            let mut out = String::with_capacity(xml.len() + 1024);
            out.push_str(xml.get(..range.start).unwrap_or(""));
            self.write_sheet_data(&mut out, dates);
            out.push_str(xml.get(range.end..).unwrap_or(""));
            xml = out;

            if let (Some(mut attrs), Some(used)) =
                (element_attributes(&xml, b"dimension")?, self.used_range())
            {
                set_attr(&mut attrs, "ref", used);
                if let Some(patched) = replace_start_tag(&xml, b"dimension", &attrs)? {
                    xml = patched;
                }
            }
        }

        if let Some(selected) = tab_selected {
            if let Some(mut attrs) = element_attributes(&xml, b"sheetView")? {
                if selected {
                    set_attr(&mut attrs, "tabSelected", "1");
                } else {
                    attrs.retain(|(k, _)| k != "tabSelected");
                }
                if let Some(patched) = replace_start_tag(&xml, b"sheetView", &attrs)? {
                    xml = patched;
                }
            }
        }

        Ok(xml)
    }

    fn used_range(&self) -> Option<String> {
        let first_row = *self.rows.keys().next()?;
        let last_row = *self.rows.keys().next_back()?;
        let cols = self.rows.values().flat_map(|r| r.cells.keys().copied());
        let (min_col, max_col) = cols.fold(None, |acc: Option<(u32, u32)>, c| {
            Some(acc.map_or((c, c), |(lo, hi)| (lo.min(c), hi.max(c))))
        })?;
        Some(format!(
            "{}:{}",
            CellAddress::new(min_col, first_row),
            CellAddress::new(max_col, last_row)
        ))
    }

    fn write_sheet_data(&self, out: &mut String, dates: DateSystem) {
        let p = &self.prefix;
        if self.rows.is_empty() {
            out.push_str(&format!("<{p}sheetData/>"));
            return;
        }
        out.push_str(&format!("<{p}sheetData>"));
        for (&row, data) in &self.rows {
            let mut attrs = vec![("r".to_string(), (row + 1).to_string())];
            attrs.extend(data.attrs.iter().filter(|(k, _)| k != "spans").cloned());
            let row_tag = format!("{p}row");
            push_start_tag(out, &row_tag, &attrs, data.cells.is_empty());
            if data.cells.is_empty() {
                continue;
            }
            for (&col, cell) in &data.cells {
                write_cell(out, p, CellAddress::new(col, row), cell, dates);
            }
            out.push_str(&format!("</{row_tag}>"));
        }
        out.push_str(&format!("</{p}sheetData>"));
    }
}

/// Write a single `<c>` element.
fn write_cell(out: &mut String, p: &str, address: CellAddress, cell: &SheetCell, dates: DateSystem) {
    let tag = format!("{p}c");
    let mut attrs = vec![("r".to_string(), address.to_string())];
    attrs.extend(cell.attrs.iter().cloned());

    if let Some(raw) = &cell.raw {
        push_start_tag(out, &tag, &attrs, raw.is_empty());
        if !raw.is_empty() {
            out.push_str(raw);
            out.push_str(&format!("</{tag}>"));
        }
        return;
    }

    if let Some(formula) = &cell.formula {
        push_start_tag(out, &tag, &attrs, false);
        push_start_tag(out, &format!("{p}f"), &formula.attrs, formula.text.is_empty());
        if !formula.text.is_empty() {
            out.push_str(&xml_escape(&formula.text));
            out.push_str(&format!("</{p}f>"));
        }
        out.push_str(&format!("</{tag}>"));
        return;
    }

    let (kind, content) = match cell.written.as_ref().unwrap_or(&CellValue::Empty) {
        CellValue::Empty => (None, None),
        CellValue::Text(s) => (
            Some("inlineStr"),
            Some(format!(
                "<{p}is><{p}t xml:space=\"preserve\">{}</{p}t></{p}is>",
                xml_escape(s)
            )),
        ),
        CellValue::Number(n) if n.is_finite() => (None, Some(format!("<{p}v>{n}</{p}v>"))),
        CellValue::Number(_) => (Some("e"), Some(format!("<{p}v>#NUM!</{p}v>"))),
        CellValue::Bool(b) => (Some("b"), Some(format!("<{p}v>{}</{p}v>", u8::from(*b)))),
        CellValue::Date(d) => (None, Some(format!("<{p}v>{}</{p}v>", dates.serial(*d)))),
    };
    if let Some(kind) = kind {
        set_attr(&mut attrs, "t", kind);
    }
    push_start_tag(out, &tag, &attrs, content.is_none());
    if let Some(content) = content {
        out.push_str(&content);
        out.push_str(&format!("</{tag}>"));
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Capture {
    Nothing,
    Formula,
    Value,
    Inline,
}

type Rows = BTreeMap<u32, SheetRow>;

/// Parse a `<sheetData>` element into rows of cells. Returns the element's
/// namespace prefix (with colon) and the rows keyed by 0-based index.
fn parse_sheet_data(data: &str) -> Result<(String, Rows)> {
    let mut reader = Reader::from_str(data);
    let mut prefix = String::new();
    let mut rows = Rows::new();
    let mut current: Option<(u32, SheetRow)> = None;
    let mut cell: Option<(u32, SheetCell, usize)> = None;
    let mut next_row = 0u32;
    let mut next_col = 0u32;
    let mut capture = Capture::Nothing;
    let mut in_phonetic = false;

    loop {
        let before = reader.buffer_position();
        match reader.read_event()? {
            Event::Start(ref e) => match e.local_name().as_ref() {
                b"sheetData" => prefix = element_prefix(e),
                b"row" => {
                    let (row, parsed) = open_row(e, next_row);
                    next_row = row + 1;
                    next_col = 0;
                    current = Some((row, parsed));
                }
                b"c" => {
                    let (col, attrs) = open_cell(e, next_col);
                    next_col = col + 1;
                    let parsed = SheetCell {
                        attrs,
                        ..SheetCell::default()
                    };
                    cell = Some((col, parsed, reader.buffer_position()));
                }
                b"f" => {
                    if let Some((_, c, _)) = cell.as_mut() {
                        c.formula = Some(CellFormula {
                            attrs: owned_attributes(e),
                            text: String::new(),
                        });
                        capture = Capture::Formula;
                    }
                }
                b"v" => {
                    if let Some((_, c, _)) = cell.as_mut() {
                        c.cached = Some(String::new());
                        capture = Capture::Value;
                    }
                }
                b"is" => {
                    if let Some((_, c, _)) = cell.as_mut() {
                        c.inline = Some(String::new());
                    }
                }
                b"rPh" => in_phonetic = true,
                b"t" if !in_phonetic => capture = Capture::Inline,
                _ => {}
            },
            Event::Empty(ref e) => match e.local_name().as_ref() {
                b"sheetData" => prefix = element_prefix(e),
                b"row" => {
                    let (row, parsed) = open_row(e, next_row);
                    next_row = row + 1;
                    rows.insert(row, parsed);
                }
                b"c" => {
                    let (col, attrs) = open_cell(e, next_col);
                    next_col = col + 1;
                    if let Some((_, row)) = current.as_mut() {
                        row.cells.insert(
                            col,
                            SheetCell {
                                attrs,
                                raw: Some(String::new()),
                                ..SheetCell::default()
                            },
                        );
                    }
                }
                b"f" => {
                    if let Some((_, c, _)) = cell.as_mut() {
                        c.formula = Some(CellFormula {
                            attrs: owned_attributes(e),
                            text: String::new(),
                        });
                    }
                }
                _ => {}
            },
            Event::Text(ref t) => {
                if capture != Capture::Nothing {
                    let text = t.unescape()?;
                    append_capture(&mut cell, capture, &text);
                }
            }
            Event::CData(ref t) => {
                if capture != Capture::Nothing {
                    append_capture(&mut cell, capture, &String::from_utf8_lossy(t));
                }
            }
            Event::End(ref e) => match e.local_name().as_ref() {
                b"f" | b"v" | b"t" => capture = Capture::Nothing,
                b"rPh" => in_phonetic = false,
                b"c" => {
                    if let Some((col, mut parsed, start)) = cell.take() {
                        parsed.raw = Some(data.get(start..before).unwrap_or("").to_string());
                        if let Some((_, row)) = current.as_mut() {
                            row.cells.insert(col, parsed);
                        }
                    }
                }
                b"row" => {
                    if let Some((row, parsed)) = current.take() {
                        rows.insert(row, parsed);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok((prefix, rows))
}

fn append_capture(cell: &mut Option<(u32, SheetCell, usize)>, capture: Capture, text: &str) {
    let Some((_, c, _)) = cell.as_mut() else {
        return;
    };
    let target = match capture {
        Capture::Formula => c.formula.as_mut().map(|f| &mut f.text),
        Capture::Value => c.cached.as_mut(),
        Capture::Inline => c.inline.as_mut(),
        Capture::Nothing => None,
    };
    if let Some(target) = target {
        target.push_str(text);
    }
}

fn open_row(e: &BytesStart, next_row: u32) -> (u32, SheetRow) {
    let row = attr_u32(e, b"r")
        .and_then(|r| r.checked_sub(1))
        .unwrap_or(next_row);
    let attrs = owned_attributes(e)
        .into_iter()
        .filter(|(k, _)| k != "r")
        .collect();
    (
        row,
        SheetRow {
            attrs,
            cells: BTreeMap::new(),
        },
    )
}

fn open_cell(e: &BytesStart, next_col: u32) -> (u32, Vec<(String, String)>) {
    let col = attr_string(e, b"r")
        .and_then(|r| parse_cell_ref(&r))
        .map_or(next_col, |(col, _)| col);
    let attrs = owned_attributes(e)
        .into_iter()
        .filter(|(k, _)| k != "r")
        .collect();
    (col, attrs)
}

fn element_prefix(e: &BytesStart) -> String {
    let name = e.name();
    std::str::from_utf8(name.as_ref())
        .ok()
        .and_then(|n| n.split_once(':'))
        .map(|(p, _)| format!("{p}:"))
        .unwrap_or_default()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const SHEET: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><dimension ref="A1:B2"/><sheetViews><sheetView tabSelected="1" workbookViewId="0"/></sheetViews><sheetData><row r="1" spans="1:2"><c r="A1" t="s"><v>0</v></c><c r="B1" s="3"/></row><row r="2"><c r="A2"><f>SUM('1'!A1:A3)</f><v>6</v></c><c r="B2" t="inlineStr"><is><t>hi &amp; bye</t></is></c></row></sheetData><pageMargins left="0.7"/></worksheet>"#;

    fn addr(s: &str) -> CellAddress {
        CellAddress::parse(s).unwrap()
    }

    #[test]
    fn reads_existing_cells() {
        let sheet = SheetPart::parse("xl/worksheets/sheet1.xml", SHEET.into()).unwrap();
        let shared = vec!["Project".to_string()];
        assert_eq!(sheet.value(addr("A1"), &shared), CellValue::Text("Project".into()));
        assert_eq!(sheet.value(addr("A2"), &shared), CellValue::Number(6.0));
        assert_eq!(sheet.value(addr("B2"), &shared), CellValue::Text("hi & bye".into()));
        assert_eq!(sheet.formula(addr("A2")).as_deref(), Some("SUM('1'!A1:A3)"));
        assert_eq!(sheet.style(addr("B1")), 3);
        assert_eq!(sheet.style(addr("Z9")), 0);
    }

    #[test]
    fn untouched_sheet_serializes_unchanged() {
        let sheet = SheetPart::parse("x", SHEET.into()).unwrap();
        assert_eq!(sheet.to_xml(DateSystem::Date1900, None).unwrap(), SHEET);
    }

    #[test]
    fn writes_keep_styles_and_untouched_markup() {
        let mut sheet = SheetPart::parse("x", SHEET.into()).unwrap();
        sheet.set_value(addr("B1"), CellValue::Text("a<b".into()));
        sheet.set_value(
            addr("C5"),
            CellValue::Date(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()),
        );
        sheet.set_formula(addr("D5"), "IF(\"a\"=\"b\",J22,0)");
        let xml = sheet.to_xml(DateSystem::Date1900, Some(false)).unwrap();

        assert!(xml.contains(r#"<c r="A1" t="s"><v>0</v></c>"#));
        assert!(xml.contains(
            r#"<c r="B1" s="3" t="inlineStr"><is><t xml:space="preserve">a&lt;b</t></is></c>"#
        ));
        assert!(xml.contains(r#"<row r="5"><c r="C5"><v>45293</v></c><c r="D5"><f>IF(&quot;a&quot;=&quot;b&quot;,J22,0)</f></c></row>"#));
        assert!(xml.contains(r#"<dimension ref="A1:D5"/>"#));
        assert!(xml.contains(r#"<sheetView workbookViewId="0"/>"#));
        assert!(xml.contains(r#"<pageMargins left="0.7"/>"#));
        assert!(!xml.contains("spans"));

        let reparsed = SheetPart::parse("x", xml).unwrap();
        assert_eq!(reparsed.value(addr("B1"), &[]), CellValue::Text("a<b".into()));
        assert_eq!(reparsed.value(addr("C5"), &[]), CellValue::Number(45293.0));
    }

    #[test]
    fn rename_rewrites_formulas_and_drops_cache() {
        let mut sheet = SheetPart::parse("x", SHEET.into()).unwrap();
        assert_eq!(sheet.rewrite_references("1", "01-02-2024"), 1);
        assert_eq!(sheet.rewrite_references("Nope", "x"), 0);
        let xml = sheet.to_xml(DateSystem::Date1900, None).unwrap();
        assert!(xml.contains(r#"<c r="A2"><f>SUM(&apos;01-02-2024&apos;!A1:A3)</f></c>"#));
    }
}
