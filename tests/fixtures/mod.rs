//! Test fixtures: report templates built in memory.
//!
//! `TemplateBuilder` writes a minimal but complete SpreadsheetML package the
//! way a spreadsheet application saves a template:
//! - One worksheet part per sheet, with numbers, shared strings and formulas
//! - Workbook and sheet-scoped defined names
//! - A style part with two fills and two cell formats
//! - Optionally a calculation chain and an extended properties part listing
//!   the sheet titles
//!
//! ```ignore
//! let bytes = TemplateBuilder::new()
//!     .sheet("SUMMARY")
//!     .sheet("1")
//!     .number("SUMMARY", "A1", 3.0)
//!     .scoped_name("Day", "'1'!$A$1", "1")
//!     .build();
//! ```
#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::float_cmp,
    clippy::panic
)]

use std::io::{Cursor, Read, Write};

use survey_report::{ReportData, ReportLayout};
use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

pub const WORKBOOK_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml";
pub const TEMPLATE_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.template.main+xml";
pub const MACRO_TEMPLATE_TYPE: &str = "application/vnd.ms-excel.template.macroEnabled.main+xml";
pub const MACRO_WORKBOOK_TYPE: &str = "application/vnd.ms-excel.sheet.macroEnabled.main+xml";

#[derive(Debug, Clone)]
enum FixtureCell {
    Number(f64),
    Text(String),
    Formula { text: String, cached: Option<f64> },
}

#[derive(Debug, Clone)]
struct FixtureSheet {
    name: String,
    cells: Vec<(String, FixtureCell, Option<u32>)>,
}

#[derive(Debug, Clone)]
struct FixtureName {
    name: String,
    refers_to: String,
    scope: Option<String>,
}

/// Builder for template packages.
#[derive(Debug, Clone)]
pub struct TemplateBuilder {
    sheets: Vec<FixtureSheet>,
    names: Vec<FixtureName>,
    main_type: &'static str,
    calc_chain: bool,
    app_titles: bool,
}

impl Default for TemplateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateBuilder {
    pub fn new() -> Self {
        Self {
            sheets: Vec::new(),
            names: Vec::new(),
            main_type: WORKBOOK_TYPE,
            calc_chain: false,
            app_titles: false,
        }
    }

    /// A template with every sheet `layout` needs.
    pub fn for_layout(layout: &ReportLayout) -> Self {
        let main_type = if layout.extension == "xlsm" {
            MACRO_TEMPLATE_TYPE
        } else {
            TEMPLATE_TYPE
        };
        layout
            .template_sheets()
            .iter()
            .fold(Self::new(), |builder, name| builder.sheet(name))
            .content_type(main_type)
            .calc_chain()
            .app_titles()
    }

    pub fn sheet(mut self, name: &str) -> Self {
        self.sheets.push(FixtureSheet {
            name: name.to_string(),
            cells: Vec::new(),
        });
        self
    }

    pub fn content_type(mut self, main_type: &'static str) -> Self {
        self.main_type = main_type;
        self
    }

    pub fn calc_chain(mut self) -> Self {
        self.calc_chain = true;
        self
    }

    pub fn app_titles(mut self) -> Self {
        self.app_titles = true;
        self
    }

    pub fn number(self, sheet: &str, cell: &str, value: f64) -> Self {
        self.cell(sheet, cell, FixtureCell::Number(value), None)
    }

    pub fn text(self, sheet: &str, cell: &str, value: &str) -> Self {
        self.cell(sheet, cell, FixtureCell::Text(value.to_string()), None)
    }

    /// A number cell using cell format 1 (date, right aligned).
    pub fn styled_number(self, sheet: &str, cell: &str, value: f64) -> Self {
        self.cell(sheet, cell, FixtureCell::Number(value), Some(1))
    }

    pub fn formula(self, sheet: &str, cell: &str, text: &str, cached: Option<f64>) -> Self {
        let formula = FixtureCell::Formula {
            text: text.to_string(),
            cached,
        };
        self.cell(sheet, cell, formula, None)
    }

    pub fn name(mut self, name: &str, refers_to: &str) -> Self {
        self.names.push(FixtureName {
            name: name.to_string(),
            refers_to: refers_to.to_string(),
            scope: None,
        });
        self
    }

    pub fn scoped_name(mut self, name: &str, refers_to: &str, sheet: &str) -> Self {
        self.names.push(FixtureName {
            name: name.to_string(),
            refers_to: refers_to.to_string(),
            scope: Some(sheet.to_string()),
        });
        self
    }

    fn cell(mut self, sheet: &str, cell: &str, value: FixtureCell, style: Option<u32>) -> Self {
        let target = self
            .sheets
            .iter_mut()
            .find(|s| s.name == sheet)
            .unwrap_or_else(|| panic!("fixture has no sheet {sheet:?}"));
        target.cells.push((cell.to_string(), value, style));
        self
    }

    /// Write the package.
    pub fn build(self) -> Vec<u8> {
        let mut strings: Vec<String> = Vec::new();
        let sheet_xml: Vec<String> = self
            .sheets
            .iter()
            .map(|sheet| generate_sheet(sheet, &mut strings))
            .collect();

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        let mut put = |name: &str, body: &str| {
            zip.start_file(name, options).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        };

        put("[Content_Types].xml", &self.content_types_xml());
        put("_rels/.rels", &self.package_rels_xml());
        if self.app_titles {
            put("docProps/app.xml", &self.app_xml());
        }
        put("xl/workbook.xml", &self.workbook_xml());
        put("xl/_rels/workbook.xml.rels", &self.workbook_rels_xml());
        put("xl/styles.xml", STYLES);
        put("xl/sharedStrings.xml", &shared_strings_xml(&strings));
        if self.calc_chain {
            put("xl/calcChain.xml", &self.calc_chain_xml());
        }
        for (i, xml) in sheet_xml.iter().enumerate() {
            put(&format!("xl/worksheets/sheet{}.xml", i + 1), xml);
        }
        drop(put);

        zip.finish().unwrap().into_inner()
    }

    fn content_types_xml(&self) -> String {
        let mut xml = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/>"#,
        );
        xml.push_str(&format!(
            r#"<Override PartName="/xl/workbook.xml" ContentType="{}"/>"#,
            self.main_type
        ));
        xml.push_str(r#"<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#);
        xml.push_str(r#"<Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/>"#);
        if self.calc_chain {
            xml.push_str(r#"<Override PartName="/xl/calcChain.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.calcChain+xml"/>"#);
        }
        if self.app_titles {
            xml.push_str(r#"<Override PartName="/docProps/app.xml" ContentType="application/vnd.openxmlformats-officedocument.extended-properties+xml"/>"#);
        }
        for i in 1..=self.sheets.len() {
            xml.push_str(&format!(
                r#"<Override PartName="/xl/worksheets/sheet{i}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#
            ));
        }
        xml.push_str("</Types>");
        xml
    }

    fn package_rels_xml(&self) -> String {
        let mut xml = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>"#,
        );
        if self.app_titles {
            xml.push_str(r#"<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/extended-properties" Target="docProps/app.xml"/>"#);
        }
        xml.push_str("</Relationships>");
        xml
    }

    fn app_xml(&self) -> String {
        let mut xml = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties" xmlns:vt="http://schemas.openxmlformats.org/officeDocument/2006/docPropsVTypes"><Application>Microsoft Excel</Application>"#,
        );
        xml.push_str(&format!(
            r#"<TitlesOfParts><vt:vector size="{}" baseType="lpstr">"#,
            self.sheets.len()
        ));
        for sheet in &self.sheets {
            xml.push_str(&format!("<vt:lpstr>{}</vt:lpstr>", escape_xml(&sheet.name)));
        }
        xml.push_str("</vt:vector></TitlesOfParts></Properties>");
        xml
    }

    fn workbook_xml(&self) -> String {
        let mut xml = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><workbookPr defaultThemeVersion="166925"/><bookViews><workbookView xWindow="0" yWindow="0" windowWidth="28800" windowHeight="12300" firstSheet="1" activeTab="1"/></bookViews><sheets>"#,
        );
        for (i, sheet) in self.sheets.iter().enumerate() {
            xml.push_str(&format!(
                r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
                escape_xml(&sheet.name),
                i + 1,
                i + 1
            ));
        }
        xml.push_str("</sheets>");
        if !self.names.is_empty() {
            xml.push_str("<definedNames>");
            for name in &self.names {
                let scope = name
                    .scope
                    .as_ref()
                    .map(|s| {
                        let id = self
                            .sheets
                            .iter()
                            .position(|sheet| &sheet.name == s)
                            .unwrap_or_else(|| panic!("fixture has no sheet {s:?}"));
                        format!(r#" localSheetId="{id}""#)
                    })
                    .unwrap_or_default();
                xml.push_str(&format!(
                    r#"<definedName name="{}"{scope}>{}</definedName>"#,
                    escape_xml(&name.name),
                    escape_xml(&name.refers_to)
                ));
            }
            xml.push_str("</definedNames>");
        }
        xml.push_str(r#"<calcPr calcId="191029"/></workbook>"#);
        xml
    }

    fn workbook_rels_xml(&self) -> String {
        let mut xml = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
        );
        let count = self.sheets.len();
        for i in 1..=count {
            xml.push_str(&format!(
                r#"<Relationship Id="rId{i}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{i}.xml"/>"#
            ));
        }
        xml.push_str(&format!(
            r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>"#,
            count + 1
        ));
        xml.push_str(&format!(
            r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/>"#,
            count + 2
        ));
        if self.calc_chain {
            xml.push_str(&format!(
                r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/calcChain" Target="calcChain.xml"/>"#,
                count + 3
            ));
        }
        xml.push_str("</Relationships>");
        xml
    }

    fn calc_chain_xml(&self) -> String {
        let mut xml = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><calcChain xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
        );
        for (i, sheet) in self.sheets.iter().enumerate() {
            for (cell, value, _) in &sheet.cells {
                if matches!(value, FixtureCell::Formula { .. }) {
                    xml.push_str(&format!(r#"<c r="{cell}" i="{}"/>"#, i + 1));
                }
            }
        }
        xml.push_str("</calcChain>");
        xml
    }
}

/// Two fills (the mandatory none and gray125) and two cell formats.
const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts><fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills><borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="2"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="14" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"><alignment horizontal="right"/></xf></cellXfs><cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles></styleSheet>"#;

fn generate_sheet(sheet: &FixtureSheet, strings: &mut Vec<String>) -> String {
    let mut rows: Vec<(u32, Vec<String>)> = Vec::new();
    for (cell, value, style) in &sheet.cells {
        let row = row_of(cell);
        let s = style.map(|s| format!(r#" s="{s}""#)).unwrap_or_default();
        let markup = match value {
            FixtureCell::Number(n) => format!(r#"<c r="{cell}"{s}><v>{n}</v></c>"#),
            FixtureCell::Text(text) => {
                let index = strings.iter().position(|t| t == text).unwrap_or_else(|| {
                    strings.push(text.clone());
                    strings.len() - 1
                });
                format!(r#"<c r="{cell}"{s} t="s"><v>{index}</v></c>"#)
            }
            FixtureCell::Formula { text, cached } => {
                let v = cached.map(|n| format!("<v>{n}</v>")).unwrap_or_default();
                format!(r#"<c r="{cell}"{s}><f>{}</f>{v}</c>"#, escape_xml(text))
            }
        };
        match rows.iter_mut().find(|(r, _)| *r == row) {
            Some((_, cells)) => cells.push(markup),
            None => rows.push((row, vec![markup])),
        }
    }
    rows.sort_by_key(|(r, _)| *r);

    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><dimension ref="A1"/><sheetViews><sheetView workbookViewId="0"/></sheetViews><sheetFormatPr defaultRowHeight="15"/>"#,
    );
    if rows.is_empty() {
        xml.push_str("<sheetData/>");
    } else {
        xml.push_str("<sheetData>");
        for (row, cells) in rows {
            xml.push_str(&format!(r#"<row r="{row}">"#));
            for cell in cells {
                xml.push_str(&cell);
            }
            xml.push_str("</row>");
        }
        xml.push_str("</sheetData>");
    }
    xml.push_str(r#"<pageMargins left="0.7" right="0.7" top="0.75" bottom="0.75" header="0.3" footer="0.3"/></worksheet>"#);
    xml
}

fn shared_strings_xml(strings: &[String]) -> String {
    let mut xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="{0}" uniqueCount="{0}">"#,
        strings.len()
    );
    for s in strings {
        xml.push_str(&format!("<si><t>{}</t></si>", escape_xml(s)));
    }
    xml.push_str("</sst>");
    xml
}

fn row_of(cell: &str) -> u32 {
    cell.trim_start_matches(|c: char| c.is_ascii_alphabetic())
        .parse()
        .unwrap_or_else(|_| panic!("bad fixture cell {cell:?}"))
}

pub fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// A project payload as the requesting service sends it, with `groups` as
/// its measurement groups.
pub fn project(model: &str, groups: serde_json::Value) -> ReportData {
    let json = serde_json::json!({
        "id": 311,
        "name": "Elm Street Sidewalks",
        "po_number": "PO-7781",
        "customer": { "id": 4, "name": "Springfield DPW", "city": "Springfield" },
        "territory": { "id": 2, "name": "Northeast", "royalty_rate": 5.0 },
        "business_development_manager": { "id": 9, "email": "pat@pss.com", "initials": "PT" },
        "surveyor": { "id": 10, "email": "sam@pss.com", "initials": "SM" },
        "survey_date": "2024-03-09",
        "contact": { "name": "Lee Park", "title": "Engineer", "email": "lee@city.gov" },
        "pricing": {
            "estimated_sidewalk_miles": 12.5,
            "surveyor_speed": 3.0,
            "survey_hazards": 2,
            "hazard_density": 1,
            "panel_size": 3,
            "commission_rate": 10.0,
            "number_of_technicians": 4
        },
        "pricing_model": model,
        "hazards": { "count": 3, "inch_feet": 14.5, "square_feet": 20.0, "linear_feet_curb": 6.0 },
        "measurements": groups
    });
    ReportData::from_json(&json.to_string()).unwrap()
}

/// Text of a part of a written package, `None` when it is absent.
pub fn read_part(bytes: &[u8], name: &str) -> Option<String> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut file = archive.by_name(name).ok()?;
    let mut text = String::new();
    file.read_to_string(&mut text).unwrap();
    Some(text)
}

/// Names of every entry of a written package, in archive order.
pub fn part_names(bytes: &[u8]) -> Vec<String> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    (0..archive.len())
        .map(|i| archive.by_index_raw(i).unwrap().name().to_string())
        .collect()
}
