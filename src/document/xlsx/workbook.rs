//! The workbook part: sheet list, defined names, date system and the
//! calculation and view settings the engine patches.

use chrono::NaiveDate;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{ReportError, Result};
use crate::xml_helpers::{
    attr_bool, attr_string, element_attributes, find_element, owned_attributes, push_start_tag,
    replace_start_tag, set_attr, xml_escape,
};

use super::package::{Relationship, REL_WORKSHEET};

/// Excel date system, which fixes the epoch of serial dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateSystem {
    /// Serial 1 is 1900-01-01, counting the phantom 1900-02-29.
    #[default]
    Date1900,
    /// Serial 0 is 1904-01-01.
    Date1904,
}

impl DateSystem {
    /// Serial day number of `date`.
    pub fn serial(self, date: NaiveDate) -> f64 {
        let epoch = match self {
            Self::Date1900 => NaiveDate::from_ymd_opt(1899, 12, 30),
            Self::Date1904 => NaiveDate::from_ymd_opt(1904, 1, 1),
        }
        .unwrap_or_default();
        let mut days = (date - epoch).num_days();
        // dates before 1900-03-01 sit before the phantom leap day
        if self == Self::Date1900 && (1..61).contains(&days) {
            days -= 1;
        }
        days as f64
    }
}

/// A `<sheet>` entry.
#[derive(Debug, Clone)]
pub(super) struct SheetEntry {
    pub name: String,
    /// Name in the template, used to patch the extended properties part.
    pub template_name: String,
    /// Every attribute of the element, `name` included.
    pub attrs: Vec<(String, String)>,
    /// Archive path of the worksheet, `None` for chart and dialog sheets.
    pub path: Option<String>,
}

/// A `<definedName>` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct NameEntry {
    pub name: String,
    pub refers_to: String,
    pub local_sheet_id: Option<usize>,
    pub hidden: bool,
    pub comment: Option<String>,
    /// Attributes the engine does not interpret (`function`, `xlm`, ...).
    pub extra: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub(super) struct WorkbookPart {
    pub path: String,
    xml: String,
    /// Namespace prefix of the part's elements, with its colon (usually empty).
    prefix: String,
    pub sheets: Vec<SheetEntry>,
    pub names: Vec<NameEntry>,
    pub date_system: DateSystem,
    pub active_tab: Option<usize>,
}

impl WorkbookPart {
    pub fn parse(path: &str, xml: String, rels: &[Relationship]) -> Result<Self> {
        let mut reader = Reader::from_str(&xml);
        let mut prefix = String::new();
        let mut sheets = Vec::new();
        let mut names = Vec::new();
        let mut date_system = DateSystem::Date1900;
        let mut current: Option<NameEntry> = None;
        let mut seen_root = false;

        loop {
            match reader.read_event()? {
                Event::Start(ref e) => {
                    if !seen_root {
                        seen_root = true;
                        prefix = element_prefix(e);
                    }
                    match e.local_name().as_ref() {
                        b"definedName" => current = Some(name_entry(e)),
                        b"workbookPr" => date_system = date_system_of(e),
                        b"sheet" => sheets.push(sheet_entry(e, rels)),
                        _ => {}
                    }
                }
                Event::Empty(ref e) => match e.local_name().as_ref() {
                    b"sheet" => sheets.push(sheet_entry(e, rels)),
                    b"workbookPr" => date_system = date_system_of(e),
                    b"definedName" => names.push(name_entry(e)),
                    _ => {}
                },
                Event::Text(ref t) => {
                    if let Some(entry) = current.as_mut() {
                        entry.refers_to.push_str(&t.unescape()?);
                    }
                }
                Event::CData(ref t) => {
                    if let Some(entry) = current.as_mut() {
                        entry.refers_to.push_str(&String::from_utf8_lossy(t));
                    }
                }
                Event::End(ref e) if e.local_name().as_ref() == b"definedName" => {
                    if let Some(entry) = current.take() {
                        names.push(entry);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if sheets.is_empty() {
            return Err(ReportError::Template(format!("{path} lists no sheets")));
        }
        names.retain(|n| !n.name.is_empty());

        Ok(Self {
            path: path.to_string(),
            xml,
            prefix,
            sheets,
            names,
            date_system,
            active_tab: None,
        })
    }

    /// Name of the sheet a `localSheetId` points at.
    pub fn scope_name(&self, local_sheet_id: Option<usize>) -> Option<String> {
        local_sheet_id
            .and_then(|i| self.sheets.get(i))
            .map(|s| s.name.clone())
    }

    /// Serialize with the current sheet list, names and settings.
    pub fn to_xml(&self) -> Result<String> {
        let mut xml = self.splice(&self.xml, b"sheets", Some(self.sheets_xml()))?;
        let names = (!self.names.is_empty()).then(|| self.names_xml());
        xml = match find_element(&xml, b"definedNames")? {
            Some(_) => self.splice(&xml, b"definedNames", names)?,
            None => match names {
                Some(block) => insert_after_first(&xml, NAMES_AFTER, &block)?,
                None => xml,
            },
        };

        let calc = match element_attributes(&xml, b"calcPr")? {
            Some(mut attrs) => {
                set_attr(&mut attrs, "fullCalcOnLoad", "1");
                replace_start_tag(&xml, b"calcPr", &attrs)?
            }
            None => None,
        };
        xml = match calc {
            Some(patched) => patched,
            None => {
                let mut tag = String::new();
                push_start_tag(
                    &mut tag,
                    &format!("{}calcPr", self.prefix),
                    &[("fullCalcOnLoad".to_string(), "1".to_string())],
                    true,
                );
                insert_after_first(&xml, CALC_AFTER, &tag)?
            }
        };

        if let Some(tab) = self.active_tab {
            if let Some(mut attrs) = element_attributes(&xml, b"workbookView")? {
                set_attr(&mut attrs, "activeTab", tab.to_string());
                let first = attrs
                    .iter()
                    .find(|(k, _)| k == "firstSheet")
                    .and_then(|(_, v)| v.parse::<usize>().ok());
                if first.is_some_and(|f| f > tab) {
                    set_attr(&mut attrs, "firstSheet", tab.to_string());
                }
                if let Some(patched) = replace_start_tag(&xml, b"workbookView", &attrs)? {
                    xml = patched;
                }
            }
        }

        Ok(xml)
    }

    fn sheets_xml(&self) -> String {
        let mut out = String::with_capacity(64 * self.sheets.len());
        out.push_str(&format!("<{}sheets>", self.prefix));
        for sheet in &self.sheets {
            let mut attrs = sheet.attrs.clone();
            set_attr(&mut attrs, "name", sheet.name.as_str());
            push_start_tag(&mut out, &format!("{}sheet", self.prefix), &attrs, true);
        }
        out.push_str(&format!("</{}sheets>", self.prefix));
        out
    }

    fn names_xml(&self) -> String {
        let tag = format!("{}definedName", self.prefix);
        let mut out = format!("<{}definedNames>", self.prefix);
        for entry in &self.names {
            let mut attrs = vec![("name".to_string(), entry.name.clone())];
            if let Some(comment) = &entry.comment {
                attrs.push(("comment".to_string(), comment.clone()));
            }
            if let Some(id) = entry.local_sheet_id {
                attrs.push(("localSheetId".to_string(), id.to_string()));
            }
            if entry.hidden {
                attrs.push(("hidden".to_string(), "1".to_string()));
            }
            attrs.extend(entry.extra.iter().cloned());
            push_start_tag(&mut out, &tag, &attrs, false);
            out.push_str(&xml_escape(&entry.refers_to));
            out.push_str(&format!("</{tag}>"));
        }
        out.push_str(&format!("</{}definedNames>", self.prefix));
        out
    }

    /// Replace the `local` element with `block`, or remove it when `None`.
    fn splice(&self, xml: &str, local: &[u8], block: Option<String>) -> Result<String> {
        let Some(range) = find_element(xml, local)? else {
            return Ok(xml.to_string());
        };
        let mut out = String::with_capacity(xml.len());
        out.push_str(xml.get(..range.start).unwrap_or(""));
        out.push_str(block.as_deref().unwrap_or(""));
        out.push_str(xml.get(range.end..).unwrap_or(""));
        Ok(out)
    }
}

/// Elements `definedNames` follows, latest first.
const NAMES_AFTER: &[&[u8]] = &[b"externalReferences", b"functionGroups", b"sheets"];
/// Elements `calcPr` follows, latest first.
const CALC_AFTER: &[&[u8]] = &[
    b"definedNames",
    b"externalReferences",
    b"functionGroups",
    b"sheets",
];

/// Insert `block` right after the first of `anchors` present in `xml`.
fn insert_after_first(xml: &str, anchors: &[&[u8]], block: &str) -> Result<String> {
    for anchor in anchors {
        if let Some(range) = find_element(xml, anchor)? {
            let mut out = String::with_capacity(xml.len() + block.len());
            out.push_str(xml.get(..range.end).unwrap_or(""));
            out.push_str(block);
            out.push_str(xml.get(range.end..).unwrap_or(""));
            return Ok(out);
        }
    }
    Err(ReportError::Template("workbook part has no sheets element".into()))
}

fn element_prefix(e: &BytesStart) -> String {
    let name = e.name();
    std::str::from_utf8(name.as_ref())
        .ok()
        .and_then(|n| n.split_once(':'))
        .map(|(p, _)| format!("{p}:"))
        .unwrap_or_default()
}

fn sheet_entry(e: &BytesStart, rels: &[Relationship]) -> SheetEntry {
    let attrs = owned_attributes(e);
    let name = attr_string(e, b"name").unwrap_or_default();
    let r_id = attrs
        .iter()
        .find(|(k, _)| k.ends_with(":id"))
        .map(|(_, v)| v.as_str());
    let path = r_id
        .and_then(|id| rels.iter().find(|r| r.id == id))
        .filter(|r| r.is(REL_WORKSHEET))
        .map(|r| r.path.clone());
    SheetEntry {
        template_name: name.clone(),
        name,
        attrs,
        path,
    }
}

fn name_entry(e: &BytesStart) -> NameEntry {
    let mut entry = NameEntry {
        name: String::new(),
        refers_to: String::new(),
        local_sheet_id: None,
        hidden: false,
        comment: None,
        extra: Vec::new(),
    };
    for (key, value) in owned_attributes(e) {
        match key.as_str() {
            "name" => entry.name = value,
            "localSheetId" => entry.local_sheet_id = value.parse().ok(),
            "hidden" => entry.hidden = matches!(value.as_str(), "1" | "true"),
            "comment" => entry.comment = Some(value).filter(|c| !c.is_empty()),
            _ => entry.extra.push((key, value)),
        }
    }
    entry
}

fn date_system_of(e: &BytesStart) -> DateSystem {
    if attr_bool(e, b"date1904").unwrap_or(false) {
        DateSystem::Date1904
    } else {
        DateSystem::Date1900
    }
}
