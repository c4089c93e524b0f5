//! Package plumbing: part lookup, relationships, content types and the
//! extended properties part.

use std::collections::HashMap;
use std::io::{Read, Seek};

use quick_xml::events::Event;
use quick_xml::Reader;
use zip::ZipArchive;

use crate::error::{ReportError, Result};
use crate::xml_helpers::{attr_string, owned_attributes, xml_escape};

pub(super) const REL_OFFICE_DOCUMENT: &str = "/officeDocument";
pub(super) const REL_WORKSHEET: &str = "/worksheet";
pub(super) const REL_STYLES: &str = "/styles";
pub(super) const REL_SHARED_STRINGS: &str = "/sharedStrings";
pub(super) const REL_CALC_CHAIN: &str = "/calcChain";
pub(super) const REL_EXTENDED_PROPERTIES: &str = "/extended-properties";

pub(super) const CONTENT_TYPES: &str = "[Content_Types].xml";
pub(super) const PACKAGE_RELS: &str = "_rels/.rels";

/// Template main-part content types and the workbook types they become.
const TEMPLATE_TYPES: [(&str, &str); 2] = [
    (
        "application/vnd.openxmlformats-officedocument.spreadsheetml.template.main+xml",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml",
    ),
    (
        "application/vnd.ms-excel.template.macroEnabled.main+xml",
        "application/vnd.ms-excel.sheet.macroEnabled.main+xml",
    ),
];

const MACRO_ENABLED_TYPES: [&str; 2] = [
    "application/vnd.ms-excel.sheet.macroEnabled.main+xml",
    "application/vnd.ms-excel.template.macroEnabled.main+xml",
];

/// One `<Relationship>` with its target resolved to an archive path.
#[derive(Debug, Clone)]
pub(super) struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub path: String,
    pub external: bool,
}

impl Relationship {
    pub fn is(&self, kind: &str) -> bool {
        !self.external && self.rel_type.ends_with(kind)
    }
}

/// Read a part as UTF-8 text, `None` when the archive has no such entry.
pub(super) fn read_part<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    path: &str,
) -> Result<Option<String>> {
    let mut file = match archive.by_name(path) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut text = String::with_capacity(usize::try_from(file.size()).unwrap_or(0));
    file.read_to_string(&mut text)?;
    Ok(Some(text))
}

pub(super) fn require_part<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    path: &str,
) -> Result<String> {
    read_part(archive, path)?.ok_or_else(|| ReportError::MissingPart(path.to_string()))
}

/// `xl/workbook.xml` -> `xl/_rels/workbook.xml.rels`.
pub(super) fn rels_path_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part}.rels"),
    }
}

/// Directory of a part (`xl` for `xl/workbook.xml`, empty at the root).
pub(super) fn part_dir(part: &str) -> &str {
    part.rsplit_once('/').map_or("", |(dir, _)| dir)
}

/// Resolve a relationship target against the directory of its source part.
pub(super) fn resolve_target(base_dir: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut segments: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}

/// Parse a relationships part whose source part lives in `base_dir`.
pub(super) fn parse_relationships(xml: &str, base_dir: &str) -> Result<Vec<Relationship>> {
    let mut reader = Reader::from_str(xml);
    let mut rels = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(ref e) | Event::Empty(ref e) if e.local_name().as_ref() == b"Relationship" => {
                let id = attr_string(e, b"Id").unwrap_or_default();
                let rel_type = attr_string(e, b"Type").unwrap_or_default();
                let target = attr_string(e, b"Target").unwrap_or_default();
                let external = attr_string(e, b"TargetMode").is_some_and(|m| m == "External");
                if id.is_empty() || target.is_empty() {
                    continue;
                }
                let path = if external {
                    target
                } else {
                    resolve_target(base_dir, &target)
                };
                rels.push(Relationship {
                    id,
                    rel_type,
                    path,
                    external,
                });
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(rels)
}

/// Drop every `local` element for which `drop` returns true.
pub(super) fn remove_elements<F>(xml: &str, local: &[u8], drop: F) -> Result<String>
where
    F: Fn(&[(String, String)]) -> bool,
{
    let mut reader = Reader::from_str(xml);
    let mut cut: Vec<(usize, usize)> = Vec::new();
    let mut open: Option<usize> = None;

    loop {
        let before = reader.buffer_position();
        match reader.read_event()? {
            Event::Empty(ref e) if e.local_name().as_ref() == local => {
                if drop(&owned_attributes(e)) {
                    cut.push((before, reader.buffer_position()));
                }
            }
            Event::Start(ref e) if e.local_name().as_ref() == local => {
                if drop(&owned_attributes(e)) {
                    open = Some(before);
                }
            }
            Event::End(ref e) if e.local_name().as_ref() == local => {
                if let Some(start) = open.take() {
                    cut.push((start, reader.buffer_position()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let mut out = String::with_capacity(xml.len());
    let mut cursor = 0;
    for (start, end) in cut {
        out.push_str(xml.get(cursor..start).unwrap_or(""));
        cursor = end;
    }
    out.push_str(xml.get(cursor..).unwrap_or(""));
    Ok(out)
}

/// Content type declared for `part` by an `<Override>`.
pub(super) fn override_type(content_types: &str, part: &str) -> Result<Option<String>> {
    let wanted = format!("/{part}");
    let mut reader = Reader::from_str(content_types);
    loop {
        match reader.read_event()? {
            Event::Start(ref e) | Event::Empty(ref e) if e.local_name().as_ref() == b"Override" => {
                if attr_string(e, b"PartName").is_some_and(|p| p.eq_ignore_ascii_case(&wanted)) {
                    return Ok(attr_string(e, b"ContentType"));
                }
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

pub(super) fn is_macro_enabled(main_type: &str) -> bool {
    MACRO_ENABLED_TYPES.contains(&main_type)
}

/// Content types for the finished document: template main types become
/// workbook types and overrides for `dropped` parts disappear.
pub(super) fn patch_content_types(xml: &str, dropped: &[String]) -> Result<String> {
    let mut out = TEMPLATE_TYPES
        .iter()
        .fold(xml.to_string(), |acc, (template, sheet)| acc.replace(template, sheet));
    if !dropped.is_empty() {
        out = remove_elements(&out, b"Override", |attrs| {
            attrs.iter().any(|(k, v)| {
                k == "PartName"
                    && dropped
                        .iter()
                        .any(|d| v.trim_start_matches('/').eq_ignore_ascii_case(d))
            })
        })?;
    }
    Ok(out)
}

/// Relationships part without the relationships whose ids are in `ids`.
pub(super) fn drop_relationships(xml: &str, ids: &[String]) -> Result<String> {
    remove_elements(xml, b"Relationship", |attrs| {
        attrs.iter().any(|(k, v)| k == "Id" && ids.contains(v))
    })
}

/// Rewrite sheet titles in the extended properties part. `renames` maps a
/// sheet's template name to its current name.
pub(super) fn patch_app_titles(xml: &str, renames: &HashMap<String, String>) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut in_titles = false;
    let mut in_entry = false;
    let mut edits: Vec<(usize, usize, String)> = Vec::new();

    loop {
        let before = reader.buffer_position();
        match reader.read_event()? {
            Event::Start(ref e) => match e.local_name().as_ref() {
                b"TitlesOfParts" => in_titles = true,
                b"lpstr" if in_titles => in_entry = true,
                _ => {}
            },
            Event::End(ref e) => match e.local_name().as_ref() {
                b"TitlesOfParts" => in_titles = false,
                b"lpstr" => in_entry = false,
                _ => {}
            },
            Event::Text(ref t) if in_entry => {
                let text = t.unescape()?;
                if let Some(new) = renames.get(text.as_ref()) {
                    edits.push((before, reader.buffer_position(), xml_escape(new)));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let mut out = String::with_capacity(xml.len());
    let mut cursor = 0;
    for (start, end, text) in edits {
        out.push_str(xml.get(cursor..start).unwrap_or(""));
        out.push_str(&text);
        cursor = end;
    }
    out.push_str(xml.get(cursor..).unwrap_or(""));
    Ok(out)
}
