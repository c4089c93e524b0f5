//! Style part: highlight formats derived from a cell's existing format.
//!
//! A highlight keeps everything about the cell's current `xf` (font, border,
//! number format) and swaps in a solid fill and a horizontal alignment. New
//! fills and `xf` records are appended; existing indices never move.

use std::collections::HashMap;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{ReportError, Result};
use crate::highlight::{Highlight, HighlightColor};
use crate::xml_helpers::{element_attributes, find_element, push_start_tag, set_attr};

#[derive(Debug, Clone)]
pub(super) struct StylePart {
    pub path: String,
    xml: String,
    prefix: String,
    fill_count: usize,
    /// Raw markup of every `<xf>` in `<cellXfs>`.
    xfs: Vec<String>,
    new_fills: Vec<String>,
    new_xfs: Vec<String>,
    fills: HashMap<HighlightColor, usize>,
    derived: HashMap<(u32, Highlight), u32>,
}

impl StylePart {
    pub fn parse(path: &str, xml: String) -> Result<Self> {
        let fills = children(&xml, b"fills", b"fill")?;
        let xfs = children(&xml, b"cellXfs", b"xf")?;
        let prefix = qualified_prefix(&xml, b"cellXfs")?;
        Ok(Self {
            path: path.to_string(),
            fill_count: fills.len(),
            xfs,
            xml,
            prefix,
            new_fills: Vec::new(),
            new_xfs: Vec::new(),
            fills: HashMap::new(),
            derived: HashMap::new(),
        })
    }

    pub fn is_dirty(&self) -> bool {
        !self.new_xfs.is_empty()
    }

    /// Index of the format `base` with `highlight` applied, creating it on
    /// first use.
    pub fn highlight_xf(&mut self, base: u32, highlight: Highlight) -> Result<u32> {
        if let Some(xf) = self.derived.get(&(base, highlight)) {
            return Ok(*xf);
        }
        let base_xml = usize::try_from(base)
            .ok()
            .and_then(|i| self.xfs.get(i))
            .cloned()
            .ok_or_else(|| {
                ReportError::Template(format!("{} has no cell format {base}", self.path))
            })?;
        let fill = self.fill_for(highlight.color);
        let derived = derive_xf(&base_xml, fill, highlight)?;

        let index = u32::try_from(self.xfs.len())
            .map_err(|_| ReportError::Template(format!("{} has too many cell formats", self.path)))?;
        self.xfs.push(derived.clone());
        self.new_xfs.push(derived);
        self.derived.insert((base, highlight), index);
        Ok(index)
    }

    fn fill_for(&mut self, color: HighlightColor) -> usize {
        if let Some(id) = self.fills.get(&color) {
            return *id;
        }
        let p = &self.prefix;
        self.new_fills.push(format!(
            "<{p}fill><{p}patternFill patternType=\"solid\"><{p}fgColor rgb=\"FF{}\"/><{p}bgColor indexed=\"64\"/></{p}patternFill></{p}fill>",
            color.rgb()
        ));
        let id = self.fill_count + self.new_fills.len() - 1;
        self.fills.insert(color, id);
        id
    }

    pub fn to_xml(&self) -> Result<String> {
        let xml = append_children(
            &self.xml,
            b"fills",
            &self.new_fills,
            self.fill_count + self.new_fills.len(),
        )?;
        append_children(&xml, b"cellXfs", &self.new_xfs, self.xfs.len())
    }
}

/// Raw markup of each direct `child` of the first `parent` element.
fn children(xml: &str, parent: &[u8], child: &[u8]) -> Result<Vec<String>> {
    let Some(range) = find_element(xml, parent)? else {
        return Ok(Vec::new());
    };
    let block = xml.get(range).unwrap_or("");
    let mut reader = Reader::from_str(block);
    let mut found = Vec::new();
    let mut depth = 0usize;
    let mut start: Option<usize> = None;

    loop {
        let before = reader.buffer_position();
        match reader.read_event()? {
            Event::Start(ref e) => {
                depth += 1;
                if depth == 2 && e.local_name().as_ref() == child {
                    start = Some(before);
                }
            }
            Event::Empty(ref e) if depth == 1 && e.local_name().as_ref() == child => {
                found.push(block.get(before..reader.buffer_position()).unwrap_or("").to_string());
            }
            Event::End(_) => {
                if depth == 2 {
                    if let Some(s) = start.take() {
                        found.push(block.get(s..reader.buffer_position()).unwrap_or("").to_string());
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(found)
}

fn qualified_prefix(xml: &str, local: &[u8]) -> Result<String> {
    let Some(range) = find_element(xml, local)? else {
        return Ok(String::new());
    };
    let tag = xml.get(range.start + 1..).unwrap_or("");
    let name_end = tag
        .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
        .unwrap_or(tag.len());
    Ok(tag
        .get(..name_end)
        .and_then(|n| n.split_once(':'))
        .map(|(p, _)| format!("{p}:"))
        .unwrap_or_default())
}

/// Copy of the `xf` markup `base` pointing at `fill` with the highlight's
/// alignment.
fn derive_xf(base: &str, fill: usize, highlight: Highlight) -> Result<String> {
    let mut attrs = element_attributes(base, b"xf")?.unwrap_or_default();
    set_attr(&mut attrs, "fillId", fill.to_string());
    set_attr(&mut attrs, "applyFill", "1");
    set_attr(&mut attrs, "applyAlignment", "1");

    let mut alignment = element_attributes(base, b"alignment")?.unwrap_or_default();
    set_attr(&mut alignment, "horizontal", highlight.align.as_str());

    let tag_end = base.find('>').map_or(base.len(), |i| i + 1);
    let name = base
        .get(1..tag_end)
        .and_then(|t| t.split(|c: char| c.is_whitespace() || c == '>' || c == '/').next())
        .unwrap_or("xf")
        .to_string();
    let prefix = name.strip_suffix("xf").unwrap_or("");

    // children other than the old alignment
    let self_closing = base.get(..tag_end).is_some_and(|t| t.ends_with("/>"));
    let inner = if self_closing {
        String::new()
    } else {
        let close = base.rfind("</").unwrap_or(base.len());
        let inner = base.get(tag_end..close).unwrap_or("");
        match find_element(inner, b"alignment")? {
            Some(range) => format!(
                "{}{}",
                inner.get(..range.start).unwrap_or(""),
                inner.get(range.end..).unwrap_or("")
            ),
            None => inner.to_string(),
        }
    };

    let mut out = String::with_capacity(base.len() + 64);
    push_start_tag(&mut out, &name, &attrs, false);
    push_start_tag(&mut out, &format!("{prefix}alignment"), &alignment, true);
    out.push_str(&inner);
    out.push_str(&format!("</{name}>"));
    Ok(out)
}

/// Append `new` children to the first `local` element and set its `count`.
fn append_children(xml: &str, local: &[u8], new: &[String], count: usize) -> Result<String> {
    if new.is_empty() {
        return Ok(xml.to_string());
    }
    let range = find_element(xml, local)?.ok_or_else(|| {
        ReportError::Template(format!(
            "style part has no {} element",
            String::from_utf8_lossy(local)
        ))
    })?;
    let block = xml.get(range.clone()).unwrap_or("");
    let mut attrs = element_attributes(block, local)?.unwrap_or_default();
    set_attr(&mut attrs, "count", count.to_string());

    let tag_end = block.find('>').map_or(block.len(), |i| i + 1);
    let name = block
        .get(1..tag_end)
        .and_then(|t| t.split(|c: char| c.is_whitespace() || c == '>' || c == '/').next())
        .unwrap_or("")
        .to_string();
    let self_closing = block.get(..tag_end).is_some_and(|t| t.ends_with("/>"));
    let existing = if self_closing {
        ""
    } else {
        block
            .get(tag_end..block.rfind("</").unwrap_or(block.len()))
            .unwrap_or("")
    };

    let mut out = String::with_capacity(xml.len() + new.iter().map(String::len).sum::<usize>());
    out.push_str(xml.get(..range.start).unwrap_or(""));
    push_start_tag(&mut out, &name, &attrs, false);
    out.push_str(existing);
    for child in new {
        out.push_str(child);
    }
    out.push_str(&format!("</{name}>"));
    out.push_str(xml.get(range.end..).unwrap_or(""));
    Ok(out)
}
