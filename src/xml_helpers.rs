//! Shared XML utilities for reading and patching package parts.
//!
//! Reading goes through quick-xml events. Writing never rebuilds a whole part:
//! callers locate the element they own with [`find_element`] and splice new
//! markup into the original text, leaving everything else byte-for-byte.

use std::ops::Range;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::Result;

/// Extract a string attribute value by key, unescaping entities.
///
/// Returns `None` if the attribute is missing or not valid UTF-8.
pub fn attr_string(e: &BytesStart, key: &[u8]) -> Option<String> {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == key {
            return attr.unescape_value().ok().map(|s| s.into_owned());
        }
    }
    None
}

/// Extract a `u32` attribute value by key.
pub fn attr_u32(e: &BytesStart, key: &[u8]) -> Option<u32> {
    attr_string(e, key).and_then(|s| s.parse().ok())
}

/// Extract a boolean attribute value by key.
///
/// Returns `None` if missing. Recognizes `"1"`, `"true"` as true; `"0"`, `"false"` as false.
pub fn attr_bool(e: &BytesStart, key: &[u8]) -> Option<bool> {
    attr_string(e, key).map(|s| matches!(s.as_str(), "1" | "true"))
}

/// All attributes of an element as owned `(qualified name, unescaped value)` pairs,
/// in document order.
pub fn owned_attributes(e: &BytesStart) -> Vec<(String, String)> {
    e.attributes()
        .flatten()
        .filter_map(|attr| {
            let key = std::str::from_utf8(attr.key.as_ref()).ok()?.to_string();
            let value = attr.unescape_value().ok()?.into_owned();
            Some((key, value))
        })
        .collect()
}

/// Escape text for use in element content or a double-quoted attribute.
pub fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Append `<name k="v" ...>` (or `/>` when `empty`) to `out`.
pub fn push_start_tag(out: &mut String, name: &str, attrs: &[(String, String)], empty: bool) {
    out.push('<');
    out.push_str(name);
    for (key, value) in attrs {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(&xml_escape(value));
        out.push('"');
    }
    out.push_str(if empty { "/>" } else { ">" });
}

/// Set (or add) an attribute in an owned attribute list, keeping its position.
pub fn set_attr(attrs: &mut Vec<(String, String)>, key: &str, value: impl Into<String>) {
    let value = value.into();
    match attrs.iter_mut().find(|(k, _)| k == key) {
        Some(slot) => slot.1 = value,
        None => attrs.push((key.to_string(), value)),
    }
}

/// Byte range of the first element whose local name is `local`, from its
/// opening `<` to the end of its closing tag (or of the self-closing tag).
pub fn find_element(xml: &str, local: &[u8]) -> Result<Option<Range<usize>>> {
    let mut reader = Reader::from_str(xml);
    let mut start: Option<usize> = None;
    let mut depth = 0usize;

    loop {
        let before = reader.buffer_position();
        match reader.read_event()? {
            Event::Start(ref e) if e.local_name().as_ref() == local => {
                if start.is_none() {
                    start = Some(before);
                }
                depth += 1;
            }
            Event::Empty(ref e) if e.local_name().as_ref() == local && start.is_none() => {
                return Ok(Some(before..reader.buffer_position()));
            }
            Event::End(ref e) if e.local_name().as_ref() == local => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    if let Some(s) = start {
                        return Ok(Some(s..reader.buffer_position()));
                    }
                }
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

/// The attributes of the first element named `local`, if present.
pub fn element_attributes(xml: &str, local: &[u8]) -> Result<Option<Vec<(String, String)>>> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event()? {
            Event::Start(ref e) | Event::Empty(ref e) if e.local_name().as_ref() == local => {
                return Ok(Some(owned_attributes(e)));
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

/// Replace the opening tag of the first `local` element with one carrying
/// `attrs`, keeping its content. Returns `None` when the element is absent.
pub fn replace_start_tag(
    xml: &str,
    local: &[u8],
    attrs: &[(String, String)],
) -> Result<Option<String>> {
    let mut reader = Reader::from_str(xml);
    loop {
        let before = reader.buffer_position();
        match reader.read_event()? {
            Event::Start(ref e) if e.local_name().as_ref() == local => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                return Ok(Some(splice_tag(xml, before, reader.buffer_position(), &name, attrs, false)));
            }
            Event::Empty(ref e) if e.local_name().as_ref() == local => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                return Ok(Some(splice_tag(xml, before, reader.buffer_position(), &name, attrs, true)));
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

fn splice_tag(
    xml: &str,
    start: usize,
    end: usize,
    name: &str,
    attrs: &[(String, String)],
    empty: bool,
) -> String {
    let mut out = String::with_capacity(xml.len() + 32);
    out.push_str(xml.get(..start).unwrap_or(""));
    push_start_tag(&mut out, name, attrs, empty);
    out.push_str(xml.get(end..).unwrap_or(""));
    out
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;

    fn make_start(xml: &str) -> BytesStart<'_> {
        // Strip < and > / /> to get just the tag content
        let content = xml
            .trim_start_matches('<')
            .trim_end_matches('>')
            .trim_end_matches('/')
            .trim_end();
        BytesStart::from_content(content, content.find(' ').unwrap_or(content.len()))
    }

    #[test]
    fn test_attr_string_unescapes() {
        let e = make_start(r#"<definedName name="Total" comment="a &amp; b" />"#);
        assert_eq!(attr_string(&e, b"name"), Some("Total".to_string()));
        assert_eq!(attr_string(&e, b"comment"), Some("a & b".to_string()));
        assert_eq!(attr_string(&e, b"missing"), None);
    }

    #[test]
    fn test_attr_u32_and_bool() {
        let e = make_start(r#"<sheet sheetId="42" hidden="1" />"#);
        assert_eq!(attr_u32(&e, b"sheetId"), Some(42));
        assert_eq!(attr_bool(&e, b"hidden"), Some(true));
        assert_eq!(attr_bool(&e, b"missing"), None);
    }

    #[test]
    fn test_owned_attributes_keep_order() {
        let e = make_start(r#"<sheet name="1" sheetId="3" r:id="rId3" />"#);
        let attrs = owned_attributes(&e);
        let keys: Vec<&str> = attrs.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["name", "sheetId", "r:id"]);
    }

    #[test]
    fn test_xml_escape() {
        assert_eq!(xml_escape(r#"'A & B' <"x">"#), "&apos;A &amp; B&apos; &lt;&quot;x&quot;&gt;");
    }

    #[test]
    fn test_find_element_nested_and_empty() {
        let xml = r#"<a><b x="1"><b/></b><c/></a>"#;
        let range = find_element(xml, b"b").unwrap().unwrap();
        assert_eq!(&xml[range], r#"<b x="1"><b/></b>"#);
        let range = find_element(xml, b"c").unwrap().unwrap();
        assert_eq!(&xml[range], "<c/>");
        assert!(find_element(xml, b"d").unwrap().is_none());
    }

    #[test]
    fn test_replace_start_tag_keeps_content() {
        let xml = r#"<root><calcPr calcId="191029"/><x>1</x></root>"#;
        let mut attrs = element_attributes(xml, b"calcPr").unwrap().unwrap();
        set_attr(&mut attrs, "fullCalcOnLoad", "1");
        let out = replace_start_tag(xml, b"calcPr", &attrs).unwrap().unwrap();
        assert_eq!(
            out,
            r#"<root><calcPr calcId="191029" fullCalcOnLoad="1"/><x>1</x></root>"#
        );
    }
}
