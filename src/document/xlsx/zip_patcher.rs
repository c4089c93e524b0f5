//! Write the finished package.
//!
//! Unmodified entries are copied via `raw_copy_file` (no recompression).
//! Replaced parts are written deflated; dropped parts are left out.

use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Write};

use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::error::Result;

/// Copy `original`, substituting the parts in `replaced` and omitting the
/// parts in `dropped`. Entry order is preserved.
pub(super) fn patch_package(
    original: &[u8],
    replaced: &HashMap<String, String>,
    dropped: &HashSet<String>,
) -> Result<Vec<u8>> {
    let mut archive = ZipArchive::new(Cursor::new(original))?;
    let buf: Vec<u8> = Vec::with_capacity(original.len());
    let mut writer = ZipWriter::new(Cursor::new(buf));

    for i in 0..archive.len() {
        let entry = archive.by_index_raw(i)?;
        let name = entry.name().to_string();

        if dropped.contains(&name) {
            continue;
        }
        if let Some(xml) = replaced.get(&name) {
            let options =
                FileOptions::default().compression_method(zip::CompressionMethod::Deflated);
            writer.start_file(name, options)?;
            writer.write_all(xml.as_bytes())?;
            continue;
        }
        writer.raw_copy_file(entry)?;
    }

    let cursor = writer.finish()?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Read;

    fn package(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, body) in entries {
            writer.start_file(*name, FileOptions::default()).unwrap();
            writer.write_all(body.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn replaces_drops_and_copies() {
        let original = package(&[("a.xml", "<a/>"), ("b.xml", "<b/>"), ("c.xml", "<c/>")]);
        let replaced = HashMap::from([("b.xml".to_string(), "<b>new</b>".to_string())]);
        let dropped = HashSet::from(["c.xml".to_string()]);

        let out = patch_package(&original, &replaced, &dropped).unwrap();
        let mut archive = ZipArchive::new(Cursor::new(out)).unwrap();
        let names: Vec<String> = archive.file_names().map(str::to_string).collect();
        assert_eq!(names.len(), 2);

        let mut text = String::new();
        archive.by_name("b.xml").unwrap().read_to_string(&mut text).unwrap();
        assert_eq!(text, "<b>new</b>");
        text.clear();
        archive.by_name("a.xml").unwrap().read_to_string(&mut text).unwrap();
        assert_eq!(text, "<a/>");
    }
}
