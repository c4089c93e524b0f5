//! Producing the finished file.
//!
//! The template is read, filled in memory and written to a temporary file in
//! the output directory. Only a fully written document is persisted under its
//! final `<uuid>.<ext>` name; on any error the temporary file is removed.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::composer::{ComposeOptions, CompositionSummary, ReportComposer};
use crate::document::XlsxDocument;
use crate::error::{ReportError, Result};
use crate::layout::{layout_for, ReportKind, ReportLayout};
use crate::model::ReportData;

/// A report written to disk.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedReport {
    pub path: PathBuf,
    pub extension: String,
    pub size: usize,
    pub summary: CompositionSummary,
}

/// Fill template bytes in memory.
pub fn compose_bytes(
    template: Vec<u8>,
    layout: &ReportLayout,
    data: &ReportData,
    options: ComposeOptions,
) -> Result<(Vec<u8>, CompositionSummary)> {
    let mut doc = XlsxDocument::from_bytes(template)?;
    if doc.is_macro_enabled() != (layout.extension == "xlsm") {
        warn!(
            template = layout.template,
            extension = layout.extension,
            "template macro support does not match the output extension"
        );
    }
    let summary = ReportComposer::new(layout, options).compose(&mut doc, data)?;
    Ok((doc.to_bytes()?, summary))
}

/// Generate a `kind` report for `data` from `template` into `output_dir`.
pub fn generate_report(
    data: &ReportData,
    kind: ReportKind,
    template: &Path,
    output_dir: &Path,
    options: ComposeOptions,
) -> Result<GeneratedReport> {
    let layout = layout_for(kind, data.pricing_model);
    let template_bytes = std::fs::read(template).map_err(|e| {
        ReportError::Template(format!("cannot read template {}: {e}", template.display()))
    })?;
    debug!(template = %template.display(), bytes = template_bytes.len(), "read template");

    let (bytes, summary) = compose_bytes(template_bytes, layout, data, options)?;

    std::fs::create_dir_all(output_dir)?;
    let mut staging = NamedTempFile::new_in(output_dir)?;
    staging.write_all(&bytes)?;
    staging.as_file().sync_all()?;

    let path = output_dir.join(format!("{}.{}", Uuid::new_v4(), layout.extension));
    staging.persist(&path).map_err(|e| ReportError::Io(e.error))?;

    info!(path = %path.display(), size = bytes.len(), "report written");
    Ok(GeneratedReport {
        path,
        extension: layout.extension.to_string(),
        size: bytes.len(),
        summary,
    })
}
