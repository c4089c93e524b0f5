//! Structured error types for report assembly.
//!
//! Variants fall into three families: template errors (the workbook or one of
//! its sheets/names is unusable), data errors (the input record set violates a
//! mandatory constraint) and capacity errors (a group does not fit its layout).

/// All errors that can occur while assembling a report.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// XML parsing error from quick-xml.
    #[error("XML parsing: {0}")]
    Xml(#[from] quick_xml::Error),

    /// ZIP archive error.
    #[error("ZIP archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Report data could not be decoded.
    #[error("Report data: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration file could not be decoded.
    #[error("Configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// Invalid cell reference.
    #[error("Invalid cell reference: {0}")]
    CellRef(String),

    /// A worksheet the layout refers to is not in the template.
    #[error("Worksheet not found: {0:?}")]
    MissingSheet(String),

    /// A required package part is absent from the template.
    #[error("Template part not found: {0}")]
    MissingPart(String),

    /// A defined name the caller asked for does not exist.
    #[error("Defined name not found: {name}{}", scope.as_ref().map(|s| format!(" (scope {s:?})")).unwrap_or_default())]
    MissingDefinedName { name: String, scope: Option<String> },

    /// Renaming would produce two sheets with the same name.
    #[error("Worksheet already exists: {0:?}")]
    DuplicateSheet(String),

    /// A sheet name the spreadsheet format does not accept.
    #[error("Invalid worksheet name {name:?}: {reason}")]
    InvalidSheetName { name: String, reason: &'static str },

    /// The template's structure does not match what the layout expects.
    #[error("Template error: {0}")]
    Template(String),

    /// A mandatory input field is missing or malformed.
    #[error("Invalid report data: {0}")]
    Validation(String),

    /// A group has more records than its layout section can hold.
    #[error(
        "Group {group:?} has {rows} rows but section {section} holds at most {capacity}"
    )]
    Capacity {
        section: String,
        group: String,
        rows: usize,
        capacity: u32,
    },

    /// More technicians than the layout has indicator columns for.
    #[error("{technicians} technicians but the layout has {capacity} technician columns")]
    TechnicianCapacity { technicians: usize, capacity: u32 },

    /// The upload collaborator rejected the finished document.
    #[error("Upload failed: {0}")]
    Upload(String),

    /// The completion callback failed.
    #[error("Completion notification failed: {0}")]
    Notify(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ReportError>;

impl ReportError {
    /// True for errors caused by the template rather than the input data.
    pub fn is_template_error(&self) -> bool {
        matches!(
            self,
            Self::Xml(_)
                | Self::Zip(_)
                | Self::MissingSheet(_)
                | Self::MissingPart(_)
                | Self::MissingDefinedName { .. }
                | Self::Template(_)
        )
    }
}
