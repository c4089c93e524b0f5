//! survey-report - report assembly for sidewalk survey projects
//!
//! Fills survey and production measurements into spreadsheet report
//! templates:
//! - Groups records into at most one worksheet per group, merging the
//!   smallest groups when there are too many
//! - Writes every value, highlight and technician indicator formula at the
//!   address its report layout defines
//! - Renames the numbered placeholder sheets and rewires the defined names
//!   and summary formulas that pointed at them
//! - Patches the template package in place: untouched parts are copied raw
//!
//! # Usage
//!
//! ```no_run
//! use std::path::Path;
//! use survey_report::{generate_report, ComposeOptions, ReportData, ReportKind};
//!
//! # fn main() -> survey_report::Result<()> {
//! let data = ReportData::from_json(&std::fs::read_to_string("project.json")?)?;
//! let report = generate_report(
//!     &data,
//!     ReportKind::PricingSheet,
//!     Path::new("templates/pricing.xltx"),
//!     Path::new("out"),
//!     ComposeOptions::default(),
//! )?;
//! println!("{}", report.path.display());
//! # Ok(())
//! # }
//! ```

// Engine
pub mod composer;
pub mod highlight;
pub mod layout;
pub mod rebalance;
pub mod rewriter;
pub mod rules;

// Data and documents
pub mod cell_ref;
pub mod document;
pub mod formula;
pub mod model;
pub mod sheet_name;
pub mod xml_helpers;

// Surroundings
pub mod config;
pub mod delivery;
pub mod error;
pub mod output;

pub use composer::{ComposeOptions, CompositionSummary, GroupPlacement, ReportComposer};
pub use config::EngineConfig;
pub use delivery::{
    deliver, object_key, Completion, CompletionNotifier, Delivery, DeliveryTarget,
    LocalDirUploader, LogNotifier, Uploader,
};
pub use document::{CellValue, DefinedName, Document, MemoryDocument, XlsxDocument};
pub use error::{ReportError, Result};
pub use highlight::{Alignment, Highlight, HighlightColor};
pub use layout::{layout_for, ReportKind, ReportLayout};
pub use model::{MeasurementGroup, MeasurementRecord, PricingModel, ReportData, TechnicianIndex};
pub use output::{compose_bytes, generate_report, GeneratedReport};
pub use rebalance::{rebalance, TieBreak};
pub use rewriter::{RenameOutcome, SheetRewriter};
pub use rules::{classify, ReplaceRule, RuleSet};
