//! Handing a finished report to storage and reporting completion.
//!
//! Storage and the completion callback are collaborators behind traits; the
//! implementations here keep everything on the local machine.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::composer::ComposeOptions;
use crate::error::{ReportError, Result};
use crate::layout::ReportKind;
use crate::model::ReportData;
use crate::output::{generate_report, GeneratedReport};

/// Puts a local file at `bucket`/`key`. The local file is the uploader's to
/// remove once stored.
pub trait Uploader {
    fn upload(&self, path: &Path, bucket: &str, key: &str) -> Result<()>;
}

/// Tells the requesting service where the finished report is.
pub trait CompletionNotifier {
    fn notify(&self, completion: &Completion) -> Result<()>;
}

/// Body of a completion callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Completion {
    pub request_id: Uuid,
    #[serde(skip)]
    pub project_id: i64,
    #[serde(rename = "s3_bucket")]
    pub bucket: String,
    #[serde(rename = "s3_key")]
    pub key: String,
}

/// Storage key of a report: `pricing_sheets/<request>/<project> - Pricing Sheet.xlsx`.
pub fn object_key(kind: ReportKind, request_id: Uuid, project_name: &str, extension: &str) -> String {
    let prefix = match kind {
        ReportKind::PricingSheet => "pricing_sheets",
        ReportKind::ProjectSummary => "project_summaries",
    };
    let project = project_name.trim().replace(['/', '\\'], "-");
    format!("{prefix}/{request_id}/{project} - {}.{extension}", kind.title())
}

/// "Bucket" rooted in a local directory.
#[derive(Debug, Clone)]
pub struct LocalDirUploader {
    root: PathBuf,
}

impl LocalDirUploader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn destination(&self, bucket: &str, key: &str) -> PathBuf {
        key.split('/')
            .filter(|part| !part.is_empty() && *part != "." && *part != "..")
            .fold(self.root.join(bucket), |path, part| path.join(part))
    }
}

impl Uploader for LocalDirUploader {
    fn upload(&self, path: &Path, bucket: &str, key: &str) -> Result<()> {
        let destination = self.destination(bucket, key);
        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ReportError::Upload(format!("{}: {e}", parent.display())))?;
        }
        // rename fails across filesystems
        if std::fs::rename(path, &destination).is_err() {
            std::fs::copy(path, &destination)
                .map_err(|e| ReportError::Upload(format!("{}: {e}", destination.display())))?;
            if let Err(e) = std::fs::remove_file(path) {
                warn!(path = %path.display(), error = %e, "could not remove uploaded file");
            }
        }
        info!(bucket, key, "report stored");
        Ok(())
    }
}

/// Logs completions and keeps them for inspection.
#[derive(Debug, Default)]
pub struct LogNotifier {
    sent: Mutex<Vec<Completion>>,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Completions recorded so far.
    pub fn sent(&self) -> Vec<Completion> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

impl CompletionNotifier for LogNotifier {
    fn notify(&self, completion: &Completion) -> Result<()> {
        let body = serde_json::to_string(completion)?;
        info!(project_id = completion.project_id, body = %body, "report complete");
        self.sent
            .lock()
            .map_err(|_| ReportError::Notify("completion log is poisoned".into()))?
            .push(completion.clone());
        Ok(())
    }
}

/// Identifies one delivery.
#[derive(Debug, Clone)]
pub struct DeliveryTarget {
    pub request_id: Uuid,
    pub project_id: i64,
    pub bucket: String,
}

/// Outcome of a successful delivery.
#[derive(Debug, Clone, Serialize)]
pub struct Delivery {
    pub key: String,
    pub report: GeneratedReport,
}

/// Generate, upload, then notify. Nothing is uploaded unless generation
/// succeeded, and nobody is notified unless the upload did.
#[allow(clippy::too_many_arguments)]
pub fn deliver(
    data: &ReportData,
    kind: ReportKind,
    template: &Path,
    output_dir: &Path,
    options: ComposeOptions,
    target: &DeliveryTarget,
    uploader: &dyn Uploader,
    notifier: &dyn CompletionNotifier,
) -> Result<Delivery> {
    let report = generate_report(data, kind, template, output_dir, options)?;
    let key = object_key(kind, target.request_id, &data.name, &report.extension);

    uploader.upload(&report.path, &target.bucket, &key)?;
    notifier.notify(&Completion {
        request_id: target.request_id,
        project_id: target.project_id,
        bucket: target.bucket.clone(),
        key: key.clone(),
    })?;
    Ok(Delivery { key, report })
}
