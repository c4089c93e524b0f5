//! Writing finished reports to disk and handing them to storage.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::float_cmp,
    clippy::panic
)]

mod fixtures;

use std::cell::Cell;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use fixtures::{project, TemplateBuilder};
use pretty_assertions::assert_eq;
use survey_report::layout::PRICING_INCH_FOOT;
use survey_report::{
    deliver, generate_report, ComposeOptions, DeliveryTarget, Document, LocalDirUploader,
    LogNotifier, ReportError, ReportKind, Result, Uploader, XlsxDocument,
};
use uuid::Uuid;

fn options() -> ComposeOptions {
    ComposeOptions {
        today: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        ..Default::default()
    }
}

fn streets() -> serde_json::Value {
    serde_json::json!([
        { "name": "Main St", "data": [{ "object_id": 1, "hazard_size": "Small" }] }
    ])
}

fn write_template(dir: &Path, bytes: Vec<u8>) -> PathBuf {
    let path = dir.join("pricing.xltx");
    std::fs::write(&path, bytes).unwrap();
    path
}

fn entries(dir: &Path) -> Vec<PathBuf> {
    if !dir.exists() {
        return Vec::new();
    }
    let mut found: Vec<PathBuf> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    found.sort();
    found
}

/// Counts uploads and refuses them all.
#[derive(Default)]
struct RefusingUploader {
    calls: Cell<usize>,
}

impl Uploader for RefusingUploader {
    fn upload(&self, _path: &Path, _bucket: &str, _key: &str) -> Result<()> {
        self.calls.set(self.calls.get() + 1);
        Err(ReportError::Upload("bucket is read-only".into()))
    }
}

#[test]
fn generated_report_is_persisted_under_a_fresh_name() {
    let dir = tempfile::tempdir().unwrap();
    let template = write_template(
        dir.path(),
        TemplateBuilder::for_layout(&PRICING_INCH_FOOT).build(),
    );
    let out = dir.path().join("out");

    let data = project("Inch Foot", streets());
    let report =
        generate_report(&data, ReportKind::PricingSheet, &template, &out, options()).unwrap();

    assert_eq!(report.extension, "xlsx");
    assert_eq!(report.path.extension().unwrap(), "xlsx");
    let stem = report.path.file_stem().unwrap().to_str().unwrap();
    assert!(Uuid::parse_str(stem).is_ok(), "{stem}");
    assert_eq!(entries(&out), vec![report.path.clone()]);
    assert_eq!(
        std::fs::metadata(&report.path).unwrap().len(),
        u64::try_from(report.size).unwrap()
    );

    let doc = XlsxDocument::open(&report.path).unwrap();
    assert!(doc.has_sheet("Main St"));
    assert_eq!(report.summary.groups[0].sheet, "Main St");

    // a second run never overwrites the first
    let again =
        generate_report(&data, ReportKind::PricingSheet, &template, &out, options()).unwrap();
    assert_ne!(again.path, report.path);
    assert_eq!(entries(&out).len(), 2);
}

#[test]
fn failed_generation_leaves_nothing_behind() {
    let dir = tempfile::tempdir().unwrap();
    let template = write_template(
        dir.path(),
        TemplateBuilder::new().sheet("SUMMARY").sheet("1").build(),
    );
    let out = dir.path().join("out");

    let data = project("Inch Foot", streets());
    let err =
        generate_report(&data, ReportKind::PricingSheet, &template, &out, options()).unwrap_err();
    assert!(err.is_template_error(), "{err}");
    assert!(entries(&out).is_empty());

    let missing = dir.path().join("missing.xltx");
    let err =
        generate_report(&data, ReportKind::PricingSheet, &missing, &out, options()).unwrap_err();
    assert!(matches!(err, ReportError::Template(_)));
}

#[test]
fn delivery_stores_the_report_and_notifies() {
    let dir = tempfile::tempdir().unwrap();
    let template = write_template(
        dir.path(),
        TemplateBuilder::for_layout(&PRICING_INCH_FOOT).build(),
    );
    let out = dir.path().join("out");
    let store = dir.path().join("store");

    let data = project("Inch Foot", streets());
    let request_id = Uuid::new_v4();
    let target = DeliveryTarget {
        request_id,
        project_id: data.id,
        bucket: "reports".into(),
    };
    let notifier = LogNotifier::new();
    let delivery = deliver(
        &data,
        ReportKind::PricingSheet,
        &template,
        &out,
        options(),
        &target,
        &LocalDirUploader::new(&store),
        &notifier,
    )
    .unwrap();

    assert_eq!(
        delivery.key,
        format!("pricing_sheets/{request_id}/Elm Street Sidewalks - Pricing Sheet.xlsx")
    );
    let stored = store
        .join("reports")
        .join("pricing_sheets")
        .join(request_id.to_string())
        .join("Elm Street Sidewalks - Pricing Sheet.xlsx");
    assert!(stored.is_file());
    assert!(XlsxDocument::open(&stored).unwrap().has_sheet("Main St"));
    // the local copy moved to the store
    assert!(entries(&out).is_empty());

    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].request_id, request_id);
    assert_eq!(sent[0].project_id, 311);
    assert_eq!(sent[0].bucket, "reports");
    assert_eq!(sent[0].key, delivery.key);
}

#[test]
fn nothing_is_uploaded_or_announced_after_a_failure() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    let data = project("Inch Foot", streets());
    let target = DeliveryTarget {
        request_id: Uuid::nil(),
        project_id: data.id,
        bucket: "reports".into(),
    };

    // generation fails: no upload
    let broken = write_template(dir.path(), TemplateBuilder::new().sheet("SUMMARY").build());
    let uploader = RefusingUploader::default();
    let notifier = LogNotifier::new();
    let err = deliver(
        &data,
        ReportKind::PricingSheet,
        &broken,
        &out,
        options(),
        &target,
        &uploader,
        &notifier,
    )
    .unwrap_err();
    assert!(err.is_template_error());
    assert_eq!(uploader.calls.get(), 0);
    assert!(notifier.sent().is_empty());

    // upload fails: no notification
    let template = write_template(
        dir.path(),
        TemplateBuilder::for_layout(&PRICING_INCH_FOOT).build(),
    );
    let err = deliver(
        &data,
        ReportKind::PricingSheet,
        &template,
        &out,
        options(),
        &target,
        &uploader,
        &notifier,
    )
    .unwrap_err();
    assert!(matches!(err, ReportError::Upload(_)));
    assert_eq!(uploader.calls.get(), 1);
    assert!(notifier.sent().is_empty());
}
