//! CLI for survey-report - fills report templates from project JSON
//!
//! Usage:
//!   survey_report_cli generate project.json --kind pricing-sheet
//!   survey_report_cli deliver project.json --kind project-summary \
//!       --request-id <uuid> --publish-dir /srv/reports
//!   survey_report_cli inspect template.xlsx

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

use survey_report::{
    deliver, generate_report, layout_for, DefinedName, DeliveryTarget, Document, EngineConfig,
    LocalDirUploader, LogNotifier, ReportData, ReportKind, XlsxDocument,
};

#[derive(Parser)]
#[command(name = "survey_report_cli")]
#[command(author, version, about = "Fill survey report templates", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true, env = "SURVEY_REPORT_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct ReportArgs {
    /// Project data (JSON)
    #[arg(value_name = "FILE")]
    data: PathBuf,

    /// pricing-sheet or project-summary
    #[arg(short, long)]
    kind: ReportKind,

    /// Template file, overriding the configured one
    #[arg(short, long)]
    template: Option<PathBuf>,

    /// Output directory, overriding the configured one
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Report date (YYYY-MM-DD), today when omitted
    #[arg(long)]
    today: Option<NaiveDate>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a filled report and print where it went
    Generate(ReportArgs),

    /// Generate, store under the publish directory and record completion
    Deliver {
        #[command(flatten)]
        report: ReportArgs,

        /// Request the report belongs to
        #[arg(long)]
        request_id: Uuid,

        /// Directory standing in for the object store
        #[arg(long, value_name = "DIR")]
        publish_dir: PathBuf,

        /// Bucket, overriding the configured one
        #[arg(long)]
        bucket: Option<String>,
    },

    /// Print a template's sheets and defined names as JSON
    Inspect {
        /// Template or workbook
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

#[derive(Serialize)]
struct Inspection {
    sheets: Vec<String>,
    defined_names: Vec<DefinedName>,
    macro_enabled: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Commands::Generate(args) => {
            let (data, template, output_dir, options) = prepare(&config, &args)?;
            let report = generate_report(&data, args.kind, &template, &output_dir, options)
                .with_context(|| format!("generating {} for {:?}", args.kind, data.name))?;
            print_json(&report)
        }
        Commands::Deliver {
            report: args,
            request_id,
            publish_dir,
            bucket,
        } => {
            let (data, template, output_dir, options) = prepare(&config, &args)?;
            let target = DeliveryTarget {
                request_id,
                project_id: data.id,
                bucket: bucket.unwrap_or_else(|| config.bucket.clone()),
            };
            let notifier = LogNotifier::new();
            let delivery = deliver(
                &data,
                args.kind,
                &template,
                &output_dir,
                options,
                &target,
                &LocalDirUploader::new(publish_dir),
                &notifier,
            )
            .with_context(|| format!("delivering {} for {:?}", args.kind, data.name))?;
            print_json(&delivery)
        }
        Commands::Inspect { file } => {
            let doc = XlsxDocument::open(&file)
                .with_context(|| format!("opening {}", file.display()))?;
            print_json(&Inspection {
                sheets: doc.sheet_names(),
                defined_names: doc.defined_names(),
                macro_enabled: doc.is_macro_enabled(),
            })
        }
    }
}

fn prepare(
    config: &EngineConfig,
    args: &ReportArgs,
) -> Result<(ReportData, PathBuf, PathBuf, survey_report::ComposeOptions)> {
    let data = read_data(&args.data)?;
    let template = args
        .template
        .clone()
        .unwrap_or_else(|| config.template_path(args.kind, data.pricing_model));
    let output_dir = args.output_dir.clone().unwrap_or_else(|| config.output_dir());
    let today = args
        .today
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    tracing::debug!(
        template = %template.display(),
        layout = layout_for(args.kind, data.pricing_model).template,
        "resolved template"
    );
    Ok((data, template, output_dir, config.compose_options(today)))
}

fn read_data(path: &Path) -> Result<ReportData> {
    let json =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    ReportData::from_json(&json).with_context(|| format!("parsing {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(json.as_bytes())?;
    writeln!(stdout)?;
    Ok(())
}
