//! Engine configuration, read from TOML.
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration.
//!
//! ```toml
//! template_dir = "templates"
//! output_dir = "/var/tmp/reports"
//! bucket = "precision-safe-sidewalks"
//! tie_break = "lexical"
//! replace_rule = "special-case"
//!
//! [templates]
//! pricing_square_foot = "SQFT Pricing 2024.xlsx"
//! ```

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::composer::ComposeOptions;
use crate::error::Result;
use crate::layout::{layout_for, ReportKind};
use crate::model::PricingModel;
use crate::rebalance::TieBreak;
use crate::rules::{ReplaceRule, RuleSet};

pub const DEFAULT_BUCKET: &str = "precision-safe-sidewalks";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Directory holding the report templates.
    pub template_dir: PathBuf,
    /// Template file names overriding the built-in ones.
    pub templates: TemplateFiles,
    /// Where finished reports are written; the system temp dir when unset.
    pub output_dir: Option<PathBuf>,
    /// Destination bucket for uploads.
    pub bucket: String,
    pub tie_break: TieBreak,
    pub replace_rule: ReplaceRule,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            template_dir: PathBuf::from("templates"),
            templates: TemplateFiles::default(),
            output_dir: None,
            bucket: DEFAULT_BUCKET.to_string(),
            tie_break: TieBreak::default(),
            replace_rule: ReplaceRule::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TemplateFiles {
    pub pricing_inch_foot: Option<String>,
    pub pricing_square_foot: Option<String>,
    pub project_summary_inch_foot: Option<String>,
    pub project_summary_square_foot: Option<String>,
}

impl TemplateFiles {
    fn get(&self, kind: ReportKind, model: PricingModel) -> Option<&str> {
        match (kind, model) {
            (ReportKind::PricingSheet, PricingModel::InchFoot) => self.pricing_inch_foot.as_deref(),
            (ReportKind::PricingSheet, PricingModel::SquareFoot) => {
                self.pricing_square_foot.as_deref()
            }
            (ReportKind::ProjectSummary, PricingModel::InchFoot) => {
                self.project_summary_inch_foot.as_deref()
            }
            (ReportKind::ProjectSummary, PricingModel::SquareFoot) => {
                self.project_summary_square_foot.as_deref()
            }
        }
    }
}

impl EngineConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&text)?;
        debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Template file for a report variant.
    pub fn template_path(&self, kind: ReportKind, model: PricingModel) -> PathBuf {
        let file = self
            .templates
            .get(kind, model)
            .unwrap_or(layout_for(kind, model).template);
        self.template_dir.join(file)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    pub fn compose_options(&self, today: NaiveDate) -> ComposeOptions {
        ComposeOptions {
            tie_break: self.tie_break,
            rules: RuleSet {
                replace_rule: self.replace_rule,
            },
            today,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_file_is_the_default() {
        assert_eq!(EngineConfig::from_toml("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn overrides() {
        let config = EngineConfig::from_toml(
            r#"
            template_dir = "/srv/templates"
            tie_break = "lexical"
            replace_rule = "special-case"

            [templates]
            pricing_square_foot = "custom.xlsx"
            "#,
        )
        .unwrap();
        assert_eq!(config.tie_break, TieBreak::Lexical);
        assert_eq!(config.replace_rule, ReplaceRule::SpecialCase);
        assert_eq!(config.bucket, DEFAULT_BUCKET);
        assert_eq!(
            config.template_path(ReportKind::PricingSheet, PricingModel::SquareFoot),
            PathBuf::from("/srv/templates/custom.xlsx")
        );
        assert_eq!(
            config.template_path(ReportKind::PricingSheet, PricingModel::InchFoot),
            PathBuf::from("/srv/templates/TEMP Pricing Inch Foot - 10-2-2023- FINAL.xltx")
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(EngineConfig::from_toml("tiebreak = \"lexical\"").is_err());
    }
}
