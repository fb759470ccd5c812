//! Pipeline configuration.
//!
//! Every policy the usage sheets disagree on is an explicit, named setting
//! here rather than an accidental default. Configurations load from YAML;
//! omitted keys take the defaults below.

use std::{fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result, ensure};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::columns::{RoleRule, default_rules};

pub const DEFAULT_MIN_YEAR: i32 = 2000;
pub const DEFAULT_MAX_YEAR: i32 = 2100;

/// What happens to a metric cell that could not be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "kebab-case")]
pub enum MissingMetricPolicy {
    /// The substitute `0.0` takes part in aggregation.
    #[default]
    Zero,
    /// Degraded metrics are left out of every reduction.
    Exclude,
}

/// Totals-only behaviour for a (company, year, month) without a total row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "kebab-case")]
pub enum MissingTotalPolicy {
    #[default]
    Omit,
    /// Use the highest-ranked sub-period row as a synthetic total.
    LastSubPeriod,
}

/// Extra divisor for companies whose sheets encode the metric at a
/// different scale than the threshold rule detects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleOverride {
    pub company: String,
    pub divisor: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub roles: Vec<RoleRule>,
    pub min_year: i32,
    pub max_year: i32,
    pub missing_metric: MissingMetricPolicy,
    pub missing_total: MissingTotalPolicy,
    pub scale_overrides: Vec<ScaleOverride>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            roles: default_rules(),
            min_year: DEFAULT_MIN_YEAR,
            max_year: DEFAULT_MAX_YEAR,
            missing_metric: MissingMetricPolicy::default(),
            missing_total: MissingTotalPolicy::default(),
            scale_overrides: Vec::new(),
        }
    }
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening config file {path:?}"))?;
        let config: PipelineConfig = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing config YAML {path:?}"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        let file = File::create(path).with_context(|| format!("Creating config file {path:?}"))?;
        serde_yaml::to_writer(file, self).context("Writing config YAML")
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: PipelineConfig = serde_yaml::from_str(yaml).context("Parsing config YAML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Serializing config to YAML")
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.min_year <= self.max_year,
            "min_year ({}) cannot exceed max_year ({})",
            self.min_year,
            self.max_year
        );
        for entry in &self.scale_overrides {
            ensure!(
                entry.divisor.is_finite() && entry.divisor > 0.0,
                "Scale override for '{}' must use a positive divisor",
                entry.company
            );
        }
        Ok(())
    }

    pub fn year_in_range(&self, year: i32) -> bool {
        year != 0 && (self.min_year..=self.max_year).contains(&year)
    }

    /// Divisor registered for `company`, compared after trimming.
    pub fn scale_divisor(&self, company: &str) -> Option<f64> {
        let company = company.trim();
        self.scale_overrides
            .iter()
            .find(|entry| entry.company.trim() == company)
            .map(|entry| entry.divisor)
    }
}
