use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::{
    aggregate::{Aggregation, Mode},
    config::{MissingMetricPolicy, MissingTotalPolicy},
};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Normalize spreadsheet usage exports into ordered company/month/week series",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show which source column was bound to each role and why
    Bind(BindArgs),
    /// Preview normalized rows in chronological order with per-cell issues
    Normalize(NormalizeArgs),
    /// Aggregate a selection into an ordered time series
    Series(SeriesArgs),
    /// Write the default pipeline configuration as YAML
    InitConfig(InitConfigArgs),
}

/// Options shared by every command that reads an export.
#[derive(Debug, Args)]
pub struct SourceArgs {
    /// Input CSV/TSV export; repeat to concatenate several sheets ('-' reads stdin)
    #[arg(short = 'i', long = "input", required = true, action = clap::ArgAction::Append)]
    pub inputs: Vec<PathBuf>,
    /// YAML pipeline configuration (role keywords, year bounds, policies)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input files (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct BindArgs {
    #[command(flatten)]
    pub source: SourceArgs,
}

#[derive(Debug, Args)]
pub struct NormalizeArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Number of rows to display
    #[arg(long, default_value_t = 20)]
    pub rows: usize,
    /// Only list rows that had at least one degraded cell
    #[arg(long = "issues-only")]
    pub issues_only: bool,
    /// Print the diagnostics counters after the rows
    #[arg(long)]
    pub diagnostics: bool,
}

#[derive(Debug, Args)]
pub struct SeriesArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Company to chart; repeat for several series ('ALL' averages every known company)
    #[arg(long = "company", default_value = "ALL", action = clap::ArgAction::Append)]
    pub companies: Vec<String>,
    /// Restrict to these years (comma separated or repeated); empty means any
    #[arg(long = "year", value_delimiter = ',')]
    pub years: Vec<i32>,
    /// Restrict to these months 1-12 (comma separated or repeated); empty means any
    #[arg(long = "month", value_delimiter = ',')]
    pub months: Vec<i32>,
    /// Which period rows contribute
    #[arg(long, value_enum, default_value_t = Mode::Totals)]
    pub mode: Mode,
    /// How rows within a bucket are combined
    #[arg(long, value_enum, default_value_t = Aggregation::Mean)]
    pub aggregation: Aggregation,
    /// Override the configured handling of unparseable metrics
    #[arg(long = "missing-metric", value_enum)]
    pub missing_metric: Option<MissingMetricPolicy>,
    /// Override the configured handling of months without a total row
    #[arg(long = "missing-total", value_enum)]
    pub missing_total: Option<MissingTotalPolicy>,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
    /// Output file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Include the diagnostics counters in the output
    #[arg(long)]
    pub diagnostics: bool,
}

#[derive(Debug, Args)]
pub struct InitConfigArgs {
    /// Destination YAML file
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,
    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
#[value(rename_all = "kebab-case")]
pub enum OutputFormat {
    #[default]
    Table,
    Csv,
    Json,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
