pub mod aggregate;
pub mod audit;
pub mod cache;
pub mod classify;
pub mod cli;
pub mod columns;
pub mod config;
pub mod error;
pub mod io_utils;
pub mod normalize;
pub mod pipeline;
pub mod raw;
pub mod series;
pub mod source;
pub mod table;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{LevelFilter, info};

use crate::{
    cli::{Cli, Commands, InitConfigArgs},
    config::PipelineConfig,
};

pub use crate::{
    aggregate::{AggregatedPoint, Aggregation, CompanySelection, Mode, Selection},
    error::StructuralError,
    pipeline::{Diagnostics, Pipeline, PipelineReport},
    raw::{RawCell, RawTable},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("usage_series", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Bind(args) => audit::execute_bind(&args),
        Commands::Normalize(args) => audit::execute_normalize(&args),
        Commands::Series(args) => series::execute(&args),
        Commands::InitConfig(args) => handle_init_config(&args),
    }
}

fn handle_init_config(args: &InitConfigArgs) -> Result<()> {
    if args.output.exists() && !args.force {
        bail!(
            "{:?} already exists; pass --force to overwrite it",
            args.output
        );
    }
    PipelineConfig::default()
        .save(&args.output)
        .with_context(|| format!("Writing configuration to {:?}", args.output))?;
    info!("Default configuration written to {:?}", args.output);
    Ok(())
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
