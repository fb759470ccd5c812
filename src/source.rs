//! Loading configuration and input tables for the CLI commands.

use std::{path::Path, sync::Arc};

use anyhow::{Context, Result};
use itertools::Itertools;
use log::info;

use crate::{
    cache::SourceCache,
    cli::SourceArgs,
    config::PipelineConfig,
    io_utils,
    pipeline::{Pipeline, Prepared},
    printable_delimiter,
    raw::RawTable,
};

pub fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => {
            PipelineConfig::load(path).with_context(|| format!("Loading configuration {path:?}"))
        }
        None => Ok(PipelineConfig::default()),
    }
}

fn cache_key(args: &SourceArgs, encoding: &str) -> String {
    format!(
        "{}|{}|{}",
        args.inputs.iter().map(|p| p.display()).join(";"),
        args.delimiter.map(printable_delimiter).unwrap_or_default(),
        encoding
    )
}

/// Reads every input and concatenates them into one table, reusing a cached
/// copy when the same inputs were loaded recently.
pub fn load_table(args: &SourceArgs, cache: &SourceCache<RawTable>) -> Result<Arc<RawTable>> {
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let key = cache_key(args, encoding.name());
    cache.get_or_load(&key, || {
        let mut tables = Vec::with_capacity(args.inputs.len());
        for path in &args.inputs {
            let table = io_utils::read_raw_table_from_path(path, args.delimiter, encoding)?;
            info!(
                "Read {} row(s) and {} column(s) from {:?}",
                table.len(),
                table.columns().len(),
                path
            );
            tables.push(table);
        }
        Ok(RawTable::concat(tables))
    })
}

/// Binds and normalizes the table, turning layout problems into a CLI error.
pub fn prepare(pipeline: &Pipeline, table: &RawTable, args: &SourceArgs) -> Result<Prepared> {
    pipeline.prepare(table).with_context(|| {
        format!(
            "cannot interpret source layout of {}",
            args.inputs.iter().map(|p| format!("{p:?}")).join(", ")
        )
    })
}
