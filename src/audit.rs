//! Inspection commands: how columns were bound and what each row became.

use anyhow::Result;
use itertools::Itertools;
use log::info;

use crate::{
    cache::SourceCache,
    cli::{BindArgs, NormalizeArgs},
    columns::Resolution,
    normalize::NormalizedRecord,
    pipeline::Pipeline,
    series::{diagnostics_rows, format_value},
    source, table,
};

pub fn execute_bind(args: &BindArgs) -> Result<()> {
    let config = source::load_config(args.source.config.as_deref())?;
    let pipeline = Pipeline::new(config);
    let raw = source::load_table(&args.source, &SourceCache::default())?;
    let prepared = source::prepare(&pipeline, &raw, &args.source)?;

    let headers = ["role", "column", "index", "resolved by"]
        .map(String::from)
        .to_vec();
    let rows = prepared
        .binding
        .iter()
        .map(|column| {
            let resolved = match &column.resolution {
                Resolution::Keyword { keyword } => format!("keyword '{keyword}'"),
                Resolution::Positional { index } => format!("fallback position {index}"),
            };
            vec![
                column.role.to_string(),
                column.label.clone(),
                column.index.to_string(),
                resolved,
            ]
        })
        .collect::<Vec<_>>();
    table::print_table(&headers, &rows);
    info!(
        "Bound {} role(s) across {} column(s)",
        rows.len(),
        raw.columns().len()
    );
    Ok(())
}

fn optional_value(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn record_row(record: &NormalizedRecord) -> Vec<String> {
    vec![
        (record.row + 1).to_string(),
        record.company.clone(),
        record.year.to_string(),
        record.month.to_string(),
        record.period_label.clone(),
        record.period.rank.to_string(),
        format_value(record.metric),
        optional_value(record.numerator),
        optional_value(record.denominator),
        record.issues.iter().join("; "),
    ]
}

pub fn execute_normalize(args: &NormalizeArgs) -> Result<()> {
    let config = source::load_config(args.source.config.as_deref())?;
    let pipeline = Pipeline::new(config);
    let raw = source::load_table(&args.source, &SourceCache::default())?;
    let prepared = source::prepare(&pipeline, &raw, &args.source)?;

    let headers = [
        "row",
        "company",
        "year",
        "month",
        "period",
        "rank",
        "metric",
        "numerator",
        "denominator",
        "issues",
    ]
    .map(String::from)
    .to_vec();
    let rows = prepared
        .chronological()
        .iter()
        .filter(|record| !args.issues_only || !record.issues.is_empty())
        .take(args.rows)
        .map(record_row)
        .collect::<Vec<_>>();
    table::print_table(&headers, &rows);
    info!(
        "Displayed {} of {} normalized row(s)",
        rows.len(),
        prepared.records.len()
    );

    if args.diagnostics {
        println!();
        table::print_table(
            &["counter".to_string(), "value".to_string()],
            &diagnostics_rows(&pipeline.diagnostics(&prepared)),
        );
    }
    Ok(())
}
