use std::io::Write;

use anyhow::{Context, Result};
use log::info;

use crate::{
    aggregate::{AggregatedPoint, CompanySelection, Selection},
    cache::SourceCache,
    cli::{OutputFormat, SeriesArgs},
    io_utils,
    pipeline::{Diagnostics, Pipeline, PipelineReport},
    source, table,
};

const HEADERS: [&str; 9] = [
    "company",
    "year",
    "month",
    "period_start",
    "period",
    "kind",
    "value",
    "rows",
    "synthetic",
];

pub fn execute(args: &SeriesArgs) -> Result<()> {
    let mut config = source::load_config(args.source.config.as_deref())?;
    if let Some(policy) = args.missing_metric {
        config.missing_metric = policy;
    }
    if let Some(policy) = args.missing_total {
        config.missing_total = policy;
    }
    let pipeline = Pipeline::new(config);

    // Selections after the first read the inputs back from the cache.
    let cache = SourceCache::default();
    let mut reports = Vec::with_capacity(args.companies.len());
    for company in &args.companies {
        let selection = Selection::new(CompanySelection::parse(company))
            .with_years(args.years.iter().copied())
            .with_months(args.months.iter().copied())
            .with_mode(args.mode)
            .with_aggregation(args.aggregation);
        let raw = source::load_table(&args.source, &cache)?;
        let prepared = source::prepare(&pipeline, &raw, &args.source)?;
        let report = pipeline
            .run_prepared(&prepared, &selection)
            .with_context(|| format!("cannot interpret source layout for selection {selection}"))?;
        info!(
            "Selection {} yielded {} point(s)",
            report.selection,
            report.points.len()
        );
        reports.push(report);
    }

    match args.format {
        OutputFormat::Table => print_tables(&reports, args.diagnostics),
        OutputFormat::Csv => write_csv(&reports, args)?,
        OutputFormat::Json => write_json(&reports, args)?,
    }
    Ok(())
}

pub fn format_value(value: f64) -> String {
    format!("{value:.4}")
}

fn point_row(point: &AggregatedPoint) -> Vec<String> {
    vec![
        point.company.to_string(),
        point.year.to_string(),
        point.month.to_string(),
        point
            .period_start
            .map(|date| date.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        point.period_label.clone(),
        point.kind.to_string(),
        format_value(point.value),
        point.count.to_string(),
        if point.synthetic { "yes" } else { "" }.to_string(),
    ]
}

fn headers() -> Vec<String> {
    HEADERS.iter().map(|h| h.to_string()).collect()
}

pub fn diagnostics_rows(diagnostics: &Diagnostics) -> Vec<Vec<String>> {
    diagnostics
        .counters()
        .into_iter()
        .map(|(name, value)| vec![name.to_string(), value.to_string()])
        .collect()
}

fn print_tables(reports: &[PipelineReport], with_diagnostics: bool) {
    for (idx, report) in reports.iter().enumerate() {
        if idx > 0 {
            println!();
        }
        println!("# {}", report.selection);
        match &report.warning {
            Some(warning) => println!("{warning}"),
            None => {
                let rows: Vec<Vec<String>> = report.points.iter().map(point_row).collect();
                table::print_table(&headers(), &rows);
            }
        }
        if with_diagnostics {
            println!();
            table::print_table(
                &["counter".to_string(), "value".to_string()],
                &diagnostics_rows(&report.diagnostics),
            );
        }
    }
}

fn write_csv(reports: &[PipelineReport], args: &SeriesArgs) -> Result<()> {
    let mut writer = io_utils::open_csv_writer(args.output.as_deref())?;
    writer.write_record(HEADERS)?;
    for report in reports {
        if let Some(warning) = &report.warning {
            eprintln!("{warning}");
        }
        for point in &report.points {
            writer.write_record(point_row(point))?;
        }
    }
    writer.flush().context("Flushing CSV output")?;
    if args.diagnostics {
        eprint!("{}", diagnostics_text(reports));
    }
    Ok(())
}

/// Counters of every report, each block headed by its selection.
fn diagnostics_text(reports: &[PipelineReport]) -> String {
    let mut text = String::new();
    for report in reports {
        text.push_str(&format!("# {}\n", report.selection));
        for (name, value) in report.diagnostics.counters() {
            text.push_str(&format!("{name}: {value}\n"));
        }
    }
    text
}

fn write_json(reports: &[PipelineReport], args: &SeriesArgs) -> Result<()> {
    for report in reports {
        if let Some(warning) = &report.warning {
            eprintln!("{warning}");
        }
    }
    let mut output = io_utils::open_output(args.output.as_deref())?;
    serde_json::to_writer_pretty(&mut output, reports).context("Serializing series as JSON")?;
    writeln!(output)?;
    output.flush().context("Flushing JSON output")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        classify::PeriodKind,
        raw::{RawCell, RawTable},
    };
    use chrono::NaiveDate;

    #[test]
    fn point_rows_render_every_column() {
        let point = AggregatedPoint {
            company: CompanySelection::parse("Acme"),
            year: 2026,
            month: 1,
            period_start: NaiveDate::from_ymd_opt(2026, 1, 1),
            period_label: "mes total".into(),
            period_rank: 6,
            kind: PeriodKind::Total,
            synthetic: false,
            value: 0.38,
            count: 1,
        };
        assert_eq!(
            point_row(&point),
            ["Acme", "2026", "1", "2026-01-01", "mes total", "total", "0.3800", "1", ""]
        );
        assert_eq!(point_row(&point).len(), HEADERS.len());
    }

    #[test]
    fn diagnostics_text_covers_each_selection() {
        let mut table = RawTable::new(["Empresa", "Semana", "%", "Mes", "Año"]);
        table.push_row(["Acme", "mes total", "38%", "1", "2026"].map(RawCell::from));
        table.push_row(["Globex", "mes total", "n/a", "1", "2026"].map(RawCell::from));
        let pipeline = Pipeline::default();
        let reports: Vec<PipelineReport> = ["Acme", "Globex"]
            .into_iter()
            .map(|company| {
                let selection = Selection::new(CompanySelection::parse(company));
                pipeline.run(&table, &selection).expect("run")
            })
            .collect();

        let text = diagnostics_text(&reports);
        let headers: Vec<&str> = text.lines().filter(|l| l.starts_with("# ")).collect();
        assert_eq!(headers.len(), 2);
        assert!(headers[0].contains("company=Acme"));
        assert!(headers[1].contains("company=Globex"));
        assert_eq!(text.matches("unparseable_metric: 1").count(), 2);
    }
}
