//! End-to-end pipeline: resolve, normalize, classify, aggregate.
//!
//! A [`Pipeline`] holds only configuration. Each [`Pipeline::run`] starts
//! from the raw table and produces a fresh [`PipelineReport`], so running the
//! same table and selection twice yields identical output.

use std::fmt;

use log::{debug, warn};
use serde::Serialize;

use crate::{
    aggregate::{AggregatedPoint, Aggregation, AggregationStats, Selection, aggregate},
    classify::sort_chronologically,
    columns::{ColumnBinding, Role, resolve_binding},
    config::PipelineConfig,
    error::StructuralError,
    normalize::{NormalizedRecord, normalize_table},
    raw::RawTable,
};

/// Counters that make silent degradation visible.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostics {
    pub binding: ColumnBinding,
    pub total_rows: usize,
    /// Year missing, unparseable, or outside the configured bounds.
    pub excluded_invalid_year: usize,
    /// Plausible year but month outside 1..=12.
    pub excluded_invalid_month: usize,
    pub unparseable_metric: usize,
    pub unparseable_year: usize,
    pub unparseable_month: usize,
    pub unknown_company: usize,
    /// Metrics still outside [0, 1] after scaling.
    pub metric_out_of_range: usize,
    pub aggregation: AggregationStats,
}

impl Diagnostics {
    fn collect(
        binding: &ColumnBinding,
        records: &[NormalizedRecord],
        config: &PipelineConfig,
    ) -> Self {
        let mut diagnostics = Diagnostics {
            binding: binding.clone(),
            total_rows: records.len(),
            excluded_invalid_year: 0,
            excluded_invalid_month: 0,
            unparseable_metric: 0,
            unparseable_year: 0,
            unparseable_month: 0,
            unknown_company: 0,
            metric_out_of_range: 0,
            aggregation: AggregationStats::default(),
        };
        for record in records {
            if !config.year_in_range(record.year) {
                diagnostics.excluded_invalid_year += 1;
            } else if !record.month_in_range() {
                diagnostics.excluded_invalid_month += 1;
            }
            if record.metric_degraded() {
                diagnostics.unparseable_metric += 1;
            } else if !(0.0..=1.0).contains(&record.metric) {
                diagnostics.metric_out_of_range += 1;
            }
            if record.has_issue(Role::Year) {
                diagnostics.unparseable_year += 1;
            }
            if record.has_issue(Role::Month) {
                diagnostics.unparseable_month += 1;
            }
            if !record.has_known_company() {
                diagnostics.unknown_company += 1;
            }
        }
        diagnostics
    }

    /// `(counter, value)` pairs for the audit table.
    pub fn counters(&self) -> Vec<(&'static str, usize)> {
        vec![
            ("rows", self.total_rows),
            ("excluded_invalid_year", self.excluded_invalid_year),
            ("excluded_invalid_month", self.excluded_invalid_month),
            ("unparseable_metric", self.unparseable_metric),
            ("unparseable_year", self.unparseable_year),
            ("unparseable_month", self.unparseable_month),
            ("unknown_company", self.unknown_company),
            ("metric_out_of_range", self.metric_out_of_range),
            ("synthesized_totals", self.aggregation.synthesized_totals),
            ("missing_weight", self.aggregation.missing_weight),
            (
                "excluded_degraded_metric",
                self.aggregation.excluded_degraded_metric,
            ),
        ]
    }
}

/// A selection that matched nothing. Not an error: the source was readable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmptyResultWarning {
    pub selection: Selection,
}

impl fmt::Display for EmptyResultWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no data for selection {}", self.selection)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineReport {
    pub selection: Selection,
    pub points: Vec<AggregatedPoint>,
    pub diagnostics: Diagnostics,
    pub warning: Option<EmptyResultWarning>,
}

impl PipelineReport {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Bound and normalized rows, before any selection is applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Prepared {
    pub binding: ColumnBinding,
    pub records: Vec<NormalizedRecord>,
}

impl Prepared {
    /// Records in `(year, month, period_rank)` order, ties in source order.
    pub fn chronological(&self) -> Vec<NormalizedRecord> {
        let mut records = self.records.clone();
        sort_chronologically(&mut records);
        records
    }
}

#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn bind(&self, table: &RawTable) -> Result<ColumnBinding, StructuralError> {
        let binding = resolve_binding(table.columns(), &self.config.roles)?;
        for column in binding.iter() {
            debug!(
                "Bound {} -> '{}' ({})",
                column.role, column.label, column.resolution
            );
        }
        Ok(binding)
    }

    pub fn prepare(&self, table: &RawTable) -> Result<Prepared, StructuralError> {
        let binding = self.bind(table)?;
        let records = normalize_table(table, &binding, &self.config);
        Ok(Prepared { binding, records })
    }

    pub fn diagnostics(&self, prepared: &Prepared) -> Diagnostics {
        Diagnostics::collect(&prepared.binding, &prepared.records, &self.config)
    }

    pub fn run(
        &self,
        table: &RawTable,
        selection: &Selection,
    ) -> Result<PipelineReport, StructuralError> {
        let prepared = self.prepare(table)?;
        self.run_prepared(&prepared, selection)
    }

    pub fn run_prepared(
        &self,
        prepared: &Prepared,
        selection: &Selection,
    ) -> Result<PipelineReport, StructuralError> {
        if selection.aggregation == Aggregation::Weighted && !prepared.binding.supports_weighting()
        {
            return Err(StructuralError::MissingWeights);
        }
        let mut diagnostics = self.diagnostics(prepared);
        let outcome = aggregate(&prepared.records, selection, &self.config);
        diagnostics.aggregation = outcome.stats;
        debug!(
            "Selection {} produced {} point(s) from {} row(s)",
            selection,
            outcome.points.len(),
            diagnostics.total_rows
        );

        let warning = if outcome.points.is_empty() {
            let warning = EmptyResultWarning {
                selection: selection.clone(),
            };
            warn!("{warning}");
            Some(warning)
        } else {
            None
        };

        Ok(PipelineReport {
            selection: selection.clone(),
            points: outcome.points,
            diagnostics,
            warning,
        })
    }
}
