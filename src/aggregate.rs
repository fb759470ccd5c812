//! Period aggregation.
//!
//! Reduces classified [`NormalizedRecord`]s to one [`AggregatedPoint`] per
//! time bucket for a [`Selection`]. Totals mode buckets by `(year, month)`,
//! detail mode by `(year, month, period)`. Points come back sorted by
//! `(year, month, period_rank)` so they can be plotted as-is.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use chrono::NaiveDate;
use clap::ValueEnum;
use itertools::Itertools;
use log::debug;
use serde::{Serialize, Serializer};

use crate::{
    classify::{Chronological, PeriodKind, TOTAL_RANK},
    columns::Role,
    config::{MissingMetricPolicy, MissingTotalPolicy, PipelineConfig},
    normalize::NormalizedRecord,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CompanySelection {
    All,
    Company(String),
}

impl CompanySelection {
    /// `ALL` (any case) or `*` select every company; anything else names one.
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.eq_ignore_ascii_case("all") || trimmed == "*" {
            CompanySelection::All
        } else {
            CompanySelection::Company(trimmed.to_string())
        }
    }

    pub fn matches(&self, record: &NormalizedRecord) -> bool {
        match self {
            CompanySelection::All => record.has_known_company(),
            CompanySelection::Company(name) => record.company == *name,
        }
    }
}

impl fmt::Display for CompanySelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompanySelection::All => f.write_str("ALL"),
            CompanySelection::Company(name) => f.write_str(name),
        }
    }
}

impl Serialize for CompanySelection {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "kebab-case")]
pub enum Mode {
    /// Month-total rows only, one point per month
    #[default]
    Totals,
    /// Sub-period (weekly) rows only
    Detail,
    /// Sub-period and total rows together
    Everything,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "kebab-case")]
pub enum Aggregation {
    /// Unweighted mean of per-row fractions
    #[default]
    Mean,
    /// sum(numerator) / sum(denominator)
    Weighted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub company: CompanySelection,
    /// Empty means every year.
    pub years: BTreeSet<i32>,
    /// Empty means every month.
    pub months: BTreeSet<i32>,
    pub mode: Mode,
    pub aggregation: Aggregation,
}

impl Selection {
    pub fn new(company: CompanySelection) -> Self {
        Self {
            company,
            years: BTreeSet::new(),
            months: BTreeSet::new(),
            mode: Mode::default(),
            aggregation: Aggregation::default(),
        }
    }

    pub fn with_years<I: IntoIterator<Item = i32>>(mut self, years: I) -> Self {
        self.years = years.into_iter().collect();
        self
    }

    pub fn with_months<I: IntoIterator<Item = i32>>(mut self, months: I) -> Self {
        self.months = months.into_iter().collect();
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_aggregation(mut self, aggregation: Aggregation) -> Self {
        self.aggregation = aggregation;
        self
    }

    fn admits(&self, record: &NormalizedRecord) -> bool {
        self.company.matches(record)
            && (self.years.is_empty() || self.years.contains(&record.year))
            && (self.months.is_empty() || self.months.contains(&record.month))
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let list = |set: &BTreeSet<i32>| {
            if set.is_empty() {
                "any".to_string()
            } else {
                set.iter().join(",")
            }
        };
        write!(
            f,
            "company={} years={} months={} mode={:?} aggregation={:?}",
            self.company,
            list(&self.years),
            list(&self.months),
            self.mode,
            self.aggregation
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedPoint {
    pub company: CompanySelection,
    pub year: i32,
    pub month: i32,
    pub period_start: Option<NaiveDate>,
    pub period_label: String,
    pub period_rank: u8,
    pub kind: PeriodKind,
    /// Built from a fallback sub-period row instead of a real total.
    pub synthetic: bool,
    pub value: f64,
    pub count: usize,
}

impl Chronological for AggregatedPoint {
    fn year(&self) -> i32 {
        self.year
    }

    fn month(&self) -> i32 {
        self.month
    }

    fn period_rank(&self) -> u8 {
        self.period_rank
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AggregationStats {
    /// Months that only had sub-period rows and were given a synthetic total.
    pub synthesized_totals: usize,
    /// Rows skipped by weighted aggregation for lack of a usable weight.
    pub missing_weight: usize,
    /// Rows skipped because their metric was degraded and the policy excludes them.
    pub excluded_degraded_metric: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateOutcome {
    pub points: Vec<AggregatedPoint>,
    pub stats: AggregationStats,
}

/// Records are eligible when their year and month are plausible.
pub fn is_valid_record(record: &NormalizedRecord, config: &PipelineConfig) -> bool {
    config.year_in_range(record.year) && record.month_in_range()
}

/// Picks the rows a totals-only view reduces, honoring the missing-total
/// policy per (company, year, month). Under [`MissingMetricPolicy::Exclude`]
/// the fallback never picks a sub-period whose metric is degraded.
fn select_totals<'a>(
    candidates: &[&'a NormalizedRecord],
    policy: MissingTotalPolicy,
    metric_policy: MissingMetricPolicy,
    stats: &mut AggregationStats,
) -> Vec<(&'a NormalizedRecord, bool)> {
    let mut by_month: BTreeMap<(&str, i32, i32), Vec<&'a NormalizedRecord>> = BTreeMap::new();
    for &record in candidates {
        by_month
            .entry((record.company.as_str(), record.year, record.month))
            .or_default()
            .push(record);
    }

    let mut selected = Vec::new();
    for (key, group) in by_month {
        let totals: Vec<_> = group.iter().filter(|r| r.is_total()).collect();
        if !totals.is_empty() {
            selected.extend(totals.into_iter().map(|r| (*r, false)));
            continue;
        }
        match policy {
            MissingTotalPolicy::Omit => {
                debug!("No total row for {key:?}; omitted");
            }
            MissingTotalPolicy::LastSubPeriod => {
                if let Some(last) = group
                    .iter()
                    .filter(|r| r.is_subperiod())
                    .filter(|r| {
                        metric_policy == MissingMetricPolicy::Zero || !r.metric_degraded()
                    })
                    .max_by_key(|r| r.period.rank)
                {
                    debug!(
                        "No total row for {key:?}; using '{}' (row {})",
                        last.period_label, last.row
                    );
                    stats.synthesized_totals += 1;
                    selected.push((*last, true));
                }
            }
        }
    }
    selected
}

#[derive(Debug)]
struct Bucket {
    label: String,
    kind: PeriodKind,
    synthetic: bool,
    count: usize,
    sum: f64,
    numerator: f64,
    denominator: f64,
}

impl Bucket {
    fn new(label: &str, kind: PeriodKind) -> Self {
        Self {
            label: label.to_string(),
            kind,
            synthetic: false,
            count: 0,
            sum: 0.0,
            numerator: 0.0,
            denominator: 0.0,
        }
    }

    fn value(&self, aggregation: Aggregation) -> Option<f64> {
        if self.count == 0 {
            return None;
        }
        match aggregation {
            Aggregation::Mean => Some(self.sum / self.count as f64),
            Aggregation::Weighted if self.denominator > 0.0 => {
                Some(self.numerator / self.denominator)
            }
            Aggregation::Weighted => None,
        }
    }
}

/// Weight pair for one record, or `None` when it cannot take part.
fn weights(record: &NormalizedRecord, policy: MissingMetricPolicy) -> Option<(f64, f64)> {
    let denominator = record.denominator.filter(|d| *d > 0.0)?;
    let numerator = match record.numerator {
        Some(n) => n,
        None if record.has_issue(Role::Numerator) => return None,
        None if record.metric_degraded() && policy == MissingMetricPolicy::Exclude => {
            return None;
        }
        None => record.metric * denominator,
    };
    Some((numerator, denominator))
}

pub fn aggregate(
    records: &[NormalizedRecord],
    selection: &Selection,
    config: &PipelineConfig,
) -> AggregateOutcome {
    let mut stats = AggregationStats::default();
    let candidates: Vec<&NormalizedRecord> = records
        .iter()
        .filter(|r| is_valid_record(r, config) && selection.admits(r))
        .collect();

    let contributing: Vec<(&NormalizedRecord, bool)> = match selection.mode {
        Mode::Totals => select_totals(
            &candidates,
            config.missing_total,
            config.missing_metric,
            &mut stats,
        ),
        Mode::Detail => candidates
            .iter()
            .filter(|r| r.is_subperiod())
            .map(|r| (*r, false))
            .collect(),
        Mode::Everything => candidates.iter().map(|r| (*r, false)).collect(),
    };

    let mut buckets: BTreeMap<(i32, i32, u8, String), Bucket> = BTreeMap::new();
    for (record, synthetic) in contributing {
        // Every total of a month shares one bucket whatever its label says.
        let (rank, label_key, kind) = match selection.mode {
            Mode::Totals => (TOTAL_RANK, String::new(), PeriodKind::Total),
            Mode::Detail | Mode::Everything if record.is_total() => {
                (TOTAL_RANK, String::new(), PeriodKind::Total)
            }
            Mode::Detail | Mode::Everything => (
                record.period.rank,
                record.period_label.to_lowercase(),
                record.period.kind,
            ),
        };
        let bucket = buckets
            .entry((record.year, record.month, rank, label_key))
            .or_insert_with(|| Bucket::new(&record.period_label, kind));

        match selection.aggregation {
            Aggregation::Mean => {
                if record.metric_degraded() && config.missing_metric == MissingMetricPolicy::Exclude
                {
                    stats.excluded_degraded_metric += 1;
                    continue;
                }
                bucket.sum += record.metric;
            }
            Aggregation::Weighted => match weights(record, config.missing_metric) {
                Some((numerator, denominator)) => {
                    bucket.numerator += numerator;
                    bucket.denominator += denominator;
                }
                None => {
                    stats.missing_weight += 1;
                    continue;
                }
            },
        }
        bucket.count += 1;
        bucket.synthetic |= synthetic;
    }

    let points = buckets
        .into_iter()
        .filter_map(|((year, month, rank, _), bucket)| {
            let value = bucket.value(selection.aggregation)?;
            Some(AggregatedPoint {
                company: selection.company.clone(),
                year,
                month,
                period_start: u32::try_from(month)
                    .ok()
                    .and_then(|m| NaiveDate::from_ymd_opt(year, m, 1)),
                period_label: bucket.label,
                period_rank: rank,
                kind: bucket.kind,
                synthetic: bucket.synthetic,
                value,
                count: bucket.count,
            })
        })
        .collect();

    AggregateOutcome { points, stats }
}
