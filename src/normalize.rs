//! Cell normalization.
//!
//! Turns each row of a bound [`RawTable`] into a [`NormalizedRecord`]. No
//! parse failure escapes this module: every attempt yields a [`Parsed`]
//! value that is either clean or degraded to a substitute with a
//! [`DegradeReason`]. Rows are never dropped here; validity is decided by
//! the aggregator.

use std::fmt;

use serde::Serialize;

use crate::{
    classify::{Chronological, PeriodClass, classify_label},
    columns::{ColumnBinding, Role},
    config::PipelineConfig,
    raw::{RawCell, RawTable},
};

pub const UNKNOWN_COMPANY: &str = "(unknown)";

/// Magnitudes above this are whole-number percentages and get divided by 100.
pub const PERCENT_SCALE_THRESHOLD: f64 = 1.1;

const PLACEHOLDER_TOKENS: &[&str] = &["nan", "none", "null"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "value", rename_all = "snake_case")]
pub enum DegradeReason {
    Missing,
    NotNumeric(String),
    NonFinite(String),
    Fractional(String),
    OutOfRange(String),
}

impl fmt::Display for DegradeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DegradeReason::Missing => f.write_str("missing value"),
            DegradeReason::NotNumeric(raw) => write!(f, "'{raw}' is not numeric"),
            DegradeReason::NonFinite(raw) => write!(f, "'{raw}' is not a finite number"),
            DegradeReason::Fractional(raw) => write!(f, "'{raw}' is not a whole number"),
            DegradeReason::OutOfRange(raw) => write!(f, "'{raw}' is out of range"),
        }
    }
}

/// Outcome of one parse attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed<T> {
    Ok(T),
    Degraded(T, DegradeReason),
}

impl<T> Parsed<T> {
    pub fn value(&self) -> &T {
        match self {
            Parsed::Ok(value) | Parsed::Degraded(value, _) => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Parsed::Ok(value) | Parsed::Degraded(value, _) => value,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Parsed::Degraded(..))
    }

    fn into_parts(self) -> (T, Option<DegradeReason>) {
        match self {
            Parsed::Ok(value) => (value, None),
            Parsed::Degraded(value, reason) => (value, Some(reason)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CellIssue {
    pub role: Role,
    pub reason: DegradeReason,
}

impl fmt::Display for CellIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.role, self.reason)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedRecord {
    /// Zero-based position in the source table.
    pub row: usize,
    pub company: String,
    pub year: i32,
    pub month: i32,
    pub period_label: String,
    pub period: PeriodClass,
    pub metric: f64,
    pub numerator: Option<f64>,
    pub denominator: Option<f64>,
    pub issues: Vec<CellIssue>,
}

impl NormalizedRecord {
    pub fn has_known_company(&self) -> bool {
        self.company != UNKNOWN_COMPANY
    }

    pub fn metric_degraded(&self) -> bool {
        self.has_issue(Role::Metric)
    }

    pub fn has_issue(&self, role: Role) -> bool {
        self.issues.iter().any(|issue| issue.role == role)
    }

    pub fn month_in_range(&self) -> bool {
        (1..=12).contains(&self.month)
    }

    pub fn is_total(&self) -> bool {
        self.period.is_total()
    }

    pub fn is_subperiod(&self) -> bool {
        self.period.is_subperiod()
    }
}

impl Chronological for NormalizedRecord {
    fn year(&self) -> i32 {
        self.year
    }

    fn month(&self) -> i32 {
        self.month
    }

    fn period_rank(&self) -> u8 {
        self.period.rank
    }
}

pub fn normalize_company(cell: &RawCell) -> String {
    let text = cell.as_text();
    let trimmed = text.trim();
    if trimmed.is_empty() || PLACEHOLDER_TOKENS.contains(&trimmed.to_lowercase().as_str()) {
        UNKNOWN_COMPANY.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Parses a number as written in the sheets: optional trailing `%`, comma or
/// dot decimal separator.
pub fn parse_number(cell: &RawCell) -> Parsed<Option<f64>> {
    let raw = match cell {
        RawCell::Empty => return Parsed::Degraded(None, DegradeReason::Missing),
        RawCell::Number(n) if n.is_finite() => return Parsed::Ok(Some(*n)),
        RawCell::Number(n) => {
            return Parsed::Degraded(None, DegradeReason::NonFinite(n.to_string()));
        }
        RawCell::Text(text) => text.trim(),
    };
    if raw.is_empty() {
        return Parsed::Degraded(None, DegradeReason::Missing);
    }
    let cleaned = raw.strip_suffix('%').unwrap_or(raw).trim().replace(',', ".");
    match cleaned.parse::<f64>() {
        Ok(n) if n.is_finite() => Parsed::Ok(Some(n)),
        Ok(_) => Parsed::Degraded(None, DegradeReason::NonFinite(raw.to_string())),
        Err(_) => Parsed::Degraded(None, DegradeReason::NotNumeric(raw.to_string())),
    }
}

/// Applies the percentage-scale threshold rule to an already parsed value.
pub fn scale_fraction(value: f64) -> f64 {
    if value > PERCENT_SCALE_THRESHOLD {
        value / 100.0
    } else {
        value
    }
}

/// Parses a metric cell into a fraction, degrading to `0.0`.
pub fn parse_metric(cell: &RawCell) -> Parsed<f64> {
    match parse_number(cell) {
        Parsed::Ok(Some(n)) => Parsed::Ok(scale_fraction(n)),
        Parsed::Ok(None) => Parsed::Degraded(0.0, DegradeReason::Missing),
        Parsed::Degraded(_, reason) => Parsed::Degraded(0.0, reason),
    }
}

/// Parses a whole number, accepting integral floats such as `2026.0`.
pub fn parse_integer(cell: &RawCell) -> Parsed<i32> {
    let raw = cell.as_text();
    let raw = raw.trim();
    if raw.is_empty() {
        return Parsed::Degraded(0, DegradeReason::Missing);
    }
    if let Ok(n) = raw.parse::<i32>() {
        return Parsed::Ok(n);
    }
    match raw.replace(',', ".").parse::<f64>() {
        Ok(n) if !n.is_finite() => Parsed::Degraded(0, DegradeReason::NonFinite(raw.to_string())),
        Ok(n) if n.fract() != 0.0 => {
            Parsed::Degraded(0, DegradeReason::Fractional(raw.to_string()))
        }
        Ok(n) if n.abs() <= f64::from(i32::MAX) => Parsed::Ok(n as i32),
        Ok(_) => Parsed::Degraded(0, DegradeReason::OutOfRange(raw.to_string())),
        Err(_) => Parsed::Degraded(0, DegradeReason::NotNumeric(raw.to_string())),
    }
}

/// Normalizes every row of `table`; the output has one record per input row.
pub fn normalize_table(
    table: &RawTable,
    binding: &ColumnBinding,
    config: &PipelineConfig,
) -> Vec<NormalizedRecord> {
    (0..table.len())
        .map(|row| normalize_row(table, row, binding, config))
        .collect()
}

fn normalize_row(
    table: &RawTable,
    row: usize,
    binding: &ColumnBinding,
    config: &PipelineConfig,
) -> NormalizedRecord {
    let cell = |role: Role| match binding.get(role) {
        Some(bound) => table.cell(row, bound.index),
        None => RawCell::empty(),
    };
    let mut issues = Vec::new();
    let mut track = |role: Role, reason: Option<DegradeReason>| {
        if let Some(reason) = reason {
            issues.push(CellIssue { role, reason });
        }
    };

    let company = normalize_company(cell(Role::Company));
    let period_label = cell(Role::PeriodLabel).as_text().trim().to_string();
    let period = classify_label(&period_label);

    let (year, reason) = parse_integer(cell(Role::Year)).into_parts();
    track(Role::Year, reason);
    let (month, reason) = parse_integer(cell(Role::Month)).into_parts();
    track(Role::Month, reason);

    let (mut metric, reason) = parse_metric(cell(Role::Metric)).into_parts();
    track(Role::Metric, reason);
    if let Some(divisor) = config.scale_divisor(&company) {
        metric /= divisor;
    }

    let mut optional = |role: Role| -> Option<f64> {
        binding.get(role)?;
        let (value, reason) = parse_number(cell(role)).into_parts();
        track(role, reason);
        value
    };
    let numerator = optional(Role::Numerator);
    let denominator = optional(Role::Denominator);

    NormalizedRecord {
        row,
        company,
        year,
        month,
        period_label,
        period,
        metric,
        numerator,
        denominator,
        issues,
    }
}
