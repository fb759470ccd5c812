//! Period classification and chronological ordering.
//!
//! Every row is either a period total (its label mentions "total") or a
//! sub-period such as a week. Sub-periods with a recognizable ordinal get
//! ranks 1-4, unknown sub-periods rank 5, and totals rank 6, so sorting by
//! `(year, month, rank)` always lists week 1..4, then unrecognized rows, then
//! the month total.

use std::{cmp::Ordering, fmt, sync::OnceLock};

use regex::Regex;
use serde::Serialize;

pub const UNRECOGNIZED_RANK: u8 = 5;
pub const TOTAL_RANK: u8 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodKind {
    SubPeriod,
    Total,
}

impl fmt::Display for PeriodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodKind::SubPeriod => f.write_str("sub_period"),
            PeriodKind::Total => f.write_str("total"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PeriodClass {
    pub kind: PeriodKind,
    pub rank: u8,
}

impl PeriodClass {
    pub fn is_total(&self) -> bool {
        self.kind == PeriodKind::Total
    }

    pub fn is_subperiod(&self) -> bool {
        self.kind == PeriodKind::SubPeriod
    }
}

struct OrdinalCue {
    pattern: Regex,
    rank: u8,
}

fn ordinal_cues() -> &'static [OrdinalCue] {
    static CUES: OnceLock<Vec<OrdinalCue>> = OnceLock::new();
    CUES.get_or_init(|| {
        const WORDS: [(&str, u8); 4] = [
            (r"1st|1era|1ra|1ero|primera", 1),
            (r"2nd|2da|2do|segunda", 2),
            (r"3rd|3era|3ra|3ero|tercera", 3),
            (r"4th|4ta|4to|cuarta", 4),
        ];
        WORDS
            .iter()
            .map(|(words, rank)| {
                let source = format!(
                    r"(?:\b(?:{words})\b.*\b(?:week|semana)\b)|(?:\b(?:week|semana)\s*#?\s*{rank}\b)"
                );
                OrdinalCue {
                    pattern: Regex::new(&source).expect("ordinal cue pattern is valid"),
                    rank: *rank,
                }
            })
            .collect()
    })
}

/// Classifies a raw period label. Matching is case-insensitive; the label
/// itself is left untouched.
pub fn classify_label(label: &str) -> PeriodClass {
    let lowered = label.trim().to_lowercase();
    if lowered.contains("total") {
        return PeriodClass {
            kind: PeriodKind::Total,
            rank: TOTAL_RANK,
        };
    }
    let rank = ordinal_cues()
        .iter()
        .find(|cue| cue.pattern.is_match(&lowered))
        .map_or(UNRECOGNIZED_RANK, |cue| cue.rank);
    PeriodClass {
        kind: PeriodKind::SubPeriod,
        rank,
    }
}

pub fn is_total(label: &str) -> bool {
    classify_label(label).is_total()
}

pub fn is_subperiod(label: &str) -> bool {
    classify_label(label).is_subperiod()
}

/// Anything that sits on the chronological axis.
pub trait Chronological {
    fn year(&self) -> i32;
    fn month(&self) -> i32;
    fn period_rank(&self) -> u8;

    fn chronological_cmp(&self, other: &Self) -> Ordering {
        (self.year(), self.month(), self.period_rank()).cmp(&(
            other.year(),
            other.month(),
            other.period_rank(),
        ))
    }
}

/// Stable sort by `(year, month, period_rank)`; ties keep input order.
pub fn sort_chronologically<T: Chronological>(items: &mut [T]) {
    items.sort_by(|a, b| a.chronological_cmp(b));
}
