//! On-demand percentages.
//!
//! A row's percentage is `100 * count / total`, where `total` sums the rows of
//! the same [`StatType`] within the chosen scope: one trace, all traces of one
//! API variant, or the whole corpus. Nothing here is stored; listings compute
//! percentages from the counts they're showing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Accumulator, Denominator, StatType};

/// Which traces a corpus-wide percentage is relative to.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    clap::ValueEnum,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum PercentageScope {
    /// Relative to traces captured with the same API variant
    #[default]
    PerApi,
    /// Relative to every trace in the store
    Corpus,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Percentage {
    Value(f64),
    /// The category total is zero, or the category has no percentage rule
    NotApplicable,
}

impl Percentage {
    pub fn of(count: u64, total: u64) -> Self {
        if total == 0 {
            Percentage::NotApplicable
        } else {
            Percentage::Value(count as f64 * 100.0 / total as f64)
        }
    }

    /// Percentage of a row according to its type's denominator rule.
    pub fn for_row(stat_type: &StatType, count: u64, totals: &CategoryTotals) -> Self {
        match stat_type.denominator() {
            Denominator::Unrated => Percentage::NotApplicable,
            Denominator::CategoryTotal => Self::of(count, totals.get(stat_type)),
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Percentage::Value(v) => Some(*v),
            Percentage::NotApplicable => None,
        }
    }
}

impl std::fmt::Display for Percentage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Percentage::Value(v) => write!(f, "{}%", format_percentage(*v)),
            Percentage::NotApplicable => f.write_str("n/a"),
        }
    }
}

/// Render a percentage for display.
///
/// Values below 0.01 show as 0.01, everything is rounded up to two decimals,
/// and trailing zeros are dropped: `66.67`, `12.5`, `40`.
pub fn format_percentage(value: f64) -> String {
    let hundredths = (value.max(0.01) * 100.0 - 1e-9).ceil();
    let rounded = hundredths / 100.0;
    let precision = if hundredths % 100.0 == 0.0 {
        0
    } else if hundredths % 10.0 == 0.0 {
        1
    } else {
        2
    };
    format!("{rounded:.precision$}")
}

/// Per-category totals for the rated stat types of one scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryTotals {
    totals: BTreeMap<StatType, u64>,
}

impl CategoryTotals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn of(counts: &Accumulator) -> Self {
        let mut totals = Self::new();
        totals.add(counts);
        totals
    }

    /// Add another trace's counts to this scope.
    pub fn add(&mut self, counts: &Accumulator) {
        for stat_type in counts.stat_types() {
            if stat_type.denominator() == Denominator::CategoryTotal {
                let total = self.totals.entry(stat_type.clone()).or_insert(0);
                *total = total.saturating_add(counts.category_total(stat_type));
            }
        }
    }

    pub fn get(&self, stat_type: &StatType) -> u64 {
        self.totals.get(stat_type).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StatType, u64)> {
        self.totals.iter().map(|(t, total)| (t, *total))
    }
}

/// A statistic row with its percentage in some scope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatedRow {
    pub stat_type: StatType,
    pub stat_name: String,
    pub stat_count: u64,
    #[serde(serialize_with = "serialize_percentage")]
    pub percentage: Percentage,
}

fn serialize_percentage<S: serde::Serializer>(
    percentage: &Percentage,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match percentage.value() {
        Some(value) => serializer.serialize_f64(value),
        None => serializer.serialize_none(),
    }
}

/// Rate every row of `counts` against `totals`.
pub fn rate(counts: &Accumulator, totals: &CategoryTotals) -> Vec<RatedRow> {
    counts
        .iter()
        .map(|(stat_type, name, count)| RatedRow {
            stat_type: stat_type.clone(),
            stat_name: name.to_string(),
            stat_count: count,
            percentage: Percentage::for_row(stat_type, count, totals),
        })
        .collect()
}
