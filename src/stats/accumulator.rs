//! Per-worker statistic counters.

use std::collections::BTreeMap;

use super::{StatRow, StatType};
use crate::trace::LineRecord;

/// Counts keyed by `(StatType, stat_name)`.
///
/// Owned by one worker while it parses its windows, then handed back by value
/// and folded with [`Accumulator::merge`]. Merging sums shared keys and keeps
/// the rest, so the fold order never changes the result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Accumulator {
    counts: BTreeMap<StatType, BTreeMap<String, u64>>,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, stat_type: StatType, stat_name: &str) {
        self.add(stat_type, stat_name, 1);
    }

    pub fn add(&mut self, stat_type: StatType, stat_name: &str, count: u64) {
        let names = self.counts.entry(stat_type).or_default();
        match names.get_mut(stat_name) {
            Some(existing) => *existing = existing.saturating_add(count),
            None => {
                names.insert(stat_name.to_string(), count);
            }
        }
    }

    /// Count a classified dump line. Returns false for noise.
    pub fn record_line(&mut self, record: &LineRecord<'_>) -> bool {
        match *record {
            LineRecord::Call { function } => self.record(StatType::ApiCalls, function),
            LineRecord::RenderState { function, flag } => {
                self.record(StatType::RenderStates, flag);
                if let Some(function) = function {
                    self.record(StatType::ApiCalls, function);
                }
            }
            LineRecord::QueryType { function, kind } => {
                self.record(StatType::QueryTypes, kind);
                if let Some(function) = function {
                    self.record(StatType::ApiCalls, function);
                }
            }
            LineRecord::Noise => return false,
        }
        true
    }

    pub fn merge(mut self, other: Accumulator) -> Accumulator {
        self.merge_from(other);
        self
    }

    pub fn merge_from(&mut self, other: Accumulator) {
        for (stat_type, names) in other.counts {
            let ours = self.counts.entry(stat_type).or_default();
            if ours.is_empty() {
                *ours = names;
                continue;
            }
            for (name, count) in names {
                let slot = ours.entry(name).or_insert(0);
                *slot = slot.saturating_add(count);
            }
        }
    }

    pub fn get(&self, stat_type: &StatType, stat_name: &str) -> u64 {
        self.counts
            .get(stat_type)
            .and_then(|names| names.get(stat_name))
            .copied()
            .unwrap_or(0)
    }

    pub fn category(&self, stat_type: &StatType) -> Option<&BTreeMap<String, u64>> {
        self.counts.get(stat_type)
    }

    pub fn category_total(&self, stat_type: &StatType) -> u64 {
        self.counts
            .get(stat_type)
            .map(|names| names.values().fold(0u64, |sum, c| sum.saturating_add(*c)))
            .unwrap_or(0)
    }

    pub fn stat_types(&self) -> impl Iterator<Item = &StatType> {
        self.counts.keys()
    }

    /// Borrowed rows ordered by stat type, then name.
    pub fn iter(&self) -> impl Iterator<Item = (&StatType, &str, u64)> {
        self.counts.iter().flat_map(|(stat_type, names)| {
            names
                .iter()
                .map(move |(name, count)| (stat_type, name.as_str(), *count))
        })
    }

    pub fn rows(&self) -> Vec<StatRow> {
        self.iter()
            .map(|(stat_type, name, count)| StatRow {
                stat_type: stat_type.clone(),
                stat_name: name.to_string(),
                stat_count: count,
            })
            .collect()
    }

    /// Number of distinct `(type, name)` rows.
    pub fn len(&self) -> usize {
        self.counts.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<StatRow> for Accumulator {
    fn from_iter<I: IntoIterator<Item = StatRow>>(rows: I) -> Self {
        let mut acc = Accumulator::new();
        for row in rows {
            acc.add(row.stat_type, &row.stat_name, row.stat_count);
        }
        acc
    }
}
