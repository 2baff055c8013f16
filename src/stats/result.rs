use super::percentage::{self, CategoryTotals, RatedRow};
use super::{Accumulator, StatType};
use crate::trace::TraceIdentity;

/// The complete statistics of one trace.
///
/// Only ever built from a fully reduced accumulator (or a validated record),
/// so a value of this type is never a partial result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedResult {
    pub identity: TraceIdentity,
    pub counts: Accumulator,
}

impl AggregatedResult {
    pub fn new(identity: TraceIdentity, counts: Accumulator) -> Self {
        Self { identity, counts }
    }

    /// Sum of all call-count rows.
    pub fn total_calls(&self) -> u64 {
        self.counts.category_total(&StatType::ApiCalls)
    }

    pub fn render_states_total(&self) -> u64 {
        self.counts.category_total(&StatType::RenderStates)
    }

    pub fn query_types_total(&self) -> u64 {
        self.counts.category_total(&StatType::QueryTypes)
    }

    pub fn totals(&self) -> CategoryTotals {
        CategoryTotals::of(&self.counts)
    }

    /// Rows with percentages relative to this trace alone.
    pub fn rated_rows(&self) -> Vec<RatedRow> {
        percentage::rate(&self.counts, &self.totals())
    }
}
