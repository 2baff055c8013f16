//! Searching and listing a store snapshot.
//!
//! A search matches the query text against statistic names first. When no
//! row matches, it falls back to application names and returns the rows of
//! every matching trace. Matching is case-insensitive substring matching;
//! a trailing ` !` (`"SetRenderState !"`) asks for whole-name matches.

use std::cmp::Ordering;
use std::sync::Arc;

use serde::Serialize;

use super::{StoreSnapshot, StoredTrace};
use crate::error::{Result, TraceStatsError};
use crate::stats::{Percentage, PercentageScope, StatType};
use crate::trace::ApiVariant;

pub const SEARCH_RESULTS_LIMIT: usize = 500;
pub const MIN_QUERY_CHARS: usize = 2;
pub const MAX_QUERY_CHARS: usize = 68;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreQuery {
    pub text: String,
    pub exact: bool,
    pub api: Option<ApiVariant>,
    pub stat_type: Option<StatType>,
    pub limit: usize,
}

impl StoreQuery {
    /// Parse user input, honouring the ` !` exact-match suffix.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        let chars = input.chars().count();
        if !(MIN_QUERY_CHARS..=MAX_QUERY_CHARS).contains(&chars) {
            return Err(TraceStatsError::InvalidArguments {
                message: format!(
                    "Search text must be {MIN_QUERY_CHARS} to {MAX_QUERY_CHARS} characters, got {chars}"
                ),
            });
        }
        let (text, exact) = match input.rsplit_once(' ') {
            Some((text, "!")) => (text.trim_end(), true),
            _ => (input, false),
        };
        Ok(Self {
            text: text.to_string(),
            exact,
            api: None,
            stat_type: None,
            limit: SEARCH_RESULTS_LIMIT,
        })
    }

    pub fn with_api(mut self, api: Option<ApiVariant>) -> Self {
        self.api = api;
        self
    }

    pub fn with_stat_type(mut self, stat_type: Option<StatType>) -> Self {
        self.stat_type = stat_type;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    fn matches(&self, candidate: &str) -> bool {
        if self.exact {
            candidate.to_lowercase() == self.text.to_lowercase()
        } else {
            candidate.to_lowercase().contains(&self.text.to_lowercase())
        }
    }

    fn admits(&self, trace: &StoredTrace, stat_type: &StatType) -> bool {
        self.api.as_ref().is_none_or(|api| *api == trace.identity().api)
            && self.stat_type.as_ref().is_none_or(|t| t == stat_type)
    }
}

/// Which field a search hit matched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchedOn {
    StatName,
    Application,
}

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub trace: Arc<StoredTrace>,
    pub stat_type: StatType,
    pub stat_name: String,
    pub stat_count: u64,
    /// Relative to the rest of this trace's category
    pub trace_percentage: Percentage,
    /// Relative to the category across the configured corpus scope
    pub corpus_percentage: Percentage,
    pub matched_on: MatchedOn,
}

/// Sort order for corpus listings.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    clap::ValueEnum,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum SortKey {
    #[default]
    Name,
    Api,
    Id,
}

fn by_name(a: &StoredTrace, b: &StoredTrace) -> Ordering {
    a.identity()
        .label()
        .to_lowercase()
        .cmp(&b.identity().label().to_lowercase())
        .then_with(|| a.identity().api.cmp(&b.identity().api))
}

impl StoreSnapshot {
    pub fn search(&self, query: &StoreQuery, scope: PercentageScope) -> Vec<SearchHit> {
        let mut hits = self.collect_hits(query, scope, MatchedOn::StatName);
        if hits.is_empty() {
            hits = self.collect_hits(query, scope, MatchedOn::Application);
        }

        match hits.first().map(|hit| hit.matched_on) {
            Some(MatchedOn::StatName) => hits.sort_by(|a, b| {
                a.stat_type
                    .cmp(&b.stat_type)
                    .then(b.stat_count.cmp(&a.stat_count))
                    .then_with(|| by_name(&a.trace, &b.trace))
                    .then_with(|| a.stat_name.cmp(&b.stat_name))
            }),
            Some(MatchedOn::Application) => hits.sort_by(|a, b| {
                by_name(&a.trace, &b.trace)
                    .then_with(|| a.stat_type.cmp(&b.stat_type))
                    .then(b.stat_count.cmp(&a.stat_count))
                    .then_with(|| a.stat_name.cmp(&b.stat_name))
            }),
            None => {}
        }
        hits.truncate(query.limit);
        log::debug!(
            "Search {:?} (exact: {}) found {} rows",
            query.text,
            query.exact,
            hits.len()
        );
        hits
    }

    fn collect_hits(
        &self,
        query: &StoreQuery,
        scope: PercentageScope,
        matched_on: MatchedOn,
    ) -> Vec<SearchHit> {
        let summary = self.summary();
        let mut hits = Vec::new();
        for trace in self.iter() {
            let identity = trace.identity();
            if matched_on == MatchedOn::Application
                && !query.matches(&identity.application)
                && !identity.display_name.as_deref().is_some_and(|n| query.matches(n))
            {
                continue;
            }
            let trace_totals = trace.result.totals();
            let corpus_totals = summary.totals(scope, &identity.api);
            for (stat_type, stat_name, stat_count) in trace.result.counts.iter() {
                if !query.admits(trace, stat_type) {
                    continue;
                }
                if matched_on == MatchedOn::StatName && !query.matches(stat_name) {
                    continue;
                }
                hits.push(SearchHit {
                    trace: Arc::clone(trace),
                    stat_type: stat_type.clone(),
                    stat_name: stat_name.to_string(),
                    stat_count,
                    trace_percentage: Percentage::for_row(stat_type, stat_count, &trace_totals),
                    corpus_percentage: Percentage::for_row(stat_type, stat_count, corpus_totals),
                    matched_on,
                });
            }
        }
        hits
    }

    /// Every trace, ordered by `sort`.
    pub fn list(&self, sort: SortKey) -> Vec<Arc<StoredTrace>> {
        let mut traces: Vec<_> = self.iter().cloned().collect();
        match sort {
            SortKey::Name => traces.sort_by(|a, b| by_name(a, b)),
            SortKey::Api => traces.sort_by(|a, b| {
                a.identity()
                    .api
                    .cmp(&b.identity().api)
                    .then_with(|| by_name(a, b))
            }),
            SortKey::Id => traces.sort_by_key(|t| t.id),
        }
        traces
    }
}
