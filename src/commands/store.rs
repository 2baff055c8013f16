use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracestats::config::TracestatsConfig;
use tracestats::stats::{PercentageScope, StatType};
use tracestats::store::{ConsolidatedStore, MatchedOn, SearchHit, SortKey, StoreQuery, StoredTrace};
use tracestats::styling::{
    Align, BOLD, CYAN, DIM, HINT_EMOJI, INFO_EMOJI, StyledString, Table, eprintln, format_error,
    format_hint, format_success, print, println,
};
use tracestats::trace::{ApiVariant, TraceKey};

use crate::cli::OutputFormat;

/// Search inputs from the command line; unset values come from the config.
#[derive(Debug)]
pub struct SearchOptions {
    pub query: String,
    pub api: Option<ApiVariant>,
    pub stat_type: Option<StatType>,
    pub scope: Option<PercentageScope>,
    pub limit: Option<usize>,
    pub format: OutputFormat,
}

fn open_store(explicit: Option<PathBuf>, config: &TracestatsConfig) -> anyhow::Result<ConsolidatedStore> {
    let path = match explicit {
        Some(path) => path,
        None => config.store_path()?,
    };
    log::debug!("Opening store {}", path.display());
    Ok(ConsolidatedStore::open(&path)?)
}

/// Import each document; a rejected document doesn't stop the others.
pub fn handle_import(
    files: &[PathBuf],
    store_path: Option<PathBuf>,
    config: &TracestatsConfig,
) -> anyhow::Result<bool> {
    let store = open_store(store_path, config)?;
    let mut failures = 0usize;

    for file in files {
        match store.import_file(file) {
            Ok(summary) => println!(
                "{}",
                format_success(&format!(
                    "Imported {BOLD}{}{BOLD:#}: {} new, {} replaced",
                    file.display(),
                    summary.inserted,
                    summary.replaced
                ))
            ),
            Err(e) => {
                eprintln!("{}", format_error(&e.to_string()));
                failures += 1;
            }
        }
    }

    let path = store.path().map(Path::to_path_buf);
    store.close().with_context(|| match &path {
        Some(path) => format!("Failed to save {}", path.display()),
        None => "Failed to save store".to_string(),
    })?;
    Ok(failures == 0)
}

#[derive(Serialize)]
struct HitJson<'a> {
    application: &'a str,
    name: Option<&'a str>,
    api: &'a ApiVariant,
    stat_type: &'a StatType,
    stat_name: &'a str,
    stat_count: u64,
    trace_percentage: Option<f64>,
    corpus_percentage: Option<f64>,
    matched_on: MatchedOn,
}

impl<'a> From<&'a SearchHit> for HitJson<'a> {
    fn from(hit: &'a SearchHit) -> Self {
        let identity = hit.trace.identity();
        Self {
            application: &identity.application,
            name: identity.display_name.as_deref(),
            api: &identity.api,
            stat_type: &hit.stat_type,
            stat_name: &hit.stat_name,
            stat_count: hit.stat_count,
            trace_percentage: hit.trace_percentage.value(),
            corpus_percentage: hit.corpus_percentage.value(),
            matched_on: hit.matched_on,
        }
    }
}

pub fn handle_search(
    options: SearchOptions,
    store_path: Option<PathBuf>,
    config: &TracestatsConfig,
) -> anyhow::Result<()> {
    let store = open_store(store_path, config)?;
    let scope = options.scope.unwrap_or(config.percentage_scope);
    let query = StoreQuery::parse(&options.query)?
        .with_api(options.api)
        .with_stat_type(options.stat_type)
        .with_limit(options.limit.unwrap_or(config.search_limit));

    let snapshot = store.snapshot();
    let hits = snapshot.search(&query, scope);

    if let OutputFormat::Json = options.format {
        let json: Vec<HitJson<'_>> = hits.iter().map(HitJson::from).collect();
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    if hits.is_empty() {
        println!("{INFO_EMOJI} No results for {BOLD}{}{BOLD:#}", query.text);
        return Ok(());
    }
    if hits[0].matched_on == MatchedOn::Application {
        println!(
            "{}",
            format_hint(&format!(
                "No stat named like \"{}\"; showing applications matching it",
                query.text
            ))
        );
    }

    let corpus_header = match scope {
        PercentageScope::PerApi => "API %",
        PercentageScope::Corpus => "Corpus %",
    };
    let mut table = Table::new([
        ("Application", Align::Left),
        ("API", Align::Left),
        ("Type", Align::Left),
        ("Name", Align::Left),
        ("Count", Align::Right),
        ("Trace %", Align::Right),
        (corpus_header, Align::Right),
    ]);
    for hit in &hits {
        let identity = hit.trace.identity();
        table.push(vec![
            StyledString::styled(identity.label(), BOLD),
            StyledString::raw(identity.api.to_string()),
            StyledString::styled(hit.stat_type.as_str(), DIM),
            StyledString::styled(hit.stat_name.clone(), CYAN),
            StyledString::raw(hit.stat_count.to_string()),
            StyledString::raw(hit.trace_percentage.to_string()),
            StyledString::raw(hit.corpus_percentage.to_string()),
        ]);
    }
    print_table(&table);
    if hits.len() == query.limit {
        println!(
            "{HINT_EMOJI} {DIM}Showing the first {} results; use --limit to see more{DIM:#}",
            query.limit
        );
    }
    Ok(())
}

#[derive(Serialize)]
struct TraceJson<'a> {
    id: u64,
    application: &'a str,
    name: Option<&'a str>,
    link: Option<&'a str>,
    api: &'a ApiVariant,
    calls: u64,
    updated_last: DateTime<Utc>,
}

impl<'a> From<&'a StoredTrace> for TraceJson<'a> {
    fn from(trace: &'a StoredTrace) -> Self {
        let identity = trace.identity();
        Self {
            id: trace.id,
            application: &identity.application,
            name: identity.display_name.as_deref(),
            link: identity.link.as_deref(),
            api: &identity.api,
            calls: trace.result.total_calls(),
            updated_last: trace.updated_last,
        }
    }
}

pub fn handle_list(
    store_path: Option<PathBuf>,
    sort: SortKey,
    format: OutputFormat,
    config: &TracestatsConfig,
) -> anyhow::Result<()> {
    let store = open_store(store_path, config)?;
    let snapshot = store.snapshot();
    let traces = snapshot.list(sort);

    if let OutputFormat::Json = format {
        let json: Vec<TraceJson<'_>> = traces.iter().map(|t| TraceJson::from(t.as_ref())).collect();
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    if traces.is_empty() {
        println!("{INFO_EMOJI} The store is empty");
        return Ok(());
    }
    let mut table = Table::new([
        ("ID", Align::Right),
        ("Application", Align::Left),
        ("Name", Align::Left),
        ("API", Align::Left),
        ("Calls", Align::Right),
        ("Updated", Align::Left),
    ]);
    for trace in &traces {
        let identity = trace.identity();
        table.push(vec![
            StyledString::styled(trace.id.to_string(), DIM),
            StyledString::styled(identity.application.clone(), BOLD),
            StyledString::raw(identity.display_name.clone().unwrap_or_default()),
            StyledString::raw(identity.api.to_string()),
            StyledString::raw(trace.result.total_calls().to_string()),
            StyledString::styled(trace.updated_last.format("%Y-%m-%d %H:%M").to_string(), DIM),
        ]);
    }
    print_table(&table);
    Ok(())
}

pub fn handle_summary(store_path: Option<PathBuf>, config: &TracestatsConfig) -> anyhow::Result<()> {
    let store = open_store(store_path, config)?;
    let snapshot = store.snapshot();
    let summary = snapshot.summary();

    if summary.trace_count() == 0 {
        println!("{INFO_EMOJI} The store is empty");
        return Ok(());
    }
    let mut table = Table::new([("API", Align::Left), ("Traces", Align::Right)]);
    for (api, count) in &summary.traces_per_api {
        table.push(vec![
            StyledString::raw(api.to_string()),
            StyledString::raw(count.to_string()),
        ]);
    }
    table.push(vec![
        StyledString::styled("Total", BOLD),
        StyledString::styled(summary.trace_count().to_string(), BOLD),
    ]);
    print_table(&table);
    Ok(())
}

pub fn handle_remove(
    application: String,
    api: ApiVariant,
    store_path: Option<PathBuf>,
    config: &TracestatsConfig,
) -> anyhow::Result<()> {
    let store = open_store(store_path, config)?;
    let key = TraceKey { application, api };
    if !store.remove(&key) {
        anyhow::bail!("No trace {key} in the store");
    }
    store.close()?;
    println!("{}", format_success(&format!("Removed {BOLD}{key}{BOLD:#}")));
    Ok(())
}

fn print_table(table: &Table) {
    // Rows already end in newlines
    print!("{}", table.render());
}
