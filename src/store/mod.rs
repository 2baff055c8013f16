//! The consolidated store: every imported trace, searchable as one corpus.
//!
//! The store holds an immutable [`StoreSnapshot`] behind an `Arc`. Readers
//! clone the `Arc` and work from that snapshot for as long as they like.
//! Writers (import, remove) take the single writer lock, build the next
//! snapshot with whole [`StoredTrace`] entries swapped in or out, and publish
//! it in one step. A reader therefore sees a trace either with all of its old
//! rows or all of its new ones.
//!
//! Corpus aggregates (traces per API, per-category totals) belong to a
//! snapshot and are computed on first use, so they always describe exactly
//! the traces of that snapshot.
//!
//! Persistence is a JSON file written by [`ConsolidatedStore::save`]
//! (temporary file, then rename). Lifecycle is explicit: `open` or
//! `in_memory`, then `save` as needed, then `close`.

mod query;

pub use query::{
    MAX_QUERY_CHARS, MIN_QUERY_CHARS, MatchedOn, SEARCH_RESULTS_LIMIT, SearchHit, SortKey,
    StoreQuery,
};

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TraceStatsError};
use crate::record::{self, TraceRecord};
use crate::stats::{AggregatedResult, CategoryTotals, PercentageScope};
use crate::trace::{ApiVariant, TraceIdentity, TraceKey};

/// A trace and its statistics as one unit of the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredTrace {
    /// Assigned on first import and kept across re-imports
    pub id: u64,
    pub result: AggregatedResult,
    pub updated_last: DateTime<Utc>,
}

impl StoredTrace {
    pub fn identity(&self) -> &TraceIdentity {
        &self.result.identity
    }

    pub fn key(&self) -> TraceKey {
        self.result.identity.key()
    }
}

/// Corpus-wide aggregates of one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorpusSummary {
    pub traces_per_api: BTreeMap<ApiVariant, usize>,
    pub totals_per_api: BTreeMap<ApiVariant, CategoryTotals>,
    pub corpus_totals: CategoryTotals,
}

impl CorpusSummary {
    fn compute<'a>(traces: impl Iterator<Item = &'a Arc<StoredTrace>>) -> Self {
        let mut summary = Self::default();
        for trace in traces {
            let api = &trace.result.identity.api;
            *summary.traces_per_api.entry(api.clone()).or_insert(0) += 1;
            summary
                .totals_per_api
                .entry(api.clone())
                .or_default()
                .add(&trace.result.counts);
            summary.corpus_totals.add(&trace.result.counts);
        }
        summary
    }

    pub fn trace_count(&self) -> usize {
        self.traces_per_api.values().sum()
    }

    /// Denominators for a row of a trace captured with `api`.
    pub fn totals(&self, scope: PercentageScope, api: &ApiVariant) -> &CategoryTotals {
        static EMPTY: OnceLock<CategoryTotals> = OnceLock::new();
        match scope {
            PercentageScope::Corpus => &self.corpus_totals,
            PercentageScope::PerApi => self
                .totals_per_api
                .get(api)
                .unwrap_or_else(|| EMPTY.get_or_init(CategoryTotals::new)),
        }
    }
}

/// An immutable view of the store.
#[derive(Debug, Default)]
pub struct StoreSnapshot {
    traces: IndexMap<TraceKey, Arc<StoredTrace>>,
    summary: OnceLock<CorpusSummary>,
}

impl StoreSnapshot {
    fn new(traces: IndexMap<TraceKey, Arc<StoredTrace>>) -> Self {
        Self {
            traces,
            summary: OnceLock::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.traces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    pub fn get(&self, key: &TraceKey) -> Option<&Arc<StoredTrace>> {
        self.traces.get(key)
    }

    /// Traces in import order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<StoredTrace>> {
        self.traces.values()
    }

    pub fn summary(&self) -> &CorpusSummary {
        self.summary.get_or_init(|| {
            log::debug!("Computing corpus aggregates for {} traces", self.traces.len());
            CorpusSummary::compute(self.traces.values())
        })
    }
}

/// What one import did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub inserted: usize,
    pub replaced: usize,
}

#[derive(Debug)]
struct WriterState {
    next_id: u64,
    dirty: bool,
}

/// On-disk layout of the store file.
#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    next_id: u64,
    traces: Vec<StoreFileEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreFileEntry {
    id: u64,
    updated_last: DateTime<Utc>,
    #[serde(flatten)]
    record: TraceRecord,
}

pub struct ConsolidatedStore {
    path: Option<PathBuf>,
    writer: Mutex<WriterState>,
    current: RwLock<Arc<StoreSnapshot>>,
}

impl ConsolidatedStore {
    /// An empty store that is never written to disk.
    pub fn in_memory() -> Self {
        Self::from_parts(None, 1, IndexMap::new())
    }

    /// Open the store file at `path`, or start an empty store there.
    pub fn open(path: &Path) -> Result<Self> {
        let store_error = |message: String| TraceStatsError::Store {
            path: path.to_path_buf(),
            message,
        };
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No store at {}, starting empty", path.display());
                return Ok(Self::from_parts(Some(path.to_path_buf()), 1, IndexMap::new()));
            }
            Err(e) => return Err(store_error(e.to_string())),
        };

        let file: StoreFile =
            serde_json::from_str(&text).map_err(|e| store_error(format!("corrupt store file: {e}")))?;
        let mut next_id = file.next_id.max(1);
        let mut traces = IndexMap::with_capacity(file.traces.len());
        for entry in file.traces {
            next_id = next_id.max(entry.id + 1);
            let stored = StoredTrace {
                id: entry.id,
                result: AggregatedResult::from(entry.record),
                updated_last: entry.updated_last,
            };
            traces.insert(stored.key(), Arc::new(stored));
        }
        log::debug!("Opened store {} with {} traces", path.display(), traces.len());
        Ok(Self::from_parts(Some(path.to_path_buf()), next_id, traces))
    }

    fn from_parts(
        path: Option<PathBuf>,
        next_id: u64,
        traces: IndexMap<TraceKey, Arc<StoredTrace>>,
    ) -> Self {
        Self {
            path,
            writer: Mutex::new(WriterState {
                next_id,
                dirty: false,
            }),
            current: RwLock::new(Arc::new(StoreSnapshot::new(traces))),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The current contents. Later writes don't affect a snapshot already taken.
    pub fn snapshot(&self) -> Arc<StoreSnapshot> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn publish(&self, snapshot: StoreSnapshot) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(snapshot);
    }

    /// Upsert each result by its trace key, replacing prior statistics whole.
    pub fn import(&self, results: impl IntoIterator<Item = AggregatedResult>) -> ImportSummary {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let mut traces = self.snapshot().traces.clone();
        let mut summary = ImportSummary::default();
        let now = Utc::now();

        for result in results {
            let key = result.identity.key();
            let id = match traces.get(&key) {
                Some(existing) => {
                    summary.replaced += 1;
                    log::debug!("Replacing statistics of {key} (id {})", existing.id);
                    existing.id
                }
                None => {
                    summary.inserted += 1;
                    let id = writer.next_id;
                    writer.next_id += 1;
                    log::debug!("Adding {key} as id {id}");
                    id
                }
            };
            traces.insert(
                key,
                Arc::new(StoredTrace {
                    id,
                    result,
                    updated_last: now,
                }),
            );
        }

        if summary != ImportSummary::default() {
            writer.dirty = true;
            self.publish(StoreSnapshot::new(traces));
        }
        summary
    }

    /// Validate a whole document, then import it. A malformed document
    /// changes nothing.
    pub fn import_document(&self, text: &str, document: &str) -> Result<ImportSummary> {
        let results = record::parse_document(text, document)?;
        Ok(self.import(results))
    }

    pub fn import_file(&self, path: &Path) -> Result<ImportSummary> {
        let results = record::read_document(path)?;
        Ok(self.import(results))
    }

    /// Delete one trace. Returns whether it existed.
    pub fn remove(&self, key: &TraceKey) -> bool {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let mut traces = self.snapshot().traces.clone();
        if traces.shift_remove(key).is_none() {
            return false;
        }
        writer.dirty = true;
        self.publish(StoreSnapshot::new(traces));
        true
    }

    pub fn is_dirty(&self) -> bool {
        self.writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .dirty
    }

    /// Write the store file. A no-op for in-memory stores.
    pub fn save(&self) -> Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(path) = &self.path else {
            writer.dirty = false;
            return Ok(());
        };
        let store_error = |message: String| TraceStatsError::Store {
            path: path.clone(),
            message,
        };

        let snapshot = self.snapshot();
        let file = StoreFile {
            next_id: writer.next_id,
            traces: snapshot
                .iter()
                .map(|trace| StoreFileEntry {
                    id: trace.id,
                    updated_last: trace.updated_last,
                    record: TraceRecord::from(&trace.result),
                })
                .collect(),
        };
        let json = serde_json::to_string_pretty(&file).map_err(|e| store_error(e.to_string()))?;

        let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => parent,
            None => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(|e| store_error(e.to_string()))?;
        // A temp file per save, so concurrent writers never share one
        let mut tmp =
            tempfile::NamedTempFile::new_in(dir).map_err(|e| store_error(e.to_string()))?;
        tmp.write_all(json.as_bytes())
            .and_then(|()| tmp.write_all(b"\n"))
            .map_err(|e| store_error(e.to_string()))?;
        tmp.persist(path)
            .map_err(|e| store_error(e.error.to_string()))?;

        writer.dirty = false;
        log::debug!("Saved {} traces to {}", snapshot.len(), path.display());
        Ok(())
    }

    /// Save pending changes and release the store.
    pub fn close(self) -> Result<()> {
        if self.is_dirty() {
            self.save()?;
        }
        Ok(())
    }
}
