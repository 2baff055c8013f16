//! Dump sources: where the text lines of a trace come from.
//!
//! A [`DumpSource`] turns a call range of one trace into a lazy, finite stream
//! of dump lines. Every `open` is a fresh invocation; streams can't be
//! restarted. [`ApitraceSource`] runs the external dump tool, [`LineSource`]
//! serves lines held in memory.

mod apitrace;

pub use apitrace::{ApitraceSource, DumpTool, extract_blobs};

use std::path::{Path, PathBuf};

use crate::cancel::CancelToken;
use crate::error::{Result, TraceStatsError};

/// An inclusive range of call numbers, as understood by `apitrace dump --calls`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallRange {
    pub start: u64,
    pub end: u64,
}

impl CallRange {
    pub fn new(start: u64, end: u64) -> Self {
        debug_assert!(start <= end, "call range {start}-{end} is reversed");
        Self { start, end }
    }

    /// The `index`-th window of `size` calls, counting from call 0.
    pub fn window(index: u64, size: u64) -> Self {
        let size = size.max(1);
        let start = index.saturating_mul(size);
        Self::new(start, start.saturating_add(size - 1))
    }

    pub fn call_count(&self) -> u64 {
        self.end - self.start + 1
    }
}

impl std::fmt::Display for CallRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Lines of one dump invocation. A trailing `Err` ends the stream.
pub type DumpLines = Box<dyn Iterator<Item = Result<String>> + Send>;

/// Something that can dump a call range of a trace as text lines.
pub trait DumpSource: Sync {
    /// The trace this source reads, used in errors and logs.
    fn trace_path(&self) -> &Path;

    /// Start dumping `range`. The returned stream stops early (with
    /// [`TraceStatsError::Cancelled`]) once `cancel` fires.
    fn open(&self, range: CallRange, cancel: &CancelToken) -> Result<DumpLines>;
}

/// An in-memory dump where line `i` stands for call `i`.
///
/// Used for fixtures, benches and the `CALL`/`RENDERSTATE`/`QUERY` marker
/// format, where there is no tool to ask for a call range.
#[derive(Debug, Clone)]
pub struct LineSource {
    path: PathBuf,
    lines: Vec<String>,
}

impl LineSource {
    pub fn new(path: impl Into<PathBuf>, lines: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            path: path.into(),
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl DumpSource for LineSource {
    fn trace_path(&self) -> &Path {
        &self.path
    }

    fn open(&self, range: CallRange, cancel: &CancelToken) -> Result<DumpLines> {
        if cancel.is_cancelled() {
            return Err(TraceStatsError::Cancelled {
                trace: self.path.clone(),
            });
        }
        let len = self.lines.len() as u64;
        let start = range.start.min(len) as usize;
        let end = range.end.saturating_add(1).min(len) as usize;
        let window: Vec<String> = self.lines[start..end].to_vec();
        Ok(Box::new(window.into_iter().map(Ok)))
    }
}
