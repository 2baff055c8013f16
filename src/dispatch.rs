//! Parallel dump parsing.
//!
//! A trace's call stream is cut into fixed-size windows of `chunk_calls`
//! calls, handed to the dump tool as `--calls=<start>-<end>`. With `N`
//! workers, worker `w` parses windows `w`, `w + N`, `w + 2N`, ... and stops
//! once the dump tool prints nothing at all for a window, which is past the
//! end of the trace. Windows of noise still count as part of the trace.
//!
//! ```text
//!            window 0   window 1   window 2   window 3   window 4
//! N = 2:     worker 0   worker 1   worker 0   worker 1   worker 0 (empty, stop)
//! ```
//!
//! The first empty window is shared by all workers: nobody starts a window at
//! or past it, and windows past it that were already parsed are dropped before
//! the fold. Each worker owns its per-window [`Accumulator`]s and its dump
//! subprocess, and hands them back by value when done. The dispatcher folds
//! them with [`Accumulator::merge`], so the counts are the same for every `N`.
//!
//! A failed window fails the whole trace. The dispatcher cancels the other
//! workers (killing their subprocesses) and reports the window that failed.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crossbeam_channel as chan;

use crate::cancel::CancelToken;
use crate::dump::{CallRange, DumpSource};
use crate::error::{Result, TraceStatsError};
use crate::stats::{Accumulator, AggregatedResult, StatType};
use crate::trace::{self, ApiVariant, TraceIdentity, classify_line};

/// Calls per dump invocation.
pub const DEFAULT_CHUNK_CALLS: u64 = 500_000;
/// Calls dumped up front to find the API's entry point.
pub const DEFAULT_API_PROBE_CALLS: u64 = 10_000;
/// Progress is logged each time this many more calls have been parsed.
pub const DEFAULT_LOGGING_CHUNK_CALLS: u64 = DEFAULT_CHUNK_CALLS * 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOptions {
    pub threads: usize,
    pub chunk_calls: u64,
    pub api_probe_calls: u64,
    pub logging_chunk_calls: u64,
    /// Traces captured with these APIs are skipped before any parsing
    pub skip_apis: BTreeSet<ApiVariant>,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            threads: 1,
            chunk_calls: DEFAULT_CHUNK_CALLS,
            api_probe_calls: DEFAULT_API_PROBE_CALLS,
            logging_chunk_calls: DEFAULT_LOGGING_CHUNK_CALLS,
            skip_apis: BTreeSet::new(),
        }
    }
}

/// Identity inputs for one trace; the API is detected unless given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceJob {
    pub application: String,
    pub api: Option<ApiVariant>,
    pub display_name: Option<String>,
    pub link: Option<String>,
}

impl TraceJob {
    pub fn new(application: impl Into<String>) -> Self {
        Self {
            application: application.into(),
            api: None,
            display_name: None,
            link: None,
        }
    }

    /// A job named after the trace file.
    pub fn for_trace(path: &std::path::Path) -> Self {
        Self::new(trace::application_name(path))
    }

    pub fn with_api(mut self, api: Option<ApiVariant>) -> Self {
        self.api = api;
        self
    }

    fn identity(&self, api: ApiVariant) -> TraceIdentity {
        TraceIdentity::new(self.application.clone(), api)
            .with_display_name(self.display_name.clone())
            .with_link(self.link.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceOutcome {
    Parsed(AggregatedResult),
    /// The trace's API is in the skip list
    Skipped { api: ApiVariant },
}

enum WorkerEvent {
    WindowDone {
        worker: usize,
        range: CallRange,
        lines: u64,
        records: u64,
    },
    Finished {
        worker: usize,
        result: Result<Vec<WindowCounts>>,
    },
}

/// Counts of one parsed window, tagged with its index for the final fold.
struct WindowCounts {
    index: u64,
    counts: Accumulator,
}

/// Runs traces through a dump source on a fixed pool of worker threads.
pub struct Dispatcher {
    options: DispatchOptions,
    pool: rayon::ThreadPool,
    cancel: CancelToken,
}

impl Dispatcher {
    /// Build a dispatcher whose work stops once `cancel` fires.
    pub fn new(options: DispatchOptions, cancel: CancelToken) -> Result<Self> {
        let threads = options.threads.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("worker-{i}"))
            .build()
            .map_err(|e| TraceStatsError::Internal {
                message: format!("Failed to start {threads} worker threads: {e}"),
            })?;
        Ok(Self {
            options: DispatchOptions { threads, ..options },
            pool,
            cancel,
        })
    }

    /// Parse one trace, or skip it if its API is excluded.
    ///
    /// Either the complete statistics of the trace come back, or an error;
    /// counts from a partly parsed trace are never returned.
    pub fn process(&self, job: &TraceJob, source: &dyn DumpSource) -> Result<TraceOutcome> {
        let trace = source.trace_path();
        let started = Instant::now();
        log::info!("Processing trace: {}", trace.display());

        let api = match &job.api {
            Some(api) => Some(api.clone()),
            None => self.probe_api(source)?,
        };
        if let Some(api) = &api
            && self.options.skip_apis.contains(api)
        {
            log::info!("Skipping {} trace: {}", api, trace.display());
            return Ok(TraceOutcome::Skipped { api: api.clone() });
        }

        let counts = self.collect(source)?;

        let api = match api {
            Some(api) => api,
            None => {
                let functions = counts
                    .category(&StatType::ApiCalls)
                    .into_iter()
                    .flat_map(|names| names.keys().map(String::as_str));
                let api = trace::detect_api(functions).ok_or_else(|| {
                    TraceStatsError::ApiUndetected {
                        trace: trace.to_path_buf(),
                    }
                })?;
                if self.options.skip_apis.contains(&api) {
                    log::info!("Skipping {} trace: {}", api, trace.display());
                    return Ok(TraceOutcome::Skipped { api });
                }
                api
            }
        };

        log_exported_stats(&counts);
        log::info!(
            "Trace processing complete: {} ({api}, {} calls, {:.1}s)",
            trace.display(),
            counts.category_total(&StatType::ApiCalls),
            started.elapsed().as_secs_f64()
        );
        Ok(TraceOutcome::Parsed(AggregatedResult::new(
            job.identity(api),
            counts,
        )))
    }

    /// Look for an entry-point call in the first `api_probe_calls` calls.
    fn probe_api(&self, source: &dyn DumpSource) -> Result<Option<ApiVariant>> {
        if self.options.api_probe_calls == 0 {
            return Ok(None);
        }
        let range = CallRange::new(0, self.options.api_probe_calls - 1);
        let mut functions = BTreeSet::new();
        for line in source.open(range, &self.cancel)? {
            let line = line?;
            if let Some(function) = classify_line(&line).function() {
                functions.insert(function.to_string());
            }
        }
        let api = trace::detect_api(functions.iter().map(String::as_str));
        match &api {
            Some(api) => log::debug!("Detected {api} in calls {range}"),
            None => log::debug!("No entry point in calls {range}"),
        }
        Ok(api)
    }

    /// Parse every window of the trace and reduce the workers' counts.
    pub fn collect(&self, source: &dyn DumpSource) -> Result<Accumulator> {
        let threads = self.options.threads;
        let trace_cancel = self.cancel.child();
        let mut results: Vec<Option<Result<Vec<WindowCounts>>>> =
            (0..threads).map(|_| None).collect();
        // Index of the first window the tool printed nothing for
        let end = AtomicU64::new(u64::MAX);
        let end = &end;

        self.pool.in_place_scope(|scope| {
            let (tx, rx) = chan::unbounded();
            for worker in 0..threads {
                let tx = tx.clone();
                let cancel = trace_cancel.clone();
                scope.spawn(move |_| {
                    let result = self.run_worker(worker, source, end, &cancel, &tx);
                    if result.is_err() {
                        // Siblings stop at their next line and kill their subprocess
                        cancel.cancel();
                    }
                    let _ = tx.send(WorkerEvent::Finished { worker, result });
                });
            }
            drop(tx);

            let mut windows_done = 0u64;
            let mut progress_logged = 0u64;
            for event in rx {
                match event {
                    WorkerEvent::WindowDone {
                        worker,
                        range,
                        lines,
                        records,
                    } => {
                        log::debug!(
                            "Worker {worker} parsed calls {range}: {lines} lines, {records} records"
                        );
                        windows_done += 1;
                        let covered = windows_done.saturating_mul(self.options.chunk_calls);
                        let step = self.options.logging_chunk_calls.max(1);
                        if covered / step > progress_logged {
                            progress_logged = covered / step;
                            log::info!("Processed {} calls...", progress_logged * step);
                        }
                    }
                    WorkerEvent::Finished { worker, result } => results[worker] = Some(result),
                }
            }
        });

        reduce(source.trace_path(), results, end.load(Ordering::SeqCst))
    }

    fn run_worker(
        &self,
        worker: usize,
        source: &dyn DumpSource,
        end: &AtomicU64,
        cancel: &CancelToken,
        events: &chan::Sender<WorkerEvent>,
    ) -> Result<Vec<WindowCounts>> {
        let trace = source.trace_path();
        let stride = self.options.threads as u64;
        let mut windows = Vec::new();
        let mut index = worker as u64;

        while index < end.load(Ordering::SeqCst) {
            if cancel.is_cancelled() {
                return Err(TraceStatsError::Cancelled {
                    trace: trace.to_path_buf(),
                });
            }
            let range = CallRange::window(index, self.options.chunk_calls);
            let mut counts = Accumulator::new();
            let (lines, records) =
                parse_window(source, range, cancel, &mut counts).map_err(|e| {
                    if e.is_cancelled() {
                        e
                    } else {
                        TraceStatsError::PartialChunkFailure {
                            trace: trace.to_path_buf(),
                            range,
                            source: Box::new(e),
                        }
                    }
                })?;
            let _ = events.send(WorkerEvent::WindowDone {
                worker,
                range,
                lines,
                records,
            });
            if lines == 0 {
                end.fetch_min(index, Ordering::SeqCst);
                break;
            }
            windows.push(WindowCounts { index, counts });
            if range.end == u64::MAX {
                break;
            }
            index = index.saturating_add(stride);
        }
        Ok(windows)
    }
}

/// Dump one window into `counts`. Returns how many lines the tool printed and
/// how many of them were records.
fn parse_window(
    source: &dyn DumpSource,
    range: CallRange,
    cancel: &CancelToken,
    counts: &mut Accumulator,
) -> Result<(u64, u64)> {
    let mut lines = 0;
    let mut records = 0;
    for line in source.open(range, cancel)? {
        let line = line?;
        lines += 1;
        if counts.record_line(&classify_line(&line)) {
            records += 1;
        }
        if cancel.is_cancelled() {
            return Err(TraceStatsError::Cancelled {
                trace: source.trace_path().to_path_buf(),
            });
        }
    }
    Ok((lines, records))
}

/// Fold the workers' results, or pick the error that explains the failure.
///
/// A real failure wins over the cancellations it caused in other workers.
/// Windows at or past `end` lie beyond the trace and are left out.
fn reduce(
    trace: &std::path::Path,
    results: Vec<Option<Result<Vec<WindowCounts>>>>,
    end: u64,
) -> Result<Accumulator> {
    let mut counts = Accumulator::new();
    let mut cancelled = None;
    for result in results {
        match result {
            Some(Ok(windows)) => {
                for window in windows.into_iter().filter(|w| w.index < end) {
                    counts.merge_from(window.counts);
                }
            }
            Some(Err(e)) if e.is_cancelled() => cancelled = Some(e),
            Some(Err(e)) => return Err(e),
            None => {
                return Err(TraceStatsError::Internal {
                    message: format!("A worker for {} exited without a result", trace.display()),
                });
            }
        }
    }
    match cancelled {
        Some(_) => Err(TraceStatsError::Cancelled {
            trace: trace.to_path_buf(),
        }),
        None => Ok(counts),
    }
}

fn log_exported_stats(counts: &Accumulator) {
    if !log::log_enabled!(log::Level::Debug) {
        return;
    }
    let lines: Vec<String> = counts
        .iter()
        .map(|(stat_type, name, count)| format!("{stat_type} {name}: {count}"))
        .collect();
    log::debug!(
        "Found and exported the following stats:\n   {}",
        lines.join("\n   ")
    );
}
