//! Tracestats error types
//!
//! - **`TraceStatsError`** - A typed enum for domain errors that can be
//!   pattern-matched and tested. Display produces a one-paragraph message that
//!   names the trace or file involved and the underlying cause.
//!
//! - **`ToolFailure`** - Why a dump tool invocation failed (spawn error, exit
//!   status, signal, timeout, broken pipe).
//!
//! A zero percentage denominator is deliberately not represented here: it is a
//! defined result (`Percentage::NotApplicable`), not a failure.

use std::path::PathBuf;
use std::time::Duration;

use crate::dump::CallRange;

/// Result alias used throughout the library.
pub type Result<T, E = TraceStatsError> = std::result::Result<T, E>;

/// How a dump tool subprocess failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolFailure {
    /// The process could not be started
    Spawn { message: String },
    /// The process exited with a non-zero status
    Exit { code: i32 },
    /// The process was terminated by a signal (Unix)
    Signal { signal: i32 },
    /// The process was killed after exceeding the configured timeout
    TimedOut { after: Duration },
    /// Reading the process output failed
    Io { message: String },
}

impl std::fmt::Display for ToolFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolFailure::Spawn { message } => write!(f, "failed to start: {message}"),
            ToolFailure::Exit { code } => write!(f, "exit status: {code}"),
            ToolFailure::Signal { signal } => write!(f, "terminated by signal {signal}"),
            ToolFailure::TimedOut { after } => {
                write!(f, "timed out after {}s", after.as_secs_f64())
            }
            ToolFailure::Io { message } => write!(f, "failed to read output: {message}"),
        }
    }
}

/// Domain errors for trace parsing, record import and the consolidated store.
///
/// ```ignore
/// if let Err(TraceStatsError::ToolInvocation { failure: ToolFailure::Exit { code }, .. }) = result {
///     eprintln!("apitrace exited with {code}");
/// }
/// ```
#[derive(Debug, Clone)]
pub enum TraceStatsError {
    /// The dump tool could not be located
    ToolNotFound { tool: String },
    /// The dump tool answered `version` with something we can't use
    UnsupportedTool { tool: PathBuf, version: String },
    /// A dump tool invocation failed for `target` (a trace, or the tool itself)
    ToolInvocation {
        target: PathBuf,
        command: String,
        failure: ToolFailure,
    },
    /// One call window of a trace failed; the whole trace is discarded
    PartialChunkFailure {
        trace: PathBuf,
        range: CallRange,
        source: Box<TraceStatsError>,
    },
    /// Processing was interrupted; no partial result is surfaced
    Cancelled { trace: PathBuf },
    TraceNotFound { path: PathBuf },
    /// No API entry point was found and none was given
    ApiUndetected { trace: PathBuf },
    /// An interchange document failed validation; nothing from it was imported
    MalformedRecord { document: String, reason: String },
    /// The consolidated store file could not be read or written
    Store { path: PathBuf, message: String },
    InvalidArguments { message: String },
    /// Worker pool setup failed
    Internal { message: String },
}

impl std::error::Error for TraceStatsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TraceStatsError::PartialChunkFailure { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl std::fmt::Display for TraceStatsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TraceStatsError::ToolNotFound { tool } => write!(
                f,
                "Unable to find {tool}. Ensure it is in $PATH or pass --apitrace with the full path"
            ),
            TraceStatsError::UnsupportedTool { tool, version } => write!(
                f,
                "Unsupported apitrace executable {} (reported {version:?}); apitrace 12.0 or newer is required",
                tool.display()
            ),
            TraceStatsError::ToolInvocation {
                target,
                command,
                failure,
            } => write!(
                f,
                "Dump tool failed for {}: {failure}\n  command: {command}",
                target.display()
            ),
            TraceStatsError::PartialChunkFailure {
                trace,
                range,
                source,
            } => write!(
                f,
                "Processing {} failed in calls {range}; discarding the whole trace\n  cause: {source}",
                trace.display()
            ),
            TraceStatsError::Cancelled { trace } => {
                write!(f, "Processing {} was cancelled", trace.display())
            }
            TraceStatsError::TraceNotFound { path } => {
                write!(f, "Trace file not found: {}", path.display())
            }
            TraceStatsError::ApiUndetected { trace } => write!(
                f,
                "Could not determine the API of {}: no known entry point call found (use --api to set it)",
                trace.display()
            ),
            TraceStatsError::MalformedRecord { document, reason } => {
                write!(f, "Rejected {document}: {reason}")
            }
            TraceStatsError::Store { path, message } => {
                write!(f, "Store {} unusable: {message}", path.display())
            }
            TraceStatsError::InvalidArguments { message } => write!(f, "{message}"),
            TraceStatsError::Internal { message } => write!(f, "{message}"),
        }
    }
}

impl TraceStatsError {
    /// The innermost cause, unwrapping chunk failures.
    pub fn root_cause(&self) -> &TraceStatsError {
        match self {
            TraceStatsError::PartialChunkFailure { source, .. } => source.root_cause(),
            other => other,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.root_cause(), TraceStatsError::Cancelled { .. })
    }
}
