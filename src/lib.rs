//! Statistics extraction and corpus search for apitrace captures.
//!
//! The pipeline runs a trace through the external dump tool in parallel call
//! windows, classifies every dump line, reduces the per-worker counters into
//! one [`stats::AggregatedResult`] per trace, and serializes the results into
//! the JSON interchange document that [`store::ConsolidatedStore`] imports.

pub mod cancel;
pub mod config;
pub mod dispatch;
pub mod dump;
pub mod error;
pub mod record;
pub mod shell_exec;
pub mod stats;
pub mod store;
pub mod styling;
pub mod trace;

pub use error::{Result, ToolFailure, TraceStatsError};
