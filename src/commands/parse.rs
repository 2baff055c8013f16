use std::path::{Path, PathBuf};

use anyhow::Context;
use tracestats::cancel::CancelToken;
use tracestats::config::TracestatsConfig;
use tracestats::dispatch::{Dispatcher, TraceJob, TraceOutcome};
use tracestats::dump::{ApitraceSource, DumpTool, extract_blobs};
use tracestats::record;
use tracestats::stats::AggregatedResult;
use tracestats::styling::{
    BOLD, INFO_EMOJI, eprintln, format_error, format_success, format_warning, println,
};
use tracestats::trace::ApiVariant;
use tracestats::{TraceStatsError, ToolFailure};

/// Command-line inputs of `tracestats parse`, layered over the config.
#[derive(Debug, Default)]
pub struct ParseOptions {
    pub traces: Vec<PathBuf>,
    pub threads: Option<usize>,
    pub output: Option<PathBuf>,
    pub name: Option<String>,
    pub link: Option<String>,
    pub skip_apis: Vec<ApiVariant>,
    pub apitrace: Option<PathBuf>,
    pub api: Option<ApiVariant>,
    pub shader_dump: Option<PathBuf>,
    pub timeout: Option<u64>,
    pub chunk_calls: Option<u64>,
}

impl ParseOptions {
    fn apply_to(&self, config: &mut TracestatsConfig) {
        if let Some(threads) = self.threads {
            config.threads = Some(threads);
        }
        if let Some(output) = &self.output {
            config.output = output.clone();
        }
        if let Some(apitrace) = &self.apitrace {
            config.apitrace = Some(apitrace.clone());
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = Some(timeout);
        }
        if let Some(chunk_calls) = self.chunk_calls {
            config.chunk_calls = chunk_calls;
        }
        for api in &self.skip_apis {
            if !config.skip_apis.contains(api) {
                config.skip_apis.push(api.clone());
            }
        }
    }

    fn job(&self, trace: &Path) -> TraceJob {
        let mut job = TraceJob::for_trace(trace).with_api(self.api.clone());
        job.display_name = self.name.clone();
        job.link = self.link.clone();
        job
    }
}

/// Parse every trace and write one document.
///
/// Returns `Ok(false)` when at least one trace failed; each failure has
/// already been reported by then.
pub fn handle_parse(
    options: ParseOptions,
    mut config: TracestatsConfig,
    cancel: CancelToken,
) -> anyhow::Result<bool> {
    options.apply_to(&mut config);
    if config.threads == Some(0) {
        return Err(TraceStatsError::InvalidArguments {
            message: "--threads must be at least 1".into(),
        }
        .into());
    }
    if config.chunk_calls == 0 {
        return Err(TraceStatsError::InvalidArguments {
            message: "--chunk-calls must be at least 1".into(),
        }
        .into());
    }

    let timeout = config.timeout();
    let tool = DumpTool::locate(config.apitrace.as_deref())?;
    let version = tool.check_version(timeout)?;
    log::info!(
        "Using apitrace {version} at {}",
        tool.executable().display()
    );

    let dispatch_options = config.dispatch_options();
    log::debug!(
        "{} workers, {} calls per window",
        dispatch_options.threads,
        dispatch_options.chunk_calls
    );
    let dispatcher = Dispatcher::new(dispatch_options, cancel.clone())?;

    let mut results: Vec<AggregatedResult> = Vec::new();
    let mut failures = 0usize;

    for trace in &options.traces {
        if cancel.is_cancelled() {
            eprintln!("{}", format_error("Interrupted; remaining traces not parsed"));
            failures += 1;
            break;
        }
        if !trace.is_file() {
            let err = TraceStatsError::TraceNotFound {
                path: trace.clone(),
            };
            eprintln!("{}", format_error(&err.to_string()));
            failures += 1;
            continue;
        }

        let source = ApitraceSource::new(tool.clone(), trace, timeout);
        match dispatcher.process(&options.job(trace), &source) {
            Ok(TraceOutcome::Parsed(result)) => {
                println!(
                    "{}",
                    format_success(&format!(
                        "Parsed {BOLD}{}{BOLD:#}: {} calls",
                        result.identity.key(),
                        result.total_calls()
                    ))
                );
                if let Some(dir) = &options.shader_dump
                    && let Err(e) = dump_shaders(&tool, trace, dir, timeout, &cancel)
                {
                    eprintln!("{}", format_error(&e.to_string()));
                    failures += 1;
                }
                results.push(result);
            }
            Ok(TraceOutcome::Skipped { api }) => {
                println!(
                    "{}",
                    format_warning(&format!("Skipped {}: {api} traces are excluded", trace.display()))
                );
            }
            Err(e) => {
                eprintln!("{}", format_error(&e.to_string()));
                failures += 1;
            }
        }
    }

    if results.is_empty() {
        println!("{INFO_EMOJI} No statistics to write");
    } else {
        record::write_document(&config.output, &results)
            .with_context(|| format!("Failed to write {}", config.output.display()))?;
        println!(
            "{}",
            format_success(&format!(
                "Wrote {} trace{} to {BOLD}{}{BOLD:#}",
                results.len(),
                if results.len() == 1 { "" } else { "s" },
                config.output.display()
            ))
        );
    }

    Ok(failures == 0)
}

fn dump_shaders(
    tool: &DumpTool,
    trace: &Path,
    dir: &Path,
    timeout: Option<std::time::Duration>,
    cancel: &CancelToken,
) -> tracestats::Result<()> {
    if dir.exists() && !dir.is_dir() {
        return Err(TraceStatsError::ToolInvocation {
            target: trace.to_path_buf(),
            command: "apitrace dump --blobs".into(),
            failure: ToolFailure::Io {
                message: format!("{} is not a directory", dir.display()),
            },
        });
    }
    let extracted = extract_blobs(tool, trace, dir, timeout, cancel)?;
    println!(
        "{INFO_EMOJI} Extracted {extracted} blob{} to {}",
        if extracted == 1 { "" } else { "s" },
        dir.display()
    );
    Ok(())
}
