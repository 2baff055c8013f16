//! The `apitrace` command line tool as a dump source.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use super::{CallRange, DumpLines, DumpSource};
use crate::cancel::CancelToken;
use crate::error::{Result, ToolFailure, TraceStatsError};
use crate::shell_exec::{self, LineStream, StreamError};

const TOOL_NAME: &str = "apitrace";
const MIN_MAJOR_VERSION: u32 = 12;

/// A resolved dump tool executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpTool {
    program: PathBuf,
    /// Windows builds on other hosts run through `wine`
    wrapper: Option<PathBuf>,
}

impl DumpTool {
    /// Resolve the tool from an explicit path, or find `apitrace` on `PATH`.
    pub fn locate(explicit: Option<&Path>) -> Result<Self> {
        let program = match explicit {
            Some(path) if path.is_file() => path.to_path_buf(),
            Some(path) => {
                return Err(TraceStatsError::ToolNotFound {
                    tool: path.display().to_string(),
                });
            }
            None => which::which(TOOL_NAME).map_err(|_| TraceStatsError::ToolNotFound {
                tool: TOOL_NAME.to_string(),
            })?,
        };
        Ok(Self::new(program))
    }

    pub fn new(program: PathBuf) -> Self {
        let is_exe = program
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("exe"));
        let wrapper = (is_exe && !cfg!(windows)).then(|| PathBuf::from("wine"));
        Self { program, wrapper }
    }

    pub fn executable(&self) -> &Path {
        &self.program
    }

    /// A fresh command for the tool, wrapper included.
    pub fn command(&self) -> Command {
        match &self.wrapper {
            Some(wrapper) => {
                let mut cmd = Command::new(wrapper);
                cmd.arg(&self.program);
                cmd
            }
            None => Command::new(&self.program),
        }
    }

    /// Run `<tool> version` and require apitrace 12 or newer.
    ///
    /// Returns the reported version string (`"12.0"`). The tool is killed
    /// after `timeout`, like any dump.
    pub fn check_version(&self, timeout: Option<Duration>) -> Result<String> {
        let mut cmd = self.command();
        cmd.arg("version");
        let stream = spawn_stream(cmd, "version", &self.program, timeout, &CancelToken::new())?;
        let command = stream.command().to_string();
        let mut lines = Vec::new();
        for item in stream {
            lines.push(item.map_err(|e| stream_error(e, &self.program, &command))?);
        }

        let stdout = lines.join("\n");
        let unsupported = || TraceStatsError::UnsupportedTool {
            tool: self.program.clone(),
            version: stdout.trim().to_string(),
        };
        let (version, major) = parse_version(&stdout).ok_or_else(unsupported)?;
        if major < MIN_MAJOR_VERSION {
            return Err(unsupported());
        }
        log::debug!("Using {} version {version}", self.program.display());
        Ok(version.to_string())
    }
}

/// Parse `apitrace <major>.<minor>` into the version text and its major number.
fn parse_version(output: &str) -> Option<(&str, u32)> {
    let mut words = output.split_whitespace();
    if words.next()? != TOOL_NAME {
        return None;
    }
    let version = words.next()?;
    let major = version.split('.').next()?.parse().ok()?;
    Some((version, major))
}

/// Dumps call ranges of one trace file with `apitrace dump --calls=A-B`.
#[derive(Debug, Clone)]
pub struct ApitraceSource {
    tool: DumpTool,
    trace: PathBuf,
    timeout: Option<Duration>,
}

impl ApitraceSource {
    pub fn new(tool: DumpTool, trace: impl Into<PathBuf>, timeout: Option<Duration>) -> Self {
        Self {
            tool,
            trace: trace.into(),
            timeout,
        }
    }
}

impl DumpSource for ApitraceSource {
    fn trace_path(&self) -> &Path {
        &self.trace
    }

    fn open(&self, range: CallRange, cancel: &CancelToken) -> Result<DumpLines> {
        let mut cmd = self.tool.command();
        cmd.arg("dump").arg(format!("--calls={range}")).arg(&self.trace);

        let context = format!("calls {range}");
        let stream = spawn_stream(cmd, &context, &self.trace, self.timeout, cancel)?;
        let trace = self.trace.clone();
        let command = stream.command().to_string();
        Ok(Box::new(stream.map(move |item| {
            item.map_err(|e| stream_error(e, &trace, &command))
        })))
    }
}

fn spawn_stream(
    cmd: Command,
    context: &str,
    trace: &Path,
    timeout: Option<Duration>,
    cancel: &CancelToken,
) -> Result<LineStream> {
    let command = shell_exec::command_string(&cmd);
    LineStream::spawn(cmd, Some(context), timeout, cancel.clone()).map_err(|e| {
        TraceStatsError::ToolInvocation {
            target: trace.to_path_buf(),
            command,
            failure: ToolFailure::Spawn {
                message: e.to_string(),
            },
        }
    })
}

fn stream_error(error: StreamError, trace: &Path, command: &str) -> TraceStatsError {
    match error {
        StreamError::Cancelled => TraceStatsError::Cancelled {
            trace: trace.to_path_buf(),
        },
        StreamError::Failed(failure) => TraceStatsError::ToolInvocation {
            target: trace.to_path_buf(),
            command: command.to_string(),
            failure,
        },
    }
}

fn count_files(dir: &Path) -> std::io::Result<usize> {
    let mut count = 0;
    for entry in std::fs::read_dir(dir)? {
        if entry?.file_type()?.is_file() {
            count += 1;
        }
    }
    Ok(count)
}

/// Extract shaders and other binary blobs with `apitrace dump --blobs`.
///
/// The tool writes into its working directory, so it runs inside `out_dir`.
/// The text output is drained and discarded; the number of files the run
/// added to `out_dir` is returned.
pub fn extract_blobs(
    tool: &DumpTool,
    trace: &Path,
    out_dir: &Path,
    timeout: Option<Duration>,
    cancel: &CancelToken,
) -> Result<usize> {
    let io_failure = |e: std::io::Error| TraceStatsError::ToolInvocation {
        target: trace.to_path_buf(),
        command: format!("{TOOL_NAME} dump --blobs"),
        failure: ToolFailure::Io {
            message: format!("{}: {e}", out_dir.display()),
        },
    };

    std::fs::create_dir_all(out_dir).map_err(io_failure)?;
    let trace_abs = std::path::absolute(trace).map_err(io_failure)?;
    let before = count_files(out_dir).map_err(io_failure)?;

    let mut cmd = tool.command();
    cmd.arg("dump").arg("--blobs").arg(&trace_abs).current_dir(out_dir);
    let stream = spawn_stream(cmd, "blobs", trace, timeout, cancel)?;
    let command = stream.command().to_string();
    for item in stream {
        item.map_err(|e| stream_error(e, trace, &command))?;
    }

    let after = count_files(out_dir).map_err(io_failure)?;
    Ok(after.saturating_sub(before))
}
