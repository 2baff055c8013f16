//! Subprocess execution for the dump tool
//!
//! All external commands go through [`LineStream`], so logging and timing are
//! consistent. It spawns a command and yields its stdout one line at a time
//! (`apitrace version`, `apitrace dump`). A watchdog thread kills the child on
//! timeout or cancellation until the child has been reaped, so neither a
//! blocked read nor a child that closed stdout and kept running can hang.
//!
//! ```text
//! $ apitrace dump --calls=0-499999 game.trace [worker 0]
//! [ts-trace] context=worker 0 cmd="apitrace dump ..." dur=812.4ms ok=true
//! ```

use std::io::{BufRead, BufReader};
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel as chan;

use crate::cancel::CancelToken;
use crate::error::ToolFailure;

/// How often the watchdog checks the cancel token and the deadline.
const WATCHDOG_POLL: Duration = Duration::from_millis(25);

const KILL_NONE: u8 = 0;
const KILL_TIMEOUT: u8 = 1;
const KILL_CANCEL: u8 = 2;

/// Render a command as a shell-like string for logs and error messages.
pub fn command_string(cmd: &Command) -> String {
    let program = cmd.get_program().to_string_lossy();
    let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy()).collect();
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}

fn log_start(cmd_str: &str, context: Option<&str>) {
    match context {
        Some(ctx) => log::debug!("$ {} [{}]", cmd_str, ctx),
        None => log::debug!("$ {}", cmd_str),
    }
}

fn log_finish(cmd_str: &str, context: Option<&str>, started: Instant, outcome: Result<bool, &str>) {
    let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
    let context = context.map(|ctx| format!("context={ctx} ")).unwrap_or_default();
    match outcome {
        Ok(success) => log::debug!(
            "[ts-trace] {}cmd=\"{}\" dur={:.1}ms ok={}",
            context,
            cmd_str,
            duration_ms,
            success
        ),
        Err(e) => log::debug!(
            "[ts-trace] {}cmd=\"{}\" dur={:.1}ms err=\"{}\"",
            context,
            cmd_str,
            duration_ms,
            e
        ),
    }
}

/// Map a finished child's exit status to a failure, if any.
pub fn status_failure(status: ExitStatus) -> Option<ToolFailure> {
    #[cfg(unix)]
    if let Some(signal) = std::os::unix::process::ExitStatusExt::signal(&status) {
        return Some(ToolFailure::Signal { signal });
    }

    if status.success() {
        None
    } else {
        Some(ToolFailure::Exit {
            code: status.code().unwrap_or(1),
        })
    }
}

/// Kill a streamed child together with anything it spawned.
///
/// On Unix the child leads its own process group (wine and shell wrappers fork
/// the real tool), so the whole group is killed; otherwise only the child.
fn kill_tree(child: &mut Child) {
    #[cfg(unix)]
    {
        let pgid = nix::unistd::Pid::from_raw(child.id() as i32);
        let _ = nix::sys::signal::killpg(pgid, nix::sys::signal::Signal::SIGKILL);
    }
    let _ = child.kill();
}

/// Why a [`LineStream`] stopped early.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    Cancelled,
    Failed(ToolFailure),
}

struct Watchdog {
    stop: chan::Sender<()>,
    handle: JoinHandle<()>,
}

impl Watchdog {
    fn spawn(
        child: Arc<Mutex<Child>>,
        timeout: Option<Duration>,
        cancel: CancelToken,
        killed: Arc<AtomicU8>,
    ) -> Self {
        let (stop, stopped) = chan::bounded::<()>(1);
        let handle = std::thread::spawn(move || {
            let deadline = timeout.map(|t| Instant::now() + t);
            loop {
                match stopped.recv_timeout(WATCHDOG_POLL) {
                    Err(chan::RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(chan::RecvTimeoutError::Disconnected) => return,
                }

                let reason = if cancel.is_cancelled() {
                    KILL_CANCEL
                } else if deadline.is_some_and(|d| Instant::now() >= d) {
                    KILL_TIMEOUT
                } else {
                    continue;
                };

                let mut child = child.lock().unwrap_or_else(PoisonError::into_inner);
                // Already reaped: the pid may belong to someone else by now
                if matches!(child.try_wait(), Ok(Some(_))) {
                    return;
                }
                killed.store(reason, Ordering::SeqCst);
                kill_tree(&mut child);
                return;
            }
        });
        Self { stop, handle }
    }

    fn stop(self) {
        drop(self.stop);
        let _ = self.handle.join();
    }
}

/// A running command whose stdout is consumed lazily, line by line.
///
/// The stream is finite and not restartable. When stdout reaches EOF the child
/// is reaped and a non-zero exit, signal, timeout or cancellation is yielded
/// as a final `Err` item. Dropping the stream before the end kills and reaps
/// the child, so no process or pipe outlives it.
pub struct LineStream {
    reader: BufReader<ChildStdout>,
    child: Arc<Mutex<Child>>,
    watchdog: Option<Watchdog>,
    killed: Arc<AtomicU8>,
    timeout: Option<Duration>,
    cmd_str: String,
    context: Option<String>,
    started: Instant,
    buf: Vec<u8>,
    finished: bool,
}

impl LineStream {
    /// Spawn `cmd` with stdout piped, stdin and stderr discarded.
    pub fn spawn(
        mut cmd: Command,
        context: Option<&str>,
        timeout: Option<Duration>,
        cancel: CancelToken,
    ) -> std::io::Result<Self> {
        let cmd_str = command_string(&cmd);
        log_start(&cmd_str, context);

        #[cfg(unix)]
        std::os::unix::process::CommandExt::process_group(&mut cmd, 0);

        let started = Instant::now();
        let mut child = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .inspect_err(|e| log_finish(&cmd_str, context, started, Err(e.to_string().as_str())))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("child stdout was not captured"))?;

        let child = Arc::new(Mutex::new(child));
        let killed = Arc::new(AtomicU8::new(KILL_NONE));
        let watchdog = Watchdog::spawn(Arc::clone(&child), timeout, cancel, Arc::clone(&killed));

        Ok(Self {
            reader: BufReader::new(stdout),
            child,
            watchdog: Some(watchdog),
            killed,
            timeout,
            cmd_str,
            context: context.map(str::to_string),
            started,
            buf: Vec::new(),
            finished: false,
        })
    }

    pub fn command(&self) -> &str {
        &self.cmd_str
    }

    fn stop_watchdog(&mut self) {
        if let Some(watchdog) = self.watchdog.take() {
            watchdog.stop();
        }
    }

    /// Wait for the child while the watchdog can still kill it.
    fn wait_child(&self) -> std::io::Result<ExitStatus> {
        loop {
            {
                let mut child = self.child.lock().unwrap_or_else(PoisonError::into_inner);
                if let Some(status) = child.try_wait()? {
                    return Ok(status);
                }
            }
            std::thread::sleep(WATCHDOG_POLL);
        }
    }

    /// Reap the child after EOF (or a read error) and report how it ended.
    fn finish(&mut self, read_error: Option<std::io::Error>) -> Option<StreamError> {
        self.finished = true;

        if read_error.is_some() {
            let mut child = self.child.lock().unwrap_or_else(PoisonError::into_inner);
            kill_tree(&mut child);
        }
        let status = self.wait_child();
        self.stop_watchdog();

        let outcome = match self.killed.load(Ordering::SeqCst) {
            KILL_CANCEL => Some(StreamError::Cancelled),
            KILL_TIMEOUT => Some(StreamError::Failed(ToolFailure::TimedOut {
                after: self.timeout.unwrap_or_default(),
            })),
            _ => match (read_error, status) {
                (Some(e), _) => Some(StreamError::Failed(ToolFailure::Io {
                    message: e.to_string(),
                })),
                (None, Err(e)) => Some(StreamError::Failed(ToolFailure::Io {
                    message: e.to_string(),
                })),
                (None, Ok(status)) => status_failure(status).map(StreamError::Failed),
            },
        };

        let context = self.context.as_deref();
        match &outcome {
            None => log_finish(&self.cmd_str, context, self.started, Ok(true)),
            Some(StreamError::Cancelled) => {
                log_finish(&self.cmd_str, context, self.started, Err("cancelled"))
            }
            Some(StreamError::Failed(failure)) => log_finish(
                &self.cmd_str,
                context,
                self.started,
                Err(failure.to_string().as_str()),
            ),
        }
        outcome
    }
}

impl Iterator for LineStream {
    type Item = Result<String, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => self.finish(None).map(Err),
            Ok(_) => {
                while matches!(self.buf.last(), Some(b'\n' | b'\r')) {
                    self.buf.pop();
                }
                // Dumps embed raw string arguments; don't fail on non-UTF-8 bytes
                Some(Ok(String::from_utf8_lossy(&self.buf).into_owned()))
            }
            Err(e) => self.finish(Some(e)).map(Err),
        }
    }
}

impl Drop for LineStream {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        self.stop_watchdog();
        let mut child = self.child.lock().unwrap_or_else(PoisonError::into_inner);
        kill_tree(&mut child);
        let _ = child.wait();
    }
}
