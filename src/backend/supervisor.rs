//! Supervision of a local backend server process
//!
//! An artifact is launched as a child process and its combined stdout/stderr is scanned
//! line by line for a readiness marker. The wait is always bounded: if the child exits
//! first or the timeout elapses, the child is killed and reaped before the error is
//! returned, so no backend outlives a failed launch.
//!
//! Once ready, scanning stops but the pipes are still drained by a background task, so a
//! chatty backend never blocks on a full pipe. Drained lines go to the
//! `localbox::backend::output` log target and into a bounded buffer that drops lines
//! when nobody reads them.
//!
//! ```text
//! Starting ──marker seen──▶ Ready
//!    │ ├────output closed──▶ Failed
//!    │ └────timeout────────▶ TimedOut
//! ```

use crate::progress::{ProgressEvent, ProgressHandler};
use std::ffi::OsStr;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::SplitStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info, warn};

/// How long a child that closed its output gets to exit on its own before being killed
const EXIT_GRACE: Duration = Duration::from_millis(500);

/// Lines kept for [`SupervisedProcess::next_output_line`] before newer ones are dropped
const OUTPUT_BUFFER_LINES: usize = 256;

const OUTPUT_TARGET: &str = "localbox::backend::output";

/// Combined output of the child, one decoded line per item
pub type OutputLines = Pin<Box<dyn Stream<Item = io::Result<String>> + Send>>;

/// Lifecycle of a supervised launch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Starting,
    Ready,
    Failed,
    TimedOut,
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SupervisorState::Starting => write!(f, "starting"),
            SupervisorState::Ready => write!(f, "ready"),
            SupervisorState::Failed => write!(f, "failed"),
            SupervisorState::TimedOut => write!(f, "timed out"),
        }
    }
}

/// Errors from launching a backend process
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The executable could not be spawned
    #[error("Failed to start {}: {source}", .path.display())]
    Launch {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The process closed its output before printing the readiness marker
    #[error("Backend process {pid} exited before becoming ready{}", exit_suffix(.exit_code, .last_output))]
    ExitedBeforeReady {
        pid: u32,
        exit_code: Option<i32>,
        last_output: Option<String>,
    },

    /// The readiness marker did not appear in time
    #[error("Backend process {pid} did not become ready within {}s", .timeout.as_secs_f64())]
    ReadinessTimeout { pid: u32, timeout: Duration },

    /// A zero timeout was supplied
    #[error("Readiness timeout must be greater than zero")]
    InvalidTimeout,
}

fn exit_suffix(exit_code: &Option<i32>, last_output: &Option<String>) -> String {
    let mut suffix = String::new();
    if let Some(code) = exit_code {
        suffix.push_str(&format!(" (exit code {})", code));
    }
    if let Some(line) = last_output {
        suffix.push_str(&format!("; last output: {}", line));
    }
    suffix
}

impl SupervisorError {
    /// Terminal state the launch ended in
    pub fn state(&self) -> SupervisorState {
        match self {
            SupervisorError::ReadinessTimeout { .. } => SupervisorState::TimedOut,
            _ => SupervisorState::Failed,
        }
    }

    /// Process id of the child that was terminated, if one was spawned
    pub fn pid(&self) -> Option<u32> {
        match self {
            SupervisorError::ExitedBeforeReady { pid, .. }
            | SupervisorError::ReadinessTimeout { pid, .. } => Some(*pid),
            _ => None,
        }
    }
}

/// A backend process that printed its readiness marker.
///
/// The process keeps running for as long as this handle lives; dropping the handle kills
/// it. Output after the marker is drained continuously; the oldest unread lines are
/// available from [`next_output_line`](Self::next_output_line).
pub struct SupervisedProcess {
    child: Child,
    pid: u32,
    output: mpsc::Receiver<String>,
    drain: JoinHandle<()>,
    ready_line: String,
    startup_time: Duration,
}

impl fmt::Debug for SupervisedProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupervisedProcess")
            .field("pid", &self.pid)
            .field("ready_line", &self.ready_line)
            .field("startup_time", &self.startup_time)
            .finish()
    }
}

impl Drop for SupervisedProcess {
    fn drop(&mut self) {
        self.drain.abort();
    }
}

impl SupervisedProcess {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// A handle only exists once the marker was seen
    pub fn is_ready(&self) -> bool {
        true
    }

    pub fn state(&self) -> SupervisorState {
        SupervisorState::Ready
    }

    /// The output line that contained the readiness marker
    pub fn ready_line(&self) -> &str {
        &self.ready_line
    }

    /// Time from spawn to readiness
    pub fn startup_time(&self) -> Duration {
        self.startup_time
    }

    /// Exit code if the process has already exited
    pub fn exit_code(&mut self) -> Option<i32> {
        match self.child.try_wait() {
            Ok(Some(status)) => status.code(),
            _ => None,
        }
    }

    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Next buffered line the process wrote after becoming ready.
    ///
    /// Returns `None` once the process closed its output and the buffer is empty.
    pub async fn next_output_line(&mut self) -> Option<String> {
        self.output.recv().await
    }

    /// Wait for the process to exit on its own
    pub async fn wait(&mut self) -> io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Kill the process and wait until it is gone
    pub async fn terminate(mut self) -> Option<i32> {
        info!(pid = self.pid, "Stopping backend process");
        terminate_child(&mut self.child, Duration::ZERO).await
    }
}

/// Launches backend processes and waits for them to become ready
pub struct ProcessSupervisor;

impl ProcessSupervisor {
    /// Spawn `executable` with `args` and wait for a line containing `ready_marker`.
    ///
    /// Returns once the marker is seen; no further output is read. If the output closes
    /// first the launch fails with [`SupervisorError::ExitedBeforeReady`]; if `timeout`
    /// elapses first it fails with [`SupervisorError::ReadinessTimeout`]. In both cases
    /// the child has been killed and reaped when this returns.
    pub async fn launch<S: AsRef<OsStr>>(
        executable: &Path,
        args: &[S],
        ready_marker: &str,
        timeout: Duration,
        progress: &dyn ProgressHandler,
    ) -> Result<SupervisedProcess, SupervisorError> {
        if timeout.is_zero() {
            return Err(SupervisorError::InvalidTimeout);
        }

        let mut child = Command::new(executable)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SupervisorError::Launch {
                path: executable.to_path_buf(),
                source,
            })?;

        let pid = child.id().unwrap_or_default();
        let started = Instant::now();
        debug!(pid, state = %SupervisorState::Starting, "Spawned {}", executable.display());
        progress.on_progress(&ProgressEvent::LaunchStarted {
            executable: executable.to_path_buf(),
            pid,
        });

        let mut output: OutputLines =
            Box::pin(line_stream(child.stdout.take()).merge(line_stream(child.stderr.take())));

        let scan = tokio::time::timeout(timeout, wait_for_marker(&mut output, ready_marker)).await;

        let error = match scan {
            Ok(ScanOutcome::Ready(ready_line)) => {
                let startup_time = started.elapsed();
                info!(
                    pid,
                    startup_ms = startup_time.as_millis(),
                    "Backend is {}: {}",
                    SupervisorState::Ready,
                    ready_line
                );
                progress.on_progress(&ProgressEvent::BackendReady {
                    pid,
                    elapsed: startup_time,
                });

                let (sender, receiver) = mpsc::channel(OUTPUT_BUFFER_LINES);
                let drain = tokio::spawn(drain_output(pid, output, sender));

                return Ok(SupervisedProcess {
                    child,
                    pid,
                    output: receiver,
                    drain,
                    ready_line,
                    startup_time,
                });
            }
            Ok(ScanOutcome::Closed { last_line }) => {
                drop(output);
                let exit_code = terminate_child(&mut child, EXIT_GRACE).await;
                SupervisorError::ExitedBeforeReady {
                    pid,
                    exit_code,
                    last_output: last_line,
                }
            }
            Err(_elapsed) => {
                drop(output);
                terminate_child(&mut child, Duration::ZERO).await;
                SupervisorError::ReadinessTimeout { pid, timeout }
            }
        };

        warn!(pid, state = %error.state(), "Backend launch failed: {}", error);
        progress.on_progress(&ProgressEvent::LaunchFailed {
            error: error.to_string(),
        });

        Err(error)
    }
}

enum ScanOutcome {
    Ready(String),
    Closed { last_line: Option<String> },
}

async fn wait_for_marker(output: &mut OutputLines, ready_marker: &str) -> ScanOutcome {
    let mut last_line = None;

    while let Some(line) = output.next().await {
        match line {
            Ok(line) => {
                debug!(target: OUTPUT_TARGET, "{}", line);
                if line.contains(ready_marker) {
                    return ScanOutcome::Ready(line);
                }
                if !line.trim().is_empty() {
                    last_line = Some(line);
                }
            }
            Err(e) => {
                debug!("Error reading backend output: {}", e);
            }
        }
    }

    ScanOutcome::Closed { last_line }
}

/// Keep reading the pipes after readiness until the process closes them
async fn drain_output(pid: u32, mut output: OutputLines, buffer: mpsc::Sender<String>) {
    let mut dropped: u64 = 0;

    while let Some(line) = output.next().await {
        match line {
            Ok(line) => {
                debug!(target: OUTPUT_TARGET, pid, "{}", line);
                if buffer.try_send(line).is_err() {
                    dropped += 1;
                }
            }
            Err(e) => debug!(pid, "Error reading backend output: {}", e),
        }
    }

    debug!(pid, dropped, "Backend output closed");
}

/// Split a pipe into lines, decoding lossily so stray bytes never stall the scan
fn line_stream<R>(reader: Option<R>) -> OutputLines
where
    R: AsyncRead + Send + Unpin + 'static,
{
    match reader {
        Some(reader) => Box::pin(
            SplitStream::new(BufReader::new(reader).split(b'\n'))
                .map(|segment| segment.map(|bytes| decode_line(&bytes))),
        ),
        None => Box::pin(tokio_stream::empty()),
    }
}

fn decode_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches('\r')
        .to_string()
}

/// Kill (after an optional grace period) and reap the child, returning its exit code
async fn terminate_child(child: &mut Child, grace: Duration) -> Option<i32> {
    if let Ok(Some(status)) = child.try_wait() {
        return status.code();
    }

    if !grace.is_zero() {
        if let Ok(Ok(status)) = tokio::time::timeout(grace, child.wait()).await {
            return status.code();
        }
    }

    if let Err(e) = child.start_kill() {
        debug!("Kill signal not delivered: {}", e);
    }

    match child.wait().await {
        Ok(status) => status.code(),
        Err(e) => {
            warn!("Failed to reap backend process: {}", e);
            None
        }
    }
}
