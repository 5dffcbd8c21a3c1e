//! Client for the external recommendation worker process.
//!
//! Every call spawns one fresh worker, hands it a JSON payload on stdin and
//! collects what it writes back. It handles:
//! - Selecting the worker's computation with a mode argument
//! - Writing the payload and closing stdin so the worker sees end-of-input
//! - Draining stdout and stderr concurrently
//! - Deciding the outcome once stdout reaches end-of-stream, even if the
//!   worker is still running
//!
//! The worker's exit code is never consulted: a call fails if and only if
//! the worker wrote anything to stderr (or reading its output broke).

use std::fmt;
use std::io;
use std::process::Stdio;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tracing::{debug, info, warn};

/// The computation a worker invocation performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerMode {
    /// Side-effecting ingestion of the catalog; produces no output
    Ingest,
    /// Compute recommendations; produces a JSON object on stdout
    Recommend,
}

impl WorkerMode {
    /// The discriminator passed as the worker's last argument.
    pub fn as_arg(&self) -> &'static str {
        match self {
            WorkerMode::Ingest => "ingest",
            WorkerMode::Recommend => "recommend",
        }
    }
}

impl fmt::Display for WorkerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_arg())
    }
}

/// Errors that can occur when invoking the worker
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to spawn worker '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to encode {mode} payload: {source}")]
    Encode {
        mode: WorkerMode,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error talking to {mode} worker: {source}")]
    Io {
        mode: WorkerMode,
        #[source]
        source: io::Error,
    },

    /// The worker wrote to stderr; `message` is that text, verbatim
    #[error("Worker failed in {mode} mode: {message}")]
    Reported { mode: WorkerMode, message: String },

    #[error("Malformed output from {mode} worker: {reason}")]
    MalformedOutput { mode: WorkerMode, reason: String },

    #[error("{mode} worker did not finish within {limit:?}")]
    Timeout { mode: WorkerMode, limit: Duration },
}

/// How to launch the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    pub program: String,
    /// Arguments placed before the mode discriminator
    pub args: Vec<String>,
    /// Kill the worker and fail with `Timeout` after this long
    pub timeout: Option<Duration>,
}

impl WorkerConfig {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: None,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// How long stderr keeps draining after stdout has closed. A worker that
/// exited closes stderr at once; one that holds stderr open is judged on
/// what arrived within this window.
const STDERR_GRACE: Duration = Duration::from_millis(100);

/// Everything observed from one worker run, before the verdict.
#[derive(Debug, Default)]
struct Transcript {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    /// Writing the payload failed, e.g. the worker exited without reading
    input_error: Option<io::Error>,
}

impl Transcript {
    /// The single point where a run's outcome is decided.
    ///
    /// Only stderr content fails a run. A worker that exits without reading
    /// its payload is logged and otherwise judged like any other.
    fn settle(self, mode: WorkerMode) -> Result<Vec<u8>, WorkerError> {
        if !self.stderr.is_empty() {
            return Err(WorkerError::Reported {
                mode,
                message: String::from_utf8_lossy(&self.stderr).into_owned(),
            });
        }
        if let Some(e) = self.input_error {
            warn!("{} worker did not take its whole payload: {}", mode, e);
        }
        Ok(self.stdout)
    }
}

/// Spawns worker processes, one per call. Holds configuration only, so it
/// can be shared freely between concurrent callers.
#[derive(Debug, Clone)]
pub struct ProcessPipeline {
    config: WorkerConfig,
}

impl ProcessPipeline {
    pub fn new(config: WorkerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Run the worker for its side effect; its stdout is ignored.
    pub async fn invoke<P>(&self, mode: WorkerMode, payload: &P) -> Result<(), WorkerError>
    where
        P: Serialize + ?Sized,
    {
        let stdout = self.exchange(mode, payload).await?;
        if !stdout.is_empty() {
            debug!("Discarding {} bytes of {} worker output", stdout.len(), mode);
        }
        Ok(())
    }

    /// Run the worker and parse its stdout as `R`.
    pub async fn invoke_for_result<P, R>(&self, mode: WorkerMode, payload: &P) -> Result<R, WorkerError>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let stdout = self.exchange(mode, payload).await?;
        serde_json::from_slice(&stdout).map_err(|e| WorkerError::MalformedOutput {
            mode,
            reason: e.to_string(),
        })
    }

    /// One complete worker run: spawn, feed, drain, settle.
    async fn exchange<P>(&self, mode: WorkerMode, payload: &P) -> Result<Vec<u8>, WorkerError>
    where
        P: Serialize + ?Sized,
    {
        let input = serde_json::to_vec(payload).map_err(|source| WorkerError::Encode { mode, source })?;
        let start_time = Instant::now();

        let mut child = Command::new(&self.config.program)
            .args(&self.config.args)
            .arg(mode.as_arg())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| WorkerError::Spawn {
                program: self.config.program.clone(),
                source,
            })?;
        debug!(
            "Spawned {} worker (pid {:?}) with {} byte payload",
            mode,
            child.id(),
            input.len()
        );

        let (stdin, stdout, stderr) = match (child.stdin.take(), child.stdout.take(), child.stderr.take()) {
            (Some(stdin), Some(stdout), Some(stderr)) => (stdin, stdout, stderr),
            _ => {
                return Err(WorkerError::Io {
                    mode,
                    source: io::Error::other("worker channels were not captured"),
                });
            }
        };

        let conversation = converse(stdin, &input, stdout, stderr);
        let transcript = match self.config.timeout {
            None => conversation.await,
            Some(limit) => match tokio::time::timeout(limit, conversation).await {
                Ok(transcript) => transcript,
                Err(_) => {
                    warn!("{} worker exceeded {:?}; killing it", mode, limit);
                    if let Err(e) = child.kill().await {
                        warn!("Failed to kill {} worker: {}", mode, e);
                    }
                    return Err(WorkerError::Timeout { mode, limit });
                }
            },
        }
        .map_err(|source| WorkerError::Io { mode, source })?;

        log_exit(&mut child, mode);
        info!(
            "{} worker finished in {:.2?} (stdout {} bytes, stderr {} bytes)",
            mode,
            start_time.elapsed(),
            transcript.stdout.len(),
            transcript.stderr.len()
        );
        transcript.settle(mode)
    }
}

/// Feed stdin while draining both output channels.
///
/// Returns as soon as stdout reaches end-of-stream, with whatever stderr
/// holds once [`STDERR_GRACE`] has passed or stderr has closed. A payload
/// write still pending at that point is abandoned; a failed one is recorded
/// in the transcript for logging.
async fn converse<O, E>(stdin: ChildStdin, input: &[u8], stdout: O, mut stderr: E) -> io::Result<Transcript>
where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
{
    let mut stderr_text = Vec::new();
    let (stdout, input_error) = {
        let writing = feed(stdin, input);
        let stdout_drain = drain(stdout);
        let stderr_drain = drain_into(&mut stderr, &mut stderr_text);
        tokio::pin!(writing, stdout_drain, stderr_drain);

        let mut written: Option<io::Result<()>> = None;
        let mut stderr_closed = false;
        let stdout = loop {
            tokio::select! {
                output = &mut stdout_drain => break output?,
                result = &mut writing, if written.is_none() => written = Some(result),
                result = &mut stderr_drain, if !stderr_closed => {
                    stderr_closed = true;
                    result?;
                }
            }
        };

        if !stderr_closed {
            match tokio::time::timeout(STDERR_GRACE, &mut stderr_drain).await {
                Ok(result) => result?,
                Err(_) => debug!("Worker still holds stderr open after closing stdout"),
            }
        }
        let input_error = match written {
            Some(result) => result.err(),
            None => {
                debug!("Worker closed stdout before taking all of its input");
                None
            }
        };
        (stdout, input_error)
    };

    Ok(Transcript {
        stdout,
        stderr: stderr_text,
        input_error,
    })
}

async fn feed(mut stdin: ChildStdin, input: &[u8]) -> io::Result<()> {
    stdin.write_all(input).await?;
    stdin.shutdown().await?;
    // Dropping the handle closes the pipe: the worker sees end-of-input.
    drop(stdin);
    Ok(())
}

async fn drain(mut stream: impl AsyncRead + Unpin) -> io::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    stream.read_to_end(&mut buffer).await?;
    Ok(buffer)
}

/// Append everything `stream` yields to `buffer`. Bytes read before the
/// future is dropped stay in `buffer`.
async fn drain_into<R>(stream: &mut R, buffer: &mut Vec<u8>) -> io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0_u8; 4096];
    loop {
        let read = stream.read(&mut chunk).await?;
        if read == 0 {
            return Ok(());
        }
        buffer.extend_from_slice(&chunk[..read]);
    }
}

/// Log the exit status if the worker is already gone. The status never
/// affects the outcome; a worker still running is killed on drop.
fn log_exit(child: &mut Child, mode: WorkerMode) {
    match child.try_wait() {
        Ok(Some(status)) => debug!("{} worker exited with {}", mode, status),
        Ok(None) => debug!("{} worker closed its output but is still running", mode),
        Err(e) => debug!("Could not query {} worker status: {}", mode, e),
    }
}
