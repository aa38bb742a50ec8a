//! Transcoder process execution with streamed diagnostics and cooperative
//! cancellation.

use std::collections::VecDeque;
use std::process::Stdio;
use std::time::Duration;
use anyhow::{anyhow, Context, Result};
use log::{debug, info, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio_util::sync::CancellationToken;
use crate::config::EngineConfig;
use crate::progress::parse_time_marker;

/// How a transcoder run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Succeeded,
    /// Exited non-zero (or was killed by a signal) without being cancelled
    Failed,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub exit_code: Option<i32>,
    /// Last diagnostic lines, oldest first
    pub diagnostic_tail: Vec<String>,
}

impl RunOutcome {
    pub fn diagnostics(&self) -> String {
        self.diagnostic_tail.join("\n")
    }
}

#[derive(Debug, Clone)]
pub struct RunnerOptions {
    /// Time a cancelled process gets to quit after the quit request
    pub terminate_grace: Duration,
    pub tail_lines: usize,
}

impl RunnerOptions {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            terminate_grace: Duration::from_secs(config.terminate_grace_secs),
            tail_lines: config.diagnostic_tail_lines,
        }
    }
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default_config())
    }
}

/// Splits a byte stream into lines on `\n` and `\r`.
///
/// ffmpeg redraws its status line with a bare carriage return, so `\r` has to
/// end a line too.
#[derive(Debug, Default)]
struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &b in bytes {
            if b == b'\n' || b == b'\r' {
                if !self.pending.is_empty() {
                    lines.push(String::from_utf8_lossy(&self.pending).to_string());
                    self.pending.clear();
                }
            } else {
                self.pending.push(b);
            }
        }
        lines
    }

    fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.pending).to_string();
        self.pending.clear();
        Some(line)
    }
}

struct DiagnosticTail {
    lines: VecDeque<String>,
    capacity: usize,
}

impl DiagnosticTail {
    fn new(capacity: usize) -> Self {
        Self { lines: VecDeque::with_capacity(capacity.min(256)), capacity }
    }

    fn push(&mut self, line: &str) {
        if self.capacity == 0 {
            return;
        }
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line.to_string());
    }

    fn into_vec(self) -> Vec<String> {
        self.lines.into()
    }
}

/// Run `args` (program first) to completion.
///
/// Every diagnostic line carrying a `time=` marker is reported through
/// `on_time` in elapsed seconds. Cancellation is checked between reads; a
/// cancelled process is asked to quit and killed if it outlives the grace
/// period. Spawn and I/O failures are errors; a non-zero exit is a
/// [`RunStatus::Failed`] outcome.
pub async fn run_command(
    args: &[String],
    options: &RunnerOptions,
    cancel: &CancellationToken,
    on_time: &mut (dyn FnMut(f64) + Send),
) -> Result<RunOutcome> {
    let (program, rest) = args.split_first().ok_or_else(|| anyhow!("Empty transcoder command"))?;

    debug!("Executing: {}", args.join(" "));

    let mut child = Command::new(program)
        .args(rest)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!(
            "Failed to spawn transcoder at: {}. Ensure it is installed and accessible.",
            program
        ))?;

    let stdin = child.stdin.take();
    let mut stderr = child.stderr.take()
        .ok_or_else(|| anyhow!("Failed to capture transcoder stderr"))?;

    let mut splitter = LineSplitter::default();
    let mut tail = DiagnosticTail::new(options.tail_lines);
    let mut handle_line = |line: &str, tail: &mut DiagnosticTail| {
        if let Some(elapsed) = parse_time_marker(line) {
            on_time(elapsed);
        }
        tail.push(line);
    };

    let mut chunk = [0u8; 4096];
    let mut cancelled = false;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                cancelled = true;
                break;
            }
            read = stderr.read(&mut chunk) => {
                let n = read.context("Failed to read transcoder diagnostics")?;
                if n == 0 {
                    break;
                }
                for line in splitter.push(&chunk[..n]) {
                    handle_line(&line, &mut tail);
                }
            }
        }
    }

    if let Some(line) = splitter.finish() {
        handle_line(&line, &mut tail);
    }

    let status = if cancelled {
        None
    } else {
        // Diagnostics closed; the process may still be flushing its output
        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            status = child.wait() => Some(status.context("Failed to wait for transcoder process")?),
        }
    };

    let Some(status) = status else {
        terminate(&mut child, stdin, options.terminate_grace).await?;
        return Ok(RunOutcome {
            status: RunStatus::Cancelled,
            exit_code: None,
            diagnostic_tail: tail.into_vec(),
        });
    };

    let exit_code = status.code();
    let run_status = if status.success() {
        RunStatus::Succeeded
    } else {
        warn!("Transcoder exited with code {}", exit_code.unwrap_or(-1));
        RunStatus::Failed
    };

    Ok(RunOutcome {
        status: run_status,
        exit_code,
        diagnostic_tail: tail.into_vec(),
    })
}

/// Ask the process to quit via its interactive `q` command, then kill it if
/// it is still running after `grace`.
async fn terminate(child: &mut Child, stdin: Option<ChildStdin>, grace: Duration) -> Result<()> {
    if let Some(mut stdin) = stdin {
        // The process may already have exited and closed its stdin
        if let Err(e) = stdin.write_all(b"q\n").await {
            debug!("Could not send quit request: {}", e);
        }
        drop(stdin);
    }

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(status) => {
            let status = status.context("Failed to wait for cancelled transcoder")?;
            info!("Transcoder stopped after cancellation ({})", status);
        }
        Err(_) => {
            warn!("Transcoder ignored quit request for {:?}, killing it", grace);
            child.kill().await.context("Failed to kill cancelled transcoder")?;
        }
    }
    Ok(())
}
