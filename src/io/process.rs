//! Build process coordinator
//!
//! Launches the external build tool, drains stdout and stderr through
//! independent stream pumps, waits for process exit and both pumps to
//! signal completion, and assembles the combined result exactly once.
//! stdout feeds the log pipeline; stderr bypasses classification.

use crate::format::pipeline::LogPipeline;
use crate::io::pump::{StreamPump, StreamSource};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

// ============================================================================
// Process State Management
// ============================================================================

/// Directories appended to the tool search path when absent
///
/// Build tools are commonly installed outside the default search path of
/// non-login shells.
const SUPPLEMENTARY_TOOL_DIRS: &[&str] = &["/usr/local/bin", "/opt/homebrew/bin"];

/// Process lifecycle states
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessState {
    /// Process has not been started yet
    NotStarted,
    /// Process is currently running
    Running { pid: u32 },
    /// Process has exited; stream pumps are still draining
    Draining { pid: u32 },
    /// Process exited and both streams reached EOF
    Exited { code: i32 },
}

impl ProcessState {
    /// Get the process ID if the process is alive or draining
    pub fn pid(&self) -> Option<u32> {
        match self {
            ProcessState::Running { pid } | ProcessState::Draining { pid } => Some(*pid),
            _ => None,
        }
    }

    /// Check if the process is currently running
    pub fn is_running(&self) -> bool {
        matches!(self, ProcessState::Running { .. })
    }
}

// ============================================================================
// Command Description
// ============================================================================

/// Description of one build tool invocation
#[derive(Debug, Clone)]
pub struct BuildCommand {
    /// Executable to launch (resolved through the search path)
    pub program: String,

    /// Command line arguments
    pub args: Vec<String>,

    /// Working directory for the process
    pub working_dir: Option<PathBuf>,

    /// Environment overrides, merged onto the inherited environment
    pub env: HashMap<String, String>,
}

impl BuildCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            env: HashMap::new(),
        }
    }
}

/// Append the supplementary tool directories to a search path
fn augmented_search_path(current: Option<&str>) -> String {
    let mut dirs: Vec<PathBuf> = current
        .map(|path| std::env::split_paths(path).collect())
        .unwrap_or_default();

    for dir in SUPPLEMENTARY_TOOL_DIRS {
        let dir = PathBuf::from(dir);
        if !dirs.contains(&dir) {
            dirs.push(dir);
        }
    }

    match std::env::join_paths(&dirs) {
        Ok(joined) => joined.to_string_lossy().into_owned(),
        Err(_) => current.unwrap_or_default().to_string(),
    }
}

// ============================================================================
// Run Result
// ============================================================================

/// Combined output of a completed, successful build run
#[derive(Debug, Clone)]
pub struct BuildOutput {
    /// Combined stdout text, trimmed
    pub stdout: String,

    /// Combined stderr text
    pub stderr: String,

    /// Process exit code
    pub code: i32,
}

/// Error types for the build runner
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Runner already used")]
    AlreadyStarted,

    #[error("Process ID not available")]
    PidNotAvailable,

    #[error("Stdout not available")]
    StdoutNotAvailable,

    #[error("Stderr not available")]
    StderrNotAvailable,

    #[error("Stream task failed: {0}")]
    StreamTask(String),

    #[error("Build tool exited with code {code}")]
    BuildFailed { code: i32, stderr: String },
}

// ============================================================================
// Build Runner
// ============================================================================

/// Coordinates one build tool invocation
///
/// A runner drives exactly one subprocess from spawn to the assembled
/// result. Completion requires a three-way rendezvous: the OS exit wait
/// plus both stream pumps reaching EOF, never a race on whichever
/// finishes first.
pub struct BuildRunner {
    command: BuildCommand,

    /// Thread-safe process state
    state: Arc<Mutex<ProcessState>>,

    /// Cooperative cancellation; triggers SIGTERM on the child
    cancel: CancellationToken,
}

impl BuildRunner {
    pub fn new(command: BuildCommand) -> Self {
        Self {
            command,
            state: Arc::new(Mutex::new(ProcessState::NotStarted)),
            cancel: CancellationToken::new(),
        }
    }

    /// Get current process state (thread-safe)
    pub fn state(&self) -> ProcessState {
        // Poisoned mutex indicates a serious bug, panic is appropriate
        self.state.lock().unwrap().clone()
    }

    /// Token that terminates the build tool when cancelled
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn set_state(&self, state: ProcessState) {
        *self.state.lock().unwrap() = state;
    }

    /// Run the build tool to completion
    ///
    /// With a pipeline, every stdout line flows through buffering and
    /// classification; without one, stdout is collected raw. stderr lines
    /// are never classified. Returns after the process has exited and both
    /// streams are fully drained; a non-zero exit (or death by signal,
    /// mapped to code -1) surfaces as [`RunnerError::BuildFailed`]
    /// carrying the captured stderr.
    pub async fn run(&mut self, pipeline: Option<LogPipeline>) -> Result<BuildOutput, RunnerError> {
        if !matches!(self.state(), ProcessState::NotStarted) {
            return Err(RunnerError::AlreadyStarted);
        }

        info!(
            "Starting build tool: {} {:?}",
            self.command.program, self.command.args
        );

        let mut command_builder = Command::new(&self.command.program);
        command_builder
            .args(&self.command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(working_dir) = &self.command.working_dir {
            command_builder.current_dir(working_dir);
        }

        for (key, value) in &self.command.env {
            command_builder.env(key, value);
        }
        let search_path = self
            .command
            .env
            .get("PATH")
            .cloned()
            .or_else(|| std::env::var("PATH").ok());
        command_builder.env("PATH", augmented_search_path(search_path.as_deref()));

        let mut child = command_builder
            .spawn()
            .map_err(|source| RunnerError::Spawn {
                program: self.command.program.clone(),
                source,
            })?;

        let pid = child.id().ok_or(RunnerError::PidNotAvailable)?;
        self.set_state(ProcessState::Running { pid });
        info!("Build tool started with PID: {}", pid);

        let stdout = child
            .stdout
            .take()
            .ok_or(RunnerError::StdoutNotAvailable)?;
        let stderr = child
            .stderr
            .take()
            .ok_or(RunnerError::StderrNotAvailable)?;

        // Each pump runs independently so a full pipe on one stream can
        // never stall the other
        let stdout_task = tokio::spawn(async move {
            let pump = StreamPump::new(stdout, StreamSource::Stdout);
            match pipeline {
                Some(mut pipeline) => {
                    let lines = pump.run(|line| pipeline.feed(line)).await;
                    let issues = pipeline.finish();
                    if !issues.is_empty() {
                        info!(
                            "Recorded {} warning(s) across {} file(s)",
                            issues.issue_count(),
                            issues.file_count()
                        );
                    }
                    lines
                }
                None => pump.run(|_| {}).await,
            }
        });

        let stderr_task = tokio::spawn(async move {
            StreamPump::new(stderr, StreamSource::Stderr)
                .run(|line| debug!(target: "buildlog::stderr", "{line}"))
                .await
        });

        let status = tokio::select! {
            status = child.wait() => status?,
            _ = self.cancel.cancelled() => {
                info!("Cancellation requested, terminating build tool (PID {})", pid);
                terminate(&mut child, pid);
                child.wait().await?
            }
        };

        self.set_state(ProcessState::Draining { pid });
        debug!("Build tool exited ({}), draining streams", status);

        // Two-of-two rendezvous: both pumps must signal completion before
        // the result is assembled
        let (stdout_lines, stderr_lines) = tokio::join!(stdout_task, stderr_task);
        let stdout_lines = stdout_lines.map_err(|e| RunnerError::StreamTask(e.to_string()))?;
        let stderr_lines = stderr_lines.map_err(|e| RunnerError::StreamTask(e.to_string()))?;

        let code = status.code().unwrap_or(-1);
        self.set_state(ProcessState::Exited { code });

        let stderr_text = stderr_lines.join("\n");
        if code != 0 {
            warn!("Build tool failed with exit code {}", code);
            return Err(RunnerError::BuildFailed {
                code,
                stderr: stderr_text,
            });
        }

        Ok(BuildOutput {
            stdout: stdout_lines.join("\n").trim().to_string(),
            stderr: stderr_text,
            code,
        })
    }
}

/// Ask the child to terminate
#[cfg(unix)]
fn terminate(_child: &mut Child, pid: u32) {
    unsafe {
        if libc::kill(pid as libc::pid_t, libc::SIGTERM) == 0 {
            info!("Sent SIGTERM to process {}", pid);
        }
    }
}

#[cfg(not(unix))]
fn terminate(child: &mut Child, pid: u32) {
    if child.start_kill().is_ok() {
        info!("Killed process {}", pid);
    }
}
