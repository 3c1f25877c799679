//! Managed process abstraction

use crate::config::OutputMode;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

/// Process status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    /// Process is pending start
    Pending,
    /// Process is starting
    Starting,
    /// Process is running
    Running,
    /// Process has stopped with exit code
    Stopped(Option<i32>),
    /// Process failed to start
    Failed,
}

impl ProcessStatus {
    /// Check if process is running
    pub fn is_running(&self) -> bool {
        matches!(self, ProcessStatus::Running | ProcessStatus::Starting)
    }

    /// Check if process has stopped
    pub fn is_stopped(&self) -> bool {
        matches!(self, ProcessStatus::Stopped(_) | ProcessStatus::Failed)
    }
}

/// Configuration for spawning a process
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    /// Action name (for logging)
    pub name: String,
    /// Program to run
    pub program: String,
    /// Command line arguments
    pub args: Vec<String>,
    /// Environment variables added to the inherited environment
    pub env: HashMap<String, String>,
    /// Output handling
    pub output: OutputMode,
    /// Destination for `OutputMode::Log`
    pub log_file: Option<PathBuf>,
}

/// Event emitted by a managed process
#[derive(Debug, Clone)]
pub enum ProcessEvent {
    /// Process started
    Started { pid: u32 },
    /// Process output line: stdout and stderr in screen mode, stderr only in log mode
    Output { line: String, is_stderr: bool },
    /// Process exited
    Exited { code: Option<i32> },
    /// Process failed to start
    Failed { error: String },
}

/// A managed child process
pub struct ManagedProcess {
    /// Process configuration
    pub config: ProcessConfig,
    /// Current status
    pub status: ProcessStatus,
    /// Process ID (if running)
    pub pid: Option<u32>,
    /// Start time
    pub started_at: Option<Instant>,
    /// Child process handle
    child: Option<Child>,
    /// Event sender
    event_tx: Option<mpsc::UnboundedSender<(String, ProcessEvent)>>,
}

impl ManagedProcess {
    /// Create a new managed process
    pub fn new(config: ProcessConfig) -> Self {
        Self {
            config,
            status: ProcessStatus::Pending,
            pid: None,
            started_at: None,
            child: None,
            event_tx: None,
        }
    }

    /// Set the event sender for this process
    pub fn with_event_sender(mut self, tx: mpsc::UnboundedSender<(String, ProcessEvent)>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    fn emit(&self, event: ProcessEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send((self.config.name.clone(), event));
        }
    }

    /// Wire stdout/stderr according to the output mode
    ///
    /// In `log` mode stdout goes straight to the log file, while stderr is
    /// piped so it can reach both the file and the launcher log. The
    /// returned file is the stderr copy's destination.
    fn configure_output(&self, cmd: &mut Command) -> Result<Option<std::fs::File>, ProcessError> {
        match (self.config.output, &self.config.log_file) {
            (OutputMode::Log, Some(path)) => {
                let log_error = |e: std::io::Error| ProcessError::LogFile {
                    path: path.clone(),
                    source: e,
                };
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(log_error)?;
                let stderr_file = file.try_clone().map_err(log_error)?;
                cmd.stdout(Stdio::from(file)).stderr(Stdio::piped());
                Ok(Some(stderr_file))
            }
            (OutputMode::Log, None) if self.event_tx.is_some() => {
                cmd.stdout(Stdio::null()).stderr(Stdio::piped());
                Ok(None)
            }
            (OutputMode::Log, None) => {
                cmd.stdout(Stdio::null()).stderr(Stdio::inherit());
                Ok(None)
            }
            (OutputMode::Screen, _) if self.event_tx.is_some() => {
                cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
                Ok(None)
            }
            (OutputMode::Screen, _) => {
                cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
                Ok(None)
            }
        }
    }

    /// Start the process
    pub async fn start(&mut self) -> Result<(), ProcessError> {
        if self.status.is_running() {
            return Err(ProcessError::AlreadyRunning(self.config.name.clone()));
        }

        self.status = ProcessStatus::Starting;
        log::info!(
            "[{}] Starting: {} {}",
            self.config.name,
            self.config.program,
            self.config.args.join(" ")
        );

        let mut cmd = Command::new(&self.config.program);
        cmd.args(&self.config.args)
            .envs(&self.config.env)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let stderr_log = match self.configure_output(&mut cmd) {
            Ok(file) => file,
            Err(e) => {
                self.status = ProcessStatus::Failed;
                return Err(e);
            }
        };

        match cmd.spawn() {
            Ok(mut child) => {
                let pid = child.id().unwrap_or(0);
                self.pid = Some(pid);
                self.status = ProcessStatus::Running;
                self.started_at = Some(Instant::now());

                self.emit(ProcessEvent::Started { pid });

                // Spawn output readers
                let name = self.config.name.clone();
                if let Some(stdout) = child.stdout.take() {
                    spawn_line_reader(name.clone(), stdout, false, self.event_tx.clone(), None);
                }
                if let Some(stderr) = child.stderr.take() {
                    let log_file = stderr_log.map(tokio::fs::File::from_std);
                    spawn_line_reader(name, stderr, true, self.event_tx.clone(), log_file);
                }

                self.child = Some(child);
                Ok(())
            }
            Err(e) => {
                self.status = ProcessStatus::Failed;
                let error = format!("Failed to spawn process: {}", e);
                log::error!("[{}] {}", self.config.name, error);

                self.emit(ProcessEvent::Failed { error });

                Err(ProcessError::SpawnFailed {
                    name: self.config.name.clone(),
                    source: e,
                })
            }
        }
    }

    /// Stop the process gracefully (SIGTERM, then SIGKILL after timeout)
    pub async fn stop(&mut self, timeout: Duration) -> Result<(), ProcessError> {
        if let Some(mut child) = self.child.take() {
            log::info!("[{}] Stopping process...", self.config.name);

            // Try graceful shutdown first (SIGTERM on Unix)
            #[cfg(unix)]
            {
                use nix::sys::signal::{kill, Signal};
                use nix::unistd::Pid;

                if let Some(pid) = self.pid {
                    let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
                }
            }

            #[cfg(not(unix))]
            {
                // On non-Unix, just kill immediately
                let _ = child.kill().await;
            }

            // Wait for process to exit with timeout
            let exit_result = tokio::time::timeout(timeout, child.wait()).await;

            match exit_result {
                Ok(Ok(status)) => {
                    let code = status.code();
                    self.status = ProcessStatus::Stopped(code);
                    log::info!("[{}] Process exited with code: {:?}", self.config.name, code);
                    self.emit(ProcessEvent::Exited { code });
                }
                Ok(Err(e)) => {
                    log::error!("[{}] Error waiting for process: {}", self.config.name, e);
                    self.status = ProcessStatus::Stopped(None);
                }
                Err(_) => {
                    log::warn!(
                        "[{}] Process did not exit gracefully, forcing kill",
                        self.config.name
                    );

                    if let Err(e) = child.kill().await {
                        log::error!("[{}] Failed to kill process: {}", self.config.name, e);
                    }

                    self.status = ProcessStatus::Stopped(None);
                    self.emit(ProcessEvent::Exited { code: None });
                }
            }

            self.pid = None;
        }

        Ok(())
    }

    /// Check if the process is still running
    pub async fn check_status(&mut self) -> ProcessStatus {
        if let Some(child) = &mut self.child {
            match child.try_wait() {
                Ok(Some(status)) => {
                    let code = status.code();
                    self.status = ProcessStatus::Stopped(code);
                    self.pid = None;
                    self.child = None;
                    self.emit(ProcessEvent::Exited { code });
                }
                Ok(None) => {
                    // Still running
                }
                Err(e) => {
                    log::error!(
                        "[{}] Error checking process status: {}",
                        self.config.name,
                        e
                    );
                }
            }
        }

        self.status
    }

    /// Get uptime duration
    pub fn uptime(&self) -> Option<Duration> {
        self.started_at.map(|t| t.elapsed())
    }
}

/// Forward each line of a child stream as a `ProcessEvent::Output`,
/// appending it to `log_file` first when one is given
fn spawn_line_reader<R>(
    name: String,
    stream: R,
    is_stderr: bool,
    tx: Option<mpsc::UnboundedSender<(String, ProcessEvent)>>,
    mut log_file: Option<tokio::fs::File>,
) where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(file) = &mut log_file {
                let written = file.write_all(format!("{}\n", line).as_bytes()).await;
                if let Err(e) = written {
                    log::warn!("[{}] Failed to write log file: {}", name, e);
                    log_file = None;
                }
            }
            if let Some(tx) = &tx {
                let _ = tx.send((name.clone(), ProcessEvent::Output { line, is_stderr }));
            }
        }
        if let Some(file) = &mut log_file {
            let _ = file.flush().await;
        }
    });
}

/// Errors that can occur with managed processes
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Process '{0}' is already running")]
    AlreadyRunning(String),

    #[error("Failed to spawn process '{name}': {source}")]
    SpawnFailed {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to open log file '{}': {source}", .path.display())]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
