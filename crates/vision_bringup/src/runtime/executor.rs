//! Launch executor - orchestrates process spawning and shutdown

use crate::ament::AmentIndex;
use crate::config::{ArgumentError, LaunchFile, OutputMode};
use crate::runtime::plan::{LaunchPlan, PlanError, Planner};
use crate::runtime::process::{
    ManagedProcess, ProcessConfig, ProcessError, ProcessEvent, ProcessStatus,
};
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// Launch executor configuration
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Shutdown timeout per process before SIGKILL
    pub shutdown_timeout: Duration,
    /// Directory under which each launch creates its log directory
    pub log_root: PathBuf,
    /// Package index for executables and $(find-pkg-share)
    pub packages: AmentIndex,
    /// Program used to run included launch files
    pub ros2_command: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            shutdown_timeout: Duration::from_secs(5),
            log_root: default_log_root(),
            packages: AmentIndex::from_env(),
            ros2_command: "ros2".to_string(),
        }
    }
}

/// `ROS_LOG_DIR`, else `$ROS_HOME/log`, else `~/.ros/log`
pub fn default_log_root() -> PathBuf {
    let non_empty = |name: &str| std::env::var_os(name).filter(|v| !v.is_empty());

    if let Some(dir) = non_empty("ROS_LOG_DIR") {
        return PathBuf::from(dir);
    }
    if let Some(home) = non_empty("ROS_HOME") {
        return PathBuf::from(home).join("log");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".ros")
        .join("log")
}

/// Launch executor state
pub struct Executor {
    /// Configuration
    config: ExecutorConfig,
    /// Condition evaluation and command resolution
    planner: Planner,
    /// Managed processes, in launch order
    processes: IndexMap<String, ManagedProcess>,
    /// Log directory of this launch, created on first use
    log_dir: Option<PathBuf>,
    /// Event channel
    event_tx: mpsc::UnboundedSender<(String, ProcessEvent)>,
    event_rx: mpsc::UnboundedReceiver<(String, ProcessEvent)>,
}

impl Executor {
    /// Create a new executor
    ///
    /// Argument overrides are validated here, so an invalid value fails
    /// before anything is spawned.
    pub fn new(
        launch_file: LaunchFile,
        config: ExecutorConfig,
        arg_overrides: &[(String, String)],
    ) -> Result<Self, ExecutorError> {
        let args = launch_file.resolve_args(arg_overrides)?;
        for (name, value) in args.iter() {
            log::debug!("Argument {} = {}", name, value);
        }

        let planner = Planner::new(launch_file, args, config.packages.clone())
            .with_ros2_command(config.ros2_command.clone());

        let (event_tx, event_rx) = mpsc::unbounded_channel();

        Ok(Self {
            config,
            planner,
            processes: IndexMap::new(),
            log_dir: None,
            event_tx,
            event_rx,
        })
    }

    /// Generate the launch plan (also used for dry-run mode)
    pub fn plan(&self) -> Result<LaunchPlan, ExecutorError> {
        Ok(self.planner.plan()?)
    }

    /// Log directory of this launch, if any process logs to a file
    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir.as_deref()
    }

    fn ensure_log_dir(&mut self) -> Result<PathBuf, ExecutorError> {
        if let Some(dir) = &self.log_dir {
            return Ok(dir.clone());
        }

        let name = format!(
            "{}-{}",
            chrono::Local::now().format("%Y-%m-%d-%H-%M-%S-%6f"),
            std::process::id()
        );
        let dir = self.config.log_root.join(name);
        std::fs::create_dir_all(&dir).map_err(|e| ExecutorError::LogDir {
            path: dir.clone(),
            source: e,
        })?;

        log::info!("All log files can be found below {}", dir.display());
        self.log_dir = Some(dir.clone());
        Ok(dir)
    }

    /// Launch all active actions in declaration order
    ///
    /// The whole plan is resolved before the first process starts.
    pub async fn launch(&mut self, shutdown_rx: watch::Receiver<()>) -> Result<(), ExecutorError> {
        let plan = self.plan()?;

        for action in plan.actions.iter().filter(|a| !a.active) {
            log::info!("[{}] Skipped (condition not met)", action.name);
        }

        let active: Vec<_> = plan.active().collect();
        log::info!("Launching {} processes...", active.len());

        // Create processes for all active actions
        for action in active {
            let Some(command) = &action.command else {
                continue;
            };

            let log_file = match action.output {
                OutputMode::Log => Some(self.ensure_log_dir()?.join(format!("{}.log", action.name))),
                OutputMode::Screen => None,
            };

            let config = ProcessConfig {
                name: action.name.clone(),
                program: command.program.clone(),
                args: command.args.clone(),
                env: action.env.clone(),
                output: action.output,
                log_file,
            };

            let process = ManagedProcess::new(config).with_event_sender(self.event_tx.clone());
            self.processes.insert(action.name.clone(), process);
        }

        // Launch processes in order
        for (name, process) in self.processes.iter_mut() {
            // Check for shutdown signal
            if shutdown_rx.has_changed().unwrap_or(false) {
                log::info!("Shutdown requested, aborting launch");
                break;
            }

            process
                .start()
                .await
                .map_err(|e| ExecutorError::ProcessFailed {
                    node: name.clone(),
                    source: e,
                })?;
        }

        log::info!("All processes launched successfully");
        Ok(())
    }

    /// Wait for all processes or shutdown signal
    pub async fn wait(&mut self, mut shutdown_rx: watch::Receiver<()>) {
        let mut status_interval = tokio::time::interval(Duration::from_secs(1));

        loop {
            tokio::select! {
                // Check for shutdown signal
                _ = shutdown_rx.changed() => {
                    log::info!("Shutdown signal received");
                    break;
                }

                // Process events
                event = self.event_rx.recv() => {
                    if let Some((name, event)) = event {
                        match event {
                            ProcessEvent::Output { line, is_stderr } => {
                                if is_stderr {
                                    log::warn!("[{}] {}", name, line);
                                } else {
                                    log::info!("[{}] {}", name, line);
                                }
                            }
                            ProcessEvent::Exited { code } => {
                                log::info!("[{}] Process exited with code: {:?}", name, code);
                            }
                            ProcessEvent::Failed { error } => {
                                log::error!("[{}] Process failed: {}", name, error);
                            }
                            ProcessEvent::Started { pid } => {
                                log::info!("[{}] Process started with PID: {}", name, pid);
                            }
                        }
                    }
                }

                // Check process status periodically
                _ = status_interval.tick() => {
                    let mut all_stopped = true;
                    for (_, process) in self.processes.iter_mut() {
                        let status = process.check_status().await;
                        if status.is_running() {
                            all_stopped = false;
                        }
                    }
                    if all_stopped {
                        log::info!("All processes have stopped");
                        break;
                    }
                }
            }
        }
    }

    /// Shutdown all processes in reverse order
    pub async fn shutdown(&mut self) {
        log::info!("Shutting down all processes...");

        for (name, process) in self.processes.iter_mut().rev() {
            if process.status.is_running() {
                if let Err(e) = process.stop(self.config.shutdown_timeout).await {
                    log::error!("[{}] Error stopping process: {}", name, e);
                }
            }
        }

        log::info!("All processes shut down");
    }

    /// Get process status summary
    pub fn status(&self) -> Vec<(&str, ProcessStatus)> {
        self.processes
            .iter()
            .map(|(name, proc)| (name.as_str(), proc.status))
            .collect()
    }
}

/// Errors that can occur in the executor
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("Invalid launch arguments: {0}")]
    Arguments(#[from] ArgumentError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error("Failed to create log directory '{}': {source}", .path.display())]
    LogDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Process failed for node '{node}': {source}")]
    ProcessFailed {
        node: String,
        #[source]
        source: ProcessError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(name: &str, value: &str) -> (String, String) {
        (name.to_string(), value.to_string())
    }

    fn test_config(log_root: &Path, packages: AmentIndex) -> ExecutorConfig {
        ExecutorConfig {
            shutdown_timeout: Duration::from_secs(2),
            log_root: log_root.to_path_buf(),
            packages,
            ros2_command: "ros2".to_string(),
        }
    }

    #[test]
    fn test_invalid_choice_fails_before_spawn() {
        let dir = tempfile::tempdir().unwrap();
        let result = Executor::new(
            LaunchFile::vision().unwrap(),
            test_config(dir.path(), AmentIndex::default()),
            &[pair("use_mock_camera", "maybe")],
        );

        assert!(matches!(
            result,
            Err(ExecutorError::Arguments(ArgumentError::InvalidChoice { .. }))
        ));
    }

    #[test]
    fn test_unknown_argument_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let result = Executor::new(
            LaunchFile::vision().unwrap(),
            test_config(dir.path(), AmentIndex::default()),
            &[pair("camera_source", "mock")],
        );

        assert!(matches!(
            result,
            Err(ExecutorError::Arguments(ArgumentError::UnknownArgument(_)))
        ));
    }

    #[tokio::test]
    async fn test_unresolvable_plan_spawns_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut executor = Executor::new(
            LaunchFile::vision().unwrap(),
            test_config(dir.path(), AmentIndex::default()),
            &[],
        )
        .unwrap();

        let (_tx, rx) = watch::channel(());
        let result = executor.launch(rx).await;

        assert!(matches!(result, Err(ExecutorError::Plan(_))));
        assert!(executor.status().is_empty());
        assert!(executor.log_dir().is_none());
    }
}
