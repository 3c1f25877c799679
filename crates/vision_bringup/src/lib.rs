//! Vision Bringup
//!
//! Launch orchestrator for the face-detection vision stack.
//!
//! # Overview
//!
//! The launcher:
//! - Declares the `use_mock_camera` and `rviz` arguments, restricted to `true`/`false`
//! - Starts either the mock camera node or the RealSense sub-launch, never both
//! - Always starts the face detection node
//! - Starts RViz2 with the bundled `config/vision.rviz` when `rviz:=true`
//! - Shuts processes down in reverse order on Ctrl+C
//!
//! # Launch File
//!
//! The built-in description lives in `launch/vision.launch.yaml`; any file
//! with the same schema can be passed instead:
//!
//! ```yaml
//! args:
//!   use_mock_camera:
//!     default: "false"
//!     choices: ["true", "false"]
//!
//! actions:
//!   mock_camera:
//!     package: mock_camera
//!     executable: mock_camera_node
//!     output: screen
//!     condition:
//!       if: "$(arg use_mock_camera)"
//!
//!   realsense_camera:
//!     include: "$(find-pkg-share realsense2_camera)/launch/rs_launch.py"
//!     condition:
//!       unless: "$(arg use_mock_camera)"
//! ```

pub mod ament;
pub mod cli;
pub mod config;
pub mod runtime;

pub use ament::{AmentError, AmentIndex};
pub use cli::LaunchArgs;
pub use config::{
    ArgumentError, Condition, LaunchFile, LaunchFileError, OutputMode, ResolvedArgs,
    SubstitutionContext, SubstitutionError,
};
pub use runtime::{
    ActionKind, ActivationDecision, Executor, ExecutorConfig, ExecutorError, LaunchPlan,
    ManagedProcess, PlanError, PlannedAction, Planner, ProcessConfig, ProcessError, ProcessEvent,
    ProcessStatus,
};
