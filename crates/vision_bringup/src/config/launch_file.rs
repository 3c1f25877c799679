//! Launch file YAML schema definitions

use crate::config::arguments::{resolve_args, ArgDeclaration, ArgumentError, ResolvedArgs};
use crate::config::condition::Condition;
use crate::config::substitution::referenced_args;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Launch description for the vision stack, shipped with the binary
const VISION_LAUNCH: &str = include_str!("../../launch/vision.launch.yaml");

/// Root launch file configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LaunchFile {
    /// Launch file format version
    #[serde(default = "default_version")]
    pub version: String,

    /// Argument declarations (ordered as declared)
    #[serde(default)]
    pub args: IndexMap<String, ArgDeclaration>,

    /// Environment variables (applied to all actions)
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Actions, evaluated and started in declaration order
    pub actions: IndexMap<String, ActionConfig>,
}

fn default_version() -> String {
    "1.0".to_string()
}

/// A process to start: either a node or an included launch file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActionConfig {
    /// Package providing the node executable
    #[serde(default)]
    pub package: Option<String>,

    /// Executable within the package's lib directory
    #[serde(default)]
    pub executable: Option<String>,

    /// Launch file to include as a whole sub-launch sequence.
    /// Mutually exclusive with `package`/`executable`
    #[serde(default)]
    pub include: Option<String>,

    /// Node name, passed as a `__node` remapping
    #[serde(default)]
    pub name: Option<String>,

    /// Where the process output goes
    #[serde(default)]
    pub output: OutputMode,

    /// Static arguments passed to the node executable
    #[serde(default)]
    pub arguments: Vec<String>,

    /// Arguments forwarded to an included launch file
    #[serde(default)]
    pub launch_arguments: IndexMap<String, String>,

    /// Environment variables specific to this action
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Activation condition; absent means always active
    #[serde(default)]
    pub condition: Option<Condition>,
}

/// What an action starts, once validated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionTarget<'a> {
    Node {
        package: &'a str,
        executable: &'a str,
    },
    Include {
        file: &'a str,
    },
}

impl ActionConfig {
    pub fn target(&self) -> Option<ActionTarget<'_>> {
        match (&self.package, &self.executable, &self.include) {
            (Some(package), Some(executable), None) => Some(ActionTarget::Node {
                package,
                executable,
            }),
            (None, None, Some(file)) => Some(ActionTarget::Include { file }),
            _ => None,
        }
    }

    /// Every string of this action that goes through substitution
    fn substituted_fields(&self) -> impl Iterator<Item = &String> {
        self.include
            .iter()
            .chain(self.arguments.iter())
            .chain(self.launch_arguments.values())
            .chain(self.env.values())
    }
}

/// Output handling for a launched process
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Forward stdout/stderr to the launcher log
    Screen,
    /// Write stdout/stderr to a per-process log file only
    #[default]
    Log,
}

impl LaunchFile {
    /// The built-in vision stack description
    pub fn vision() -> Result<Self, LaunchFileError> {
        Self::from_yaml(VISION_LAUNCH)
    }

    /// Load launch file from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LaunchFileError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| LaunchFileError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_yaml(&content)
    }

    /// Parse launch file from YAML string
    pub fn from_yaml(content: &str) -> Result<Self, LaunchFileError> {
        let launch_file: LaunchFile =
            serde_yaml::from_str(content).map_err(LaunchFileError::Parse)?;
        launch_file.validate()?;
        Ok(launch_file)
    }

    /// Validate the launch file configuration
    pub fn validate(&self) -> Result<(), LaunchFileError> {
        for (name, arg) in &self.args {
            let Some(choices) = arg.choice_values() else {
                continue;
            };
            if choices.is_empty() {
                return Err(LaunchFileError::Validation(format!(
                    "Argument '{}': 'choices' must not be empty",
                    name
                )));
            }
            let Some(default) = arg.default_value() else {
                continue;
            };
            if !choices.contains(&default) {
                return Err(LaunchFileError::Validation(format!(
                    "Argument '{}': default '{}' is not one of [{}]",
                    name,
                    default,
                    choices.join(", ")
                )));
            }
        }

        for (name, action) in &self.actions {
            match (&action.package, &action.executable, &action.include) {
                (Some(package), Some(executable), None) => {
                    if package.is_empty() || executable.is_empty() {
                        return Err(LaunchFileError::Validation(format!(
                            "Action '{}': 'package' and 'executable' must not be empty",
                            name
                        )));
                    }
                    if !action.launch_arguments.is_empty() {
                        return Err(LaunchFileError::Validation(format!(
                            "Action '{}': 'launch_arguments' only applies to 'include'",
                            name
                        )));
                    }
                }
                (None, None, Some(file)) => {
                    if file.is_empty() {
                        return Err(LaunchFileError::Validation(format!(
                            "Action '{}': 'include' must not be empty",
                            name
                        )));
                    }
                    if !action.arguments.is_empty() || action.name.is_some() {
                        return Err(LaunchFileError::Validation(format!(
                            "Action '{}': 'arguments' and 'name' only apply to nodes",
                            name
                        )));
                    }
                }
                (Some(_), None, None) => {
                    return Err(LaunchFileError::Validation(format!(
                        "Action '{}': 'package' requires 'executable' to be specified",
                        name
                    )));
                }
                (None, Some(_), None) => {
                    return Err(LaunchFileError::Validation(format!(
                        "Action '{}': 'executable' requires 'package' to be specified",
                        name
                    )));
                }
                (None, None, None) => {
                    return Err(LaunchFileError::Validation(format!(
                        "Action '{}': must specify either 'package'+'executable' or 'include'",
                        name
                    )));
                }
                _ => {
                    return Err(LaunchFileError::Validation(format!(
                        "Action '{}': cannot specify both 'package'/'executable' and 'include'",
                        name
                    )));
                }
            }

            // Every $(arg ...) must refer to a declared argument
            let condition_refs = action
                .condition
                .iter()
                .flat_map(Condition::referenced_args);
            let field_refs = action
                .substituted_fields()
                .flat_map(|field| referenced_args(field));

            for arg in condition_refs.chain(field_refs) {
                if !self.args.contains_key(&arg) {
                    return Err(LaunchFileError::Validation(format!(
                        "Action '{}': references undeclared argument '{}'",
                        name, arg
                    )));
                }
            }
        }

        Ok(())
    }

    /// Apply overrides to the declared arguments, failing on any value
    /// outside the declared choices
    pub fn resolve_args(&self, overrides: &[(String, String)]) -> Result<ResolvedArgs, ArgumentError> {
        resolve_args(&self.args, overrides)
    }
}

/// Errors that can occur when loading a launch file
#[derive(Debug, thiserror::Error)]
pub enum LaunchFileError {
    #[error("Failed to read launch file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse launch file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vision_launch_file() {
        let launch_file = LaunchFile::vision().unwrap();

        let args: Vec<_> = launch_file.args.keys().map(String::as_str).collect();
        assert_eq!(args, vec!["use_mock_camera", "rviz"]);

        let actions: Vec<_> = launch_file.actions.keys().map(String::as_str).collect();
        assert_eq!(
            actions,
            vec!["mock_camera", "realsense_camera", "face_detection", "rviz"]
        );

        for arg in launch_file.args.values() {
            assert_eq!(arg.default_value().as_deref(), Some("false"));
            assert_eq!(
                arg.choice_values(),
                Some(vec!["true".to_string(), "false".to_string()])
            );
            assert!(arg.description.is_some());
        }
    }

    #[test]
    fn test_vision_action_targets() {
        let launch_file = LaunchFile::vision().unwrap();
        let actions = &launch_file.actions;

        assert_eq!(
            actions["mock_camera"].target(),
            Some(ActionTarget::Node {
                package: "mock_camera",
                executable: "mock_camera_node"
            })
        );
        assert!(matches!(
            actions["realsense_camera"].target(),
            Some(ActionTarget::Include { file }) if file.ends_with("/launch/rs_launch.py")
        ));
        assert_eq!(
            actions["mock_camera"].condition,
            Some(Condition::If("$(arg use_mock_camera)".to_string()))
        );
        assert_eq!(
            actions["realsense_camera"].condition,
            Some(Condition::Unless("$(arg use_mock_camera)".to_string()))
        );
        assert!(actions["face_detection"].condition.is_none());
        assert_eq!(actions["face_detection"].output, OutputMode::Screen);
        assert_eq!(actions["rviz"].output, OutputMode::Log);
        assert_eq!(actions["rviz"].arguments[0], "-d");
        assert!(actions["rviz"].arguments[1].ends_with("/config/vision.rviz"));
    }

    #[test]
    fn test_output_defaults_to_log() {
        let yaml = r#"
actions:
  talker:
    package: demo_nodes_cpp
    executable: talker
"#;
        let launch_file = LaunchFile::from_yaml(yaml).unwrap();
        assert_eq!(launch_file.actions["talker"].output, OutputMode::Log);
    }

    #[test]
    fn test_validation_missing_executable() {
        let yaml = r#"
actions:
  bad:
    package: some_package
"#;
        assert!(matches!(
            LaunchFile::from_yaml(yaml),
            Err(LaunchFileError::Validation(_))
        ));
    }

    #[test]
    fn test_validation_node_and_include() {
        let yaml = r#"
actions:
  bad:
    package: some_package
    executable: node
    include: "other.launch.py"
"#;
        assert!(LaunchFile::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_validation_default_outside_choices() {
        let yaml = r#"
args:
  mode:
    default: "fast"
    choices: ["slow", "normal"]
actions:
  node:
    package: pkg
    executable: exe
"#;
        assert!(LaunchFile::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_validation_undeclared_argument() {
        let yaml = r#"
actions:
  node:
    package: pkg
    executable: exe
    condition:
      if: "$(arg enabled)"
"#;
        let err = LaunchFile::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("enabled"));
    }

    #[test]
    fn test_validation_undeclared_argument_in_arguments() {
        let yaml = r#"
actions:
  node:
    package: pkg
    executable: exe
    arguments: ["--config", "$(arg config)"]
"#;
        assert!(LaunchFile::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_unknown_condition_kind_rejected() {
        let yaml = r#"
actions:
  node:
    package: pkg
    executable: exe
    condition:
      when: "true"
"#;
        assert!(matches!(
            LaunchFile::from_yaml(yaml),
            Err(LaunchFileError::Parse(_))
        ));
    }

    #[test]
    fn test_misspelled_action_key_rejected() {
        let yaml = r#"
args:
  use_mock_camera:
    default: "false"
actions:
  mock_camera:
    package: mock_camera
    executable: mock_camera_node
    condtion:
      if: "$(arg use_mock_camera)"
"#;
        let err = LaunchFile::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, LaunchFileError::Parse(_)));
        assert!(err.to_string().contains("condtion"));
    }

    #[test]
    fn test_unknown_top_level_key_rejected() {
        let yaml = r#"
argz:
  rviz:
    default: "false"
actions:
  node:
    package: pkg
    executable: exe
"#;
        assert!(matches!(
            LaunchFile::from_yaml(yaml),
            Err(LaunchFileError::Parse(_))
        ));
    }

    #[test]
    fn test_from_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let result = LaunchFile::from_file(dir.path().join("missing.launch.yaml"));
        assert!(matches!(result, Err(LaunchFileError::Io { .. })));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("camera.launch.yaml");
        std::fs::write(
            &path,
            "actions:\n  camera:\n    include: \"/opt/ros/share/cam/launch/cam.py\"\n",
        )
        .unwrap();

        let launch_file = LaunchFile::from_file(&path).unwrap();
        assert_eq!(launch_file.version, "1.0");
        assert_eq!(launch_file.actions.len(), 1);
    }
}
