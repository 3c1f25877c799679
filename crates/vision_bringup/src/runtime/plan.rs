//! Evaluation of a launch file into an ordered launch plan
//!
//! Conditions are evaluated once, in declaration order. Every action stays
//! in the plan and is tagged active or inert; only active actions get a
//! resolved command line.

use crate::ament::{AmentError, AmentIndex};
use crate::config::{
    ActionConfig, ActionTarget, ConditionError, LaunchFile, OutputMode, ResolvedArgs,
    SubstitutionContext, SubstitutionError,
};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// What kind of process an action starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Node,
    Include,
}

/// Outcome of evaluating an action's condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivationDecision {
    pub name: String,
    pub kind: ActionKind,
    pub active: bool,
    /// Condition as written, for display
    pub condition: Option<String>,
}

/// Program and arguments of a resolved action
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// An action in the launch plan
#[derive(Debug, Clone, Serialize)]
pub struct PlannedAction {
    pub name: String,
    pub kind: ActionKind,
    pub active: bool,
    pub condition: Option<String>,
    pub output: OutputMode,
    /// Resolved command, only for active actions
    pub command: Option<CommandLine>,
    /// Resolved environment, only for active actions
    pub env: HashMap<String, String>,
}

/// Ordered launch plan
#[derive(Debug, Clone, Serialize)]
pub struct LaunchPlan {
    /// Resolved arguments
    pub args: ResolvedArgs,
    /// All actions in declaration order
    pub actions: Vec<PlannedAction>,
}

impl LaunchPlan {
    /// Actions that will be started, in launch order
    pub fn active(&self) -> impl Iterator<Item = &PlannedAction> {
        self.actions.iter().filter(|a| a.active)
    }

    pub fn active_names(&self) -> Vec<&str> {
        self.active().map(|a| a.name.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&PlannedAction> {
        self.actions.iter().find(|a| a.name == name)
    }
}

/// Turns a launch file and resolved arguments into a launch plan
#[derive(Debug, Clone)]
pub struct Planner {
    launch_file: LaunchFile,
    args: ResolvedArgs,
    subst_ctx: SubstitutionContext,
    ros2_command: String,
}

impl Planner {
    pub fn new(launch_file: LaunchFile, args: ResolvedArgs, packages: AmentIndex) -> Self {
        let subst_ctx = SubstitutionContext::new()
            .with_args(args.iter().map(|(k, v)| (k.to_string(), v.to_string())))
            .with_envs(launch_file.env.clone())
            .with_packages(packages);

        Self {
            launch_file,
            args,
            subst_ctx,
            ros2_command: "ros2".to_string(),
        }
    }

    /// Program used to run included launch files (default: `ros2`)
    pub fn with_ros2_command(mut self, command: impl Into<String>) -> Self {
        self.ros2_command = command.into();
        self
    }

    pub fn args(&self) -> &ResolvedArgs {
        &self.args
    }

    /// Evaluate every action's condition, without touching the filesystem
    pub fn decisions(&self) -> Result<Vec<ActivationDecision>, PlanError> {
        self.launch_file
            .actions
            .iter()
            .map(|(name, action)| self.decide(name, action))
            .collect()
    }

    fn decide(&self, name: &str, action: &ActionConfig) -> Result<ActivationDecision, PlanError> {
        let kind = match action.target() {
            Some(ActionTarget::Node { .. }) => ActionKind::Node,
            Some(ActionTarget::Include { .. }) => ActionKind::Include,
            None => return Err(PlanError::InvalidAction(name.to_string())),
        };

        let active = match &action.condition {
            Some(condition) => {
                condition
                    .evaluate(&self.subst_ctx)
                    .map_err(|e| PlanError::Condition {
                        action: name.to_string(),
                        source: e,
                    })?
            }
            None => true,
        };

        log::debug!(
            "[{}] {}",
            name,
            if active { "active" } else { "inactive" }
        );

        Ok(ActivationDecision {
            name: name.to_string(),
            kind,
            active,
            condition: action.condition.as_ref().map(ToString::to_string),
        })
    }

    /// Evaluate conditions and resolve commands for every active action
    pub fn plan(&self) -> Result<LaunchPlan, PlanError> {
        let mut actions = Vec::with_capacity(self.launch_file.actions.len());

        for decision in self.decisions()? {
            let action = &self.launch_file.actions[decision.name.as_str()];

            let (command, env) = if decision.active {
                (
                    Some(self.resolve_command(&decision.name, action)?),
                    self.resolve_env(&decision.name, action)?,
                )
            } else {
                (None, HashMap::new())
            };

            actions.push(PlannedAction {
                name: decision.name,
                kind: decision.kind,
                active: decision.active,
                condition: decision.condition,
                output: action.output,
                command,
                env,
            });
        }

        Ok(LaunchPlan {
            args: self.args.clone(),
            actions,
        })
    }

    /// Resolve the command line for an action
    fn resolve_command(&self, name: &str, action: &ActionConfig) -> Result<CommandLine, PlanError> {
        match action.target() {
            Some(ActionTarget::Node {
                package,
                executable,
            }) => {
                let program = self
                    .subst_ctx
                    .packages
                    .executable(package, executable)
                    .map_err(|e| PlanError::Package {
                        action: name.to_string(),
                        source: e,
                    })?;

                let mut args = Vec::with_capacity(action.arguments.len());
                for arg in &action.arguments {
                    args.push(self.substitute(arg, || format!("action '{}' arguments", name))?);
                }

                if let Some(node_name) = &action.name {
                    args.push("--ros-args".to_string());
                    args.push("-r".to_string());
                    args.push(format!("__node:={}", node_name));
                }

                Ok(CommandLine {
                    program: program.to_string_lossy().into_owned(),
                    args,
                })
            }
            Some(ActionTarget::Include { file }) => {
                let file = self.substitute(file, || format!("action '{}' include", name))?;
                if !Path::new(&file).is_file() {
                    return Err(PlanError::IncludeNotFound {
                        action: name.to_string(),
                        file,
                    });
                }

                let mut args = vec!["launch".to_string(), file];
                for (key, value) in &action.launch_arguments {
                    let value = self.substitute(value, || {
                        format!("action '{}' launch_arguments.{}", name, key)
                    })?;
                    args.push(format!("{}:={}", key, value));
                }

                Ok(CommandLine {
                    program: self.ros2_command.clone(),
                    args,
                })
            }
            None => Err(PlanError::InvalidAction(name.to_string())),
        }
    }

    /// Global environment overlaid with the action's own variables
    fn resolve_env(
        &self,
        name: &str,
        action: &ActionConfig,
    ) -> Result<HashMap<String, String>, PlanError> {
        let mut env = HashMap::new();

        for (k, v) in &self.launch_file.env {
            let resolved = self.substitute(v, || format!("global env '{}'", k))?;
            env.insert(k.clone(), resolved);
        }

        for (k, v) in &action.env {
            let resolved = self.substitute(v, || format!("action '{}' env '{}'", name, k))?;
            env.insert(k.clone(), resolved);
        }

        Ok(env)
    }

    fn substitute(
        &self,
        input: &str,
        context: impl FnOnce() -> String,
    ) -> Result<String, PlanError> {
        self.subst_ctx
            .substitute(input)
            .map_err(|e| PlanError::SubstitutionFailed {
                context: context(),
                source: e,
            })
    }
}

/// Errors that can occur while planning
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("Action '{0}' must specify either 'package'+'executable' or 'include'")]
    InvalidAction(String),

    #[error("Condition of action '{action}' failed: {source}")]
    Condition {
        action: String,
        #[source]
        source: ConditionError,
    },

    #[error("Substitution failed in {context}: {source}")]
    SubstitutionFailed {
        context: String,
        #[source]
        source: SubstitutionError,
    },

    #[error("Action '{action}': {source}")]
    Package {
        action: String,
        #[source]
        source: AmentError,
    },

    #[error("Action '{action}': included launch file '{file}' not found")]
    IncludeNotFound { action: String, file: String },
}

/// Display the launch plan in a human-readable format
impl fmt::Display for LaunchPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Launch Plan")?;
        writeln!(f, "===========")?;
        writeln!(f)?;

        if !self.args.is_empty() {
            writeln!(f, "Arguments:")?;
            for (key, value) in self.args.iter() {
                writeln!(f, "  {}: {}", key, value)?;
            }
            writeln!(f)?;
        }

        writeln!(f, "Actions (in launch order):")?;
        for (i, action) in self.actions.iter().enumerate() {
            writeln!(f)?;
            writeln!(
                f,
                "  {}. {} [{}] {}",
                i + 1,
                action.name,
                if action.active { "active" } else { "inactive" },
                action
                    .condition
                    .as_ref()
                    .map(|c| format!("({})", c))
                    .unwrap_or_default()
            )?;

            if let Some(command) = &action.command {
                writeln!(f, "     Command: {}", command)?;
                writeln!(
                    f,
                    "     Output: {}",
                    match action.output {
                        OutputMode::Screen => "screen",
                        OutputMode::Log => "log",
                    }
                )?;
            }

            if !action.env.is_empty() {
                writeln!(f, "     Environment:")?;
                for (key, value) in &action.env {
                    writeln!(f, "       {}={}", key, value)?;
                }
            }
        }

        Ok(())
    }
}
