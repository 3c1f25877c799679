//! Substitution engine for $(arg), $(env), $(find-pkg-share) patterns

use crate::ament::{AmentError, AmentIndex};
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::LazyLock;

/// Regex for matching substitution patterns: $(type value)
static SUBSTITUTION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\(([\w-]+)\s+([^)]+)\)|\$\(([\w-]+)\)").unwrap());

/// Substitution context containing all available variables
#[derive(Debug, Clone, Default)]
pub struct SubstitutionContext {
    /// Resolved launch arguments
    pub args: HashMap<String, String>,
    /// Additional environment variables
    pub env: HashMap<String, String>,
    /// Package index used by $(find-pkg-share)
    pub packages: AmentIndex,
}

impl SubstitutionContext {
    /// Create a new substitution context
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an argument
    pub fn with_arg(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.insert(name.into(), value.into());
        self
    }

    /// Add multiple arguments
    pub fn with_args<I>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.args.extend(args);
        self
    }

    /// Add an environment variable
    pub fn with_env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(name.into(), value.into());
        self
    }

    /// Add multiple environment variables
    pub fn with_envs(mut self, envs: HashMap<String, String>) -> Self {
        self.env.extend(envs);
        self
    }

    /// Use this package index for $(find-pkg-share)
    pub fn with_packages(mut self, packages: AmentIndex) -> Self {
        self.packages = packages;
        self
    }

    /// Substitute all patterns in a string
    ///
    /// A single pass: resolved values are inserted literally and never
    /// substituted again.
    pub fn substitute(&self, input: &str) -> Result<String, SubstitutionError> {
        let mut error: Option<SubstitutionError> = None;

        let result = SUBSTITUTION_PATTERN.replace_all(input, |caps: &Captures| {
            if error.is_some() {
                return String::new();
            }

            match self.resolve_capture(caps) {
                Ok(value) => value,
                Err(e) => {
                    error = Some(e);
                    String::new()
                }
            }
        });

        if let Some(e) = error {
            return Err(e);
        }

        Ok(result.into_owned())
    }

    /// Resolve a single capture group
    fn resolve_capture(&self, caps: &Captures) -> Result<String, SubstitutionError> {
        // $(type value), e.g. $(arg rviz)
        if let (Some(subst_type), Some(value)) = (caps.get(1), caps.get(2)) {
            return self.resolve_typed(subst_type.as_str(), value.as_str().trim());
        }

        // $(type) without a value is not meaningful for any supported type
        let subst_type = caps.get(3).map(|m| m.as_str()).unwrap_or_default();
        Err(SubstitutionError::MissingValue(subst_type.to_string()))
    }

    /// Resolve a typed substitution
    fn resolve_typed(&self, subst_type: &str, value: &str) -> Result<String, SubstitutionError> {
        match subst_type {
            "arg" => self.resolve_arg(value),
            "env" => self.resolve_env(value),
            "find-pkg-share" => self.resolve_package_share(value),
            _ => Err(SubstitutionError::UnknownType(subst_type.to_string())),
        }
    }

    /// Resolve an argument reference
    fn resolve_arg(&self, name: &str) -> Result<String, SubstitutionError> {
        self.args
            .get(name)
            .cloned()
            .ok_or_else(|| SubstitutionError::UndefinedArg(name.to_string()))
    }

    /// Resolve `NAME` or `NAME default` against the environment
    fn resolve_env(&self, value: &str) -> Result<String, SubstitutionError> {
        let (name, default) = match value.split_once(char::is_whitespace) {
            Some((name, default)) => (name, Some(default.trim())),
            None => (value, None),
        };

        // First check our local env overrides
        if let Some(value) = self.env.get(name) {
            return Ok(value.clone());
        }

        // Then check system environment
        match std::env::var(name) {
            Ok(value) => Ok(value),
            Err(_) => default
                .map(str::to_string)
                .ok_or_else(|| SubstitutionError::UndefinedEnv(name.to_string())),
        }
    }

    fn resolve_package_share(&self, package: &str) -> Result<String, SubstitutionError> {
        let share = self.packages.share_dir(package)?;
        Ok(share.to_string_lossy().into_owned())
    }
}

/// Names of all arguments referenced through $(arg ...) in `input`
pub fn referenced_args(input: &str) -> Vec<String> {
    SUBSTITUTION_PATTERN
        .captures_iter(input)
        .filter(|caps| caps.get(1).map(|m| m.as_str()) == Some("arg"))
        .filter_map(|caps| caps.get(2).map(|m| m.as_str().trim().to_string()))
        .collect()
}

/// Errors that can occur during substitution
#[derive(Debug, thiserror::Error)]
pub enum SubstitutionError {
    #[error("Unknown substitution type: {0}")]
    UnknownType(String),

    #[error("Substitution '$({0})' requires a value")]
    MissingValue(String),

    #[error("Undefined argument: {0}")]
    UndefinedArg(String),

    #[error("Undefined environment variable: {0}")]
    UndefinedEnv(String),

    #[error(transparent)]
    Package(#[from] AmentError),
}
