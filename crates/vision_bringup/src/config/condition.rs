//! Activation conditions for launch actions

use crate::config::substitution::{referenced_args, SubstitutionContext, SubstitutionError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Condition guarding an action
///
/// ```yaml
/// condition:
///   unless: "$(arg use_mock_camera)"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ConditionFields", into = "ConditionFields")]
pub enum Condition {
    /// Active when the expression is true
    If(String),
    /// Active when the expression is false
    Unless(String),
}

/// YAML form of a condition: a map with exactly one of `if` / `unless`
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConditionFields {
    #[serde(rename = "if", default, skip_serializing_if = "Option::is_none")]
    when: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    unless: Option<String>,
}

impl TryFrom<ConditionFields> for Condition {
    type Error = String;

    fn try_from(fields: ConditionFields) -> Result<Self, Self::Error> {
        match (fields.when, fields.unless) {
            (Some(expr), None) => Ok(Condition::If(expr)),
            (None, Some(expr)) => Ok(Condition::Unless(expr)),
            (Some(_), Some(_)) => Err("condition cannot set both 'if' and 'unless'".to_string()),
            (None, None) => Err("condition must set 'if' or 'unless'".to_string()),
        }
    }
}

impl From<Condition> for ConditionFields {
    fn from(condition: Condition) -> Self {
        match condition {
            Condition::If(expr) => ConditionFields {
                when: Some(expr),
                unless: None,
            },
            Condition::Unless(expr) => ConditionFields {
                when: None,
                unless: Some(expr),
            },
        }
    }
}

impl Condition {
    pub fn expression(&self) -> &str {
        match self {
            Condition::If(expr) | Condition::Unless(expr) => expr,
        }
    }

    /// Arguments this condition reads
    pub fn referenced_args(&self) -> Vec<String> {
        referenced_args(self.expression())
    }

    /// Substitute the expression and evaluate it as a boolean
    pub fn evaluate(&self, ctx: &SubstitutionContext) -> Result<bool, ConditionError> {
        let expression = self.expression();
        let value = ctx.substitute(expression)?;
        let truth = parse_bool(&value).ok_or_else(|| ConditionError::NotBoolean {
            expression: expression.to_string(),
            value: value.clone(),
        })?;

        Ok(match self {
            Condition::If(_) => truth,
            Condition::Unless(_) => !truth,
        })
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::If(expr) => write!(f, "if {}", expr),
            Condition::Unless(expr) => write!(f, "unless {}", expr),
        }
    }
}

/// Strict boolean parsing: anything else is a configuration error
fn parse_bool(value: &str) -> Option<bool> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("true") || value == "1" {
        Some(true)
    } else if value.eq_ignore_ascii_case("false") || value == "0" {
        Some(false)
    } else {
        None
    }
}

/// Errors that can occur when evaluating a condition
#[derive(Debug, thiserror::Error)]
pub enum ConditionError {
    #[error("Condition '{expression}' evaluated to '{value}', expected true or false")]
    NotBoolean { expression: String, value: String },

    #[error(transparent)]
    Substitution(#[from] SubstitutionError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(use_mock_camera: &str) -> SubstitutionContext {
        SubstitutionContext::new().with_arg("use_mock_camera", use_mock_camera)
    }

    #[test]
    fn test_if_and_unless_are_exclusive() {
        let when = Condition::If("$(arg use_mock_camera)".to_string());
        let unless = Condition::Unless("$(arg use_mock_camera)".to_string());

        for value in ["true", "false"] {
            let ctx = ctx(value);
            let a = when.evaluate(&ctx).unwrap();
            let b = unless.evaluate(&ctx).unwrap();
            assert_ne!(a, b, "value {}", value);
        }
    }

    #[test]
    fn test_boolean_spellings() {
        let cond = Condition::If("$(arg use_mock_camera)".to_string());
        assert!(cond.evaluate(&ctx("True")).unwrap());
        assert!(cond.evaluate(&ctx("1")).unwrap());
        assert!(!cond.evaluate(&ctx("FALSE")).unwrap());
        assert!(!cond.evaluate(&ctx("0")).unwrap());
    }

    #[test]
    fn test_non_boolean_rejected() {
        let cond = Condition::Unless("$(arg use_mock_camera)".to_string());
        assert!(matches!(
            cond.evaluate(&ctx("maybe")),
            Err(ConditionError::NotBoolean { .. })
        ));
    }

    #[test]
    fn test_undefined_arg_rejected() {
        let cond = Condition::If("$(arg rviz)".to_string());
        assert!(matches!(
            cond.evaluate(&ctx("true")),
            Err(ConditionError::Substitution(_))
        ));
    }

    #[test]
    fn test_parse_yaml() {
        let cond: Condition = serde_yaml::from_str("unless: \"$(arg use_mock_camera)\"").unwrap();
        assert_eq!(
            cond,
            Condition::Unless("$(arg use_mock_camera)".to_string())
        );
        assert_eq!(cond.referenced_args(), vec!["use_mock_camera".to_string()]);
        assert_eq!(cond.to_string(), "unless $(arg use_mock_camera)");

        let cond: Condition = serde_yaml::from_str("if: \"$(arg rviz)\"").unwrap();
        assert_eq!(cond, Condition::If("$(arg rviz)".to_string()));
    }

    #[test]
    fn test_parse_yaml_requires_exactly_one_kind() {
        let both = "if: \"$(arg rviz)\"\nunless: \"$(arg rviz)\"";
        assert!(serde_yaml::from_str::<Condition>(both).is_err());
        assert!(serde_yaml::from_str::<Condition>("{}").is_err());
        assert!(serde_yaml::from_str::<Condition>("when: \"true\"").is_err());
    }

    #[test]
    fn test_serialize_as_map() {
        let cond = Condition::If("$(arg rviz)".to_string());
        let json = serde_json::to_value(&cond).unwrap();
        assert_eq!(json, serde_json::json!({ "if": "$(arg rviz)" }));
    }
}
