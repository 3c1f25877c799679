//! Launch argument declarations and resolution

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Declared launch argument
///
/// Values are kept as the scalar text written in the file, so `1.0` stays
/// `"1.0"` and `false` stays `"false"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArgDeclaration {
    /// Default value; an argument without one must be supplied at launch
    #[serde(default)]
    pub default: Option<String>,
    /// Optional description
    #[serde(default)]
    pub description: Option<String>,
    /// Allowed values, if restricted
    #[serde(default)]
    pub choices: Option<Vec<String>>,
}

impl ArgDeclaration {
    pub fn default_value(&self) -> Option<String> {
        self.default.clone()
    }

    /// Allowed values
    pub fn choice_values(&self) -> Option<Vec<String>> {
        self.choices.clone()
    }

    /// Check `value` against the declared choices
    pub fn check(&self, name: &str, value: &str) -> Result<(), ArgumentError> {
        match self.choice_values() {
            Some(choices) if !choices.iter().any(|c| c == value) => {
                Err(ArgumentError::InvalidChoice {
                    name: name.to_string(),
                    value: value.to_string(),
                    choices,
                })
            }
            _ => Ok(()),
        }
    }
}

/// Argument values after defaults and overrides were applied and validated
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ResolvedArgs(IndexMap<String, String>);

impl ResolvedArgs {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Iterate in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Resolve overrides against declarations
///
/// Later overrides of the same name win. Every value, including defaults,
/// is checked against its declared choices.
pub fn resolve_args(
    declarations: &IndexMap<String, ArgDeclaration>,
    overrides: &[(String, String)],
) -> Result<ResolvedArgs, ArgumentError> {
    let mut supplied: IndexMap<&str, &str> = IndexMap::new();
    for (name, value) in overrides {
        if !declarations.contains_key(name) {
            return Err(ArgumentError::UnknownArgument(name.clone()));
        }
        supplied.insert(name.as_str(), value.as_str());
    }

    let mut resolved = IndexMap::new();
    for (name, declaration) in declarations {
        let value = match supplied.get(name.as_str()) {
            Some(value) => value.to_string(),
            None => declaration
                .default_value()
                .ok_or_else(|| ArgumentError::MissingArgument(name.clone()))?,
        };

        declaration.check(name, &value)?;
        resolved.insert(name.clone(), value);
    }

    Ok(ResolvedArgs(resolved))
}

/// Errors that can occur when resolving launch arguments
#[derive(Debug, thiserror::Error)]
pub enum ArgumentError {
    #[error("Unknown argument: {0}")]
    UnknownArgument(String),

    #[error("Argument '{0}' has no default and was not provided")]
    MissingArgument(String),

    #[error("Argument '{name}' provided value '{value}' is not valid. Valid options are: [{}]", .choices.join(", "))]
    InvalidChoice {
        name: String,
        value: String,
        choices: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn declarations() -> IndexMap<String, ArgDeclaration> {
        serde_yaml::from_str(
            r#"
use_mock_camera:
  default: "false"
  choices: ["true", "false"]
rviz:
  default: false
  choices: [true, false]
serial:
  description: "camera serial number"
"#,
        )
        .unwrap()
    }

    fn pair(name: &str, value: &str) -> (String, String) {
        (name.to_string(), value.to_string())
    }

    #[test]
    fn test_defaults_apply() {
        let resolved = resolve_args(&declarations(), &[pair("serial", "123")]).unwrap();
        assert_eq!(resolved.get("use_mock_camera"), Some("false"));
        assert_eq!(resolved.get("rviz"), Some("false"));
        assert_eq!(resolved.get("serial"), Some("123"));
    }

    #[test]
    fn test_declaration_order_kept() {
        let resolved = resolve_args(&declarations(), &[pair("serial", "1")]).unwrap();
        let names: Vec<_> = resolved.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["use_mock_camera", "rviz", "serial"]);
    }

    #[test]
    fn test_last_override_wins() {
        let overrides = [
            pair("serial", "1"),
            pair("rviz", "true"),
            pair("rviz", "false"),
        ];
        let resolved = resolve_args(&declarations(), &overrides).unwrap();
        assert_eq!(resolved.get("rviz"), Some("false"));
    }

    #[test]
    fn test_invalid_choice() {
        let overrides = [pair("serial", "1"), pair("use_mock_camera", "maybe")];
        let err = resolve_args(&declarations(), &overrides).unwrap_err();
        match err {
            ArgumentError::InvalidChoice {
                name,
                value,
                choices,
            } => {
                assert_eq!(name, "use_mock_camera");
                assert_eq!(value, "maybe");
                assert_eq!(choices, vec!["true".to_string(), "false".to_string()]);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_choices_are_case_sensitive() {
        let overrides = [pair("serial", "1"), pair("rviz", "True")];
        assert!(matches!(
            resolve_args(&declarations(), &overrides),
            Err(ArgumentError::InvalidChoice { .. })
        ));
    }

    #[test]
    fn test_unknown_argument() {
        let overrides = [pair("camera", "front")];
        assert!(matches!(
            resolve_args(&declarations(), &overrides),
            Err(ArgumentError::UnknownArgument(_))
        ));
    }

    #[test]
    fn test_scalar_text_is_kept() {
        let declarations: IndexMap<String, ArgDeclaration> = serde_yaml::from_str(
            r#"
fps:
  default: 1.0
  choices: [1.0, 2.5, 30]
"#,
        )
        .unwrap();

        let fps = &declarations["fps"];
        assert_eq!(fps.default_value().as_deref(), Some("1.0"));
        assert_eq!(
            fps.choice_values(),
            Some(vec!["1.0".to_string(), "2.5".to_string(), "30".to_string()])
        );

        let resolved = resolve_args(&declarations, &[]).unwrap();
        assert_eq!(resolved.get("fps"), Some("1.0"));
        assert!(resolve_args(&declarations, &[pair("fps", "1.0")]).is_ok());
        assert!(resolve_args(&declarations, &[pair("fps", "1")]).is_err());
    }

    #[test]
    fn test_unknown_declaration_key_rejected() {
        let result: Result<IndexMap<String, ArgDeclaration>, _> =
            serde_yaml::from_str("rviz:\n  defualt: \"false\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_required_argument() {
        assert!(matches!(
            resolve_args(&declarations(), &[]),
            Err(ArgumentError::MissingArgument(name)) if name == "serial"
        ));
    }
}
