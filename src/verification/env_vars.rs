//! Environment-variable expectations and their verification against echoed output.

use serde::{Deserialize, Serialize};

use crate::error::VerificationError;
use crate::verification::platform::{ContainerPlatform, ENV_DELIMITER};

/// What a variable's value must be.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpectedValue {
    /// Exactly this string.
    Exact(String),
    /// Anything non-empty.
    AnyNonEmpty,
}

/// A named environment variable and its expected value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentVariable {
    pub name: String,
    pub expected: ExpectedValue,
}

impl EnvironmentVariable {
    pub fn exact(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expected: ExpectedValue::Exact(value.into()),
        }
    }

    pub fn any(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expected: ExpectedValue::AnyNonEmpty,
        }
    }

    /// Parses `NAME=VALUE` (exact) or `NAME` (any non-empty value).
    ///
    /// The name must be a shell identifier so it can be expanded on both platforms.
    pub fn parse(entry: &str) -> Result<Self, VerificationError> {
        let (name, value) = match entry.split_once('=') {
            Some((name, value)) => (name.trim(), Some(value)),
            None => (entry.trim(), None),
        };
        if !is_identifier(name) {
            return Err(VerificationError::InvalidVariableName {
                name: name.to_string(),
            });
        }
        Ok(match value {
            Some(value) => Self::exact(name, value),
            None => Self::any(name),
        })
    }

    fn check(&self, actual: &str) -> Result<(), VerificationError> {
        match &self.expected {
            ExpectedValue::Exact(expected) if expected != actual => {
                Err(VerificationError::EnvironmentVariableMismatch {
                    name: self.name.clone(),
                    expected: expected.clone(),
                    actual: actual.to_string(),
                })
            }
            ExpectedValue::AnyNonEmpty if actual.is_empty() => {
                Err(VerificationError::EnvironmentVariableEmpty {
                    name: self.name.clone(),
                })
            }
            _ => Ok(()),
        }
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Variables every runtime image must define.
pub fn runtime_image_defaults() -> Vec<EnvironmentVariable> {
    vec![EnvironmentVariable::exact(
        "COMPLUS_NGenProtectedProcess_FeatureEnabled",
        "0",
    )]
}

/// Variables every build (SDK) image must define.
pub fn build_image_defaults() -> Vec<EnvironmentVariable> {
    vec![EnvironmentVariable::any("ROSLYN_COMPILER_LOCATION")]
}

/// Checks echoed output positionally against `expected`.
pub fn check_environment_output(
    platform: ContainerPlatform,
    image: &str,
    expected: &[EnvironmentVariable],
    output: &str,
) -> Result<(), VerificationError> {
    let line = output.trim_end_matches(['\r', '\n']);
    let tokens: Vec<&str> = line.split(ENV_DELIMITER).collect();

    if tokens.len() != expected.len() {
        return Err(VerificationError::UnexpectedOutputShape {
            image: image.to_string(),
            expected: expected.len(),
            actual: tokens.len(),
            output: line.to_string(),
        });
    }

    for (variable, token) in expected.iter().zip(tokens) {
        variable.check(platform.normalize_token(&variable.name, token))?;
    }
    Ok(())
}
