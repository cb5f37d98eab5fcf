//! Error types for image-matrix operations.
//!
//! Defines error types for each subsystem:
//! - Matrix loading and filter compilation
//! - Container engine calls (build, run, inspect, delete)
//! - Per-case verification assertions
//! - Date-stamp updates and pull request submission

use thiserror::Error;

/// Errors that can occur while loading or filtering the image matrix.
#[derive(Debug, Error)]
pub enum MatrixError {
    #[error("Invalid filter pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Duplicate image descriptor in matrix: {0}")]
    DuplicateDescriptor(String),

    #[error("Unsupported matrix file format '{0}': expected .yaml, .yml or .json")]
    UnsupportedFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Errors that can occur during Docker operations.
#[derive(Debug, Error)]
pub enum DockerError {
    #[error("Docker build of '{tag}' failed: {reason}")]
    BuildFailed { tag: String, reason: String },

    #[error("Docker run of '{image}' failed: {reason}")]
    RunFailed { image: String, reason: String },

    #[error("Failed to delete image '{tag}': {reason}")]
    DeleteFailed { tag: String, reason: String },

    #[error("Docker command timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that fail a single verification case.
///
/// None of these halt the rest of the matrix; the engine records them per case.
#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("`{image}` could not be found on disk.")]
    MissingBaseImage { image: String },

    #[error(transparent)]
    Docker(#[from] DockerError),

    #[error("Environment variable '{name}': expected '{expected}', actual '{actual}'")]
    EnvironmentVariableMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("Invalid environment variable name '{name}': expected [A-Za-z_][A-Za-z0-9_]*")]
    InvalidVariableName { name: String },

    #[error("Environment variable '{name}' is expected to have a value but was empty")]
    EnvironmentVariableEmpty { name: String },

    #[error("Expected {expected} delimited values from '{image}', got {actual}: '{output}'")]
    UnexpectedOutputShape {
        image: String,
        expected: usize,
        actual: usize,
        output: String,
    },

    #[error("Native image queue in '{image}' has pending entries ('{marker}' found in output)")]
    StaleNgenQueue { image: String, marker: String },
}

/// Errors that can occur while updating date stamps or opening a pull request.
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("Manifest '{0}' has no 'variables' object")]
    MissingVariables(String),

    #[error("git {command} failed: {stderr}")]
    GitFailed { command: String, stderr: String },

    #[error("GitHub API returned {status}: {body}")]
    GitHubApi { status: u16, body: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
