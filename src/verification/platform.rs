//! Container OS mode: POSIX shell or Windows command interpreter.

use serde::{Deserialize, Serialize};

/// Delimiter placed between echoed environment values.
pub const ENV_DELIMITER: char = '|';

/// Which shell syntax containers understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerPlatform {
    Linux,
    Windows,
}

impl ContainerPlatform {
    /// Selects the platform from the "Linux containers enabled" flag.
    pub fn from_linux_enabled(linux_containers: bool) -> Self {
        if linux_containers {
            Self::Linux
        } else {
            Self::Windows
        }
    }

    /// Entrypoint override used to run shell commands.
    pub fn shell(&self) -> &'static str {
        match self {
            Self::Linux => "/bin/sh",
            Self::Windows => "cmd",
        }
    }

    /// Arguments that make `shell()` run `script` and exit.
    pub fn shell_args(&self, script: String) -> Vec<String> {
        match self {
            Self::Linux => vec!["-c".to_string(), script],
            Self::Windows => vec!["/S".to_string(), "/C".to_string(), script],
        }
    }

    /// Script that echoes the named variables joined by `ENV_DELIMITER`.
    pub fn echo_variables_script(&self, names: &[&str]) -> String {
        match self {
            Self::Linux => {
                let separator = ENV_DELIMITER.to_string();
                let joined = names
                    .iter()
                    .map(|name| format!("${{{name}}}"))
                    .collect::<Vec<_>>()
                    .join(separator.as_str());
                format!("echo \"{joined}\"")
            }
            Self::Windows => {
                // `|` is a pipe in cmd unless escaped with `^`
                let separator = format!("^{ENV_DELIMITER}");
                let joined = names
                    .iter()
                    .map(|name| format!("%{name}%"))
                    .collect::<Vec<_>>()
                    .join(separator.as_str());
                format!("echo {joined}")
            }
        }
    }

    /// Maps an echoed token back to the variable's value.
    ///
    /// cmd leaves `%NAME%` untouched when `NAME` is unset, so that literal
    /// is treated as the empty string.
    pub fn normalize_token<'a>(&self, name: &str, token: &'a str) -> &'a str {
        match self {
            Self::Windows if token == format!("%{name}%") => "",
            _ => token,
        }
    }
}

impl std::fmt::Display for ContainerPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Linux => write!(f, "linux"),
            Self::Windows => write!(f, "windows"),
        }
    }
}
