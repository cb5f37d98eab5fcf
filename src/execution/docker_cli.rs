//! `ContainerEngine` implementation that shells out to the Docker CLI.

use std::process::{Output, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::DockerError;
use crate::execution::engine::{BuildRequest, ContainerEngine, RunRequest};

const DEFAULT_BINARY: &str = "docker";
const MAX_REASON_LEN: usize = 2_000;

/// Docker CLI wrapper.
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
    timeout: Option<Duration>,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new()
    }
}

impl DockerCli {
    /// Uses `docker` from `PATH` with no timeout.
    pub fn new() -> Self {
        Self {
            binary: DEFAULT_BINARY.to_string(),
            timeout: None,
        }
    }

    /// Uses a different CLI binary (e.g. `podman`).
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Bounds every CLI invocation. The child is killed when the bound expires.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    async fn execute(&self, args: &[String]) -> Result<Output, DockerError> {
        debug!(binary = %self.binary, args = ?args, "Executing container engine command");

        let output = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, output)
                .await
                .map_err(|_| DockerError::Timeout {
                    seconds: timeout.as_secs(),
                })??,
            None => output.await?,
        };

        debug!(
            status = ?output.status.code(),
            stdout = %String::from_utf8_lossy(&output.stdout),
            stderr = %String::from_utf8_lossy(&output.stderr),
            "Container engine command finished"
        );
        Ok(output)
    }
}

/// CLI arguments for `docker build`.
pub fn build_args(request: &BuildRequest) -> Vec<String> {
    let mut args = vec![
        "build".to_string(),
        "-t".to_string(),
        request.tag.clone(),
        "-f".to_string(),
        request.dockerfile.display().to_string(),
    ];
    for arg in &request.build_args {
        args.push("--build-arg".to_string());
        args.push(arg.clone());
    }
    args.push(request.context.display().to_string());
    args
}

/// CLI arguments for `docker run`. Containers are removed on exit.
pub fn run_args(request: &RunRequest) -> Vec<String> {
    let mut args = vec![
        "run".to_string(),
        "--rm".to_string(),
        "--name".to_string(),
        request.container_name.clone(),
    ];
    if let Some(entrypoint) = &request.entrypoint {
        args.push("--entrypoint".to_string());
        args.push(entrypoint.clone());
    }
    args.push(request.image.clone());
    args.extend(request.command.iter().cloned());
    args
}

fn failure_reason(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let reason = if stderr.trim().is_empty() {
        format!("exit code {:?}", output.status.code())
    } else {
        stderr.trim().to_string()
    };
    truncate(&reason, MAX_REASON_LEN)
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) && end > 0 {
            end -= 1;
        }
        format!("{}...", &s[..end])
    }
}

#[async_trait]
impl ContainerEngine for DockerCli {
    async fn build(&self, request: &BuildRequest) -> Result<(), DockerError> {
        let output = self.execute(&build_args(request)).await?;
        if !output.status.success() {
            return Err(DockerError::BuildFailed {
                tag: request.tag.clone(),
                reason: failure_reason(&output),
            });
        }
        Ok(())
    }

    async fn run(&self, request: &RunRequest) -> Result<String, DockerError> {
        let output = self.execute(&run_args(request)).await?;
        if !output.status.success() {
            return Err(DockerError::RunFailed {
                image: request.image.clone(),
                reason: failure_reason(&output),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    async fn image_exists(&self, image: &str) -> bool {
        let args = ["image", "inspect", image].map(String::from);
        match self.execute(&args).await {
            Ok(output) => output.status.success(),
            Err(e) => {
                debug!(image = %image, error = %e, "Image inspect failed");
                false
            }
        }
    }

    async fn delete_image(&self, tag: &str) -> Result<(), DockerError> {
        let args = ["image", "rm", "-f", tag].map(String::from);
        let output = self.execute(&args).await?;
        if !output.status.success() {
            return Err(DockerError::DeleteFailed {
                tag: tag.to_string(),
                reason: failure_reason(&output),
            });
        }
        Ok(())
    }

    fn delete_image_detached(&self, tag: &str) {
        let binary = self.binary.clone();
        let tag = tag.to_string();
        // Fire-and-forget: no async in Drop
        std::thread::spawn(move || {
            let _ = std::process::Command::new(binary)
                .args(["image", "rm", "-f", &tag])
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status();
        });
    }
}
