//! The container engine seam used by the verification engine.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::DockerError;

/// Arguments for building an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    /// Tag assigned to the built image.
    pub tag: String,
    /// Path to the Dockerfile.
    pub dockerfile: PathBuf,
    /// Build context directory.
    pub context: PathBuf,
    /// Build arguments in `NAME=VALUE` form.
    pub build_args: Vec<String>,
}

impl BuildRequest {
    pub fn new(
        tag: impl Into<String>,
        dockerfile: impl Into<PathBuf>,
        context: impl Into<PathBuf>,
    ) -> Self {
        Self {
            tag: tag.into(),
            dockerfile: dockerfile.into(),
            context: context.into(),
            build_args: Vec::new(),
        }
    }

    /// Adds a `NAME=VALUE` build argument.
    pub fn with_build_arg(mut self, name: &str, value: &str) -> Self {
        self.build_args.push(format!("{name}={value}"));
        self
    }
}

/// Arguments for running a container to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    /// Image to start.
    pub image: String,
    /// Name given to the container.
    pub container_name: String,
    /// Entrypoint override.
    pub entrypoint: Option<String>,
    /// Command (arguments after the image). Empty runs the image default.
    pub command: Vec<String>,
}

impl RunRequest {
    pub fn new(image: impl Into<String>, container_name: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            container_name: container_name.into(),
            entrypoint: None,
            command: Vec::new(),
        }
    }

    pub fn with_entrypoint(mut self, entrypoint: impl Into<String>) -> Self {
        self.entrypoint = Some(entrypoint.into());
        self
    }

    pub fn with_command(mut self, command: Vec<String>) -> Self {
        self.command = command;
        self
    }
}

/// Operations the verification engine needs from a container engine.
///
/// Each call completes (or fails) before returning; callers impose any
/// timeout around the call.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Builds an image. A non-success result is a hard failure.
    async fn build(&self, request: &BuildRequest) -> Result<(), DockerError>;

    /// Runs a container to completion and returns its captured stdout.
    async fn run(&self, request: &RunRequest) -> Result<String, DockerError>;

    /// Probes for a local image. Never fails; absence is `false`.
    async fn image_exists(&self, image: &str) -> bool;

    /// Deletes an image.
    async fn delete_image(&self, tag: &str) -> Result<(), DockerError>;

    /// Deletes an image without awaiting the result.
    ///
    /// Used from `Drop` when a derived image was never explicitly released.
    fn delete_image_detached(&self, tag: &str);
}
