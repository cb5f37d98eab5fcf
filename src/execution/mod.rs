//! Container engine layer for image verification.
//!
//! The verification engine talks to containers only through the
//! [`ContainerEngine`] trait. [`DockerCli`] implements it by invoking the
//! Docker CLI; every call waits for the CLI process to exit.
//!
//! Images built during a case are held by a [`DerivedImage`] guard:
//! ```text
//! reserve tag → build → run → assert → release (delete)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use image_matrix::execution::{DockerCli, ContainerEngine, RunRequest};
//!
//! let docker = DockerCli::new();
//! let stdout = docker.run(&RunRequest::new("microsoft/dotnet-framework:4.7.1", "probe")).await?;
//! ```

pub mod derived_image;
pub mod docker_cli;
pub mod engine;

pub use derived_image::{unique_image_id, DerivedImage};
pub use docker_cli::DockerCli;
pub use engine::{BuildRequest, ContainerEngine, RunRequest};
