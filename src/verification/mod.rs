//! Image verification flows.
//!
//! For each selected [`ImageDescriptor`](crate::matrix::ImageDescriptor) the
//! [`VerificationEngine`] runs a fixed set of independent flows:
//!
//! - `app`: build a console app from the build + runtime base images, run it
//! - `web-app`: build a web app from the build base image, run it
//! - `runtime-env` / `build-env`: echo environment variables in a container
//!   and compare them with the expected values
//! - `ngen`: list the native image queues and fail on pending entries
//!
//! Every image built by a flow is deleted before the flow returns, whether
//! the build, the run, or an assertion failed.

pub mod engine;
pub mod env_vars;
pub mod ngen;
pub mod platform;
pub mod report;

pub use engine::{VerificationEngine, VerificationSettings};
pub use env_vars::{
    build_image_defaults, check_environment_output, runtime_image_defaults, EnvironmentVariable,
    ExpectedValue,
};
pub use platform::ContainerPlatform;
pub use report::{CaseReport, CaseStage, CaseStatus, Flow, VerificationReport};
