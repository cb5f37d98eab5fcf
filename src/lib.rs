//! image-matrix: verification and maintenance tooling for .NET Framework
//! container images.
//!
//! This library selects image variants from a declared matrix, drives
//! build/run/inspect cycles against a container engine, and updates image
//! date stamps.

pub mod cli;
pub mod error;
pub mod execution;
pub mod matrix;
pub mod update;
pub mod verification;

// Re-export commonly used error types
pub use error::{DockerError, MatrixError, UpdateError, VerificationError};
