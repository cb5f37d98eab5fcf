//! Command-line interface for image-matrix.
//!
//! Provides commands for listing and verifying the image matrix and for
//! updating image date stamps.

mod commands;

pub use commands::{parse_cli, run, run_with_cli};
