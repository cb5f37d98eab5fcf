//! `image-matrix` binary.

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Logs go to stderr so `--json` output on stdout stays machine-readable.
/// `RUST_LOG` wins over `--log-level`.
fn init_tracing(log_level: &str) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(log_level)
            .with_context(|| format!("Invalid --log-level '{log_level}'"))?,
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = image_matrix::cli::parse_cli();
    init_tracing(&cli.log_level)?;
    image_matrix::cli::run_with_cli(cli).await
}
