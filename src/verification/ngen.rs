//! Native image generation (NGEN) queue checks.

use crate::error::VerificationError;
use crate::verification::platform::ContainerPlatform;

/// 32-bit and 64-bit ngen.exe locations inside Windows images.
pub const NGEN_PATHS: [&str; 2] = [
    r"%WINDIR%\Microsoft.NET\Framework\v4.0.30319\ngen.exe",
    r"%WINDIR%\Microsoft.NET\Framework64\v4.0.30319\ngen.exe",
];

/// Printed by `ngen display` for queue entries that were never compiled.
pub const PENDING_MARKER: &str = "(StatusPending)";

/// Script that displays both queues in one container run.
pub fn queue_display_script() -> String {
    NGEN_PATHS
        .iter()
        .map(|path| format!("{path} display"))
        .collect::<Vec<_>>()
        .join(" & ")
}

/// Entrypoint and arguments for the queue display run.
pub fn queue_display_command() -> (&'static str, Vec<String>) {
    let platform = ContainerPlatform::Windows;
    (platform.shell(), platform.shell_args(queue_display_script()))
}

/// Fails if the captured queue listing contains a pending entry.
pub fn check_queue_output(image: &str, output: &str) -> Result<(), VerificationError> {
    if output.contains(PENDING_MARKER) {
        return Err(VerificationError::StaleNgenQueue {
            image: image.to_string(),
            marker: PENDING_MARKER.to_string(),
        });
    }
    Ok(())
}
