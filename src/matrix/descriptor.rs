//! Image descriptors: one cell of the verification matrix.

use serde::{Deserialize, Serialize};

/// Windows Server Core LTSC 2016 variant tag.
pub const WSC_LTSC2016: &str = "windowsservercore-ltsc2016";
/// Windows Server Core 1709 variant tag.
pub const WSC_1709: &str = "windowsservercore-1709";

/// Default namespace prefix for base image tags.
pub const DEFAULT_REPO_OWNER: &str = "microsoft";

const BUILD_REPO: &str = "dotnet-framework-build";
const RUNTIME_REPO: &str = "dotnet-framework";

/// Identifies one runtime/build version pair on one OS variant.
///
/// Immutable once constructed; identity is the full triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDescriptor {
    runtime_version: String,
    build_version: String,
    os_variant: String,
}

impl ImageDescriptor {
    pub fn new(
        runtime_version: impl Into<String>,
        build_version: impl Into<String>,
        os_variant: impl Into<String>,
    ) -> Self {
        Self {
            runtime_version: runtime_version.into(),
            build_version: build_version.into(),
            os_variant: os_variant.into(),
        }
    }

    pub fn runtime_version(&self) -> &str {
        &self.runtime_version
    }

    pub fn build_version(&self) -> &str {
        &self.build_version
    }

    pub fn os_variant(&self) -> &str {
        &self.os_variant
    }

    /// Tag of the published build (SDK) image this descriptor depends on.
    ///
    /// Format: `{owner}/dotnet-framework-build:{buildVersion}-{osVariant}`.
    pub fn base_build_image(&self, repo_owner: &str) -> String {
        format!(
            "{repo_owner}/{BUILD_REPO}:{}-{}",
            self.build_version, self.os_variant
        )
    }

    /// Tag of the published runtime image this descriptor depends on.
    ///
    /// Format: `{owner}/dotnet-framework:{runtimeVersion}-{osVariant}`.
    pub fn base_runtime_image(&self, repo_owner: &str) -> String {
        format!(
            "{repo_owner}/{RUNTIME_REPO}:{}-{}",
            self.runtime_version, self.os_variant
        )
    }
}

impl std::fmt::Display for ImageDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "runtime {} / build {} / {}",
            self.runtime_version, self.build_version, self.os_variant
        )
    }
}

/// The built-in matrix, in declaration order.
pub fn default_matrix() -> Vec<ImageDescriptor> {
    vec![
        ImageDescriptor::new("3.5", "3.5", WSC_LTSC2016),
        ImageDescriptor::new("3.5", "3.5", WSC_1709),
        ImageDescriptor::new("4.6.2", "4.7.1", WSC_LTSC2016),
        ImageDescriptor::new("4.7", "4.7.1", WSC_LTSC2016),
        ImageDescriptor::new("4.7.1", "4.7.1", WSC_LTSC2016),
        ImageDescriptor::new("4.7.1", "4.7.1", WSC_1709),
    ]
}
