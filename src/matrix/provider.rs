//! Matrix selection: the declared descriptor list narrowed by optional
//! OS-variant and runtime-version globs.

use std::collections::HashSet;
use std::path::Path;

use tracing::debug;

use crate::error::MatrixError;
use crate::matrix::descriptor::{default_matrix, ImageDescriptor};
use crate::matrix::filter::{admits, GlobFilter};

/// Environment variable holding the OS-variant glob.
pub const OS_FILTER_ENV: &str = "IMAGE_OS_FILTER";
/// Environment variable holding the runtime-version glob.
pub const VERSION_FILTER_ENV: &str = "IMAGE_VERSION_FILTER";

/// Optional OS and version filters, combined with logical AND.
#[derive(Debug, Clone, Default)]
pub struct MatrixFilters {
    pub os: Option<GlobFilter>,
    pub version: Option<GlobFilter>,
}

impl MatrixFilters {
    /// Filters that admit every descriptor.
    pub fn none() -> Self {
        Self::default()
    }

    /// Compiles filters from raw patterns. `None` means "not specified".
    pub fn from_patterns(os: Option<&str>, version: Option<&str>) -> Result<Self, MatrixError> {
        Ok(Self {
            os: os.map(GlobFilter::new).transpose()?,
            version: version.map(GlobFilter::new).transpose()?,
        })
    }

    /// Reads `IMAGE_OS_FILTER` and `IMAGE_VERSION_FILTER`.
    ///
    /// An unset variable is no filter; a set-but-empty one is an exact match
    /// against the empty string.
    pub fn from_env() -> Result<Self, MatrixError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`MatrixFilters::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, MatrixError> {
        let os = lookup(OS_FILTER_ENV);
        let version = lookup(VERSION_FILTER_ENV);
        Self::from_patterns(os.as_deref(), version.as_deref())
    }

    /// Replaces each filter for which a pattern is given.
    pub fn with_overrides(
        self,
        os: Option<&str>,
        version: Option<&str>,
    ) -> Result<Self, MatrixError> {
        let overrides = Self::from_patterns(os, version)?;
        Ok(Self {
            os: overrides.os.or(self.os),
            version: overrides.version.or(self.version),
        })
    }

    pub fn admits(&self, descriptor: &ImageDescriptor) -> bool {
        admits(self.os.as_ref(), descriptor.os_variant())
            && admits(self.version.as_ref(), descriptor.runtime_version())
    }
}

/// The immutable, declared list of image descriptors.
#[derive(Debug, Clone)]
pub struct MatrixProvider {
    descriptors: Vec<ImageDescriptor>,
}

impl MatrixProvider {
    /// Builds a provider from a declared list, rejecting duplicate triples.
    pub fn new(descriptors: Vec<ImageDescriptor>) -> Result<Self, MatrixError> {
        let mut seen = HashSet::new();
        for descriptor in &descriptors {
            if !seen.insert(descriptor) {
                return Err(MatrixError::DuplicateDescriptor(descriptor.to_string()));
            }
        }
        Ok(Self { descriptors })
    }

    /// The built-in matrix.
    pub fn builtin() -> Self {
        Self {
            descriptors: default_matrix(),
        }
    }

    /// Loads a matrix from a YAML or JSON file containing a list of descriptors.
    pub fn from_file(path: &Path) -> Result<Self, MatrixError> {
        let content = std::fs::read_to_string(path)?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        let descriptors: Vec<ImageDescriptor> = match extension.as_str() {
            "yaml" | "yml" => serde_yaml::from_str(&content)?,
            "json" => serde_json::from_str(&content)?,
            other => return Err(MatrixError::UnsupportedFormat(other.to_string())),
        };

        debug!(path = %path.display(), count = descriptors.len(), "Loaded image matrix");
        Self::new(descriptors)
    }

    /// Every declared descriptor, in declaration order.
    pub fn all(&self) -> &[ImageDescriptor] {
        &self.descriptors
    }

    /// Descriptors admitted by `filters`, in declaration order.
    ///
    /// Selecting nothing is not an error.
    pub fn select(&self, filters: &MatrixFilters) -> Vec<ImageDescriptor> {
        let selected: Vec<ImageDescriptor> = self
            .descriptors
            .iter()
            .filter(|d| filters.admits(d))
            .cloned()
            .collect();

        debug!(
            declared = self.descriptors.len(),
            selected = selected.len(),
            os_filter = ?filters.os.as_ref().map(GlobFilter::pattern),
            version_filter = ?filters.version.as_ref().map(GlobFilter::pattern),
            "Selected image matrix"
        );
        selected
    }
}
