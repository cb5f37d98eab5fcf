//! The image matrix: descriptors, glob filters and selection.

pub mod descriptor;
pub mod filter;
pub mod provider;

pub use descriptor::{default_matrix, ImageDescriptor, DEFAULT_REPO_OWNER, WSC_1709, WSC_LTSC2016};
pub use filter::{glob_to_regex, GlobFilter};
pub use provider::{MatrixFilters, MatrixProvider, OS_FILTER_ENV, VERSION_FILTER_ENV};
