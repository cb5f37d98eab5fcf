//! Options for the date-stamp update.

use serde::Serialize;

/// Repository the pull request targets.
pub const GITHUB_PROJECT: &str = "dotnet-framework-docker";
pub const GITHUB_UPSTREAM_OWNER: &str = "Microsoft";
pub const GITHUB_UPSTREAM_BRANCH: &str = "main";

/// Image families that carry their own date stamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    Runtime,
    Sdk,
    Aspnet,
    Wcf,
}

impl ImageKind {
    pub const ALL: [ImageKind; 4] = [
        ImageKind::Runtime,
        ImageKind::Sdk,
        ImageKind::Aspnet,
        ImageKind::Wcf,
    ];

    /// Prefix used by this kind's manifest variables.
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageKind::Runtime => "runtime",
            ImageKind::Sdk => "sdk",
            ImageKind::Aspnet => "aspnet",
            ImageKind::Wcf => "wcf",
        }
    }

    pub fn from_variable_prefix(prefix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == prefix)
    }
}

/// GitHub identity used to push a branch and open the pull request.
#[derive(Debug, Clone)]
pub struct GitHubCredentials {
    pub user: String,
    pub email: String,
    pub password: String,
}

/// Date stamps to apply and, optionally, who submits the change.
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    pub datestamp_all: Option<String>,
    pub datestamp_runtime: Option<String>,
    pub datestamp_sdk: Option<String>,
    pub datestamp_aspnet: Option<String>,
    pub datestamp_wcf: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub user: Option<String>,
}

impl UpdateOptions {
    /// The date stamp for `kind`; a kind-specific stamp overrides `datestamp_all`.
    pub fn datestamp_for(&self, kind: ImageKind) -> Option<&str> {
        let specific = match kind {
            ImageKind::Runtime => &self.datestamp_runtime,
            ImageKind::Sdk => &self.datestamp_sdk,
            ImageKind::Aspnet => &self.datestamp_aspnet,
            ImageKind::Wcf => &self.datestamp_wcf,
        };
        specific.as_deref().or(self.datestamp_all.as_deref())
    }

    /// True unless email, password and user are all given.
    pub fn update_only(&self) -> bool {
        self.credentials().is_none()
    }

    pub fn credentials(&self) -> Option<GitHubCredentials> {
        Some(GitHubCredentials {
            user: self.user.clone()?,
            email: self.email.clone()?,
            password: self.password.clone()?,
        })
    }
}
