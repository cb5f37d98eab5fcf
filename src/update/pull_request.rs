//! Pull request submission for date-stamp updates.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tokio::process::Command;
use tracing::info;

use crate::error::UpdateError;
use crate::update::manifest::DatestampChange;
use crate::update::options::{
    GitHubCredentials, GITHUB_PROJECT, GITHUB_UPSTREAM_BRANCH, GITHUB_UPSTREAM_OWNER,
};

const GITHUB_API: &str = "https://api.github.com";
const USER_AGENT: &str = concat!("image-matrix/", env!("CARGO_PKG_VERSION"));

/// Content of a pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    pub branch: String,
    pub title: String,
    pub body: String,
}

impl PullRequest {
    /// Describes a set of date-stamp changes.
    pub fn for_changes(changes: &[DatestampChange]) -> Self {
        let mut body = String::from("Updates the following date stamps:\n\n");
        for change in changes {
            body.push_str(&format!(
                "- `{}`: {} → {}\n",
                change.variable,
                change.previous.as_deref().unwrap_or("(unset)"),
                change.updated
            ));
        }

        Self {
            branch: format!("update-datestamps-{}", Utc::now().format("%Y%m%d%H%M%S")),
            title: "Update image date stamps".to_string(),
            body,
        }
    }
}

/// Publishes committed changes as a pull request.
#[async_trait]
pub trait PullRequestSubmitter: Send + Sync {
    /// Commits `files` in `repo_dir` and opens the pull request.
    ///
    /// Returns the pull request URL.
    async fn submit(
        &self,
        repo_dir: &Path,
        files: &[PathBuf],
        request: &PullRequest,
    ) -> Result<String, UpdateError>;
}

#[derive(Debug, Deserialize)]
struct CreatedPullRequest {
    html_url: String,
}

/// Pushes to the user's fork with `git` and opens the PR with the GitHub REST API.
pub struct GitHubPullRequestSubmitter {
    client: Client,
    credentials: GitHubCredentials,
}

impl GitHubPullRequestSubmitter {
    pub fn new(credentials: GitHubCredentials) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .user_agent(USER_AGENT)
                .build()
                .unwrap_or_else(|_| Client::new()),
            credentials,
        }
    }

    fn fork_url(&self) -> String {
        format!(
            "https://{}:{}@github.com/{}/{GITHUB_PROJECT}.git",
            urlencoding::encode(&self.credentials.user),
            urlencoding::encode(&self.credentials.password),
            self.credentials.user
        )
    }

    /// Masks the password, raw or percent-encoded, in git output.
    fn scrub(&self, text: &str) -> String {
        let password = &self.credentials.password;
        if password.is_empty() {
            return text.to_string();
        }
        text.replace(&*urlencoding::encode(password), "***")
            .replace(password.as_str(), "***")
    }

    async fn git(&self, repo_dir: &Path, args: &[&str]) -> Result<(), UpdateError> {
        let output = Command::new("git")
            .current_dir(repo_dir)
            .args(args)
            .output()
            .await?;

        if !output.status.success() {
            // args[0] is the subcommand; later args may contain the password
            return Err(UpdateError::GitFailed {
                command: args.first().copied().unwrap_or_default().to_string(),
                stderr: self.scrub(&String::from_utf8_lossy(&output.stderr)),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PullRequestSubmitter for GitHubPullRequestSubmitter {
    async fn submit(
        &self,
        repo_dir: &Path,
        files: &[PathBuf],
        request: &PullRequest,
    ) -> Result<String, UpdateError> {
        self.git(repo_dir, &["checkout", "-b", &request.branch]).await?;

        let mut add = vec!["add".to_string(), "--".to_string()];
        add.extend(files.iter().map(|f| f.display().to_string()));
        let add: Vec<&str> = add.iter().map(String::as_str).collect();
        self.git(repo_dir, &add).await?;

        let name = format!("user.name={}", self.credentials.user);
        let email = format!("user.email={}", self.credentials.email);
        self.git(
            repo_dir,
            &["-c", &name, "-c", &email, "commit", "-m", &request.title],
        )
        .await?;

        let fork = self.fork_url();
        self.git(repo_dir, &["push", "--force", &fork, &request.branch])
            .await?;
        info!(branch = %request.branch, "Pushed date-stamp branch");

        let url = format!("{GITHUB_API}/repos/{GITHUB_UPSTREAM_OWNER}/{GITHUB_PROJECT}/pulls");
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.credentials.user, Some(&self.credentials.password))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .json(&json!({
                "title": request.title,
                "body": request.body,
                "head": format!("{}:{}", self.credentials.user, request.branch),
                "base": GITHUB_UPSTREAM_BRANCH,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpdateError::GitHubApi {
                status: status.as_u16(),
                body,
            });
        }

        let created: CreatedPullRequest = response.json().await?;
        info!(url = %created.html_url, "Opened pull request");
        Ok(created.html_url)
    }
}
