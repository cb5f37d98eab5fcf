//! Date-stamp maintenance for the image definitions.
//!
//! Rewrites the date-stamp variables of the versions manifest and, when
//! GitHub credentials are supplied, submits the change as a pull request.

pub mod manifest;
pub mod options;
pub mod pull_request;

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::error::UpdateError;

pub use manifest::{apply_datestamps, update_manifest_file, DatestampChange};
pub use options::{GitHubCredentials, ImageKind, UpdateOptions};
pub use pull_request::{GitHubPullRequestSubmitter, PullRequest, PullRequestSubmitter};

/// Result of an update run.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateOutcome {
    pub changes: Vec<DatestampChange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pull_request: Option<String>,
}

/// Updates `manifest_path` and submits a pull request through `submitter`.
///
/// No pull request is opened when nothing changed or `submitter` is `None`.
pub async fn run_update(
    manifest_path: &Path,
    options: &UpdateOptions,
    submitter: Option<&dyn PullRequestSubmitter>,
) -> Result<UpdateOutcome, UpdateError> {
    let changes = update_manifest_file(manifest_path, options)?;

    let pull_request = match submitter {
        Some(submitter) if !changes.is_empty() => {
            let (repo_dir, manifest_file) = repo_paths(manifest_path);
            let request = PullRequest::for_changes(&changes);
            Some(
                submitter
                    .submit(repo_dir, &[manifest_file], &request)
                    .await?,
            )
        }
        _ => {
            info!(changed = changes.len(), "Skipping pull request");
            None
        }
    };

    Ok(UpdateOutcome {
        changes,
        pull_request,
    })
}

/// Directory git runs in, and the manifest path relative to it.
fn repo_paths(manifest_path: &Path) -> (&Path, PathBuf) {
    let repo_dir = manifest_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let manifest_file = manifest_path
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| manifest_path.to_path_buf());
    (repo_dir, manifest_file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSubmitter {
        submitted: Mutex<Vec<(PathBuf, Vec<PathBuf>, PullRequest)>>,
    }

    #[async_trait]
    impl PullRequestSubmitter for RecordingSubmitter {
        async fn submit(
            &self,
            repo_dir: &Path,
            files: &[PathBuf],
            request: &PullRequest,
        ) -> Result<String, UpdateError> {
            self.submitted.lock().expect("lock poisoned").push((
                repo_dir.to_path_buf(),
                files.to_vec(),
                request.clone(),
            ));
            Ok("https://github.com/Microsoft/dotnet-framework-docker/pull/1".to_string())
        }
    }

    fn write_manifest(dir: &Path) -> PathBuf {
        let path = dir.join("manifest.versions.json");
        std::fs::write(&path, r#"{"variables":{"runtime|datestamp":"20240101"}}"#)
            .expect("write");
        path
    }

    #[tokio::test]
    async fn test_update_submits_pull_request_for_changes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_manifest(dir.path());
        let submitter = RecordingSubmitter::default();
        let options = UpdateOptions {
            datestamp_runtime: Some("20240401".to_string()),
            ..Default::default()
        };

        let outcome = run_update(&path, &options, Some(&submitter))
            .await
            .expect("update");

        assert_eq!(outcome.changes.len(), 1);
        assert!(outcome.pull_request.is_some());
        let submitted = submitter.submitted.lock().expect("lock");
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].0, dir.path());
        assert_eq!(submitted[0].1, vec![PathBuf::from("manifest.versions.json")]);
    }

    #[tokio::test]
    async fn test_manifest_in_subdirectory_is_added_relative_to_repo() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).expect("mkdir");
        let path = write_manifest(&sub);
        let submitter = RecordingSubmitter::default();
        let options = UpdateOptions {
            datestamp_all: Some("20240601".to_string()),
            ..Default::default()
        };

        run_update(&path, &options, Some(&submitter))
            .await
            .expect("update");

        let submitted = submitter.submitted.lock().expect("lock");
        assert_eq!(submitted[0].0, sub);
        assert_eq!(submitted[0].1, vec![PathBuf::from("manifest.versions.json")]);
    }

    #[test]
    fn test_repo_paths_for_relative_manifest() {
        let (repo_dir, file) = repo_paths(Path::new("sub/manifest.versions.json"));
        assert_eq!(repo_dir, Path::new("sub"));
        assert_eq!(file, PathBuf::from("manifest.versions.json"));

        let (repo_dir, file) = repo_paths(Path::new("manifest.versions.json"));
        assert_eq!(repo_dir, Path::new("."));
        assert_eq!(file, PathBuf::from("manifest.versions.json"));
    }

    #[tokio::test]
    async fn test_no_changes_skips_pull_request() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_manifest(dir.path());
        let submitter = RecordingSubmitter::default();
        let options = UpdateOptions {
            datestamp_all: Some("20240101".to_string()),
            ..Default::default()
        };

        let outcome = run_update(&path, &options, Some(&submitter))
            .await
            .expect("update");

        assert!(outcome.changes.is_empty());
        assert!(outcome.pull_request.is_none());
        assert!(submitter.submitted.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn test_update_only_writes_manifest() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_manifest(dir.path());
        let options = UpdateOptions {
            datestamp_all: Some("20240501".to_string()),
            ..Default::default()
        };

        let outcome = run_update(&path, &options, None).await.expect("update");

        assert_eq!(outcome.changes.len(), 1);
        assert!(outcome.pull_request.is_none());
        let written = std::fs::read_to_string(&path).expect("read");
        assert!(written.contains("20240501"));
    }
}
