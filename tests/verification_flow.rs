//! Verification engine flows against a recording container engine.
//!
//! These tests never touch a real Docker daemon; they check which engine
//! calls each flow issues, and that every derived image is deleted exactly
//! once on every path.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use image_matrix::execution::{BuildRequest, ContainerEngine, RunRequest};
use image_matrix::matrix::{ImageDescriptor, MatrixFilters, MatrixProvider, WSC_1709, WSC_LTSC2016};
use image_matrix::verification::{
    CaseStage, CaseStatus, ContainerPlatform, EnvironmentVariable, Flow, VerificationEngine,
    VerificationSettings,
};
use image_matrix::DockerError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Exists(String),
    Build(BuildRequest),
    Run(RunRequest),
    Delete(String),
    DeleteDetached(String),
}

/// Container engine double that records calls and fails on demand.
#[derive(Default)]
struct FakeEngine {
    calls: Mutex<Vec<Call>>,
    missing_images: HashSet<String>,
    fail_build: bool,
    fail_run: bool,
    fail_delete: bool,
    env_output: String,
    build_env_output: String,
    ngen_output: String,
}

impl FakeEngine {
    fn new() -> Self {
        Self {
            env_output: "0\r\n".to_string(),
            build_env_output: "C:\\Roslyn\r\n".to_string(),
            ngen_output: "NGEN Roots:\nSystem (StatusInstalled)\n".to_string(),
            ..Default::default()
        }
    }

    fn missing(mut self, image: &str) -> Self {
        self.missing_images.insert(image.to_string());
        self
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("lock poisoned").clone()
    }

    fn builds(&self) -> Vec<BuildRequest> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Build(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    fn runs(&self) -> Vec<RunRequest> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Run(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    fn deletes(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Delete(tag) | Call::DeleteDetached(tag) => Some(tag),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().expect("lock poisoned").push(call);
    }
}

#[async_trait]
impl ContainerEngine for FakeEngine {
    async fn build(&self, request: &BuildRequest) -> Result<(), DockerError> {
        self.record(Call::Build(request.clone()));
        if self.fail_build {
            return Err(DockerError::BuildFailed {
                tag: request.tag.clone(),
                reason: "msbuild exited with code 1".to_string(),
            });
        }
        Ok(())
    }

    async fn run(&self, request: &RunRequest) -> Result<String, DockerError> {
        self.record(Call::Run(request.clone()));
        if self.fail_run {
            return Err(DockerError::RunFailed {
                image: request.image.clone(),
                reason: "container exited with code 3".to_string(),
            });
        }
        let script = request.command.join(" ");
        if script.contains("ngen.exe") {
            Ok(self.ngen_output.clone())
        } else if script.contains("echo") && request.image.contains("dotnet-framework-build") {
            Ok(self.build_env_output.clone())
        } else if script.contains("echo") {
            Ok(self.env_output.clone())
        } else {
            Ok("Hello from .NET Framework\r\n".to_string())
        }
    }

    async fn image_exists(&self, image: &str) -> bool {
        self.record(Call::Exists(image.to_string()));
        !self.missing_images.contains(image)
    }

    async fn delete_image(&self, tag: &str) -> Result<(), DockerError> {
        self.record(Call::Delete(tag.to_string()));
        if self.fail_delete {
            return Err(DockerError::DeleteFailed {
                tag: tag.to_string(),
                reason: "image is in use".to_string(),
            });
        }
        Ok(())
    }

    fn delete_image_detached(&self, tag: &str) {
        self.record(Call::DeleteDetached(tag.to_string()));
    }
}

fn descriptor() -> ImageDescriptor {
    ImageDescriptor::new("4.6.2", "4.7.1", WSC_LTSC2016)
}

fn settings(flows: Vec<Flow>) -> VerificationSettings {
    VerificationSettings {
        projects_dir: PathBuf::from("/work/projects"),
        flows,
        build_env: vec![EnvironmentVariable::any("ROSLYN_COMPILER_LOCATION")],
        runtime_env: vec![EnvironmentVariable::exact(
            "COMPLUS_NGenProtectedProcess_FeatureEnabled",
            "0",
        )],
        ..Default::default()
    }
}

fn engine(fake: FakeEngine, flows: Vec<Flow>) -> VerificationEngine<FakeEngine> {
    VerificationEngine::new(fake, settings(flows))
}

const BUILD_IMAGE: &str = "microsoft/dotnet-framework-build:4.7.1-windowsservercore-ltsc2016";
const RUNTIME_IMAGE: &str = "microsoft/dotnet-framework:4.6.2-windowsservercore-ltsc2016";

#[tokio::test]
async fn test_app_flow_builds_runs_and_cleans_up() {
    let verifier = engine(FakeEngine::new(), vec![Flow::App]);
    let report = verifier.verify_app(&descriptor()).await;

    assert_eq!(report.status, CaseStatus::Passed, "{:?}", report.failure);
    assert_eq!(
        report.stages,
        vec![
            CaseStage::Start,
            CaseStage::PreconditionsChecked,
            CaseStage::Built,
            CaseStage::Ran,
            CaseStage::Asserted,
            CaseStage::CleanedUp,
            CaseStage::Done,
        ]
    );

    let fake = verifier.engine();
    let builds = fake.builds();
    assert_eq!(builds.len(), 1);
    let build = &builds[0];
    assert!(build.tag.starts_with("dotnetapp-"));
    assert_eq!(build.context, PathBuf::from("/work/projects/dotnetapp-4.6.2"));
    assert_eq!(
        build.dockerfile,
        PathBuf::from("/work/projects/dotnetapp-4.6.2/Dockerfile")
    );
    assert_eq!(
        build.build_args,
        vec![
            format!("BASE_BUILD_IMAGE={BUILD_IMAGE}"),
            format!("BASE_RUNTIME_IMAGE={RUNTIME_IMAGE}"),
        ]
    );

    let runs = fake.runs();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].image, build.tag);
    assert_eq!(runs[0].container_name, build.tag);
    assert!(runs[0].entrypoint.is_none());

    assert_eq!(fake.deletes(), vec![build.tag.clone()]);
    assert_eq!(report.derived_image.as_deref(), Some(build.tag.as_str()));
}

#[tokio::test]
async fn test_web_app_flow_only_needs_build_image() {
    let fake = FakeEngine::new().missing(RUNTIME_IMAGE);
    let verifier = engine(fake, vec![Flow::WebApp]);
    let report = verifier.verify_web_app(&descriptor()).await;

    assert!(report.passed(), "{:?}", report.failure);
    let fake = verifier.engine();
    assert_eq!(fake.calls()[0], Call::Exists(BUILD_IMAGE.to_string()));

    let build = &fake.builds()[0];
    assert!(build.tag.starts_with("webapp-"));
    assert_eq!(build.context, PathBuf::from("/work/projects/webapp-4.6.2"));
    assert_eq!(build.build_args, vec![format!("BASE_BUILD_IMAGE={BUILD_IMAGE}")]);
    assert_eq!(fake.deletes(), vec![build.tag.clone()]);
}

#[tokio::test]
async fn test_missing_base_image_fails_without_building() {
    let fake = FakeEngine::new().missing(RUNTIME_IMAGE);
    let verifier = engine(fake, vec![Flow::App]);
    let report = verifier.verify_app(&descriptor()).await;

    assert_eq!(report.status, CaseStatus::Failed);
    assert_eq!(report.stages, vec![CaseStage::Start, CaseStage::Failed]);
    assert_eq!(
        report.failure.as_deref(),
        Some(format!("`{RUNTIME_IMAGE}` could not be found on disk.").as_str())
    );

    let fake = verifier.engine();
    assert!(fake.builds().is_empty());
    assert!(fake.deletes().is_empty());
    assert!(report.derived_image.is_none());
}

#[tokio::test]
async fn test_build_failure_still_deletes_derived_image() {
    let fake = FakeEngine {
        fail_build: true,
        ..FakeEngine::new()
    };
    let verifier = engine(fake, vec![Flow::App]);
    let report = verifier.verify_app(&descriptor()).await;

    assert_eq!(report.status, CaseStatus::Failed);
    assert_eq!(
        report.stages,
        vec![
            CaseStage::Start,
            CaseStage::PreconditionsChecked,
            CaseStage::CleanedUp,
            CaseStage::Failed,
        ]
    );
    assert!(report
        .failure
        .as_deref()
        .unwrap_or_default()
        .contains("msbuild exited with code 1"));

    let fake = verifier.engine();
    assert!(fake.runs().is_empty());
    assert_eq!(fake.deletes(), vec![fake.builds()[0].tag.clone()]);
}

#[tokio::test]
async fn test_run_failure_still_deletes_derived_image() {
    let fake = FakeEngine {
        fail_run: true,
        ..FakeEngine::new()
    };
    let verifier = engine(fake, vec![Flow::WebApp]);
    let report = verifier.verify_web_app(&descriptor()).await;

    assert_eq!(report.status, CaseStatus::Failed);
    assert_eq!(
        report.stages,
        vec![
            CaseStage::Start,
            CaseStage::PreconditionsChecked,
            CaseStage::Built,
            CaseStage::CleanedUp,
            CaseStage::Failed,
        ]
    );
    let fake = verifier.engine();
    assert_eq!(fake.deletes(), vec![fake.builds()[0].tag.clone()]);
}

#[tokio::test]
async fn test_cleanup_failure_does_not_mask_build_failure() {
    let fake = FakeEngine {
        fail_build: true,
        fail_delete: true,
        ..FakeEngine::new()
    };
    let verifier = engine(fake, vec![Flow::App]);
    let report = verifier.verify_app(&descriptor()).await;

    assert_eq!(report.status, CaseStatus::Failed);
    let failure = report.failure.as_deref().unwrap_or_default();
    assert!(failure.contains("Docker build"), "{failure}");
    assert!(report
        .cleanup_warning
        .as_deref()
        .unwrap_or_default()
        .contains("image is in use"));
    assert_eq!(verifier.engine().deletes().len(), 1);
}

#[tokio::test]
async fn test_cleanup_failure_alone_keeps_case_passing() {
    let fake = FakeEngine {
        fail_delete: true,
        ..FakeEngine::new()
    };
    let verifier = engine(fake, vec![Flow::App]);
    let report = verifier.verify_app(&descriptor()).await;

    assert!(report.passed());
    assert!(report.cleanup_warning.is_some());
}

#[tokio::test]
async fn test_windows_env_flow_uses_cmd_and_normalizes_unset() {
    let verifier = engine(FakeEngine::new(), vec![Flow::RuntimeEnv]);
    let report = verifier.run_flow(Flow::RuntimeEnv, &descriptor()).await;
    assert!(report.passed(), "{:?}", report.failure);

    let run = &verifier.engine().runs()[0];
    assert_eq!(run.image, RUNTIME_IMAGE);
    assert_eq!(run.entrypoint.as_deref(), Some("cmd"));
    assert_eq!(
        run.command,
        vec![
            "/S".to_string(),
            "/C".to_string(),
            "echo %COMPLUS_NGenProtectedProcess_FeatureEnabled%".to_string(),
        ]
    );
    assert!(verifier.engine().deletes().is_empty());

    let fake = FakeEngine {
        env_output: "%COMPLUS_NGenProtectedProcess_FeatureEnabled%\r\n".to_string(),
        ..FakeEngine::new()
    };
    let verifier = engine(fake, vec![Flow::RuntimeEnv]);
    let report = verifier.run_flow(Flow::RuntimeEnv, &descriptor()).await;
    assert_eq!(report.status, CaseStatus::Failed);
    assert!(report
        .failure
        .as_deref()
        .unwrap_or_default()
        .contains("expected '0', actual ''"));
    assert_eq!(
        report.stages,
        vec![
            CaseStage::Start,
            CaseStage::PreconditionsChecked,
            CaseStage::Ran,
            CaseStage::Failed,
        ]
    );
}

#[tokio::test]
async fn test_verify_environment_variables_positional() {
    let fake = FakeEngine {
        env_output: "bar|something\n".to_string(),
        ..FakeEngine::new()
    };
    let mut settings = settings(vec![]);
    settings.platform = ContainerPlatform::Linux;
    let verifier = VerificationEngine::new(fake, settings);
    let expected = vec![
        EnvironmentVariable::exact("FOO", "bar"),
        EnvironmentVariable::any("BAZ"),
    ];

    let result = verifier
        .verify_environment_variables("alpine:3.19", &expected)
        .await;
    assert!(result.is_ok(), "{result:?}");

    let run = &verifier.engine().runs()[0];
    assert_eq!(run.entrypoint.as_deref(), Some("/bin/sh"));
    assert_eq!(run.command, vec!["-c".to_string(), "echo \"${FOO}|${BAZ}\"".to_string()]);
}

#[tokio::test]
async fn test_ngen_flow_detects_pending_entries() {
    let fake = FakeEngine {
        ngen_output: "System.Web (StatusPending)\n".to_string(),
        ..FakeEngine::new()
    };
    let verifier = engine(fake, vec![Flow::Ngen]);
    let report = verifier.run_flow(Flow::Ngen, &descriptor()).await;

    assert_eq!(report.status, CaseStatus::Failed);
    assert!(report
        .failure
        .as_deref()
        .unwrap_or_default()
        .contains("(StatusPending)"));

    let run = &verifier.engine().runs()[0];
    assert_eq!(run.image, RUNTIME_IMAGE);
    assert_eq!(run.entrypoint.as_deref(), Some("cmd"));
}

#[tokio::test]
async fn test_ngen_flow_skipped_for_linux_containers() {
    let mut settings = settings(vec![Flow::Ngen]);
    settings.platform = ContainerPlatform::Linux;
    let verifier = VerificationEngine::new(FakeEngine::new(), settings);
    let report = verifier.run_flow(Flow::Ngen, &descriptor()).await;

    assert_eq!(report.status, CaseStatus::Skipped);
    assert!(verifier.engine().calls().is_empty());
}

#[tokio::test]
async fn test_matrix_failures_are_case_scoped() {
    let missing = "microsoft/dotnet-framework:3.5-windowsservercore-1709";
    let verifier = engine(FakeEngine::new().missing(missing), Flow::ALL.to_vec());
    let descriptors = MatrixProvider::builtin().select(&MatrixFilters::none());

    let report = verifier.verify_matrix(&descriptors, 3).await;

    assert_eq!(report.descriptors, 6);
    assert_eq!(report.cases.len(), 6 * Flow::ALL.len());
    // app, runtime-env and ngen need the missing runtime image
    assert_eq!(report.failed, 3);
    assert!(report
        .failures()
        .all(|c| c.descriptor == ImageDescriptor::new("3.5", "3.5", WSC_1709)));
    assert!(!report.success());

    // Declaration order is preserved
    let order: Vec<&ImageDescriptor> = report
        .cases
        .iter()
        .step_by(Flow::ALL.len())
        .map(|c| &c.descriptor)
        .collect();
    let expected: Vec<&ImageDescriptor> = descriptors.iter().collect();
    assert_eq!(order, expected);

    // Every built tag is unique and deleted exactly once
    let fake = verifier.engine();
    let built: Vec<String> = fake.builds().into_iter().map(|b| b.tag).collect();
    let unique: HashSet<&String> = built.iter().collect();
    assert_eq!(unique.len(), built.len());
    let mut deleted = fake.deletes();
    let mut built_sorted = built.clone();
    deleted.sort();
    built_sorted.sort();
    assert_eq!(deleted, built_sorted);
}

#[tokio::test]
async fn test_empty_selection_is_successful() {
    let verifier = engine(FakeEngine::new(), Flow::ALL.to_vec());
    let filters = MatrixFilters::from_patterns(Some("nanoserver-*"), None).expect("filters");
    let descriptors = MatrixProvider::builtin().select(&filters);

    let report = verifier.verify_matrix(&descriptors, 1).await;

    assert!(report.success());
    assert!(report.cases.is_empty());
    assert!(verifier.engine().calls().is_empty());
}
