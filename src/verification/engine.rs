//! The verification engine: per-descriptor build/run/assert/cleanup flows.

use std::path::PathBuf;

use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::error::VerificationError;
use crate::execution::{unique_image_id, BuildRequest, ContainerEngine, DerivedImage, RunRequest};
use crate::matrix::{ImageDescriptor, DEFAULT_REPO_OWNER};
use crate::verification::env_vars::{
    build_image_defaults, check_environment_output, runtime_image_defaults, EnvironmentVariable,
};
use crate::verification::ngen;
use crate::verification::platform::ContainerPlatform;
use crate::verification::report::{CaseRecorder, CaseReport, CaseStage, Flow, VerificationReport};

const APP_PREFIX: &str = "dotnetapp";
const WEB_APP_PREFIX: &str = "webapp";

/// Inputs shared by every case of a run.
#[derive(Debug, Clone)]
pub struct VerificationSettings {
    /// Namespace prefix of the base image tags.
    pub repo_owner: String,
    /// Directory holding `dotnetapp-{version}` and `webapp-{version}` contexts.
    pub projects_dir: PathBuf,
    pub platform: ContainerPlatform,
    /// Flows to run for each descriptor, in order.
    pub flows: Vec<Flow>,
    pub runtime_env: Vec<EnvironmentVariable>,
    pub build_env: Vec<EnvironmentVariable>,
}

impl Default for VerificationSettings {
    fn default() -> Self {
        Self {
            repo_owner: DEFAULT_REPO_OWNER.to_string(),
            projects_dir: PathBuf::from("projects"),
            platform: ContainerPlatform::Windows,
            flows: Flow::ALL.to_vec(),
            runtime_env: runtime_image_defaults(),
            build_env: build_image_defaults(),
        }
    }
}

/// Drives verification flows against a container engine.
pub struct VerificationEngine<E: ContainerEngine> {
    engine: E,
    settings: VerificationSettings,
}

impl<E: ContainerEngine> VerificationEngine<E> {
    pub fn new(engine: E, settings: VerificationSettings) -> Self {
        Self { engine, settings }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn settings(&self) -> &VerificationSettings {
        &self.settings
    }

    /// Verifies every descriptor, running up to `jobs` descriptors at once.
    ///
    /// Case reports keep descriptor order. A failing case never stops the
    /// remaining ones.
    pub async fn verify_matrix(
        &self,
        descriptors: &[ImageDescriptor],
        jobs: usize,
    ) -> VerificationReport {
        info!(
            descriptors = descriptors.len(),
            jobs = jobs,
            platform = %self.settings.platform,
            "Starting image verification"
        );

        let cases: Vec<CaseReport> = stream::iter(descriptors)
            .map(|descriptor| self.verify_descriptor(descriptor))
            .buffered(jobs.max(1))
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .flatten()
            .collect();

        VerificationReport::from_cases(descriptors.len(), cases)
    }

    /// Runs every configured flow for one descriptor, sequentially.
    pub async fn verify_descriptor(&self, descriptor: &ImageDescriptor) -> Vec<CaseReport> {
        let mut reports = Vec::with_capacity(self.settings.flows.len());
        for flow in &self.settings.flows {
            let report = self.run_flow(*flow, descriptor).await;
            info!(
                flow = %flow,
                descriptor = %descriptor,
                status = ?report.status,
                failure = ?report.failure,
                "Case finished"
            );
            reports.push(report);
        }
        reports
    }

    pub async fn run_flow(&self, flow: Flow, descriptor: &ImageDescriptor) -> CaseReport {
        match flow {
            Flow::App => self.verify_app(descriptor).await,
            Flow::WebApp => self.verify_web_app(descriptor).await,
            Flow::RuntimeEnv => {
                let image = descriptor.base_runtime_image(&self.settings.repo_owner);
                self.env_case(flow, descriptor, &image, &self.settings.runtime_env)
                    .await
            }
            Flow::BuildEnv => {
                let image = descriptor.base_build_image(&self.settings.repo_owner);
                self.env_case(flow, descriptor, &image, &self.settings.build_env)
                    .await
            }
            Flow::Ngen => self.ngen_case(descriptor).await,
        }
    }

    /// Builds and runs the console app against both base images.
    pub async fn verify_app(&self, descriptor: &ImageDescriptor) -> CaseReport {
        let mut case = CaseRecorder::new(Flow::App, descriptor);
        let base_build = descriptor.base_build_image(&self.settings.repo_owner);
        let base_runtime = descriptor.base_runtime_image(&self.settings.repo_owner);

        if let Err(e) = self.require_image(&base_build).await {
            return case.finish(Err(e));
        }
        if let Err(e) = self.require_image(&base_runtime).await {
            return case.finish(Err(e));
        }
        case.advance(CaseStage::PreconditionsChecked);

        let context = self
            .settings
            .projects_dir
            .join(format!("{APP_PREFIX}-{}", descriptor.runtime_version()));
        let request = BuildRequest::new(
            unique_image_id(APP_PREFIX),
            context.join("Dockerfile"),
            context,
        )
        .with_build_arg("BASE_BUILD_IMAGE", &base_build)
        .with_build_arg("BASE_RUNTIME_IMAGE", &base_runtime);

        self.build_run_cleanup(case, request).await
    }

    /// Builds and runs the web app against the build image.
    pub async fn verify_web_app(&self, descriptor: &ImageDescriptor) -> CaseReport {
        let mut case = CaseRecorder::new(Flow::WebApp, descriptor);
        let base_build = descriptor.base_build_image(&self.settings.repo_owner);

        if let Err(e) = self.require_image(&base_build).await {
            return case.finish(Err(e));
        }
        case.advance(CaseStage::PreconditionsChecked);

        let context = self
            .settings
            .projects_dir
            .join(format!("{WEB_APP_PREFIX}-{}", descriptor.runtime_version()));
        let request = BuildRequest::new(
            unique_image_id(WEB_APP_PREFIX),
            context.join("Dockerfile"),
            context,
        )
        .with_build_arg("BASE_BUILD_IMAGE", &base_build);

        self.build_run_cleanup(case, request).await
    }

    /// Runs one container echoing `expected` variables and checks the values.
    pub async fn verify_environment_variables(
        &self,
        image: &str,
        expected: &[EnvironmentVariable],
    ) -> Result<(), VerificationError> {
        let output = self.echo_environment(image, expected).await?;
        check_environment_output(self.settings.platform, image, expected, &output)
    }

    /// Runs `ngen display` for both queues and fails on pending entries.
    pub async fn verify_ngen_queues(&self, image: &str) -> Result<(), VerificationError> {
        let output = self.display_ngen_queues(image).await?;
        ngen::check_queue_output(image, &output)
    }

    async fn require_image(&self, image: &str) -> Result<(), VerificationError> {
        if self.engine.image_exists(image).await {
            Ok(())
        } else {
            Err(VerificationError::MissingBaseImage {
                image: image.to_string(),
            })
        }
    }

    /// Build → run, then delete the derived image whatever happened.
    async fn build_run_cleanup(&self, mut case: CaseRecorder, request: BuildRequest) -> CaseReport {
        let image = DerivedImage::new(&self.engine, request.tag.clone());
        case.set_derived_image(image.tag());

        let result = self.build_and_run(&mut case, &request).await;

        if let Err(e) = image.release().await {
            warn!(image = %request.tag, error = %e, "Failed to delete derived image");
            case.set_cleanup_warning(e.to_string());
        }
        case.advance(CaseStage::CleanedUp);
        case.finish(result)
    }

    async fn build_and_run(
        &self,
        case: &mut CaseRecorder,
        request: &BuildRequest,
    ) -> Result<(), VerificationError> {
        info!(image = %request.tag, context = %request.context.display(), "Building derived image");
        self.engine.build(request).await?;
        case.advance(CaseStage::Built);

        self.engine
            .run(&RunRequest::new(&request.tag, &request.tag))
            .await?;
        case.advance(CaseStage::Ran);

        // A clean exit is the only assertion for app images
        case.advance(CaseStage::Asserted);
        Ok(())
    }

    async fn env_case(
        &self,
        flow: Flow,
        descriptor: &ImageDescriptor,
        image: &str,
        expected: &[EnvironmentVariable],
    ) -> CaseReport {
        let mut case = CaseRecorder::new(flow, descriptor);
        if expected.is_empty() {
            return case.skip("no environment variables configured");
        }
        if let Err(e) = self.require_image(image).await {
            return case.finish(Err(e));
        }
        case.advance(CaseStage::PreconditionsChecked);

        let output = match self.echo_environment(image, expected).await {
            Ok(output) => output,
            Err(e) => return case.finish(Err(e)),
        };
        case.advance(CaseStage::Ran);

        let result = check_environment_output(self.settings.platform, image, expected, &output);
        if result.is_ok() {
            case.advance(CaseStage::Asserted);
        }
        case.finish(result)
    }

    async fn ngen_case(&self, descriptor: &ImageDescriptor) -> CaseReport {
        let mut case = CaseRecorder::new(Flow::Ngen, descriptor);
        if self.settings.platform == ContainerPlatform::Linux {
            return case.skip("ngen queues only exist in Windows containers");
        }
        let image = descriptor.base_runtime_image(&self.settings.repo_owner);
        if let Err(e) = self.require_image(&image).await {
            return case.finish(Err(e));
        }
        case.advance(CaseStage::PreconditionsChecked);

        let output = match self.display_ngen_queues(&image).await {
            Ok(output) => output,
            Err(e) => return case.finish(Err(e)),
        };
        case.advance(CaseStage::Ran);

        let result = ngen::check_queue_output(&image, &output);
        if result.is_ok() {
            case.advance(CaseStage::Asserted);
        }
        case.finish(result)
    }

    async fn echo_environment(
        &self,
        image: &str,
        expected: &[EnvironmentVariable],
    ) -> Result<String, VerificationError> {
        let platform = self.settings.platform;
        let names: Vec<&str> = expected.iter().map(|v| v.name.as_str()).collect();
        let request = RunRequest::new(image, unique_image_id("env"))
            .with_entrypoint(platform.shell())
            .with_command(platform.shell_args(platform.echo_variables_script(&names)));

        Ok(self.engine.run(&request).await?)
    }

    async fn display_ngen_queues(&self, image: &str) -> Result<String, VerificationError> {
        let (entrypoint, command) = ngen::queue_display_command();
        let request = RunRequest::new(image, unique_image_id("ngen"))
            .with_entrypoint(entrypoint)
            .with_command(command);

        Ok(self.engine.run(&request).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = VerificationSettings::default();
        assert_eq!(settings.repo_owner, "microsoft");
        assert_eq!(settings.projects_dir, PathBuf::from("projects"));
        assert_eq!(settings.platform, ContainerPlatform::Windows);
        assert_eq!(settings.flows, Flow::ALL.to_vec());
        assert_eq!(settings.runtime_env, runtime_image_defaults());
        assert_eq!(settings.build_env, build_image_defaults());
    }
}
