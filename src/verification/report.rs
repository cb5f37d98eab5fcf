//! Per-case results and the aggregated verification report.

use std::time::Instant;

use serde::Serialize;

use crate::error::VerificationError;
use crate::matrix::ImageDescriptor;

/// The independent checks run for each descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Flow {
    /// Build and run a console app on the build + runtime images.
    App,
    /// Build and run a web app on the build image.
    WebApp,
    /// Check environment variables of the runtime image.
    RuntimeEnv,
    /// Check environment variables of the build image.
    BuildEnv,
    /// Check the runtime image has no pending NGEN work.
    Ngen,
}

impl Flow {
    pub const ALL: [Flow; 5] = [
        Flow::App,
        Flow::WebApp,
        Flow::RuntimeEnv,
        Flow::BuildEnv,
        Flow::Ngen,
    ];
}

impl std::fmt::Display for Flow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Flow::App => write!(f, "app"),
            Flow::WebApp => write!(f, "web-app"),
            Flow::RuntimeEnv => write!(f, "runtime-env"),
            Flow::BuildEnv => write!(f, "build-env"),
            Flow::Ngen => write!(f, "ngen"),
        }
    }
}

/// States a case passes through.
///
/// ```text
/// Start → PreconditionsChecked → Built → Ran → Asserted → CleanedUp → Done
///   └──────────→ Failed            (no derived image yet)
/// Built | Ran | Asserted ──failure──→ CleanedUp → Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStage {
    Start,
    PreconditionsChecked,
    Built,
    Ran,
    Asserted,
    CleanedUp,
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseStatus {
    Passed,
    Failed,
    Skipped,
}

/// Outcome of one flow against one descriptor.
#[derive(Debug, Clone, Serialize)]
pub struct CaseReport {
    pub flow: Flow,
    pub descriptor: ImageDescriptor,
    pub status: CaseStatus,
    /// Every stage visited, in order.
    pub stages: Vec<CaseStage>,
    /// Tag of the image built for this case, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub derived_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    /// A failed cleanup. Never replaces `failure`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleanup_warning: Option<String>,
    pub duration_ms: u64,
}

impl CaseReport {
    pub fn passed(&self) -> bool {
        self.status == CaseStatus::Passed
    }

    pub fn last_stage(&self) -> Option<CaseStage> {
        self.stages.last().copied()
    }
}

/// Accumulates stage transitions while a case runs.
pub(crate) struct CaseRecorder {
    flow: Flow,
    descriptor: ImageDescriptor,
    stages: Vec<CaseStage>,
    derived_image: Option<String>,
    cleanup_warning: Option<String>,
    started: Instant,
}

impl CaseRecorder {
    pub(crate) fn new(flow: Flow, descriptor: &ImageDescriptor) -> Self {
        Self {
            flow,
            descriptor: descriptor.clone(),
            stages: vec![CaseStage::Start],
            derived_image: None,
            cleanup_warning: None,
            started: Instant::now(),
        }
    }

    pub(crate) fn advance(&mut self, stage: CaseStage) {
        self.stages.push(stage);
    }

    pub(crate) fn set_derived_image(&mut self, tag: &str) {
        self.derived_image = Some(tag.to_string());
    }

    pub(crate) fn set_cleanup_warning(&mut self, warning: String) {
        self.cleanup_warning = Some(warning);
    }

    pub(crate) fn skip(self, reason: &str) -> CaseReport {
        self.into_report(CaseStatus::Skipped, Some(reason.to_string()))
    }

    pub(crate) fn finish(mut self, result: Result<(), VerificationError>) -> CaseReport {
        match result {
            Ok(()) => {
                self.stages.push(CaseStage::Done);
                self.into_report(CaseStatus::Passed, None)
            }
            Err(e) => {
                self.stages.push(CaseStage::Failed);
                self.into_report(CaseStatus::Failed, Some(e.to_string()))
            }
        }
    }

    fn into_report(self, status: CaseStatus, failure: Option<String>) -> CaseReport {
        CaseReport {
            flow: self.flow,
            descriptor: self.descriptor,
            status,
            stages: self.stages,
            derived_image: self.derived_image,
            failure,
            cleanup_warning: self.cleanup_warning,
            duration_ms: u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// All case reports of one verification run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VerificationReport {
    pub descriptors: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub cases: Vec<CaseReport>,
}

impl VerificationReport {
    pub fn from_cases(descriptors: usize, cases: Vec<CaseReport>) -> Self {
        let count = |status: CaseStatus| cases.iter().filter(|c| c.status == status).count();
        Self {
            descriptors,
            passed: count(CaseStatus::Passed),
            failed: count(CaseStatus::Failed),
            skipped: count(CaseStatus::Skipped),
            cases,
        }
    }

    /// True when no case failed. An empty report succeeds.
    pub fn success(&self) -> bool {
        self.failed == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &CaseReport> {
        self.cases.iter().filter(|c| c.status == CaseStatus::Failed)
    }
}
