// crates/types/src/sidecar.rs
//! Records read from the small sidecar files that live in a job's working directory.
//!
//! The files are produced by the submission side (`.metadata`) and by the job
//! itself (`.result`, `.test`). This crate only describes their shape; parsing
//! lives in `jobbot-core`.

use serde::{Deserialize, Serialize};

use crate::JobId;

/// The three kinds of sidecar file, each named `_bot_job<ID>.<ext>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SidecarKind {
    Metadata,
    Result,
    Test,
}

impl SidecarKind {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Metadata => "metadata",
            Self::Result => "result",
            Self::Test => "test",
        }
    }

    /// Section carrying the primary record of this file.
    pub fn section(self) -> &'static str {
        match self {
            Self::Metadata => "PR",
            Self::Result => "RESULT",
            Self::Test => "TEST",
        }
    }

    pub fn file_name(self, id: &JobId) -> String {
        format!("_bot_job{}.{}", id, self.extension())
    }
}

/// Pull-request identity a job reports back to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrInfo {
    /// `owner/name`
    pub repo: String,
    pub pr_number: u64,
    /// `None` when the submitter did not record it (absent or `-1`).
    pub pr_comment_id: Option<u64>,
}

/// Build target a job was submitted for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchInfo {
    pub architecture: Option<String>,
    pub os: Option<String>,
    pub slurm_opt: Option<String>,
}

/// Contents of `_bot_job<ID>.metadata`. Its presence marks a job as bot-owned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobMetadata {
    pub pr: PrInfo,
    pub arch: Option<ArchInfo>,
}

/// Contents of `_bot_job<ID>.result`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    pub comment_description: Option<String>,
    pub status: Option<String>,
    pub artefacts: Vec<String>,
}

impl JobResult {
    pub fn is_success(&self) -> bool {
        self.status
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case("SUCCESS"))
    }
}

/// Contents of `_bot_job<ID>.test`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobTest {
    pub comment_description: Option<String>,
    pub status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sidecar_file_names() {
        let id = JobId::new("7").unwrap();
        assert_eq!(SidecarKind::Metadata.file_name(&id), "_bot_job7.metadata");
        assert_eq!(SidecarKind::Result.file_name(&id), "_bot_job7.result");
        assert_eq!(SidecarKind::Test.file_name(&id), "_bot_job7.test");
    }

    #[test]
    fn test_result_success_is_case_insensitive() {
        let mut result = JobResult {
            status: Some("success".into()),
            ..Default::default()
        };
        assert!(result.is_success());
        result.status = Some("FAILURE".into());
        assert!(!result.is_success());
        result.status = None;
        assert!(!result.is_success());
    }
}
