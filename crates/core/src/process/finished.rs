// crates/core/src/process/finished.rs
//! Job gone from the scheduler: move it to the finished bucket and report its
//! build and test results.
//!
//! The registry move happens before any notification. If posting then fails
//! the job is not revisited.

use std::path::Path;

use jobbot_types::{parse_status_rows, JobId, Phase, SidecarKind};
use tracing::{error, info, warn};

use super::{JobContext, JobOutcome};
use crate::comments::status_row;
use crate::error::JobError;
use crate::sidecar;

pub fn process(ctx: &mut JobContext<'_>, id: &JobId) -> Result<JobOutcome, JobError> {
    let job_dir = ctx.registry.finish(id)?;

    let build_description = result_description(ctx, &job_dir, id);
    let test_description = test_description(ctx, &job_dir, id);
    info!(
        job_id = %id,
        result = %build_description,
        test = %test_description,
        "job finished"
    );

    let metadata_path = sidecar::sidecar_path(&job_dir, id, SidecarKind::Metadata);
    let Some(metadata) = sidecar::read_metadata(&job_dir, id)? else {
        ctx.comments.remove(id);
        return Err(JobError::MissingMetadata {
            id: id.clone(),
            path: metadata_path,
        });
    };
    let pr = &metadata.pr;

    let finished_row = status_row(ctx.clock, Phase::Finished, build_description);
    let test_row = status_row(ctx.clock, Phase::TestResult, test_description);
    let update = format!("{}{}", finished_row.render(), test_row.render());

    let posted = ctx
        .resolve_comment(id, pr)
        .and_then(|found| match found {
            Some(comment) => ctx.append_to_comment(id, pr, comment.comment_id, &update),
            None => Ok(false),
        });

    let cached = ctx.comments.remove(id);
    match posted {
        Ok(true) => {
            let rows = cached.map(|c| parse_status_rows(&c.body).len()).unwrap_or(0);
            info!(job_id = %id, repo = %pr.repo, pr_number = pr.pr_number, rows, "posted finished status");
            Ok(JobOutcome::Finished { notified: true })
        }
        Ok(false) => {
            warn!(job_id = %id, repo = %pr.repo, pr_number = pr.pr_number, "did not find a comment for finished job");
            Ok(JobOutcome::Finished { notified: false })
        }
        Err(e) => {
            error!(job_id = %id, update = %update, error = %e, "finished status rows were not posted");
            Err(e.into())
        }
    }
}

fn result_description(ctx: &JobContext<'_>, dir: &Path, id: &JobId) -> String {
    let filename = SidecarKind::Result.file_name(id);
    let unknown = || {
        ctx.config
            .finished_job_comments
            .job_result_unknown_fmt
            .render(&[("filename", filename.as_str())])
    };
    match sidecar::read_result(dir, id) {
        Ok(Some(result)) => {
            if !result.artefacts.is_empty() {
                info!(
                    job_id = %id,
                    artefacts = ?result.artefacts,
                    status = ?result.status,
                    success = result.is_success(),
                    "job result"
                );
            }
            result.comment_description.unwrap_or_else(unknown)
        }
        Ok(None) => unknown(),
        Err(e) => {
            warn!(job_id = %id, error = %e, "could not read job result");
            unknown()
        }
    }
}

fn test_description(ctx: &JobContext<'_>, dir: &Path, id: &JobId) -> String {
    let filename = SidecarKind::Test.file_name(id);
    let unknown = || {
        ctx.config
            .finished_job_comments
            .job_test_unknown_fmt
            .render(&[("filename", filename.as_str())])
    };
    match sidecar::read_test(dir, id) {
        Ok(Some(test)) => test.comment_description.unwrap_or_else(unknown),
        Ok(None) => unknown(),
        Err(e) => {
            warn!(job_id = %id, error = %e, "could not read job test result");
            unknown()
        }
    }
}
