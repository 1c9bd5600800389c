// crates/core/src/process/running.rs
//! Running job: post the running message once.

use jobbot_types::{JobId, Phase, SidecarKind, Snapshot};
use tracing::{debug, info, warn};

use super::{JobContext, JobOutcome};
use crate::comments::status_row;
use crate::error::JobError;
use crate::sidecar;

pub fn process(
    ctx: &mut JobContext<'_>,
    id: &JobId,
    current: &Snapshot,
) -> Result<JobOutcome, JobError> {
    let work_dir = ctx.registry.work_dir(id)?;
    let Some(metadata) = sidecar::read_metadata(&work_dir, id)? else {
        return Err(JobError::MissingMetadata {
            id: id.clone(),
            path: sidecar::sidecar_path(&work_dir, id, SidecarKind::Metadata),
        });
    };
    let pr = &metadata.pr;

    let Some(comment) = ctx.resolve_comment(id, pr)? else {
        warn!(job_id = %id, repo = %pr.repo, pr_number = pr.pr_number, "did not find a comment for running job");
        return Ok(JobOutcome::RunningNoComment);
    };

    let message = ctx
        .config
        .running_job_comments
        .running_job
        .render(&[("job_id", id.as_str())]);
    if comment.body.contains(&message) {
        debug!(job_id = %id, "running message already posted");
        return Ok(JobOutcome::RunningUnchanged);
    }

    let row = status_row(ctx.clock, Phase::Running, message);
    if ctx.append_to_comment(id, pr, comment.comment_id, &row.render())? {
        let reason = current.get(id).map(|r| r.reason.as_str()).unwrap_or_default();
        info!(job_id = %id, comment_id = comment.comment_id, nodes = %reason, "posted running status");
        Ok(JobOutcome::RunningNotified)
    } else {
        Ok(JobOutcome::RunningNoComment)
    }
}
