// crates/core/src/process/new_job.rs
//! Held job seen for the first time: register it, then release it.
//!
//! Registration always happens before release so a job can never start and
//! finish before it is recorded.

use jobbot_types::{JobId, Phase, PrInfo};
use tracing::{error, info, warn};

use super::{JobContext, JobOutcome};
use crate::comments::status_row;
use crate::error::{JobError, NotifyError};
use crate::sidecar;

pub fn process(ctx: &mut JobContext<'_>, id: &JobId) -> Result<JobOutcome, JobError> {
    let Some(work_dir) = ctx.scheduler.working_dir(id)? else {
        info!(job_id = %id, "no working directory reported, skipping for now");
        return Ok(JobOutcome::NoWorkDir);
    };

    let Some(metadata) = sidecar::read_metadata(&work_dir, id)? else {
        info!(job_id = %id, work_dir = %work_dir.display(), "no job metadata, not a bot job");
        return Ok(JobOutcome::Foreign);
    };

    ctx.registry.register(id, &work_dir)?;

    let config = ctx.config;
    let templates = &config.new_job_comments;
    let (phase, description) = match ctx.scheduler.release(id) {
        Ok(()) => {
            info!(job_id = %id, "released job");
            (Phase::Released, templates.awaits_release.render(&[]))
        }
        Err(e) => {
            error!(job_id = %id, error = %e, "releasing job failed");
            let message = e.to_string();
            (
                Phase::ReleaseFailed,
                templates.release_failed.render(&[("error", message.as_str())]),
            )
        }
    };
    let released = phase == Phase::Released;

    let notified = match notify(ctx, id, &metadata.pr, phase, &description) {
        Ok(notified) => notified,
        Err(e) => {
            error!(job_id = %id, phase = %phase, error = %e, "failed to post status row");
            false
        }
    };

    Ok(if released {
        JobOutcome::Released { notified }
    } else {
        JobOutcome::ReleaseFailed { notified }
    })
}

fn notify(
    ctx: &mut JobContext<'_>,
    id: &JobId,
    pr: &PrInfo,
    phase: Phase,
    description: &str,
) -> Result<bool, NotifyError> {
    let Some(comment) = ctx.resolve_comment(id, pr)? else {
        warn!(job_id = %id, repo = %pr.repo, pr_number = pr.pr_number, "did not find a comment for job");
        return Ok(false);
    };
    let row = status_row(ctx.clock, phase, description);
    ctx.append_to_comment(id, pr, comment.comment_id, &row.render())
}
