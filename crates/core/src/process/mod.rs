// crates/core/src/process/mod.rs
//! State-transition processors for new, running and finished jobs.
//!
//! Each processor handles exactly one job id and either returns a
//! [`JobOutcome`] or a [`JobError`]; the reconciliation loop catches errors per
//! job. Dispatch goes through the [`Transition`] enum.

pub mod finished;
pub mod new_job;
pub mod running;

use std::collections::HashMap;

use jobbot_types::{CommentHandle, JobId, PrInfo, Snapshot};
use serde::Serialize;
use tracing::debug;

use crate::comments::Clock;
use crate::config::AppConfig;
use crate::error::{JobError, NotifyError};
use crate::notify::NotificationClient;
use crate::registry::JobRegistry;
use crate::scheduler::Scheduler;

/// Comments discovered so far, by job. Lives for the whole process.
#[derive(Debug, Clone, Default)]
pub struct CommentCache {
    entries: HashMap<JobId, CommentHandle>,
}

impl CommentCache {
    pub fn get(&self, id: &JobId) -> Option<&CommentHandle> {
        self.entries.get(id)
    }

    pub fn insert(&mut self, id: JobId, handle: CommentHandle) {
        self.entries.insert(id, handle);
    }

    pub fn remove(&mut self, id: &JobId) -> Option<CommentHandle> {
        self.entries.remove(id)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Collaborators shared by the processors during one iteration.
pub struct JobContext<'a> {
    pub config: &'a AppConfig,
    pub scheduler: &'a dyn Scheduler,
    pub registry: &'a dyn JobRegistry,
    pub notifier: &'a NotificationClient,
    pub clock: &'a dyn Clock,
    pub comments: &'a mut CommentCache,
}

impl JobContext<'_> {
    /// Find the comment tracking `id`: cache, then the comment id stored in
    /// the job's metadata, then a search of the pull request's comments.
    pub fn resolve_comment(
        &mut self,
        id: &JobId,
        pr: &PrInfo,
    ) -> Result<Option<CommentHandle>, NotifyError> {
        if let Some(handle) = self.comments.get(id) {
            return Ok(Some(handle.clone()));
        }

        if let Some(comment_id) = pr.pr_comment_id {
            if let Some(handle) = self.notifier.fetch_comment(&pr.repo, comment_id)? {
                debug!(job_id = %id, comment_id, "comment resolved from metadata");
                self.comments.insert(id.clone(), handle.clone());
                return Ok(Some(handle));
            }
        }

        let found = self.notifier.find_job_comment(&pr.repo, pr.pr_number, id)?;
        if let Some(handle) = &found {
            self.comments.insert(id.clone(), handle.clone());
        }
        Ok(found)
    }

    /// Append `update` to the job's comment and refresh the cache.
    /// Returns whether the comment was updated.
    pub fn append_to_comment(
        &mut self,
        id: &JobId,
        pr: &PrInfo,
        comment_id: u64,
        update: &str,
    ) -> Result<bool, NotifyError> {
        match self.notifier.append(&pr.repo, comment_id, update)? {
            Some(updated) => {
                self.comments.insert(id.clone(), updated);
                Ok(true)
            }
            None => {
                self.comments.remove(id);
                Ok(false)
            }
        }
    }
}

/// What happened to one job during an iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum JobOutcome {
    /// No metadata in the working directory. Not ours.
    Foreign,
    /// The scheduler reported no working directory; reconsidered next time.
    NoWorkDir,
    Released { notified: bool },
    ReleaseFailed { notified: bool },
    RunningNotified,
    /// The running message is already in the comment.
    RunningUnchanged,
    RunningNoComment,
    Finished { notified: bool },
}

impl JobOutcome {
    /// True when the job is registered after processing.
    pub fn is_tracked(self) -> bool {
        !matches!(self, Self::Foreign | Self::NoWorkDir)
    }
}

/// The three transitions, resolved statically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    New,
    Running,
    Finished,
}

impl Transition {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Running => "running",
            Self::Finished => "finished",
        }
    }

    pub fn process(
        self,
        ctx: &mut JobContext<'_>,
        id: &JobId,
        current: &Snapshot,
    ) -> Result<JobOutcome, JobError> {
        match self {
            Self::New => new_job::process(ctx, id),
            Self::Running => running::process(ctx, id, current),
            Self::Finished => finished::process(ctx, id),
        }
    }
}
