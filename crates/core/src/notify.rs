// crates/core/src/notify.rs
//! Remote comment operations behind a retry policy.
//!
//! `CommentApi` is the raw remote surface (implemented over HTTP in
//! `jobbot-github`). `NotificationClient` wraps every call in the same
//! bounded retry and distinguishes "comment not found" (`Ok(None)`, never
//! retried, for both fetch and edit) from failures (retried, then
//! `NotifyError::RetriesExhausted`).

use jobbot_types::{CommentHandle, JobId};
use tracing::{debug, info};

use crate::comments::mentions_job;
use crate::error::{NotifyError, RemoteError};
use crate::retry::{RetryPolicy, Sleeper, ThreadSleeper};

pub trait CommentApi {
    /// All comments on a pull request, oldest first.
    fn list_comments(&self, repo: &str, pr_number: u64) -> Result<Vec<CommentHandle>, RemoteError>;

    /// A single comment, `None` when it does not exist.
    fn get_comment(&self, repo: &str, comment_id: u64) -> Result<Option<CommentHandle>, RemoteError>;

    /// Replace a comment's body and return the stored result, `None` when
    /// the comment does not exist.
    fn edit_comment(
        &self,
        repo: &str,
        comment_id: u64,
        body: &str,
    ) -> Result<Option<CommentHandle>, RemoteError>;
}

pub struct NotificationClient {
    api: Box<dyn CommentApi>,
    policy: RetryPolicy,
    sleeper: Box<dyn Sleeper>,
}

impl std::fmt::Debug for NotificationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationClient")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl NotificationClient {
    pub fn new(api: Box<dyn CommentApi>) -> Self {
        Self {
            api,
            policy: RetryPolicy::default(),
            sleeper: Box::new(ThreadSleeper),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Box<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Fetch a comment by id.
    pub fn fetch_comment(&self, repo: &str, comment_id: u64) -> Result<Option<CommentHandle>, NotifyError> {
        let op = format!("get comment {comment_id} in {repo}");
        self.policy
            .run(&op, self.sleeper.as_ref(), || self.api.get_comment(repo, comment_id))
    }

    /// Search a pull request for the comment announcing job `id`.
    pub fn find_job_comment(
        &self,
        repo: &str,
        pr_number: u64,
        id: &JobId,
    ) -> Result<Option<CommentHandle>, NotifyError> {
        let op = format!("list comments of {repo}#{pr_number}");
        let comments = self
            .policy
            .run(&op, self.sleeper.as_ref(), || self.api.list_comments(repo, pr_number))?;
        let found = comments.into_iter().find(|c| mentions_job(&c.body, id));
        match &found {
            Some(c) => info!(job_id = %id, comment_id = c.comment_id, "found job comment"),
            None => debug!(job_id = %id, repo, pr_number, "no comment mentions job"),
        }
        Ok(found)
    }

    /// Append `update` to the current body of a comment.
    ///
    /// The body is re-fetched first so concurrent edits by other writers are
    /// kept. Returns `None` if the comment no longer exists, including when it
    /// is deleted between the fetch and the edit.
    pub fn append(
        &self,
        repo: &str,
        comment_id: u64,
        update: &str,
    ) -> Result<Option<CommentHandle>, NotifyError> {
        let Some(current) = self.fetch_comment(repo, comment_id)? else {
            info!(repo, comment_id, "comment to update no longer exists, skipping");
            return Ok(None);
        };
        let body = format!("{}{}", current.body, update);
        let op = format!("edit comment {comment_id} in {repo}");
        let Some(updated) = self
            .policy
            .run(&op, self.sleeper.as_ref(), || self.api.edit_comment(repo, comment_id, &body))?
        else {
            info!(repo, comment_id, "comment deleted before it could be edited, skipping");
            return Ok(None);
        };
        debug!(repo, comment_id, bytes = updated.body.len(), "comment updated");
        Ok(Some(updated))
    }
}
