// crates/core/tests/common/mod.rs
//
// In-memory scheduler and comment service plus a temp-dir registry, shared by
// the reconciliation integration tests.
#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use jobbot_core::comments::Clock;
use jobbot_core::{
    AppConfig, CommentApi, JobManager, NotificationClient, RemoteError, Scheduler, SchedulerError,
    SymlinkRegistry,
};
use jobbot_types::{CommentHandle, JobId, JobRecord, JobState, Snapshot};
use tempfile::TempDir;

pub const REPO: &str = "org/software-layer";
pub const PR_NUMBER: u64 = 12;

pub fn id(s: &str) -> JobId {
    JobId::new(s).unwrap()
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct SchedulerState {
    pub jobs: Snapshot,
    pub work_dirs: HashMap<JobId, PathBuf>,
    pub failing_release: HashSet<JobId>,
    pub fail_snapshot: bool,
    pub released: Vec<JobId>,
    pub snapshot_calls: usize,
}

#[derive(Clone, Default)]
pub struct FakeScheduler(pub Rc<RefCell<SchedulerState>>);

impl FakeScheduler {
    pub fn set_job(&self, job: &str, state: JobState) {
        let job = id(job);
        self.0.borrow_mut().jobs.insert(
            job.clone(),
            JobRecord {
                id: job,
                state,
                reason: "(None)".into(),
            },
        );
    }

    pub fn remove_job(&self, job: &str) {
        self.0.borrow_mut().jobs.remove(&id(job));
    }

    pub fn released(&self) -> Vec<JobId> {
        self.0.borrow().released.clone()
    }
}

impl Scheduler for FakeScheduler {
    fn snapshot(&self, _user: &str) -> Result<Snapshot, SchedulerError> {
        let mut state = self.0.borrow_mut();
        state.snapshot_calls += 1;
        if state.fail_snapshot {
            return Err(SchedulerError::NonZeroExit {
                command: "squeue --long".into(),
                code: Some(1),
                stderr: "slurm_load_jobs error: Socket timed out".into(),
            });
        }
        Ok(state.jobs.clone())
    }

    fn working_dir(&self, job: &JobId) -> Result<Option<PathBuf>, SchedulerError> {
        Ok(self.0.borrow().work_dirs.get(job).cloned())
    }

    fn release(&self, job: &JobId) -> Result<(), SchedulerError> {
        let mut state = self.0.borrow_mut();
        if state.failing_release.contains(job) {
            return Err(SchedulerError::NonZeroExit {
                command: format!("scontrol release {job}"),
                code: Some(1),
                stderr: "Invalid job id specified".into(),
            });
        }
        state.released.push(job.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Comment service
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct CommentState {
    pub comments: BTreeMap<u64, String>,
    pub fail_edits: usize,
    pub list_calls: usize,
    pub get_calls: usize,
    pub edit_calls: usize,
}

#[derive(Clone, Default)]
pub struct FakeComments(pub Rc<RefCell<CommentState>>);

impl FakeComments {
    /// Add the submission comment for `job` and return its id.
    pub fn add_job_comment(&self, job: &str) -> u64 {
        let mut state = self.0.borrow_mut();
        let comment_id = 1000 + state.comments.len() as u64;
        state.comments.insert(
            comment_id,
            format!(
                "New job on instance `bot` for `x86_64/generic`\n\
                 |date|job status|comment|\n\
                 |----------|----------|------------------------|\n\
                 |Mar 01 09:00:00 UTC 2024|submitted|job id `{job}` awaits release by job manager|"
            ),
        );
        comment_id
    }

    pub fn body(&self, comment_id: u64) -> String {
        self.0.borrow().comments[&comment_id].clone()
    }

    pub fn fail_next_edits(&self, n: usize) {
        self.0.borrow_mut().fail_edits = n;
    }
}

impl CommentApi for FakeComments {
    fn list_comments(&self, _repo: &str, _pr: u64) -> Result<Vec<CommentHandle>, RemoteError> {
        let mut state = self.0.borrow_mut();
        state.list_calls += 1;
        Ok(state
            .comments
            .iter()
            .map(|(comment_id, body)| CommentHandle {
                comment_id: *comment_id,
                body: body.clone(),
            })
            .collect())
    }

    fn get_comment(&self, _repo: &str, comment_id: u64) -> Result<Option<CommentHandle>, RemoteError> {
        let mut state = self.0.borrow_mut();
        state.get_calls += 1;
        Ok(state.comments.get(&comment_id).map(|body| CommentHandle {
            comment_id,
            body: body.clone(),
        }))
    }

    fn edit_comment(
        &self,
        _repo: &str,
        comment_id: u64,
        body: &str,
    ) -> Result<Option<CommentHandle>, RemoteError> {
        let mut state = self.0.borrow_mut();
        state.edit_calls += 1;
        if state.fail_edits > 0 {
            state.fail_edits -= 1;
            return Err(RemoteError::new(format!("edit comment {comment_id}"), "bad gateway").with_status(502));
        }
        let Some(stored) = state.comments.get_mut(&comment_id) else {
            return Ok(None);
        };
        *stored = body.to_string();
        Ok(Some(CommentHandle {
            comment_id,
            body: body.to_string(),
        }))
    }
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap()
}

pub const FIXED_TIMESTAMP: &str = "Mar 04 10:00:00 UTC 2024";

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub tmp: TempDir,
    pub config: AppConfig,
    pub scheduler: FakeScheduler,
    pub comments: FakeComments,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            tmp: TempDir::new().unwrap(),
            config: AppConfig::default(),
            scheduler: FakeScheduler::default(),
            comments: FakeComments::default(),
        }
    }

    pub fn registry_root(&self) -> PathBuf {
        self.tmp.path().join("job_ids")
    }

    pub fn registry(&self) -> SymlinkRegistry {
        SymlinkRegistry::new(self.registry_root())
    }

    pub fn work_dir(&self, job: &str) -> PathBuf {
        self.tmp.path().join("work").join(job)
    }

    /// Create the job's working directory and tell the scheduler about it.
    pub fn add_work_dir(&self, job: &str) -> PathBuf {
        let dir = self.work_dir(job);
        fs::create_dir_all(&dir).unwrap();
        self.scheduler
            .0
            .borrow_mut()
            .work_dirs
            .insert(id(job), dir.clone());
        dir
    }

    /// A bot job: working dir with metadata, plus its PR comment.
    /// Returns the comment id.
    pub fn add_bot_job(&self, job: &str, record_comment_id: bool) -> u64 {
        let dir = self.add_work_dir(job);
        let comment_id = self.comments.add_job_comment(job);
        let stored = if record_comment_id {
            comment_id.to_string()
        } else {
            "-1".to_string()
        };
        write_metadata(&dir, job, &stored);
        comment_id
    }

    pub fn manager(&self) -> JobManager<'_> {
        let notifier = NotificationClient::new(Box::new(self.comments.clone()))
            .with_sleeper(Box::new(|_: Duration| {}));
        JobManager::new(
            &self.config,
            "botuser",
            Box::new(self.scheduler.clone()),
            Box::new(self.registry()),
            notifier,
        )
        .with_clock(Box::new(FixedClock(fixed_time())))
    }
}

pub fn write_metadata(dir: &Path, job: &str, comment_id: &str) {
    fs::write(
        dir.join(format!("_bot_job{job}.metadata")),
        format!(
            "[PR]\nrepo = {REPO}\npr_number = {PR_NUMBER}\npr_comment_id = {comment_id}\n\
             [ARCH]\narchitecture = x86_64/generic\nos = linux\nslurm_opt = --partition=cpu\n"
        ),
    )
    .unwrap();
}

pub fn write_result(dir: &Path, job: &str, description: &str) {
    fs::write(
        dir.join(format!("_bot_job{job}.result")),
        format!("[RESULT]\ncomment_description = {description}\nstatus = SUCCESS\nartefacts =\n    eessi-2023.06-software-linux-x86_64-generic-1709546400.tar.gz\n"),
    )
    .unwrap();
}

pub fn write_test(dir: &Path, job: &str, description: &str) {
    fs::write(
        dir.join(format!("_bot_job{job}.test")),
        format!("[TEST]\ncomment_description = {description}\nstatus = SUCCESS\n"),
    )
    .unwrap();
}
