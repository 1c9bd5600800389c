// crates/core/src/reconcile.rs
//! The reconciliation loop: snapshot, diff, process, sleep.
//!
//! Iterations run strictly one after another on the calling thread. Per-job
//! failures are logged and recorded in the [`IterationReport`]; only a failed
//! snapshot or registry scan aborts an iteration.

use std::collections::BTreeSet;
use std::time::Duration;

use jobbot_types::{JobId, JobIdError, Snapshot};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::comments::{Clock, SystemClock};
use crate::config::AppConfig;
use crate::diff::{diff, running_jobs};
use crate::error::IterationError;
use crate::notify::NotificationClient;
use crate::process::{CommentCache, JobContext, JobOutcome, Transition};
use crate::registry::JobRegistry;
use crate::retry::Sleeper;
use crate::scheduler::Scheduler;

/// How many iterations to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationLimit {
    Forever,
    Bounded(u64),
}

impl IterationLimit {
    /// Negative means forever, zero means no iterations.
    pub fn from_count(count: i64) -> Self {
        if count < 0 {
            Self::Forever
        } else {
            Self::Bounded(count.unsigned_abs())
        }
    }

    /// Whether iteration number `completed` (zero-based) may run.
    pub fn allows(self, completed: u64) -> bool {
        match self {
            Self::Forever => true,
            Self::Bounded(max) => completed < max,
        }
    }
}

/// Optional allow-list of job ids. Ids outside it are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum JobFilter {
    #[default]
    All,
    Only(BTreeSet<JobId>),
}

impl JobFilter {
    /// Parse a comma-separated list; empty entries are ignored and an
    /// all-empty list means no filter.
    pub fn parse(list: &str) -> Result<Self, JobIdError> {
        let ids = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(JobId::new)
            .collect::<Result<BTreeSet<_>, _>>()?;
        if ids.is_empty() {
            Ok(Self::All)
        } else {
            Ok(Self::Only(ids))
        }
    }

    pub fn allows(&self, id: &JobId) -> bool {
        match self {
            Self::All => true,
            Self::Only(ids) => ids.contains(id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobReport {
    pub id: JobId,
    pub transition: Transition,
    pub outcome: JobOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobFailure {
    pub id: JobId,
    pub transition: Transition,
    pub error: String,
}

/// Everything one iteration did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IterationReport {
    pub iteration: u64,
    pub known: usize,
    pub current: usize,
    pub processed: Vec<JobReport>,
    pub failed: Vec<JobFailure>,
    /// Ids outside the job filter.
    pub filtered: Vec<JobId>,
}

impl IterationReport {
    pub fn outcomes(&self, transition: Transition) -> impl Iterator<Item = (&JobId, JobOutcome)> {
        self.processed
            .iter()
            .filter(move |r| r.transition == transition)
            .map(|r| (&r.id, r.outcome))
    }

    pub fn outcome_of(&self, id: &JobId) -> Option<JobOutcome> {
        self.processed
            .iter()
            .rev()
            .find(|r| &r.id == id)
            .map(|r| r.outcome)
    }
}

/// Totals over a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub iterations: u64,
    pub aborted: u64,
    pub job_failures: u64,
}

pub struct JobManager<'a> {
    config: &'a AppConfig,
    user: String,
    scheduler: Box<dyn Scheduler + 'a>,
    registry: Box<dyn JobRegistry + 'a>,
    notifier: NotificationClient,
    clock: Box<dyn Clock + 'a>,
    filter: JobFilter,
    comments: CommentCache,
}

impl<'a> JobManager<'a> {
    pub fn new(
        config: &'a AppConfig,
        user: impl Into<String>,
        scheduler: Box<dyn Scheduler + 'a>,
        registry: Box<dyn JobRegistry + 'a>,
        notifier: NotificationClient,
    ) -> Self {
        Self {
            config,
            user: user.into(),
            scheduler,
            registry,
            notifier,
            clock: Box::new(SystemClock),
            filter: JobFilter::All,
            comments: CommentCache::default(),
        }
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock + 'a>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_filter(mut self, filter: JobFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Run up to `limit` iterations, sleeping `poll_interval` between them.
    pub fn run(&mut self, limit: IterationLimit, poll_interval: Duration, sleeper: &dyn Sleeper) -> RunSummary {
        let mut summary = RunSummary::default();
        let mut completed = 0u64;
        while limit.allows(completed) {
            match self.run_iteration(completed) {
                Ok(report) => {
                    summary.job_failures += report.failed.len() as u64;
                }
                Err(e) => {
                    error!(iteration = completed, error = %e, "iteration aborted");
                    summary.aborted += 1;
                }
            }
            completed += 1;
            summary.iterations = completed;
            if limit.allows(completed) {
                debug!(seconds = poll_interval.as_secs(), "sleeping until next iteration");
                sleeper.sleep(poll_interval);
            }
        }
        info!(
            iterations = summary.iterations,
            aborted = summary.aborted,
            job_failures = summary.job_failures,
            "job manager stopped"
        );
        summary
    }

    /// One pass: known ids and snapshot, diff, then new, running and finished jobs.
    pub fn run_iteration(&mut self, iteration: u64) -> Result<IterationReport, IterationError> {
        let known = self.registry.known().map_err(IterationError::Registry)?;
        let mut current = self
            .scheduler
            .snapshot(&self.user)
            .map_err(IterationError::Snapshot)?;
        let changes = diff(&known, &current);

        info!(
            iteration,
            known = ?ids(known.iter()),
            current = ?ids(current.keys()),
            new = ?ids(changes.new.iter()),
            finished = ?ids(changes.finished.iter()),
            "iteration started"
        );

        let mut report = IterationReport {
            iteration,
            known: known.len(),
            current: current.len(),
            ..IterationReport::default()
        };

        for id in &changes.new {
            if !self.filter.allows(id) {
                current.remove(id);
                report.filtered.push(id.clone());
                continue;
            }
            // A failed new job never got past registration.
            let outcome = self.dispatch(Transition::New, id, &current, &mut report);
            if !outcome.is_some_and(JobOutcome::is_tracked) {
                current.remove(id);
            }
        }

        let running = running_jobs(&current);
        info!(iteration, running = ?ids(running.iter()), "running jobs");
        for id in &running {
            if !self.filter.allows(id) {
                report.filtered.push(id.clone());
                continue;
            }
            self.dispatch(Transition::Running, id, &current, &mut report);
        }

        for id in &changes.finished {
            if !self.filter.allows(id) {
                report.filtered.push(id.clone());
                continue;
            }
            self.dispatch(Transition::Finished, id, &current, &mut report);
        }

        info!(
            iteration,
            processed = report.processed.len(),
            failed = report.failed.len(),
            filtered = report.filtered.len(),
            cached_comments = self.comments.len(),
            "iteration complete"
        );
        Ok(report)
    }

    fn dispatch(
        &mut self,
        transition: Transition,
        id: &JobId,
        current: &Snapshot,
        report: &mut IterationReport,
    ) -> Option<JobOutcome> {
        let mut ctx = JobContext {
            config: self.config,
            scheduler: self.scheduler.as_ref(),
            registry: self.registry.as_ref(),
            notifier: &self.notifier,
            clock: self.clock.as_ref(),
            comments: &mut self.comments,
        };
        match transition.process(&mut ctx, id, current) {
            Ok(outcome) => {
                debug!(job_id = %id, transition = transition.as_str(), ?outcome, "job processed");
                report.processed.push(JobReport {
                    id: id.clone(),
                    transition,
                    outcome,
                });
                Some(outcome)
            }
            Err(e) => {
                error!(job_id = %id, transition = transition.as_str(), error = %e, "job processing failed");
                report.failed.push(JobFailure {
                    id: id.clone(),
                    transition,
                    error: e.to_string(),
                });
                None
            }
        }
    }
}

fn ids<'i>(iter: impl Iterator<Item = &'i JobId>) -> Vec<&'i str> {
    iter.map(JobId::as_str).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iteration_limit_from_count() {
        assert_eq!(IterationLimit::from_count(-1), IterationLimit::Forever);
        assert_eq!(IterationLimit::from_count(0), IterationLimit::Bounded(0));
        assert_eq!(IterationLimit::from_count(3), IterationLimit::Bounded(3));
    }

    #[test]
    fn test_iteration_limit_allows() {
        assert!(!IterationLimit::Bounded(0).allows(0));
        assert!(IterationLimit::Bounded(2).allows(1));
        assert!(!IterationLimit::Bounded(2).allows(2));
        assert!(IterationLimit::Forever.allows(u64::MAX));
    }

    #[test]
    fn test_job_filter_parse() {
        assert_eq!(JobFilter::parse("").unwrap(), JobFilter::All);
        assert_eq!(JobFilter::parse(" , ,").unwrap(), JobFilter::All);
        let filter = JobFilter::parse("12, 15,,").unwrap();
        assert!(filter.allows(&JobId::new("12").unwrap()));
        assert!(filter.allows(&JobId::new("15").unwrap()));
        assert!(!filter.allows(&JobId::new("13").unwrap()));
    }

    #[test]
    fn test_job_filter_rejects_bad_ids() {
        assert!(JobFilter::parse("12,a/b").is_err());
    }
}
