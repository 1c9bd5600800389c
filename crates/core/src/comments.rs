// crates/core/src/comments.rs
//! Building the status rows appended to pull-request comments, and
//! recognising the comment that belongs to a job.

use chrono::{DateTime, Utc};
use jobbot_types::{JobId, Phase, StatusRow};
use regex_lite::Regex;

/// `Mar 04 10:00:00 UTC 2024`
pub const TIMESTAMP_FORMAT: &str = "%b %d %X %Z %Y";

/// Source of "now" for row timestamps.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// A row stamped with the clock's current time.
pub fn status_row(clock: &dyn Clock, phase: Phase, description: impl Into<String>) -> StatusRow {
    StatusRow {
        timestamp: format_timestamp(clock.now()),
        phase,
        description: description.into(),
    }
}

/// Pattern a job's submission comment matches: ``submitted.*job id `<ID>` ``.
pub fn job_comment_pattern(id: &JobId) -> Option<Regex> {
    let pattern = format!("submitted.*job id `{}`", regex_lite::escape(id.as_str()));
    Regex::new(&pattern).ok()
}

pub fn mentions_job(body: &str, id: &JobId) -> bool {
    job_comment_pattern(id).is_some_and(|re| re.is_match(body))
}
