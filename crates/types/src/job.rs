// crates/types/src/job.rs
//! Job identifiers and the per-poll records produced from the scheduler listing.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier assigned to a job by the batch scheduler.
///
/// Ordering is numeric-aware: purely numeric ids sort by value (`"9" < "10"`)
/// and come before anything else, which sorts lexically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JobId(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobIdError {
    #[error("job id must not be empty")]
    Empty,

    #[error("job id {0:?} contains whitespace or a path separator")]
    InvalidChar(String),
}

impl JobId {
    pub fn new(value: impl Into<String>) -> Result<Self, JobIdError> {
        let value = value.into();
        if value.is_empty() {
            return Err(JobIdError::Empty);
        }
        if value
            .chars()
            .any(|c| c.is_whitespace() || c == '/' || c == '\\' || c.is_control())
        {
            return Err(JobIdError::InvalidChar(value));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the id consists of ASCII digits only (plain, non-array jobs).
    pub fn is_numeric(&self) -> bool {
        self.0.bytes().all(|b| b.is_ascii_digit())
    }

    fn sort_key(&self) -> (bool, usize, &str, &str) {
        if self.is_numeric() {
            let digits = self.0.trim_start_matches('0');
            (false, digits.len(), digits, self.0.as_str())
        } else {
            (true, 0, "", self.0.as_str())
        }
    }
}

impl Ord for JobId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl PartialOrd for JobId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for JobId {
    type Err = JobIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.trim())
    }
}

impl TryFrom<String> for JobId {
    type Error = JobIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<JobId> for String {
    fn from(id: JobId) -> Self {
        id.0
    }
}

/// Coarse scheduler state of a job as seen in one listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Pending,
    Running,
    /// Any other state code, kept verbatim (e.g. `COMPLETING`, `OOM`).
    Other(String),
}

impl JobState {
    /// Map a scheduler state code (long or short form) onto a `JobState`.
    pub fn parse(code: &str) -> Self {
        match code.trim() {
            "PENDING" | "PD" => Self::Pending,
            "RUNNING" | "R" => Self::Running,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Other(code) => code,
        }
    }

    /// Human-readable explanation for terminal states worth a warning.
    pub fn bad_state_message(&self) -> Option<&'static str> {
        let Self::Other(code) = self else {
            return None;
        };
        match code.as_str() {
            "F" | "FAILED" => Some("Failure"),
            "NF" | "NODE_FAIL" => Some("Node Failure"),
            "OOM" | "OUT_OF_MEMORY" => Some("Out of Memory"),
            "TO" | "TIMEOUT" => Some("Time Out"),
            _ => None,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the scheduler listing. Produced fresh on every poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub state: JobState,
    pub reason: String,
}

impl JobRecord {
    pub fn is_running(&self) -> bool {
        self.state == JobState::Running
    }
}

/// Current jobs keyed by id.
pub type Snapshot = BTreeMap<JobId, JobRecord>;

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> JobId {
        JobId::new(s).unwrap()
    }

    #[test]
    fn test_job_id_rejects_empty_and_separators() {
        assert_eq!(JobId::new(""), Err(JobIdError::Empty));
        assert!(matches!(JobId::new("12 3"), Err(JobIdError::InvalidChar(_))));
        assert!(matches!(JobId::new("../12"), Err(JobIdError::InvalidChar(_))));
        assert!(JobId::new("1234_5").is_ok());
    }

    #[test]
    fn test_job_id_numeric_detection() {
        assert!(id("42").is_numeric());
        assert!(!id("42_1").is_numeric());
        assert!(!id("abc").is_numeric());
    }

    #[test]
    fn test_job_id_orders_numerically() {
        let mut ids = vec![id("10"), id("9"), id("100"), id("11")];
        ids.sort();
        let sorted: Vec<&str> = ids.iter().map(JobId::as_str).collect();
        assert_eq!(sorted, vec!["9", "10", "11", "100"]);
    }

    #[test]
    fn test_job_id_zero_padded_orders_by_value() {
        assert!(id("1") < id("09"));
        assert!(id("007") < id("8"));
        assert_ne!(id("07").cmp(&id("7")), Ordering::Equal);
    }

    #[test]
    fn test_job_id_numeric_before_other() {
        let mut ids = vec![id("12_1"), id("13"), id("2")];
        ids.sort();
        let sorted: Vec<&str> = ids.iter().map(JobId::as_str).collect();
        assert_eq!(sorted, vec!["2", "13", "12_1"]);
    }

    #[test]
    fn test_job_id_serde_is_plain_string() {
        let json = serde_json::to_string(&id("77")).unwrap();
        assert_eq!(json, "\"77\"");
        let back: JobId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id("77"));
        assert!(serde_json::from_str::<JobId>("\"\"").is_err());
    }

    #[test]
    fn test_job_state_parse_long_and_short() {
        assert_eq!(JobState::parse("PENDING"), JobState::Pending);
        assert_eq!(JobState::parse("PD"), JobState::Pending);
        assert_eq!(JobState::parse("RUNNING"), JobState::Running);
        assert_eq!(JobState::parse("R"), JobState::Running);
        assert_eq!(
            JobState::parse("COMPLETING"),
            JobState::Other("COMPLETING".to_string())
        );
    }

    #[test]
    fn test_bad_state_messages() {
        assert_eq!(JobState::parse("OOM").bad_state_message(), Some("Out of Memory"));
        assert_eq!(JobState::parse("TIMEOUT").bad_state_message(), Some("Time Out"));
        assert_eq!(JobState::parse("NODE_FAIL").bad_state_message(), Some("Node Failure"));
        assert_eq!(JobState::parse("F").bad_state_message(), Some("Failure"));
        assert_eq!(JobState::Running.bad_state_message(), None);
        assert_eq!(JobState::parse("COMPLETING").bad_state_message(), None);
    }
}
