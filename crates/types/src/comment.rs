// crates/types/src/comment.rs
//! Pull-request comment model: cached handles and the status table rows
//! appended to a comment body.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A remote comment as last seen by this process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentHandle {
    pub comment_id: u64,
    pub body: String,
}

/// Lifecycle phase shown in the second column of a status row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Released,
    ReleaseFailed,
    Running,
    Finished,
    TestResult,
    Resubmitted,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown job phase {0:?}")]
pub struct UnknownPhase(pub String);

impl Phase {
    pub const ALL: [Phase; 6] = [
        Phase::Released,
        Phase::ReleaseFailed,
        Phase::Running,
        Phase::Finished,
        Phase::TestResult,
        Phase::Resubmitted,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Released => "released",
            Self::ReleaseFailed => "release failed",
            Self::Running => "running",
            Self::Finished => "finished",
            Self::TestResult => "test result",
            Self::Resubmitted => "resubmitted",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = UnknownPhase;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownPhase(wanted.to_string()))
    }
}

/// One `|<timestamp>|<phase>|<description>|` row of a comment's status table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRow {
    pub timestamp: String,
    pub phase: Phase,
    pub description: String,
}

impl StatusRow {
    /// Wire form appended to a comment body, leading newline included.
    pub fn render(&self) -> String {
        format!(
            "\n|{}|{}|{}|",
            self.timestamp,
            self.phase.as_str(),
            self.description
        )
    }

    /// Parse a single table line. Header and separator lines yield `None`.
    pub fn parse_line(line: &str) -> Option<Self> {
        let inner = line.trim().strip_prefix('|')?.strip_suffix('|')?;
        let mut cells = inner.splitn(3, '|');
        let timestamp = cells.next()?.trim();
        let phase = cells.next()?.parse::<Phase>().ok()?;
        let description = cells.next()?.trim();
        Some(Self {
            timestamp: timestamp.to_string(),
            phase,
            description: description.to_string(),
        })
    }
}

/// Every status row found in a comment body, in order of appearance.
pub fn parse_status_rows(body: &str) -> Vec<StatusRow> {
    body.lines().filter_map(StatusRow::parse_line).collect()
}
