// crates/core/src/lib.rs
pub mod comments;
pub mod config;
pub mod diff;
pub mod error;
pub mod notify;
pub mod process;
pub mod reconcile;
pub mod registry;
pub mod retry;
pub mod scheduler;
pub mod sidecar;

pub use config::{AppConfig, RuntimeSettings, Template};
pub use diff::{diff, JobDiff};
pub use error::*;
pub use notify::{CommentApi, NotificationClient};
pub use process::{CommentCache, JobOutcome, Transition};
pub use reconcile::{IterationLimit, IterationReport, JobFilter, JobManager, RunSummary};
pub use registry::{JobRegistry, SymlinkRegistry};
pub use retry::{RetryPolicy, Sleeper, ThreadSleeper};
pub use scheduler::{Scheduler, SlurmScheduler};
