// crates/core/src/error.rs
use std::path::PathBuf;
use std::time::Duration;

use jobbot_types::JobId;
use thiserror::Error;

/// Errors from invoking the batch scheduler's command line tools.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Failed to spawn scheduler command `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Scheduler command `{command}` exited with {code:?}: {stderr}")]
    NonZeroExit {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Scheduler command `{command}` timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("Scheduler command is empty (check {setting})")]
    EmptyCommand { setting: &'static str },
}

/// Errors from the on-disk job registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Job {id} is already registered at {path}")]
    AlreadyRegistered { id: JobId, path: PathBuf },

    #[error("Job {id} is not registered (no entry at {path})")]
    NotRegistered { id: JobId, path: PathBuf },

    #[error("Job {id} is already finished (entry exists at {path})")]
    AlreadyFinished { id: JobId, path: PathBuf },

    #[error("Invalid job id for registry: {id}")]
    InvalidId { id: JobId },

    #[error("Registry directory not found: {path}")]
    DirNotFound { path: PathBuf },

    #[error("Permission denied accessing registry path: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("IO error accessing registry path {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RegistryError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::DirNotFound { path },
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            _ => Self::Io { path, source },
        }
    }
}

/// Errors reading sidecar files. A missing file is not an error.
#[derive(Debug, Error)]
pub enum SidecarError {
    #[error("Permission denied reading sidecar file: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("IO error reading sidecar file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed line {line} in {path}: {message}")]
    Malformed {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Invalid value for [{section}] {key} in {path}: {value:?}")]
    InvalidValue {
        path: PathBuf,
        section: String,
        key: String,
        value: String,
    },

    #[error("Missing [{section}] {key} in {path}")]
    MissingKey {
        path: PathBuf,
        section: String,
        key: String,
    },
}

impl SidecarError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            _ => Self::Io { path, source },
        }
    }
}

/// A single failed call against the remote comment service.
#[derive(Debug, Error)]
#[error("{operation} failed{}: {message}", status_suffix(.status))]
pub struct RemoteError {
    pub operation: String,
    pub status: Option<u16>,
    pub message: String,
}

impl RemoteError {
    pub fn new(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

/// Notification failures surfaced to the processors.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("{operation} gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        #[source]
        last: RemoteError,
    },
}

/// Problems with the application configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("IO error reading config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed TOML in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Missing required setting [{section}] {key}")]
    Missing {
        section: &'static str,
        key: &'static str,
    },

    #[error("Invalid value for [{section}] {key}: {message}")]
    Invalid {
        section: &'static str,
        key: &'static str,
        message: String,
    },
}

impl ConfigError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }
}

/// Failure while processing one job. Caught per job by the loop.
#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Sidecar(#[from] SidecarError),

    #[error(transparent)]
    Notify(#[from] NotifyError),

    #[error("Job {id} is registered but has no metadata file at {path}")]
    MissingMetadata { id: JobId, path: PathBuf },
}

/// Failure that aborts a whole iteration; nothing was processed.
#[derive(Debug, Error)]
pub enum IterationError {
    #[error("Snapshot failed: {0}")]
    Snapshot(#[source] SchedulerError),

    #[error("Registry scan failed: {0}")]
    Registry(#[source] RegistryError),
}
