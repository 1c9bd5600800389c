// crates/github/src/error.rs
use std::path::PathBuf;

use jobbot_core::RemoteError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GithubError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("GitHub returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to sign App JWT: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Cannot read App private key {path}: {source}")]
    Key {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No GitHub credentials: set [github] token, App credentials, or GITHUB_TOKEN")]
    MissingCredentials,
}

impl GithubError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Convert into the core's remote error for `operation`.
    pub fn into_remote(self, operation: impl Into<String>) -> RemoteError {
        let status = self.status();
        let err = RemoteError::new(operation, self.to_string());
        match status {
            Some(s) => err.with_status(s),
            None => err,
        }
    }
}
