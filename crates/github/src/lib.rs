// crates/github/src/lib.rs
//! GitHub REST implementation of the comment API used by the job manager.

pub mod auth;
pub mod client;
pub mod error;

pub use auth::{AppAuth, TokenSource};
pub use client::{GithubClient, DEFAULT_API_URL};
pub use error::GithubError;
