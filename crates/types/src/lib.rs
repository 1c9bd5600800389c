// crates/types/src/lib.rs
//! Shared data model for the job manager crates.

pub mod comment;
pub mod job;
pub mod sidecar;

pub use comment::*;
pub use job::*;
pub use sidecar::*;
