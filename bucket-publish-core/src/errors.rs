//! Errors that stop a publish run before or outside per-resource work.
//!
//! Per-resource render and upload failures are not errors at this level; they
//! are recorded as [`crate::publish::PublishOutcome::Failed`] in the report.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PublishError {
    /// The run is misconfigured and nothing was attempted.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The renderer could not list its resources.
    #[error("Listing resources failed: {0}")]
    Listing(String),
}

impl PublishError {
    pub fn config(msg: impl Into<String>) -> Self {
        PublishError::Config(msg.into())
    }
}
