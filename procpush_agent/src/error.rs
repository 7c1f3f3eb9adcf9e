//! Error taxonomy for the agent.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Per-process failure. Never fatal: the scanner skips the pid.
#[derive(Debug, Error)]
pub enum SampleError {
    #[error("process {pid} unreadable: {source}")]
    ProcessUnreadable {
        pid: u32,
        #[source]
        source: io::Error,
    },
}

/// Failure of a whole scan. Aborts the cycle.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to read {}: {source}", root.display())]
    RootUnreadable {
        root: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Failure of one push attempt.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to compress write request: {0}")]
    Encode(#[from] snap::Error),
    #[error("remote endpoint returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("failed to build http client: {0}")]
    Client(String),
}

/// Outcome of a failed publish cycle, as seen by the scheduler.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error("push failed after {attempts} attempt(s): {last}")]
    Publish {
        attempts: u32,
        #[source]
        last: PublishError,
    },
}

/// Invalid startup configuration. The agent exits before the first cycle.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("--remote.url is required")]
    MissingRemoteUrl,
    #[error("invalid --remote.url {url:?}: {reason}")]
    InvalidRemoteUrl { url: String, reason: String },
    #[error("invalid label {0:?}: expected key=value")]
    MalformedLabel(String),
    #[error("invalid label {0:?}: key must not be empty")]
    EmptyLabelKey(String),
    #[error("invalid duration {0:?}")]
    InvalidDuration(String),
    #[error("--interval must be greater than zero")]
    ZeroInterval,
}
