// src/errors.rs

//! Crate-wide error type and result alias.

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CirunError {
    /// Executable missing or the OS refused to spawn it. Never retried.
    #[error("failed to start `{command}`: {source}")]
    Startup {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// An operation was attempted in a lifecycle state that does not allow it
    /// (e.g. `start()` on a handle that is already running).
    #[error("invalid state for `{command}`: {reason}")]
    InvalidState { command: String, reason: String },

    /// The process exited non-zero.
    #[error("`{command}` exited with code {code}")]
    Runtime { command: String, code: i32 },

    /// The process did not exit within its configured bound and was killed.
    #[error("`{command}` timed out after {elapsed:?}")]
    Timeout { command: String, elapsed: Duration },

    /// The output reader did not finish within its grace period. Only ever
    /// logged; never returned from `wait()`.
    #[error("output reader for `{command}` did not finish within {grace:?}")]
    ReaderJoinTimeout { command: String, grace: Duration },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, CirunError>;
