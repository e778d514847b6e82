//! Error taxonomy
//!
//! One error kind per failure class of the coordination pipeline. The rule
//! of thumb for propagation: `Config` aborts startup, `Parse` is reported
//! back to the submitting client as `result:-1`, connectivity and timeout
//! failures stay inside the connector, and `Fatal` marks an internally
//! inconsistent pixel state that fails the current command only.

use thiserror::Error;

/// Errors produced by the layout coordination core.
#[derive(Error, Debug)]
pub enum UlaError {
    /// Screen definition missing, undecodable, or structurally invalid.
    /// Fatal to the caller.
    #[error("config error: {0}")]
    Config(String),

    /// Incoming layout command JSON malformed or out of range.
    #[error("parse error: {0}")]
    Parse(String),

    /// A node or compositor cannot be reached.
    #[error("connectivity error: {0}")]
    Connectivity(String),

    /// The per-target response watchdog fired.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Magic mismatch, short frame, length inconsistency, or an unknown
    /// response type on one of the framed sockets.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Inconsistent derived pixel state (duplicate display or VID) or a
    /// failed internal marshal.
    #[error("fatal: {0}")]
    Fatal(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl UlaError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn connectivity(msg: impl Into<String>) -> Self {
        Self::Connectivity(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::Fatal(msg.into())
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, UlaError>;
