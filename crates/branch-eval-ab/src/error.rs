//! Error types for behavioral A/B runs

use std::path::PathBuf;

use branch_eval_core::EvalError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AbError {
    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error("Cannot load test suite {path:?}: {reason}")]
    Suite { path: PathBuf, reason: String },

    #[error("Timeout after {0}s")]
    Timeout(u64),

    #[error("Failed to start agent {program}: {reason}")]
    Spawn { program: String, reason: String },

    #[error("Agent exited with status {code}: {stderr}")]
    AgentFailed { code: i32, stderr: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AbError {
    /// Whether this error aborts the whole comparison rather than a single
    /// test case.
    pub fn is_fatal(&self) -> bool {
        match self {
            AbError::Eval(err) => err.is_fatal(),
            AbError::Suite { .. } => true,
            _ => false,
        }
    }
}

/// Result type for behavioral runs
pub type Result<T> = std::result::Result<T, AbError>;
