//! Error taxonomy for branch-eval.

use std::path::PathBuf;

/// Errors produced by the evaluation engine.
///
/// Configuration errors and [`EvalError::BudgetExceeded`] abort a run.
/// Everything else is normally caught at the item boundary and turned into
/// an `error`-status result.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("branch path does not exist: {0}")]
    BranchNotFound(PathBuf),

    #[error("missing API key: set one of {}", .names.join(", "))]
    MissingApiKey { names: Vec<String> },

    #[error("unknown evaluator: {0}")]
    UnknownEvaluator(String),

    #[error("evaluator already registered: {0}")]
    DuplicateEvaluator(String),

    #[error("budget exceeded: spent ${spent:.4} of ${budget:.2}")]
    BudgetExceeded { spent: f64, budget: f64 },

    #[error("provider error: {0}")]
    Provider(String),

    #[error("invalid prompt: {0}")]
    InvalidPrompt(String),

    #[error("evaluator {evaluator} failed: {reason}")]
    Evaluator { evaluator: String, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl EvalError {
    /// Whether this error must abort the surrounding run instead of being
    /// recorded as a per-item failure.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EvalError::BudgetExceeded { .. }
                | EvalError::MissingApiKey { .. }
                | EvalError::BranchNotFound(_)
                | EvalError::Config(_)
        )
    }
}

impl From<reqwest::Error> for EvalError {
    fn from(err: reqwest::Error) -> Self {
        EvalError::Provider(err.without_url().to_string())
    }
}

/// Result type for branch-eval operations.
pub type Result<T> = std::result::Result<T, EvalError>;
