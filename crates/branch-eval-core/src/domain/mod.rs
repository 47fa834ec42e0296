//! Domain models for branch-eval.
//!
//! - `BranchSnapshot`: lazily-cached view of one branch
//! - `EvaluationResult`: one named measurement, optionally compared
//! - `EvalReport`: ordered results of a full two-branch pass
//! - `MetricValue`: tagged raw measurement

pub mod error;
pub mod report;
pub mod result;
pub mod snapshot;
pub mod value;

pub use error::{EvalError, Result};
pub use report::{EvalReport, ReportDocument, ReportSummary, Verdict};
pub use result::{EvalStatus, EvaluationResult};
pub use snapshot::{BranchInfo, BranchSnapshot};
pub use value::MetricValue;
