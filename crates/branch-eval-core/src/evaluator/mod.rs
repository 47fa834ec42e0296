//! Evaluator contract: a pluggable measurement run against one branch.
//!
//! Implementors provide [`Evaluator::evaluate_branch`]; the default
//! [`Evaluator::run`] evaluates both branches and pairs the results through
//! [`Evaluator::compare`].

pub mod compare;
pub mod registry;

use async_trait::async_trait;

use crate::domain::{BranchSnapshot, EvaluationResult, Result};

pub use compare::{compare_results, compute_delta, delta_of, pair_results, MetricDelta};
pub use registry::{EvaluatorRegistry, QUICK_EVALUATORS};

/// A measurement unit producing zero or more named metrics from one branch.
#[async_trait]
pub trait Evaluator: Send + Sync {
    /// Unique registry key, also the metric-name prefix.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Polarity of every metric this evaluator emits.
    fn lower_is_better(&self) -> bool {
        false
    }

    /// Measure one branch.
    async fn evaluate_branch(&self, snapshot: &BranchSnapshot) -> Result<Vec<EvaluationResult>>;

    /// Compare the same metric across branches.
    fn compare(&self, a: &EvaluationResult, b: &EvaluationResult) -> EvaluationResult {
        compare_results(a, b, self.lower_is_better())
    }

    /// Evaluate both branches and pair the results by metric name.
    async fn run(
        &self,
        snapshot_a: &BranchSnapshot,
        snapshot_b: &BranchSnapshot,
    ) -> Result<Vec<EvaluationResult>> {
        let results_a = self.evaluate_branch(snapshot_a).await?;
        let results_b = self.evaluate_branch(snapshot_b).await?;
        Ok(pair_results(&results_a, &results_b, |a, b| {
            self.compare(a, b)
        }))
    }
}
