//! Cross-branch delta algebra.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{EvaluationResult, MetricValue};

/// Delta between a branch-A and branch-B value of the same metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricDelta {
    /// `b - a`.
    pub delta: f64,
    /// `delta / a * 100`, undefined when `a == 0`.
    pub delta_pct: Option<f64>,
    /// Direction verdict for the metric's polarity.
    pub improved: bool,
}

/// Compute the delta of two raw values.
///
/// Returns `None` unless both values are numeric.
pub fn compute_delta(a: &MetricValue, b: &MetricValue, lower_is_better: bool) -> Option<MetricDelta> {
    let a = a.as_f64()?;
    let b = b.as_f64()?;
    Some(delta_of(a, b, lower_is_better))
}

/// Delta of two plain numbers.
pub fn delta_of(a: f64, b: f64, lower_is_better: bool) -> MetricDelta {
    let delta = b - a;
    let delta_pct = (a != 0.0).then(|| delta / a * 100.0);
    let improved = if lower_is_better { delta < 0.0 } else { delta > 0.0 };
    MetricDelta {
        delta,
        delta_pct,
        improved,
    }
}

/// Build the compared result: a copy of `b` carrying the delta fields and
/// `a`'s value as `baseline`. Non-numeric pairs get no delta.
pub fn compare_results(
    a: &EvaluationResult,
    b: &EvaluationResult,
    lower_is_better: bool,
) -> EvaluationResult {
    let mut out = b.clone();
    out.baseline = a.value.clone();
    out.new_in_branch_b = false;
    match compute_delta(&a.value, &b.value, lower_is_better) {
        Some(d) => {
            out.delta = Some(d.delta);
            out.delta_pct = d.delta_pct;
            out.improved = Some(d.improved);
        }
        None => {
            out.delta = None;
            out.delta_pct = None;
            out.improved = None;
        }
    }
    out
}

/// Pair branch-B results with branch-A results by metric name.
///
/// Each B result is compared with its A counterpart when one exists, or
/// passed through flagged `new_in_branch_b`. Output order follows B.
pub fn pair_results<F>(
    results_a: &[EvaluationResult],
    results_b: &[EvaluationResult],
    compare: F,
) -> Vec<EvaluationResult>
where
    F: Fn(&EvaluationResult, &EvaluationResult) -> EvaluationResult,
{
    let index: HashMap<&str, &EvaluationResult> =
        results_a.iter().map(|r| (r.name.as_str(), r)).collect();

    results_b
        .iter()
        .map(|b| match index.get(b.name.as_str()) {
            Some(a) => compare(a, b),
            None => {
                debug!(metric = %b.name, "metric only present in branch B");
                let mut out = b.clone();
                out.new_in_branch_b = true;
                out.delta = None;
                out.delta_pct = None;
                out.improved = None;
                out
            }
        })
        .collect()
}
