//! Evaluation results produced by evaluators and by cross-branch comparison.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::value::MetricValue;

/// Outcome status of a single metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvalStatus {
    Passed,
    Failed,
    Skipped,
    Error,
}

impl EvalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvalStatus::Passed => "passed",
            EvalStatus::Failed => "failed",
            EvalStatus::Skipped => "skipped",
            EvalStatus::Error => "error",
        }
    }
}

/// One named measurement.
///
/// `name` follows the `evaluator:metric` convention. The comparison fields
/// (`delta`, `delta_pct`, `improved`, `baseline`) are only populated on the
/// new result built by [`crate::evaluator::compare_results`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub evaluator: String,
    pub name: String,
    pub status: EvalStatus,
    /// Normalized score in 0-100.
    pub score: Option<f64>,
    #[serde(default)]
    pub value: MetricValue,
    #[serde(default)]
    pub expected: MetricValue,
    pub delta: Option<f64>,
    pub delta_pct: Option<f64>,
    pub improved: Option<bool>,
    #[serde(default)]
    pub details: Map<String, Value>,
    pub error: Option<String>,
    /// Branch A's value for the same metric, kept for rendering.
    #[serde(default, skip_serializing_if = "MetricValue::is_absent")]
    pub baseline: MetricValue,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub new_in_branch_b: bool,
}

impl EvaluationResult {
    /// A passed metric named `<evaluator>:<metric>`.
    pub fn metric(evaluator: &str, metric: &str, value: impl Into<MetricValue>) -> Self {
        Self {
            evaluator: evaluator.to_string(),
            name: format!("{evaluator}:{metric}"),
            status: EvalStatus::Passed,
            score: None,
            value: value.into(),
            expected: MetricValue::Absent,
            delta: None,
            delta_pct: None,
            improved: None,
            details: Map::new(),
            error: None,
            baseline: MetricValue::Absent,
            new_in_branch_b: false,
        }
    }

    /// An `error`-status result carrying the failure text.
    pub fn error(evaluator: &str, metric: &str, message: impl Into<String>) -> Self {
        let mut result = Self::metric(evaluator, metric, MetricValue::Absent);
        result.status = EvalStatus::Error;
        result.error = Some(message.into());
        result
    }

    pub fn with_status(mut self, status: EvalStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score.clamp(0.0, 100.0));
        self
    }

    pub fn with_expected(mut self, expected: impl Into<MetricValue>) -> Self {
        self.expected = expected.into();
        self
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    pub fn passed(&self) -> bool {
        self.status == EvalStatus::Passed
    }

    pub fn failed(&self) -> bool {
        matches!(self.status, EvalStatus::Failed | EvalStatus::Error)
    }

    pub fn is_improvement(&self) -> bool {
        self.improved == Some(true)
    }

    /// `improved == false` with a non-zero delta.
    pub fn is_regression(&self) -> bool {
        self.improved == Some(false) && self.delta.is_some_and(|d| d != 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_uses_evaluator_prefix() {
        let r = EvaluationResult::metric("tokens", "total", 500_i64);
        assert_eq!(r.name, "tokens:total");
        assert_eq!(r.status, EvalStatus::Passed);
        assert_eq!(r.value, MetricValue::Int(500));
    }

    #[test]
    fn error_result_carries_message() {
        let r = EvaluationResult::error("routing", "error", "boom");
        assert_eq!(r.name, "routing:error");
        assert_eq!(r.status, EvalStatus::Error);
        assert_eq!(r.error.as_deref(), Some("boom"));
        assert!(r.failed());
    }

    #[test]
    fn regression_requires_nonzero_delta() {
        let mut r = EvaluationResult::metric("tokens", "total", 500_i64);
        r.improved = Some(false);
        r.delta = Some(0.0);
        assert!(!r.is_regression());
        r.delta = Some(12.0);
        assert!(r.is_regression());
    }

    #[test]
    fn score_is_clamped() {
        let r = EvaluationResult::metric("routing", "accuracy", 1.5).with_score(140.0);
        assert_eq!(r.score, Some(100.0));
    }

    #[test]
    fn serde_omits_comparison_only_fields_when_unset() {
        let r = EvaluationResult::metric("tokens", "total", 10_i64);
        let v = serde_json::to_value(&r).unwrap();
        let obj = v.as_object().unwrap();
        assert!(!obj.contains_key("new_in_branch_b"));
        assert!(!obj.contains_key("baseline"));
        assert!(obj.contains_key("delta"));
        assert_eq!(v["status"], "passed");
    }
}
