//! Behavioral results: per test, per branch, and the A/B comparison.

use std::time::Duration;

use branch_eval_core::{
    compare_results, pair_results, BranchInfo, EvalReport, EvalStatus, EvaluationResult,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::case::TestType;

/// Evaluator name under which behavioral metrics are reported.
pub const BEHAVIORAL: &str = "behavioral";

/// Metrics where a smaller value is the better outcome.
pub const LOWER_IS_BETTER: &[&str] = &[
    "avg_latency_ms",
    "avg_input_tokens",
    "avg_output_tokens",
    "total_tokens",
    "avg_tool_calls",
    "total_cost_usd",
    "errors",
];

/// Outcome of one test case on one branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub test_id: String,
    pub branch: String,
    pub prompt: String,
    pub response: String,
    pub elapsed_ms: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub tool_calls: u64,
    pub cost_usd: f64,
    pub expected: Option<String>,
    /// First line of the response, as the extracted answer.
    pub actual: Option<String>,
    pub quality_score: Option<f64>,
    pub passed: Option<bool>,
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl TestResult {
    pub fn new(test_id: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            test_id: test_id.into(),
            branch: branch.into(),
            prompt: String::new(),
            response: String::new(),
            elapsed_ms: 0,
            input_tokens: 0,
            output_tokens: 0,
            tool_calls: 0,
            cost_usd: 0.0,
            expected: None,
            actual: None,
            quality_score: None,
            passed: None,
            error: None,
            metadata: Map::new(),
        }
    }

    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }

    pub fn is_correct(&self) -> bool {
        self.passed == Some(true)
    }
}

/// Aggregate numbers for one branch's run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BranchMetrics {
    /// Percentage of test cases that passed, 0-100.
    pub accuracy: f64,
    /// Mean judge score over scored cases.
    pub avg_quality_score: f64,
    pub avg_latency_ms: f64,
    pub avg_input_tokens: f64,
    pub avg_output_tokens: f64,
    pub total_tokens: u64,
    pub avg_tool_calls: f64,
    pub total_cost_usd: f64,
    pub errors: u64,
}

impl BranchMetrics {
    /// Named values in reporting order.
    pub fn named(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("accuracy", self.accuracy),
            ("avg_quality_score", self.avg_quality_score),
            ("avg_latency_ms", self.avg_latency_ms),
            ("avg_input_tokens", self.avg_input_tokens),
            ("avg_output_tokens", self.avg_output_tokens),
            ("total_tokens", self.total_tokens as f64),
            ("avg_tool_calls", self.avg_tool_calls),
            ("total_cost_usd", self.total_cost_usd),
            ("errors", self.errors as f64),
        ]
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

/// All test results of one branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchResult {
    pub info: BranchInfo,
    pub test_type: TestType,
    pub results: Vec<TestResult>,
}

impl BranchResult {
    pub fn new(info: BranchInfo, test_type: TestType, results: Vec<TestResult>) -> Self {
        Self {
            info,
            test_type,
            results,
        }
    }

    pub fn metrics(&self) -> BranchMetrics {
        let results = &self.results;
        let total = results.len();
        let correct = results.iter().filter(|r| r.is_correct()).count();
        BranchMetrics {
            accuracy: if total == 0 {
                0.0
            } else {
                correct as f64 / total as f64 * 100.0
            },
            avg_quality_score: mean(results.iter().filter_map(|r| r.quality_score)),
            avg_latency_ms: mean(results.iter().map(|r| r.elapsed_ms as f64)),
            avg_input_tokens: mean(results.iter().map(|r| r.input_tokens as f64)),
            avg_output_tokens: mean(results.iter().map(|r| r.output_tokens as f64)),
            total_tokens: results.iter().map(TestResult::total_tokens).sum(),
            avg_tool_calls: mean(results.iter().map(|r| r.tool_calls as f64)),
            total_cost_usd: results.iter().map(|r| r.cost_usd).sum(),
            errors: results.iter().filter(|r| r.error.is_some()).count() as u64,
        }
    }

    fn evaluation_results(&self) -> Vec<EvaluationResult> {
        self.metrics()
            .named()
            .into_iter()
            .map(|(name, value)| {
                let result = EvaluationResult::metric(BEHAVIORAL, name, value);
                if name == "errors" && value > 0.0 {
                    result.with_status(EvalStatus::Failed)
                } else {
                    result
                }
            })
            .collect()
    }
}

/// Branch A (baseline) against branch B (candidate).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub run_id: String,
    pub test_type: TestType,
    pub branch_a: BranchResult,
    pub branch_b: BranchResult,
    pub duration: Duration,
}

impl ComparisonResult {
    pub fn is_lower_better(metric: &str) -> bool {
        LOWER_IS_BETTER.contains(&metric)
    }

    /// Per-metric comparison, named `behavioral:<metric>`.
    pub fn compared(&self) -> Vec<EvaluationResult> {
        pair_results(
            &self.branch_a.evaluation_results(),
            &self.branch_b.evaluation_results(),
            |a, b| {
                let metric = b.name.split_once(':').map_or(b.name.as_str(), |(_, m)| m);
                compare_results(a, b, Self::is_lower_better(metric))
            },
        )
    }

    /// Render the comparison in the shape the reporters consume.
    pub fn to_eval_report(&self) -> EvalReport {
        let mut report = EvalReport::new(self.branch_a.info.clone(), self.branch_b.info.clone());
        report.results = self.compared();
        report.duration = self.duration;
        report
            .metadata
            .insert("run_id".to_string(), Value::String(self.run_id.clone()));
        report.metadata.insert(
            "test_type".to_string(),
            Value::String(self.test_type.to_string()),
        );
        report
            .metadata
            .insert("test_cases".to_string(), self.branch_b.results.len().into());
        report.metadata.insert(
            "version".to_string(),
            Value::String(branch_eval_core::VERSION.to_string()),
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use branch_eval_core::{BranchSnapshot, MetricValue};

    fn result(id: &str, elapsed_ms: u64, passed: Option<bool>, score: Option<f64>) -> TestResult {
        let mut r = TestResult::new(id, "main");
        r.elapsed_ms = elapsed_ms;
        r.input_tokens = 100;
        r.output_tokens = 50;
        r.cost_usd = 0.01;
        r.passed = passed;
        r.quality_score = score;
        r
    }

    fn branch(name: &str, results: Vec<TestResult>) -> BranchResult {
        let info = BranchSnapshot::new(name, format!("/tmp/{name}"), "unknown", "")
            .info()
            .clone();
        BranchResult::new(info, TestType::Quality, results)
    }

    #[test]
    fn aggregates_branch_metrics() {
        let mut failed = result("c", 3000, None, None);
        failed.error = Some("Timeout after 3s".to_string());
        let b = branch(
            "main",
            vec![
                result("a", 1000, Some(true), Some(4.0)),
                result("b", 2000, Some(false), Some(2.0)),
                failed,
            ],
        );

        let m = b.metrics();
        assert!((m.accuracy - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(m.avg_quality_score, 3.0);
        assert_eq!(m.avg_latency_ms, 2000.0);
        assert_eq!(m.total_tokens, 450);
        assert!((m.total_cost_usd - 0.03).abs() < 1e-9);
        assert_eq!(m.errors, 1);
    }

    #[test]
    fn empty_branch_has_zero_metrics() {
        assert_eq!(branch("main", vec![]).metrics(), BranchMetrics::default());
    }

    #[test]
    fn latency_drop_is_an_improvement() {
        let cmp = ComparisonResult {
            run_id: "r".to_string(),
            test_type: TestType::Quality,
            branch_a: branch("main", vec![result("a", 2000, Some(true), Some(4.0))]),
            branch_b: branch("feature", vec![result("a", 1000, Some(true), Some(4.5))]),
            duration: Duration::from_millis(5),
        };

        let report = cmp.to_eval_report();
        let latency = report.find("behavioral:avg_latency_ms").unwrap();
        assert_eq!(latency.baseline, MetricValue::Float(2000.0));
        assert_eq!(latency.delta, Some(-1000.0));
        assert_eq!(latency.improved, Some(true));

        let quality = report.find("behavioral:avg_quality_score").unwrap();
        assert_eq!(quality.improved, Some(true));

        let accuracy = report.find("behavioral:accuracy").unwrap();
        assert_eq!(accuracy.delta, Some(0.0));
        assert_eq!(accuracy.improved, Some(false));

        assert_eq!(report.branch_b.name, "feature");
        assert_eq!(report.metadata["test_type"], "quality");
        assert!(!report.has_net_regression());
    }
}
