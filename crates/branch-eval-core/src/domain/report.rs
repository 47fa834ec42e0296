//! The eval report and its persisted document form.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::result::EvaluationResult;
use super::snapshot::BranchInfo;

/// Aggregate counts derived from a report's results.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ReportSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub improvements: usize,
    pub regressions: usize,
}

/// Overall direction of a comparison.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// More improvements than regressions.
    BranchBImproved,
    /// More regressions than improvements.
    BranchABetter,
    NoSignificantDifference,
}

/// Result of one full comparison pass over two branches.
///
/// Serializes through [`ReportDocument`]; the `summary` block is always
/// recomputed from `results`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "ReportDocument", from = "ReportDocument")]
pub struct EvalReport {
    pub timestamp: DateTime<Utc>,
    pub branch_a: BranchInfo,
    pub branch_b: BranchInfo,
    pub results: Vec<EvaluationResult>,
    pub duration: Duration,
    pub metadata: Map<String, Value>,
}

impl EvalReport {
    pub fn new(branch_a: BranchInfo, branch_b: BranchInfo) -> Self {
        Self {
            timestamp: Utc::now(),
            branch_a,
            branch_b,
            results: Vec::new(),
            duration: Duration::ZERO,
            metadata: Map::new(),
        }
    }

    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|r| r.passed()).count()
    }

    /// Failed plus errored results.
    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| r.failed()).count()
    }

    pub fn improvement_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_improvement()).count()
    }

    pub fn regression_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_regression()).count()
    }

    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            total: self.results.len(),
            passed: self.passed_count(),
            failed: self.failed_count(),
            improvements: self.improvement_count(),
            regressions: self.regression_count(),
        }
    }

    pub fn verdict(&self) -> Verdict {
        let improvements = self.improvement_count();
        let regressions = self.regression_count();
        if improvements > regressions {
            Verdict::BranchBImproved
        } else if regressions > improvements {
            Verdict::BranchABetter
        } else {
            Verdict::NoSignificantDifference
        }
    }

    /// Exit-code convention for both CLIs: regressions outnumber improvements.
    pub fn has_net_regression(&self) -> bool {
        self.regression_count() > self.improvement_count()
    }

    /// Results grouped by evaluator, preserving first-seen evaluator order.
    pub fn by_evaluator(&self) -> Vec<(&str, Vec<&EvaluationResult>)> {
        let mut groups: Vec<(&str, Vec<&EvaluationResult>)> = Vec::new();
        for result in &self.results {
            match groups.iter_mut().find(|(name, _)| *name == result.evaluator) {
                Some((_, items)) => items.push(result),
                None => groups.push((result.evaluator.as_str(), vec![result])),
            }
        }
        groups
    }

    pub fn find(&self, name: &str) -> Option<&EvaluationResult> {
        self.results.iter().find(|r| r.name == name)
    }
}

/// Persisted JSON shape of an [`EvalReport`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportDocument {
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
    pub branch_a: BranchInfo,
    pub branch_b: BranchInfo,
    #[serde(default)]
    pub summary: ReportSummary,
    pub results: Vec<EvaluationResult>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl From<EvalReport> for ReportDocument {
    fn from(report: EvalReport) -> Self {
        let summary = report.summary();
        Self {
            timestamp: report.timestamp,
            duration_ms: u64::try_from(report.duration.as_millis()).unwrap_or(u64::MAX),
            branch_a: report.branch_a,
            branch_b: report.branch_b,
            summary,
            results: report.results,
            metadata: report.metadata,
        }
    }
}

impl From<ReportDocument> for EvalReport {
    fn from(doc: ReportDocument) -> Self {
        Self {
            timestamp: doc.timestamp,
            branch_a: doc.branch_a,
            branch_b: doc.branch_b,
            results: doc.results,
            duration: Duration::from_millis(doc.duration_ms),
            metadata: doc.metadata,
        }
    }
}
