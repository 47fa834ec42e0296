//! branch-eval core library
//!
//! Compares two checkouts of an AI-agent configuration repository by running
//! pluggable evaluators against both and reporting per-metric deltas.

pub mod config;
pub mod domain;
pub mod evaluator;
pub mod evaluators;
pub mod git;
pub mod judge;
pub mod report;
pub mod runner;
pub mod telemetry;

pub use config::{
    AgentConfig, BranchPair, ContextConfig, EvalConfig, JudgeConfig, OutputConfig, SuiteConfig,
};

pub use domain::{
    BranchInfo, BranchSnapshot, EvalError, EvalReport, EvalStatus, EvaluationResult, MetricValue,
    ReportDocument, ReportSummary, Result, Verdict,
};

pub use evaluator::{
    compare_results, compute_delta, delta_of, pair_results, Evaluator, EvaluatorRegistry,
    MetricDelta, QUICK_EVALUATORS,
};

pub use evaluators::{
    PrimingEvaluator, RoutingEvaluator, RoutingProbe, StructureEvaluator, TokenEvaluator,
};

pub use git::{GitCli, GitMetadataProvider, UNKNOWN_COMMIT};

pub use judge::{
    judge_routing, CompletionProvider, CostTracker, GeminiProvider, Judge, JudgeVerdict,
    ModelPricing, Usage,
};

pub use report::{
    read_json_report, render_console_summary, render_markdown, write_json_report,
    write_markdown_report,
};

pub use runner::{BranchTarget, EvalRunner};

pub use telemetry::init_tracing;

/// Crate version, recorded in report metadata.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
