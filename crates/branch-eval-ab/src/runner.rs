//! Behavioral A/B orchestration.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use branch_eval_core::judge::{estimate_cost, judge_routing, JudgeVerdict, Usage};
use branch_eval_core::runner::resolve_branch_path;
use branch_eval_core::{
    AgentConfig, BranchInfo, BranchTarget, GitCli, GitMetadataProvider, Judge,
};
use chrono::Utc;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::agent::{AgentCommand, AgentExecutor};
use crate::case::{TestCase, TestType};
use crate::error::{AbError, Result};
use crate::result::{BranchResult, ComparisonResult, TestResult};
use crate::sanitize::sanitize_prompt;

/// Longest stderr excerpt kept in an error message.
const STDERR_EXCERPT_CHARS: usize = 500;

/// Scheduling and costing knobs for a run.
#[derive(Debug, Clone, PartialEq)]
pub struct AbOptions {
    pub timeout: Duration,
    /// Cases run at once within a branch. 1 is serial.
    pub max_concurrency: usize,
    /// Model whose pricing estimates cost when the agent reports none.
    pub pricing_model: String,
}

impl Default for AbOptions {
    fn default() -> Self {
        Self::from_config(&AgentConfig::default())
    }
}

impl AbOptions {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_secs),
            max_concurrency: config.max_concurrency.max(1),
            pricing_model: config.pricing_model.clone(),
        }
    }
}

/// Runs a test suite against two branches through an external agent.
pub struct AbRunner {
    agent: Arc<dyn AgentExecutor>,
    judge: Option<Arc<Judge>>,
    git: Arc<dyn GitMetadataProvider>,
    options: AbOptions,
}

impl AbRunner {
    pub fn new(agent: Arc<dyn AgentExecutor>, options: AbOptions) -> Self {
        Self {
            agent,
            judge: None,
            git: Arc::new(GitCli::default()),
            options,
        }
    }

    /// Runner for the configured agent CLI.
    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(
            Arc::new(AgentCommand::from_config(config)),
            AbOptions::from_config(config),
        )
    }

    pub fn with_judge(mut self, judge: Arc<Judge>) -> Self {
        self.judge = Some(judge);
        self
    }

    pub fn with_git(mut self, git: Arc<dyn GitMetadataProvider>) -> Self {
        self.git = git;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = timeout;
        self
    }

    pub fn options(&self) -> &AbOptions {
        &self.options
    }

    /// Run `cases` on branch A, then on branch B, and pair the outcomes.
    ///
    /// Per-case failures are recorded on the case. Missing branches and
    /// judge budget overruns abort the comparison.
    pub async fn compare(
        &self,
        branch_a: &BranchTarget,
        branch_b: &BranchTarget,
        cases: &[TestCase],
        test_type: TestType,
    ) -> Result<ComparisonResult> {
        let start = Instant::now();
        let path_a = resolve_branch_path(&branch_a.path)?;
        let path_b = resolve_branch_path(&branch_b.path)?;

        let run_id = Uuid::new_v4().to_string();
        info!(
            run_id = %run_id,
            test_type = %test_type,
            cases = cases.len(),
            concurrency = self.options.max_concurrency,
            "Starting behavioral comparison"
        );

        let result_a = self
            .run_branch(&branch_a.name, &path_a, cases, test_type)
            .await?;
        let result_b = self
            .run_branch(&branch_b.name, &path_b, cases, test_type)
            .await?;

        let duration = start.elapsed();
        info!(
            run_id = %run_id,
            duration_ms = duration.as_millis() as u64,
            "Behavioral comparison finished"
        );

        Ok(ComparisonResult {
            run_id,
            test_type,
            branch_a: result_a,
            branch_b: result_b,
            duration,
        })
    }

    /// Run every case against one branch, keeping input order.
    pub async fn run_branch(
        &self,
        name: &str,
        path: &Path,
        cases: &[TestCase],
        test_type: TestType,
    ) -> Result<BranchResult> {
        let (commit_hash, commit_message) = self.git.commit_info(path).await;
        let info = BranchInfo {
            name: name.to_string(),
            path: path.to_path_buf(),
            commit_hash,
            commit_message,
            timestamp: Utc::now(),
        };
        info!(branch = %name, cases = cases.len(), "Running branch suite");

        let results: Vec<TestResult> = stream::iter(cases)
            .map(|case| self.run_case(&info, case, test_type))
            .buffered(self.options.max_concurrency.max(1))
            .try_collect()
            .await?;

        Ok(BranchResult::new(info, test_type, results))
    }

    async fn run_case(
        &self,
        branch: &BranchInfo,
        case: &TestCase,
        test_type: TestType,
    ) -> Result<TestResult> {
        let mut result = TestResult::new(&case.id, &branch.name);
        result.prompt = case.prompt_text().to_string();
        result.expected = case.expected.clone();
        result.metadata.insert(
            "directory".to_string(),
            Value::String(branch.path.display().to_string()),
        );
        result
            .metadata
            .insert("test_type".to_string(), Value::String(test_type.to_string()));
        if !case.criteria.is_empty() {
            result
                .metadata
                .insert("criteria".to_string(), json!(case.criteria));
        }

        let prompt = match sanitize_prompt(&case.prompt) {
            Ok(prompt) => prompt,
            Err(err) => {
                warn!(test = %case.id, error = %err, "Rejected test prompt");
                result.error = Some(err.to_string());
                return Ok(result);
            }
        };
        result.prompt = prompt.clone();

        let start = Instant::now();
        let outcome = self
            .agent
            .execute(&branch.path, &prompt, self.options.timeout)
            .await;
        result.elapsed_ms = start.elapsed().as_millis() as u64;

        let output = match outcome {
            Ok(output) => output,
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                warn!(test = %case.id, branch = %branch.name, error = %err, "Agent run failed");
                result.error = Some(err.to_string());
                return Ok(result);
            }
        };

        let parsed = crate::parse::parse_agent_output(&output.stdout, &output.stderr);
        result.response = parsed.response;
        result.input_tokens = parsed.input_tokens;
        result.output_tokens = parsed.output_tokens;
        result.tool_calls = parsed.tool_calls;
        result.cost_usd = parsed.cost_usd.unwrap_or_else(|| {
            estimate_cost(
                &self.options.pricing_model,
                Usage {
                    input_tokens: parsed.input_tokens,
                    output_tokens: parsed.output_tokens,
                },
            )
        });
        result.actual = result
            .response
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string);
        if let Some(turns) = parsed.turns {
            result.metadata.insert("turns".to_string(), turns.into());
        }

        if !output.succeeded() {
            let stderr: String = output.stderr.trim().chars().take(STDERR_EXCERPT_CHARS).collect();
            let err = AbError::AgentFailed {
                code: output.exit_code,
                stderr,
            };
            warn!(test = %case.id, branch = %branch.name, error = %err, "Agent exited unsuccessfully");
            result.error = Some(err.to_string());
            return Ok(result);
        }

        if let Some(verdict) = self.score(&result.response, case, test_type).await? {
            result.quality_score = Some(verdict.score);
            result.passed = Some(verdict.passed);
            result.metadata.insert(
                "judge_reasoning".to_string(),
                Value::String(verdict.reasoning),
            );
            if !verdict.criteria_scores.is_empty() {
                result
                    .metadata
                    .insert("criteria_scores".to_string(), json!(verdict.criteria_scores));
            }
        }

        info!(
            test = %case.id,
            branch = %branch.name,
            elapsed_ms = result.elapsed_ms,
            passed = ?result.passed,
            "Test case finished"
        );
        Ok(result)
    }

    /// Routing cases are checked by name match; quality cases need a judge
    /// and criteria.
    async fn score(
        &self,
        response: &str,
        case: &TestCase,
        test_type: TestType,
    ) -> Result<Option<JudgeVerdict>> {
        match (test_type, &self.judge) {
            (TestType::Routing, _) => Ok(case
                .expected
                .as_deref()
                .map(|expected| judge_routing(response, expected))),
            (TestType::Quality, Some(judge)) if !case.criteria.is_empty() => {
                let verdict = judge
                    .judge(
                        response,
                        &case.criteria,
                        case.context.as_deref(),
                        case.expected.as_deref(),
                    )
                    .await?;
                Ok(Some(verdict))
            }
            (TestType::Quality, _) => Ok(None),
        }
    }
}

/// Text listing of what a run would execute, without executing it.
pub fn describe_plan(
    pair_name: &str,
    branch_a: &BranchTarget,
    branch_b: &BranchTarget,
    cases: &[TestCase],
    test_type: TestType,
) -> String {
    let mut out = format!(
        "[{pair_name}] {test_type}: {} case(s)\n",
        cases.len()
    );
    for branch in [branch_a, branch_b] {
        out.push_str(&format!("  {} ({})\n", branch.name, branch.path.display()));
        for case in cases {
            let prompt: String = case.prompt_text().chars().take(60).collect();
            out.push_str(&format!("    - {}: {}\n", case.id, prompt));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_follow_agent_config() {
        let config = AgentConfig {
            timeout_secs: 30,
            max_concurrency: 0,
            ..AgentConfig::default()
        };
        let options = AbOptions::from_config(&config);
        assert_eq!(options.timeout, Duration::from_secs(30));
        assert_eq!(options.max_concurrency, 1);
        assert_eq!(options.pricing_model, "claude-sonnet");
    }

    #[test]
    fn plan_lists_cases_for_both_branches() {
        let cases = vec![
            TestCase::new("r1", "Write a PRD for search"),
            TestCase::new("r2", "Review my diff"),
        ];
        let plan = describe_plan(
            "default",
            &BranchTarget::new("main", "../main"),
            &BranchTarget::new("feature", "."),
            &cases,
            TestType::Routing,
        );
        assert!(plan.starts_with("[default] routing: 2 case(s)\n"));
        assert_eq!(plan.matches("- r1: Write a PRD for search").count(), 2);
        assert!(plan.contains("  feature (.)\n"));
    }
}
