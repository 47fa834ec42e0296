//! Behavioral runs against fake and real agent processes.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tempfile::TempDir;

use branch_eval_ab::{
    AbError, AbOptions, AbRunner, AgentCommand, AgentExecutor, AgentOutput, Result, TestCase,
    TestType,
};
use branch_eval_core::judge::{Completion, CompletionProvider, CompletionRequest};
use branch_eval_core::{
    BranchTarget, EvalError, GitMetadataProvider, Judge, JudgeConfig, MetricValue, Usage,
};

struct FixedGit;

#[async_trait]
impl GitMetadataProvider for FixedGit {
    async fn commit_info(&self, dir: &Path) -> (String, String) {
        let name = dir.file_name().unwrap().to_string_lossy().to_string();
        (format!("{name}-hash"), String::new())
    }
}

fn reply(text: &str, input_tokens: u64, output_tokens: u64) -> String {
    json!({
        "type": "result",
        "result": text,
        "num_turns": 1,
        "usage": {"input_tokens": input_tokens, "output_tokens": output_tokens},
    })
    .to_string()
}

/// Agent whose reply depends on the branch directory. Records every call.
struct FakeAgent {
    calls: Mutex<Vec<(PathBuf, String)>>,
    answer: fn(&Path, &str) -> String,
}

impl FakeAgent {
    fn new(answer: fn(&Path, &str) -> String) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            answer,
        })
    }

    fn branches_called(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(dir, _)| dir.file_name().unwrap().to_string_lossy().to_string())
            .collect()
    }
}

#[async_trait]
impl AgentExecutor for FakeAgent {
    async fn execute(&self, dir: &Path, prompt: &str, _timeout: Duration) -> Result<AgentOutput> {
        self.calls
            .lock()
            .unwrap()
            .push((dir.to_path_buf(), prompt.to_string()));
        Ok(AgentOutput {
            stdout: (self.answer)(dir, prompt),
            stderr: String::new(),
            exit_code: 0,
        })
    }
}

/// Judge backend returning the same verdict with fixed usage.
struct FixedVerdict {
    calls: AtomicUsize,
    usage: Usage,
}

impl FixedVerdict {
    fn new(input_tokens: u64) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            usage: Usage {
                input_tokens,
                output_tokens: 50,
            },
        })
    }
}

#[async_trait]
impl CompletionProvider for FixedVerdict {
    async fn complete(
        &self,
        _request: &CompletionRequest,
    ) -> branch_eval_core::Result<Completion> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Completion {
            text: r#"{"overall_score": 4.5, "criteria_scores": {"clarity": 4}, "reasoning": "clear"}"#
                .to_string(),
            usage: self.usage,
        })
    }
}

fn judge(provider: Arc<FixedVerdict>, budget_usd: f64) -> Arc<Judge> {
    let config = JudgeConfig {
        budget_usd,
        ..JudgeConfig::default()
    };
    Arc::new(Judge::new(provider, config))
}

fn branches() -> (TempDir, BranchTarget, BranchTarget) {
    let root = tempfile::tempdir().unwrap();
    let a = root.path().join("main");
    let b = root.path().join("feature");
    std::fs::create_dir_all(&a).unwrap();
    std::fs::create_dir_all(&b).unwrap();
    (root, BranchTarget::new("main", a), BranchTarget::new("feature", b))
}

fn runner(agent: Arc<dyn AgentExecutor>) -> AbRunner {
    AbRunner::new(agent, AbOptions::default()).with_git(Arc::new(FixedGit))
}

fn routing_cases() -> Vec<TestCase> {
    vec![
        TestCase::new("prd", "Write a PRD for search").with_expected("product-coach"),
        TestCase::new("review", "Review my diff").with_expected("code-reviewer"),
    ]
}

#[tokio::test]
async fn routing_comparison_scores_both_branches() {
    let agent = FakeAgent::new(|dir, prompt| {
        let on_feature = dir.ends_with("feature");
        let text = match (on_feature, prompt.contains("PRD")) {
            (true, true) => "Delegating to the product-coach agent.",
            (true, false) => "Using code_reviewer for this.",
            (false, _) => "I can help with that directly.",
        };
        reply(text, 1_000, 200)
    });
    let (_root, a, b) = branches();

    let cmp = runner(agent.clone())
        .compare(&a, &b, &routing_cases(), TestType::Routing)
        .await
        .unwrap();

    assert_eq!(cmp.branch_a.metrics().accuracy, 0.0);
    assert_eq!(cmp.branch_b.metrics().accuracy, 100.0);
    assert_eq!(cmp.branch_b.info.commit_hash, "feature-hash");

    let first = &cmp.branch_b.results[0];
    assert_eq!(first.passed, Some(true));
    assert_eq!(first.quality_score, Some(5.0));
    assert_eq!(first.actual.as_deref(), Some("Delegating to the product-coach agent."));
    assert_eq!(first.input_tokens, 1_000);
    assert!(first.cost_usd > 0.0);
    assert_eq!(first.metadata["test_type"], "routing");

    // Branch A's whole suite runs before branch B starts.
    assert_eq!(
        agent.branches_called(),
        vec!["main", "main", "feature", "feature"]
    );

    let report = cmp.to_eval_report();
    let accuracy = report.find("behavioral:accuracy").unwrap();
    assert_eq!(accuracy.baseline, MetricValue::Float(0.0));
    assert_eq!(accuracy.improved, Some(true));
    assert!(!report.has_net_regression());
}

#[tokio::test]
async fn quality_cases_go_through_the_judge() {
    let agent = FakeAgent::new(|_, _| reply("A tidy answer.", 10, 10));
    let provider = FixedVerdict::new(100);
    let (_root, a, b) = branches();
    let cases = vec![
        TestCase::new("q1", "Explain the plan").with_criteria(&["clarity"]),
        TestCase::new("q2", "No criteria here"),
    ];

    let cmp = runner(agent)
        .with_judge(judge(provider.clone(), 5.0))
        .compare(&a, &b, &cases, TestType::Quality)
        .await
        .unwrap();

    assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    let scored = &cmp.branch_a.results[0];
    assert_eq!(scored.quality_score, Some(4.5));
    assert_eq!(scored.passed, Some(true));
    assert_eq!(scored.metadata["judge_reasoning"], "clear");
    assert_eq!(scored.metadata["criteria"], json!(["clarity"]));
    assert_eq!(cmp.branch_a.results[1].quality_score, None);
    assert_eq!(cmp.branch_b.metrics().avg_quality_score, 4.5);
}

#[tokio::test]
async fn judge_budget_overrun_aborts_the_comparison() {
    let agent = FakeAgent::new(|_, _| reply("Answer", 10, 10));
    // 10M input tokens on gemini-2.0-flash costs $1.00.
    let provider = FixedVerdict::new(10_000_000);
    let (_root, a, b) = branches();
    let cases = vec![
        TestCase::new("q1", "one").with_criteria(&["clarity"]),
        TestCase::new("q2", "two").with_criteria(&["clarity"]),
    ];

    let err = runner(agent.clone())
        .with_judge(judge(provider.clone(), 0.5))
        .compare(&a, &b, &cases, TestType::Quality)
        .await
        .unwrap_err();

    assert!(matches!(err, AbError::Eval(EvalError::BudgetExceeded { .. })));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    assert!(!agent.branches_called().contains(&"feature".to_string()));
}

#[tokio::test]
async fn bad_prompt_fails_only_its_own_case() {
    let agent = FakeAgent::new(|_, prompt| reply(prompt, 1, 1));
    let (_root, a, b) = branches();
    let mut bad = TestCase::new("bad", "");
    bad.prompt = json!({"not": "a string"});
    let cases = vec![bad, TestCase::new("ok", "plain\u{7} prompt")];

    let cmp = runner(agent.clone())
        .compare(&a, &b, &cases, TestType::Quality)
        .await
        .unwrap();

    let results = &cmp.branch_a.results;
    assert!(results[0].error.as_deref().unwrap().contains("prompt must be a string"));
    assert_eq!(results[1].error, None);
    assert_eq!(results[1].response, "plain prompt");
    assert_eq!(agent.branches_called().len(), 2);
    assert_eq!(cmp.branch_b.metrics().errors, 1);
}

#[tokio::test]
async fn missing_branch_is_rejected_before_any_agent_call() {
    let agent = FakeAgent::new(|_, _| reply("x", 1, 1));
    let (_root, a, _) = branches();
    let ghost = BranchTarget::new("ghost", "/no/such/branch");

    let err = runner(agent.clone())
        .compare(&a, &ghost, &routing_cases(), TestType::Routing)
        .await
        .unwrap_err();

    assert!(err.is_fatal());
    assert!(agent.branches_called().is_empty());
}

/// Sleeps longer for earlier cases so completion order is reversed.
struct StaggeredAgent {
    running: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl AgentExecutor for StaggeredAgent {
    async fn execute(&self, _dir: &Path, prompt: &str, _timeout: Duration) -> Result<AgentOutput> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let n: u64 = prompt.parse().unwrap();
        tokio::time::sleep(Duration::from_millis((5 - n) * 20)).await;
        self.running.fetch_sub(1, Ordering::SeqCst);
        Ok(AgentOutput {
            stdout: reply(prompt, n, n),
            stderr: String::new(),
            exit_code: 0,
        })
    }
}

#[tokio::test]
async fn bounded_concurrency_keeps_input_order() {
    let agent = Arc::new(StaggeredAgent {
        running: AtomicUsize::new(0),
        peak: AtomicUsize::new(0),
    });
    let options = AbOptions {
        max_concurrency: 3,
        ..AbOptions::default()
    };
    let (_root, a, b) = branches();
    let cases: Vec<TestCase> = (0..5)
        .map(|i| TestCase::new(format!("c{i}"), i.to_string()))
        .collect();

    let cmp = AbRunner::new(agent.clone(), options)
        .with_git(Arc::new(FixedGit))
        .compare(&a, &b, &cases, TestType::Quality)
        .await
        .unwrap();

    let ids: Vec<&str> = cmp.branch_b.results.iter().map(|r| r.test_id.as_str()).collect();
    assert_eq!(ids, vec!["c0", "c1", "c2", "c3", "c4"]);
    assert_eq!(cmp.branch_a.results[4].response, "4");
    let peak = agent.peak.load(Ordering::SeqCst);
    assert!(peak > 1 && peak <= 3, "peak concurrency {peak}");
}

#[tokio::test]
async fn timed_out_agent_records_error_and_skips_judge() {
    let agent = AgentCommand::new(
        "sh",
        vec!["-c".to_string(), "sleep 10".to_string(), "sh".to_string()],
    );
    let provider = FixedVerdict::new(10);
    let (_root, a, b) = branches();
    let cases = vec![TestCase::new("slow", "take your time").with_criteria(&["clarity"])];

    let cmp = AbRunner::new(Arc::new(agent), AbOptions::default())
        .with_git(Arc::new(FixedGit))
        .with_judge(judge(provider.clone(), 5.0))
        .with_timeout(Duration::from_secs(1))
        .compare(&a, &b, &cases, TestType::Quality)
        .await
        .unwrap();

    for branch in [&cmp.branch_a, &cmp.branch_b] {
        let result = &branch.results[0];
        assert_eq!(result.error.as_deref(), Some("Timeout after 1s"));
        assert_eq!(result.response, "");
        assert_eq!(result.quality_score, None);
    }
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn real_agent_output_is_parsed() {
    let script = r#"printf '{"result":"%s","usage":{"input_tokens":12,"output_tokens":3},"total_cost_usd":0.5}' "$1""#;
    let agent = AgentCommand::new(
        "sh",
        vec!["-c".to_string(), script.to_string(), "sh".to_string()],
    );
    let (_root, a, b) = branches();
    let cases = vec![TestCase::new("echo", "route to product-coach").with_expected("product-coach")];

    let cmp = AbRunner::new(Arc::new(agent), AbOptions::default())
        .with_git(Arc::new(FixedGit))
        .compare(&a, &b, &cases, TestType::Routing)
        .await
        .unwrap();

    let result = &cmp.branch_b.results[0];
    assert_eq!(result.error, None);
    assert_eq!(result.response, "route to product-coach");
    assert_eq!(result.input_tokens, 12);
    assert_eq!(result.cost_usd, 0.5);
    assert_eq!(result.passed, Some(true));
}

#[tokio::test]
async fn failing_agent_exit_is_recorded() {
    let agent = AgentCommand::new(
        "sh",
        vec![
            "-c".to_string(),
            "echo 'not logged in' >&2; exit 3".to_string(),
            "sh".to_string(),
        ],
    );
    let (_root, a, b) = branches();
    let cmp = AbRunner::new(Arc::new(agent), AbOptions::default())
        .with_git(Arc::new(FixedGit))
        .compare(&a, &b, &routing_cases(), TestType::Routing)
        .await
        .unwrap();

    let err = cmp.branch_a.results[0].error.as_deref().unwrap();
    assert_eq!(err, "Agent exited with status 3: not logged in");
    assert_eq!(cmp.branch_a.results[0].passed, None);
    assert_eq!(cmp.branch_a.results.len(), 2);
}
