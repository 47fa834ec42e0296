//! branch-ab - behavioral A/B runs of an agent against two branches
//!
//! Executes routing and/or quality test suites through the agent CLI in
//! each branch checkout, scores the responses and reports per-branch
//! accuracy, quality, latency, tokens and cost.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use branch_eval_ab::{describe_plan, load_cases, smoke_cases, AbRunner, TestCase, TestType};
use branch_eval_cli::{exit_code, write_json, write_reports};
use branch_eval_core::telemetry::level_for;
use branch_eval_core::{render_console_summary, BranchTarget, EvalConfig, EvalReport, Judge};

/// Per-branch test results, next to the reports.
const RESULTS_FILE: &str = "ab_results.json";

#[derive(Parser)]
#[command(name = "branch-ab")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run behavioral test suites against two branches", long_about = None)]
struct Cli {
    /// Run the routing suite
    #[arg(long)]
    routing: bool,

    /// Run the quality suite (needs GEMINI_API_KEY or GOOGLE_API_KEY)
    #[arg(long)]
    quality: bool,

    /// Only cases tagged "smoke"
    #[arg(long)]
    smoke: bool,

    /// Named branch pair from the config file
    #[arg(long)]
    pair: Option<String>,

    /// List the cases that would run without executing them
    #[arg(long)]
    dry_run: bool,

    /// Per-test timeout in seconds (default: from config)
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Report directory (default: from config)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Skip eval_report.md
    #[arg(long)]
    no_markdown: bool,

    /// Config file (default: $BRANCH_EVAL_CONFIG or ./branch-eval.toml)
    #[arg(short, long, env = "BRANCH_EVAL_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,
}

impl Cli {
    /// Suites to run; neither flag means both.
    fn test_types(&self) -> Vec<TestType> {
        match (self.routing, self.quality) {
            (true, false) => vec![TestType::Routing],
            (false, true) => vec![TestType::Quality],
            _ => vec![TestType::Routing, TestType::Quality],
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    branch_eval_core::init_tracing(cli.json, level_for(cli.verbose));

    let config = EvalConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let pair = config.pair(cli.pair.as_deref())?;
    let branch_a = BranchTarget::from_path(&pair.branch_a);
    let branch_b = BranchTarget::from_path(&pair.branch_b);

    let mut suites = Vec::new();
    for test_type in cli.test_types() {
        let path = match test_type {
            TestType::Routing => &config.suites.routing,
            TestType::Quality => &config.suites.quality,
        };
        if !(cli.routing || cli.quality) && !path.exists() {
            warn!(suite = %test_type, path = %path.display(), "Suite file not found, skipping");
            continue;
        }
        let cases = cmd_load(path, cli.smoke)?;
        if cases.is_empty() {
            warn!(suite = %test_type, path = %path.display(), "Suite has no cases, skipping");
            continue;
        }
        suites.push((test_type, cases));
    }

    if cli.dry_run {
        for (test_type, cases) in &suites {
            print!(
                "{}",
                describe_plan(&pair.name, &branch_a, &branch_b, cases, *test_type)
            );
        }
        return Ok(ExitCode::SUCCESS);
    }

    let mut runner = AbRunner::from_config(&config.agent);
    if let Some(secs) = cli.timeout {
        runner = runner.with_timeout(Duration::from_secs(secs));
    }
    if suites.iter().any(|(t, _)| *t == TestType::Quality) {
        let judge = Judge::from_env(config.judge.clone())
            .context("Quality scoring needs an LLM judge")?;
        runner = runner.with_judge(Arc::new(judge));
    }

    let output_dir = cli.output_dir.clone().unwrap_or(config.output.dir.clone());
    let mut reports = Vec::new();
    for (test_type, cases) in &suites {
        let report = cmd_compare(
            &runner,
            &branch_a,
            &branch_b,
            cases,
            *test_type,
            &output_dir.join(test_type.as_str()),
            !cli.no_markdown,
        )
        .await?;
        reports.push(report);
    }

    Ok(exit_code(&reports))
}

fn cmd_load(path: &Path, smoke: bool) -> Result<Vec<TestCase>> {
    let cases = load_cases(path)?;
    let total = cases.len();
    let cases = if smoke { smoke_cases(cases) } else { cases };
    info!(path = %path.display(), total, selected = cases.len(), "Loaded test suite");
    Ok(cases)
}

async fn cmd_compare(
    runner: &AbRunner,
    branch_a: &BranchTarget,
    branch_b: &BranchTarget,
    cases: &[TestCase],
    test_type: TestType,
    dir: &Path,
    markdown: bool,
) -> Result<EvalReport> {
    println!(
        "Running {} {} case(s): {} vs {}",
        cases.len(),
        test_type,
        branch_a.name,
        branch_b.name
    );

    let comparison = runner
        .compare(branch_a, branch_b, cases, test_type)
        .await
        .with_context(|| format!("{test_type} comparison failed"))?;
    let report = comparison.to_eval_report();

    print!("{}", render_console_summary(&report));
    write_json(&dir.join(RESULTS_FILE), &comparison)?;
    for path in write_reports(dir, &report, markdown)? {
        println!("Report: {}", path.display());
    }
    Ok(report)
}
