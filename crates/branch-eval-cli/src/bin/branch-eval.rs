//! branch-eval - static comparison of two agent-configuration branches
//!
//! Runs registered evaluators against branch A (baseline) and branch B
//! (candidate), prints a summary and writes `eval_report.json` /
//! `eval_report.md`. Exits 1 when regressions outnumber improvements.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use branch_eval_cli::{exit_code, write_reports};
use branch_eval_core::telemetry::level_for;
use branch_eval_core::{
    render_console_summary, BranchTarget, EvalConfig, EvalRunner, EvaluatorRegistry, Judge,
    RoutingEvaluator, QUICK_EVALUATORS,
};

#[derive(Parser)]
#[command(name = "branch-eval")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Compare two branches of an agent configuration repository", long_about = None)]
struct Cli {
    /// Evaluators to run, comma separated (default: all registered)
    #[arg(short, long, value_delimiter = ',')]
    evaluators: Vec<String>,

    /// Run only the fast evaluators
    #[arg(long, conflicts_with = "evaluators")]
    quick: bool,

    /// Include LLM routing probes (needs GEMINI_API_KEY or GOOGLE_API_KEY)
    #[arg(long)]
    routing: bool,

    /// Baseline branch checkout (default: from the selected pair)
    #[arg(long)]
    branch_a: Option<PathBuf>,

    /// Candidate branch checkout (default: from the selected pair)
    #[arg(long)]
    branch_b: Option<PathBuf>,

    /// Named branch pair from the config file
    #[arg(long)]
    pair: Option<String>,

    /// Report directory (default: from config)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Skip eval_report.md
    #[arg(long)]
    no_markdown: bool,

    /// List registered evaluators and exit
    #[arg(long)]
    list: bool,

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

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    branch_eval_core::init_tracing(cli.json, level_for(cli.verbose));

    let config = EvalConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    let mut registry = EvaluatorRegistry::with_builtins(&config.context);
    if cli.routing {
        let judge = Judge::from_env(config.judge.clone())
            .context("Routing probes need an LLM judge")?;
        registry.register(Arc::new(RoutingEvaluator::new(
            Arc::new(judge),
            config.context.clone(),
            &config.suites.routing,
        )))?;
    }

    if cli.list {
        cmd_list(&registry);
        return Ok(ExitCode::SUCCESS);
    }

    let pair = config.pair(cli.pair.as_deref())?;
    let branch_a = BranchTarget::from_path(cli.branch_a.clone().unwrap_or(pair.branch_a));
    let branch_b = BranchTarget::from_path(cli.branch_b.clone().unwrap_or(pair.branch_b));
    let output_dir = cli.output_dir.clone().unwrap_or(config.output.dir);

    cmd_run(&cli, registry, &branch_a, &branch_b, &output_dir).await
}

fn cmd_list(registry: &EvaluatorRegistry) {
    println!("Registered evaluators:");
    for (name, description) in registry.list_evaluators() {
        println!("  {:<12} {}", name, description);
    }
}

/// Evaluators to run: `None` means all registered.
fn selection(cli: &Cli) -> Option<Vec<String>> {
    if cli.quick {
        let mut names: Vec<String> = QUICK_EVALUATORS.iter().map(|s| s.to_string()).collect();
        if cli.routing {
            names.push("routing".to_string());
        }
        Some(names)
    } else if cli.evaluators.is_empty() {
        None
    } else {
        Some(cli.evaluators.clone())
    }
}

async fn cmd_run(
    cli: &Cli,
    registry: EvaluatorRegistry,
    branch_a: &BranchTarget,
    branch_b: &BranchTarget,
    output_dir: &Path,
) -> Result<ExitCode> {
    let selected = selection(cli);
    info!(
        branch_a = %branch_a.path.display(),
        branch_b = %branch_b.path.display(),
        evaluators = ?selected,
        "Comparing branches"
    );

    let report = EvalRunner::new(registry)
        .run(branch_a, branch_b, selected.as_deref())
        .await
        .context("Evaluation run failed")?;

    print!("{}", render_console_summary(&report));
    let written = write_reports(output_dir, &report, !cli.no_markdown)?;
    for path in written {
        println!("Report: {}", path.display());
    }

    Ok(exit_code([&report]))
}
