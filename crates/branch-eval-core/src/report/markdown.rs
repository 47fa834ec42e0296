//! Markdown rendering of an [`EvalReport`].

use crate::domain::{BranchInfo, EvalReport, EvaluationResult, MetricValue, Verdict};

/// Collapse line breaks so free text cannot end a table row or quote early.
fn single_line(text: &str) -> String {
    text.split(['\r', '\n'])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn short_hash(hash: &str) -> &str {
    hash.get(..7).unwrap_or(hash)
}

fn branch_line(label: &str, info: &BranchInfo) -> String {
    let mut line = format!(
        "- **{label}:** `{}` @ `{}`",
        info.name,
        short_hash(&info.commit_hash)
    );
    if !info.commit_message.is_empty() {
        line.push_str(&format!(" ({})", single_line(&info.commit_message)));
    }
    line.push('\n');
    line
}

/// Signed number without trailing noise: integers print bare.
fn signed(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{:+}", v as i64)
    } else {
        format!("{v:+.2}")
    }
}

fn delta_cell(result: &EvaluationResult) -> String {
    if result.new_in_branch_b {
        return "new".to_string();
    }
    let Some(delta) = result.delta else {
        return "-".to_string();
    };
    let mut cell = signed(delta);
    if let Some(pct) = result.delta_pct {
        cell.push_str(&format!(" ({pct:+.1}%)"));
    }
    if result.is_improvement() {
        cell.push_str(" ✅");
    } else if result.is_regression() {
        cell.push_str(" ⚠️");
    }
    cell
}

fn value_cell(value: &MetricValue) -> String {
    single_line(&value.to_string()).replace('|', "\\|")
}

/// Closing sentence derived from improvements vs. regressions.
pub fn conclusion(report: &EvalReport) -> String {
    let improvements = report.improvement_count();
    let regressions = report.regression_count();
    match report.verdict() {
        Verdict::BranchBImproved => format!(
            "Branch B improved: {improvements} improvement(s) against {regressions} regression(s)."
        ),
        Verdict::BranchABetter => format!(
            "Branch A performs better: {regressions} regression(s) against {improvements} improvement(s)."
        ),
        Verdict::NoSignificantDifference => format!(
            "No significant difference: {improvements} improvement(s), {regressions} regression(s)."
        ),
    }
}

/// Render the full markdown report.
pub fn render_markdown(report: &EvalReport) -> String {
    let summary = report.summary();
    let mut out = String::new();

    out.push_str("# Branch Comparison Report\n\n");
    out.push_str(&branch_line("Branch A", &report.branch_a));
    out.push_str(&branch_line("Branch B", &report.branch_b));
    out.push_str(&format!(
        "- **Generated:** {}\n- **Duration:** {:.2}s\n\n",
        report.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
        report.duration.as_secs_f64()
    ));

    out.push_str("## Summary\n\n");
    out.push_str(&format!(
        "| Total | Passed | Failed | Improvements | Regressions |\n\
         |---|---|---|---|---|\n\
         | {} | {} | {} | {} | {} |\n\n",
        summary.total, summary.passed, summary.failed, summary.improvements, summary.regressions
    ));

    for (evaluator, results) in report.by_evaluator() {
        out.push_str(&format!("## {evaluator}\n\n"));
        out.push_str("| Metric | Branch A | Branch B | Delta | Status |\n");
        out.push_str("|---|---|---|---|---|\n");
        for result in &results {
            out.push_str(&format!(
                "| {} | {} | {} | {} | {} |\n",
                result.name,
                value_cell(&result.baseline),
                value_cell(&result.value),
                delta_cell(result),
                result.status.as_str()
            ));
        }
        let errors: Vec<&EvaluationResult> =
            results.iter().copied().filter(|r| r.error.is_some()).collect();
        if !errors.is_empty() {
            out.push('\n');
            for r in errors {
                out.push_str(&format!(
                    "> `{}`: {}\n",
                    r.name,
                    single_line(r.error.as_deref().unwrap_or_default())
                ));
            }
        }
        out.push('\n');
    }

    out.push_str("## Conclusion\n\n");
    out.push_str(&conclusion(report));
    out.push('\n');
    out
}
