//! Terminal summary of the highest-signal metrics.

use crate::domain::EvalReport;

use super::markdown::conclusion;

/// Metrics shown in the console summary, in display order. Missing ones are
/// skipped.
pub const HIGHLIGHT_METRICS: &[&str] = &[
    "tokens:total",
    "tokens:always_loaded",
    "structure:frontmatter_coverage",
    "structure:reference_integrity",
    "priming:emphatic_directives",
    "routing:accuracy",
    "behavioral:accuracy",
    "behavioral:avg_quality_score",
    "behavioral:avg_latency_ms",
    "behavioral:total_cost_usd",
];

/// Plain-text summary for stdout.
pub fn render_console_summary(report: &EvalReport) -> String {
    let summary = report.summary();
    let mut out = String::new();
    out.push_str(&format!(
        "{} ({}) vs {} ({})\n",
        report.branch_a.name,
        report.branch_a.commit_hash.get(..7).unwrap_or(&report.branch_a.commit_hash),
        report.branch_b.name,
        report.branch_b.commit_hash.get(..7).unwrap_or(&report.branch_b.commit_hash),
    ));

    for name in HIGHLIGHT_METRICS {
        let Some(result) = report.find(name) else {
            continue;
        };
        let change = match (result.delta, result.improved) {
            (Some(delta), Some(true)) => format!("{delta:+.2} better"),
            (Some(delta), Some(false)) if delta != 0.0 => format!("{delta:+.2} worse"),
            (Some(_), _) => "unchanged".to_string(),
            (None, _) if result.new_in_branch_b => "new".to_string(),
            (None, _) => String::new(),
        };
        out.push_str(&format!(
            "  {:<34} {:>12} -> {:<12} {}\n",
            name,
            result.baseline.to_string(),
            result.value.to_string(),
            change
        ));
    }

    let errors: Vec<_> = report.results.iter().filter(|r| r.error.is_some()).collect();
    for r in &errors {
        out.push_str(&format!(
            "  ! {}: {}\n",
            r.name,
            r.error.as_deref().unwrap_or_default()
        ));
    }

    out.push_str(&format!(
        "{} metrics, {} improvements, {} regressions, {:.2}s\n",
        summary.total,
        summary.improvements,
        summary.regressions,
        report.duration.as_secs_f64()
    ));
    out.push_str(&conclusion(report));
    out.push('\n');
    out
}
