//! Shared plumbing for the `branch-eval` and `branch-ab` binaries.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use branch_eval_core::{write_json_report, write_markdown_report, EvalReport};
use tracing::info;

/// Write the JSON report, and the markdown one unless suppressed.
pub fn write_reports(dir: &Path, report: &EvalReport, markdown: bool) -> Result<Vec<PathBuf>> {
    let mut written = vec![write_json_report(dir, report)?];
    if markdown {
        written.push(write_markdown_report(dir, report)?);
    }
    for path in &written {
        info!(path = %path.display(), "Wrote report");
    }
    Ok(written)
}

/// Write any serializable value as pretty JSON.
pub fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("create {:?}", parent))?;
    }
    let content = serde_json::to_string_pretty(value).context("serialize results")?;
    std::fs::write(path, content).with_context(|| format!("write {:?}", path))
}

/// Whether regressions outnumber improvements in any report.
pub fn any_net_regression<'a>(reports: impl IntoIterator<Item = &'a EvalReport>) -> bool {
    reports.into_iter().any(EvalReport::has_net_regression)
}

/// Exit code 1 on a net regression, 0 otherwise.
pub fn exit_code<'a>(reports: impl IntoIterator<Item = &'a EvalReport>) -> ExitCode {
    if any_net_regression(reports) {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
