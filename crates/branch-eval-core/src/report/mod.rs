//! Report artifacts.
//!
//! - `eval_report.json`: the full [`ReportDocument`]
//! - `eval_report.md`: per-evaluator tables and a conclusion
//! - console summary: a curated subset for terminals

pub mod console;
pub mod markdown;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::domain::EvalReport;

pub use console::{render_console_summary, HIGHLIGHT_METRICS};
pub use markdown::{conclusion, render_markdown};

pub const JSON_REPORT_FILE: &str = "eval_report.json";
pub const MARKDOWN_REPORT_FILE: &str = "eval_report.md";

/// Write `eval_report.json` into `dir`, creating it if needed.
pub fn write_json_report(dir: &Path, report: &EvalReport) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("create {:?}", dir))?;
    let path = dir.join(JSON_REPORT_FILE);
    let content = serde_json::to_string_pretty(report).context("serialize eval report")?;
    std::fs::write(&path, content).with_context(|| format!("write {:?}", path))?;
    Ok(path)
}

/// Read a report written by [`write_json_report`].
pub fn read_json_report(path: &Path) -> Result<EvalReport> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("read {:?}", path))?;
    serde_json::from_str(&raw).with_context(|| format!("parse {:?}", path))
}

/// Write `eval_report.md` into `dir`, creating it if needed.
pub fn write_markdown_report(dir: &Path, report: &EvalReport) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("create {:?}", dir))?;
    let path = dir.join(MARKDOWN_REPORT_FILE);
    std::fs::write(&path, render_markdown(report)).with_context(|| format!("write {:?}", path))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BranchSnapshot, EvaluationResult};
    use crate::evaluator::compare_results;

    fn sample() -> EvalReport {
        let a = BranchSnapshot::new("main", "/tmp/a", "aaa", "base");
        let b = BranchSnapshot::new("feature", "/tmp/b", "bbb", "candidate");
        let mut report = EvalReport::new(a.info().clone(), b.info().clone());
        report.results = vec![compare_results(
            &EvaluationResult::metric("tokens", "total", 500_i64),
            &EvaluationResult::metric("tokens", "total", 450_i64),
            true,
        )];
        report
    }

    #[test]
    fn json_report_roundtrips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let report = sample();
        let path = write_json_report(&dir.path().join("out"), &report).unwrap();
        assert!(path.ends_with(JSON_REPORT_FILE));

        let back = read_json_report(&path).unwrap();
        assert_eq!(back.summary(), report.summary());
        assert_eq!(back.results, report.results);

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["summary"]["improvements"], 1);
        assert_eq!(raw["results"][0]["delta"], -50.0);
    }

    #[test]
    fn markdown_report_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_markdown_report(dir.path(), &sample()).unwrap();
        let md = std::fs::read_to_string(path).unwrap();
        assert!(md.contains("| tokens:total |"));
    }

    #[test]
    fn read_missing_report_has_context() {
        let err = read_json_report(Path::new("/nope/eval_report.json")).unwrap_err();
        assert!(format!("{err:#}").contains("/nope/eval_report.json"));
    }
}
