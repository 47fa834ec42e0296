//! Recovering a verdict from free-form judge output.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use super::{JudgeVerdict, PASS_THRESHOLD};

/// Characters of raw output kept in the reasoning of an unparseable reply.
const RAW_PREFIX_CHARS: usize = 200;

#[derive(Debug, Deserialize)]
struct RawVerdict {
    overall_score: f64,
    #[serde(default)]
    criteria_scores: BTreeMap<String, Value>,
    #[serde(default)]
    reasoning: String,
}

impl From<RawVerdict> for JudgeVerdict {
    fn from(raw: RawVerdict) -> Self {
        let score = raw.overall_score.clamp(0.0, 5.0);
        JudgeVerdict {
            score,
            passed: score >= PASS_THRESHOLD,
            criteria_scores: raw
                .criteria_scores
                .into_iter()
                .filter_map(|(k, v)| v.as_f64().map(|s| (k, s)))
                .collect(),
            reasoning: raw.reasoning,
        }
    }
}

/// Remove a surrounding markdown code fence, if any.
fn strip_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. "json") on the opening line.
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Index of the `}` closing the object opened at `open`, honouring strings.
fn matching_brace(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in text[open..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Smallest `{...}` span around an `"overall_score"` key that parses.
fn extract_embedded(text: &str) -> Option<RawVerdict> {
    let key = text.find("\"overall_score\"")?;
    text[..key]
        .char_indices()
        .rev()
        .filter(|(_, c)| *c == '{')
        .find_map(|(open, _)| {
            let close = matching_brace(text, open)?;
            if close < key {
                return None;
            }
            serde_json::from_str(&text[open..=close]).ok()
        })
}

/// Parse judge output into a verdict. Never fails: unparseable output
/// becomes a zero score carrying a prefix of the raw text.
pub fn parse_verdict(raw: &str) -> JudgeVerdict {
    let body = strip_fence(raw);
    if let Ok(verdict) = serde_json::from_str::<RawVerdict>(body) {
        return verdict.into();
    }
    if let Some(verdict) = extract_embedded(raw) {
        warn!("judge reply was not bare JSON, recovered embedded object");
        return verdict.into();
    }

    let prefix: String = raw.chars().take(RAW_PREFIX_CHARS).collect();
    warn!(raw = %prefix, "could not parse judge reply");
    JudgeVerdict::zero(format!("Failed to parse judge response: {prefix}"))
}
