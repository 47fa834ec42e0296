//! Built-in evaluators and the file-level helpers they share.
//!
//! - `tokens`: context-size counters (lower is better)
//! - `structure`: agent/command manifest audit (higher is better)
//! - `priming`: emphatic-directive heuristics (lower is better)
//! - `routing`: LLM routing probes (higher is better, needs a judge)

pub mod priming;
pub mod routing;
pub mod structure;
pub mod tokens;

use std::collections::{BTreeMap, HashSet};
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::config::ContextConfig;
use crate::domain::BranchSnapshot;

pub use priming::PrimingEvaluator;
pub use routing::{RoutingEvaluator, RoutingProbe};
pub use structure::StructureEvaluator;
pub use tokens::TokenEvaluator;

/// Characters per estimated token.
pub const CHARS_PER_TOKEN: usize = 4;

/// How deep `@path` imports are followed from the root file.
pub const MAX_IMPORT_DEPTH: usize = 5;

/// Token estimate: `ceil(chars / 4)`.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

// ---------------------------------------------------------------------------
// Frontmatter
// ---------------------------------------------------------------------------

/// Parse a leading `---` fenced block of `key: value` lines.
///
/// Returns `None` when the file has no frontmatter. Values are trimmed and
/// unquoted; nested YAML is not interpreted.
pub fn parse_frontmatter(text: &str) -> Option<BTreeMap<String, String>> {
    let mut lines = text.lines();
    if lines.next()?.trim_end() != "---" {
        return None;
    }

    let mut fields = BTreeMap::new();
    for line in lines {
        if line.trim_end() == "---" {
            return Some(fields);
        }
        if line.starts_with([' ', '\t']) {
            continue;
        }
        if let Some((key, value)) = line.split_once(':') {
            let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
            fields.insert(key.trim().to_string(), value.to_string());
        }
    }
    // Unterminated block.
    None
}

/// Whether frontmatter declares non-empty `name` and `description`.
pub fn has_identity(frontmatter: &BTreeMap<String, String>) -> bool {
    ["name", "description"]
        .iter()
        .all(|k| frontmatter.get(*k).is_some_and(|v| !v.is_empty()))
}

// ---------------------------------------------------------------------------
// Imports
// ---------------------------------------------------------------------------

fn import_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:^|\s)@([A-Za-z0-9_.\-/]+\.[A-Za-z0-9]+)").expect("import pattern is valid")
    })
}

/// `@path` import targets in document order, ignoring fenced code blocks.
pub fn find_imports(text: &str) -> Vec<String> {
    let mut in_fence = false;
    let mut out = Vec::new();
    for line in text.lines() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        out.extend(
            import_regex()
                .captures_iter(line)
                .map(|c| c[1].to_string()),
        );
    }
    out
}

/// Resolve `target` against the directory of `from`, lexically. Returns
/// `None` when the path escapes the branch root.
fn resolve_relative(from: &Path, target: &str) -> Option<PathBuf> {
    let base = from.parent().unwrap_or(Path::new(""));
    let mut out = PathBuf::new();
    for component in base.join(target).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    return None;
                }
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(out)
}

/// Result of following `@path` imports from the root file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportGraph {
    /// Files reached, root first, each once.
    pub loaded: Vec<PathBuf>,
    /// `(importing file, target)` pairs that did not resolve to a file.
    pub unresolved: Vec<(PathBuf, String)>,
    /// Total import references seen (resolved or not).
    pub references: usize,
}

/// Follow imports depth-first from `root` up to [`MAX_IMPORT_DEPTH`].
pub fn follow_imports(snapshot: &BranchSnapshot, root: &Path) -> ImportGraph {
    let mut graph = ImportGraph::default();
    let mut seen = HashSet::new();
    visit(snapshot, root.to_path_buf(), 0, &mut seen, &mut graph);
    graph
}

fn visit(
    snapshot: &BranchSnapshot,
    file: PathBuf,
    depth: usize,
    seen: &mut HashSet<PathBuf>,
    graph: &mut ImportGraph,
) {
    if !seen.insert(file.clone()) {
        return;
    }
    let Some(content) = snapshot.read_file(&file) else {
        return;
    };
    graph.loaded.push(file.clone());
    if depth >= MAX_IMPORT_DEPTH {
        return;
    }

    for target in find_imports(&content) {
        graph.references += 1;
        match resolve_relative(&file, &target) {
            Some(next) if snapshot.read_file(&next).is_some() => {
                visit(snapshot, next, depth + 1, seen, graph)
            }
            _ => graph.unresolved.push((file.clone(), target)),
        }
    }
}

// ---------------------------------------------------------------------------
// Agent catalogue
// ---------------------------------------------------------------------------

/// One routable agent definition.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentEntry {
    pub name: String,
    pub description: String,
    pub path: PathBuf,
}

/// Markdown agent definitions under the agents directory. Name falls back
/// to the file stem when frontmatter does not declare one.
pub fn agent_catalogue(snapshot: &BranchSnapshot, context: &ContextConfig) -> Vec<AgentEntry> {
    snapshot
        .list_files(&context.agents_dir, Some("md"))
        .into_iter()
        .filter_map(|path| {
            let content = snapshot.read_file(&path)?;
            let frontmatter = parse_frontmatter(&content).unwrap_or_default();
            let stem = path.file_stem()?.to_string_lossy().to_string();
            Some(AgentEntry {
                name: frontmatter.get("name").cloned().filter(|n| !n.is_empty()).unwrap_or(stem),
                description: frontmatter.get("description").cloned().unwrap_or_default(),
                path,
            })
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// A temp branch populated with `(relative path, content)` files.
    pub fn branch(files: &[(&str, &str)]) -> (tempfile::TempDir, BranchSnapshot) {
        let dir = tempfile::tempdir().unwrap();
        for (rel, content) in files {
            let path = dir.path().join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }
        let snapshot = BranchSnapshot::new("test", dir.path(), "abc123", "test commit");
        (dir, snapshot)
    }
}
