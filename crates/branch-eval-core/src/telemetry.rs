//! Logging for `branch-eval` and `branch-ab`.
//!
//! Both binaries print their console summary and report paths on stdout,
//! so every log line goes to stderr and `branch-eval > summary.txt` captures
//! only the comparison. `--verbose` raises our own crates to debug while
//! HTTP and runtime dependencies stay at warn; `--json` is for CI jobs that
//! ship stderr to a log collector. An explicit `RUST_LOG` replaces both.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Log targets owned by this workspace (libraries and binaries).
const OWN_TARGETS: &[&str] = &[
    "branch_eval_core",
    "branch_eval_ab",
    "branch_eval_cli",
    "branch_eval",
    "branch_ab",
];

/// Level selected by a binary's `--verbose` flag.
pub fn level_for(verbose: bool) -> Level {
    if verbose {
        Level::DEBUG
    } else {
        Level::INFO
    }
}

/// Filter used when `RUST_LOG` is unset: `level` for our targets, warn for
/// everything else (reqwest, hyper, rustls).
fn default_directives(level: Level) -> String {
    let level = level.as_str().to_ascii_lowercase();
    std::iter::once("warn".to_string())
        .chain(OWN_TARGETS.iter().map(|target| format!("{target}={level}")))
        .collect::<Vec<_>>()
        .join(",")
}

/// Install the global subscriber on stderr. Only the first call in a
/// process takes effect, which keeps tests that share a binary quiet.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    let layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(layer.json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(layer)
            .try_init()
            .ok();
    }
}
