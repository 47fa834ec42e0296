//! Git identity of a branch checkout.
//!
//! Git metadata is decoration: any failure (not a repo, git missing, slow
//! filesystem) degrades to [`UNKNOWN_COMMIT`] and an empty message.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::domain::{EvalError, Result};

/// Commit hash reported when git metadata is unavailable.
pub const UNKNOWN_COMMIT: &str = "unknown";

/// Default budget for one git invocation.
pub const GIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Source of `(commit_hash, commit_message)` for a directory.
#[async_trait]
pub trait GitMetadataProvider: Send + Sync {
    /// Never fails; falls back to `("unknown", "")`.
    async fn commit_info(&self, dir: &Path) -> (String, String);
}

/// Shells out to the `git` binary.
#[derive(Debug, Clone)]
pub struct GitCli {
    timeout: Duration,
}

impl Default for GitCli {
    fn default() -> Self {
        Self {
            timeout: GIT_TIMEOUT,
        }
    }
}

impl GitCli {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn git(&self, dir: &Path, args: &[&str]) -> Result<String> {
        let child = Command::new("git")
            .args(args)
            .current_dir(dir)
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| EvalError::Provider(format!("git {} timed out", args.join(" "))))?
            .map_err(|e| EvalError::Provider(format!("failed to run git: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EvalError::Provider(format!(
                "git {} failed: {}",
                args.join(" "),
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// HEAD hash and subject line.
    pub async fn head_commit(&self, dir: &Path) -> Result<(String, String)> {
        let out = self.git(dir, &["log", "-1", "--format=%H%n%s"]).await?;
        let mut lines = out.lines();
        let hash = lines.next().unwrap_or_default().trim().to_string();
        if hash.is_empty() {
            return Err(EvalError::Provider("git log returned empty output".to_string()));
        }
        let message = lines.next().unwrap_or_default().trim().to_string();
        Ok((hash, message))
    }
}

#[async_trait]
impl GitMetadataProvider for GitCli {
    async fn commit_info(&self, dir: &Path) -> (String, String) {
        match self.head_commit(dir).await {
            Ok((hash, message)) => {
                debug!(dir = %dir.display(), %hash, "git metadata");
                (hash, message)
            }
            Err(err) => {
                warn!(dir = %dir.display(), error = %err, "git metadata unavailable");
                (UNKNOWN_COMMIT.to_string(), String::new())
            }
        }
    }
}
