//! External agent process execution.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use branch_eval_core::AgentConfig;
use tokio::process::Command;
use tracing::debug;

use crate::error::{AbError, Result};
use crate::sandbox::apply_restricted_env;

/// Captured output of one agent invocation.
#[derive(Debug, Clone)]
pub struct AgentOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code (-1 when killed by a signal).
    pub exit_code: i32,
}

impl AgentOutput {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs one prompt against an agent inside a branch checkout.
#[async_trait]
pub trait AgentExecutor: Send + Sync {
    async fn execute(&self, dir: &Path, prompt: &str, timeout: Duration) -> Result<AgentOutput>;
}

/// The agent CLI, invoked non-interactively.
///
/// argv is `program args.. [permission_flag] prompt`; the prompt is always a
/// single argument and never passes through a shell.
#[derive(Debug, Clone)]
pub struct AgentCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub permission_flag: Option<String>,
}

impl AgentCommand {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            permission_flag: None,
        }
    }

    pub fn with_permission_flag(mut self, flag: impl Into<String>) -> Self {
        self.permission_flag = Some(flag.into());
        self
    }

    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            program: PathBuf::from(&config.program),
            args: config.args.clone(),
            permission_flag: config.permission_flag.clone(),
        }
    }

    fn command(&self, dir: &Path, prompt: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(flag) = &self.permission_flag {
            cmd.arg(flag);
        }
        cmd.arg(prompt)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        apply_restricted_env(&mut cmd);
        cmd
    }
}

#[async_trait]
impl AgentExecutor for AgentCommand {
    async fn execute(&self, dir: &Path, prompt: &str, timeout: Duration) -> Result<AgentOutput> {
        debug!(program = %self.program.display(), dir = %dir.display(), "spawning agent");

        let child = self.command(dir, prompt).spawn().map_err(|e| AbError::Spawn {
            program: self.program.display().to_string(),
            reason: e.to_string(),
        })?;

        // Dropping the wait future on timeout kills the child.
        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| AbError::Timeout(whole_seconds(timeout)))??;

        Ok(AgentOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }
}

/// Timeout in whole seconds, rounded up so sub-second limits never read "0s".
fn whole_seconds(timeout: Duration) -> u64 {
    timeout.as_millis().div_ceil(1000) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::{ENTRYPOINT_VALUE, ENTRYPOINT_VAR, ENV_ALLOWLIST};

    /// `sh -c <script> sh <prompt>`: the prompt arrives as `$1`.
    fn script(body: &str) -> AgentCommand {
        AgentCommand::new(
            "sh",
            vec!["-c".to_string(), body.to_string(), "sh".to_string()],
        )
    }

    #[tokio::test]
    async fn prompt_is_a_single_argument() {
        let dir = tempfile::tempdir().unwrap();
        let agent = script(r#"printf '%s|%s' "$#" "$1""#);
        let out = agent
            .execute(dir.path(), "a b; echo $(id)", Duration::from_secs(10))
            .await
            .unwrap();
        assert!(out.succeeded());
        assert_eq!(out.stdout, "1|a b; echo $(id)");
    }

    #[tokio::test]
    async fn permission_flag_precedes_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let agent = script(r#"printf '%s ' "$@""#).with_permission_flag("--yes");
        let out = agent
            .execute(dir.path(), "hello", Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(out.stdout, "--yes hello ");
    }

    #[tokio::test]
    async fn runs_in_branch_directory() {
        let dir = tempfile::tempdir().unwrap();
        let out = script("pwd")
            .execute(dir.path(), "x", Duration::from_secs(10))
            .await
            .unwrap();
        let expected = std::fs::canonicalize(dir.path()).unwrap();
        assert_eq!(out.stdout.trim(), expected.display().to_string());
    }

    #[tokio::test]
    async fn child_sees_only_allowlisted_variables() {
        let dir = tempfile::tempdir().unwrap();
        let out = script("env")
            .execute(dir.path(), "x", Duration::from_secs(10))
            .await
            .unwrap();

        // Shells export a few bookkeeping variables of their own.
        let shell_own = ["PWD", "OLDPWD", "SHLVL", "_"];
        for line in out.stdout.lines() {
            let key = line.split('=').next().unwrap_or_default();
            assert!(
                ENV_ALLOWLIST.contains(&key) || key == ENTRYPOINT_VAR || shell_own.contains(&key),
                "leaked variable {key}"
            );
        }
        assert!(out
            .stdout
            .contains(&format!("{ENTRYPOINT_VAR}={ENTRYPOINT_VALUE}")));
    }

    #[tokio::test]
    async fn slow_agent_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let err = script("sleep 10")
            .execute(dir.path(), "x", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Timeout after 1s");
    }

    #[tokio::test]
    async fn sub_second_timeout_reports_rounded_up() {
        let dir = tempfile::tempdir().unwrap();
        let err = script("sleep 10")
            .execute(dir.path(), "x", Duration::from_millis(200))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Timeout after 1s");
    }

    #[test]
    fn whole_seconds_rounds_up() {
        assert_eq!(whole_seconds(Duration::from_secs(0)), 0);
        assert_eq!(whole_seconds(Duration::from_millis(1)), 1);
        assert_eq!(whole_seconds(Duration::from_secs(30)), 30);
        assert_eq!(whole_seconds(Duration::from_millis(30_001)), 31);
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let agent = AgentCommand::new("/definitely/not/an/agent", vec![]);
        let err = agent
            .execute(dir.path(), "x", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, AbError::Spawn { .. }));
        assert!(!err.is_fatal());
    }

    #[test]
    fn from_config_keeps_argument_order() {
        let agent = AgentCommand::from_config(&AgentConfig::default());
        assert_eq!(agent.program, PathBuf::from("claude"));
        assert_eq!(agent.args, vec!["-p", "--output-format", "json"]);
        assert_eq!(
            agent.permission_flag.as_deref(),
            Some("--dangerously-skip-permissions")
        );
    }
}
