//! Restricted environment for the agent child process.

use tokio::process::Command;

/// Variables copied from the parent environment. Everything else is
/// withheld from the child.
pub const ENV_ALLOWLIST: &[&str] = &[
    "PATH", "HOME", "USER", "LOGNAME", "SHELL", "LANG", "LC_ALL", "LC_CTYPE", "TERM", "TMPDIR",
    "TZ",
];

/// Marker telling the agent who launched it.
pub const ENTRYPOINT_VAR: &str = "CLAUDE_CODE_ENTRYPOINT";
pub const ENTRYPOINT_VALUE: &str = "branch-eval";

/// Filter `vars` down to the allow-list and add the entrypoint marker.
pub fn restricted_env_from<I>(vars: I) -> Vec<(String, String)>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut env: Vec<(String, String)> = vars
        .into_iter()
        .filter(|(key, _)| ENV_ALLOWLIST.contains(&key.as_str()))
        .collect();
    env.sort();
    env.push((ENTRYPOINT_VAR.to_string(), ENTRYPOINT_VALUE.to_string()));
    env
}

/// Restricted view of the current process environment.
pub fn restricted_env() -> Vec<(String, String)> {
    restricted_env_from(std::env::vars_os().filter_map(|(k, v)| {
        Some((k.into_string().ok()?, v.into_string().ok()?))
    }))
}

/// Replace `cmd`'s inherited environment with the restricted one.
pub fn apply_restricted_env(cmd: &mut Command) {
    cmd.env_clear();
    for (key, value) in restricted_env() {
        cmd.env(key, value);
    }
}
