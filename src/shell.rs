//! Interactive shell inside a repository (`repos -r <name>`).

use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::shell_exec::{Cmd, run_foreground};

/// Variables carried into the repository shell. Everything else is dropped
/// so the login shell rebuilds its environment from the profile.
const PRESERVED_ENV: &[&str] = &[
    "DISPLAY",
    "HOME",
    "LANG",
    "LC_ALL",
    "LC_TERMINAL",
    "LC_TERMINAL_VERSION",
    "LOGNAME",
    "MAIL",
    "SHELL",
    "SSH_AUTH_SOCK",
    "SSH_CLIENT",
    "SSH_CONNECTION",
    "SSH_TTY",
    "TERM",
    "TMUX",
    "USER",
];

/// Set in the repository shell to the repository's directory, for prompts.
pub const CONTEXT_VAR: &str = "REPOS_CONTEXT";

/// Build the login shell command for `dir`.
///
/// `lookup` reads the current environment; `$SHELL` picks the shell, and
/// bash is used when it is unset. The shell is resolved to an absolute path
/// here because the cleared environment has no `PATH`.
pub fn shell_command(
    dir: &Path,
    lookup: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Cmd> {
    let shell = lookup("SHELL")
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "bash".to_string());
    let executable = resolve(&shell).with_context(|| format!("shell not found: {shell}"))?;

    let mut cmd = Cmd::new(executable.to_string_lossy())
        .arg("-l")
        .current_dir(dir)
        .env_clear();
    for key in PRESERVED_ENV {
        if let Some(val) = lookup(key) {
            cmd = cmd.env(*key, val);
        }
    }
    Ok(cmd.env(CONTEXT_VAR, dir.to_string_lossy()))
}

fn resolve(shell: &str) -> Option<PathBuf> {
    let path = Path::new(shell);
    if path.is_absolute() {
        return path.exists().then(|| path.to_path_buf());
    }
    which::which(shell).ok()
}

/// Run an interactive login shell in `dir` and return its exit code.
pub fn open_shell(dir: &Path) -> anyhow::Result<i32> {
    let cmd = shell_command(dir, |key| std::env::var(key).ok())?;
    run_foreground(&cmd).with_context(|| format!("failed to start {}", cmd.program()))
}
