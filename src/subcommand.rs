//! External subcommands.
//!
//! `repos foo args...` runs the first `repos-foo` executable on `PATH`,
//! replacing the current process. `repos help foo` opens its man page.

use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::shell_exec::{Cmd, replace_process};

/// Set to `YES` in the environment of external subcommands.
pub const FROM_REPOS_VAR: &str = "FROM_REPOS";

/// Executable name for subcommand `name`.
pub fn executable_name(name: &str) -> String {
    format!("repos-{name}")
}

/// Locate `repos-<name>` on `path` (a `PATH`-style list), or on the process
/// `PATH` when `path` is `None`.
pub fn find(name: &str, path: Option<&str>) -> anyhow::Result<PathBuf> {
    let exe = executable_name(name);
    let found = match path {
        Some(path) => {
            let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
            which::which_in(&exe, Some(path), cwd)
        }
        None => which::which(&exe),
    };
    found.with_context(|| format!("no such subcommand '{name}' ({exe} not found on PATH)"))
}

/// The command that runs subcommand `executable` with `args`, passing the
/// config file along when one was given.
pub fn command(executable: &Path, args: &[String], config: Option<&Path>) -> Cmd {
    let mut cmd = Cmd::new(executable.to_string_lossy())
        .args(args.iter().cloned())
        .env(FROM_REPOS_VAR, "YES");
    if let Some(config) = config {
        cmd = cmd.arg("-F").arg(config.to_string_lossy());
    }
    cmd
}

/// `argv` is the subcommand name followed by its arguments. Only returns on
/// failure (or, off Unix, exits with the subcommand's code).
pub fn dispatch(argv: &[String], config: Option<&Path>) -> anyhow::Result<()> {
    let Some((name, args)) = argv.split_first() else {
        anyhow::bail!("missing subcommand name");
    };

    if name == "help" {
        let Some(topic) = args.first() else {
            anyhow::bail!("usage: repos help <subcommand>");
        };
        find(topic, None)?;
        let man = Cmd::new("man").arg(executable_name(topic));
        return Err(replace_process(&man)).context("failed to run man");
    }

    let executable = find(name, None)?;
    log::debug!("dispatching to {}", executable.display());
    let cmd = command(&executable, args, config);
    Err(replace_process(&cmd)).with_context(|| format!("failed to run {}", executable.display()))
}
