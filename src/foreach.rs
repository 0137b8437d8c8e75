//! Running one shell command in every repository.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::config::RepoConfig;
use crate::pool::{Completion, WorkerPool};
use crate::shell_exec::{CommandRunner, ShellConfig};

/// What a command printed and how it exited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutcome {
    /// Stdout with trailing newlines removed.
    pub stdout: String,
    /// Stderr with trailing newlines removed; always empty on exit 0.
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// The command could not be started in this repository.
#[derive(Debug)]
pub struct LaunchError {
    pub repo: String,
    pub command: String,
    pub source: io::Error,
}

impl std::fmt::Display for LaunchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: could not run `{}`: {}",
            self.repo, self.command, self.source
        )
    }
}

impl std::error::Error for LaunchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// One repository's result from a foreach run.
///
/// A command that ran and exited non-zero is an `Ok` outcome; only a failure
/// to launch is an `Err`.
#[derive(Debug)]
pub struct ForeachResult {
    pub name: String,
    pub path: PathBuf,
    pub outcome: Result<CommandOutcome, LaunchError>,
}

impl Serialize for ForeachResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("ForeachResult", 6)?;
        s.serialize_field("name", &self.name)?;
        s.serialize_field("path", &self.path)?;
        match &self.outcome {
            Ok(outcome) => {
                s.serialize_field("stdout", &outcome.stdout)?;
                s.serialize_field("stderr", &outcome.stderr)?;
                s.serialize_field("exit_code", &Some(outcome.exit_code))?;
                s.serialize_field("error", &None::<String>)?;
            }
            Err(e) => {
                s.serialize_field("stdout", "")?;
                s.serialize_field("stderr", "")?;
                s.serialize_field("exit_code", &None::<i32>)?;
                s.serialize_field("error", &Some(e.to_string()))?;
            }
        }
        s.end()
    }
}

/// Runs a shell command in each repository on a bounded pool.
pub struct ForeachRunner {
    pool: WorkerPool,
    runner: Arc<dyn CommandRunner>,
    shell: ShellConfig,
}

impl ForeachRunner {
    pub fn new(jobs: usize, runner: Arc<dyn CommandRunner>) -> Self {
        Self::with_shell(jobs, runner, ShellConfig::get().clone())
    }

    pub fn with_shell(jobs: usize, runner: Arc<dyn CommandRunner>, shell: ShellConfig) -> Self {
        Self {
            pool: WorkerPool::new("foreach", jobs),
            runner,
            shell,
        }
    }

    /// Run `command` in every repository, skipping ignored ones unless
    /// `include_ignored`. Yields one result per repository that was not
    /// skipped.
    pub fn run(
        &self,
        repos: Vec<RepoConfig>,
        command: &str,
        include_ignored: bool,
    ) -> Completion<ForeachResult> {
        let repos: Vec<_> = repos
            .into_iter()
            .filter(|repo| include_ignored || !repo.ignore)
            .collect();
        log::debug!(
            "running `{command}` in {} repositories with {}",
            repos.len(),
            self.shell.name
        );

        let runner = Arc::clone(&self.runner);
        let shell = self.shell.clone();
        let command = command.to_string();
        self.pool.run(repos, move |repo: RepoConfig| {
            let cmd = shell.command(&command, &repo.path).context(&repo.name);
            let outcome = runner
                .run(&cmd)
                .map(|output| {
                    let success = output.success();
                    CommandOutcome {
                        stdout: trim_newlines(output.stdout),
                        stderr: if success {
                            String::new()
                        } else {
                            trim_newlines(output.stderr)
                        },
                        exit_code: output.exit_code,
                    }
                })
                .map_err(|source| LaunchError {
                    repo: repo.name.clone(),
                    command: command.clone(),
                    source,
                });
            ForeachResult {
                name: repo.name,
                path: repo.path,
                outcome,
            }
        })
    }
}

fn trim_newlines(mut text: String) -> String {
    let trimmed = text.trim_end_matches(['\n', '\r']).len();
    text.truncate(trimmed);
    text
}
