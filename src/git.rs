//! Git queries against one repository.
//!
//! Every query runs through a [`CommandRunner`] with the repository as the
//! subprocess working directory; nothing here changes the process's own
//! current directory, so queries for different repositories can run on
//! different threads at once.

use std::path::{Path, PathBuf};

use crate::shell_exec::{Cmd, CommandOutput, CommandRunner};

mod error;
mod parse;

pub use error::GitError;
pub use parse::{
    AheadBehind, LineStats, UntrackedCounts, parse_left_right, parse_numstat, parse_timestamp,
    parse_untracked,
};

/// A repository on disk plus the runner that executes git in it.
///
/// # Examples
///
/// ```no_run
/// use repos::git::Repository;
/// use repos::shell_exec::ProcessRunner;
///
/// let runner = ProcessRunner::new();
/// let repo = Repository::new("/src/project", "project", &runner);
/// let unstaged = repo.diff_stats(false)?;
/// # Ok::<(), repos::git::GitError>(())
/// ```
pub struct Repository<'r> {
    path: PathBuf,
    name: String,
    runner: &'r dyn CommandRunner,
}

impl<'r> Repository<'r> {
    /// `name` tags log lines for commands run in this repository.
    pub fn new(
        path: impl Into<PathBuf>,
        name: impl Into<String>,
        runner: &'r dyn CommandRunner,
    ) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            runner,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Unix timestamp of the most recent commit on HEAD.
    pub fn last_commit_timestamp(&self) -> Result<i64, GitError> {
        let args = ["log", "--pretty=format:%at", "-1"];
        let stdout = self.run(&args)?;
        parse_timestamp(&stdout).map_err(|message| parse_error(&args, message))
    }

    /// Working tree changes against the index, or index changes against HEAD
    /// when `staged`.
    pub fn diff_stats(&self, staged: bool) -> Result<LineStats, GitError> {
        let mut args = vec!["diff", "--no-ext-diff", "--numstat"];
        if staged {
            args.push("--staged");
        }
        let stdout = self.run(&args)?;
        parse_numstat(&stdout).map_err(|message| parse_error(&args, message))
    }

    /// Untracked, non-ignored entries. Untracked directories are collapsed
    /// to one entry each; empty ones are skipped.
    pub fn untracked(&self) -> Result<UntrackedCounts, GitError> {
        let stdout = self.run(&[
            "ls-files",
            "-z",
            "--others",
            "--exclude-standard",
            "--directory",
            "--no-empty-directory",
        ])?;
        Ok(parse_untracked(&stdout))
    }

    /// Short name of the checked-out branch, or `((<short sha>))` when HEAD
    /// is detached.
    pub fn current_branch(&self) -> Result<String, GitError> {
        let symbolic = self.run_unchecked(&["symbolic-ref", "--short", "HEAD"])?;
        if symbolic.success() {
            return Ok(symbolic.stdout.trim().to_string());
        }
        let sha = self.run(&["rev-parse", "--short", "HEAD"])?;
        Ok(format!("(({}))", sha.trim()))
    }

    /// `git fetch`, from `remote` or from the configured default.
    ///
    /// Terminal prompts are disabled, so a remote wanting credentials fails
    /// instead of blocking on input.
    pub fn fetch(&self, remote: Option<&str>) -> Result<(), GitError> {
        let mut args = vec!["fetch"];
        args.extend(remote);
        self.run(&args).map(drop)
    }

    /// Commits HEAD is ahead of and behind its upstream, or `None` when the
    /// current branch has no upstream (or HEAD is detached).
    pub fn upstream_counts(&self) -> Result<Option<AheadBehind>, GitError> {
        let upstream = self.run_unchecked(&[
            "rev-parse",
            "--abbrev-ref",
            "--symbolic-full-name",
            "@{upstream}",
        ])?;
        if !upstream.success() {
            log::debug!("{}: no upstream configured", self.name);
            return Ok(None);
        }

        let args = ["rev-list", "--count", "--left-right", "@{upstream}...HEAD"];
        let stdout = self.run(&args)?;
        parse_left_right(&stdout)
            .map(Some)
            .map_err(|message| parse_error(&args, message))
    }

    /// One-line summaries of commits on any ref in the last `days` days.
    pub fn recent_commits(&self, days: u32) -> Result<String, GitError> {
        let since = format!("--since={days}.days.ago");
        let stdout = self.run(&[
            "log",
            "--all",
            &since,
            "--date=format:%Y-%m-%d %H:%M",
            "--format=%h %ad %an: %s",
        ])?;
        Ok(stdout)
    }

    fn command(&self, args: &[&str]) -> Cmd {
        Cmd::new("git")
            .args(args.iter().copied())
            .current_dir(&self.path)
            .context(&self.name)
            .env("GIT_TERMINAL_PROMPT", "0")
    }

    /// Run git and return stdout, treating a non-zero exit as an error.
    fn run(&self, args: &[&str]) -> Result<String, GitError> {
        let output = self.run_unchecked(args)?;
        if !output.success() {
            return Err(GitError::Failed {
                command: command_line(args),
                exit_code: output.exit_code,
                stderr: output.stderr,
            });
        }
        Ok(output.stdout)
    }

    /// Run git, failing only if it could not be run at all.
    fn run_unchecked(&self, args: &[&str]) -> Result<CommandOutput, GitError> {
        self.runner
            .run(&self.command(args))
            .map_err(|source| GitError::Launch {
                command: command_line(args),
                source,
            })
    }
}

fn command_line(args: &[&str]) -> String {
    format!("git {}", args.join(" "))
}

fn parse_error(args: &[&str], message: String) -> GitError {
    GitError::Parse {
        command: command_line(args),
        message,
    }
}
