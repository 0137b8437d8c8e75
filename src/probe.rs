//! Status collection for a single repository.
//!
//! A probe runs a fixed sequence of git queries. The first failure stops the
//! sequence; whatever was computed before it is kept and reported alongside
//! the error.

use crate::config::RepoConfig;
use crate::git::{GitError, Repository};
use crate::model::{RemoteState, RepoInfo, RepoState};
use crate::shell_exec::CommandRunner;
use crate::utils::{elapsed_since, get_now};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProbeOptions {
    /// Fetch before computing ahead/behind counts.
    pub fetch: bool,
    /// Query the current branch name.
    pub want_branch: bool,
}

/// The query a probe was running when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ProbeStep {
    #[strum(to_string = "last commit time")]
    LastCommit,
    #[strum(to_string = "unstaged diff")]
    UnstagedDiff,
    #[strum(to_string = "untracked files")]
    Untracked,
    #[strum(to_string = "current branch")]
    CurrentBranch,
    #[strum(to_string = "staged diff")]
    StagedDiff,
    #[strum(to_string = "upstream comparison")]
    Upstream,
}

/// A probe failure, scoped to one repository.
#[derive(Debug)]
pub enum ProbeError {
    /// A status query failed; the steps after it did not run.
    Query {
        repo: String,
        step: ProbeStep,
        source: GitError,
    },
    /// Fetching failed, so the remote state is unknown. Every other field
    /// is valid.
    Fetch { repo: String, source: GitError },
}

impl ProbeError {
    pub fn repo(&self) -> &str {
        match self {
            ProbeError::Query { repo, .. } | ProbeError::Fetch { repo, .. } => repo,
        }
    }

    pub fn git_error(&self) -> &GitError {
        match self {
            ProbeError::Query { source, .. } | ProbeError::Fetch { source, .. } => source,
        }
    }
}

impl std::fmt::Display for ProbeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeError::Query { repo, step, source } => {
                write!(f, "{repo}: reading {step} failed: {source}")
            }
            ProbeError::Fetch { repo, source } => {
                write!(f, "{repo}: fetch failed, remote state unknown: {source}")
            }
        }
    }
}

impl std::error::Error for ProbeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.git_error())
    }
}

/// Collect the state of one repository.
///
/// Never fails outright: the state holds every field computed before the
/// first failing query, and the error (if any) says which query that was.
pub fn probe(
    config: &RepoConfig,
    options: ProbeOptions,
    runner: &dyn CommandRunner,
) -> (RepoState, Option<ProbeError>) {
    let mut state = RepoState::default();
    let error = collect(config, options, runner, &mut state).err();
    if let Some(error) = &error {
        log::debug!("{error}");
    }
    (state, error)
}

impl RepoInfo {
    /// Probe `config` and package the outcome.
    pub fn probe(config: RepoConfig, options: ProbeOptions, runner: &dyn CommandRunner) -> Self {
        let (state, error) = probe(&config, options, runner);
        Self {
            config,
            state,
            error,
        }
    }
}

fn collect(
    config: &RepoConfig,
    options: ProbeOptions,
    runner: &dyn CommandRunner,
    state: &mut RepoState,
) -> Result<(), ProbeError> {
    let repo = Repository::new(&config.path, &config.name, runner);
    let failed = |step: ProbeStep| {
        let repo = config.name.clone();
        move |source| ProbeError::Query { repo, step, source }
    };

    let timestamp = repo
        .last_commit_timestamp()
        .map_err(failed(ProbeStep::LastCommit))?;
    state.time_since_last_commit = elapsed_since(timestamp, get_now());

    state.unstaged = repo
        .diff_stats(false)
        .map_err(failed(ProbeStep::UnstagedDiff))?;
    state.dirty = state.unstaged.has_changes();

    state.untracked = repo.untracked().map_err(failed(ProbeStep::Untracked))?;

    if options.want_branch {
        state.current_branch = Some(
            repo.current_branch()
                .map_err(failed(ProbeStep::CurrentBranch))?,
        );
    }

    state.staged = repo
        .diff_stats(true)
        .map_err(failed(ProbeStep::StagedDiff))?;
    state.staged_changes = state.staged.has_changes();

    if options.fetch {
        repo.fetch(config.remote.as_deref())
            .map_err(|source| ProbeError::Fetch {
                repo: config.name.clone(),
                source,
            })?;
    }

    state.remote_state = match repo.upstream_counts().map_err(failed(ProbeStep::Upstream))? {
        Some(counts) => RemoteState::classify(counts.ahead, counts.behind),
        None => RemoteState::Unknown,
    };
    Ok(())
}
