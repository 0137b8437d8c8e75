//! Per-repository state records.

use std::fmt;
use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::config::RepoConfig;
use crate::git::{LineStats, UntrackedCounts};
use crate::probe::ProbeError;

/// Position of HEAD relative to its upstream.
///
/// `Unknown` (no upstream, failed fetch, or never computed) is its own state
/// and never reads as up to date.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, strum::IntoStaticStr)]
#[serde(into = "RemoteSummary")]
#[strum(serialize_all = "kebab-case")]
pub enum RemoteState {
    UpToDate,
    Ahead(usize),
    Behind(usize),
    Diverged { ahead: usize, behind: usize },
    #[default]
    Unknown,
}

impl RemoteState {
    pub fn classify(ahead: usize, behind: usize) -> Self {
        match (ahead, behind) {
            (0, 0) => RemoteState::UpToDate,
            (ahead, 0) => RemoteState::Ahead(ahead),
            (0, behind) => RemoteState::Behind(behind),
            (ahead, behind) => RemoteState::Diverged { ahead, behind },
        }
    }

    pub fn ahead(&self) -> Option<usize> {
        match *self {
            RemoteState::UpToDate | RemoteState::Behind(_) => Some(0),
            RemoteState::Ahead(n) | RemoteState::Diverged { ahead: n, .. } => Some(n),
            RemoteState::Unknown => None,
        }
    }

    pub fn behind(&self) -> Option<usize> {
        match *self {
            RemoteState::UpToDate | RemoteState::Ahead(_) => Some(0),
            RemoteState::Behind(n) | RemoteState::Diverged { behind: n, .. } => Some(n),
            RemoteState::Unknown => None,
        }
    }

    /// The upstream has commits HEAD lacks.
    pub fn is_behind(&self) -> bool {
        self.behind().is_some_and(|n| n > 0)
    }

    /// Known and not up to date.
    pub fn is_out_of_sync(&self) -> bool {
        matches!(
            self,
            RemoteState::Ahead(_) | RemoteState::Behind(_) | RemoteState::Diverged { .. }
        )
    }
}

impl fmt::Display for RemoteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteState::UpToDate => write!(f, "Up to date"),
            RemoteState::Ahead(n) => write!(f, "Ahead +{n}"),
            RemoteState::Behind(n) => write!(f, "Behind -{n}"),
            RemoteState::Diverged { ahead, behind } => write!(f, "Diverged +{ahead}-{behind}"),
            RemoteState::Unknown => write!(f, "Unknown"),
        }
    }
}

/// JSON shape of [`RemoteState`]: the state name plus both counts, which
/// are null when unknown.
#[derive(Serialize)]
struct RemoteSummary {
    state: &'static str,
    ahead: Option<usize>,
    behind: Option<usize>,
}

impl From<RemoteState> for RemoteSummary {
    fn from(remote: RemoteState) -> Self {
        Self {
            state: remote.into(),
            ahead: remote.ahead(),
            behind: remote.behind(),
        }
    }
}

/// Everything the probe learns about one repository.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct RepoState {
    /// The working tree has unstaged line changes.
    pub dirty: bool,
    pub unstaged: LineStats,
    pub staged: LineStats,
    pub staged_changes: bool,
    pub untracked: UntrackedCounts,
    #[serde(rename = "seconds_since_last_commit", serialize_with = "as_seconds")]
    pub time_since_last_commit: Duration,
    pub current_branch: Option<String>,
    pub remote_state: RemoteState,
}

impl RepoState {
    pub fn hours_since_last_commit(&self) -> u64 {
        self.time_since_last_commit.as_secs() / 3600
    }
}

fn as_seconds<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_secs())
}

/// One repository's result from a status run.
///
/// Owned by the worker that probes it, then handed whole to the consumer.
#[derive(Debug, Serialize)]
pub struct RepoInfo {
    pub config: RepoConfig,
    pub state: RepoState,
    #[serde(serialize_with = "error_message")]
    pub error: Option<ProbeError>,
}

impl RepoInfo {
    pub fn name(&self) -> &str {
        &self.config.name
    }
}

fn error_message<S: Serializer>(
    error: &Option<ProbeError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match error {
        Some(error) => serializer.serialize_some(&error.to_string()),
        None => serializer.serialize_none(),
    }
}
