//! Git query errors.
//!
//! Distinguishes the three ways a single git query can fail, so callers can
//! report "could not run git" apart from "git refused" and "git said
//! something we could not read".

use std::io;

#[derive(Debug)]
pub enum GitError {
    /// The git process could not be started or did not finish (missing
    /// binary, bad working directory, expired timeout).
    Launch { command: String, source: io::Error },
    /// Git ran and exited non-zero.
    Failed {
        command: String,
        exit_code: i32,
        stderr: String,
    },
    /// Git succeeded but its output was not in the expected shape.
    Parse { command: String, message: String },
}

impl GitError {
    /// The git command line that failed.
    pub fn command(&self) -> &str {
        match self {
            GitError::Launch { command, .. }
            | GitError::Failed { command, .. }
            | GitError::Parse { command, .. } => command,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, GitError::Launch { source, .. } if source.kind() == io::ErrorKind::TimedOut)
    }
}

impl std::fmt::Display for GitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GitError::Launch { command, source } => {
                write!(f, "could not run `{command}`: {source}")
            }
            GitError::Failed {
                command,
                exit_code,
                stderr,
            } => {
                let stderr = stderr.trim();
                if stderr.is_empty() {
                    write!(f, "`{command}` exited with code {exit_code}")
                } else {
                    write!(f, "`{command}` exited with code {exit_code}: {stderr}")
                }
            }
            GitError::Parse { command, message } => {
                write!(f, "unexpected output from `{command}`: {message}")
            }
        }
    }
}

impl std::error::Error for GitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GitError::Launch { source, .. } => Some(source),
            _ => None,
        }
    }
}
