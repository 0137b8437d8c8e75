//! Parsers for the plumbing output the status probe consumes.
//!
//! All functions here are pure: they take the captured stdout of one git
//! command and return counts, so every parsing rule is testable without a
//! repository.

use serde::Serialize;

/// File/line totals from `git diff --numstat`.
#[derive(Serialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LineStats {
    pub files: usize,
    pub insertions: usize,
    pub deletions: usize,
}

impl LineStats {
    /// Any inserted or deleted line. A mode-only change (`0\t0\tpath`)
    /// lists a file without counting as a change.
    pub fn has_changes(&self) -> bool {
        self.insertions > 0 || self.deletions > 0
    }
}

/// Untracked entries from `git ls-files --others --directory`.
#[derive(Serialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UntrackedCounts {
    pub files: usize,
    pub dirs: usize,
}

impl UntrackedCounts {
    pub fn is_empty(&self) -> bool {
        self.files == 0 && self.dirs == 0
    }
}

/// Commit counts of HEAD relative to its upstream.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AheadBehind {
    pub ahead: usize,
    pub behind: usize,
}

/// Sum `git diff --numstat` output.
///
/// Each line is `insertions\tdeletions\tpath`. Binary files report `-` in
/// place of both counts; each `-` contributes a nominal 1 so a binary change
/// still registers as a change.
pub fn parse_numstat(output: &str) -> Result<LineStats, String> {
    let mut stats = LineStats::default();
    for line in output.lines().filter(|l| !l.is_empty()) {
        let mut fields = line.splitn(3, '\t');
        let (Some(insertions), Some(deletions), Some(_path)) =
            (fields.next(), fields.next(), fields.next())
        else {
            return Err(format!("expected 3 tab-separated fields: {line:?}"));
        };
        stats.insertions += parse_count(insertions, line)?;
        stats.deletions += parse_count(deletions, line)?;
        stats.files += 1;
    }
    Ok(stats)
}

fn parse_count(field: &str, line: &str) -> Result<usize, String> {
    if field == "-" {
        return Ok(1);
    }
    field
        .parse()
        .map_err(|e| format!("invalid count {field:?} in {line:?}: {e}"))
}

/// Classify NUL-separated `git ls-files -z --others --directory` entries.
///
/// Collapsed directories carry a trailing separator. Entries are taken
/// verbatim, so names containing newlines or only spaces are single files.
pub fn parse_untracked(output: &str) -> UntrackedCounts {
    let mut counts = UntrackedCounts::default();
    for entry in output.split('\0').filter(|e| !e.is_empty()) {
        if entry.ends_with('/') || entry.ends_with(std::path::MAIN_SEPARATOR) {
            counts.dirs += 1;
        } else {
            counts.files += 1;
        }
    }
    counts
}

/// Parse `git rev-list --count --left-right @{upstream}...HEAD`.
///
/// The left side is the upstream, so the output reads `behind\tahead`.
pub fn parse_left_right(output: &str) -> Result<AheadBehind, String> {
    let mut counts = output.split_whitespace().map(str::parse::<usize>);
    match (counts.next(), counts.next(), counts.next()) {
        (Some(Ok(behind)), Some(Ok(ahead)), None) => Ok(AheadBehind { ahead, behind }),
        _ => Err(format!("expected \"<behind>\\t<ahead>\", got {output:?}")),
    }
}

/// Parse the `%at` committer timestamp printed by `git log -1`.
pub fn parse_timestamp(output: &str) -> Result<i64, String> {
    let trimmed = output.trim();
    trimmed
        .parse()
        .map_err(|e| format!("invalid commit timestamp {trimmed:?}: {e}"))
}
