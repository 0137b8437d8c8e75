//! Rendering of status and foreach results.
//!
//! Table output is built as [`StyledLine`]s and always carries ANSI styles;
//! callers hand in an `anstream` writer that keeps or strips them. Tabular
//! reports print each row as soon as its result arrives. JSON reports wait
//! for the whole run and print one array.

use std::io::Write;

use anyhow::Context;

use crate::foreach::ForeachResult;
use crate::git::LineStats;
use crate::model::{RemoteState, RepoInfo};
use crate::pool::Completion;
use crate::styling::{
    ERROR, ERROR_EMOJI, HINT, NAME, OUT_OF_SYNC, STAGED, SUCCESS, StyledLine, StyledString,
    UNSTAGED, UNTRACKED, WARNING, WARNING_EMOJI,
};

const NAME_WIDTH: usize = 30;
const BRANCH_WIDTH: usize = 21;
const REMOTE_WIDTH: usize = 14;
const STATS_WIDTH: usize = 16;
const UNTRACKED_WIDTH: usize = 10;
const AGE_WIDTH: usize = 10;

/// Which rows and columns a status table shows.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusView {
    pub show_branch: bool,
    /// Show every repository, not only ones needing attention.
    pub all: bool,
    /// Show out-of-sync repositories even when their config says `ignore`.
    pub noignore: bool,
}

/// Whether a repository needs attention.
///
/// Local changes and probe errors always show. Being ahead of or behind the
/// upstream shows unless the repository is ignored.
pub fn should_print(info: &RepoInfo, view: &StatusView) -> bool {
    if view.all {
        return true;
    }
    let state = &info.state;
    if info.error.is_some()
        || state.dirty
        || state.staged_changes
        || !state.untracked.is_empty()
    {
        return true;
    }
    state.remote_state.is_out_of_sync() && (view.noignore || !info.config.ignore)
}

struct Columns {
    name: StyledString,
    branch: StyledString,
    remote: StyledString,
    staged: StyledString,
    unstaged: StyledString,
    untracked: StyledString,
    age: StyledString,
    comment: StyledString,
}

fn layout(columns: Columns, show_branch: bool) -> String {
    let mut line = StyledLine::new();
    cell(&mut line, columns.name, NAME_WIDTH);
    if show_branch {
        line.push_raw(" ");
        cell(&mut line, columns.branch, BRANCH_WIDTH);
        line.push_raw(" ");
    }
    cell(&mut line, columns.remote, REMOTE_WIDTH);
    line.push_raw(" ");
    cell(&mut line, columns.staged, STATS_WIDTH);
    line.push_raw(" ");
    cell(&mut line, columns.unstaged, STATS_WIDTH);
    line.push_raw("  ");
    cell(&mut line, columns.untracked, UNTRACKED_WIDTH);
    line.push_raw("   ");
    cell(&mut line, columns.age, AGE_WIDTH);
    line.push_raw(" ");
    line.push(columns.comment);
    line.render()
}

fn cell(line: &mut StyledLine, content: StyledString, width: usize) {
    let start = line.width();
    line.push(content);
    line.pad_to(start + width);
}

pub fn status_header(view: &StatusView) -> String {
    layout(
        Columns {
            name: StyledString::raw("REPO"),
            branch: StyledString::raw("BRANCH"),
            remote: StyledString::raw("REMOTE STATE"),
            staged: StyledString::raw("STAGED"),
            unstaged: StyledString::raw("UNSTAGED"),
            untracked: StyledString::raw("UNTRACKED"),
            age: StyledString::raw("TSLC"),
            comment: StyledString::raw("COMMENT"),
        },
        view.show_branch,
    )
}

fn format_stats(stats: &LineStats) -> String {
    format!(
        "({:2}f, +{:<3},-{:<3})",
        stats.files, stats.insertions, stats.deletions
    )
}

pub fn status_row(info: &RepoInfo, view: &StatusView) -> String {
    let state = &info.state;
    let remote = match state.remote_state {
        RemoteState::UpToDate => StyledString::raw(""),
        RemoteState::Unknown => StyledString::styled("Unknown", HINT),
        other => StyledString::styled(other.to_string(), OUT_OF_SYNC),
    };
    let staged = if state.staged_changes {
        StyledString::styled(format_stats(&state.staged), STAGED)
    } else {
        StyledString::raw("")
    };
    let unstaged = if state.dirty {
        StyledString::styled(format_stats(&state.unstaged), UNSTAGED)
    } else {
        StyledString::raw("")
    };
    let untracked = if state.untracked.is_empty() {
        StyledString::raw("")
    } else {
        StyledString::styled(
            format!("{}d,{}f", state.untracked.dirs, state.untracked.files),
            UNTRACKED,
        )
    };

    layout(
        Columns {
            name: StyledString::styled(&info.config.name, NAME),
            branch: StyledString::raw(state.current_branch.as_deref().unwrap_or("")),
            remote,
            staged,
            unstaged,
            untracked,
            age: StyledString::raw(format!("{:<4} Hours", state.hours_since_last_commit())),
            comment: StyledString::raw(&info.config.comment),
        },
        view.show_branch,
    )
}

/// Print the status table, one row per result as it arrives. Probe errors go
/// to `err` as they arrive; their rows still print.
///
/// Returns the number of repositories whose probe reported an error.
pub fn stream_status(
    mut completion: Completion<RepoInfo>,
    view: &StatusView,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> anyhow::Result<usize> {
    writeln!(out, "{}", status_header(view))?;
    let mut errors = 0;
    for info in completion.by_ref() {
        if let Some(error) = &info.error {
            errors += 1;
            writeln!(err, "{ERROR_EMOJI} {ERROR}{error}{ERROR:#}")?;
        }
        if should_print(&info, view) {
            writeln!(out, "{}", status_row(&info, view))?;
            out.flush()?;
        }
    }
    check_complete(&completion)?;
    Ok(errors)
}

/// Wait for every result, then print them as one JSON array sorted by name.
pub fn write_status_json(
    completion: Completion<RepoInfo>,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let mut infos = completion.drain()?;
    infos.sort_by(|a, b| a.name().cmp(b.name()));
    serde_json::to_writer_pretty(&mut *out, &infos).context("failed to serialize status")?;
    writeln!(out)?;
    Ok(())
}

/// Print the path of each repository that is behind its upstream, as
/// results arrive.
pub fn stream_behind_paths(
    mut completion: Completion<RepoInfo>,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    for info in completion.by_ref() {
        if let Some(error) = &info.error {
            log::warn!("{error}");
        }
        if info.state.remote_state.is_behind() {
            writeln!(out, "{}", info.config.path.display())?;
        }
    }
    check_complete(&completion)
}

fn check_complete<R>(completion: &Completion<R>) -> anyhow::Result<()> {
    match completion.missing() {
        0 => Ok(()),
        missing => anyhow::bail!(
            "{missing} of {} repositories produced no result",
            completion.expected()
        ),
    }
}

/// How foreach results are printed.
#[derive(Debug, Clone)]
pub enum ForeachView {
    /// `name: command -> code` followed by indented output.
    Pretty { command: String },
    /// `name<sep>stdout`, with stderr passed through to the error stream.
    Csv { separator: String },
}

/// Print foreach results as they arrive.
pub fn stream_foreach(
    mut completion: Completion<ForeachResult>,
    view: &ForeachView,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> anyhow::Result<()> {
    for result in completion.by_ref() {
        match view {
            ForeachView::Pretty { command } => write_pretty(&result, command, out)?,
            ForeachView::Csv { separator } => write_csv(&result, separator, out, err)?,
        }
        out.flush()?;
    }
    check_complete(&completion)
}

fn write_pretty(
    result: &ForeachResult,
    command: &str,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let name = &result.name;
    match &result.outcome {
        Ok(outcome) if outcome.success() => {
            let code = outcome.exit_code;
            writeln!(out, "{NAME}{name}{NAME:#}: {command} -> {SUCCESS}{code}{SUCCESS:#}")?;
            write_indented(out, &outcome.stdout, "    > ")?;
        }
        Ok(outcome) => {
            let code = outcome.exit_code;
            writeln!(out, "{NAME}{name}{NAME:#}: {command} -> {ERROR}{code}{ERROR:#}")?;
            write_indented(out, &outcome.stderr, "    X ")?;
        }
        Err(e) => {
            writeln!(out, "{NAME}{name}{NAME:#}: {command} -> {ERROR}not started{ERROR:#}")?;
            write_indented(out, &e.source.to_string(), "    X ")?;
        }
    }
    Ok(())
}

fn write_indented(out: &mut dyn Write, text: &str, prefix: &str) -> std::io::Result<()> {
    if text.is_empty() {
        return Ok(());
    }
    for line in text.lines() {
        writeln!(out, "{prefix}{line}")?;
    }
    Ok(())
}

fn write_csv(
    result: &ForeachResult,
    separator: &str,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> anyhow::Result<()> {
    let stdout = match &result.outcome {
        Ok(outcome) => {
            if !outcome.stderr.is_empty() {
                writeln!(err, "{}", outcome.stderr)?;
            }
            outcome.stdout.as_str()
        }
        Err(e) => {
            writeln!(err, "{ERROR_EMOJI} {ERROR}{e}{ERROR:#}")?;
            ""
        }
    };
    writeln!(out, "{}{separator}{stdout}", result.name)?;
    Ok(())
}

/// Wait for every foreach result, then print one JSON array sorted by name.
pub fn write_foreach_json(
    completion: Completion<ForeachResult>,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let mut results = completion.drain()?;
    results.sort_by(|a, b| a.name.cmp(&b.name));
    serde_json::to_writer_pretty(&mut *out, &results).context("failed to serialize results")?;
    writeln!(out)?;
    Ok(())
}

/// Warning line for the error stream.
pub fn warning(message: impl std::fmt::Display) -> String {
    format!("{WARNING_EMOJI} {WARNING}{message}{WARNING:#}")
}
