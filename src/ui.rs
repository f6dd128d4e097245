//! Terminal output: progress lines, panels, tables and interactive prompts.

use crate::constants::{
    DETAILS_MESSAGE_MAX_CHARS, DISPLAY_HASH_LEN, TABLE_BRANCH_MAX_CHARS, TABLE_PATH_MAX_CHARS,
    TRUNCATE_ELLIPSIS_CHARS,
};
use crate::error::WorktreeError;
use crate::models::{CommitInfo, DiffSummary, WorktreeInfo};
use crate::validation::{display_path, validate_branch_name};
use anyhow::{Context, Result};
use colored::{Color, ColoredString, Colorize};
use std::io::{BufRead, IsTerminal, Write};
use std::sync::atomic::{AtomicBool, Ordering};

static PROGRESS_ENABLED: AtomicBool = AtomicBool::new(true);

pub(crate) fn set_progress_enabled(enabled: bool) {
    PROGRESS_ENABLED.store(enabled, Ordering::Relaxed);
}

pub(crate) fn progress(message: &str) {
    if PROGRESS_ENABLED.load(Ordering::Relaxed) {
        eprintln!("==> {message}");
    }
}

pub(crate) fn warn(message: &str) {
    eprintln!("{} {message}", "warning:".yellow().bold());
}

pub(crate) fn is_interactive() -> bool {
    std::io::stdin().is_terminal() && std::io::stdout().is_terminal()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Theme {
    pub(crate) accent: Color,
    pub(crate) branch: Color,
    pub(crate) path: Color,
    pub(crate) commit: Color,
}

impl Theme {
    pub(crate) fn from_name(name: &str) -> Self {
        match name {
            "light" => Self {
                accent: Color::Blue,
                branch: Color::Blue,
                path: Color::Black,
                commit: Color::Magenta,
            },
            _ => Self {
                accent: Color::Cyan,
                branch: Color::BrightBlue,
                path: Color::Cyan,
                commit: Color::Magenta,
            },
        }
    }

    /// Apply the theme and decide whether colours are emitted at all.
    pub(crate) fn install(name: &str) -> Self {
        if std::env::var_os("NO_COLOR").is_some() || !std::io::stdout().is_terminal() {
            colored::control::set_override(false);
        }
        Self::from_name(name)
    }

    fn branch(&self, value: &str) -> ColoredString {
        value.color(self.branch).bold()
    }

    fn path(&self, value: &str) -> ColoredString {
        value.color(self.path).dimmed()
    }

    fn commit(&self, value: &str) -> ColoredString {
        value.color(self.commit)
    }
}

pub(crate) fn truncate(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        return value.to_string();
    }
    let head = value
        .chars()
        .take(max.saturating_sub(TRUNCATE_ELLIPSIS_CHARS))
        .collect::<String>();
    format!("{head}...")
}

fn pad(value: &str, width: usize) -> String {
    let len = value.chars().count();
    if len >= width {
        value.to_string()
    } else {
        format!("{value}{}", " ".repeat(width - len))
    }
}

pub(crate) fn panel(theme: &Theme, title: &str, lines: &[String]) {
    println!("{}", format!("── {title} ──").color(theme.accent).bold());
    for line in lines {
        println!("  {line}");
    }
}

fn status_label(worktree: &WorktreeInfo) -> ColoredString {
    if worktree.has_uncommitted_changes {
        "modified".yellow()
    } else {
        "clean".dimmed()
    }
}

fn short_hash(hash: &str) -> String {
    if hash.is_empty() {
        "unknown".to_string()
    } else {
        hash.chars().take(DISPLAY_HASH_LEN).collect()
    }
}

pub(crate) fn worktree_table(theme: &Theme, worktrees: &[WorktreeInfo]) {
    println!(
        "{}",
        format!("Git Worktrees ({} found)", worktrees.len())
            .color(theme.accent)
            .bold()
    );
    let branch_width = worktrees
        .iter()
        .map(|w| branch_display(w).chars().count())
        .max()
        .unwrap_or(0)
        .clamp("BRANCH".len(), TABLE_BRANCH_MAX_CHARS);
    let path_width = worktrees
        .iter()
        .map(|w| display_path(&w.path).chars().count())
        .max()
        .unwrap_or(0)
        .clamp("PATH".len(), TABLE_PATH_MAX_CHARS);

    println!(
        "{:<4} {} {} {:<8} STATUS",
        "#",
        pad("BRANCH", branch_width),
        pad("PATH", path_width),
        "COMMIT"
    );
    for (offset, worktree) in worktrees.iter().enumerate() {
        let branch = pad(&truncate(&branch_display(worktree), branch_width), branch_width);
        let path = pad(&truncate(&display_path(&worktree.path), path_width), path_width);
        println!(
            "{:<4} {} {} {} {}",
            offset + 1,
            theme.branch(&branch),
            theme.path(&path),
            theme.commit(&pad(&short_hash(&worktree.commit_hash), 8)),
            status_label(worktree)
        );
    }
}

fn branch_display(worktree: &WorktreeInfo) -> String {
    if worktree.is_bare {
        format!("{} (bare)", worktree.branch)
    } else {
        worktree.branch.clone()
    }
}

pub(crate) fn worktree_summary(theme: &Theme, worktrees: &[WorktreeInfo]) {
    if worktrees.is_empty() {
        return;
    }
    let total = worktrees.len();
    let modified = worktrees
        .iter()
        .filter(|w| w.has_uncommitted_changes)
        .count();
    let bare = worktrees.iter().filter(|w| w.is_bare).count();
    let mut parts = vec![
        format!("Total: {}", total.to_string().color(theme.accent)),
        format!("Clean: {}", (total - modified).to_string().dimmed()),
        format!("Modified: {}", modified.to_string().yellow()),
    ];
    if bare > 0 {
        parts.push(format!("Bare: {}", bare.to_string().dimmed()));
    }
    println!("{}", parts.join(" | "));
}

pub(crate) fn worktree_details(
    theme: &Theme,
    worktree: &WorktreeInfo,
    commit: Option<&CommitInfo>,
) {
    let mut lines = Vec::new();
    let mut branch = theme.branch(&worktree.branch).to_string();
    if worktree.is_bare {
        branch.push_str(&format!(" {}", "(bare repository)".dimmed()));
    }
    lines.push(format!("Branch: {branch}"));
    lines.push(format!(
        "Path: {}",
        theme.path(&display_path(&worktree.path))
    ));
    if !worktree.commit_hash.is_empty() {
        let hash = commit
            .map(|info| info.short_hash.clone())
            .unwrap_or_else(|| short_hash(&worktree.commit_hash));
        let mut line = theme.commit(&hash).to_string();
        if !worktree.commit_message.is_empty() {
            line.push_str(&format!(
                " - {}",
                truncate(&worktree.commit_message, DETAILS_MESSAGE_MAX_CHARS)
            ));
        }
        lines.push(format!("Commit: {line}"));
    }
    if let Some(info) = commit {
        lines.push(format!(
            "Author: {} ({})",
            info.author,
            info.date.format("%Y-%m-%d %H:%M %z")
        ));
    }
    if let Some(base) = &worktree.base_branch {
        lines.push(format!("Base Branch: {}", theme.branch(base)));
    }
    let status = if worktree.has_uncommitted_changes {
        "Has uncommitted changes".yellow()
    } else {
        "Working directory clean".dimmed()
    };
    lines.push(format!("Status: {status}"));
    panel(theme, "Worktree Details", &lines);
}

pub(crate) fn diff_summary_panel(theme: &Theme, diff: &DiffSummary, branch: &str, base: &str) {
    let title = format!("Diff Summary ({branch} <- {base})");
    let mut lines = Vec::new();
    if diff.is_empty() {
        lines.push("No changes detected".dimmed().to_string());
    } else {
        let mut files = Vec::new();
        if diff.files_added > 0 {
            files.push(format!("{} added", diff.files_added).green().to_string());
        }
        if diff.files_modified > 0 {
            files.push(format!("{} modified", diff.files_modified).yellow().to_string());
        }
        if diff.files_deleted > 0 {
            files.push(format!("{} deleted", diff.files_deleted).red().to_string());
        }
        lines.push(format!("Files: {}", files.join(", ")));
    }
    if diff.total_insertions > 0 || diff.total_deletions > 0 {
        let mut changes = Vec::new();
        if diff.total_insertions > 0 {
            changes.push(format!("+{}", diff.total_insertions).green().to_string());
        }
        if diff.total_deletions > 0 {
            changes.push(format!("-{}", diff.total_deletions).red().to_string());
        }
        lines.push(format!("Lines: {}", changes.join(", ")));
    }
    panel(theme, &title, &lines);
}

/// One-line form used by `list --diff`: `+A ~M -D` file counts.
pub(crate) fn diff_summary_compact(diff: &DiffSummary) -> String {
    if diff.is_empty() {
        return "no changes".to_string();
    }
    let mut parts = Vec::new();
    if diff.files_added > 0 {
        parts.push(format!("+{}", diff.files_added));
    }
    if diff.files_modified > 0 {
        parts.push(format!("~{}", diff.files_modified));
    }
    if diff.files_deleted > 0 {
        parts.push(format!("-{}", diff.files_deleted));
    }
    parts.join(" ")
}

fn read_line(prompt: &str) -> Result<String> {
    print!("{prompt}");
    std::io::stdout().flush().context("failed to flush stdout")?;
    let mut line = String::new();
    let read = std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read from stdin")?;
    if read == 0 {
        return Err(WorktreeError::Cancelled("input closed; operation cancelled".to_string()).into());
    }
    Ok(line.trim().to_string())
}

pub(crate) fn prompt_branch_name() -> Result<String> {
    loop {
        let input = read_line("Branch name: ")?;
        match validate_branch_name(&input) {
            Ok(name) => return Ok(name),
            Err(err) => warn(&err.to_string()),
        }
    }
}

pub(crate) fn select_base_branch(
    theme: &Theme,
    branches: &[String],
    current: Option<&str>,
) -> Result<String> {
    if branches.is_empty() {
        return Err(WorktreeError::UnknownBaseBranch("<none>".to_string()).into());
    }
    println!("{}", "Available branches".color(theme.accent).bold());
    for (offset, branch) in branches.iter().enumerate() {
        let marker = if Some(branch.as_str()) == current {
            " (current)".green().to_string()
        } else {
            String::new()
        };
        println!("  {:>3}. {}{marker}", offset + 1, theme.branch(branch));
    }

    let default_index = current
        .and_then(|current| branches.iter().position(|b| b == current))
        .map(|index| index + 1);
    let prompt = match default_index {
        Some(index) => format!("Select base branch (1-{}) [{index}]: ", branches.len()),
        None => format!("Select base branch (1-{}): ", branches.len()),
    };
    loop {
        let input = read_line(&prompt)?;
        let choice = if input.is_empty() {
            default_index
        } else {
            input.parse::<usize>().ok()
        };
        match choice {
            Some(index) if (1..=branches.len()).contains(&index) => {
                return Ok(branches[index - 1].clone());
            }
            _ => warn(&format!(
                "please enter a number between 1 and {}",
                branches.len()
            )),
        }
    }
}

pub(crate) fn prompt_location(default: &str) -> Result<String> {
    let input = read_line(&format!("Worktree location [{default}]: "))?;
    if input.is_empty() {
        Ok(default.to_string())
    } else {
        Ok(input)
    }
}

pub(crate) fn confirm(message: &str, default: bool) -> Result<bool> {
    let hint = if default { "[Y/n]" } else { "[y/N]" };
    let input = read_line(&format!("{message} {hint} "))?;
    Ok(match input.to_ascii_lowercase().as_str() {
        "" => default,
        "y" | "yes" => true,
        _ => false,
    })
}
