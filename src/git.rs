use crate::constants::{COMMIT_FIELD_SEPARATOR, COMMIT_INFO_FORMAT, SHORT_HASH_LEN};
use crate::error::WorktreeError;
use crate::models::{CommitInfo, DiffSummary, WorktreeInfo};
use crate::process::{
    CmdOutput, best_error_line, binary_available, display_command, path_to_str, run_capture,
};
use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local};
use regex::Regex;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

pub(crate) fn git_available() -> bool {
    binary_available("git")
}

/// Run git in `cwd`, turning a missing binary into `GitNotInstalled` and a
/// non-zero exit into `GitCommand`.
pub(crate) fn run_git(cwd: &Path, args: &[&str]) -> Result<CmdOutput> {
    let output = run_git_unchecked(cwd, args)?;
    if !output.status.success() {
        return Err(WorktreeError::GitCommand {
            command: display_command("git", args),
            exit_code: output.status.code(),
            stderr: best_error_line(&output.stderr),
        }
        .into());
    }
    Ok(output)
}

fn run_git_unchecked(cwd: &Path, args: &[&str]) -> Result<CmdOutput> {
    match run_capture("git", args, Some(cwd)) {
        Ok(output) => Ok(output),
        Err(err) => {
            let missing = err
                .chain()
                .filter_map(|cause| cause.downcast_ref::<std::io::Error>())
                .any(|io| io.kind() == ErrorKind::NotFound);
            if missing && cwd.is_dir() {
                Err(WorktreeError::GitNotInstalled.into())
            } else {
                Err(err)
            }
        }
    }
}

fn git_succeeds(cwd: &Path, args: &[&str]) -> bool {
    run_capture("git", args, Some(cwd))
        .map(|output| output.status.success())
        .unwrap_or(false)
}

pub(crate) fn is_git_repository(path: &Path) -> Result<bool> {
    let output = run_git_unchecked(path, &["rev-parse", "--git-dir"])?;
    Ok(output.status.success())
}

pub(crate) fn repo_root(path: &Path) -> Result<PathBuf> {
    if !is_git_repository(path)? {
        return Err(WorktreeError::NotGitRepository(path.to_path_buf()).into());
    }
    let output = run_git(path, &["rev-parse", "--show-toplevel"])
        .context("failed to detect repository root")?;
    let root = output.stdout.trim();
    if root.is_empty() {
        bail!("git did not return a repository root");
    }
    Ok(PathBuf::from(root))
}

pub(crate) fn list_branches(repo_root: &Path) -> Result<Vec<String>> {
    let local = run_git(repo_root, &["branch", "--format=%(refname:short)"])
        .context("failed to list local branches")?;
    let remote = run_git(repo_root, &["branch", "-r", "--format=%(refname:short)"])
        .context("failed to list remote branches")?;
    Ok(parse_branch_list(&local.stdout, &remote.stdout))
}

/// Merge local and remote branch listings, dropping `<remote>/HEAD`
/// pointers and duplicates.
pub(crate) fn parse_branch_list(local: &str, remote: &str) -> Vec<String> {
    let mut branches: Vec<String> = local
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .chain(
            remote
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.ends_with("/HEAD") && line.contains('/')),
        )
        .map(str::to_string)
        .collect();
    branches.sort();
    branches.dedup();
    branches
}

pub(crate) fn current_branch(repo_root: &Path) -> Result<String> {
    let output = run_git(repo_root, &["branch", "--show-current"])
        .context("failed to read current branch")?;
    let branch = output.stdout.trim();
    if !branch.is_empty() {
        return Ok(branch.to_string());
    }

    let output = run_git(repo_root, &["rev-parse", "--short", "HEAD"])
        .context("failed to resolve detached HEAD")?;
    Ok(detached_label(output.stdout.trim()))
}

pub(crate) fn detached_label(hash: &str) -> String {
    let short: String = hash.chars().take(SHORT_HASH_LEN).collect();
    format!("HEAD ({short})")
}

pub(crate) fn is_detached_label(branch: &str) -> bool {
    branch.starts_with("HEAD (")
}

pub(crate) fn list_worktrees(repo_root: &Path) -> Result<Vec<WorktreeInfo>> {
    let output = run_git(repo_root, &["worktree", "list", "--porcelain"])
        .context("failed to list git worktrees")?;
    Ok(parse_worktree_porcelain(&output.stdout))
}

#[derive(Debug, Default)]
struct PorcelainEntry {
    path: Option<PathBuf>,
    head: Option<String>,
    branch: Option<String>,
    bare: bool,
    detached: bool,
}

impl PorcelainEntry {
    fn into_worktree(self) -> Option<WorktreeInfo> {
        let path = self.path?;
        let commit_hash = self.head.unwrap_or_default();
        let branch = if self.detached {
            detached_label(&commit_hash)
        } else {
            self.branch.unwrap_or_else(|| "unknown".to_string())
        };
        Some(WorktreeInfo {
            path,
            branch,
            commit_hash,
            commit_message: String::new(),
            base_branch: None,
            is_bare: self.bare,
            is_detached: self.detached,
            has_uncommitted_changes: false,
        })
    }
}

pub(crate) fn parse_worktree_porcelain(raw: &str) -> Vec<WorktreeInfo> {
    let mut entries = Vec::new();
    let mut current = PorcelainEntry::default();

    let flush = |entries: &mut Vec<WorktreeInfo>, current: &mut PorcelainEntry| {
        if let Some(info) = std::mem::take(current).into_worktree() {
            entries.push(info);
        }
    };

    for line in raw.lines() {
        if line.trim().is_empty() {
            flush(&mut entries, &mut current);
            continue;
        }

        if let Some(value) = line.strip_prefix("worktree ") {
            flush(&mut entries, &mut current);
            current.path = Some(PathBuf::from(value.trim()));
        } else if let Some(value) = line.strip_prefix("HEAD ") {
            current.head = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("branch ") {
            let value = value.trim();
            let short = value.strip_prefix("refs/heads/").unwrap_or(value);
            current.branch = Some(short.to_string());
        } else if line.starts_with("bare") {
            current.bare = true;
        } else if line.starts_with("detached") {
            current.detached = true;
        }
    }

    flush(&mut entries, &mut current);
    entries
}

pub(crate) fn commit_message(repo_root: &Path, revision: &str) -> String {
    if revision.is_empty() {
        return String::new();
    }
    run_capture(
        "git",
        &["log", "--format=%s", "-n", "1", revision],
        Some(repo_root),
    )
    .ok()
    .filter(|output| output.status.success())
    .map(|output| output.stdout.trim().to_string())
    .unwrap_or_default()
}

pub(crate) fn has_uncommitted_changes(worktree_path: &Path) -> bool {
    run_capture("git", &["status", "--porcelain"], Some(worktree_path))
        .ok()
        .filter(|output| output.status.success())
        .is_some_and(|output| !output.stdout.trim().is_empty())
}

pub(crate) fn commit_info(repo_root: &Path, revision: &str) -> Result<CommitInfo> {
    let output = run_git(repo_root, &["log", COMMIT_INFO_FORMAT, "-n", "1", revision])
        .with_context(|| format!("failed to get commit info for `{revision}`"))?;
    let line = output.stdout.trim();
    if line.is_empty() {
        bail!("no commit found for `{revision}`");
    }
    parse_commit_info(line)
}

pub(crate) fn parse_commit_info(line: &str) -> Result<CommitInfo> {
    let parts: Vec<&str> = line.split(COMMIT_FIELD_SEPARATOR).collect();
    let [hash, message, author, date, short_hash] = parts.as_slice() else {
        bail!("invalid commit info format: {line:?}");
    };

    let date = DateTime::parse_from_rfc3339(date.trim())
        .unwrap_or_else(|_| Local::now().fixed_offset());

    Ok(CommitInfo {
        hash: hash.trim().to_string(),
        message: message.to_string(),
        author: author.to_string(),
        date,
        short_hash: short_hash.trim().to_string(),
    })
}

pub(crate) fn branch_exists(repo_root: &Path, branch: &str) -> bool {
    git_succeeds(
        repo_root,
        &[
            "show-ref",
            "--verify",
            "--quiet",
            &format!("refs/heads/{branch}"),
        ],
    )
}

pub(crate) fn revision_exists(repo_root: &Path, revision: &str) -> bool {
    git_succeeds(
        repo_root,
        &[
            "rev-parse",
            "--verify",
            "--quiet",
            &format!("{revision}^{{commit}}"),
        ],
    )
}

pub(crate) fn branch_name_valid(repo_root: &Path, branch: &str) -> bool {
    git_succeeds(repo_root, &["check-ref-format", "--branch", branch])
}

/// `git worktree add`, checking out `branch` when it exists and creating it
/// from `base` otherwise. Returns whether a new branch was created.
pub(crate) fn add_worktree(
    repo_root: &Path,
    path: &Path,
    branch: &str,
    base: &str,
) -> Result<bool> {
    let path_str = path_to_str(path)?;
    if branch_exists(repo_root, branch) {
        run_git(repo_root, &["worktree", "add", path_str, branch])?;
        Ok(false)
    } else {
        run_git(repo_root, &["worktree", "add", "-b", branch, path_str, base])?;
        Ok(true)
    }
}

pub(crate) fn remove_worktree(repo_root: &Path, path: &Path, force: bool) -> Result<()> {
    let path_str = path_to_str(path)?;
    let mut args = vec!["worktree", "remove"];
    if force {
        args.push("--force");
    }
    args.push(path_str);
    run_git(repo_root, &args)?;
    Ok(())
}

pub(crate) fn prune_worktrees(repo_root: &Path) -> Result<()> {
    run_git(repo_root, &["worktree", "prune"])?;
    Ok(())
}

pub(crate) fn delete_branch(repo_root: &Path, branch: &str) -> Result<()> {
    run_git(repo_root, &["branch", "-D", branch])?;
    Ok(())
}

pub(crate) fn diff_summary(repo_root: &Path, from: &str, to: &str) -> Result<DiffSummary> {
    let range = format!("{from}...{to}");
    let output = run_git(repo_root, &["diff", "--stat", &range])
        .with_context(|| format!("failed to get diff summary between `{from}` and `{to}`"))?;
    Ok(parse_diff_stat(&output.stdout))
}

static INSERTIONS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+) insertions?").expect("valid insertions regex"));
static DELETIONS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+) deletions?").expect("valid deletions regex"));
static FILES_CHANGED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+) files? changed").expect("valid files regex"));

fn capture_count(re: &Regex, line: &str) -> usize {
    re.captures(line)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

/// Parse `git diff --stat` output into counts.
///
/// Every line but the last is a per-file line (`path | N +++--`); the last
/// line is the `X files changed, Y insertions(+), Z deletions(-)` footer.
pub(crate) fn parse_diff_stat(raw: &str) -> DiffSummary {
    let lines: Vec<&str> = raw.trim().lines().collect();
    let Some((footer, file_lines)) = lines.split_last() else {
        return DiffSummary {
            summary_text: "No changes".to_string(),
            ..DiffSummary::default()
        };
    };

    let mut summary = DiffSummary::default();
    for line in file_lines.iter().filter(|line| line.contains(" | ")) {
        if line.contains("(new file)") || line.contains("new file") {
            summary.files_added += 1;
        } else if line.contains("deleted") {
            summary.files_deleted += 1;
        } else {
            summary.files_modified += 1;
        }
    }

    let footer = footer.trim();
    summary.total_insertions = capture_count(&INSERTIONS_RE, footer);
    summary.total_deletions = capture_count(&DELETIONS_RE, footer);
    if summary.total_files() == 0 {
        summary.files_modified = capture_count(&FILES_CHANGED_RE, footer);
    }

    let mut parts = Vec::new();
    if summary.total_insertions > 0 {
        parts.push(format!("+{}", summary.total_insertions));
    }
    if summary.total_deletions > 0 {
        parts.push(format!("-{}", summary.total_deletions));
    }
    summary.summary_text = if !parts.is_empty() {
        parts.join(", ")
    } else if summary.total_files() > 0 {
        // Binary-only diffs change files without line totals.
        let files = summary.total_files();
        format!("{files} file{} changed", if files == 1 { "" } else { "s" })
    } else {
        "No changes".to_string()
    };
    summary
}

/// True for git errors that mean a revision does not exist.
pub(crate) fn is_unknown_revision(err: &anyhow::Error) -> bool {
    let text = format!("{err:#}").to_ascii_lowercase();
    text.contains("unknown revision") || text.contains("bad revision")
}
