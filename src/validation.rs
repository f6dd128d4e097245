use crate::error::WorktreeError;
use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const FORBIDDEN_BRANCH_SEQUENCES: [&str; 10] = [" ", "~", "^", ":", "?", "*", "[", "\\", "..", "@{"];

fn invalid_branch(name: &str, reason: impl Into<String>) -> WorktreeError {
    WorktreeError::InvalidBranchName {
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// Local branch-name rules, checked before asking git. Returns the trimmed
/// name.
pub(crate) fn validate_branch_name(name: &str) -> Result<String, WorktreeError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(invalid_branch(name, "branch name cannot be empty"));
    }

    for sequence in FORBIDDEN_BRANCH_SEQUENCES {
        if name.contains(sequence) {
            let shown = if sequence == " " { "spaces" } else { sequence };
            return Err(invalid_branch(name, format!("branch name cannot contain '{shown}'")));
        }
    }
    if name.chars().any(char::is_control) {
        return Err(invalid_branch(name, "branch name cannot contain control characters"));
    }
    if name.starts_with('-') || name.ends_with('-') {
        return Err(invalid_branch(name, "branch name cannot start or end with '-'"));
    }
    if name.starts_with('.') || name.ends_with('.') {
        return Err(invalid_branch(name, "branch name cannot start or end with '.'"));
    }
    if name.contains("//") {
        return Err(invalid_branch(name, "branch name cannot contain consecutive slashes"));
    }
    if name.ends_with('/') {
        return Err(invalid_branch(name, "branch name cannot end with '/'"));
    }
    if name.ends_with(".lock") {
        return Err(invalid_branch(name, "branch name cannot end with '.lock'"));
    }

    Ok(name.to_string())
}

/// Expand a leading `~` to the home directory.
pub(crate) fn expand_home(path: &str) -> PathBuf {
    let Some(home) = dirs::home_dir() else {
        return PathBuf::from(path);
    };
    if path == "~" {
        return home;
    }
    match path.strip_prefix("~/") {
        Some(rest) => home.join(rest),
        None => PathBuf::from(path),
    }
}

/// Show `path` relative to the home directory when it lives under it.
pub(crate) fn display_path(path: &Path) -> String {
    if let Some(home) = dirs::home_dir()
        && let Ok(rest) = path.strip_prefix(&home)
    {
        if rest.as_os_str().is_empty() {
            return "~".to_string();
        }
        return format!("~/{}", rest.display());
    }
    path.display().to_string()
}

/// Normalise a worktree location and reject paths git cannot use: existing
/// files and non-empty directories.
pub(crate) fn validate_location(raw: &str) -> Result<PathBuf> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(WorktreeError::InvalidLocation {
            path: PathBuf::new(),
            reason: "location cannot be empty".to_string(),
        }
        .into());
    }

    let expanded = expand_home(trimmed);
    let path = if expanded.is_absolute() {
        expanded
    } else {
        env::current_dir()
            .context("failed to read current directory")?
            .join(expanded)
    };

    if path.is_file() {
        return Err(WorktreeError::InvalidLocation {
            path,
            reason: "location is a file, not a directory".to_string(),
        }
        .into());
    }

    if path.is_dir() {
        let mut entries = fs::read_dir(&path).map_err(|err| {
            if err.kind() == std::io::ErrorKind::PermissionDenied {
                WorktreeError::PermissionDenied {
                    path: path.clone(),
                    operation: "read".to_string(),
                }
            } else {
                WorktreeError::InvalidLocation {
                    path: path.clone(),
                    reason: err.to_string(),
                }
            }
        })?;
        if entries.next().is_some() {
            return Err(WorktreeError::InvalidLocation {
                path,
                reason: "directory already exists and is not empty".to_string(),
            }
            .into());
        }
    }

    Ok(path)
}
