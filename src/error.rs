//! Typed failures for worktree operations.
//!
//! Command code works in `anyhow::Result`; these variants travel inside the
//! anyhow chain so `main` can downcast and print a stable code plus a hint.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub(crate) enum WorktreeError {
    #[error("git is not installed or not available in PATH")]
    GitNotInstalled,

    #[error("'{}' is not a git repository", .0.display())]
    NotGitRepository(PathBuf),

    #[error("`{command}` failed: {stderr}")]
    GitCommand {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("invalid branch name `{name}`: {reason}")]
    InvalidBranchName { name: String, reason: String },

    #[error("a worktree already exists at '{}'", .0.display())]
    WorktreeExists(PathBuf),

    #[error("branch `{branch}` is already checked out at '{}'", .path.display())]
    BranchCheckedOut { branch: String, path: PathBuf },

    #[error("invalid location '{}': {reason}", .path.display())]
    InvalidLocation { path: PathBuf, reason: String },

    #[error("permission denied: cannot {operation} '{}'", .path.display())]
    PermissionDenied { path: PathBuf, operation: String },

    #[error("base branch `{0}` does not exist or cannot be resolved")]
    UnknownBaseBranch(String),

    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("worktree `{0}` was not found")]
    WorktreeNotFound(String),

    #[error("worktree target `{0}` matches multiple worktrees")]
    AmbiguousWorktree(String),

    #[error("{0}")]
    Cancelled(String),
}

impl WorktreeError {
    pub(crate) fn code(&self) -> &'static str {
        match self {
            Self::GitNotInstalled => "GIT_NOT_INSTALLED",
            Self::NotGitRepository(_) => "NOT_GIT_REPOSITORY",
            Self::GitCommand { .. } => "GIT_COMMAND_FAILED",
            Self::InvalidBranchName { .. } => "INVALID_BRANCH_NAME",
            Self::WorktreeExists(_) | Self::BranchCheckedOut { .. } => "WORKTREE_EXISTS",
            Self::InvalidLocation { .. } => "INVALID_LOCATION",
            Self::PermissionDenied { .. } => "PERMISSION_DENIED",
            Self::UnknownBaseBranch(_) => "UNKNOWN_BASE_BRANCH",
            Self::ConfigInvalid(_) => "CONFIG_INVALID",
            Self::WorktreeNotFound(_) => "WORKTREE_NOT_FOUND",
            Self::AmbiguousWorktree(_) => "AMBIGUOUS_WORKTREE",
            Self::Cancelled(_) => "CANCELLED",
        }
    }

    pub(crate) fn guidance(&self) -> Option<&'static str> {
        match self {
            Self::GitNotInstalled => Some("install git and make sure it is on your PATH"),
            Self::NotGitRepository(_) => Some(
                "run this command from inside a git repository (`git init` creates a new one)",
            ),
            Self::InvalidBranchName { .. } => Some(
                "branch names cannot contain spaces or any of ~ ^ : ? * [ \\ and cannot start or end with - or .",
            ),
            Self::WorktreeExists(_) => {
                Some("choose a different location or remove the existing worktree")
            }
            Self::BranchCheckedOut { .. } => {
                Some("pick another branch name or remove the worktree that uses it")
            }
            Self::InvalidLocation { .. } => Some("pass an empty or non-existent directory"),
            Self::PermissionDenied { .. } => {
                Some("check file permissions or run with appropriate privileges")
            }
            Self::UnknownBaseBranch(_) => {
                Some("run `git branch -a` to see branches that can be used as a base")
            }
            Self::ConfigInvalid(_) => {
                Some("run `git-worktree-manager configure --reset` to restore defaults")
            }
            Self::WorktreeNotFound(_) | Self::AmbiguousWorktree(_) => {
                Some("run `git-worktree-manager list` to see worktree indexes")
            }
            Self::GitCommand { .. } | Self::Cancelled(_) => None,
        }
    }
}

/// Find the first `WorktreeError` in an anyhow chain.
pub(crate) fn find_worktree_error(err: &anyhow::Error) -> Option<&WorktreeError> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<WorktreeError>())
}
