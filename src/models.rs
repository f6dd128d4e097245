use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct WorktreeInfo {
    pub(crate) path: PathBuf,
    pub(crate) branch: String,
    pub(crate) commit_hash: String,
    pub(crate) commit_message: String,
    pub(crate) base_branch: Option<String>,
    pub(crate) is_bare: bool,
    pub(crate) is_detached: bool,
    pub(crate) has_uncommitted_changes: bool,
}

impl WorktreeInfo {
    pub(crate) fn basic(path: PathBuf, branch: &str, base_branch: Option<&str>) -> Self {
        Self {
            path,
            branch: branch.to_string(),
            commit_hash: String::new(),
            commit_message: String::new(),
            base_branch: base_branch.map(str::to_string),
            is_bare: false,
            is_detached: false,
            has_uncommitted_changes: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub(crate) struct DiffSummary {
    pub(crate) files_modified: usize,
    pub(crate) files_added: usize,
    pub(crate) files_deleted: usize,
    pub(crate) total_insertions: usize,
    pub(crate) total_deletions: usize,
    pub(crate) summary_text: String,
}

impl DiffSummary {
    pub(crate) fn total_files(&self) -> usize {
        self.files_modified + self.files_added + self.files_deleted
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.total_files() == 0 && self.total_insertions == 0 && self.total_deletions == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct CommitInfo {
    pub(crate) hash: String,
    pub(crate) message: String,
    pub(crate) author: String,
    pub(crate) date: DateTime<FixedOffset>,
    pub(crate) short_hash: String,
}
