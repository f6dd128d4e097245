//! Worktree operations: validate inputs, run git, parse the result, keep the
//! caches coherent and undo partial work when creation fails.

use crate::cache::{
    BRANCHES_KEY, CURRENT_BRANCH_KEY, CacheStats, GitCache, WORKTREE_LIST_KEY, cache_key,
};
use crate::config::Config;
use crate::constants::{DETACHED_HEAD_REVISION, FALLBACK_BASE_BRANCHES};
use crate::error::WorktreeError;
use crate::git;
use crate::models::{CommitInfo, DiffSummary, WorktreeInfo};
use crate::retry::{RetryPolicy, is_transient, retry};
use crate::ui;
use crate::validation::{expand_home, validate_branch_name, validate_location};
use anyhow::{Context, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct CreateRequest {
    pub(crate) branch: String,
    pub(crate) base: Option<String>,
    pub(crate) location: Option<String>,
}

/// Everything `create_worktree` decided before touching the repository.
#[derive(Debug)]
struct CreatePlan {
    branch: String,
    base: String,
    path: PathBuf,
}

#[derive(Debug)]
pub(crate) struct WorktreeManager {
    repo_root: PathBuf,
    config: Config,
    cache: GitCache,
}

impl WorktreeManager {
    pub(crate) fn open(path: &Path, config: Config) -> Result<Self> {
        if !git::git_available() {
            return Err(WorktreeError::GitNotInstalled.into());
        }
        let repo_root = git::repo_root(path)?;
        let cache = GitCache::new(config.cache_timeout());
        tracing::debug!(repo = %repo_root.display(), "opened repository");
        Ok(Self {
            repo_root,
            config,
            cache,
        })
    }

    pub(crate) fn branches(&self) -> Result<Vec<String>> {
        self.cache
            .branches
            .get_or_try_insert_with(BRANCHES_KEY, None, || {
                retry(RetryPolicy::for_queries(), "list branches", is_transient, || {
                    git::list_branches(&self.repo_root)
                })
            })
    }

    pub(crate) fn current_branch(&self) -> Result<String> {
        self.cache
            .current_branch
            .get_or_try_insert_with(CURRENT_BRANCH_KEY, None, || {
                git::current_branch(&self.repo_root)
            })
    }

    pub(crate) fn create_worktree(&self, request: &CreateRequest) -> Result<WorktreeInfo> {
        ui::progress("Preparing worktree creation");
        let plan = self.plan_creation(request)?;

        ui::progress(&format!("Creating worktree for `{}`", plan.branch));
        let created_parent = self.ensure_parent_dirs(&plan.path)?;
        let branch_existed = git::branch_exists(&self.repo_root, &plan.branch);

        let add_result = retry(
            RetryPolicy::for_creation(),
            "git worktree add",
            is_transient,
            || git::add_worktree(&self.repo_root, &plan.path, &plan.branch, &plan.base),
        );
        match add_result {
            Ok(new_branch) => {
                tracing::info!(
                    branch = %plan.branch,
                    path = %plan.path.display(),
                    new_branch,
                    "created worktree"
                );
            }
            Err(err) => {
                if self.config.worktree.auto_cleanup {
                    ui::progress("Cleaning up after failed creation");
                    self.rollback(&plan, branch_existed, created_parent.as_deref());
                } else {
                    tracing::warn!(path = %plan.path.display(), "auto_cleanup disabled; leaving partial state");
                }
                return Err(err).with_context(|| {
                    format!("failed to create worktree for `{}`", plan.branch)
                });
            }
        }

        ui::progress("Reading worktree details");
        let info = match self.read_created_info(&plan) {
            Ok(info) => info,
            Err(err) => {
                tracing::warn!("could not read details of new worktree: {err:#}");
                ui::warn("worktree created, but its commit details could not be read");
                WorktreeInfo::basic(plan.path.clone(), &plan.branch, Some(&plan.base))
            }
        };

        self.cache.invalidate_after_mutation(&plan.branch);
        Ok(info)
    }

    fn plan_creation(&self, request: &CreateRequest) -> Result<CreatePlan> {
        let branches = self.branches()?;
        let current = self.current_branch()?;
        let base = self.resolve_base(request.base.as_deref(), &branches, &current)?;

        let branch = validate_branch_name(&request.branch)?;
        if !git::branch_name_valid(&self.repo_root, &branch) {
            return Err(WorktreeError::InvalidBranchName {
                name: branch,
                reason: "rejected by `git check-ref-format`".to_string(),
            }
            .into());
        }

        let raw_location = match &request.location {
            Some(location) => location.clone(),
            None => self
                .config
                .default_worktree_location()
                .join(&branch)
                .to_string_lossy()
                .into_owned(),
        };

        let worktrees = git::list_worktrees(&self.repo_root)?;
        let candidate = absolute_location(&raw_location)?;
        if worktrees.iter().any(|w| paths_equal(&w.path, &candidate)) {
            return Err(WorktreeError::WorktreeExists(candidate).into());
        }
        if let Some(existing) = worktrees.iter().find(|w| !w.is_bare && w.branch == branch) {
            return Err(WorktreeError::BranchCheckedOut {
                branch,
                path: existing.path.clone(),
            }
            .into());
        }
        let path = validate_location(&raw_location)?;

        Ok(CreatePlan { branch, base, path })
    }

    fn resolve_base(
        &self,
        requested: Option<&str>,
        branches: &[String],
        current: &str,
    ) -> Result<String> {
        if let Some(base) = requested.map(str::trim).filter(|base| !base.is_empty()) {
            if branches.iter().any(|b| b == base) || git::revision_exists(&self.repo_root, base) {
                return Ok(base.to_string());
            }
            return Err(WorktreeError::UnknownBaseBranch(base.to_string()).into());
        }
        if git::is_detached_label(current) {
            return Ok(DETACHED_HEAD_REVISION.to_string());
        }
        Ok(current.to_string())
    }

    /// Create missing parents of `path`; returns the top-most directory that
    /// did not exist before.
    fn ensure_parent_dirs(&self, path: &Path) -> Result<Option<PathBuf>> {
        let Some(parent) = path.parent() else {
            return Ok(None);
        };
        let top_missing = parent
            .ancestors()
            .take_while(|ancestor| !ancestor.exists())
            .last()
            .map(Path::to_path_buf);
        if top_missing.is_none() {
            return Ok(None);
        }

        fs::create_dir_all(parent).map_err(|err| -> anyhow::Error {
            if err.kind() == ErrorKind::PermissionDenied {
                WorktreeError::PermissionDenied {
                    path: parent.to_path_buf(),
                    operation: "create".to_string(),
                }
                .into()
            } else {
                anyhow::Error::new(err).context(format!("failed to create {}", parent.display()))
            }
        })?;
        Ok(top_missing)
    }

    fn rollback(&self, plan: &CreatePlan, branch_existed: bool, created_parent: Option<&Path>) {
        let registered = git::list_worktrees(&self.repo_root)
            .map(|worktrees| worktrees.iter().any(|w| paths_equal(&w.path, &plan.path)))
            .unwrap_or(false);
        if registered && let Err(err) = git::remove_worktree(&self.repo_root, &plan.path, true) {
            tracing::warn!("rollback: could not remove worktree registration: {err:#}");
        }
        if let Err(err) = git::prune_worktrees(&self.repo_root) {
            tracing::warn!("rollback: git worktree prune failed: {err:#}");
        }

        if plan.path.exists()
            && let Err(err) = fs::remove_dir_all(&plan.path)
        {
            tracing::warn!(path = %plan.path.display(), "rollback: could not remove directory: {err}");
        }

        if !branch_existed
            && git::branch_exists(&self.repo_root, &plan.branch)
            && let Err(err) = git::delete_branch(&self.repo_root, &plan.branch)
        {
            tracing::warn!(branch = %plan.branch, "rollback: could not delete branch: {err:#}");
        }

        if let Some(dir) = created_parent
            && dir.exists()
            && let Err(err) = fs::remove_dir_all(dir)
        {
            tracing::warn!(path = %dir.display(), "rollback: could not remove created parent: {err}");
        }

        self.cache.invalidate_after_mutation(&plan.branch);
        tracing::info!(branch = %plan.branch, "rolled back failed worktree creation");
    }

    fn read_created_info(&self, plan: &CreatePlan) -> Result<WorktreeInfo> {
        let commit = self.commit_info(&plan.branch)?;
        Ok(WorktreeInfo {
            path: plan.path.clone(),
            branch: plan.branch.clone(),
            commit_hash: commit.hash,
            commit_message: commit.message,
            base_branch: Some(plan.base.clone()),
            is_bare: false,
            is_detached: false,
            has_uncommitted_changes: git::has_uncommitted_changes(&plan.path),
        })
    }

    pub(crate) fn list_worktrees(&self) -> Result<Vec<WorktreeInfo>> {
        self.cache
            .worktrees
            .get_or_try_insert_with(WORKTREE_LIST_KEY, None, || {
                let mut worktrees =
                    retry(RetryPolicy::for_queries(), "list worktrees", is_transient, || {
                        git::list_worktrees(&self.repo_root)
                    })?;
                for worktree in worktrees.iter_mut().filter(|w| !w.is_bare) {
                    worktree.commit_message =
                        git::commit_message(&self.repo_root, &worktree.commit_hash);
                    worktree.has_uncommitted_changes = git::has_uncommitted_changes(&worktree.path);
                }
                Ok(worktrees)
            })
    }

    /// Fresh dirty-state check for one worktree; bypasses the cache.
    pub(crate) fn worktree_status(&self, worktree: &WorktreeInfo) -> WorktreeInfo {
        let mut refreshed = worktree.clone();
        if !worktree.is_bare {
            refreshed.has_uncommitted_changes = git::has_uncommitted_changes(&worktree.path);
        }
        refreshed
    }

    /// Diff `worktree` against `base` or the first base that resolves.
    /// Returns the base actually used alongside the summary.
    pub(crate) fn calculate_diff_summary(
        &self,
        worktree: &WorktreeInfo,
        base: Option<&str>,
    ) -> Result<Option<(String, DiffSummary)>> {
        if worktree.is_bare {
            return Ok(None);
        }
        let Some(base) = self.diff_base(worktree, base)? else {
            return Ok(None);
        };
        let target = if worktree.is_detached {
            worktree.commit_hash.clone()
        } else {
            worktree.branch.clone()
        };

        let key = cache_key("diff", &[&worktree.branch, &base]);
        let result = self.cache.diff_summary.get_or_try_insert_with(&key, None, || {
            git::diff_summary(&self.repo_root, &base, &target)
        });
        self.cache
            .enforce_limits(self.config.performance.max_cached_items);
        match result {
            Ok(summary) => Ok(Some((base, summary))),
            Err(err) if git::is_unknown_revision(&err) => {
                tracing::debug!(branch = %worktree.branch, base, "diff base not resolvable");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    fn diff_base(&self, worktree: &WorktreeInfo, requested: Option<&str>) -> Result<Option<String>> {
        if let Some(base) = requested {
            return Ok(Some(base.to_string()));
        }
        if let Some(base) = &worktree.base_branch {
            return Ok(Some(base.clone()));
        }
        let current = self.current_branch()?;
        if !git::is_detached_label(&current) && current != worktree.branch {
            return Ok(Some(current));
        }
        Ok(FALLBACK_BASE_BRANCHES
            .iter()
            .find(|candidate| {
                **candidate != worktree.branch && git::branch_exists(&self.repo_root, candidate)
            })
            .map(|candidate| candidate.to_string()))
    }

    pub(crate) fn commit_info(&self, revision: &str) -> Result<CommitInfo> {
        let key = cache_key("commit", &[revision]);
        let info = self
            .cache
            .commit_info
            .get_or_try_insert_with(&key, None, || git::commit_info(&self.repo_root, revision));
        self.cache
            .enforce_limits(self.config.performance.max_cached_items);
        info
    }

    /// Remove a worktree chosen by list index, branch or path. The branch
    /// itself is kept.
    pub(crate) fn remove_worktree(&self, target: &str, force: bool) -> Result<WorktreeInfo> {
        let worktrees = git::list_worktrees(&self.repo_root)?;
        let (index, worktree) = resolve_worktree_target(&worktrees, target)?;
        // Porcelain always lists the main worktree first.
        if index == 1 {
            return Err(WorktreeError::InvalidLocation {
                path: worktree.path,
                reason: "the main worktree cannot be removed".to_string(),
            }
            .into());
        }

        // `repo_root` may be the linked worktree being removed; run git from
        // the main worktree instead.
        let main_root = worktrees
            .first()
            .map(|main| main.path.clone())
            .unwrap_or_else(|| self.repo_root.clone());
        ui::progress(&format!("Removing worktree `{}`", worktree.branch));
        git::remove_worktree(&main_root, &worktree.path, force)
            .with_context(|| format!("failed to remove worktree at {}", worktree.path.display()))?;
        self.cache.invalidate_after_mutation(&worktree.branch);
        tracing::info!(branch = %worktree.branch, path = %worktree.path.display(), "removed worktree");
        Ok(worktree)
    }

    pub(crate) fn cache_stats(&self) -> Vec<(&'static str, CacheStats)> {
        self.cache.stats()
    }
}

fn absolute_location(raw: &str) -> Result<PathBuf> {
    std::path::absolute(expand_home(raw.trim()))
        .with_context(|| format!("failed to resolve location `{raw}`"))
}

fn paths_equal(left: &Path, right: &Path) -> bool {
    if left == right {
        return true;
    }
    match (left.canonicalize(), right.canonicalize()) {
        (Ok(left), Ok(right)) => left == right,
        _ => false,
    }
}

pub(crate) fn parse_worktree_index(value: &str) -> Option<usize> {
    let candidate = value.trim().strip_prefix('#').unwrap_or(value.trim());
    let parsed = candidate.parse::<usize>().ok()?;
    if parsed == 0 {
        return None;
    }
    Some(parsed)
}

/// Match `target` against `worktrees` by 1-based index, then branch name,
/// then path.
pub(crate) fn resolve_worktree_target(
    worktrees: &[WorktreeInfo],
    target: &str,
) -> Result<(usize, WorktreeInfo)> {
    if let Some(index) = parse_worktree_index(target)
        && let Some(worktree) = worktrees.get(index - 1)
    {
        return Ok((index, worktree.clone()));
    }

    let mut matches = worktrees
        .iter()
        .enumerate()
        .filter(|(_, w)| w.branch == target)
        .collect::<Vec<_>>();
    if matches.is_empty() {
        let target_path = absolute_location(target)?;
        matches = worktrees
            .iter()
            .enumerate()
            .filter(|(_, w)| paths_equal(&w.path, &target_path))
            .collect();
    }

    match matches.len() {
        1 => {
            let (offset, worktree) = matches.remove(0);
            Ok((offset + 1, worktree.clone()))
        }
        0 => Err(WorktreeError::WorktreeNotFound(target.to_string()).into()),
        _ => {
            eprintln!("worktree target `{target}` is ambiguous; use an index from `list`:");
            for (offset, worktree) in matches {
                eprintln!(
                    "- [{}] {} ({})",
                    offset + 1,
                    worktree.branch,
                    worktree.path.display()
                );
            }
            Err(WorktreeError::AmbiguousWorktree(target.to_string()).into())
        }
    }
}
