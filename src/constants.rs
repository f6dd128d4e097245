use std::time::Duration;

pub(crate) const APP_NAME: &str = "git-worktree-manager";
pub(crate) const CONFIG_FILE_NAME: &str = "config.toml";
pub(crate) const ENV_CONFIG_PATH: &str = "WORKTREE_CONFIG_PATH";
pub(crate) const ENV_WORKTREE_DEFAULT_PATH: &str = "WORKTREE_DEFAULT_PATH";

pub(crate) const DEFAULT_WORKTREE_PATH: &str = "~/worktrees";
pub(crate) const DEFAULT_THEME: &str = "dark";
pub(crate) const VALID_THEMES: [&str; 3] = ["dark", "light", "auto"];
pub(crate) const DEFAULT_CACHE_TIMEOUT_SECS: u64 = 300;
pub(crate) const MAX_CACHE_TIMEOUT_SECS: u64 = 86_400;
pub(crate) const DEFAULT_MAX_CACHED_ITEMS: usize = 100;
pub(crate) const MAX_CACHED_ITEMS_LIMIT: usize = 10_000;

pub(crate) const BRANCHES_TTL: Duration = Duration::from_secs(60);
pub(crate) const COMMIT_INFO_TTL: Duration = Duration::from_secs(3600);
pub(crate) const CURRENT_BRANCH_TTL: Duration = Duration::from_secs(30);
pub(crate) const WORKTREE_LIST_TTL: Duration = Duration::from_secs(30);
pub(crate) const DIFF_SUMMARY_TTL: Duration = Duration::from_secs(300);

pub(crate) const MAX_COMMIT_INFO_ENTRIES: usize = 1000;
pub(crate) const MAX_DIFF_SUMMARY_ENTRIES: usize = 500;

pub(crate) const FALLBACK_BASE_BRANCHES: [&str; 3] = ["main", "master", "develop"];
pub(crate) const DETACHED_HEAD_REVISION: &str = "HEAD";
pub(crate) const SHORT_HASH_LEN: usize = 7;
pub(crate) const DISPLAY_HASH_LEN: usize = 8;

pub(crate) const COMMIT_FIELD_SEPARATOR: char = '\x1f';
pub(crate) const COMMIT_INFO_FORMAT: &str = "--format=%H%x1f%s%x1f%an%x1f%aI%x1f%h";

pub(crate) const DETAILS_MESSAGE_MAX_CHARS: usize = 60;
pub(crate) const TABLE_BRANCH_MAX_CHARS: usize = 28;
pub(crate) const TABLE_PATH_MAX_CHARS: usize = 48;
pub(crate) const TRUNCATE_ELLIPSIS_CHARS: usize = 3;
