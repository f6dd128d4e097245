use crate::cache::{ExpiringCache, GitCache, WORKTREE_LIST_KEY, cache_key};
use crate::cli::{Cli, Commands, parse_configure_args};
use crate::config::{Config, ConfigUpdate};
use crate::constants::ENV_WORKTREE_DEFAULT_PATH;
use crate::error::{WorktreeError, find_worktree_error};
use crate::git::{
    detached_label, is_detached_label, parse_branch_list, parse_commit_info, parse_diff_stat,
    parse_worktree_porcelain,
};
use crate::manager::{CreateRequest, WorktreeManager, parse_worktree_index, resolve_worktree_target};
use crate::models::{DiffSummary, WorktreeInfo};
use crate::process::run_capture;
use crate::retry::{RetryPolicy, is_lock_contention, is_transient, retry};
use crate::ui::{diff_summary_compact, truncate};
use crate::validation::{validate_branch_name, validate_location};
use anyhow::anyhow;
use clap::Parser;
use std::cell::Cell;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex as StdMutex, OnceLock as StdOnceLock};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

fn env_lock() -> &'static StdMutex<()> {
    static LOCK: StdOnceLock<StdMutex<()>> = StdOnceLock::new();
    LOCK.get_or_init(|| StdMutex::new(()))
}

fn run_git_checked(cwd: &Path, args: &[&str]) {
    let output = run_capture("git", args, Some(cwd)).expect("run git command");
    assert!(
        output.status.success(),
        "git {:?} failed\nstdout:\n{}\nstderr:\n{}",
        args,
        output.stdout,
        output.stderr
    );
}

fn init_test_repo(root: &Path) -> PathBuf {
    let repo = root.join("repo");
    fs::create_dir_all(&repo).expect("mkdir repo");
    run_git_checked(&repo, &["init"]);
    run_git_checked(&repo, &["config", "user.email", "test@example.com"]);
    run_git_checked(&repo, &["config", "user.name", "Test User"]);
    run_git_checked(&repo, &["config", "commit.gpgsign", "false"]);
    fs::write(repo.join("README.md"), "hello\n").expect("write README");
    run_git_checked(&repo, &["add", "README.md"]);
    run_git_checked(&repo, &["commit", "-m", "init"]);
    run_git_checked(&repo, &["branch", "-M", "main"]);
    repo
}

fn test_manager(repo: &Path) -> WorktreeManager {
    WorktreeManager::open(repo, Config::default()).expect("open manager")
}

fn error_code(err: &anyhow::Error) -> &'static str {
    find_worktree_error(err)
        .map(WorktreeError::code)
        .unwrap_or("NONE")
}

fn worktree(path: &str, branch: &str) -> WorktreeInfo {
    WorktreeInfo::basic(PathBuf::from(path), branch, None)
}

fn instant_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
        multiplier: 2.0,
    }
}

fn lock_contention_error() -> anyhow::Error {
    WorktreeError::GitCommand {
        command: "git worktree add".to_string(),
        exit_code: Some(128),
        stderr: "fatal: Unable to create '/repo/.git/index.lock': File exists.".to_string(),
    }
    .into()
}

#[test]
fn test_cache_counts_hits_and_misses() {
    let cache = ExpiringCache::new(Duration::from_secs(60));
    assert_eq!(cache.get("missing"), None::<String>);
    cache.set("key", "value".to_string());
    assert_eq!(cache.get("key").as_deref(), Some("value"));
    assert_eq!(cache.get("key").as_deref(), Some("value"));

    let stats = cache.stats();
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.total_requests, 3);
    assert_eq!(stats.size, 1);
    assert!((stats.hit_rate - 2.0 / 3.0).abs() < f64::EPSILON);
}

#[test]
fn test_cache_entry_expires_after_ttl() {
    let cache = ExpiringCache::new(Duration::from_secs(60));
    cache.set_with_ttl("short", 1_u32, Duration::from_millis(20));
    cache.set("long", 2_u32);
    thread::sleep(Duration::from_millis(50));

    assert_eq!(cache.get("short"), None);
    assert_eq!(cache.get("long"), Some(2));
    let stats = cache.stats();
    assert_eq!(stats.evictions, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.size, 1);
}

#[test]
fn test_cache_empty_stats_have_zero_hit_rate() {
    let cache: ExpiringCache<u32> = ExpiringCache::new(Duration::from_secs(1));
    let stats = cache.stats();
    assert_eq!(stats.total_requests, 0);
    assert_eq!(stats.hit_rate, 0.0);
    assert!(cache.is_empty());
}

#[test]
fn test_cache_evict_to_drops_expired_before_fresh() {
    let cache = ExpiringCache::new(Duration::from_secs(60));
    cache.set("oldest", 1_u32);
    thread::sleep(Duration::from_millis(5));
    cache.set_with_ttl("stale", 2, Duration::from_millis(10));
    cache.set("newest", 3);
    thread::sleep(Duration::from_millis(40));

    assert_eq!(cache.evict_to(2), 1);
    assert_eq!(cache.get("oldest"), Some(1));
    assert_eq!(cache.get("newest"), Some(3));
    assert_eq!(cache.stats().evictions, 1);
}

#[test]
fn test_get_or_try_insert_with_allows_cache_access_while_computing() {
    let cache = ExpiringCache::new(Duration::from_secs(60));
    cache.set("other", 1_u32);

    let value: Result<u32, String> = cache.get_or_try_insert_with("key", None, || {
        let other = cache.get("other").unwrap_or(0);
        cache.set("side", 5);
        Ok(other + 1)
    });

    assert_eq!(value, Ok(2));
    assert_eq!(cache.get("key"), Some(2));
    assert_eq!(cache.get("side"), Some(5));
}

#[test]
fn test_cache_invalidate_and_pattern() {
    let cache = ExpiringCache::new(Duration::from_secs(60));
    cache.set(cache_key("diff", &["feature", "main"]), 1_u32);
    cache.set(cache_key("diff", &["bugfix", "feature"]), 2);
    cache.set(cache_key("diff", &["bugfix", "main"]), 3);

    assert!(cache.invalidate("diff:bugfix:main"));
    assert!(!cache.invalidate("diff:bugfix:main"));
    assert_eq!(cache.invalidate_pattern(":feature"), 2);
    assert!(cache.is_empty());
}

#[test]
fn test_cache_clear_resets_stats() {
    let cache = ExpiringCache::new(Duration::from_secs(60));
    cache.set("a", 1_u32);
    let _ = cache.get("a");
    let _ = cache.get("b");
    cache.clear();

    let stats = cache.stats();
    assert_eq!(stats.size, 0);
    assert_eq!(stats.hits, 0);
    assert_eq!(stats.misses, 0);
    assert_eq!(stats.evictions, 0);
}

#[test]
fn test_cache_cleanup_expired_keeps_fresh_entries() {
    let cache = ExpiringCache::new(Duration::from_secs(60));
    cache.set_with_ttl("stale-1", 1_u32, Duration::from_millis(10));
    cache.set_with_ttl("stale-2", 2, Duration::from_millis(10));
    cache.set("fresh", 3);
    thread::sleep(Duration::from_millis(40));

    assert_eq!(cache.cleanup_expired(), 2);
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.stats().evictions, 2);
    assert_eq!(cache.get("fresh"), Some(3));
}

#[test]
fn test_cache_evict_to_drops_oldest_first() {
    let cache = ExpiringCache::new(Duration::from_secs(60));
    for key in ["first", "second", "third"] {
        cache.set(key, key.len());
        thread::sleep(Duration::from_millis(5));
    }

    assert_eq!(cache.evict_to(2), 1);
    assert_eq!(cache.get("first"), None);
    assert!(cache.get("second").is_some());
    assert!(cache.get("third").is_some());
    assert_eq!(cache.evict_to(5), 0);
}

#[test]
fn test_get_or_try_insert_with_does_not_cache_errors() {
    let cache = ExpiringCache::new(Duration::from_secs(60));
    let calls = Cell::new(0);

    let failed: Result<u32, String> = cache.get_or_try_insert_with("key", None, || {
        calls.set(calls.get() + 1);
        Err("boom".to_string())
    });
    assert_eq!(failed, Err("boom".to_string()));
    assert!(cache.is_empty());

    for _ in 0..2 {
        let value: Result<u32, String> = cache.get_or_try_insert_with("key", None, || {
            calls.set(calls.get() + 1);
            Ok(7)
        });
        assert_eq!(value, Ok(7));
    }
    assert_eq!(calls.get(), 2);
}

#[test]
fn test_cache_is_shared_across_threads() {
    let cache = ExpiringCache::new(Duration::from_secs(60));
    thread::scope(|scope| {
        for worker in 0..4 {
            let cache = &cache;
            scope.spawn(move || {
                for item in 0..25 {
                    let key = format!("{worker}:{item}");
                    cache.set(key.clone(), item);
                    assert_eq!(cache.get(&key), Some(item));
                }
            });
        }
    });
    let stats = cache.stats();
    assert_eq!(stats.size, 100);
    assert_eq!(stats.hits, 100);
}

#[test]
fn test_git_cache_invalidate_after_mutation() {
    let cache = GitCache::new(Duration::from_secs(300));
    cache.worktrees.set(WORKTREE_LIST_KEY, Vec::new());
    cache.branches.set("branches", vec!["main".to_string()]);
    cache
        .diff_summary
        .set(cache_key("diff", &["feature", "main"]), DiffSummary::default());
    cache
        .diff_summary
        .set(cache_key("diff", &["other", "main"]), DiffSummary::default());

    cache.invalidate_after_mutation("feature");

    assert!(cache.worktrees.is_empty());
    assert!(cache.branches.is_empty());
    assert_eq!(cache.diff_summary.len(), 1);
    assert_eq!(cache.stats().len(), 5);
}

#[test]
fn test_git_cache_enforce_limits_uses_configured_cap() {
    let cache = GitCache::new(Duration::from_secs(300));
    for index in 0..5 {
        cache.diff_summary.set(
            cache_key("diff", &[&format!("b{index}"), "main"]),
            DiffSummary::default(),
        );
    }
    cache.enforce_limits(3);
    assert_eq!(cache.diff_summary.len(), 3);
}

#[test]
fn test_parse_worktree_porcelain() {
    let raw = "worktree /repo\nHEAD 1111111111111111111111111111111111111111\nbranch refs/heads/main\n\n\
worktree /repo-feature\nHEAD 2222222222222222222222222222222222222222\nbranch refs/heads/feature/login\n\n\
worktree /repo-detached\nHEAD 3333333333333333333333333333333333333333\ndetached\n\n\
worktree /repo-bare\nbare\n";
    let worktrees = parse_worktree_porcelain(raw);
    assert_eq!(worktrees.len(), 4);

    assert_eq!(worktrees[0].path, PathBuf::from("/repo"));
    assert_eq!(worktrees[0].branch, "main");
    assert_eq!(worktrees[1].branch, "feature/login");
    assert!(worktrees[2].is_detached);
    assert_eq!(worktrees[2].branch, "HEAD (3333333)");
    assert!(worktrees[3].is_bare);
    assert!(worktrees[3].commit_hash.is_empty());
}

#[test]
fn test_parse_branch_list_merges_and_filters_remotes() {
    let local = "main\nfeature\n";
    let remote = "origin/HEAD\norigin/main\norigin/release\norigin\n";
    assert_eq!(
        parse_branch_list(local, remote),
        vec![
            "feature".to_string(),
            "main".to_string(),
            "origin/main".to_string(),
            "origin/release".to_string(),
        ]
    );
}

#[test]
fn test_detached_label() {
    let label = detached_label("abcdef0123456789");
    assert_eq!(label, "HEAD (abcdef0)");
    assert!(is_detached_label(&label));
    assert!(!is_detached_label("main"));
}

#[test]
fn test_parse_commit_info() {
    let line = "0123456789abcdef\x1fAdd login form\x1fTest User\x1f2024-05-01T10:20:30+02:00\x1f0123456";
    let info = parse_commit_info(line).expect("parse commit info");
    assert_eq!(info.hash, "0123456789abcdef");
    assert_eq!(info.message, "Add login form");
    assert_eq!(info.author, "Test User");
    assert_eq!(info.short_hash, "0123456");
    assert_eq!(info.date.to_rfc3339(), "2024-05-01T10:20:30+02:00");

    assert!(parse_commit_info("only\x1ftwo").is_err());
}

#[test]
fn test_parse_diff_stat() {
    let raw = " README.md | 2 +-\n src/lib.rs | 10 ++++++++++\n 2 files changed, 11 insertions(+), 1 deletion(-)\n";
    let summary = parse_diff_stat(raw);
    assert_eq!(summary.files_modified, 2);
    assert_eq!(summary.total_insertions, 11);
    assert_eq!(summary.total_deletions, 1);
    assert_eq!(summary.summary_text, "+11, -1");

    let classified = parse_diff_stat(
        " src/new.rs (new file) | 3 +++\n old.txt (deleted) | 2 --\n README.md | 2 +-\n 3 files changed, 4 insertions(+), 3 deletions(-)\n",
    );
    assert_eq!(classified.files_added, 1);
    assert_eq!(classified.files_deleted, 1);
    assert_eq!(classified.files_modified, 1);

    let footer_only = parse_diff_stat(" 4 files changed, 6 insertions(+)\n");
    assert_eq!(footer_only.files_modified, 4);
    assert_eq!(footer_only.total_insertions, 6);
    assert_eq!(footer_only.summary_text, "+6");

    let binary = parse_diff_stat(
        " logo.png | Bin 0 -> 1024 bytes\n 1 file changed, 0 insertions(+), 0 deletions(-)\n",
    );
    assert_eq!(binary.files_modified, 1);
    assert_eq!(binary.summary_text, "1 file changed");

    let empty = parse_diff_stat("");
    assert!(empty.is_empty());
    assert_eq!(empty.summary_text, "No changes");
}

#[test]
fn test_validate_branch_name() {
    assert_eq!(validate_branch_name("  feature/login ").expect("valid"), "feature/login");
    assert!(validate_branch_name("release-1.2").is_ok());

    for bad in [
        "", "has space", "a~b", "a^b", "a:b", "a?b", "a*b", "a[b", "a\\b", "a..b", "a@{b", "-lead",
        "trail-", ".hidden", "trail.", "a//b", "dir/", "name.lock",
    ] {
        let err = validate_branch_name(bad).expect_err(bad);
        assert_eq!(err.code(), "INVALID_BRANCH_NAME", "{bad}");
    }
}

#[test]
fn test_validate_location() {
    let temp = TempDir::new().expect("tempdir");
    let missing = temp.path().join("new-worktree");
    assert_eq!(
        validate_location(missing.to_str().expect("utf8 path")).expect("missing dir ok"),
        missing
    );

    let empty = temp.path().join("empty");
    fs::create_dir_all(&empty).expect("mkdir empty");
    assert!(validate_location(empty.to_str().expect("utf8 path")).is_ok());

    let busy = temp.path().join("busy");
    fs::create_dir_all(&busy).expect("mkdir busy");
    fs::write(busy.join("file.txt"), "x").expect("write file");
    let err = validate_location(busy.to_str().expect("utf8 path")).expect_err("non-empty dir");
    assert_eq!(error_code(&err), "INVALID_LOCATION");

    let err = validate_location(busy.join("file.txt").to_str().expect("utf8 path"))
        .expect_err("file");
    assert_eq!(error_code(&err), "INVALID_LOCATION");

    assert!(validate_location("   ").is_err());
}

#[test]
fn test_config_load_missing_and_unparsable() {
    let temp = TempDir::new().expect("tempdir");
    let path = temp.path().join("config.toml");
    assert_eq!(Config::load_from(&path).expect("missing"), Config::default());

    fs::write(&path, "this is = = not toml").expect("write config");
    assert_eq!(Config::load_from(&path).expect("unparsable"), Config::default());
}

#[test]
fn test_config_undecodable_file_uses_defaults() {
    let temp = TempDir::new().expect("tempdir");
    let path = temp.path().join("config.toml");
    fs::write(&path, [0xff, 0xfe, b'[', b'u', b'i', b']']).expect("write config");

    assert_eq!(Config::load_from(&path).expect("undecodable"), Config::default());

    Config::default().save_to(&path).expect("reset over bad file");
    assert_eq!(Config::load_from(&path).expect("reload"), Config::default());
}

#[test]
fn test_config_partial_file_uses_defaults() {
    let temp = TempDir::new().expect("tempdir");
    let path = temp.path().join("config.toml");
    fs::write(&path, "[ui]\ntheme = \"light\"\n").expect("write config");

    let config = Config::load_from(&path).expect("load");
    assert_eq!(config.ui.theme, "light");
    assert!(config.ui.show_progress);
    assert_eq!(config.performance, Config::default().performance);
}

#[test]
fn test_config_validate_ranges() {
    assert!(Config::default().validate().is_ok());

    let mut config = Config::default();
    config.ui.theme = "neon".to_string();
    assert_eq!(config.validate().expect_err("theme").code(), "CONFIG_INVALID");

    let mut config = Config::default();
    config.performance.cache_timeout = 86_401;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.performance.max_cached_items = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.worktree.default_path = "relative/dir".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_config_apply_is_all_or_nothing() {
    let mut config = Config::default();
    config
        .apply(&[
            ConfigUpdate::Theme("light".to_string()),
            ConfigUpdate::CacheTimeout(60),
        ])
        .expect("valid updates");
    assert_eq!(config.ui.theme, "light");
    assert_eq!(config.cache_timeout(), Duration::from_secs(60));

    let before = config.clone();
    let err = config
        .apply(&[
            ConfigUpdate::AutoCleanup(false),
            ConfigUpdate::MaxCachedItems(0),
        ])
        .expect_err("invalid update");
    assert_eq!(err.code(), "CONFIG_INVALID");
    assert_eq!(config, before);
}

#[test]
fn test_config_save_and_reload() {
    let temp = TempDir::new().expect("tempdir");
    let path = temp.path().join("nested").join("config.toml");
    let mut config = Config::default();
    config
        .apply(&[
            ConfigUpdate::DefaultPath("/srv/worktrees".to_string()),
            ConfigUpdate::ShowProgress(false),
        ])
        .expect("apply");
    config.save_to(&path).expect("save");

    assert_eq!(Config::load_from(&path).expect("reload"), config);
}

#[test]
fn test_default_worktree_location_env_override() {
    let _guard = env_lock().lock().expect("lock env");
    let mut config = Config::default();
    config.worktree.default_path = "/from/config".to_string();

    // SAFETY: env access in tests is serialised by `env_lock`.
    unsafe { env::set_var(ENV_WORKTREE_DEFAULT_PATH, "/from/env") };
    let overridden = config.default_worktree_location();
    unsafe { env::remove_var(ENV_WORKTREE_DEFAULT_PATH) };

    assert_eq!(overridden, PathBuf::from("/from/env"));
    assert_eq!(config.default_worktree_location(), PathBuf::from("/from/config"));
}

#[test]
fn test_retry_recovers_from_transient_failures() {
    let attempts = Cell::new(0);
    let result = retry(instant_policy(3), "test op", is_transient, || {
        attempts.set(attempts.get() + 1);
        if attempts.get() < 3 {
            Err(lock_contention_error())
        } else {
            Ok("done")
        }
    });
    assert_eq!(result.expect("eventually succeeds"), "done");
    assert_eq!(attempts.get(), 3);
}

#[test]
fn test_retry_stops_on_permanent_failure() {
    let attempts = Cell::new(0);
    let result: anyhow::Result<()> = retry(instant_policy(5), "test op", is_transient, || {
        attempts.set(attempts.get() + 1);
        Err(WorktreeError::UnknownBaseBranch("nope".to_string()).into())
    });
    assert_eq!(error_code(&result.expect_err("fails")), "UNKNOWN_BASE_BRANCH");
    assert_eq!(attempts.get(), 1);
}

#[test]
fn test_retry_gives_up_after_max_attempts() {
    let attempts = Cell::new(0);
    let result: anyhow::Result<()> = retry(instant_policy(2), "test op", |_| true, || {
        attempts.set(attempts.get() + 1);
        Err(anyhow!("still broken"))
    });
    assert!(result.is_err());
    assert_eq!(attempts.get(), 2);
}

#[test]
fn test_retry_delay_is_capped() {
    let policy = RetryPolicy::for_queries();
    assert_eq!(policy.delay_for(0), Duration::from_millis(500));
    assert_eq!(policy.delay_for(1), Duration::from_secs(1));
    assert_eq!(policy.delay_for(10), Duration::from_secs(10));
}

#[test]
fn test_transient_error_classification() {
    assert!(is_transient(&lock_contention_error()));
    assert!(is_lock_contention(
        "fatal: Unable to create '/repo/.git/worktrees/x/index.lock'"
    ));
    assert!(!is_lock_contention("fatal: invalid reference: nope"));

    let permanent: anyhow::Error = WorktreeError::GitCommand {
        command: "git worktree add".to_string(),
        exit_code: Some(128),
        stderr: "fatal: invalid reference: nope".to_string(),
    }
    .into();
    assert!(!is_transient(&permanent));

    let spawn: anyhow::Error =
        std::io::Error::new(std::io::ErrorKind::Interrupted, "interrupted").into();
    assert!(is_transient(&spawn));
    assert!(!is_transient(&anyhow!("plain message")));
}

#[test]
fn test_error_codes_survive_context() {
    let err = anyhow::Error::from(WorktreeError::NotGitRepository(PathBuf::from("/tmp/x")))
        .context("failed to open repository");
    let found = find_worktree_error(&err).expect("worktree error in chain");
    assert_eq!(found.code(), "NOT_GIT_REPOSITORY");
    assert!(found.guidance().expect("guidance").contains("git init"));

    let checked_out = WorktreeError::BranchCheckedOut {
        branch: "main".to_string(),
        path: PathBuf::from("/repo"),
    };
    assert_eq!(checked_out.code(), "WORKTREE_EXISTS");
    assert!(find_worktree_error(&anyhow!("unrelated")).is_none());
}

#[test]
fn test_parse_worktree_index() {
    assert_eq!(parse_worktree_index("2"), Some(2));
    assert_eq!(parse_worktree_index(" #3 "), Some(3));
    assert_eq!(parse_worktree_index("0"), None);
    assert_eq!(parse_worktree_index("feature"), None);
}

#[test]
fn test_resolve_worktree_target() {
    let worktrees = vec![
        worktree("/repo", "main"),
        worktree("/wt/feature", "feature"),
        worktree("/wt/dup-a", "dup"),
        worktree("/wt/dup-b", "dup"),
    ];

    let (index, found) = resolve_worktree_target(&worktrees, "#2").expect("by index");
    assert_eq!((index, found.branch.as_str()), (2, "feature"));

    let (index, _) = resolve_worktree_target(&worktrees, "feature").expect("by branch");
    assert_eq!(index, 2);

    let (index, _) = resolve_worktree_target(&worktrees, "/wt/feature").expect("by path");
    assert_eq!(index, 2);

    let err = resolve_worktree_target(&worktrees, "dup").expect_err("ambiguous");
    assert_eq!(error_code(&err), "AMBIGUOUS_WORKTREE");

    let err = resolve_worktree_target(&worktrees, "missing").expect_err("not found");
    assert_eq!(error_code(&err), "WORKTREE_NOT_FOUND");
}

#[test]
fn test_truncate_and_compact_diff() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("abcdefghij", 6), "abc...");

    assert_eq!(diff_summary_compact(&DiffSummary::default()), "no changes");
    let diff = DiffSummary {
        files_added: 1,
        files_modified: 2,
        files_deleted: 3,
        ..DiffSummary::default()
    };
    assert_eq!(diff_summary_compact(&diff), "+1 ~2 -3");
}

#[test]
fn test_cli_parses_aliases_and_flags() {
    let cli = Cli::try_parse_from(["git-worktree-manager", "ls", "--diff"]).expect("parse ls");
    assert!(matches!(
        cli.command,
        Commands::List {
            diff: true,
            details: false,
            json: false
        }
    ));

    let cli = Cli::try_parse_from(["git-worktree-manager", "c", "--branch", "feat", "--base", "main"])
        .expect("parse create");
    match cli.command {
        Commands::Create { branch, base, path } => {
            assert_eq!(branch.as_deref(), Some("feat"));
            assert_eq!(base.as_deref(), Some("main"));
            assert_eq!(path, None);
        }
        other => panic!("unexpected command: {other:?}"),
    }

    assert!(Cli::try_parse_from(["git-worktree-manager", "list", "--json", "--diff"]).is_err());
    assert!(Cli::try_parse_from(["git-worktree-manager", "configure", "--theme", "neon"]).is_err());
}

#[test]
fn test_parse_configure_args_collects_updates() {
    let args = parse_configure_args(
        false,
        false,
        None,
        Some(false),
        Some("light".to_string()),
        None,
        Some(120),
        None,
    );
    assert!(!args.is_empty());
    assert_eq!(
        args.updates,
        vec![
            ConfigUpdate::AutoCleanup(false),
            ConfigUpdate::Theme("light".to_string()),
            ConfigUpdate::CacheTimeout(120),
        ]
    );

    let show_only = parse_configure_args(true, false, None, None, None, None, None, None);
    assert!(show_only.is_empty());
}

#[test]
fn test_open_outside_repository_fails() {
    let temp = TempDir::new().expect("tempdir");
    let err = WorktreeManager::open(temp.path(), Config::default()).expect_err("not a repo");
    assert_eq!(error_code(&err), "NOT_GIT_REPOSITORY");
}

#[test]
fn test_create_worktree_and_list_refreshes_cache() {
    let temp = TempDir::new().expect("tempdir");
    let repo = init_test_repo(temp.path());
    let manager = test_manager(&repo);

    assert_eq!(manager.list_worktrees().expect("list before").len(), 1);

    let location = temp.path().join("wt").join("feature");
    let info = manager
        .create_worktree(&CreateRequest {
            branch: "feature".to_string(),
            base: None,
            location: Some(location.to_string_lossy().into_owned()),
        })
        .expect("create worktree");

    assert_eq!(info.branch, "feature");
    assert_eq!(info.base_branch.as_deref(), Some("main"));
    assert_eq!(info.commit_message, "init");
    assert!(!info.has_uncommitted_changes);
    assert!(location.join("README.md").is_file());

    let worktrees = manager.list_worktrees().expect("list after");
    assert_eq!(worktrees.len(), 2);
    assert!(worktrees.iter().any(|w| w.branch == "feature"));
    assert_eq!(worktrees[0].commit_message, "init");
}

#[test]
fn test_create_worktree_for_existing_branch() {
    let temp = TempDir::new().expect("tempdir");
    let repo = init_test_repo(temp.path());
    run_git_checked(&repo, &["branch", "existing"]);
    let manager = test_manager(&repo);

    let location = temp.path().join("existing");
    let info = manager
        .create_worktree(&CreateRequest {
            branch: "existing".to_string(),
            base: Some("main".to_string()),
            location: Some(location.to_string_lossy().into_owned()),
        })
        .expect("create worktree");
    assert_eq!(info.branch, "existing");
    assert!(location.join("README.md").is_file());
}

#[test]
fn test_create_worktree_rejects_invalid_inputs() {
    let temp = TempDir::new().expect("tempdir");
    let repo = init_test_repo(temp.path());
    let manager = test_manager(&repo);
    let location = |name: &str| Some(temp.path().join(name).to_string_lossy().into_owned());

    let err = manager
        .create_worktree(&CreateRequest {
            branch: "bad name".to_string(),
            base: None,
            location: location("bad"),
        })
        .expect_err("invalid branch");
    assert_eq!(error_code(&err), "INVALID_BRANCH_NAME");

    let err = manager
        .create_worktree(&CreateRequest {
            branch: "feature".to_string(),
            base: Some("does-not-exist".to_string()),
            location: location("feature"),
        })
        .expect_err("unknown base");
    assert_eq!(error_code(&err), "UNKNOWN_BASE_BRANCH");

    let err = manager
        .create_worktree(&CreateRequest {
            branch: "main".to_string(),
            base: None,
            location: location("main-copy"),
        })
        .expect_err("branch checked out");
    assert!(matches!(
        find_worktree_error(&err),
        Some(WorktreeError::BranchCheckedOut { .. })
    ));

    let err = manager
        .create_worktree(&CreateRequest {
            branch: "other".to_string(),
            base: None,
            location: Some(repo.to_string_lossy().into_owned()),
        })
        .expect_err("existing worktree path");
    assert_eq!(error_code(&err), "WORKTREE_EXISTS");

    assert!(!temp.path().join("bad").exists());
    assert!(!temp.path().join("feature").exists());
}

#[test]
fn test_failed_creation_rolls_back_created_state() {
    let temp = TempDir::new().expect("tempdir");
    let repo = init_test_repo(temp.path());
    // `feature` cannot be created while `feature/x` exists.
    run_git_checked(&repo, &["branch", "feature/x"]);
    let manager = test_manager(&repo);

    let location = temp.path().join("nested").join("deeper").join("feature");
    let err = manager
        .create_worktree(&CreateRequest {
            branch: "feature".to_string(),
            base: None,
            location: Some(location.to_string_lossy().into_owned()),
        })
        .expect_err("ref conflict");

    assert_eq!(error_code(&err), "GIT_COMMAND_FAILED");
    assert!(!temp.path().join("nested").exists());
    let branches = run_capture("git", &["branch", "--list", "feature"], Some(&repo))
        .expect("list branches");
    assert!(branches.stdout.trim().is_empty());
    assert_eq!(manager.list_worktrees().expect("list").len(), 1);
}

#[test]
fn test_failed_creation_keeps_state_without_auto_cleanup() {
    let temp = TempDir::new().expect("tempdir");
    let repo = init_test_repo(temp.path());
    run_git_checked(&repo, &["branch", "feature/x"]);
    let mut config = Config::default();
    config.worktree.auto_cleanup = false;
    let manager = WorktreeManager::open(&repo, config).expect("open manager");

    let location = temp.path().join("kept").join("feature");
    manager
        .create_worktree(&CreateRequest {
            branch: "feature".to_string(),
            base: None,
            location: Some(location.to_string_lossy().into_owned()),
        })
        .expect_err("ref conflict");
    assert!(temp.path().join("kept").is_dir());
}

#[test]
fn test_diff_summary_against_base() {
    let temp = TempDir::new().expect("tempdir");
    let repo = init_test_repo(temp.path());
    let manager = test_manager(&repo);

    let location = temp.path().join("feature");
    let info = manager
        .create_worktree(&CreateRequest {
            branch: "feature".to_string(),
            base: None,
            location: Some(location.to_string_lossy().into_owned()),
        })
        .expect("create worktree");

    fs::write(location.join("README.md"), "hello\nworld\n").expect("edit README");
    fs::write(location.join("notes.txt"), "notes\n").expect("write notes");
    run_git_checked(&location, &["add", "."]);
    run_git_checked(&location, &["commit", "-m", "feature work"]);

    let (base, summary) = manager
        .calculate_diff_summary(&info, None)
        .expect("diff")
        .expect("base resolved");
    assert_eq!(base, "main");
    assert_eq!(summary.total_files(), 2);
    assert_eq!(summary.total_insertions, 2);
    assert_eq!(summary.total_deletions, 0);

    let unknown = manager
        .calculate_diff_summary(&info, Some("no-such-base"))
        .expect("unknown base is not an error");
    assert_eq!(unknown, None);

    let listed = manager
        .list_worktrees()
        .expect("list")
        .into_iter()
        .find(|w| w.branch == "feature")
        .expect("feature listed");
    assert_eq!(listed.base_branch, None);
    let (base, listed_summary) = manager
        .calculate_diff_summary(&listed, None)
        .expect("diff listed")
        .expect("base from current branch");
    assert_eq!(base, "main");
    assert_eq!(listed_summary, summary);

    let status = manager.worktree_status(&info);
    assert!(!status.has_uncommitted_changes);
    fs::write(location.join("scratch.txt"), "wip\n").expect("write scratch");
    assert!(manager.worktree_status(&info).has_uncommitted_changes);
}

#[test]
fn test_remove_worktree_by_branch_keeps_main() {
    let temp = TempDir::new().expect("tempdir");
    let repo = init_test_repo(temp.path());
    let manager = test_manager(&repo);

    let location = temp.path().join("feature");
    manager
        .create_worktree(&CreateRequest {
            branch: "feature".to_string(),
            base: None,
            location: Some(location.to_string_lossy().into_owned()),
        })
        .expect("create worktree");
    assert_eq!(manager.list_worktrees().expect("list").len(), 2);

    let err = manager.remove_worktree("1", false).expect_err("main worktree");
    assert_eq!(error_code(&err), "INVALID_LOCATION");

    let removed = manager.remove_worktree("feature", false).expect("remove");
    assert_eq!(removed.branch, "feature");
    assert!(!location.exists());
    assert_eq!(manager.list_worktrees().expect("list").len(), 1);

    let branches = run_capture("git", &["branch", "--list", "feature"], Some(&repo))
        .expect("list branches");
    assert!(branches.stdout.contains("feature"));
}

#[test]
fn test_remove_worktree_from_inside_linked_worktree() {
    let temp = TempDir::new().expect("tempdir");
    let repo = init_test_repo(temp.path());
    let location = temp.path().join("feature");
    run_git_checked(
        &repo,
        &[
            "worktree",
            "add",
            "-b",
            "feature",
            location.to_string_lossy().as_ref(),
            "main",
        ],
    );

    let manager = test_manager(&location);
    let removed = manager.remove_worktree("feature", false).expect("remove linked");
    assert_eq!(removed.branch, "feature");
    assert!(!location.exists());

    let err = test_manager(&repo)
        .remove_worktree("main", false)
        .expect_err("main worktree");
    assert_eq!(error_code(&err), "INVALID_LOCATION");
}

#[test]
fn test_commit_info_is_cached() {
    let temp = TempDir::new().expect("tempdir");
    let repo = init_test_repo(temp.path());
    let manager = test_manager(&repo);

    let first = manager.commit_info("main").expect("commit info");
    let second = manager.commit_info("main").expect("commit info again");
    assert_eq!(first, second);
    assert_eq!(first.message, "init");
    assert_eq!(first.author, "Test User");

    let stats = manager
        .cache_stats()
        .into_iter()
        .find(|(name, _)| *name == "commit_info")
        .map(|(_, stats)| stats)
        .expect("commit_info stats");
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
}
