use crate::cli::{Commands, ConfigureArgs, parse_configure_args};
use crate::config::{Config, config_file_path};
use crate::error::WorktreeError;
use crate::git::{git_available, is_git_repository};
use crate::manager::{CreateRequest, WorktreeManager};
use crate::models::WorktreeInfo;
use crate::process::{first_line, run_capture};
use crate::ui::{
    Theme, confirm, diff_summary_compact, diff_summary_panel, is_interactive, progress,
    prompt_branch_name, prompt_location, select_base_branch, worktree_details, worktree_summary,
    worktree_table,
};
use crate::validation::display_path;
use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::env;
use std::path::Path;

pub(crate) fn run(command: Commands, config: &Config) -> Result<()> {
    crate::ui::set_progress_enabled(config.ui.show_progress);
    let theme = Theme::install(&config.ui.theme);

    match command {
        Commands::Create { branch, base, path } => {
            cmd_create(config, &theme, branch, base, path)
        }
        Commands::List {
            diff,
            details,
            json,
        } => cmd_list(config, &theme, diff, details, json),
        Commands::Remove { target, force } => cmd_remove(config, &target, force),
        Commands::Configure {
            show,
            reset,
            default_path,
            auto_cleanup,
            theme: theme_name,
            show_progress,
            cache_timeout,
            max_cached_items,
        } => cmd_configure(parse_configure_args(
            show,
            reset,
            default_path,
            auto_cleanup,
            theme_name,
            show_progress,
            cache_timeout,
            max_cached_items,
        )),
        Commands::Doctor => cmd_doctor(config),
    }
}

fn open_manager(config: &Config) -> Result<WorktreeManager> {
    let cwd = env::current_dir().context("failed to read current directory")?;
    WorktreeManager::open(&cwd, config.clone())
}

fn cmd_create(
    config: &Config,
    theme: &Theme,
    branch: Option<String>,
    base: Option<String>,
    path: Option<String>,
) -> Result<()> {
    let manager = open_manager(config)?;
    let interactive = is_interactive();

    let branch = match branch {
        Some(branch) => branch,
        None if interactive => prompt_branch_name()?,
        None => bail!("no branch name given; pass --branch <name>"),
    };

    let base = match base {
        Some(base) => Some(base),
        None if interactive => {
            let branches = manager.branches()?;
            let current = manager.current_branch()?;
            Some(select_base_branch(theme, &branches, Some(&current))?)
        }
        None => None,
    };

    let location = match path {
        Some(path) => Some(path),
        None if interactive => {
            let default = config.default_worktree_location().join(branch.trim());
            Some(prompt_location(&display_path(&default))?)
        }
        None => None,
    };

    let info = manager.create_worktree(&CreateRequest {
        branch,
        base,
        location,
    })?;

    println!("Created worktree for `{}`", info.branch);
    let commit = manager.commit_info(&info.branch).ok();
    worktree_details(theme, &info, commit.as_ref());
    println!("cd {}", display_path(&info.path));
    log_cache_stats(&manager);
    Ok(())
}

#[derive(Debug, Serialize)]
struct WorktreeJson<'a> {
    index: usize,
    #[serde(flatten)]
    worktree: &'a WorktreeInfo,
}

fn cmd_list(config: &Config, theme: &Theme, diff: bool, details: bool, json: bool) -> Result<()> {
    let manager = open_manager(config)?;
    progress("Listing worktrees");
    let worktrees = manager.list_worktrees()?;

    if json {
        let rows = worktrees
            .iter()
            .enumerate()
            .map(|(offset, worktree)| WorktreeJson {
                index: offset + 1,
                worktree,
            })
            .collect::<Vec<_>>();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if worktrees.is_empty() {
        println!("No worktrees found.");
        return Ok(());
    }

    worktree_table(theme, &worktrees);
    worktree_summary(theme, &worktrees);

    if diff && !details {
        println!();
        for worktree in worktrees.iter().filter(|w| !w.is_bare) {
            let summary = match manager.calculate_diff_summary(worktree, None)? {
                Some((base, summary)) if !summary.is_empty() => format!(
                    "{} ({}) vs {base}",
                    diff_summary_compact(&summary),
                    summary.summary_text
                ),
                Some((base, summary)) => format!("{} vs {base}", diff_summary_compact(&summary)),
                None => "no base to compare".to_string(),
            };
            println!("{:<28} {summary}", worktree.branch);
        }
    }

    if details {
        for worktree in &worktrees {
            println!();
            let worktree = manager.worktree_status(worktree);
            let commit = if worktree.commit_hash.is_empty() {
                None
            } else {
                manager.commit_info(&worktree.commit_hash).ok()
            };
            worktree_details(theme, &worktree, commit.as_ref());
            if diff
                && !worktree.is_bare
                && let Some((base, summary)) = manager.calculate_diff_summary(&worktree, None)?
            {
                diff_summary_panel(theme, &summary, &worktree.branch, &base);
            }
        }
    }

    log_cache_stats(&manager);
    Ok(())
}

fn cmd_remove(config: &Config, target: &str, force: bool) -> Result<()> {
    let manager = open_manager(config)?;
    if !force && is_interactive() && !confirm(&format!("Remove worktree `{target}`?"), true)? {
        return Err(WorktreeError::Cancelled("removal cancelled".to_string()).into());
    }
    let removed = manager.remove_worktree(target, force)?;
    println!(
        "Removed worktree `{}` ({})",
        removed.branch,
        display_path(&removed.path)
    );
    println!("branch `{}` was kept", removed.branch);
    Ok(())
}

fn cmd_configure(args: ConfigureArgs) -> Result<()> {
    let path = config_file_path()?;

    if args.reset {
        Config::default().save_to(&path)?;
        println!("Configuration reset to defaults");
    } else if !args.updates.is_empty() {
        let mut config = Config::load_from(&path)?;
        config.apply(&args.updates)?;
        config.save_to(&path)?;
        println!("Configuration saved");
    }

    if args.show || args.is_empty() {
        let config = Config::load_from(&path)?;
        println!("config file: {}", display_path(&path));
        for (key, value) in config.entries() {
            println!("{key:<30} {value}");
        }
    }
    Ok(())
}

fn log_cache_stats(manager: &WorktreeManager) {
    for (name, stats) in manager.cache_stats() {
        tracing::debug!(
            cache = name,
            hits = stats.hits,
            misses = stats.misses,
            evictions = stats.evictions,
            size = stats.size,
            requests = stats.total_requests,
            hit_rate = stats.hit_rate,
            "cache stats"
        );
    }
}

#[derive(Debug)]
struct Check {
    name: String,
    ok: bool,
    detail: String,
    fix: Option<String>,
}

impl Check {
    fn ok(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ok: true,
            detail: detail.into(),
            fix: None,
        }
    }

    fn fail(name: impl Into<String>, detail: impl Into<String>, fix: Option<String>) -> Self {
        Self {
            name: name.into(),
            ok: false,
            detail: detail.into(),
            fix,
        }
    }

    fn print(&self) {
        let state = if self.ok { "OK" } else { "FAIL" };
        println!("[{state}] {}: {}", self.name, self.detail);
        if let Some(fix) = &self.fix {
            println!("      fix: {fix}");
        }
    }
}

fn cmd_doctor(config: &Config) -> Result<()> {
    progress("doctor: running environment checks");
    let mut checks = Vec::new();

    if git_available() {
        checks.push(Check::ok("git installed", "`git --version` works"));
    } else {
        checks.push(Check::fail(
            "git installed",
            "`git` is not callable",
            Some("install git and make sure it is on PATH".to_string()),
        ));
    }

    let cwd = env::current_dir().context("failed to read current directory")?;
    let inside_repo = is_git_repository(&cwd).unwrap_or(false);
    if inside_repo {
        checks.push(Check::ok("Inside git repo", format!("cwd: {}", display_path(&cwd))));
        checks.push(worktree_support_check(&cwd));
    } else {
        checks.push(Check::fail(
            "Inside git repo",
            "current directory is not inside a git repository",
            Some("cd <your-repo> or run `git init`".to_string()),
        ));
    }

    let config_path = config_file_path()?;
    match Config::load_from(&config_path).and_then(|loaded| Ok(loaded.validate()?)) {
        Ok(()) => checks.push(Check::ok(
            "Configuration valid",
            display_path(&config_path),
        )),
        Err(err) => checks.push(Check::fail(
            "Configuration valid",
            format!("{err:#}"),
            Some("git-worktree-manager configure --reset".to_string()),
        )),
    }

    checks.push(default_location_check(&config.default_worktree_location()));

    let failed = checks.iter().any(|check| !check.ok);
    for check in checks {
        check.print();
    }

    if failed {
        bail!("doctor found failing checks")
    } else {
        Ok(())
    }
}

fn worktree_support_check(cwd: &Path) -> Check {
    match run_capture("git", &["worktree", "list"], Some(cwd)) {
        Ok(output) if output.status.success() => {
            Check::ok("git worktree support", "`git worktree list` works")
        }
        Ok(output) => Check::fail(
            "git worktree support",
            first_line(&output.stderr),
            Some("upgrade git to a version with worktree support".to_string()),
        ),
        Err(err) => Check::fail(
            "git worktree support",
            err.to_string(),
            Some("ensure git is installed and callable".to_string()),
        ),
    }
}

fn default_location_check(location: &Path) -> Check {
    if location.is_dir() {
        return Check::ok("Default worktree location", format!("found {}", display_path(location)));
    }
    if location.exists() {
        return Check::fail(
            "Default worktree location",
            format!("{} exists but is not a directory", display_path(location)),
            Some("git-worktree-manager configure --default-path <dir>".to_string()),
        );
    }
    let creatable = location
        .ancestors()
        .find(|ancestor| ancestor.exists())
        .and_then(|ancestor| ancestor.metadata().ok())
        .is_some_and(|meta| meta.is_dir() && !meta.permissions().readonly());
    if creatable {
        Check::ok(
            "Default worktree location",
            format!("{} will be created on first use", display_path(location)),
        )
    } else {
        Check::fail(
            "Default worktree location",
            format!("{} cannot be created", display_path(location)),
            Some("git-worktree-manager configure --default-path <dir>".to_string()),
        )
    }
}
