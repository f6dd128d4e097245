use crate::config::ConfigUpdate;
use clap::{ArgAction, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "git-worktree-manager",
    version,
    about = "Create, list and remove git worktrees with sensible defaults"
)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Commands,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Commands {
    /// Create a worktree, prompting for anything not given on the command line.
    #[command(alias = "c")]
    Create {
        /// Branch to check out; created from the base when it does not exist.
        #[arg(short, long)]
        branch: Option<String>,
        /// Branch or revision the new branch starts from.
        #[arg(long)]
        base: Option<String>,
        /// Directory for the worktree. Defaults to `<default_path>/<branch>`.
        #[arg(short, long)]
        path: Option<String>,
    },
    /// List worktrees of the current repository.
    #[command(alias = "ls")]
    List {
        /// Show a change summary against each worktree's base.
        #[arg(long)]
        diff: bool,
        /// Show a detail panel per worktree.
        #[arg(long)]
        details: bool,
        #[arg(long, conflicts_with_all = ["diff", "details"])]
        json: bool,
    },
    /// Remove a worktree by list index, branch name or path. The branch is kept.
    #[command(alias = "rm")]
    Remove {
        target: String,
        /// Remove even when the worktree has uncommitted changes.
        #[arg(short, long)]
        force: bool,
    },
    /// Show or change the configuration file.
    Configure {
        #[arg(long)]
        show: bool,
        /// Restore every setting to its default.
        #[arg(long, conflicts_with = "show")]
        reset: bool,
        #[arg(long, value_name = "PATH")]
        default_path: Option<String>,
        #[arg(long, value_name = "BOOL", action = ArgAction::Set)]
        auto_cleanup: Option<bool>,
        #[arg(long, value_parser = ["dark", "light", "auto"])]
        theme: Option<String>,
        #[arg(long, value_name = "BOOL", action = ArgAction::Set)]
        show_progress: Option<bool>,
        /// Upper bound for every cache TTL, in seconds.
        #[arg(long, value_name = "SECONDS")]
        cache_timeout: Option<u64>,
        #[arg(long, value_name = "N")]
        max_cached_items: Option<usize>,
    },
    /// Run environment checks and print remediation hints.
    Doctor,
}

#[derive(Debug, Default)]
pub(crate) struct ConfigureArgs {
    pub(crate) show: bool,
    pub(crate) reset: bool,
    pub(crate) updates: Vec<ConfigUpdate>,
}

impl ConfigureArgs {
    pub(crate) fn is_empty(&self) -> bool {
        !self.reset && self.updates.is_empty()
    }
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn parse_configure_args(
    show: bool,
    reset: bool,
    default_path: Option<String>,
    auto_cleanup: Option<bool>,
    theme: Option<String>,
    show_progress: Option<bool>,
    cache_timeout: Option<u64>,
    max_cached_items: Option<usize>,
) -> ConfigureArgs {
    let mut updates = Vec::new();
    if let Some(path) = default_path {
        updates.push(ConfigUpdate::DefaultPath(path));
    }
    if let Some(value) = auto_cleanup {
        updates.push(ConfigUpdate::AutoCleanup(value));
    }
    if let Some(theme) = theme {
        updates.push(ConfigUpdate::Theme(theme));
    }
    if let Some(value) = show_progress {
        updates.push(ConfigUpdate::ShowProgress(value));
    }
    if let Some(secs) = cache_timeout {
        updates.push(ConfigUpdate::CacheTimeout(secs));
    }
    if let Some(max) = max_cached_items {
        updates.push(ConfigUpdate::MaxCachedItems(max));
    }
    ConfigureArgs {
        show,
        reset,
        updates,
    }
}
