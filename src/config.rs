use crate::constants::{
    APP_NAME, CONFIG_FILE_NAME, DEFAULT_CACHE_TIMEOUT_SECS, DEFAULT_MAX_CACHED_ITEMS,
    DEFAULT_THEME, DEFAULT_WORKTREE_PATH, ENV_CONFIG_PATH, ENV_WORKTREE_DEFAULT_PATH,
    MAX_CACHE_TIMEOUT_SECS, MAX_CACHED_ITEMS_LIMIT, VALID_THEMES,
};
use crate::error::WorktreeError;
use crate::validation::expand_home;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct WorktreeSettings {
    pub(crate) default_path: String,
    pub(crate) auto_cleanup: bool,
}

impl Default for WorktreeSettings {
    fn default() -> Self {
        Self {
            default_path: DEFAULT_WORKTREE_PATH.to_string(),
            auto_cleanup: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct UiSettings {
    pub(crate) theme: String,
    pub(crate) show_progress: bool,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            theme: DEFAULT_THEME.to_string(),
            show_progress: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct PerformanceSettings {
    pub(crate) cache_timeout: u64,
    pub(crate) max_cached_items: usize,
}

impl Default for PerformanceSettings {
    fn default() -> Self {
        Self {
            cache_timeout: DEFAULT_CACHE_TIMEOUT_SECS,
            max_cached_items: DEFAULT_MAX_CACHED_ITEMS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Config {
    pub(crate) worktree: WorktreeSettings,
    pub(crate) ui: UiSettings,
    pub(crate) performance: PerformanceSettings,
}

/// One `configure` change, applied to a copy and validated before saving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ConfigUpdate {
    DefaultPath(String),
    AutoCleanup(bool),
    Theme(String),
    ShowProgress(bool),
    CacheTimeout(u64),
    MaxCachedItems(usize),
}

impl Config {
    /// Load from the default location, falling back to defaults when the file
    /// is missing or unreadable.
    pub(crate) fn load() -> Result<Self> {
        Self::load_from(&config_file_path()?)
    }

    pub(crate) fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found; using defaults");
            return Ok(Self::default());
        }

        let parsed = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))
            .and_then(|raw| {
                toml::from_str::<Config>(&raw)
                    .with_context(|| format!("failed to parse config file {}", path.display()))
            });
        match parsed {
            Ok(config) => Ok(config),
            Err(err) => {
                tracing::warn!(path = %path.display(), "ignoring unusable config: {err:#}");
                eprintln!("warning: {err:#}; using defaults");
                Ok(Self::default())
            }
        }
    }

    pub(crate) fn save_to(&self, path: &Path) -> Result<()> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let raw = toml::to_string_pretty(self).context("failed to serialize config")?;
        fs::write(path, raw)
            .with_context(|| format!("failed to write config file {}", path.display()))?;
        tracing::info!(path = %path.display(), "saved configuration");
        Ok(())
    }

    pub(crate) fn validate(&self) -> Result<(), WorktreeError> {
        let invalid = |message: String| -> Result<(), WorktreeError> {
            Err(WorktreeError::ConfigInvalid(message))
        };

        let default_path = self.worktree.default_path.trim();
        if default_path.is_empty() {
            return invalid("worktree.default_path cannot be empty".to_string());
        }
        if !(default_path.starts_with('~') || Path::new(default_path).is_absolute()) {
            return invalid(format!(
                "worktree.default_path must be absolute or start with ~: {default_path}"
            ));
        }
        if !VALID_THEMES.contains(&self.ui.theme.as_str()) {
            return invalid(format!(
                "ui.theme must be one of {}, got: {}",
                VALID_THEMES.join(", "),
                self.ui.theme
            ));
        }
        if self.performance.cache_timeout > MAX_CACHE_TIMEOUT_SECS {
            return invalid(format!(
                "performance.cache_timeout cannot exceed {MAX_CACHE_TIMEOUT_SECS} seconds"
            ));
        }
        if self.performance.max_cached_items < 1 {
            return invalid("performance.max_cached_items must be at least 1".to_string());
        }
        if self.performance.max_cached_items > MAX_CACHED_ITEMS_LIMIT {
            return invalid(format!(
                "performance.max_cached_items cannot exceed {MAX_CACHED_ITEMS_LIMIT}"
            ));
        }
        Ok(())
    }

    /// Apply `updates` to a copy; `self` is only replaced when the result
    /// validates.
    pub(crate) fn apply(&mut self, updates: &[ConfigUpdate]) -> Result<(), WorktreeError> {
        let mut next = self.clone();
        for update in updates {
            match update {
                ConfigUpdate::DefaultPath(path) => next.worktree.default_path = path.clone(),
                ConfigUpdate::AutoCleanup(value) => next.worktree.auto_cleanup = *value,
                ConfigUpdate::Theme(theme) => next.ui.theme = theme.clone(),
                ConfigUpdate::ShowProgress(value) => next.ui.show_progress = *value,
                ConfigUpdate::CacheTimeout(secs) => next.performance.cache_timeout = *secs,
                ConfigUpdate::MaxCachedItems(max) => next.performance.max_cached_items = *max,
            }
        }
        next.validate()?;
        *self = next;
        Ok(())
    }

    /// Where new worktrees go by default; `WORKTREE_DEFAULT_PATH` wins over
    /// the file.
    pub(crate) fn default_worktree_location(&self) -> PathBuf {
        let raw = env::var(ENV_WORKTREE_DEFAULT_PATH)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| self.worktree.default_path.clone());
        expand_home(raw.trim())
    }

    pub(crate) fn cache_timeout(&self) -> Duration {
        Duration::from_secs(self.performance.cache_timeout)
    }

    pub(crate) fn entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("worktree.default_path", self.worktree.default_path.clone()),
            ("worktree.auto_cleanup", self.worktree.auto_cleanup.to_string()),
            ("ui.theme", self.ui.theme.clone()),
            ("ui.show_progress", self.ui.show_progress.to_string()),
            (
                "performance.cache_timeout",
                self.performance.cache_timeout.to_string(),
            ),
            (
                "performance.max_cached_items",
                self.performance.max_cached_items.to_string(),
            ),
        ]
    }
}

pub(crate) fn config_dir() -> Result<PathBuf> {
    if let Ok(custom) = env::var(ENV_CONFIG_PATH)
        && !custom.trim().is_empty()
    {
        return Ok(expand_home(custom.trim()));
    }
    dirs::config_dir()
        .map(|dir| dir.join(APP_NAME))
        .context("could not determine the user configuration directory")
}

pub(crate) fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}
