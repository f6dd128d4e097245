mod cache;
mod cli;
mod commands;
mod config;
mod constants;
mod error;
mod git;
mod manager;
mod models;
mod process;
mod retry;
mod ui;
mod validation;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use config::Config;
use error::{WorktreeError, find_worktree_error};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    init_tracing();
    if let Err(err) = run() {
        report_error(&err);
        std::process::exit(1);
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load().unwrap_or_else(|err| {
        ui::warn(&format!("{err:#}; using default configuration"));
        Config::default()
    });
    let config = match config.validate() {
        Ok(()) => config,
        Err(err) => {
            ui::warn(&format!("{err}; using default configuration"));
            Config::default()
        }
    };
    commands::run(cli.command, &config)
}

fn report_error(err: &anyhow::Error) {
    eprintln!("error: {err:#}");
    let Some(worktree_err) = find_worktree_error(err) else {
        return;
    };
    eprintln!("code: {}", worktree_err.code());
    if let WorktreeError::GitCommand {
        exit_code: Some(code),
        ..
    } = worktree_err
    {
        eprintln!("git exit code: {code}");
    }
    if let Some(hint) = worktree_err.guidance() {
        eprintln!("hint: {hint}");
    }
}
