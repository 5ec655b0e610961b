use std::path::PathBuf;

use clap::ValueEnum;

use crate::Cli;
use crate::env;
use crate::error::{LauncherError, Result};

pub const DEFAULT_OWNER: &str = "JoaoAndrad";
pub const DEFAULT_REPO: &str = "DashboardAutomatizadoMoodar";
pub const DEFAULT_ASSET_PREFIX: &str = "project-";
pub const DEFAULT_ENTRY: &str = "scripts/start_server.py";
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// How a new release replaces an existing project directory.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum InstallStrategy {
    /// Replace entries one by one, keeping the runtime environment in place.
    #[default]
    Merge,
    /// Rename the whole project aside as a backup and move the release in.
    Swap,
}

/// Immutable settings for one launcher run, built once from the command line.
#[derive(Clone, Debug)]
pub struct LauncherConfig {
    pub owner: String,
    pub repo: String,
    pub project_dir: PathBuf,
    pub asset_prefix: String,
    pub auto: bool,
    pub entry_script: PathBuf,
    pub strategy: InstallStrategy,
    pub delegate: bool,
    pub api_base: String,
}

impl LauncherConfig {
    /// The project directory is made absolute here; every sibling path (holding dir,
    /// backup, scratch space) is derived from it and must land outside the project.
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let requested = match cli.project.as_deref().map(str::trim) {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => env::resident_project_dir(),
        };
        let project_dir = env::absolute_path(&requested).map_err(|e| {
            LauncherError::FilesystemFailure(format!(
                "cannot resolve project dir {}: {e}",
                requested.display()
            ))
        })?;
        if project_dir.parent().is_none() {
            return Err(LauncherError::FilesystemFailure(format!(
                "project dir {} has no parent directory",
                project_dir.display()
            )));
        }
        Ok(Self {
            owner: cli.owner.clone(),
            repo: cli.repo.clone(),
            project_dir,
            asset_prefix: cli.asset.clone(),
            auto: cli.auto,
            entry_script: PathBuf::from(&cli.entry),
            strategy: cli.strategy,
            delegate: !cli.no_delegate,
            api_base: cli.api_base.trim_end_matches('/').to_owned(),
        })
    }

    /// Registry endpoint describing the latest published release.
    pub fn latest_release_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/releases/latest",
            self.api_base, self.owner, self.repo
        )
    }
}
