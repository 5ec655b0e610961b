use std::ffi::OsString;
use std::process::ExitCode;

use clap::Parser;
use env_logger::Env;
use log::info;
use tokio::runtime::Builder;

mod config;
mod engine;
mod env;
mod error;
mod installer;
mod networking;
mod process;
mod resident;
mod runtime;
mod storage;
mod updater;
mod util;

use config::{InstallStrategy, LauncherConfig};
use engine::LauncherEngine;
use error::{LauncherError, Result};
use resident::{Delegation, ResidentDelegate};

#[derive(Parser, Debug)]
#[command(
    name = "moodinho-launcher",
    author,
    version,
    about = "Keeps the Moodinho project up to date and starts it"
)]
pub struct Cli {
    /// Owner of the repository publishing releases.
    #[arg(long, default_value = config::DEFAULT_OWNER)]
    owner: String,

    /// Repository publishing releases.
    #[arg(long, default_value = config::DEFAULT_REPO)]
    repo: String,

    /// Project directory to update; empty means the resident project folder.
    #[arg(long)]
    project: Option<String>,

    /// Name prefix of the release asset to install.
    #[arg(long, default_value = config::DEFAULT_ASSET_PREFIX)]
    asset: String,

    /// Apply the update without asking for confirmation.
    #[arg(long)]
    auto: bool,

    /// Script started with the project's Python runtime, relative to the project.
    #[arg(long, default_value = config::DEFAULT_ENTRY)]
    entry: String,

    /// How a new release replaces an existing project directory.
    #[arg(long, value_enum, default_value_t = InstallStrategy::Merge)]
    strategy: InstallStrategy,

    /// Run from this binary even if it is not the resident copy.
    #[arg(long)]
    no_delegate: bool,

    #[arg(long, hide = true, default_value = config::DEFAULT_API_BASE)]
    api_base: String,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match LauncherConfig::from_cli(&cli).and_then(|config| run(&config)) {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(err) => {
            eprintln!("{err}");
            ExitCode::from(u8::try_from(err.exit_code()).unwrap_or(1))
        }
    }
}

fn run(config: &LauncherConfig) -> Result<i32> {
    if config.delegate {
        let args: Vec<OsString> = std::env::args_os().skip(1).collect();
        if let Delegation::Delegated { exit_code } =
            ResidentDelegate::from_env()?.delegate(&args)?
        {
            return Ok(exit_code);
        }
    }

    let rt = Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| LauncherError::FilesystemFailure(format!("failed to start runtime: {e}")))?;
    let engine = LauncherEngine::new(config);
    let outcome = rt.block_on(engine.update(&mut std::io::stdin().lock()))?;
    info!("launcher: {outcome}");
    if !outcome.should_launch() {
        return Ok(0);
    }

    info!("launcher: starting project from {}", config.project_dir.display());
    engine.launch()
}
