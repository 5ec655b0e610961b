use std::fs;
use std::io::{BufRead, Write};
use std::path::Path;

use log::{info, warn};

use crate::config::LauncherConfig;
use crate::engine::models::{Asset, Release};
use crate::engine::state::{UpdateOutcome, Verification};
use crate::env;
use crate::error::{LauncherError, Result};
use crate::installer::Installer;
use crate::networking::{self, NetworkClient};
use crate::runtime::RuntimeBootstrapper;
use crate::storage::StorageManager;
use crate::updater::ReleaseResolver;
use crate::util::{is_affirmative, sanitize_tag};

pub mod models;
pub mod state;

/// Runs one update-then-launch cycle for a fixed configuration.
pub struct LauncherEngine<'a> {
    config: &'a LauncherConfig,
    resolver: ReleaseResolver,
    networking: NetworkClient,
}

impl<'a> LauncherEngine<'a> {
    pub fn new(config: &'a LauncherConfig) -> Self {
        Self {
            config,
            resolver: ReleaseResolver::new(),
            networking: NetworkClient::new(),
        }
    }

    /// Resolve, download, verify and install the latest release.
    /// `input` answers the confirmation prompt unless `--auto` is set.
    pub async fn update<R: BufRead>(&self, input: &mut R) -> Result<UpdateOutcome> {
        let release = self.resolver.latest(self.config).await?;
        let tag = release.tag_name.trim().to_owned();
        let payload = release.select_payload(&self.config.asset_prefix)?;

        let storage = StorageManager::new(&self.config.project_dir);
        if storage.is_current(&tag) {
            info!("update: release {tag} already installed");
            return Ok(UpdateOutcome::UpToDate { tag });
        }

        let scratch = self.scratch_dir()?;
        let archive = scratch.path().join(sanitize_tag(&payload.name));
        self.networking
            .download_to_path(&payload.browser_download_url, &archive)
            .await?;
        if self.verify(&release, payload, &archive).await? == Verification::Skipped {
            warn!(
                "update: no checksum asset for {}; installing unverified archive",
                payload.name
            );
        }

        if !self.config.auto && !confirm(input, &self.config.project_dir, &tag)? {
            println!("Aborted by user");
            return Ok(UpdateOutcome::Declined { tag });
        }

        let install = Installer::new(self.config).install_archive(
            &archive,
            &scratch.path().join("extract"),
            &tag,
        )?;
        Ok(UpdateOutcome::Installed { tag, install })
    }

    /// Locate the interpreter and run the payload; returns its exit code.
    pub fn launch(&self) -> Result<i32> {
        let bootstrapper = RuntimeBootstrapper::new(self.config);
        let runtime = bootstrapper.ensure()?;
        bootstrapper.launch(&runtime, &self.config.entry_script)
    }

    async fn verify(
        &self,
        release: &Release,
        payload: &Asset,
        archive: &Path,
    ) -> Result<Verification> {
        let Some(checksum) = release.checksum_for(payload) else {
            return Ok(Verification::Skipped);
        };
        info!("update: verifying sha256 with {}", checksum.name);
        let contents = self
            .networking
            .fetch_text(&checksum.browser_download_url)
            .await?;
        let expected = networking::parse_checksum(&contents)?;
        networking::verify_sha256(archive, &expected)?;
        info!("update: checksum OK");
        Ok(Verification::Verified)
    }

    /// Run-scoped directory next to the project so installs can rename instead of copy.
    fn scratch_dir(&self) -> Result<tempfile::TempDir> {
        let parent = env::scratch_parent(&self.config.project_dir);
        fs::create_dir_all(&parent).map_err(|e| {
            LauncherError::FilesystemFailure(format!("cannot create {}: {e}", parent.display()))
        })?;
        tempfile::Builder::new()
            .prefix(env::SCRATCH_PREFIX)
            .tempdir_in(&parent)
            .map_err(|e| {
                LauncherError::FilesystemFailure(format!("failed to create temp dir: {e}"))
            })
    }
}

fn confirm<R: BufRead>(input: &mut R, project: &Path, tag: &str) -> Result<bool> {
    print!(
        "About to update project at '{}' to release {tag}. Continue? (y/N): ",
        project.display()
    );
    let _ = std::io::stdout().flush();
    let mut answer = String::new();
    input.read_line(&mut answer).map_err(|e| {
        LauncherError::FilesystemFailure(format!("failed to read confirmation: {e}"))
    })?;
    Ok(is_affirmative(&answer))
}
