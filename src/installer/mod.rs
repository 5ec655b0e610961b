use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::config::{InstallStrategy, LauncherConfig};
use crate::engine::models::LocalState;
use crate::env;
use crate::error::{LauncherError, Result};
use crate::storage::StorageManager;

pub mod archive;
pub mod transfer;

use transfer::{exists, move_entry, remove_path, replace_entry};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InstallOutcome {
    /// The marker already names this release; nothing was touched.
    AlreadyCurrent,
    /// The project directory did not exist and the release was moved into place.
    Fresh,
    /// Existing contents were replaced entry by entry around the runtime environment.
    Merged,
    /// The old project was renamed to a backup and the release moved in.
    Swapped { backup: PathBuf },
}

/// Applies an extracted release to the project directory.
pub struct Installer {
    project: PathBuf,
    strategy: InstallStrategy,
    storage: StorageManager,
}

impl Installer {
    pub fn new(config: &LauncherConfig) -> Self {
        Self::for_project(&config.project_dir, config.strategy)
    }

    pub fn for_project(project: &Path, strategy: InstallStrategy) -> Self {
        let project = env::absolute_path(project).unwrap_or_else(|err| {
            warn!("install: cannot resolve {}: {err}", project.display());
            project.to_path_buf()
        });
        Self {
            storage: StorageManager::new(&project),
            project,
            strategy,
        }
    }

    /// Extract `archive` into `staging` (which must not be inside the project) and install it.
    pub fn install_archive(
        &self,
        archive: &Path,
        staging: &Path,
        tag: &str,
    ) -> Result<InstallOutcome> {
        archive::extract_zip(archive, staging).map_err(LauncherError::CorruptArchive)?;
        self.install_staged(staging, tag)
    }

    /// Install an already extracted release and record `tag` on success.
    pub fn install_staged(&self, staging: &Path, tag: &str) -> Result<InstallOutcome> {
        if self.storage.is_current(tag) {
            info!("install: release {tag} already installed; skipping");
            return Ok(InstallOutcome::AlreadyCurrent);
        }

        let outcome = if !exists(&self.project) {
            self.install_fresh(staging)?
        } else {
            match self.strategy {
                InstallStrategy::Merge => self.merge_install(staging)?,
                InstallStrategy::Swap => self.swap_install(staging, tag)?,
            }
        };

        // Bookkeeping only: the release is applied even if this write fails.
        if let Err(err) = self.storage.write_local_state(&LocalState {
            tag: tag.to_owned(),
        }) {
            warn!("install: {err}");
        }
        info!("install: release {tag} applied to {}", self.project.display());
        Ok(outcome)
    }

    fn install_fresh(&self, staging: &Path) -> Result<InstallOutcome> {
        info!("install: creating {}", self.project.display());
        if let Some(parent) = self.project.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| {
                LauncherError::FilesystemFailure(format!("failed to create parent dir: {e}"))
            })?;
        }
        move_entry(staging, &self.project).map_err(LauncherError::FilesystemFailure)?;
        Ok(InstallOutcome::Fresh)
    }

    fn merge_install(&self, staging: &Path) -> Result<InstallOutcome> {
        let protected = env::protected_dir(&self.project);
        let hold = env::holding_path(&self.project);

        let held = if exists(&protected) {
            if exists(&hold) {
                // Either copy may be the partial one; keep both for the user to resolve.
                return Err(LauncherError::FilesystemFailure(format!(
                    "runtime environment exists both at {} and at {} from an interrupted update; \
                     remove the incomplete one and retry",
                    protected.display(),
                    hold.display()
                )));
            }
            debug!("install: moving runtime environment to {}", hold.display());
            move_entry(&protected, &hold).map_err(LauncherError::FilesystemFailure)?;
            true
        } else if exists(&hold) {
            warn!(
                "install: recovering runtime environment left at {} by an interrupted update",
                hold.display()
            );
            true
        } else {
            false
        };

        let replaced = self
            .clear_project(&hold)
            .and_then(|()| self.move_staged(staging));
        let restored = if held {
            replace_entry(&hold, &protected)
        } else {
            Ok(())
        };

        match (replaced, restored) {
            (Ok(()), Ok(())) => Ok(InstallOutcome::Merged),
            (Err(err), Ok(())) => Err(LauncherError::FilesystemFailure(format!(
                "{err} (runtime environment restored)"
            ))),
            (Err(err), Err(restore_err)) => Err(LauncherError::FilesystemFailure(format!(
                "{err}; runtime environment left at {}: {restore_err}",
                hold.display()
            ))),
            (Ok(()), Err(restore_err)) => Err(LauncherError::FilesystemFailure(format!(
                "failed to restore runtime environment, it is still at {}: {restore_err}",
                hold.display()
            ))),
        }
    }

    /// Remove everything in the project except the runtime environment, the holding
    /// dir and any update scratch space.
    fn clear_project(&self, hold: &Path) -> Result<(), String> {
        let entries = fs::read_dir(&self.project)
            .map_err(|e| format!("failed to read {}: {e}", self.project.display()))?;
        for entry in entries {
            let entry = entry.map_err(|e| format!("failed to read dir entry: {e}"))?;
            let path = entry.path();
            let name = entry.file_name();
            if name == env::PROTECTED_SUBTREE
                || path == hold
                || name.to_string_lossy().starts_with(env::SCRATCH_PREFIX)
            {
                debug!("install: keeping {}", path.display());
                continue;
            }
            remove_path(&path).map_err(|e| format!("failed to remove {}: {e}", path.display()))?;
        }
        Ok(())
    }

    fn move_staged(&self, staging: &Path) -> Result<(), String> {
        let entries = fs::read_dir(staging)
            .map_err(|e| format!("failed to read staging dir {}: {e}", staging.display()))?;
        for entry in entries {
            let entry = entry.map_err(|e| format!("failed to read staging entry: {e}"))?;
            replace_entry(&entry.path(), &self.project.join(entry.file_name()))?;
        }
        Ok(())
    }

    fn swap_install(&self, staging: &Path, tag: &str) -> Result<InstallOutcome> {
        if self.storage.read_local_state().is_none() {
            warn!(
                "install: {} has no release marker; merging instead of swapping",
                self.project.display()
            );
            return self.merge_install(staging);
        }

        let backup = env::backup_path(&self.project, tag);
        info!("install: creating backup {}", backup.display());
        if exists(&backup) {
            remove_path(&backup).map_err(|e| {
                LauncherError::FilesystemFailure(format!("failed removing old backup: {e}"))
            })?;
        }
        fs::rename(&self.project, &backup).map_err(|e| {
            LauncherError::FilesystemFailure(format!("failed to create backup: {e}"))
        })?;

        if let Err(err) = move_entry(staging, &self.project) {
            warn!("install: {err}; rolling back");
            if exists(&self.project)
                && let Err(cleanup) = remove_path(&self.project)
            {
                warn!(
                    "install: failed to remove partial release at {}: {cleanup}",
                    self.project.display()
                );
            }
            return Err(match fs::rename(&backup, &self.project) {
                Ok(()) => LauncherError::FilesystemFailure(format!(
                    "failed to move new project into place: {err} (previous install restored)"
                )),
                Err(rollback) => LauncherError::FilesystemFailure(format!(
                    "failed to move new project into place: {err}; rollback failed, previous install is at {}: {rollback}",
                    backup.display()
                )),
            });
        }

        let old_env = env::protected_dir(&backup);
        if exists(&old_env) {
            replace_entry(&old_env, &env::protected_dir(&self.project)).map_err(|e| {
                LauncherError::FilesystemFailure(format!(
                    "failed to carry runtime environment over, it is still at {}: {e}",
                    old_env.display()
                ))
            })?;
        }
        info!("install: previous version kept at {}", backup.display());
        Ok(InstallOutcome::Swapped { backup })
    }
}
