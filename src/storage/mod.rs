use std::fs;
use std::path::{Path, PathBuf};

use crate::engine::models::LocalState;
use crate::env;

/// Reads and writes the installed-release marker of one project directory.
#[derive(Clone, Debug)]
pub struct StorageManager {
    marker: PathBuf,
}

impl StorageManager {
    pub fn new(project_dir: &Path) -> Self {
        Self {
            marker: env::marker_path(project_dir),
        }
    }

    /// `None` when nothing was ever installed (or the marker is empty/unreadable).
    pub fn read_local_state(&self) -> Option<LocalState> {
        fs::read(&self.marker).ok().and_then(|bytes| {
            let tag = String::from_utf8_lossy(&bytes).trim().to_owned();
            (!tag.is_empty()).then_some(LocalState { tag })
        })
    }

    pub fn is_current(&self, tag: &str) -> bool {
        self.read_local_state()
            .is_some_and(|state| state.tag == tag.trim())
    }

    pub fn write_local_state(&self, state: &LocalState) -> Result<(), String> {
        if let Some(parent) = self.marker.parent() {
            fs::create_dir_all(parent).map_err(|e| format!("unable to create project dir: {e}"))?;
        }
        fs::write(&self.marker, format!("{}\n", state.tag))
            .map_err(|e| format!("unable to persist release tag: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_or_blank_marker_means_never_installed() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path());
        assert!(storage.read_local_state().is_none());

        fs::write(env::marker_path(dir.path()), "  \n").unwrap();
        assert!(storage.read_local_state().is_none());
        assert!(!storage.is_current("v1.0.0"));
    }

    #[test]
    fn round_trips_tag_with_trailing_newline() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("project");
        let storage = StorageManager::new(&project);

        storage
            .write_local_state(&LocalState { tag: "v2.0.0".into() })
            .unwrap();
        assert_eq!(
            fs::read_to_string(project.join(env::RELEASE_MARKER)).unwrap(),
            "v2.0.0\n"
        );
        assert!(storage.is_current("v2.0.0"));
        assert!(!storage.is_current("v2.0.1"));
    }
}
