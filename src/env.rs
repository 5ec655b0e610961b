use std::env;
use std::io;
use std::path::{self, Component, Path, PathBuf};

/// Folder under the user's documents directory that holds the resident install.
pub const RESIDENT_DIR_NAME: &str = "Moodinho";
/// Name of the resident launcher binary, without the platform suffix.
pub const LAUNCHER_STEM: &str = "moodinho-launcher";
/// Marker file recording the installed release tag.
pub const RELEASE_MARKER: &str = ".moodinho_release";
/// Runtime environment directory preserved across updates.
pub const PROTECTED_SUBTREE: &str = ".venv";
/// Name prefix of the run-scoped scratch directory created next to the project.
pub const SCRATCH_PREFIX: &str = ".moodinho-update-";

/// Returns the per-user documents directory (falls back to `~/Documents`, then `.`).
pub fn documents_dir() -> PathBuf {
    dirs::document_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Documents")))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Root of the resident installation.
pub fn resident_root() -> PathBuf {
    documents_dir().join(RESIDENT_DIR_NAME)
}

pub fn resident_exe_path() -> PathBuf {
    resident_root().join(format!("{LAUNCHER_STEM}{}", env::consts::EXE_SUFFIX))
}

/// Default install target when `--project` is empty.
pub fn resident_project_dir() -> PathBuf {
    resident_root().join("project")
}

/// Absolute form of `path` with `.` and `..` resolved lexically, so `parent()` and
/// `file_name()` name the real directory (`.` has neither).
pub fn absolute_path(path: &Path) -> io::Result<PathBuf> {
    let mut resolved = PathBuf::new();
    for component in path::absolute(path)?.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            other => resolved.push(other),
        }
    }
    Ok(resolved)
}

pub fn marker_path(project: &Path) -> PathBuf {
    project.join(RELEASE_MARKER)
}

pub fn protected_dir(project: &Path) -> PathBuf {
    project.join(PROTECTED_SUBTREE)
}

/// Sibling of the project directory used to hold the runtime environment during a merge.
pub fn holding_path(project: &Path) -> PathBuf {
    sibling_with_name(project, |name| format!(".{name}-venv-hold"))
}

/// `<project>-bak-<tag>` with path separators in the tag flattened.
pub fn backup_path(project: &Path, tag: &str) -> PathBuf {
    let tag = crate::util::sanitize_tag(tag);
    sibling_with_name(project, |name| format!("{name}-bak-{tag}"))
}

/// Directory that receives the run-scoped scratch space (always next to the project).
pub fn scratch_parent(project: &Path) -> PathBuf {
    match project.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn sibling_with_name(project: &Path, make: impl FnOnce(&str) -> String) -> PathBuf {
    let name = project
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "project".to_owned());
    scratch_parent(project).join(make(&name))
}

/// Interpreter path inside the runtime environment for this platform.
pub fn env_interpreter(project: &Path) -> PathBuf {
    let venv = protected_dir(project);
    if cfg!(target_os = "windows") {
        venv.join("Scripts").join("python.exe")
    } else {
        venv.join("bin").join("python")
    }
}
