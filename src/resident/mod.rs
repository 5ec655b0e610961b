use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::env;
use crate::error::{LauncherError, Result};
use crate::process::ProcessLauncher;
use crate::util::paths_match;

const PROJECT_FLAG: &str = "--project";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delegation {
    /// Already running from the resident copy; carry on in this process.
    NotNeeded,
    /// The resident copy ran to completion in a child process.
    Delegated { exit_code: i32 },
}

/// Keeps one durable copy of the launcher and re-runs from it.
pub struct ResidentDelegate {
    current_exe: PathBuf,
    resident_exe: PathBuf,
    resident_project: PathBuf,
    process: ProcessLauncher,
}

impl ResidentDelegate {
    pub fn from_env() -> Result<Self> {
        let current_exe = std::env::current_exe().map_err(|e| {
            LauncherError::FilesystemFailure(format!("cannot resolve running executable: {e}"))
        })?;
        let current_exe = fs::canonicalize(&current_exe).unwrap_or(current_exe);
        Ok(Self::new(
            current_exe,
            env::resident_exe_path(),
            env::resident_project_dir(),
        ))
    }

    pub fn new(current_exe: PathBuf, resident_exe: PathBuf, resident_project: PathBuf) -> Self {
        Self {
            current_exe,
            resident_exe,
            resident_project,
            process: ProcessLauncher::new(),
        }
    }

    pub fn is_resident(&self) -> bool {
        if paths_match(&self.current_exe, &self.resident_exe) {
            return true;
        }
        // The resident path may itself reach us through a symlinked documents folder.
        fs::canonicalize(&self.resident_exe)
            .map(|resolved| paths_match(&self.current_exe, &resolved))
            .unwrap_or(false)
    }

    /// Re-run from the resident copy unless this process already is it.
    /// `args` excludes the program name.
    pub fn delegate(&self, args: &[OsString]) -> Result<Delegation> {
        if self.is_resident() {
            debug!("resident: running from {}", self.resident_exe.display());
            return Ok(Delegation::NotNeeded);
        }

        self.install_copy()?;
        let child_args = delegated_args(args, &self.resident_project);
        info!(
            "resident: re-running from {}",
            self.resident_exe.display()
        );
        let exit_code = self
            .process
            .run_forwarding(&self.resident_exe, &child_args, None)
            .map_err(LauncherError::PayloadLaunchFailed)?;
        Ok(Delegation::Delegated { exit_code })
    }

    /// Copy the running binary over the resident one and make it executable.
    pub fn install_copy(&self) -> Result<()> {
        let fail = |what: &str, e: std::io::Error| {
            LauncherError::FilesystemFailure(format!(
                "{what} {}: {e}",
                self.resident_exe.display()
            ))
        };
        if let Some(parent) = self.resident_exe.parent() {
            fs::create_dir_all(parent).map_err(|e| fail("cannot create directory for", e))?;
        }

        // Write beside the target and rename over it so a half-written binary never
        // sits at the resident path.
        let staged = self.resident_exe.with_extension(staged_extension(&self.resident_exe));
        fs::copy(&self.current_exe, &staged).map_err(|e| fail("cannot copy launcher to", e))?;
        set_executable(&staged).map_err(|e| fail("cannot mark executable", e))?;
        if let Err(err) = fs::rename(&staged, &self.resident_exe) {
            let _ = fs::remove_file(&staged);
            return Err(fail("cannot replace", err));
        }
        debug!(
            "resident: copied {} to {}",
            self.current_exe.display(),
            self.resident_exe.display()
        );
        Ok(())
    }
}

/// Original arguments plus `--project <dir>` when the caller gave none.
pub fn delegated_args(args: &[OsString], project: &Path) -> Vec<OsString> {
    let mut out = args.to_vec();
    if !has_project_arg(args) {
        out.push(OsString::from(PROJECT_FLAG));
        out.push(project.as_os_str().to_owned());
    }
    out
}

fn has_project_arg(args: &[OsString]) -> bool {
    args.iter().map(|arg| arg.to_string_lossy()).any(|arg| {
        arg == PROJECT_FLAG || arg.starts_with(&format!("{PROJECT_FLAG}="))
    })
}

fn staged_extension(path: &Path) -> String {
    match path.extension().and_then(OsStr::to_str) {
        Some(ext) => format!("{ext}.tmp"),
        None => "tmp".to_owned(),
    }
}

#[cfg(unix)]
fn set_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn os(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    #[test]
    fn injects_project_only_when_missing() {
        let project = Path::new("/docs/Moodinho/project");
        assert_eq!(
            delegated_args(&os(&["--auto"]), project),
            os(&["--auto", "--project", "/docs/Moodinho/project"])
        );
        assert_eq!(
            delegated_args(&os(&["--project", "/srv/app"]), project),
            os(&["--project", "/srv/app"])
        );
        assert_eq!(
            delegated_args(&os(&["--project=/srv/app", "--auto"]), project),
            os(&["--project=/srv/app", "--auto"])
        );
    }

    #[test]
    fn resident_check_ignores_case() {
        let delegate = ResidentDelegate::new(
            PathBuf::from("/Users/Ana/Documents/Moodinho/moodinho-launcher"),
            PathBuf::from("/users/ana/documents/moodinho/Moodinho-Launcher"),
            PathBuf::from("/users/ana/documents/moodinho/project"),
        );
        assert!(delegate.is_resident());
        assert_eq!(delegate.delegate(&[]).unwrap(), Delegation::NotNeeded);
    }

    #[test]
    fn resident_copy_tracks_latest_invoked_binary() {
        let dir = tempfile::tempdir().unwrap();
        let resident = dir.path().join("Moodinho").join("moodinho-launcher");
        for (name, bytes) in [("first", "build one"), ("second", "build two")] {
            let exe = dir.path().join("Downloads").join(name);
            fs::create_dir_all(exe.parent().unwrap()).unwrap();
            fs::write(&exe, bytes).unwrap();

            let delegate =
                ResidentDelegate::new(exe, resident.clone(), dir.path().join("project"));
            assert!(!delegate.is_resident());
            delegate.install_copy().unwrap();
        }
        assert_eq!(fs::read_to_string(&resident).unwrap(), "build two");
        assert!(!resident.with_extension("tmp").exists());
    }

    #[cfg(unix)]
    #[test]
    fn delegates_to_resident_copy_and_returns_its_exit_code() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("Downloads").join("moodinho-launcher");
        fs::create_dir_all(exe.parent().unwrap()).unwrap();
        let log = dir.path().join("args.log");
        fs::write(
            &exe,
            format!("#!/bin/sh\necho \"$@\" > '{}'\nexit 4\n", log.display()),
        )
        .unwrap();
        fs::set_permissions(&exe, fs::Permissions::from_mode(0o644)).unwrap();

        let resident = dir.path().join("Moodinho").join("moodinho-launcher");
        let project = dir.path().join("Moodinho").join("project");
        let delegate = ResidentDelegate::new(exe, resident.clone(), project.clone());

        let outcome = delegate.delegate(&os(&["--auto"])).unwrap();

        assert_eq!(outcome, Delegation::Delegated { exit_code: 4 });
        let mode = fs::metadata(&resident).unwrap().permissions().mode();
        assert_eq!(mode & 0o111, 0o111);
        assert_eq!(
            fs::read_to_string(&log).unwrap().trim(),
            format!("--auto --project {}", project.display())
        );
    }
}
