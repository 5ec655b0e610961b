use std::ffi::OsStr;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};

use log::{debug, info};

/// Runs child processes that share this process's standard streams.
#[derive(Clone, Default)]
pub struct ProcessLauncher;

impl ProcessLauncher {
    pub fn new() -> Self {
        Self
    }

    /// Spawn `program` with `args`, forward stdin/stdout/stderr and block until it exits.
    /// Returns the child's exit code.
    pub fn run_forwarding<I, S>(
        &self,
        program: &Path,
        args: I,
        cwd: Option<&Path>,
    ) -> Result<i32, String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = Command::new(program);
        cmd.args(args);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::inherit());
        cmd.stdout(Stdio::inherit());
        cmd.stderr(Stdio::inherit());

        debug!("process: spawning {:?}", cmd);
        let status = cmd
            .status()
            .map_err(|e| format!("failed to start {}: {e}", program.display()))?;
        let code = exit_code(status);
        info!("process: {} exited with {code}", program.display());
        Ok(code)
    }
}

/// Exit code of a finished child; termination by signal is reported as 1.
pub fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn reports_child_exit_codes() {
        let launcher = ProcessLauncher::new();
        let sh = Path::new("/bin/sh");
        assert_eq!(launcher.run_forwarding(sh, ["-c", "exit 0"], None).unwrap(), 0);
        assert_eq!(launcher.run_forwarding(sh, ["-c", "exit 7"], None).unwrap(), 7);
    }

    #[test]
    fn runs_in_requested_directory() {
        let dir = tempfile::tempdir().unwrap();
        let code = ProcessLauncher::new()
            .run_forwarding(
                Path::new("/bin/sh"),
                ["-c", "test -f marker.txt"],
                Some(dir.path()),
            )
            .unwrap();
        assert_eq!(code, 1);

        std::fs::write(dir.path().join("marker.txt"), "").unwrap();
        let code = ProcessLauncher::new()
            .run_forwarding(
                Path::new("/bin/sh"),
                ["-c", "test -f marker.txt"],
                Some(dir.path()),
            )
            .unwrap();
        assert_eq!(code, 0);
    }

    #[test]
    fn missing_program_is_an_error() {
        let err = ProcessLauncher::new()
            .run_forwarding(Path::new("/definitely/not/here"), ["x"], None)
            .unwrap_err();
        assert!(err.contains("failed to start"));
    }
}
