use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, info, warn};

use crate::config::LauncherConfig;
use crate::env;
use crate::error::{LauncherError, Result};
use crate::installer::transfer::exists;
use crate::process::ProcessLauncher;

/// Major version of the interpreter the payload is written for.
pub const REQUIRED_MAJOR: u32 = 3;
const REQUIREMENTS_FILE: &str = "requirements.txt";

/// A system command that may provide the interpreter, e.g. `py -3`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl Candidate {
    fn new(program: impl Into<PathBuf>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|arg| (*arg).to_owned()).collect(),
        }
    }
}

/// Platform-ordered list of commands probed when no environment interpreter exists.
pub fn system_candidates() -> Vec<Candidate> {
    if cfg!(target_os = "windows") {
        vec![
            Candidate::new("py", &["-3"]),
            Candidate::new("python", &[]),
            Candidate::new("python3", &[]),
        ]
    } else {
        vec![Candidate::new("python3", &[]), Candidate::new("python", &[])]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuntimeSource {
    /// Interpreter inside the project's runtime environment.
    Environment,
    /// Interpreter found on the system.
    System,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Runtime {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub source: RuntimeSource,
}

impl Runtime {
    fn environment(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            source: RuntimeSource::Environment,
        }
    }

    fn system(candidate: &Candidate) -> Self {
        Self {
            program: candidate.program.clone(),
            args: candidate.args.clone(),
            source: RuntimeSource::System,
        }
    }
}

/// Finds or provisions the interpreter and starts the payload with it.
pub struct RuntimeBootstrapper {
    project: PathBuf,
    candidates: Vec<Candidate>,
    process: ProcessLauncher,
}

impl RuntimeBootstrapper {
    pub fn new(config: &LauncherConfig) -> Self {
        Self::for_project(&config.project_dir, system_candidates())
    }

    pub fn for_project(project: &Path, candidates: Vec<Candidate>) -> Self {
        Self {
            project: project.to_path_buf(),
            candidates,
            process: ProcessLauncher::new(),
        }
    }

    /// Prefer the environment interpreter, then a system one; create the environment when
    /// there is none yet.
    pub fn ensure(&self) -> Result<Runtime> {
        let env_python = env::env_interpreter(&self.project);
        if env_python.exists() {
            debug!("runtime: using environment at {}", env_python.display());
            return Ok(Runtime::environment(env_python));
        }

        let system = self.probe_system();
        let venv = env::protected_dir(&self.project);
        if let Some(system) = &system
            && !exists(&venv)
        {
            info!("runtime: creating virtual environment at {}", venv.display());
            match self.create_environment(system, &venv) {
                Ok(()) if env_python.exists() => {
                    let runtime = Runtime::environment(env_python);
                    self.sync_requirements(&runtime);
                    return Ok(runtime);
                }
                Ok(()) => warn!(
                    "runtime: environment created but {} is missing; using system runtime",
                    env_python.display()
                ),
                Err(err) => warn!("runtime: {err}; using system runtime"),
            }
        }

        system.ok_or_else(|| {
            LauncherError::RuntimeNotFound(format!(
                "tried {}",
                self.candidates
                    .iter()
                    .map(|c| c.program.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        })
    }

    /// Run the entry script from the project root and return its exit code.
    pub fn launch(&self, runtime: &Runtime, entry: &Path) -> Result<i32> {
        if !self.project.join(entry).is_file() {
            return Err(LauncherError::PayloadLaunchFailed(format!(
                "entry script {} not found in {}",
                entry.display(),
                self.project.display()
            )));
        }
        info!(
            "runtime: starting {} with {}",
            entry.display(),
            runtime.program.display()
        );
        let mut args: Vec<&OsStr> = runtime.args.iter().map(OsStr::new).collect();
        args.push(entry.as_os_str());
        self.process
            .run_forwarding(&runtime.program, args, Some(&self.project))
            .map_err(LauncherError::PayloadLaunchFailed)
    }

    fn probe_system(&self) -> Option<Runtime> {
        self.candidates.iter().find_map(|candidate| {
            match probe_major_version(candidate) {
                Some(major) if major == REQUIRED_MAJOR => {
                    info!("runtime: found system runtime {}", candidate.program.display());
                    Some(Runtime::system(candidate))
                }
                Some(major) => {
                    debug!(
                        "runtime: {} reports major version {major}; skipping",
                        candidate.program.display()
                    );
                    None
                }
                None => None,
            }
        })
    }

    fn create_environment(&self, system: &Runtime, venv: &Path) -> Result<(), String> {
        let mut args: Vec<&OsStr> = system.args.iter().map(OsStr::new).collect();
        args.push(OsStr::new("-m"));
        args.push(OsStr::new("venv"));
        args.push(venv.as_os_str());
        match self
            .process
            .run_forwarding(&system.program, args, Some(&self.project))?
        {
            0 => Ok(()),
            code => Err(format!("venv creation exited with {code}")),
        }
    }

    /// Install the project's requirements into a freshly created environment.
    fn sync_requirements(&self, runtime: &Runtime) {
        if !self.project.join(REQUIREMENTS_FILE).is_file() {
            return;
        }
        info!("runtime: installing {REQUIREMENTS_FILE}");
        match self.process.run_forwarding(
            &runtime.program,
            ["-m", "pip", "install", "-r", REQUIREMENTS_FILE],
            Some(&self.project),
        ) {
            Ok(0) => {}
            Ok(code) => warn!("runtime: pip install exited with {code}"),
            Err(err) => warn!("runtime: {err}"),
        }
    }
}

fn probe_major_version(candidate: &Candidate) -> Option<u32> {
    let output = Command::new(&candidate.program)
        .args(&candidate.args)
        .arg("--version")
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    // Older interpreters print the version on stderr.
    let text = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    parse_major_version(&text)
}

/// Major version from `--version` output such as `Python 3.11.4`.
pub fn parse_major_version(output: &str) -> Option<u32> {
    let mut tokens = output.split_whitespace();
    tokens.find(|token| token.eq_ignore_ascii_case("python"))?;
    tokens.next()?.split('.').next()?.parse().ok()
}
