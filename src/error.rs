use thiserror::Error;

/// Every way an update or launch can fail. Only `main` turns one of these into an exit code.
#[derive(Debug, Error)]
pub enum LauncherError {
    #[error("release registry unavailable: {0}")]
    RegistryUnavailable(String),

    #[error("failed to parse release manifest: {0}")]
    MalformedManifest(String),

    #[error("no asset with prefix '{0}' found in release")]
    NoMatchingAsset(String),

    #[error("download failed: {0}")]
    DownloadFailed(String),

    #[error("checksum verification failed: {0}")]
    IntegrityViolation(String),

    #[error("failed to extract archive: {0}")]
    CorruptArchive(String),

    #[error("filesystem error: {0}")]
    FilesystemFailure(String),

    #[error("no usable Python runtime found: {0}")]
    RuntimeNotFound(String),

    #[error("failed to start project: {0}")]
    PayloadLaunchFailed(String),
}

impl LauncherError {
    /// Process exit code reported for this failure.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        1
    }
}

pub type Result<T, E = LauncherError> = std::result::Result<T, E>;
