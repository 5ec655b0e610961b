use std::fmt;

use crate::installer::InstallOutcome;

/// Result of the update phase of a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The marker already names the latest release; nothing was downloaded.
    UpToDate { tag: String },
    /// A release was downloaded, verified and installed (or found current after extraction).
    Installed { tag: String, install: InstallOutcome },
    /// The user answered anything but `y` at the prompt.
    Declined { tag: String },
}

impl UpdateOutcome {
    /// Whether the payload should be started after this outcome.
    pub fn should_launch(&self) -> bool {
        !matches!(self, UpdateOutcome::Declined { .. })
    }
}

impl fmt::Display for UpdateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateOutcome::UpToDate { tag } => write!(f, "release {tag} is already installed"),
            UpdateOutcome::Installed { tag, install } => match install {
                InstallOutcome::AlreadyCurrent => write!(f, "release {tag} is already installed"),
                InstallOutcome::Fresh => write!(f, "release {tag} installed"),
                InstallOutcome::Merged => write!(f, "updated to release {tag}"),
                InstallOutcome::Swapped { backup } => write!(
                    f,
                    "updated to release {tag}; previous version kept at {}",
                    backup.display()
                ),
            },
            UpdateOutcome::Declined { tag } => write!(f, "update to {tag} declined"),
        }
    }
}

/// Whether the downloaded archive was checked against a published digest.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verification {
    Verified,
    Skipped,
}
