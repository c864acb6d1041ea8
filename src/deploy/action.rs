//! Per-path deployment decisions.

use std::fmt;
use std::path::{Path, PathBuf};

/// What to do with one deployment unit in the target tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentAction {
    /// Link the unit (a file or a promoted folder) to its source.
    Symlink(PathBuf),
    /// Copy the file and chmod it to the given mode.
    Copy(PathBuf, u32),
}

impl DeploymentAction {
    pub fn path(&self) -> &Path {
        match self {
            DeploymentAction::Symlink(path) | DeploymentAction::Copy(path, _) => path,
        }
    }
}

impl fmt::Display for DeploymentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeploymentAction::Symlink(path) => write!(f, "link {}", path.display()),
            DeploymentAction::Copy(path, mode) => write!(f, "copy {} ({:o})", path.display(), mode),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The unit is already linked to the right source.
    Skip(PathBuf),
    Act(DeploymentAction),
}
