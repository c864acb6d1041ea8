//! Installation profiles: what a valid source tree must contain and how it
//! may be linked.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Patterns that identify a Call of Duty: Ghosts installation.
const REQUIRED_FILES: &[&str] = &["main/fileSysCheck.cfg", "zone/**.ff", "iw6mp64_ship.exe"];

/// Folders that may be linked as a whole instead of file by file.
const SYMLINKABLE_FOLDERS: &[&str] = &["APEX", "main", "zone"];

/// Libraries shipped with Windows (or Wine) that never need to be present.
const PLATFORM_LIBRARIES: &[&str] = &[
    "advapi32.dll",
    "d3d11.dll",
    "dxgi.dll",
    "gdi32.dll",
    "kernel32.dll",
    "ole32.dll",
    "powrprof.dll",
    "psapi.dll",
    "shell32.dll",
    "user32.dll",
    "winmm.dll",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Profile {
    /// Ordered glob patterns; each must match at least one file.
    pub required: Vec<String>,
    #[serde(default)]
    pub symlinkable_folders: Vec<PathBuf>,
    /// Imported libraries that are provided by the platform.
    #[serde(default)]
    pub platform_libraries: Vec<String>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            required: REQUIRED_FILES.iter().map(|s| s.to_string()).collect(),
            symlinkable_folders: SYMLINKABLE_FOLDERS.iter().map(PathBuf::from).collect(),
            platform_libraries: PLATFORM_LIBRARIES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Profile {
    /// Read a JSON profile.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::io(format!("failed to read profile {}", path.display()), e))?;
        Self::from_json(&content).map_err(|reason| Error::Profile {
            path: path.to_path_buf(),
            reason,
        })
    }

    fn from_json(content: &str) -> std::result::Result<Self, String> {
        let profile: Profile = serde_json::from_str(content).map_err(|e| e.to_string())?;
        if profile.required.is_empty() {
            return Err("no required patterns".to_string());
        }
        if let Some(abs) = profile.symlinkable_folders.iter().find(|p| p.is_absolute()) {
            return Err(format!("symlinkable folder {} is absolute", abs.display()));
        }
        Ok(profile)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Profile {
            path: PathBuf::new(),
            reason: e.to_string(),
        })
    }
}
