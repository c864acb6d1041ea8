//! Configuration management for zeropack.
//!
//! Command-line values win over environment variables (which may come from a
//! `.env` file loaded at startup), which win over defaults.

use std::path::PathBuf;

use tracing::debug;

use crate::error::{Error, Result};
use crate::profile::Profile;

/// Overrides the target directory when none is given on the command line.
pub const TARGET_ENV: &str = "ZEROPACK_TARGET";
/// Overrides the profile file when none is given on the command line.
pub const PROFILE_ENV: &str = "ZEROPACK_PROFILE";

const PROFILE_FILE: &str = "zeropack/profile.json";

/// Resolved run configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Installation to validate and copy from.
    pub source: PathBuf,
    /// Directory the minimal copy is staged into.
    pub target: PathBuf,
    pub profile: Profile,
    /// Where the profile was read from; `None` for the built-in one.
    pub profile_path: Option<PathBuf>,
}

impl Config {
    pub fn load(source: PathBuf, target: Option<PathBuf>, profile: Option<PathBuf>) -> Result<Self> {
        if !source.is_dir() {
            return Err(Error::Config(format!(
                "source directory {} does not exist or is not a directory",
                source.display()
            )));
        }

        let target = match target.or_else(|| env_path(TARGET_ENV)) {
            Some(target) => target,
            None => std::env::current_dir().map_err(|_| {
                Error::Config(
                    "No target directory was provided and the current working directory could not be read. \
                     You will need to define a target directory."
                        .to_string(),
                )
            })?,
        };

        let (profile, profile_path) = Self::resolve_profile(profile)?;

        Ok(Self {
            source,
            target,
            profile,
            profile_path,
        })
    }

    /// Pick the profile: explicit path, then `ZEROPACK_PROFILE`, then the
    /// user's config directory, then the built-in profile.
    pub fn resolve_profile(explicit: Option<PathBuf>) -> Result<(Profile, Option<PathBuf>)> {
        let path = explicit
            .or_else(|| env_path(PROFILE_ENV))
            .or_else(user_profile_path);
        let profile = match &path {
            Some(path) => Profile::load(path)?,
            None => Profile::default(),
        };
        Ok((profile, path))
    }

    pub fn log(&self) {
        debug!(source = %self.source.display(), target = %self.target.display(), "configuration");
        match &self.profile_path {
            Some(path) => debug!(profile = %path.display(), "using profile file"),
            None => debug!("using built-in profile"),
        }
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var_os(key)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

/// `<config dir>/zeropack/profile.json`, if the user has one.
fn user_profile_path() -> Option<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join(PROFILE_FILE))
        .filter(|path| path.is_file())
}
