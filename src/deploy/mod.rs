//! Materialize verified paths into the target tree.
//!
//! In symlink mode each path is linked to its source, promoted to a whole
//! folder where the profile allows it. A failed link falls back to a copy
//! unless the caller asked to abort instead. Copies never keep execute bits.

mod action;

pub use action::{Decision, DeploymentAction};

use std::collections::HashSet;
use std::fmt;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::scope::PathScope;

/// Owner read/write/execute, added to directories created in the target.
const OWNER_RWX: u32 = 0o700;
/// Everything but the execute bits.
const NON_EXEC: u32 = 0o666;

#[derive(Debug, Clone, Copy, Default)]
pub struct DeployOptions {
    /// Link files instead of copying them.
    pub symlink: bool,
    /// Abort instead of copying when a link cannot be created.
    pub fail_on_symlink_error: bool,
    /// Log decisions without touching the target.
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploySummary {
    pub total_bytes: u64,
    pub linked: usize,
    pub copied: usize,
    pub skipped: usize,
    /// Links that failed and were copied instead.
    pub fallbacks: usize,
}

impl fmt::Display for DeploySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} linked, {} copied, {} already in place ({})",
            self.linked,
            self.copied,
            self.skipped,
            format_size(self.total_bytes)
        )
    }
}

fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut size = bytes as f64;
    let mut unit = "B";
    for next in UNITS {
        if size < 1024.0 {
            break;
        }
        size /= 1024.0;
        unit = next;
    }
    format!("{:.1} {}", size, unit)
}

pub struct Deployer<'a> {
    source: &'a PathScope,
    target: &'a PathScope,
    symlinkable_folders: &'a [PathBuf],
}

impl<'a> Deployer<'a> {
    pub fn new(
        source: &'a PathScope,
        target: &'a PathScope,
        symlinkable_folders: &'a [PathBuf],
    ) -> Self {
        Self {
            source,
            target,
            symlinkable_folders,
        }
    }

    /// Deploy every verified path in order. The first fatal error stops the
    /// run; nothing already deployed is rolled back.
    pub fn deploy(&self, verified: &[PathBuf], options: &DeployOptions) -> Result<DeploySummary> {
        let mut summary = DeploySummary::default();
        let mut linked_units = HashSet::new();

        for rel in verified {
            let decision = match self.plan(rel, options)? {
                Decision::Act(DeploymentAction::Symlink(unit)) if linked_units.contains(&unit) => {
                    Decision::Skip(unit)
                }
                decision => decision,
            };
            if let Decision::Act(action) = &decision {
                debug!("planned: {}", action);
            }

            match decision {
                Decision::Skip(unit) => {
                    debug!(unit = %unit.display(), "already linked");
                    summary.skipped += 1;
                    // A promoted folder covers many verified paths; size it once.
                    let size = self.linked_size(&unit, options.dry_run);
                    if linked_units.insert(unit) {
                        summary.total_bytes += size;
                    }
                }
                Decision::Act(DeploymentAction::Symlink(unit)) => {
                    if self.link(&unit, options, &mut summary)? {
                        linked_units.insert(unit);
                    } else {
                        let action = self.copy_action(rel)?;
                        self.apply_copy(&action, options, &mut summary)?;
                    }
                }
                Decision::Act(action) => self.apply_copy(&action, options, &mut summary)?,
            }
        }

        Ok(summary)
    }

    /// Decide how `rel` would be deployed given the current target tree.
    pub fn plan(&self, rel: &Path, options: &DeployOptions) -> Result<Decision> {
        if !options.symlink {
            return Ok(Decision::Act(self.copy_action(rel)?));
        }

        let unit = self.link_unit(rel)?;
        if self.is_linked(&unit)? {
            return Ok(Decision::Skip(unit));
        }
        Ok(Decision::Act(DeploymentAction::Symlink(unit)))
    }

    /// The symlinkable folder `rel` lives in, if any.
    pub fn promotion(&self, rel: &Path) -> Option<&'a Path> {
        self.symlinkable_folders
            .iter()
            .find(|folder| rel.starts_with(folder))
            .map(PathBuf::as_path)
    }

    /// The unit to link for `rel`: its symlinkable folder, unless the target
    /// already holds a real directory there.
    fn link_unit(&self, rel: &Path) -> Result<PathBuf> {
        let Some(folder) = self.promotion(rel) else {
            return Ok(rel.to_path_buf());
        };
        match self.target.symlink_metadata(folder) {
            Ok(meta) if meta.is_dir() => {
                debug!(folder = %folder.display(), "target has a real directory, linking file instead");
                Ok(rel.to_path_buf())
            }
            Ok(_) => Ok(folder.to_path_buf()),
            Err(e) if e.is_not_found() => Ok(folder.to_path_buf()),
            Err(e) => Err(e),
        }
    }

    fn is_linked(&self, unit: &Path) -> Result<bool> {
        let expected = self.source.resolve(unit)?;
        Ok(self
            .target
            .read_link(unit)
            .map(|dest| dest == expected)
            .unwrap_or(false))
    }

    fn linked_size(&self, unit: &Path, dry_run: bool) -> u64 {
        let scope = if dry_run { self.source } else { self.target };
        scope.metadata(unit).map(|m| m.len()).unwrap_or(0)
    }

    /// Create parent directories of `rel` in the target, tolerating ones
    /// that already exist.
    fn ensure_parent(&self, rel: &Path, source_mode: u32) -> Result<()> {
        let parent = rel.parent().unwrap_or(Path::new(""));
        match self.target.mkdir_all(parent, (source_mode & 0o7777) | OWNER_RWX) {
            Err(e) if e.io_kind() != Some(io::ErrorKind::AlreadyExists) => Err(e),
            _ => Ok(()),
        }
    }

    /// Try to link `unit`. Returns `Ok(false)` when the link failed and the
    /// caller should copy instead.
    fn link(&self, unit: &Path, options: &DeployOptions, summary: &mut DeploySummary) -> Result<bool> {
        if options.dry_run {
            info!("Would link: {}", unit.display());
            summary.linked += 1;
            summary.total_bytes += self.linked_size(unit, true);
            return Ok(true);
        }

        let meta = self.source.metadata(unit)?;
        self.ensure_parent(unit, meta.permissions().mode())?;

        info!("Linking: {}", unit.display());
        match self.source.symlink_into(unit, self.target) {
            Ok(()) => {
                summary.linked += 1;
                summary.total_bytes += self.linked_size(unit, false);
                Ok(true)
            }
            Err(e) if options.fail_on_symlink_error => Err(e),
            Err(e) => {
                warn!("Failed to create symlink, will now copy instead (reason was: {})", e);
                summary.fallbacks += 1;
                Ok(false)
            }
        }
    }

    fn copy_action(&self, rel: &Path) -> Result<DeploymentAction> {
        let mode = self.source.metadata(rel)?.permissions().mode() & NON_EXEC;
        Ok(DeploymentAction::Copy(rel.to_path_buf(), mode))
    }

    fn apply_copy(
        &self,
        action: &DeploymentAction,
        options: &DeployOptions,
        summary: &mut DeploySummary,
    ) -> Result<()> {
        let DeploymentAction::Copy(rel, mode) = action else {
            return Ok(());
        };
        let meta = self.source.metadata(rel)?;

        if options.dry_run {
            info!("Would copy: {} ({:o})", rel.display(), mode);
        } else {
            self.unlink_folder_ancestors(rel)?;
            self.ensure_parent(rel, meta.permissions().mode())?;
            self.prepare_copy_target(rel)?;
            info!("Copying: {}", rel.display());
            self.source.copy_into(rel, self.target, *mode)?;
        }

        summary.copied += 1;
        summary.total_bytes += meta.len();
        Ok(())
    }

    /// Replace the first linked folder on the way to `rel` in the target.
    ///
    /// Copies must land in the target tree itself, never in whatever an
    /// earlier linked run pointed a folder at. Everything below a removed
    /// link is gone afterwards, so the walk stops there.
    fn unlink_folder_ancestors(&self, rel: &Path) -> Result<()> {
        let Some(parent) = rel.parent() else {
            return Ok(());
        };
        let mut ancestor = PathBuf::new();
        for component in parent.components() {
            ancestor.push(component);
            match self.target.symlink_metadata(&ancestor) {
                Ok(meta) if meta.file_type().is_symlink() => {
                    warn!("Replacing linked folder {} with a directory", ancestor.display());
                    return self.target.remove_file(&ancestor);
                }
                Ok(_) => {}
                Err(e) if e.is_not_found() => return Ok(()),
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Remove a symlink left at the copy target by an earlier linked run.
    fn prepare_copy_target(&self, rel: &Path) -> Result<()> {
        match self.target.symlink_metadata(rel) {
            Ok(meta) if meta.file_type().is_symlink() => {
                debug!(path = %rel.display(), "replacing symlink with a copy");
                self.target.remove_file(rel)
            }
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e),
        }
    }
}
