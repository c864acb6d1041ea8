//! Filesystem access rooted at a single base directory.
//!
//! Every path handed to a [`PathScope`] must be relative. It is joined onto
//! the base directory before use, so the same relative name can be looked up
//! in a source tree and a target tree. `..` components are not filtered.

use std::fs::{self, DirBuilder, File, Metadata, OpenOptions, Permissions};
use std::io;
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Owner-execute bit. Added while a copied file is being written.
const OWNER_EXEC: u32 = 0o100;

#[derive(Debug, Clone)]
pub struct PathScope {
    base: PathBuf,
}

impl PathScope {
    /// Create a scope rooted at `base`. A relative base is anchored at the
    /// current directory.
    pub fn new(base: impl Into<PathBuf>) -> Result<Self> {
        let base = base.into();
        let base = if base.is_absolute() {
            base
        } else {
            std::env::current_dir()
                .map_err(|e| Error::io("failed to read current directory", e))?
                .join(base)
        };
        Ok(Self { base })
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Join a relative path onto the scope root.
    pub fn resolve(&self, rel: impl AsRef<Path>) -> Result<PathBuf> {
        let rel = rel.as_ref();
        if rel.is_absolute() {
            return Err(Error::InvalidPath(rel.to_path_buf()));
        }
        Ok(self.base.join(rel))
    }

    /// Turn an absolute path below the root back into a relative one.
    pub fn relativize(&self, path: &Path) -> Option<PathBuf> {
        path.strip_prefix(&self.base).ok().map(Path::to_path_buf)
    }

    pub fn open(&self, rel: impl AsRef<Path>) -> Result<File> {
        let path = self.resolve(rel)?;
        File::open(&path).map_err(|e| Error::io(format!("failed to open {}", path.display()), e))
    }

    /// Open a file for writing, creating it with `mode` if missing and
    /// truncating it otherwise.
    pub fn create(&self, rel: impl AsRef<Path>, mode: u32) -> Result<File> {
        let path = self.resolve(rel)?;
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(mode)
            .open(&path)
            .map_err(|e| Error::io(format!("failed to create {}", path.display()), e))
    }

    pub fn metadata(&self, rel: impl AsRef<Path>) -> Result<Metadata> {
        let path = self.resolve(rel)?;
        fs::metadata(&path).map_err(|e| Error::io(format!("failed to stat {}", path.display()), e))
    }

    pub fn symlink_metadata(&self, rel: impl AsRef<Path>) -> Result<Metadata> {
        let path = self.resolve(rel)?;
        fs::symlink_metadata(&path)
            .map_err(|e| Error::io(format!("failed to lstat {}", path.display()), e))
    }

    pub fn read_link(&self, rel: impl AsRef<Path>) -> Result<PathBuf> {
        let path = self.resolve(rel)?;
        fs::read_link(&path)
            .map_err(|e| Error::io(format!("failed to read link {}", path.display()), e))
    }

    pub fn remove_file(&self, rel: impl AsRef<Path>) -> Result<()> {
        let path = self.resolve(rel)?;
        fs::remove_file(&path)
            .map_err(|e| Error::io(format!("failed to remove {}", path.display()), e))
    }

    /// Create `rel` and all missing parents with `mode`.
    ///
    /// Errors are passed through as-is; callers decide whether
    /// [`io::ErrorKind::AlreadyExists`] is acceptable.
    pub fn mkdir_all(&self, rel: impl AsRef<Path>, mode: u32) -> Result<()> {
        let path = self.resolve(rel)?;
        DirBuilder::new()
            .recursive(true)
            .mode(mode)
            .create(&path)
            .map_err(|e| Error::io(format!("failed to create directory {}", path.display()), e))
    }

    /// Create a symlink at `rel` inside `target` pointing at the absolute
    /// path of `rel` inside this scope.
    pub fn symlink_into(&self, rel: impl AsRef<Path>, target: &PathScope) -> Result<()> {
        let rel = rel.as_ref();
        let original = self.resolve(rel)?;
        let link = target.resolve(rel)?;
        std::os::unix::fs::symlink(&original, &link).map_err(|source| Error::Symlink {
            path: rel.to_path_buf(),
            source,
        })
    }

    /// Copy `rel` from this scope into `target`, returning the bytes written.
    ///
    /// The target is created with `mode | 0o100` and chmodded to exactly
    /// `mode` once all bytes are written. A `mode` of zero keeps the source
    /// permission bits. A partially written target is left in place on error.
    pub fn copy_into(&self, rel: impl AsRef<Path>, target: &PathScope, mode: u32) -> Result<u64> {
        let rel = rel.as_ref();
        let mut source = self.open(rel)?;
        let mode = if mode == 0 {
            source
                .metadata()
                .map_err(|e| Error::io(format!("failed to stat {}", rel.display()), e))?
                .permissions()
                .mode()
                & 0o7777
        } else {
            mode
        };

        let mut dest = target.create(rel, mode | OWNER_EXEC)?;
        let written = io::copy(&mut source, &mut dest)
            .map_err(|e| Error::io(format!("failed to copy {}", rel.display()), e))?;

        let dest_path = target.resolve(rel)?;
        fs::set_permissions(&dest_path, Permissions::from_mode(mode))
            .map_err(|e| Error::io(format!("failed to chmod {}", dest_path.display()), e))?;
        Ok(written)
    }

    /// Visit every entry below the root, root included.
    ///
    /// The visitor always receives a path relative to the root, even when
    /// the walk reports an error for that entry; if the failing path cannot
    /// be relativized it is passed on unchanged.
    pub fn walk<F>(&self, mut visit: F) -> Result<()>
    where
        F: FnMut(&Path, std::result::Result<Metadata, walkdir::Error>) -> Result<()>,
    {
        for entry in WalkDir::new(&self.base).sort_by_file_name() {
            match entry {
                Ok(entry) => {
                    let rel = self.relativize(entry.path()).unwrap_or_default();
                    let meta = entry.metadata();
                    visit(&rel, meta)?;
                }
                Err(err) => {
                    let rel = err
                        .path()
                        .map(|p| self.relativize(p).unwrap_or_else(|| p.to_path_buf()))
                        .unwrap_or_default();
                    visit(&rel, Err(err))?;
                }
            }
        }
        Ok(())
    }
}
