//! Error types for zeropack.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::imports::pe::PeError;

/// Errors raised while validating or deploying an installation.
#[derive(Debug, Error)]
pub enum Error {
    /// An absolute path was handed to a scope that only accepts relative ones.
    #[error("unexpected absolute path, expected relative: {}", .0.display())]
    InvalidPath(PathBuf),

    /// A required pattern matched nothing in the source tree.
    #[error("not a valid installation: no file matches {pattern}")]
    WhitelistMismatch { pattern: String },

    #[error("failed to read imports of {}: {source}", path.display())]
    BinaryFormat {
        path: PathBuf,
        #[source]
        source: PeError,
    },

    #[error("invalid pattern {pattern}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to create symlink for {}: {source}", path.display())]
    Symlink {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid profile {}: {reason}", path.display())]
    Profile { path: PathBuf, reason: String },

    #[error("{0}")]
    Config(String),
}

impl Error {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Kind of the underlying I/O error, if this error wraps one.
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            Self::Io { source, .. } | Self::Symlink { source, .. } => Some(source.kind()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.io_kind() == Some(io::ErrorKind::NotFound)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
