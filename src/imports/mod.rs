//! Library dependencies of native executables.
//!
//! Reads the PE import table directly instead of asking for an "imported
//! libraries" summary, so images whose import directory lists symbols but no
//! explicit library records are still covered.

pub mod pe;

use std::io::Read;
use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};
use crate::scope::PathScope;

/// Extracts the non-platform libraries an executable imports.
pub struct ImportExtractor<'a> {
    scope: &'a PathScope,
    platform_libraries: &'a [String],
}

impl<'a> ImportExtractor<'a> {
    pub fn new(scope: &'a PathScope, platform_libraries: &'a [String]) -> Self {
        Self {
            scope,
            platform_libraries,
        }
    }

    /// Return the distinct libraries imported by `rel`, in order of first
    /// occurrence.
    ///
    /// Names are compared case-insensitively. Libraries provided by the
    /// platform are dropped entirely.
    pub fn extract_imports(&self, rel: impl AsRef<Path>) -> Result<Vec<String>> {
        let rel = rel.as_ref();
        let mut file = self.scope.open(rel)?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .map_err(|e| Error::io(format!("failed to read {}", rel.display()), e))?;

        let symbols = pe::imported_symbols(&data).map_err(|source| Error::BinaryFormat {
            path: rel.to_path_buf(),
            source,
        })?;

        Ok(self.libraries_from_symbols(&symbols))
    }

    fn libraries_from_symbols(&self, symbols: &[String]) -> Vec<String> {
        let mut libraries: Vec<String> = Vec::new();
        for symbol in symbols {
            let Some((_, library)) = symbol.split_once(':') else {
                continue;
            };
            if libraries.iter().any(|l| l.eq_ignore_ascii_case(library)) {
                continue;
            }
            if self
                .platform_libraries
                .iter()
                .any(|l| l.eq_ignore_ascii_case(library))
            {
                continue;
            }
            debug!(library, "imported library");
            libraries.push(library.to_string());
        }
        libraries
    }
}
