//! Whitelist validation of a source tree.
//!
//! Each required pattern must match at least one path. Every matched `.exe`
//! has its import table read and each imported library must in turn exist
//! as a file of exactly that name. Validation stops at the first pattern
//! that matches nothing.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::imports::ImportExtractor;
use crate::scope::PathScope;

/// How a requirement is looked up in the scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    /// Expand as a glob expression.
    Glob,
    /// Must exist under exactly this relative path.
    Literal,
}

/// Outcome of [`WhitelistValidator::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    /// Every requirement matched. Paths are in discovery order and may
    /// contain duplicates.
    Valid(Vec<PathBuf>),
    /// The first requirement that matched nothing.
    Mismatch { pattern: String },
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid(_))
    }

    /// Verified paths, or [`Error::WhitelistMismatch`] for a mismatch.
    pub fn into_verified(self) -> Result<Vec<PathBuf>> {
        match self {
            Validation::Valid(paths) => Ok(paths),
            Validation::Mismatch { pattern } => Err(Error::WhitelistMismatch { pattern }),
        }
    }
}

pub struct WhitelistValidator<'a> {
    scope: &'a PathScope,
    imports: ImportExtractor<'a>,
}

impl<'a> WhitelistValidator<'a> {
    pub fn new(scope: &'a PathScope, platform_libraries: &'a [String]) -> Self {
        Self {
            scope,
            imports: ImportExtractor::new(scope, platform_libraries),
        }
    }

    /// Validate `patterns` (glob expressions) and the import closure of
    /// every executable they match.
    pub fn validate<S: AsRef<str>>(&self, patterns: &[S]) -> Result<Validation> {
        let mut visited = HashSet::new();
        let mut verified = Vec::new();
        match self.check(patterns, MatchStrategy::Glob, &mut visited, &mut verified)? {
            Some(pattern) => Ok(Validation::Mismatch { pattern }),
            None => Ok(Validation::Valid(verified)),
        }
    }

    /// Returns the first requirement without a match, appending every
    /// verified path to `verified` along the way.
    fn check<S: AsRef<str>>(
        &self,
        requirements: &[S],
        strategy: MatchStrategy,
        visited: &mut HashSet<PathBuf>,
        verified: &mut Vec<PathBuf>,
    ) -> Result<Option<String>> {
        for requirement in requirements {
            let requirement = requirement.as_ref();
            info!("Checking: {}", requirement);

            let matches = match strategy {
                MatchStrategy::Glob => self.expand_glob(requirement)?,
                MatchStrategy::Literal => self.expand_literal(requirement)?,
            };
            if matches.is_empty() {
                return Ok(Some(requirement.to_string()));
            }

            for rel in matches {
                info!("Found: {}", rel.display());
                verified.push(rel.clone());

                if !is_executable(&rel) {
                    continue;
                }
                if !visited.insert(rel.clone()) {
                    debug!(path = %rel.display(), "imports already verified");
                    continue;
                }

                info!("Checking: Imports of {}", rel.display());
                let libraries = self.imports.extract_imports(&rel)?;
                info!("Found {} imported libraries", libraries.len());
                if let Some(missing) =
                    self.check(&libraries, MatchStrategy::Literal, visited, verified)?
                {
                    return Ok(Some(missing));
                }
            }
        }
        Ok(None)
    }

    fn expand_glob(&self, pattern: &str) -> Result<Vec<PathBuf>> {
        let full = format!(
            "{}/{}",
            Pattern::escape(&self.scope.base().to_string_lossy()),
            normalize_pattern(pattern)
        );
        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };

        let entries = glob::glob_with(&full, options).map_err(|source| Error::Pattern {
            pattern: pattern.to_string(),
            source,
        })?;

        let mut matches = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| {
                let context = format!("failed to expand {} at {}", pattern, e.path().display());
                Error::io(context, io::Error::from(e))
            })?;
            if let Some(rel) = self.scope.relativize(&path) {
                matches.push(rel);
            }
        }
        Ok(matches)
    }

    fn expand_literal(&self, name: &str) -> Result<Vec<PathBuf>> {
        match self.scope.symlink_metadata(name) {
            Ok(_) => Ok(vec![PathBuf::from(name)]),
            Err(e) if e.is_not_found() => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }
}

fn is_executable(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("exe"))
}

/// Trim separators and collapse a `**` that does not form a whole path
/// component into a single `*`, so `zone/**.ff` means `zone/*.ff`.
fn normalize_pattern(pattern: &str) -> String {
    pattern
        .trim_matches('/')
        .split('/')
        .map(|component| {
            if component == "**" {
                component.to_string()
            } else {
                let mut out = String::with_capacity(component.len());
                for c in component.chars() {
                    if c == '*' && out.ends_with('*') {
                        continue;
                    }
                    out.push(c);
                }
                out
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}
