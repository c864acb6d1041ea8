//! Check command - validates the source directory without deploying.

use anyhow::Result;
use std::collections::HashSet;
use tracing::{info, warn};

use zeropack::config::Config;

use super::validate_source;

/// Execute the check command.
pub fn cmd_check(config: &Config) -> Result<()> {
    let (source, verified) = validate_source(config)?;

    let unique: HashSet<_> = verified.iter().collect();
    for path in &verified {
        println!("{}", path.display());
    }

    let mut total_files = 0usize;
    source.walk(|rel, meta| {
        match meta {
            Ok(meta) if meta.is_file() => total_files += 1,
            Ok(_) => {}
            Err(e) => warn!("Skipping {}: {}", rel.display(), e),
        }
        Ok(())
    })?;

    info!(
        "{} required paths ({} unique) out of {} files in {}",
        verified.len(),
        unique.len(),
        total_files,
        source.base().display()
    );
    info!("All OK!");
    Ok(())
}
