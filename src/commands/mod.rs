//! CLI command handlers.
//!
//! - `check` - validate the source directory only
//! - `deploy` - validate, then stage the verified files
//! - `profile` - print the effective profile

mod check;
mod deploy;
mod profile;

pub use check::cmd_check;
pub use deploy::cmd_deploy;
pub use profile::cmd_dump_profile;

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::info;

use zeropack::config::Config;
use zeropack::timing::{format_elapsed, Timer};
use zeropack::{PathScope, WhitelistValidator};

/// Validate the configured source tree, returning its scope and every
/// verified path in discovery order.
fn validate_source(config: &Config) -> Result<(PathScope, Vec<PathBuf>)> {
    let source = PathScope::new(&config.source)?;
    let validator = WhitelistValidator::new(&source, &config.profile.platform_libraries);

    let timer = Timer::start("Validation");
    let verified = validator
        .validate(&config.profile.required)
        .context("An error occurred while checking source directory")?
        .into_verified()?;
    let elapsed = timer.finish();
    info!("Validated {} paths in {}", verified.len(), format_elapsed(elapsed));

    Ok((source, verified))
}
