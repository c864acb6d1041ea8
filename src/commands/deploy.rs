//! Deploy command - validates the source and stages the verified files.

use anyhow::{Context, Result};
use tracing::info;

use zeropack::config::Config;
use zeropack::timing::{format_elapsed, Timer};
use zeropack::{DeployOptions, Deployer, PathScope};

use super::validate_source;

/// Execute the deploy command.
pub fn cmd_deploy(config: &Config, options: &DeployOptions) -> Result<()> {
    let (source, verified) = validate_source(config)?;
    let target = PathScope::new(&config.target)?;

    if options.dry_run {
        info!("Dry run: nothing will be written to {}", target.base().display());
    }

    let deployer = Deployer::new(&source, &target, &config.profile.symlinkable_folders);
    let timer = Timer::start("Deployment");
    let summary = deployer
        .deploy(&verified, options)
        .with_context(|| format!("Failed to deploy into {}", target.base().display()))?;
    let elapsed = timer.finish();

    info!("All OK! {} in {}", summary, format_elapsed(elapsed));
    Ok(())
}
