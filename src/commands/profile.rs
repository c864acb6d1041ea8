//! Profile command - prints the effective profile.

use anyhow::Result;
use std::path::PathBuf;

use zeropack::config::Config;

/// Print the profile that a run would use as JSON.
pub fn cmd_dump_profile(explicit: Option<PathBuf>) -> Result<()> {
    let (profile, _) = Config::resolve_profile(explicit)?;
    println!("{}", profile.to_json()?);
    Ok(())
}
