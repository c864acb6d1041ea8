//! zeropack - stage a minimal dedicated-server copy of a game installation.
//!
//! Checks that the source directory is a complete installation (required
//! files plus every library the executables import) and then copies or
//! links just those files into the target directory.

mod commands;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use zeropack::config::Config;
use zeropack::DeployOptions;

#[derive(Parser)]
#[command(name = "zeropack")]
#[command(version, about = "Generates a package to run dedicated servers without unnecessary files.")]
struct Cli {
    /// The source game directory, where Call of Duty: Ghosts is installed.
    #[arg(short, long, required_unless_present = "dump_profile")]
    source: Option<PathBuf>,

    /// Symlink files instead of copying them to save disk space.
    #[arg(short = 'l', long)]
    symlink: bool,

    /// Abort if an attempt at symlinking fails instead of copying.
    #[arg(long = "symlink-fail")]
    symlink_fail: bool,

    /// JSON profile with required patterns, symlinkable folders and platform libraries.
    #[arg(long)]
    profile: Option<PathBuf>,

    /// Only validate the source directory and list the files that would be deployed.
    #[arg(long, conflicts_with = "dry_run")]
    check: bool,

    /// Validate and log every deployment action without touching the target.
    #[arg(long)]
    dry_run: bool,

    /// Print the effective profile as JSON and exit.
    #[arg(long)]
    dump_profile: bool,

    /// Enable debug output.
    #[arg(short, long)]
    verbose: bool,

    /// The target directory to copy files to (default: current directory).
    target: Option<PathBuf>,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn main() -> Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    if cli.dump_profile {
        return commands::cmd_dump_profile(cli.profile);
    }

    let Some(source) = cli.source else {
        anyhow::bail!("a source directory is required (--source)");
    };
    let config = Config::load(source, cli.target, cli.profile)?;
    config.log();

    if cli.check {
        return commands::cmd_check(&config);
    }

    let options = DeployOptions {
        symlink: cli.symlink,
        fail_on_symlink_error: cli.symlink_fail,
        dry_run: cli.dry_run,
    };
    commands::cmd_deploy(&config, &options)
}
