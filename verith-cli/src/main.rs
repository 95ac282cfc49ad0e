//! Verith license support tool
//!
//! Usage:
//!   verith-license status
//!   verith-license activate XXXX-XXXX-XXXX-XXXX
//!   verith-license paths --json
//!
//! Exits with status 2 when the license is expired.

use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use tracing::{Level, debug};
use tracing_subscriber::FmtSubscriber;
use verith_cli::{Args, Command, render_paths, run};
use verith_license::LicenseManager;

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let config = args.config();
    debug!("Using state file {}", config.state_path().display());

    if args.command == Command::Paths {
        println!("{}", render_paths(&config, args.json)?.trim_end());
        return Ok(ExitCode::SUCCESS);
    }

    let manager =
        LicenseManager::from_config(&config).context("failed to open license storage")?;
    let outcome = run(&manager, &args.command, args.json)?;
    println!("{}", outcome.output.trim_end());

    Ok(if outcome.usable {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}
