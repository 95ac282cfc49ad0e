//! Support command line over the Verith license core.
//!
//! Lets support staff and power users see the license state of a machine,
//! activate a key without the GUI, and locate the state file.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::PathBuf;
use verith_license::{LicenseConfig, LicenseManager, LicenseSnapshot, LicenseStatus};

#[derive(Parser, Debug)]
#[command(name = "verith-license")]
#[command(about = "Inspect and activate the Verith license on this machine")]
#[command(version)]
pub struct Args {
    /// Directory holding the license state file
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Base URL of the licensing API
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Evaluate the license (contacts the server at most once a day)
    Status,
    /// Activate a purchased license key
    Activate {
        /// The license key, as received with the purchase
        key: String,
    },
    /// Show where license state is kept
    Paths,
}

impl Args {
    /// Environment config with command line overrides applied.
    #[must_use]
    pub fn config(&self) -> LicenseConfig {
        self.apply(LicenseConfig::from_env())
    }

    /// Applies the command line overrides to `config`.
    #[must_use]
    pub fn apply(&self, mut config: LicenseConfig) -> LicenseConfig {
        if let Some(dir) = &self.data_dir {
            config.data_dir = Some(dir.clone());
        }
        if let Some(url) = &self.api_url {
            config.api_base_url = url.clone();
        }
        config
    }
}

/// What a command printed, and whether the application may be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub output: String,
    pub usable: bool,
}

/// Runs a license command against `manager`.
///
/// # Errors
///
/// Any license error, with the command that failed as context.
pub fn run(manager: &LicenseManager, command: &Command, json: bool) -> Result<Outcome> {
    let record = match command {
        Command::Status => manager
            .check_status()
            .context("failed to evaluate license")?,
        Command::Activate { key } => manager
            .activate_license(key)
            .context("failed to activate license")?,
        Command::Paths => anyhow::bail!("`paths` does not need a license manager"),
    };

    let snapshot =
        LicenseSnapshot::from_record(&record, manager.now(), manager.policy().trial_days);
    Ok(Outcome {
        output: render_snapshot(&snapshot, json)?,
        usable: snapshot.status.is_usable(),
    })
}

/// Formats a snapshot for the terminal.
///
/// # Errors
///
/// Fails only if JSON serialization fails.
pub fn render_snapshot(snapshot: &LicenseSnapshot, json: bool) -> Result<String> {
    if json {
        return serde_json::to_string_pretty(snapshot).context("failed to serialize status");
    }

    let mut out = String::new();
    let _ = writeln!(out, "Status:          {}", snapshot.status);
    let _ = writeln!(out, "Installed:       {}", fmt_time(snapshot.install_date));
    let _ = writeln!(out, "Last check:      {}", fmt_time(snapshot.last_check));
    if snapshot.status == LicenseStatus::Trial {
        let _ = writeln!(out, "Trial days left: {}", snapshot.trial_days_remaining);
    }
    if let Some(hint) = &snapshot.license_key_hint {
        let _ = writeln!(out, "License key:     {hint}");
    }
    if let Some(id) = &snapshot.instance_id {
        let _ = writeln!(out, "Instance:        {id}");
    }
    if snapshot.status == LicenseStatus::Expired {
        let _ = writeln!(
            out,
            "\nThis copy of Verith needs a license key: verith-license activate <KEY>"
        );
    }
    Ok(out)
}

#[derive(Debug, Serialize)]
struct Paths<'a> {
    state_file: String,
    keyring_service: &'a str,
    keyring_user: &'a str,
    api_base_url: &'a str,
    instance_name: String,
}

/// Formats the locations the license core reads and writes.
///
/// # Errors
///
/// Fails only if JSON serialization fails.
pub fn render_paths(config: &LicenseConfig, json: bool) -> Result<String> {
    let paths = Paths {
        state_file: config.state_path().display().to_string(),
        keyring_service: &config.keyring_service,
        keyring_user: &config.keyring_user,
        api_base_url: &config.api_base_url,
        instance_name: config.resolve_instance_name(),
    };
    if json {
        return serde_json::to_string_pretty(&paths).context("failed to serialize paths");
    }

    let mut out = String::new();
    let _ = writeln!(out, "State file:    {}", paths.state_file);
    let _ = writeln!(
        out,
        "Keyring entry: {} / {}",
        paths.keyring_service, paths.keyring_user
    );
    let _ = writeln!(out, "License API:   {}", paths.api_base_url);
    let _ = writeln!(out, "Instance name: {}", paths.instance_name);
    Ok(out)
}

fn fmt_time(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M UTC").to_string()
}
