//! GTFS dataset refresh job.
//!
//! Invoked by an external daily timer (cron or a systemd timer). Checks
//! for a newer upstream dataset, downloads and validates it, and swaps it
//! into the dataset directory. The running server picks it up on its next
//! `/admin/reload` or restart.
//!
//! Usage: `gtfs_refresh [--force] [config-path]`

use std::path::Path;

use tracing_subscriber::EnvFilter;

use bus_server::config::Config;
use bus_server::update::{RefreshOutcome, Updater};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let mut force = false;
    let mut config_path = None;
    for arg in std::env::args().skip(1) {
        if arg == "--force" {
            force = true;
        } else {
            config_path = Some(arg);
        }
    }

    let config = match config_path {
        Some(path) => Config::load(Path::new(&path)),
        None => Config::find_and_load(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    let updater = match Updater::new(&config.gtfs) {
        Ok(updater) => updater,
        Err(e) => {
            eprintln!("Failed to create updater: {e}");
            std::process::exit(1);
        }
    };

    match updater.refresh(force).await {
        Ok(RefreshOutcome::Updated { version }) => {
            println!("Updated GTFS dataset to version {version}");
        }
        Ok(RefreshOutcome::UpToDate { version }) => {
            println!("Already up to date (version {version})");
        }
        Err(e) => {
            // The previous dataset is untouched; the next scheduled run
            // retries.
            eprintln!("Refresh failed: {e}");
            std::process::exit(1);
        }
    }
}
