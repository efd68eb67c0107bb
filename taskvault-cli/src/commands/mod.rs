//! Subcommands. Each module owns its clap `Args` and a `run` method.

pub mod init;
pub mod profiles;
pub mod qa;
pub mod status;
pub mod sync;

use std::path::PathBuf;

use anyhow::{Context, Result};

use taskvault_core::{config, Settings};

use crate::clients::azure::AzureClient;

pub(crate) fn home() -> Result<PathBuf> {
    dirs::home_dir().context("could not determine home directory")
}

/// Settings file plus environment overrides.
pub(crate) fn load_settings(home: &std::path::Path) -> Result<Settings> {
    config::load_at(home).context("failed to load settings (run `taskvault init` first)")
}

/// Oracle client from the resolved endpoint settings.
pub(crate) fn oracle_client(settings: &Settings) -> Result<AzureClient> {
    let endpoint = settings
        .oracle_endpoint()
        .context("oracle is not configured")?;
    Ok(AzureClient::new(&endpoint))
}
