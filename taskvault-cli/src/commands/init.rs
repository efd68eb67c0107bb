//! `taskvault init`

use anyhow::{Context, Result};
use clap::Args;

use taskvault_core::config;

use super::home;

/// Create `~/.taskvault/config.yaml` from the built-in template.
#[derive(Args, Debug)]
pub struct InitArgs {}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let home = home()?;
        let (path, created) = config::init_at(&home)
            .with_context(|| format!("failed to initialise settings under {}", home.display()))?;
        if created {
            println!("✓ Wrote settings template to {}", path.display());
            println!("  Add a profile, then run `taskvault sync`.");
        } else {
            println!("· Settings already exist at {}", path.display());
        }
        Ok(())
    }
}
