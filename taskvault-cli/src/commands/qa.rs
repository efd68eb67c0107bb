//! `taskvault qa` — mine Q&A pairs from published artifacts.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use taskvault_renderer::TemplateEngine;
use taskvault_sync::QaMiner;

use super::{home, load_settings, oracle_client};

/// Arguments for `taskvault qa`.
#[derive(Args, Debug)]
pub struct QaArgs {
    /// Only mine this project's directory (as named under the output root).
    #[arg(long)]
    pub project: Option<String>,
}

impl QaArgs {
    pub fn run(self) -> Result<()> {
        let home = home()?;
        let settings = load_settings(&home)?;
        let oracle = oracle_client(&settings)?;
        let templates = TemplateEngine::new(settings.template_dir.as_deref())
            .context("failed to load templates")?;
        let output_root = settings.output_root_at(&home);
        let qa_root = settings.qa_root_at(&home);

        let report = QaMiner::new(&oracle, &templates, &output_root, &qa_root)
            .mine(self.project.as_deref())
            .context("Q&A mining failed")?;

        for path in &report.written {
            println!("  ✎  {}", path.display());
        }
        for (path, reason) in &report.failed {
            println!("  {}  {}: {}", "!".red().bold(), path.display(), reason);
        }
        println!(
            "{} scanned, {} written, {} rejected, {} skipped, {} failed",
            report.scanned,
            report.written.len(),
            report.invalid,
            report.skipped,
            report.failed.len()
        );
        Ok(())
    }
}
