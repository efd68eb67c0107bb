//! `taskvault sync` — export one profile's completed tasks.

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use dialoguer::{theme::ColorfulTheme, Confirm, Select};

use taskvault_core::{Profile, Settings};
use taskvault_renderer::TemplateEngine;
use taskvault_sync::{
    AdvancePrompt, CursorStore, Operator, Oracle, QaMiner, RecordOutcome, RunReport, SyncEngine,
    SyncMode, SyncRequest,
};

use super::{home, load_settings, oracle_client};
use crate::clients::asana::AsanaClient;

/// Arguments for `taskvault sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Profile name or 1-based index. Prompted for when several exist.
    #[arg(long, short = 'p')]
    pub profile: Option<String>,

    /// `incremental` (since the last confirmed sync) or `full`.
    #[arg(long, short = 'm', default_value = "incremental")]
    pub mode: String,

    /// Export completed tasks created within FROM~TO (YYYY-MM-DD, inclusive).
    #[arg(long, value_name = "FROM~TO", conflicts_with = "mode")]
    pub created: Option<String>,

    /// Skip a section for this run (name or id). Repeatable.
    #[arg(long = "exclude-section", value_name = "SECTION")]
    pub exclude_section: Vec<String>,

    /// Do not prompt; advance the cursor after a run with processed tasks.
    #[arg(long, short = 'y')]
    pub yes: bool,

    /// Advance the cursor even when nothing was selected.
    #[arg(long)]
    pub advance_empty: bool,

    /// Run Q&A mining over the project afterwards.
    #[arg(long)]
    pub qa: bool,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let mode = match self.created.as_deref() {
            Some(range) => SyncMode::parse_range(range)?,
            None => self.mode.parse::<SyncMode>()?,
        };

        let home = home()?;
        let settings = load_settings(&home)?;
        settings.validate().context("invalid configuration")?;
        let profile = select_profile(&settings, self.profile.as_deref(), self.yes)?;

        let tracker = AsanaClient::new(&profile.token);
        let oracle = if settings.oracle_required() || self.qa {
            Some(oracle_client(&settings)?)
        } else {
            None
        };
        let templates = TemplateEngine::new(settings.template_dir.as_deref())
            .context("failed to load templates")?;
        let mut cursors = CursorStore::load_at(&home);
        let output_root = settings.output_root_at(&home);

        println!(
            "→ Syncing profile '{}' (project {}) in {} mode",
            profile.name, profile.project_id, mode
        );
        let mut operator = PromptOperator {
            assume_yes: self.yes,
            advance_empty: self.advance_empty,
        };
        let req = SyncRequest {
            extra_excluded: self.exclude_section.clone(),
            ..SyncRequest::new(profile, mode)
        };
        let oracle_ref = oracle.as_ref().map(|o| o as &dyn Oracle);
        let outcome = {
            let mut engine = SyncEngine::new(
                &tracker,
                oracle_ref,
                &settings,
                &output_root,
                &mut cursors,
                &templates,
            );
            engine
                .run(&req, &mut operator)
                .with_context(|| format!("sync failed for profile '{}'", profile.name))?
        };
        print_report(&outcome.report);

        let Some(project) = outcome.project else {
            println!("Nothing exported.");
            return Ok(());
        };
        println!("✓ Artifacts in {}", output_root.join(&project).display());

        if self.qa {
            if let Some(oracle) = oracle.as_ref() {
                let qa_root = settings.qa_root_at(&home);
                let report = QaMiner::new(oracle, &templates, &output_root, &qa_root)
                    .mine(Some(&project))
                    .context("Q&A mining failed")?;
                println!(
                    "✓ Q&A: {} written, {} rejected, {} failed ({})",
                    report.written.len(),
                    report.invalid,
                    report.failed.len(),
                    qa_root.display()
                );
            }
        }
        Ok(())
    }
}

fn select_profile<'a>(
    settings: &'a Settings,
    selector: Option<&str>,
    non_interactive: bool,
) -> Result<&'a Profile> {
    if let Some(selector) = selector {
        return Ok(settings.find_profile(selector)?);
    }
    match settings.profiles.as_slice() {
        [only] => Ok(only),
        [] => bail!("no profiles configured"),
        profiles if non_interactive => bail!(
            "{} profiles configured; pass --profile <name|index>",
            profiles.len()
        ),
        profiles => {
            let items: Vec<String> = profiles
                .iter()
                .map(|p| format!("{} ({})", p.name, p.project_id))
                .collect();
            let idx = Select::with_theme(&ColorfulTheme::default())
                .with_prompt("Profile")
                .items(&items)
                .default(0)
                .interact()
                .context("profile selection cancelled")?;
            Ok(&profiles[idx])
        }
    }
}

/// Asks on the terminal unless `--yes` / `--advance-empty` already answered.
struct PromptOperator {
    assume_yes: bool,
    advance_empty: bool,
}

impl PromptOperator {
    fn ask(prompt: String, default: bool) -> bool {
        match Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .default(default)
            .interact()
        {
            Ok(answer) => answer,
            Err(e) => {
                tracing::warn!("no answer ({}); sync cursor left unchanged", e);
                false
            }
        }
    }
}

impl Operator for PromptOperator {
    fn confirm_advance(&mut self, prompt: &AdvancePrompt) -> bool {
        match prompt {
            AdvancePrompt::EmptyRun if self.advance_empty => true,
            AdvancePrompt::EmptyRun if self.assume_yes => false,
            AdvancePrompt::EmptyRun => Self::ask(
                "No tasks selected. Advance the sync cursor anyway?".to_string(),
                false,
            ),
            AdvancePrompt::Completed { .. } if self.assume_yes => true,
            AdvancePrompt::Completed { succeeded, failed } => Self::ask(
                format!("{succeeded} task(s) exported, {failed} failed. Advance the sync cursor?"),
                *failed == 0,
            ),
        }
    }
}

fn print_report(report: &RunReport) {
    for path in &report.removed {
        println!("  {}  {}", "✗".red(), path.display());
    }
    for entry in &report.records {
        match &entry.outcome {
            RecordOutcome::Written(path) => println!("  ✎  {}", path.display()),
            RecordOutcome::Unchanged(path) => println!("  ·  {}", path.display()),
            RecordOutcome::Skipped { reason } => {
                println!("  {}  {} ({})", "-".bright_black(), entry.title, reason)
            }
            RecordOutcome::Failed { reason } => {
                println!("  {}  {} [{}]: {}", "!".red().bold(), entry.title, entry.id, reason)
            }
        }
    }
    println!(
        "{} written, {} unchanged, {} skipped, {} failed, {} withdrawn, {} expiry back-fill(s)",
        report.written(),
        report.unchanged(),
        report.skipped(),
        report.failed(),
        report.removed.len(),
        report.expiry_writes
    );
    if let Some(at) = report.cursor_advanced {
        println!("✓ Sync cursor set to {}", taskvault_core::format_timestamp(at));
    }
}
