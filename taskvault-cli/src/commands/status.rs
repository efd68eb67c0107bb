//! `taskvault status` — last sync per profile.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use taskvault_core::format_timestamp;
use taskvault_sync::{format_age, CursorStore};

use super::{home, load_settings};

/// Arguments for `taskvault status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Serialize)]
struct ProfileStatus {
    profile: String,
    project_id: String,
    last_sync_at: Option<String>,
    last_sync_age: String,
}

#[derive(Tabled)]
struct StatusTableRow {
    #[tabled(rename = "profile")]
    profile: String,
    #[tabled(rename = "project")]
    project: String,
    #[tabled(rename = "last sync")]
    last_sync: String,
    #[tabled(rename = "age")]
    age: String,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let home = home()?;
        let settings = load_settings(&home)?;
        let cursors = CursorStore::load_at(&home);
        let now = Utc::now();

        let rows: Vec<ProfileStatus> = settings
            .profiles
            .iter()
            .map(|p| {
                let last = cursors.get_last_sync(&p.project_id);
                ProfileStatus {
                    profile: p.name.clone(),
                    project_id: p.project_id.to_string(),
                    last_sync_at: last.map(format_timestamp),
                    last_sync_age: last
                        .map(|at| format_age(at, now))
                        .unwrap_or_else(|| "never".to_string()),
                }
            })
            .collect();

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&rows).context("failed to serialize status JSON")?
            );
            return Ok(());
        }
        print_table(rows, &cursors);
        Ok(())
    }
}

fn print_table(rows: Vec<ProfileStatus>, cursors: &CursorStore) {
    println!(
        "taskvault v{} | {} profile(s) | cursor file {}",
        env!("CARGO_PKG_VERSION"),
        rows.len(),
        cursors.path().display()
    );
    if rows.is_empty() {
        println!("No profiles configured.");
        return;
    }

    let never = rows.iter().filter(|r| r.last_sync_at.is_none()).count();
    let table_rows: Vec<StatusTableRow> = rows
        .into_iter()
        .map(|r| StatusTableRow {
            profile: r.profile,
            project: r.project_id,
            last_sync: match r.last_sync_at {
                Some(at) => at.green().to_string(),
                None => "never".bright_black().to_string(),
            },
            age: r.last_sync_age,
        })
        .collect();
    let mut table = Table::new(table_rows);
    table.with(Style::rounded());
    println!("{table}");

    if never > 0 {
        println!(
            "{}",
            "Profiles never synced will export every completed task on their first run.".yellow()
        );
    }
}
