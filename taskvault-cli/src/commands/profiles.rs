//! `taskvault profiles`

use anyhow::Result;
use clap::Args;
use tabled::{settings::Style, Table, Tabled};

use super::{home, load_settings};

/// List configured profiles. Tokens are never printed in full.
#[derive(Args, Debug)]
pub struct ProfilesArgs {}

#[derive(Tabled)]
struct ProfileRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "name")]
    name: String,
    #[tabled(rename = "project")]
    project: String,
    #[tabled(rename = "token")]
    token: String,
    #[tabled(rename = "excluded sections")]
    excluded: String,
}

impl ProfilesArgs {
    pub fn run(self) -> Result<()> {
        let settings = load_settings(&home()?)?;
        if settings.profiles.is_empty() {
            println!("No profiles configured. Edit ~/.taskvault/config.yaml or set ASANA_PROFILE_1_*.");
            return Ok(());
        }
        let rows: Vec<ProfileRow> = settings
            .profiles
            .iter()
            .enumerate()
            .map(|(i, p)| ProfileRow {
                index: i + 1,
                name: p.name.clone(),
                project: p.project_id.to_string(),
                token: mask_token(&p.token),
                excluded: p.excluded_sections.join(", "),
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        Ok(())
    }
}

/// First four characters, then an ellipsis.
pub(crate) fn mask_token(token: &str) -> String {
    if token.chars().count() <= 8 {
        return "****".to_string();
    }
    let head: String = token.chars().take(4).collect();
    format!("{head}…")
}
