//! One sync pass for one tracker profile.
//!
//! Fetch → select → clean up reverted records → per record (expiry,
//! context, redaction, render, write) → optionally advance the cursor.
//! Records are processed sequentially; a failing record is reported and the
//! loop moves on.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use taskvault_core::config::{Profile, Settings};
use taskvault_core::types::{ContextBundle, Record, SectionId};
use taskvault_core::ConfigError;
use taskvault_renderer::naming::{artifact_file_name, clean_filename};
use taskvault_renderer::{render_document, to_markdown, PreviewComment, PreviewContext, TemplateEngine};

use crate::context::ContextFetcher;
use crate::cursor_store::CursorStore;
use crate::error::SyncError;
use crate::expiry::reconcile_expiry;
use crate::redaction::{RedactionBatcher, RedactionLookup};
use crate::remote::{Oracle, Tracker};
use crate::selection::{cleanup_reverted, select_tasks, SyncMode};
use crate::writer::{ArtifactStore, WriteResult};

/// Section used for records with no section in the profile's project.
pub const UNCATEGORIZED: &str = "Uncategorized";

// ---------------------------------------------------------------------------
// Request / operator
// ---------------------------------------------------------------------------

/// Parameters of one run.
#[derive(Debug, Clone)]
pub struct SyncRequest<'a> {
    pub profile: &'a Profile,
    pub mode: SyncMode,
    /// Sections skipped for this run on top of the profile's own list.
    pub extra_excluded: Vec<String>,
    /// Recorded as the new cursor when the run is confirmed.
    pub started_at: DateTime<Utc>,
}

impl<'a> SyncRequest<'a> {
    pub fn new(profile: &'a Profile, mode: SyncMode) -> Self {
        SyncRequest {
            profile,
            mode,
            extra_excluded: Vec::new(),
            started_at: Utc::now(),
        }
    }
}

/// Question put to the operator before the cursor moves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvancePrompt {
    /// Nothing was selected; moving the cursor skips this window for good.
    EmptyRun,
    /// Records were processed.
    Completed { succeeded: usize, failed: usize },
}

/// Whoever decides whether the cursor advances.
pub trait Operator {
    fn confirm_advance(&mut self, prompt: &AdvancePrompt) -> bool;
}

/// Non-interactive operator: always confirms after processing, and confirms
/// an empty run only when `advance_empty` is set.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoConfirm {
    pub advance_empty: bool,
}

impl Operator for AutoConfirm {
    fn confirm_advance(&mut self, prompt: &AdvancePrompt) -> bool {
        match prompt {
            AdvancePrompt::EmptyRun => self.advance_empty,
            AdvancePrompt::Completed { .. } => true,
        }
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Written(PathBuf),
    Unchanged(PathBuf),
    Skipped { reason: String },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordReport {
    pub id: String,
    pub title: String,
    pub outcome: RecordOutcome,
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub records: Vec<RecordReport>,
    /// Artifacts withdrawn because their record went back to active.
    pub removed: Vec<PathBuf>,
    /// New cursor, when the run advanced it.
    pub cursor_advanced: Option<DateTime<Utc>>,
    /// Expiry back-fill attempts.
    pub expiry_writes: usize,
}

impl RunReport {
    fn count(&self, pred: impl Fn(&RecordOutcome) -> bool) -> usize {
        self.records.iter().filter(|r| pred(&r.outcome)).count()
    }

    pub fn written(&self) -> usize {
        self.count(|o| matches!(o, RecordOutcome::Written(_)))
    }

    pub fn unchanged(&self) -> usize {
        self.count(|o| matches!(o, RecordOutcome::Unchanged(_)))
    }

    /// Written or unchanged.
    pub fn succeeded(&self) -> usize {
        self.written() + self.unchanged()
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, RecordOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, RecordOutcome::Failed { .. }))
    }
}

#[derive(Debug, Clone)]
pub struct SyncOutcome {
    /// Sanitized project directory name; `None` when nothing was processed.
    pub project: Option<String>,
    pub report: RunReport,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct SyncEngine<'a> {
    tracker: &'a dyn Tracker,
    oracle: Option<&'a dyn Oracle>,
    settings: &'a Settings,
    output_root: PathBuf,
    cursors: &'a mut CursorStore,
    templates: &'a TemplateEngine,
}

/// Sections and exclusions resolved once per run.
struct SectionIndex {
    names: BTreeMap<SectionId, String>,
    excluded: BTreeSet<String>,
}

impl SectionIndex {
    fn name_of(&self, id: Option<&SectionId>) -> (&str, bool) {
        match id.and_then(|id| self.names.get(id).map(|n| (id, n))) {
            Some((id, name)) => {
                let excluded = self.excluded.contains(&id.as_str().to_lowercase())
                    || self.excluded.contains(&name.trim().to_lowercase());
                (name.as_str(), excluded)
            }
            None => (UNCATEGORIZED, self.excluded.contains(&UNCATEGORIZED.to_lowercase())),
        }
    }
}

impl<'a> SyncEngine<'a> {
    pub fn new(
        tracker: &'a dyn Tracker,
        oracle: Option<&'a dyn Oracle>,
        settings: &'a Settings,
        output_root: &Path,
        cursors: &'a mut CursorStore,
        templates: &'a TemplateEngine,
    ) -> Self {
        SyncEngine {
            tracker,
            oracle,
            settings,
            output_root: output_root.to_path_buf(),
            cursors,
            templates,
        }
    }

    /// Run one pass for `req`.
    ///
    /// Configuration and project-level fetch failures abort the run before
    /// anything is written. Per-record failures land in the report.
    pub fn run(
        &mut self,
        req: &SyncRequest<'_>,
        operator: &mut dyn Operator,
    ) -> Result<SyncOutcome, SyncError> {
        if self.settings.oracle_required() && self.oracle.is_none() {
            let required_by = if self.settings.features.redact {
                "redaction"
            } else {
                "image analysis"
            };
            return Err(ConfigError::Missing {
                key: "AZURE_OPENAI_ENDPOINT",
                required_by,
            }
            .into());
        }

        let project_id = &req.profile.project_id;
        let project = self.tracker.project(project_id)?;
        let sections = SectionIndex {
            names: self
                .tracker
                .sections(project_id)?
                .into_iter()
                .map(|s| (s.id, s.name))
                .collect(),
            excluded: req
                .profile
                .excluded_sections
                .iter()
                .chain(req.extra_excluded.iter())
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        };
        let records = self.tracker.records(project_id)?;

        let cursor = self.cursors.get_last_sync(project_id);
        let selection = select_tasks(records, cursor, &req.mode);
        tracing::info!(
            "project {} ({}): mode {}, {} record(s) selected{}",
            project.name,
            project_id,
            req.mode,
            selection.tasks.len(),
            if selection.first_run { ", first run" } else { "" }
        );

        let store = ArtifactStore::new(&self.output_root, &project.name);
        let mut report = RunReport::default();
        if req.mode == SyncMode::Incremental && selection.threshold.is_some() {
            report.removed = cleanup_reverted(&store, &selection.reverted);
        }

        if selection.tasks.is_empty() {
            tracing::info!("no records to export for {}", project.name);
            if req.mode.advances_cursor() && operator.confirm_advance(&AdvancePrompt::EmptyRun) {
                self.advance(req, &mut report)?;
            }
            return Ok(SyncOutcome {
                project: None,
                report,
            });
        }

        let mut lookup = RedactionLookup::new();
        for record in selection.tasks {
            let id = record.id.to_string();
            let title = record.title.clone();
            let outcome = match self.process_record(req, &store, &sections, &mut lookup, record, &mut report) {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::warn!("record {} ({}) failed: {}", id, title, e);
                    RecordOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
            };
            report.records.push(RecordReport { id, title, outcome });
        }

        tracing::info!(
            "{}: {} written, {} unchanged, {} skipped, {} failed",
            project.name,
            report.written(),
            report.unchanged(),
            report.skipped(),
            report.failed()
        );

        if req.mode.advances_cursor() {
            let prompt = AdvancePrompt::Completed {
                succeeded: report.succeeded(),
                failed: report.failed(),
            };
            if operator.confirm_advance(&prompt) {
                self.advance(req, &mut report)?;
            } else {
                tracing::info!("sync cursor left unchanged");
            }
        }

        Ok(SyncOutcome {
            project: Some(clean_filename(&project.name)),
            report,
        })
    }

    fn advance(&mut self, req: &SyncRequest<'_>, report: &mut RunReport) -> Result<(), SyncError> {
        if self
            .cursors
            .save_sync_time(&req.profile.project_id, req.started_at)?
        {
            report.cursor_advanced = Some(req.started_at);
        }
        Ok(())
    }

    fn process_record(
        &self,
        req: &SyncRequest<'_>,
        store: &ArtifactStore,
        sections: &SectionIndex,
        lookup: &mut RedactionLookup,
        mut record: Record,
        report: &mut RunReport,
    ) -> Result<RecordOutcome, SyncError> {
        let project_id = &req.profile.project_id;
        let (section, excluded) = sections.name_of(record.section_in(project_id));
        if excluded {
            tracing::debug!("record {} skipped: section {} excluded", record.id, section);
            return Ok(RecordOutcome::Skipped {
                reason: format!("section '{section}' excluded"),
            });
        }

        let expiry = reconcile_expiry(self.tracker, &mut record, &self.settings.expiry_field);
        if expiry.attempted_write() {
            report.expiry_writes += 1;
        }

        let fetcher = ContextFetcher::new(self.tracker, self.oracle, store, &self.settings.features);
        let bundle = fetcher.fetch(project_id, section, record, expiry.value().to_string())?;

        if self.settings.features.redact {
            if let Some(oracle) = self.oracle {
                RedactionBatcher::new(oracle).mask_into(bundle.free_texts(), lookup);
            }
        }
        let map = |s: &str| lookup.get(s).cloned().unwrap_or_else(|| s.to_string());

        let contents = to_markdown(&render_document(&bundle, &map));
        let file_name = artifact_file_name(bundle.record.created_date(), &map(&bundle.record.title));
        let result = store.write_artifact(section, &file_name, &contents)?;
        store.remove_stale(bundle.record.id.as_str(), result.path())?;

        if self.settings.features.upload_preview && self.settings.features.redact {
            self.post_preview(&bundle, &map);
        }

        Ok(match result {
            WriteResult::Written { path } => RecordOutcome::Written(path),
            WriteResult::Unchanged { path } => RecordOutcome::Unchanged(path),
        })
    }

    /// Post the redacted title, body and visible comments back to the
    /// record. Failures are logged only.
    fn post_preview(&self, bundle: &ContextBundle, map: &dyn Fn(&str) -> String) {
        let ctx = PreviewContext {
            title: map(&bundle.record.title),
            notes: bundle.record.notes.as_deref().map(map).unwrap_or_default(),
            comments: bundle
                .comments
                .iter()
                .filter(|c| c.is_visible())
                .map(|c| PreviewComment {
                    author: map(c.author_or_default()),
                    text: map(&c.text),
                })
                .collect(),
        };
        let text = match self.templates.render_preview(&ctx) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("preview for record {} not rendered: {}", bundle.record.id, e);
                return;
            }
        };
        if let Err(e) = self.tracker.post_comment(&bundle.record.id, &text) {
            tracing::warn!("preview upload for record {} failed: {}", bundle.record.id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_confirm_respects_empty_flag() {
        let mut op = AutoConfirm::default();
        assert!(!op.confirm_advance(&AdvancePrompt::EmptyRun));
        assert!(op.confirm_advance(&AdvancePrompt::Completed {
            succeeded: 1,
            failed: 0
        }));
        let mut op = AutoConfirm {
            advance_empty: true,
        };
        assert!(op.confirm_advance(&AdvancePrompt::EmptyRun));
    }

    #[test]
    fn missing_section_is_uncategorized() {
        let index = SectionIndex {
            names: BTreeMap::from([(SectionId::from("s1"), "Billing".to_string())]),
            excluded: BTreeSet::from(["billing".to_string()]),
        };
        assert_eq!(index.name_of(None), (UNCATEGORIZED, false));
        assert_eq!(index.name_of(Some(&SectionId::from("gone"))), (UNCATEGORIZED, false));
        assert_eq!(index.name_of(Some(&SectionId::from("s1"))), ("Billing", true));
    }

    #[test]
    fn report_counts() {
        let entry = |outcome| RecordReport {
            id: "1".into(),
            title: "t".into(),
            outcome,
        };
        let report = RunReport {
            records: vec![
                entry(RecordOutcome::Written(PathBuf::from("a.md"))),
                entry(RecordOutcome::Unchanged(PathBuf::from("b.md"))),
                entry(RecordOutcome::Skipped { reason: "x".into() }),
                entry(RecordOutcome::Failed { reason: "y".into() }),
            ],
            ..RunReport::default()
        };
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.failed(), 1);
    }
}
