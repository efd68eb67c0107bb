//! Which records a run exports, and which prior artifacts it withdraws.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Utc};

use taskvault_core::types::Record;

use crate::error::SyncError;
use crate::writer::ArtifactStore;

/// Safety margin subtracted from the cursor, covering clock skew and
/// records modified while the previous run was in flight.
pub const THRESHOLD_BUFFER_MINUTES: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Completed records modified since the cursor (minus the buffer).
    Incremental,
    /// Every completed record.
    Full,
    /// Completed records created within the inclusive date range.
    CreatedBetween { from: NaiveDate, to: NaiveDate },
}

impl SyncMode {
    /// Parse `YYYY-MM-DD~YYYY-MM-DD`.
    pub fn parse_range(raw: &str) -> Result<Self, SyncError> {
        let invalid = || SyncError::InvalidRange(raw.to_string());
        let (from, to) = raw.split_once('~').ok_or_else(invalid)?;
        let parse = |s: &str| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| invalid());
        let (from, to) = (parse(from)?, parse(to)?);
        if from > to {
            return Err(invalid());
        }
        Ok(SyncMode::CreatedBetween { from, to })
    }

    /// Only incremental runs move the cursor.
    pub fn advances_cursor(&self) -> bool {
        matches!(self, SyncMode::Incremental)
    }
}

impl FromStr for SyncMode {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "incremental" | "inc" => Ok(SyncMode::Incremental),
            "full" => Ok(SyncMode::Full),
            other if other.contains('~') => SyncMode::parse_range(other),
            other => Err(SyncError::InvalidMode(other.to_string())),
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncMode::Incremental => f.write_str("incremental"),
            SyncMode::Full => f.write_str("full"),
            SyncMode::CreatedBetween { from, to } => write!(f, "{from}~{to}"),
        }
    }
}

/// The working set for one run.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Completed records to export.
    pub tasks: Vec<Record>,
    /// Recently modified records that are no longer completed.
    pub reverted: Vec<Record>,
    /// `cursor - 5 min`, when an incremental run had a usable cursor.
    pub threshold: Option<DateTime<Utc>>,
    /// Incremental run without a usable cursor.
    pub first_run: bool,
}

/// Split `records` into the working set for `mode`.
pub fn select_tasks(
    records: Vec<Record>,
    cursor: Option<DateTime<Utc>>,
    mode: &SyncMode,
) -> Selection {
    match mode {
        SyncMode::Full => Selection {
            tasks: records.into_iter().filter(|r| r.completed).collect(),
            ..Selection::default()
        },
        SyncMode::CreatedBetween { from, to } => Selection {
            tasks: records
                .into_iter()
                .filter(|r| r.completed && (*from..=*to).contains(&r.created_date()))
                .collect(),
            ..Selection::default()
        },
        SyncMode::Incremental => match cursor {
            None => Selection {
                tasks: records.into_iter().filter(|r| r.completed).collect(),
                first_run: true,
                ..Selection::default()
            },
            Some(cursor) => {
                let threshold = cursor - Duration::minutes(THRESHOLD_BUFFER_MINUTES);
                let (tasks, reverted): (Vec<Record>, Vec<Record>) = records
                    .into_iter()
                    .filter(|r| r.modified_at > threshold)
                    .partition(|r| r.completed);
                Selection {
                    tasks,
                    reverted,
                    threshold: Some(threshold),
                    first_run: false,
                }
            }
        },
    }
}

/// Withdraw artifacts of records that went back to active.
///
/// Failures are logged per record; the rest still get cleaned.
pub fn cleanup_reverted(store: &ArtifactStore, reverted: &[Record]) -> Vec<PathBuf> {
    let mut removed = Vec::new();
    for record in reverted {
        match store.remove_by_marker(record.id.as_str()) {
            Ok(paths) => {
                if !paths.is_empty() {
                    tracing::info!(
                        "record {} ({}) is active again; withdrew {} artifact(s)",
                        record.id,
                        record.title,
                        paths.len()
                    );
                }
                removed.extend(paths);
            }
            Err(e) => tracing::warn!("cleanup failed for record {}: {}", record.id, e),
        }
    }
    removed
}
