//! Expiry field reconciliation.
//!
//! The tracker's expiry custom field is the single source of truth for how
//! long a knowledge artifact stays valid. A value set by a person is never
//! touched; an empty field is back-filled once with `created + 365 days`.

use chrono::{Duration, NaiveDate};

use taskvault_core::config::ExpiryFieldConfig;
use taskvault_core::types::Record;

use crate::remote::Tracker;

/// Default validity of a knowledge artifact.
pub const EXPIRY_DAYS: i64 = 365;

/// Which branch reconciliation took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpiryOutcome {
    /// The field carried a value; used verbatim.
    Existing(String),
    /// The field was empty; a computed value was written back (`written`
    /// is false when the write failed).
    BackFilled { value: String, written: bool },
    /// The record has no expiry field; the computed value is used locally.
    Computed(String),
}

impl ExpiryOutcome {
    pub fn value(&self) -> &str {
        match self {
            ExpiryOutcome::Existing(v) | ExpiryOutcome::Computed(v) => v,
            ExpiryOutcome::BackFilled { value, .. } => value,
        }
    }

    /// True when a write-back was attempted.
    pub fn attempted_write(&self) -> bool {
        matches!(self, ExpiryOutcome::BackFilled { .. })
    }
}

pub fn default_expiry(created: NaiveDate) -> NaiveDate {
    created + Duration::days(EXPIRY_DAYS)
}

/// Position of the expiry field in `record`, by configured id when set,
/// otherwise by name.
fn find_field(record: &Record, cfg: &ExpiryFieldConfig) -> Option<usize> {
    match cfg.id.as_deref() {
        Some(id) => record.custom_fields.iter().position(|cf| cf.id == id),
        None => record.custom_fields.iter().position(|cf| cf.name == cfg.name),
    }
}

/// Resolve the expiry date for `record`, back-filling the tracker when the
/// field exists but is empty.
///
/// The in-memory record is updated to match what was (or would have been)
/// written, so later rendering sees the same value.
pub fn reconcile_expiry(
    tracker: &dyn Tracker,
    record: &mut Record,
    cfg: &ExpiryFieldConfig,
) -> ExpiryOutcome {
    let computed = default_expiry(record.created_date())
        .format("%Y-%m-%d")
        .to_string();

    let Some(idx) = find_field(record, cfg) else {
        return ExpiryOutcome::Computed(computed);
    };

    let field = record.custom_fields[idx].clone();
    if let Some(existing) = field.value() {
        return ExpiryOutcome::Existing(existing.to_string());
    }

    let written = match tracker.set_custom_field(&record.id, &field, &computed) {
        Ok(()) => {
            tracing::info!(
                "back-filled {} = {} on record {}",
                field.name,
                computed,
                record.id
            );
            true
        }
        Err(e) => {
            tracing::warn!(
                "could not write {} back to record {}: {}; using {} locally",
                field.name,
                record.id,
                e,
                computed
            );
            false
        }
    };

    if let Some(cf) = record.custom_fields.iter_mut().find(|cf| cf.id == field.id) {
        cf.display_value = Some(computed.clone());
    }

    ExpiryOutcome::BackFilled {
        value: computed,
        written,
    }
}
