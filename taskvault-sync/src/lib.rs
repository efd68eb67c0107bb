//! # taskvault-sync
//!
//! Sync engine: pulls completed records from the tracker, redacts them
//! through the oracle, and publishes Markdown knowledge artifacts with
//! content-gated atomic writes.
//!
//! Build a [`SyncEngine`] over a [`Tracker`] and an optional [`Oracle`],
//! then call [`SyncEngine::run`] once per profile. [`QaMiner`] runs the
//! separate Q&A stage over what the engine published.

pub mod context;
pub mod cursor_store;
pub mod error;
pub mod expiry;
pub mod pipeline;
pub mod prompts;
pub mod qa;
pub mod redaction;
pub mod remote;
pub mod selection;
pub mod writer;

pub use cursor_store::{format_age, CursorStore};
pub use error::{OracleError, SyncError, TrackerError};
pub use expiry::{reconcile_expiry, ExpiryOutcome};
pub use pipeline::{
    AdvancePrompt, AutoConfirm, Operator, RecordOutcome, RecordReport, RunReport, SyncEngine,
    SyncOutcome, SyncRequest,
};
pub use qa::{QaMiner, QaReport};
pub use redaction::{RedactionBatcher, RedactionLookup};
pub use remote::{Oracle, Tracker};
pub use selection::{select_tasks, Selection, SyncMode};
pub use writer::{ArtifactStore, WriteResult};
