//! Collaborator seams: the task tracker and the classification oracle.
//!
//! The engine only ever sees these traits. Blocking HTTP implementations
//! live in the CLI crate; tests use in-memory fakes.

use serde_json::{Map, Value};

use taskvault_core::types::{
    Attachment, Comment, CustomField, Project, ProjectId, Record, RecordId, RecordRef, Section,
};

use crate::error::{OracleError, TrackerError};

/// Read access to projects and records, plus the two writes the engine
/// performs (expiry back-fill and the audit preview comment).
pub trait Tracker {
    fn project(&self, id: &ProjectId) -> Result<Project, TrackerError>;

    fn sections(&self, project: &ProjectId) -> Result<Vec<Section>, TrackerError>;

    /// Every record in the project, with the fields selection and rendering
    /// need (dates, completion, notes, memberships, custom fields).
    fn records(&self, project: &ProjectId) -> Result<Vec<Record>, TrackerError>;

    fn record(&self, id: &RecordId) -> Result<Record, TrackerError>;

    /// All stories on a record, system events included, oldest first.
    fn comments(&self, record: &RecordId) -> Result<Vec<Comment>, TrackerError>;

    /// Every attachment reachable from the record, comment uploads included.
    fn attachments(&self, record: &RecordId) -> Result<Vec<Attachment>, TrackerError>;

    fn subrecords(&self, record: &RecordId) -> Result<Vec<RecordRef>, TrackerError>;

    /// Set `field` on `record` to `value`. Date-typed fields take
    /// `YYYY-MM-DD`.
    fn set_custom_field(
        &self,
        record: &RecordId,
        field: &CustomField,
        value: &str,
    ) -> Result<(), TrackerError>;

    fn post_comment(&self, record: &RecordId, text: &str) -> Result<(), TrackerError>;

    fn download(&self, url: &str) -> Result<Vec<u8>, TrackerError>;
}

/// A chat-completion model used for redaction, image description and Q&A
/// extraction.
pub trait Oracle {
    /// Send `payload` under `instruction`, asking for a JSON object back.
    /// Returns the raw completion text.
    fn complete_json(
        &self,
        instruction: &str,
        payload: &str,
        max_tokens: u32,
    ) -> Result<String, OracleError>;

    /// Describe an image. Returns free text.
    fn analyze_image(
        &self,
        instruction: &str,
        image: &[u8],
        mime: &str,
    ) -> Result<String, OracleError>;
}

/// Parse an oracle completion as a JSON object.
///
/// Models sometimes wrap JSON in a Markdown code fence even in JSON mode; the
/// fence is stripped first. Anything that is not an object is `None`.
pub fn parse_json_object(raw: &str) -> Option<Map<String, Value>> {
    let trimmed = raw.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed);
    match serde_json::from_str::<Value>(body.trim()) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}
