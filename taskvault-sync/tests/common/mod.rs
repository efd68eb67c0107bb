//! In-memory tracker and oracle shared by the integration tests.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};

use taskvault_core::types::{
    parse_timestamp, Attachment, Comment, CommentId, CustomField, Membership, Project, ProjectId,
    Record, RecordId, RecordRef, Section, SectionId, COMMENT_SUBTYPE,
};
use taskvault_sync::error::{OracleError, TrackerError};
use taskvault_sync::prompts;
use taskvault_sync::{Oracle, Tracker};

pub const PROJECT: &str = "p-1";

pub fn ts(raw: &str) -> chrono::DateTime<chrono::Utc> {
    parse_timestamp(raw).expect("timestamp")
}

pub fn record(id: &str, title: &str, created: &str, modified: &str, completed: bool) -> Record {
    Record {
        id: RecordId::from(id),
        title: title.into(),
        notes: None,
        created_at: ts(created),
        modified_at: ts(modified),
        completed,
        due_on: None,
        permalink: Some(format!("https://app.asana.com/0/{PROJECT}/{id}")),
        custom_fields: vec![],
        memberships: vec![Membership {
            project_id: ProjectId::from(PROJECT),
            section_id: Some(SectionId::from("s-done")),
        }],
    }
}

pub fn expiry_field(value: Option<&str>) -> CustomField {
    CustomField {
        id: "cf-expiry".into(),
        name: "Knowledge Expiry".into(),
        display_value: value.map(str::to_string),
        subtype: Some("date".into()),
    }
}

pub fn comment(id: &str, author: &str, text: &str) -> Comment {
    Comment {
        id: CommentId::from(id),
        author: Some(author.into()),
        created_at: ts("2025-01-05T09:30:00Z"),
        subtype: COMMENT_SUBTYPE.into(),
        text: text.into(),
    }
}

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeTracker {
    pub sections: Vec<Section>,
    pub records: Vec<Record>,
    pub comments: BTreeMap<RecordId, Vec<Comment>>,
    pub attachments: BTreeMap<RecordId, Vec<Attachment>>,
    pub subrecords: BTreeMap<RecordId, Vec<RecordRef>>,
    /// Records served by `record()`; sub-records live here.
    pub details: BTreeMap<RecordId, Record>,
    pub downloads: BTreeMap<String, Vec<u8>>,
    pub fail_field_writes: bool,
    /// Records whose comment fetch fails with a 500.
    pub failing_comments: BTreeSet<RecordId>,
    pub field_writes: RefCell<Vec<(RecordId, String, String)>>,
    pub posted: RefCell<Vec<(RecordId, String)>>,
}

impl FakeTracker {
    pub fn new(records: Vec<Record>) -> Self {
        FakeTracker {
            sections: vec![
                Section {
                    id: SectionId::from("s-done"),
                    name: "Resolved".into(),
                },
                Section {
                    id: SectionId::from("s-internal"),
                    name: "Internal".into(),
                },
            ],
            records,
            ..FakeTracker::default()
        }
    }

    fn missing(what: &str, id: &str) -> TrackerError {
        TrackerError::Status {
            status: 404,
            message: format!("{what} {id} not found"),
        }
    }
}

impl Tracker for FakeTracker {
    fn project(&self, id: &ProjectId) -> Result<Project, TrackerError> {
        Ok(Project {
            id: id.clone(),
            name: "Support Desk".into(),
        })
    }

    fn sections(&self, _project: &ProjectId) -> Result<Vec<Section>, TrackerError> {
        Ok(self.sections.clone())
    }

    fn records(&self, _project: &ProjectId) -> Result<Vec<Record>, TrackerError> {
        Ok(self.records.clone())
    }

    fn record(&self, id: &RecordId) -> Result<Record, TrackerError> {
        self.details
            .get(id)
            .or_else(|| self.records.iter().find(|r| &r.id == id))
            .cloned()
            .ok_or_else(|| Self::missing("record", id.as_str()))
    }

    fn comments(&self, record: &RecordId) -> Result<Vec<Comment>, TrackerError> {
        if self.failing_comments.contains(record) {
            return Err(TrackerError::Status {
                status: 500,
                message: "internal error".into(),
            });
        }
        Ok(self.comments.get(record).cloned().unwrap_or_default())
    }

    fn attachments(&self, record: &RecordId) -> Result<Vec<Attachment>, TrackerError> {
        Ok(self.attachments.get(record).cloned().unwrap_or_default())
    }

    fn subrecords(&self, record: &RecordId) -> Result<Vec<RecordRef>, TrackerError> {
        Ok(self.subrecords.get(record).cloned().unwrap_or_default())
    }

    fn set_custom_field(
        &self,
        record: &RecordId,
        field: &CustomField,
        value: &str,
    ) -> Result<(), TrackerError> {
        self.field_writes
            .borrow_mut()
            .push((record.clone(), field.id.clone(), value.to_string()));
        if self.fail_field_writes {
            return Err(TrackerError::Status {
                status: 403,
                message: "forbidden".into(),
            });
        }
        Ok(())
    }

    fn post_comment(&self, record: &RecordId, text: &str) -> Result<(), TrackerError> {
        self.posted
            .borrow_mut()
            .push((record.clone(), text.to_string()));
        Ok(())
    }

    fn download(&self, url: &str) -> Result<Vec<u8>, TrackerError> {
        self.downloads
            .get(url)
            .cloned()
            .ok_or_else(|| TrackerError::Transport(format!("connection refused: {url}")))
    }
}

// ---------------------------------------------------------------------------
// Oracle
// ---------------------------------------------------------------------------

/// Redacts a fixed set of names, describes every image the same way, and
/// answers Q&A extraction with a canned completion.
pub struct FakeOracle {
    pub names: Vec<&'static str>,
    pub qa_answer: String,
    pub redaction_calls: Cell<usize>,
    pub image_calls: Cell<usize>,
    pub fail_redaction: bool,
}

impl Default for FakeOracle {
    fn default() -> Self {
        FakeOracle {
            names: vec!["Bob Lee", "Dana Scully"],
            qa_answer: r#"{"valid": false}"#.into(),
            redaction_calls: Cell::new(0),
            image_calls: Cell::new(0),
            fail_redaction: false,
        }
    }
}

impl FakeOracle {
    fn mask(&self, text: &str) -> String {
        self.names
            .iter()
            .fold(text.to_string(), |acc, name| acc.replace(name, "[PERSON]"))
    }
}

impl Oracle for FakeOracle {
    fn complete_json(
        &self,
        instruction: &str,
        payload: &str,
        _max_tokens: u32,
    ) -> Result<String, OracleError> {
        if instruction == prompts::QA_EXTRACTION {
            return Ok(self.qa_answer.clone());
        }
        self.redaction_calls.set(self.redaction_calls.get() + 1);
        if self.fail_redaction {
            return Err(OracleError::Status {
                status: 429,
                body: "rate limited".into(),
            });
        }
        let input: Map<String, Value> =
            serde_json::from_str(payload).map_err(|e| OracleError::Decode(e.to_string()))?;
        let output: Map<String, Value> = input
            .into_iter()
            .map(|(k, v)| {
                let masked = v.as_str().map(|s| self.mask(s)).unwrap_or_default();
                (k, Value::String(masked))
            })
            .collect();
        Ok(Value::Object(output).to_string())
    }

    fn analyze_image(
        &self,
        _instruction: &str,
        _image: &[u8],
        mime: &str,
    ) -> Result<String, OracleError> {
        self.image_calls.set(self.image_calls.get() + 1);
        Ok(format!("**Type**: screenshot ({mime}) showing error E42 for Bob Lee"))
    }
}
