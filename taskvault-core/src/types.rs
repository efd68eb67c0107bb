//! Domain types for records pulled from the task tracker.
//!
//! Everything here is validated at the HTTP boundary; downstream code never
//! sees loosely-typed JSON. Timestamps are `DateTime<Utc>`, dates that only
//! carry a day are `NaiveDate`.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

string_id!(
    /// Tracker project identifier.
    ProjectId
);
string_id!(
    /// Section (column / category) identifier within a project.
    SectionId
);
string_id!(
    /// Record (task) identifier. Sub-records use the same id space.
    RecordId
);
string_id!(
    /// Comment (story) identifier.
    CommentId
);
string_id!(
    /// Attachment identifier.
    AttachmentId
);

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

/// Render a timestamp the way the sync cursor stores it:
/// `2025-01-10T00:00:00.000000Z`.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse an ISO-8601 / RFC 3339 timestamp, with or without fractional
/// seconds. Returns `None` for anything else.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

// ---------------------------------------------------------------------------
// Projects and sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: SectionId,
    pub name: String,
}

/// Where a record sits: one entry per project it is multi-homed in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub project_id: ProjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_id: Option<SectionId>,
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A named custom field as attached to one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomField {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_value: Option<String>,
    /// Tracker-side field type (`date`, `text`, `enum`, ...), when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
}

impl CustomField {
    /// The display value, treating an empty or whitespace-only string as unset.
    pub fn value(&self) -> Option<&str> {
        self.display_value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}

/// A unit of work from the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_on: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permalink: Option<String>,
    #[serde(default)]
    pub custom_fields: Vec<CustomField>,
    #[serde(default)]
    pub memberships: Vec<Membership>,
}

impl Record {
    pub fn created_date(&self) -> NaiveDate {
        self.created_at.date_naive()
    }

    /// Section this record belongs to inside `project`, if any.
    pub fn section_in(&self, project: &ProjectId) -> Option<&SectionId> {
        self.memberships
            .iter()
            .filter(|m| &m.project_id == project)
            .find_map(|m| m.section_id.as_ref())
    }

    pub fn status_label(&self) -> &'static str {
        if self.completed {
            "completed"
        } else {
            "active"
        }
    }
}

/// Lightweight reference returned when listing sub-records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordRef {
    pub id: RecordId,
    pub title: String,
}

// ---------------------------------------------------------------------------
// Comments
// ---------------------------------------------------------------------------

/// Subtype carried by user-authored comments; every other subtype is a
/// system event (assignment, due-date change, ...) with no visible text.
pub const COMMENT_SUBTYPE: &str = "comment_added";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
    pub subtype: String,
    #[serde(default)]
    pub text: String,
}

impl Comment {
    pub fn is_visible(&self) -> bool {
        self.subtype == COMMENT_SUBTYPE
    }

    pub fn author_or_default(&self) -> &str {
        self.author.as_deref().unwrap_or("User")
    }
}

// ---------------------------------------------------------------------------
// Attachments
// ---------------------------------------------------------------------------

/// What kind of object an attachment hangs off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParentKind {
    Record,
    Comment,
    /// Anything the tracker reports that we do not model.
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentRef {
    pub kind: ParentKind,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: AttachmentId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ParentRef>,
    /// File name inside the project's attachment directory, once downloaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_file: Option<String>,
    /// Vision-oracle analysis of the attachment content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,
}

impl Attachment {
    pub fn new(id: impl Into<AttachmentId>, name: impl Into<String>) -> Self {
        Attachment {
            id: id.into(),
            name: name.into(),
            download_url: None,
            parent: None,
            local_file: None,
            analysis: None,
        }
    }

    pub fn with_parent(mut self, kind: ParentKind, id: impl Into<String>) -> Self {
        self.parent = Some(ParentRef {
            kind,
            id: id.into(),
        });
        self
    }

    pub fn with_download_url(mut self, url: impl Into<String>) -> Self {
        self.download_url = Some(url.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Context bundle
// ---------------------------------------------------------------------------

/// A child record with its own discussion and attachments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubRecord {
    pub id: RecordId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub completed: bool,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl SubRecord {
    /// A sub-record whose full context could not be fetched.
    pub fn from_ref(r: &RecordRef) -> Self {
        SubRecord {
            id: r.id.clone(),
            title: r.title.clone(),
            notes: None,
            completed: false,
            comments: Vec::new(),
            attachments: Vec::new(),
        }
    }
}

/// Everything needed to render one record. Built fresh per record and never
/// persisted directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextBundle {
    pub project_id: ProjectId,
    pub section_name: String,
    pub record: Record,
    pub expiry_date: String,
    pub comments: Vec<Comment>,
    pub record_attachments: Vec<Attachment>,
    pub comment_attachments: BTreeMap<CommentId, Vec<Attachment>>,
    pub subrecords: Vec<SubRecord>,
}

impl ContextBundle {
    /// Every human-authored string in the bundle, in a stable order.
    ///
    /// This is the redaction input: titles, bodies, visible comment text and
    /// authors, attachment names and analyses, custom field values.
    pub fn free_texts(&self) -> Vec<String> {
        let mut out = Vec::new();
        let mut push = |s: Option<&str>| {
            if let Some(s) = s.filter(|s| !s.is_empty()) {
                out.push(s.to_string());
            }
        };

        push(Some(self.record.title.as_str()));
        push(self.record.notes.as_deref());
        for cf in &self.record.custom_fields {
            push(cf.value());
        }
        for comment in self.comments.iter().filter(|c| c.is_visible()) {
            push(Some(comment.text.as_str()));
            push(comment.author.as_deref());
        }
        let attachments = self
            .record_attachments
            .iter()
            .chain(self.comment_attachments.values().flatten());
        for att in attachments {
            push(Some(att.name.as_str()));
            push(att.analysis.as_deref());
        }
        for sub in &self.subrecords {
            push(Some(sub.title.as_str()));
            push(sub.notes.as_deref());
            for att in &sub.attachments {
                push(Some(att.name.as_str()));
                push(att.analysis.as_deref());
            }
            for comment in sub.comments.iter().filter(|c| c.is_visible()) {
                push(Some(comment.text.as_str()));
                push(comment.author.as_deref());
            }
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(raw: &str) -> DateTime<Utc> {
        parse_timestamp(raw).expect("timestamp")
    }

    #[test]
    fn timestamp_format_uses_microseconds_and_z() {
        let t = ts("2025-01-10T00:00:00Z");
        assert_eq!(format_timestamp(t), "2025-01-10T00:00:00.000000Z");
    }

    #[test]
    fn parse_accepts_with_and_without_fraction() {
        assert_eq!(
            ts("2025-12-16T10:00:00.123456Z"),
            ts("2025-12-16T10:00:00.123456+00:00")
        );
        assert!(parse_timestamp("2025-12-16T10:00:00Z").is_some());
        assert!(parse_timestamp("not a date").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn section_lookup_is_scoped_to_project() {
        let now = Utc::now();
        let record = Record {
            id: RecordId::from("1"),
            title: "t".into(),
            notes: None,
            created_at: now,
            modified_at: now,
            completed: true,
            due_on: None,
            permalink: None,
            custom_fields: vec![],
            memberships: vec![
                Membership {
                    project_id: ProjectId::from("other"),
                    section_id: Some(SectionId::from("s-other")),
                },
                Membership {
                    project_id: ProjectId::from("p"),
                    section_id: Some(SectionId::from("s-1")),
                },
            ],
        };
        assert_eq!(
            record.section_in(&ProjectId::from("p")),
            Some(&SectionId::from("s-1"))
        );
        assert!(record.section_in(&ProjectId::from("missing")).is_none());
    }

    #[test]
    fn blank_custom_field_value_counts_as_unset() {
        let cf = CustomField {
            id: "cf".into(),
            name: "Expiry".into(),
            display_value: Some("   ".into()),
            subtype: None,
        };
        assert!(cf.value().is_none());
    }

    #[test]
    fn only_comment_subtype_is_visible() {
        let mut c = Comment {
            id: CommentId::from("c"),
            author: None,
            created_at: Utc::now(),
            subtype: COMMENT_SUBTYPE.into(),
            text: "hi".into(),
        };
        assert!(c.is_visible());
        assert_eq!(c.author_or_default(), "User");
        c.subtype = "assigned".into();
        assert!(!c.is_visible());
    }

    #[test]
    fn ids_serialize_transparently() {
        let json = serde_json::to_string(&RecordId::from("42")).unwrap();
        assert_eq!(json, "\"42\"");
    }
}
