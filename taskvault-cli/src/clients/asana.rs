//! Blocking Asana REST client.
//!
//! Responses are decoded into private DTOs and converted into core types
//! here; nothing past this module sees raw JSON.

use std::io::Read;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use taskvault_core::types::{
    Attachment, AttachmentId, Comment, CommentId, CustomField, Membership, ParentKind, ParentRef,
    Project, ProjectId, Record, RecordId, RecordRef, Section, SectionId,
};
use taskvault_sync::{Tracker, TrackerError};

const BASE_URL: &str = "https://app.asana.com/api/1.0";
const PAGE_LIMIT: &str = "100";

const TASK_FIELDS: &str = "gid,name,notes,created_at,modified_at,completed,due_on,permalink_url,\
memberships.project.gid,memberships.section.gid,\
custom_fields.gid,custom_fields.name,custom_fields.display_value,custom_fields.resource_subtype";
const STORY_FIELDS: &str = "gid,created_at,resource_subtype,text,created_by.name";
const ATTACHMENT_FIELDS: &str = "gid,name,download_url,parent.gid,parent.resource_type";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
    #[serde(default)]
    next_page: Option<NextPage>,
}

#[derive(Deserialize)]
struct NextPage {
    offset: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<ErrorItem>,
}

#[derive(Deserialize)]
struct ErrorItem {
    message: String,
}

#[derive(Deserialize)]
struct Compact {
    gid: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Deserialize)]
struct TaskDto {
    gid: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    modified_at: Option<DateTime<Utc>>,
    #[serde(default)]
    completed: bool,
    #[serde(default)]
    due_on: Option<NaiveDate>,
    #[serde(default)]
    permalink_url: Option<String>,
    #[serde(default)]
    custom_fields: Vec<CustomFieldDto>,
    #[serde(default)]
    memberships: Vec<MembershipDto>,
}

#[derive(Deserialize)]
struct CustomFieldDto {
    gid: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    display_value: Option<String>,
    #[serde(default)]
    resource_subtype: Option<String>,
}

#[derive(Deserialize)]
struct MembershipDto {
    #[serde(default)]
    project: Option<Compact>,
    #[serde(default)]
    section: Option<Compact>,
}

#[derive(Deserialize)]
struct StoryDto {
    gid: String,
    created_at: DateTime<Utc>,
    #[serde(default)]
    resource_subtype: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    created_by: Option<Compact>,
}

#[derive(Deserialize)]
struct AttachmentDto {
    gid: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    download_url: Option<String>,
    #[serde(default)]
    parent: Option<ParentDto>,
}

#[derive(Deserialize)]
struct ParentDto {
    #[serde(default)]
    gid: Option<String>,
    #[serde(default)]
    resource_type: Option<String>,
}

impl TryFrom<TaskDto> for Record {
    type Error = TrackerError;

    fn try_from(t: TaskDto) -> Result<Self, Self::Error> {
        let created_at = t
            .created_at
            .ok_or_else(|| TrackerError::Decode(format!("task {} has no created_at", t.gid)))?;
        Ok(Record {
            id: RecordId::from(t.gid),
            title: t.name.unwrap_or_default(),
            notes: t.notes.filter(|n| !n.is_empty()),
            created_at,
            modified_at: t.modified_at.unwrap_or(created_at),
            completed: t.completed,
            due_on: t.due_on,
            permalink: t.permalink_url,
            custom_fields: t
                .custom_fields
                .into_iter()
                .map(|cf| CustomField {
                    id: cf.gid,
                    name: cf.name.unwrap_or_default(),
                    display_value: cf.display_value,
                    subtype: cf.resource_subtype,
                })
                .collect(),
            memberships: t
                .memberships
                .into_iter()
                .filter_map(|m| {
                    Some(Membership {
                        project_id: ProjectId::from(m.project?.gid),
                        section_id: m.section.map(|s| SectionId::from(s.gid)),
                    })
                })
                .collect(),
        })
    }
}

impl From<StoryDto> for Comment {
    fn from(s: StoryDto) -> Self {
        Comment {
            id: CommentId::from(s.gid),
            author: s.created_by.and_then(|c| c.name),
            created_at: s.created_at,
            subtype: s.resource_subtype.unwrap_or_default(),
            text: s.text.unwrap_or_default(),
        }
    }
}

impl From<AttachmentDto> for Attachment {
    fn from(a: AttachmentDto) -> Self {
        let parent = a.parent.and_then(|p| {
            let kind = match p.resource_type.as_deref() {
                Some("task") => ParentKind::Record,
                Some("story") => ParentKind::Comment,
                _ => ParentKind::Unknown,
            };
            p.gid.map(|id| ParentRef { kind, id })
        });
        Attachment {
            id: AttachmentId::from(a.gid),
            name: a.name.unwrap_or_else(|| "attachment".to_string()),
            download_url: a.download_url.filter(|u| !u.is_empty()),
            parent,
            local_file: None,
            analysis: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct AsanaClient {
    agent: ureq::Agent,
    auth: String,
}

impl AsanaClient {
    pub fn new(token: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build();
        AsanaClient {
            agent,
            auth: format!("Bearer {token}"),
        }
    }

    fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Envelope<T>, TrackerError> {
        let mut req = self
            .agent
            .get(&format!("{BASE_URL}{path}"))
            .set("Authorization", &self.auth);
        for (k, v) in query {
            req = req.query(k, v);
        }
        let resp = req.call().map_err(map_err)?;
        resp.into_json()
            .map_err(|e| TrackerError::Decode(format!("{path}: {e}")))
    }

    /// Follow `next_page` offsets until exhausted.
    fn get_all<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, TrackerError> {
        let mut out = Vec::new();
        let mut offset: Option<String> = None;
        loop {
            let page: Envelope<Vec<T>> = {
                let mut q: Vec<(&str, &str)> = query.to_vec();
                q.push(("limit", PAGE_LIMIT));
                if let Some(o) = offset.as_deref() {
                    q.push(("offset", o));
                }
                self.get(path, &q)?
            };
            out.extend(page.data);
            match page.next_page {
                Some(next) => offset = Some(next.offset),
                None => break,
            }
        }
        Ok(out)
    }

    fn send(&self, method: &str, path: &str, body: Value) -> Result<(), TrackerError> {
        self.agent
            .request(method, &format!("{BASE_URL}{path}"))
            .set("Authorization", &self.auth)
            .send_json(body)
            .map_err(map_err)?;
        Ok(())
    }
}

fn map_err(e: ureq::Error) -> TrackerError {
    match e {
        ureq::Error::Status(status, resp) => {
            let message = resp
                .into_json::<ErrorBody>()
                .ok()
                .map(|b| {
                    b.errors
                        .into_iter()
                        .map(|e| e.message)
                        .collect::<Vec<_>>()
                        .join("; ")
                })
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "no error message".to_string());
            TrackerError::Status { status, message }
        }
        ureq::Error::Transport(t) => TrackerError::Transport(t.to_string()),
    }
}

/// Write payload for one custom field. Date fields take `{"date": ...}`.
fn custom_field_value(field: &CustomField, value: &str) -> Value {
    if field.subtype.as_deref() == Some("date") {
        json!({ "date": value })
    } else {
        json!(value)
    }
}

impl Tracker for AsanaClient {
    fn project(&self, id: &ProjectId) -> Result<Project, TrackerError> {
        let env: Envelope<Compact> =
            self.get(&format!("/projects/{id}"), &[("opt_fields", "gid,name")])?;
        Ok(Project {
            id: ProjectId::from(env.data.gid),
            name: env.data.name.unwrap_or_else(|| id.to_string()),
        })
    }

    fn sections(&self, project: &ProjectId) -> Result<Vec<Section>, TrackerError> {
        let sections: Vec<Compact> = self.get_all(
            &format!("/projects/{project}/sections"),
            &[("opt_fields", "gid,name")],
        )?;
        Ok(sections
            .into_iter()
            .map(|s| Section {
                id: SectionId::from(s.gid),
                name: s.name.unwrap_or_default(),
            })
            .collect())
    }

    fn records(&self, project: &ProjectId) -> Result<Vec<Record>, TrackerError> {
        let tasks: Vec<TaskDto> = self.get_all(
            &format!("/projects/{project}/tasks"),
            &[("opt_fields", TASK_FIELDS)],
        )?;
        tasks.into_iter().map(Record::try_from).collect()
    }

    fn record(&self, id: &RecordId) -> Result<Record, TrackerError> {
        let env: Envelope<TaskDto> =
            self.get(&format!("/tasks/{id}"), &[("opt_fields", TASK_FIELDS)])?;
        Record::try_from(env.data)
    }

    fn comments(&self, record: &RecordId) -> Result<Vec<Comment>, TrackerError> {
        let stories: Vec<StoryDto> = self.get_all(
            &format!("/tasks/{record}/stories"),
            &[("opt_fields", STORY_FIELDS)],
        )?;
        Ok(stories.into_iter().map(Comment::from).collect())
    }

    fn attachments(&self, record: &RecordId) -> Result<Vec<Attachment>, TrackerError> {
        let attachments: Vec<AttachmentDto> = self.get_all(
            "/attachments",
            &[("parent", record.as_str()), ("opt_fields", ATTACHMENT_FIELDS)],
        )?;
        Ok(attachments.into_iter().map(Attachment::from).collect())
    }

    fn subrecords(&self, record: &RecordId) -> Result<Vec<RecordRef>, TrackerError> {
        let subtasks: Vec<Compact> = self.get_all(
            &format!("/tasks/{record}/subtasks"),
            &[("opt_fields", "gid,name")],
        )?;
        Ok(subtasks
            .into_iter()
            .map(|s| RecordRef {
                id: RecordId::from(s.gid),
                title: s.name.unwrap_or_default(),
            })
            .collect())
    }

    fn set_custom_field(
        &self,
        record: &RecordId,
        field: &CustomField,
        value: &str,
    ) -> Result<(), TrackerError> {
        let body = json!({
            "data": { "custom_fields": { field.id.as_str(): custom_field_value(field, value) } }
        });
        self.send("PUT", &format!("/tasks/{record}"), body)
    }

    fn post_comment(&self, record: &RecordId, text: &str) -> Result<(), TrackerError> {
        self.send(
            "POST",
            &format!("/tasks/{record}/stories"),
            json!({ "data": { "text": text } }),
        )
    }

    fn download(&self, url: &str) -> Result<Vec<u8>, TrackerError> {
        // Download URLs are pre-signed; no auth header.
        let resp = self.agent.get(url).call().map_err(map_err)?;
        let mut bytes = Vec::new();
        resp.into_reader()
            .read_to_end(&mut bytes)
            .map_err(|e| TrackerError::Transport(e.to_string()))?;
        Ok(bytes)
    }
}
