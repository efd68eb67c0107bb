//! Knowledge artifact rendering over a fully populated bundle.

use taskvault_core::types::{
    Attachment, Comment, CommentId, ContextBundle, CustomField, ParentKind, ProjectId, Record,
    RecordId, SubRecord, COMMENT_SUBTYPE,
};
use taskvault_core::{parse_timestamp, AttachmentMap};
use taskvault_renderer::{naming, render_document, to_markdown};

fn comment(id: &str, author: &str, text: &str) -> Comment {
    Comment {
        id: CommentId::from(id),
        author: Some(author.into()),
        created_at: parse_timestamp("2025-02-01T12:00:00Z").unwrap(),
        subtype: COMMENT_SUBTYPE.into(),
        text: text.into(),
    }
}

fn downloaded(id: &str, name: &str, parent: (ParentKind, &str)) -> Attachment {
    let mut a = Attachment::new(id, name).with_parent(parent.0, parent.1);
    a.local_file = Some(naming::attachment_file_name("500", id, name));
    a
}

fn rich_bundle() -> ContextBundle {
    let raw = vec![
        downloaded("a-task", "spec.pdf", (ParentKind::Record, "500")),
        downloaded("a-c1", "before.png", (ParentKind::Comment, "c1")),
        downloaded("a-c2", "after.png", (ParentKind::Comment, "c2")),
        downloaded("a-orphan", "orphan.txt", (ParentKind::Comment, "c-missing")),
    ];
    let map = AttachmentMap::build(raw, &RecordId::from("500"));

    ContextBundle {
        project_id: ProjectId::from("p"),
        section_name: "Resolved".into(),
        record: Record {
            id: RecordId::from("500"),
            title: "VPN drops for Bob Lee".into(),
            notes: Some("Bob Lee reports drops every hour.".into()),
            created_at: parse_timestamp("2025-01-01T00:00:00Z").unwrap(),
            modified_at: parse_timestamp("2025-02-02T00:00:00Z").unwrap(),
            completed: true,
            due_on: None,
            permalink: None,
            custom_fields: vec![CustomField {
                id: "cf-owner".into(),
                name: "Reporter".into(),
                display_value: Some("Bob Lee".into()),
                subtype: None,
            }],
            memberships: vec![],
        },
        expiry_date: "2026-01-01".into(),
        comments: vec![
            comment("c1", "Bob Lee", "Screenshot attached"),
            comment("c2", "Dana", "Fixed after MTU change"),
        ],
        record_attachments: map.record,
        comment_attachments: map.by_comment,
        subrecords: vec![SubRecord {
            id: RecordId::from("501"),
            title: "Lower MTU".into(),
            notes: None,
            completed: true,
            comments: vec![],
            attachments: vec![],
        }],
    }
}

fn redact(s: &str) -> String {
    s.replace("Bob Lee", "[PERSON]")
}

#[test]
fn attachments_land_in_their_sections() {
    let lines = render_document(&rich_bundle(), &redact);
    let pos = |needle: &str| {
        lines
            .iter()
            .position(|l| l.contains(needle))
            .unwrap_or_else(|| panic!("missing line containing {needle}"))
    };

    let task_header = pos("## 📎 Task attachments");
    let discussion = pos("## 💬 Discussion");
    let other = pos("## 🗂️ Other attachments");

    assert!(pos("spec.pdf") > task_header && pos("spec.pdf") < discussion);
    assert_eq!(pos("before.png"), pos("Screenshot attached") + 1);
    assert_eq!(pos("after.png"), pos("Fixed after MTU change") + 1);
    assert!(pos("orphan.txt") > other, "comment missing from discussion goes to catch-all");
}

#[test]
fn every_attachment_rendered_exactly_once() {
    let out = to_markdown(&render_document(&rich_bundle(), &redact));
    for name in ["spec.pdf", "before.png", "after.png", "orphan.txt"] {
        assert_eq!(out.matches(&format!("[{name}]")).count(), 1, "{name}");
    }
}

#[test]
fn redaction_reaches_every_human_field() {
    let out = to_markdown(&render_document(&rich_bundle(), &redact));
    assert!(!out.contains("Bob Lee"), "unredacted name leaked:\n{out}");
    assert!(out.contains("# ✅ VPN drops for [PERSON]"));
    assert!(out.contains(r#"cf_Reporter: "[PERSON]""#));
    assert!(out.contains("> **[PERSON] (2025-02-01)**"));
}

#[test]
fn identical_inputs_give_identical_bytes() {
    let a = to_markdown(&render_document(&rich_bundle(), &redact));
    let b = to_markdown(&render_document(&rich_bundle(), &redact));
    assert_eq!(a, b);
}

#[test]
fn artifact_name_uses_redacted_title() {
    let b = rich_bundle();
    let name = naming::artifact_file_name(b.record.created_date(), &redact(&b.record.title));
    assert_eq!(name, "20250101_VPN drops for [PERSON].md");
}

#[test]
fn sections_appear_in_fixed_order() {
    let lines = render_document(&rich_bundle(), &redact);
    let order = [
        "# ✅",
        "## 📌 Overview",
        "## 📝 Description",
        "## 📎 Task attachments",
        "## 💬 Discussion",
        "## 🔨 Sub-tasks",
        "## 🗂️ Other attachments",
    ];
    let positions: Vec<usize> = order
        .iter()
        .map(|h| lines.iter().position(|l| l.starts_with(h)).unwrap())
        .collect();
    let mut sorted = positions.clone();
    sorted.sort_unstable();
    assert_eq!(positions, sorted);
}
