//! Markdown knowledge artifact for one record.
//!
//! # Layout
//!
//! ```text
//! ---                      front matter (type, gid marker, title, status,
//! ...                      dates, section, cf_<name> custom fields)
//! ---
//! # ✅ <title>
//! ## 📌 Overview           permalink, created date, custom fields
//! ## 📝 Description        body + inline asset blocks
//! ## 📎 Task attachments
//! ## 💬 Discussion         visible comments, their inline assets and uploads
//! ## 🔨 Sub-tasks
//! ## 🗂️ Other attachments  anything not placed above
//! ```
//!
//! Rendering is a pure function of the bundle and the text mapping. The
//! mapping is applied to human-authored text only; ids, timestamps and the
//! marker line are emitted verbatim.

use std::collections::{BTreeMap, BTreeSet};

use taskvault_core::types::{Attachment, AttachmentId, Comment, ContextBundle, SubRecord};

use crate::assets::asset_references;
use crate::naming::{clean_filename, identifier_marker};

/// `cf_<name>`, falling back to `cf_<name>_<field id>` (and then a counter)
/// when another field already produced the same key.
fn front_matter_key(name: &str, field_id: &str, taken: &BTreeSet<String>) -> String {
    let slug = |s: &str| clean_filename(s).replace(char::is_whitespace, "_");
    let key = format!("cf_{}", slug(name));
    if !taken.contains(&key) {
        return key;
    }
    let with_id = format!("{key}_{}", slug(field_id));
    let mut candidate = with_id.clone();
    let mut n = 2;
    while taken.contains(&candidate) {
        candidate = format!("{with_id}_{n}");
        n += 1;
    }
    candidate
}

/// Directory attachments live in, relative to a section directory.
pub const ATTACHMENT_LINK_PREFIX: &str = "../attachments/";

/// Render `bundle` into ordered Markdown lines.
///
/// `map` turns an original string into its published form (the redaction
/// lookup, or identity).
pub fn render_document(bundle: &ContextBundle, map: &dyn Fn(&str) -> String) -> Vec<String> {
    let mut doc = DocumentBuilder::new(bundle, map);
    doc.front_matter();
    doc.title();
    doc.overview();
    doc.description();
    doc.task_attachments();
    doc.discussion();
    doc.subrecords();
    doc.other_attachments();
    doc.lines
}

/// Join rendered lines into file contents.
pub fn to_markdown(lines: &[String]) -> String {
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Double-quoted YAML scalar on a single line.
pub fn yaml_quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push(' '),
            '\r' => {}
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

struct DocumentBuilder<'a> {
    bundle: &'a ContextBundle,
    map: &'a dyn Fn(&str) -> String,
    /// Every attachment in the bundle, first occurrence wins.
    index: BTreeMap<&'a AttachmentId, &'a Attachment>,
    /// Bundle order, for the catch-all section.
    order: Vec<&'a Attachment>,
    rendered: BTreeSet<AttachmentId>,
    lines: Vec<String>,
}

impl<'a> DocumentBuilder<'a> {
    fn new(bundle: &'a ContextBundle, map: &'a dyn Fn(&str) -> String) -> Self {
        let all = bundle
            .record_attachments
            .iter()
            .chain(bundle.comment_attachments.values().flatten())
            .chain(bundle.subrecords.iter().flat_map(|s| s.attachments.iter()));

        let mut index = BTreeMap::new();
        let mut order = Vec::new();
        for att in all {
            if !index.contains_key(&att.id) {
                index.insert(&att.id, att);
                order.push(att);
            }
        }

        DocumentBuilder {
            bundle,
            map,
            index,
            order,
            rendered: BTreeSet::new(),
            lines: Vec::new(),
        }
    }

    fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    fn mapped(&self, text: &str) -> String {
        (self.map)(text)
    }

    // -----------------------------------------------------------------------
    // Sections
    // -----------------------------------------------------------------------

    fn front_matter(&mut self) {
        let bundle = self.bundle;
        let record = &bundle.record;
        let title = self.mapped(&record.title);
        self.push("---");
        self.push("type: task");
        self.push(identifier_marker(record.id.as_str()));
        self.push(format!("title: {}", yaml_quote(&title)));
        self.push(format!("status: {}", record.status_label()));
        self.push(format!("created_date: {}", record.created_date()));
        self.push(format!(
            "modified_at: {}",
            taskvault_core::format_timestamp(record.modified_at)
        ));
        self.push(format!("expiry_date: {}", yaml_quote(&bundle.expiry_date)));
        self.push(format!("section: {}", yaml_quote(&bundle.section_name)));
        let mut keys = BTreeSet::new();
        for cf in &record.custom_fields {
            if let Some(value) = cf.value() {
                let key = front_matter_key(&cf.name, &cf.id, &keys);
                let line = format!("{key}: {}", yaml_quote(&self.mapped(value)));
                keys.insert(key);
                self.push(line);
            }
        }
        self.push("---");
        self.push("");
    }

    fn title(&mut self) {
        let bundle = self.bundle;
        let record = &bundle.record;
        let check = if record.completed { "✅" } else { "🔲" };
        let title = single_line(&self.mapped(&record.title));
        self.push(format!("# {check} {title}"));
    }

    fn overview(&mut self) {
        let bundle = self.bundle;
        let record = &bundle.record;
        self.push("");
        self.push("## 📌 Overview");
        if let Some(link) = record.permalink.as_deref() {
            self.push(format!("- **Link**: [Asana]({link})"));
        }
        self.push(format!("- **Created**: {}", record.created_date()));
        if let Some(due) = record.due_on {
            self.push(format!("- **Due**: {due}"));
        }
        let fields: Vec<_> = record
            .custom_fields
            .iter()
            .filter_map(|cf| cf.value().map(|v| (cf.name.as_str(), v)))
            .collect();
        if !fields.is_empty() {
            self.push("- **Custom fields**:");
            for (name, value) in fields {
                let line = format!("  - {name}: `{}`", self.mapped(value));
                self.push(line);
            }
        }
    }

    fn description(&mut self) {
        let bundle = self.bundle;
        self.push("");
        self.push("## 📝 Description");
        match bundle.record.notes.as_deref().filter(|n| !n.trim().is_empty()) {
            Some(notes) => {
                let body = self.mapped(notes);
                self.push(body);
                self.inline_assets(notes, "");
            }
            None => self.push("*(none)*"),
        }
    }

    fn task_attachments(&mut self) {
        let bundle = self.bundle;
        let pending: Vec<&Attachment> = bundle
            .record_attachments
            .iter()
            .filter(|a| !self.rendered.contains(&a.id))
            .collect();
        if pending.is_empty() {
            return;
        }
        self.push("");
        self.push("## 📎 Task attachments");
        for att in pending {
            self.attachment(att, "");
        }
    }

    fn discussion(&mut self) {
        let bundle = self.bundle;
        let visible: Vec<&Comment> = bundle
            .comments
            .iter()
            .filter(|c| c.is_visible())
            .collect();
        if visible.is_empty() {
            return;
        }
        self.push("");
        self.push("## 💬 Discussion");
        for comment in visible {
            let author = self.author(comment);
            let text = self.mapped(&comment.text).replace('\n', "  \n> ");
            self.push(format!(
                "> **{author} ({})**: {text}",
                comment.created_at.date_naive()
            ));
            self.inline_assets(&comment.text, "  ");
            if let Some(uploads) = bundle.comment_attachments.get(&comment.id) {
                for att in uploads {
                    if !self.rendered.contains(&att.id) {
                        self.attachment(att, "  ");
                    }
                }
            }
            self.push("");
        }
    }

    fn subrecords(&mut self) {
        let bundle = self.bundle;
        if bundle.subrecords.is_empty() {
            return;
        }
        self.push("");
        self.push("---");
        self.push("## 🔨 Sub-tasks");
        for (i, sub) in bundle.subrecords.iter().enumerate() {
            self.subrecord(i + 1, sub);
        }
    }

    fn subrecord(&mut self, n: usize, sub: &SubRecord) {
        let check = if sub.completed { "✅ " } else { "" };
        let title = single_line(&self.mapped(&sub.title));
        self.push(format!("### {n}. {check}{title}"));
        if let Some(notes) = sub.notes.as_deref().filter(|n| !n.trim().is_empty()) {
            let body = self.mapped(notes).replace('\n', "\n  > ");
            self.push(format!("  > {body}"));
            self.push("");
        }

        let pending: Vec<&Attachment> = sub
            .attachments
            .iter()
            .filter(|a| !self.rendered.contains(&a.id))
            .collect();
        if !pending.is_empty() {
            self.push("  - **Attachments**:");
            for att in pending {
                self.attachment(att, "    ");
            }
        }

        let visible: Vec<&Comment> = sub.comments.iter().filter(|c| c.is_visible()).collect();
        if !visible.is_empty() {
            self.push("  - **Comments**:");
            for comment in visible {
                let author = self.author(comment);
                let text = single_line(&self.mapped(&comment.text));
                self.push(format!(
                    "    - `{}` **{author}**: {text}",
                    comment.created_at.date_naive()
                ));
            }
        }
        self.push("");
    }

    fn other_attachments(&mut self) {
        let pending: Vec<&Attachment> = self
            .order
            .iter()
            .copied()
            .filter(|a| !self.rendered.contains(&a.id))
            .collect();
        if pending.is_empty() {
            return;
        }
        self.push("");
        self.push("## 🗂️ Other attachments");
        for att in pending {
            self.attachment(att, "");
        }
    }

    // -----------------------------------------------------------------------
    // Pieces
    // -----------------------------------------------------------------------

    fn author(&self, comment: &Comment) -> String {
        match comment.author.as_deref() {
            Some(name) => single_line(&self.mapped(name)),
            None => comment.author_or_default().to_string(),
        }
    }

    fn link(&self, att: &Attachment) -> String {
        let name = single_line(&self.mapped(&att.name));
        match (att.local_file.as_deref(), att.download_url.as_deref()) {
            (Some(file), _) => format!("[{name}]({ATTACHMENT_LINK_PREFIX}{file})"),
            (None, Some(url)) => format!("[{name} (not downloaded)]({url})"),
            (None, None) => format!("{name} (not downloaded)"),
        }
    }

    fn analysis(&self, att: &Attachment) -> Option<String> {
        att.analysis
            .as_deref()
            .filter(|a| !a.trim().is_empty())
            .map(|a| single_line(&self.mapped(a)))
    }

    fn attachment(&mut self, att: &Attachment, indent: &str) {
        self.rendered.insert(att.id.clone());
        let link = self.link(att);
        self.push(format!("{indent}- {link}"));
        if let Some(analysis) = self.analysis(att) {
            self.push(format!("{indent}  > 🖼️ **Analysis**: {analysis}"));
        }
    }

    /// Inline blocks for assets referenced in `original`. References are
    /// found in the unmapped text, since redaction may rewrite the URLs.
    fn inline_assets(&mut self, original: &str, indent: &str) {
        for id in asset_references(original) {
            let Some(att) = self.index.get(&id).copied() else {
                continue;
            };
            if !self.rendered.insert(id) {
                continue;
            }
            let link = self.link(att);
            self.push(format!("{indent}> 📎 {link}"));
            if let Some(analysis) = self.analysis(att) {
                self.push(format!("{indent}> 🖼️ **Analysis**: {analysis}"));
            }
        }
    }
}

fn single_line(s: &str) -> String {
    s.replace("\r\n", " ").replace('\n', " ")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
