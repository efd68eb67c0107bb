//! Tera engine for the secondary documents: mined Q&A pairs and the
//! redaction preview comment.
//!
//! | Template                  | Used by                          |
//! |---------------------------|----------------------------------|
//! | `qa_pair.md.tera`         | Q&A miner, one file per pair     |
//! | `preview_comment.tera`    | audit preview posted to tracker  |
//!
//! Knowledge artifacts themselves come from [`crate::document`], not from
//! a template.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tera::Tera;

use crate::context::{to_tera_context, PreviewContext, QaPairContext};
use crate::error::RenderError;

pub const QA_PAIR_TEMPLATE: &str = "qa_pair.md.tera";
pub const PREVIEW_TEMPLATE: &str = "preview_comment.tera";

// ---------------------------------------------------------------------------
// Embedded templates, baked in via include_str!
// ---------------------------------------------------------------------------

const TPLS: &[(&str, &str)] = &[
    (QA_PAIR_TEMPLATE, include_str!("templates/qa_pair.md.tera")),
    (PREVIEW_TEMPLATE, include_str!("templates/preview_comment.tera")),
];

// ---------------------------------------------------------------------------
// Template loading helpers
// ---------------------------------------------------------------------------

fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RenderError {
    RenderError::Io { path: path.into(), source }
}

fn normalize_template_name(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/").to_lowercase()
}

fn load_user_templates(dir: &Path) -> Result<Vec<(String, String)>, RenderError> {
    if !dir.exists() {
        return Ok(vec![]);
    }
    let mut templates = Vec::new();
    let entries = std::fs::read_dir(dir).map_err(|e| io_err(dir, e))?;
    for entry in entries {
        let path = entry.map_err(|e| io_err(dir, e))?.path();
        if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some("tera") {
            continue;
        }
        let rel = path.strip_prefix(dir).unwrap_or(path.as_path());
        let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        templates.push((normalize_template_name(rel), contents));
    }
    Ok(templates)
}

fn build_tera(user_template_dir: Option<&Path>) -> Result<Tera, RenderError> {
    let mut templates: HashMap<String, String> = HashMap::new();
    for (name, content) in TPLS {
        templates.insert(normalize_template_name(Path::new(name)), (*content).to_string());
    }
    if let Some(dir) = user_template_dir {
        for (name, content) in load_user_templates(dir)? {
            tracing::debug!("template override: {}", name);
            templates.insert(name, content);
        }
    }

    let mut tera = Tera::default();
    let items: Vec<(String, String)> = templates.into_iter().collect();
    tera.add_raw_templates(items)?;
    Ok(tera)
}

// ---------------------------------------------------------------------------
// TemplateEngine
// ---------------------------------------------------------------------------

/// Tera-based engine with optional user overrides.
///
/// `user_template_dir` may contain `.tera` files named like the embedded
/// ones; those replace the defaults.
pub struct TemplateEngine {
    tera: Tera,
}

impl TemplateEngine {
    pub fn new(user_template_dir: Option<&Path>) -> Result<Self, RenderError> {
        let tera = build_tera(user_template_dir)?;
        Ok(TemplateEngine { tera })
    }

    pub fn render_qa_pair(&self, ctx: &QaPairContext) -> Result<String, RenderError> {
        self.render(QA_PAIR_TEMPLATE, &to_tera_context(ctx)?)
    }

    pub fn render_preview(&self, ctx: &PreviewContext) -> Result<String, RenderError> {
        self.render(PREVIEW_TEMPLATE, &to_tera_context(ctx)?)
    }

    fn render(&self, name: &'static str, ctx: &tera::Context) -> Result<String, RenderError> {
        self.tera
            .render(name, ctx)
            .map_err(|source| RenderError::Template { name, source })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::PreviewComment;

    fn qa() -> QaPairContext {
        QaPairContext {
            source_gid: "1001".into(),
            title: "Printer \"jam\"".into(),
            created_date: "2025-01-01".into(),
            expiry_date: "2026-01-01".into(),
            section: "Done".into(),
            question: "Why does the printer jam?".into(),
            answer: "Replace the fuser.".into(),
            category: Some("Hardware".into()),
            tags: vec!["printer".into(), "fuser".into()],
            source_link: "../knowledge/Ops/Done/20250101_Printer.md".into(),
        }
    }

    #[test]
    fn engine_new_succeeds() {
        TemplateEngine::new(None).expect("embedded templates compile");
    }

    #[test]
    fn qa_pair_renders_front_matter_and_body() {
        let engine = TemplateEngine::new(None).unwrap();
        let out = engine.render_qa_pair(&qa()).unwrap();
        assert!(out.starts_with("---\ntype: qa_pair\n"));
        assert!(out.contains(r#"title: "Printer \"jam\"""#));
        assert!(out.contains("# ❓ Why does the printer jam?"));
        assert!(out.contains("printer, fuser"));
        assert!(out.contains("(../knowledge/Ops/Done/20250101_Printer.md)"));
        assert!(!out.contains('\r'));
    }

    #[test]
    fn qa_pair_without_tags_omits_tag_section() {
        let engine = TemplateEngine::new(None).unwrap();
        let mut ctx = qa();
        ctx.tags.clear();
        ctx.category = None;
        let out = engine.render_qa_pair(&ctx).unwrap();
        assert!(!out.contains("Tags"));
        assert!(!out.contains("category:"));
    }

    #[test]
    fn preview_lists_comments() {
        let engine = TemplateEngine::new(None).unwrap();
        let out = engine
            .render_preview(&PreviewContext {
                title: "[PERSON] printer".into(),
                notes: String::new(),
                comments: vec![PreviewComment {
                    author: "[PERSON]".into(),
                    text: "fixed".into(),
                }],
            })
            .unwrap();
        assert!(out.contains("Title: [PERSON] printer"));
        assert!(out.contains("(none)"));
        assert!(out.contains("- [PERSON]: fixed"));
    }

    #[test]
    fn broken_override_names_the_template() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("preview_comment.tera"), "{{ missing.field }}").unwrap();
        let engine = TemplateEngine::new(Some(dir.path())).unwrap();
        let err = engine
            .render_preview(&PreviewContext {
                title: "t".into(),
                notes: String::new(),
                comments: vec![],
            })
            .unwrap_err();
        assert!(matches!(err, RenderError::Template { name: PREVIEW_TEMPLATE, .. }));
    }

    #[test]
    fn user_override_replaces_embedded_template() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("preview_comment.tera"), "custom {{ title }}").unwrap();
        let engine = TemplateEngine::new(Some(dir.path())).unwrap();
        let out = engine
            .render_preview(&PreviewContext {
                title: "t".into(),
                notes: String::new(),
                comments: vec![],
            })
            .unwrap();
        assert_eq!(out, "custom t");
    }
}
