//! Q&A mining over published knowledge artifacts.
//!
//! Every completed artifact under the output root is sent to the oracle,
//! which either rejects it or returns one question/answer pair. Accepted
//! pairs are written under the Q&A root at the same relative path, with a
//! relative link back to the source.

use std::path::{Component, Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use serde_yaml::Value as Yaml;

use taskvault_renderer::naming::clean_filename;
use taskvault_renderer::{QaPairContext, TemplateEngine};

use crate::error::{io_err, SyncError};
use crate::prompts;
use crate::remote::{parse_json_object, Oracle};
use crate::writer::{atomic_write, ATTACHMENT_DIR};

/// Completion budget for one extraction.
pub const QA_MAX_TOKENS: u32 = 2_000;

/// Oracle answer for one artifact. Missing fields take their defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct QaAnswer {
    valid: bool,
    question: String,
    answer: String,
    category: Option<String>,
    tags: Vec<String>,
}

impl QaAnswer {
    fn is_usable(&self) -> bool {
        self.valid && !self.question.trim().is_empty() && !self.answer.trim().is_empty()
    }
}

/// Counts for one mining pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QaReport {
    pub scanned: usize,
    /// No front matter, or status other than `completed`.
    pub skipped: usize,
    /// Rejected by the oracle.
    pub invalid: usize,
    pub written: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

pub struct QaMiner<'a> {
    oracle: &'a dyn Oracle,
    templates: &'a TemplateEngine,
    output_root: PathBuf,
    qa_root: PathBuf,
}

enum FileOutcome {
    Skipped,
    Invalid,
    Written(PathBuf),
}

impl<'a> QaMiner<'a> {
    pub fn new(
        oracle: &'a dyn Oracle,
        templates: &'a TemplateEngine,
        output_root: &Path,
        qa_root: &Path,
    ) -> Self {
        QaMiner {
            oracle,
            templates,
            output_root: output_root.to_path_buf(),
            qa_root: qa_root.to_path_buf(),
        }
    }

    /// Mine one project directory, or the whole output root when `project`
    /// is `None`.
    pub fn mine(&self, project: Option<&str>) -> Result<QaReport, SyncError> {
        let scan_root = match project {
            Some(name) => self.output_root.join(clean_filename(name)),
            None => self.output_root.clone(),
        };
        let mut files = Vec::new();
        if scan_root.is_dir() {
            collect_markdown(&scan_root, &mut files)?;
        } else {
            tracing::warn!("nothing to mine: {} does not exist", scan_root.display());
        }
        files.sort();

        let mut report = QaReport::default();
        for path in files {
            report.scanned += 1;
            match self.mine_file(&path) {
                Ok(FileOutcome::Skipped) => report.skipped += 1,
                Ok(FileOutcome::Invalid) => report.invalid += 1,
                Ok(FileOutcome::Written(out)) => report.written.push(out),
                Err(e) => {
                    tracing::warn!("Q&A extraction failed for {}: {}", path.display(), e);
                    report.failed.push((path, e.to_string()));
                }
            }
        }
        tracing::info!(
            "Q&A: {} scanned, {} written, {} rejected, {} skipped, {} failed",
            report.scanned,
            report.written.len(),
            report.invalid,
            report.skipped,
            report.failed.len()
        );
        Ok(report)
    }

    fn mine_file(&self, path: &Path) -> Result<FileOutcome, SyncError> {
        let raw = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        let Some((meta, body)) = split_front_matter(&raw) else {
            tracing::debug!("no front matter: {}", path.display());
            return Ok(FileOutcome::Skipped);
        };
        if meta_str(&meta, "status").as_deref() != Some("completed") {
            return Ok(FileOutcome::Skipped);
        }

        let completion = self
            .oracle
            .complete_json(prompts::QA_EXTRACTION, body, QA_MAX_TOKENS)?;
        let answer: QaAnswer = parse_json_object(&completion)
            .and_then(|map| serde_json::from_value(Value::Object(map)).ok())
            .unwrap_or_default();
        if !answer.is_usable() {
            tracing::debug!("no usable Q&A in {}", path.display());
            return Ok(FileOutcome::Invalid);
        }

        let rel = path.strip_prefix(&self.output_root).unwrap_or(path);
        let out = self.qa_root.join(rel);
        let out_dir = out.parent().unwrap_or(&self.qa_root);

        let ctx = QaPairContext {
            source_gid: meta_str(&meta, "gid").unwrap_or_default(),
            title: meta_str(&meta, "title").unwrap_or_default(),
            created_date: meta_str(&meta, "created_date").unwrap_or_default(),
            expiry_date: meta_str(&meta, "expiry_date").unwrap_or_default(),
            section: meta_str(&meta, "section").unwrap_or_default(),
            question: answer.question.trim().to_string(),
            answer: answer.answer.trim().to_string(),
            category: answer.category.filter(|c| !c.trim().is_empty()),
            tags: answer.tags,
            source_link: relative_link(out_dir, path),
        };
        let doc = self.templates.render_qa_pair(&ctx)?;
        atomic_write(&out, doc.as_bytes())?;
        tracing::info!("Q&A written: {}", out.display());
        Ok(FileOutcome::Written(out))
    }
}

/// Recursively collect `*.md` files, skipping attachment directories.
fn collect_markdown(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), SyncError> {
    let entries = std::fs::read_dir(dir).map_err(|e| io_err(dir, e))?;
    for entry in entries {
        let path = entry.map_err(|e| io_err(dir, e))?.path();
        if path.is_dir() {
            if path.file_name().is_some_and(|n| n == ATTACHMENT_DIR) {
                continue;
            }
            collect_markdown(&path, out)?;
        } else if path.extension().and_then(|e| e.to_str()) == Some("md") {
            out.push(path);
        }
    }
    Ok(())
}

/// Split `---` front matter from the body. `None` when the document has no
/// front matter or it is not a YAML mapping.
fn split_front_matter(raw: &str) -> Option<(Yaml, &str)> {
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    let rest = raw.strip_prefix("---\n")?;
    let end = rest.find("\n---\n")?;
    let meta: Yaml = serde_yaml::from_str(&rest[..end]).ok()?;
    if !meta.is_mapping() {
        return None;
    }
    Some((meta, &rest[end + "\n---\n".len()..]))
}

/// Scalar front-matter value as a string.
fn meta_str(meta: &Yaml, key: &str) -> Option<String> {
    match meta.get(key)? {
        Yaml::String(s) => Some(s.clone()),
        Yaml::Number(n) => Some(n.to_string()),
        Yaml::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// `/`-separated path from directory `from` to file `to`.
fn relative_link(from: &Path, to: &Path) -> String {
    let from: Vec<Component> = from.components().collect();
    let to: Vec<Component> = to.components().collect();
    let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();

    let mut parts: Vec<String> = vec!["..".to_string(); from.len() - common];
    parts.extend(
        to[common..]
            .iter()
            .map(|c| c.as_os_str().to_string_lossy().into_owned()),
    );
    parts.join("/")
}
