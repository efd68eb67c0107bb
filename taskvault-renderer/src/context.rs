//! Template contexts — serializable payloads for the tera templates.

use serde::{Deserialize, Serialize};

use crate::error::RenderError;

/// One mined question/answer pair plus the provenance of its source artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaPairContext {
    pub source_gid: String,
    pub title: String,
    pub created_date: String,
    pub expiry_date: String,
    pub section: String,
    pub question: String,
    pub answer: String,
    pub category: Option<String>,
    pub tags: Vec<String>,
    /// Relative link from the Q&A document back to the source artifact.
    pub source_link: String,
}

/// One visible comment in a redacted preview.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewComment {
    pub author: String,
    pub text: String,
}

/// Redacted preview posted back to the tracker for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewContext {
    pub title: String,
    pub notes: String,
    pub comments: Vec<PreviewComment>,
}

pub(crate) fn to_tera_context<T: Serialize>(value: &T) -> Result<tera::Context, RenderError> {
    let json = serde_json::to_value(value)?;
    Ok(tera::Context::from_value(json)?)
}
