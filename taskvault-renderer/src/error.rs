//! Error types for taskvault-renderer.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    /// Embedded or override templates failed to parse.
    #[error("templates failed to compile: {0}")]
    Compile(#[from] tera::Error),

    /// A named template failed while rendering a Q&A pair or preview.
    #[error("rendering '{name}' failed: {source}")]
    Template {
        name: &'static str,
        #[source]
        source: tera::Error,
    },

    /// A template context could not be converted to JSON.
    #[error("template context: {0}")]
    Context(#[from] serde_json::Error),

    /// An override directory or file could not be read.
    #[error("template override at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
