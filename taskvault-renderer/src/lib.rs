//! # taskvault-renderer
//!
//! Turns a [`ContextBundle`](taskvault_core::ContextBundle) into a Markdown
//! knowledge artifact, and renders the tera templates for mined Q&A pairs and
//! redaction previews.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use taskvault_renderer::{render_document, to_markdown};
//! use taskvault_core::ContextBundle;
//!
//! fn publish(bundle: &ContextBundle) -> String {
//!     let lines = render_document(bundle, &|s: &str| s.to_string());
//!     to_markdown(&lines)
//! }
//! ```

pub mod assets;
pub mod context;
pub mod document;
pub mod engine;
pub mod error;
pub mod naming;

pub use context::{PreviewComment, PreviewContext, QaPairContext};
pub use document::{render_document, to_markdown, yaml_quote};
pub use engine::TemplateEngine;
pub use error::RenderError;
