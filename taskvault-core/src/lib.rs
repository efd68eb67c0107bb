//! taskvault core library — domain types, attachment attribution, settings.
//!
//! - [`types`] — id newtypes, records, comments, attachments, context bundles
//! - [`attribution`] — split a record's attachments by parent
//! - [`config`] — `~/.taskvault/config.yaml` + environment overrides
//! - [`error`] — [`ConfigError`]

pub mod attribution;
pub mod config;
pub mod error;
pub mod types;

pub use attribution::AttachmentMap;
pub use config::{ExpiryFieldConfig, Features, OracleEndpoint, OracleSettings, Profile, Settings};
pub use error::ConfigError;
pub use types::{
    format_timestamp, parse_timestamp, Attachment, AttachmentId, Comment, CommentId,
    ContextBundle, CustomField, Membership, ParentKind, ParentRef, Project, ProjectId, Record,
    RecordId, RecordRef, Section, SectionId, SubRecord,
};
