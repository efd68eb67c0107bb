//! Context assembly: everything one record needs before rendering.
//!
//! Comments, attachments (attributed to record or comment) and sub-records
//! are fetched, then attachments are hydrated: downloaded into the artifact
//! store and, for images, described by the vision oracle.

use std::path::Path;

use taskvault_core::config::Features;
use taskvault_core::types::{
    Attachment, ContextBundle, ProjectId, Record, RecordId, RecordRef, SubRecord,
};
use taskvault_core::AttachmentMap;
use taskvault_renderer::naming::attachment_file_name;

use crate::error::TrackerError;
use crate::prompts;
use crate::remote::{Oracle, Tracker};
use crate::writer::ArtifactStore;

/// MIME type for the image extensions the vision oracle accepts.
pub fn image_mime(file_name: &str) -> Option<&'static str> {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())?
        .to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "bmp" => Some("image/bmp"),
        _ => None,
    }
}

pub struct ContextFetcher<'a> {
    tracker: &'a dyn Tracker,
    oracle: Option<&'a dyn Oracle>,
    store: &'a ArtifactStore,
    features: &'a Features,
}

impl<'a> ContextFetcher<'a> {
    pub fn new(
        tracker: &'a dyn Tracker,
        oracle: Option<&'a dyn Oracle>,
        store: &'a ArtifactStore,
        features: &'a Features,
    ) -> Self {
        ContextFetcher {
            tracker,
            oracle,
            store,
            features,
        }
    }

    /// Build the bundle for `record`.
    ///
    /// Failing to list comments, attachments or sub-records fails the
    /// record; a sub-record whose own context cannot be fetched is kept
    /// with empty comments and attachments.
    pub fn fetch(
        &self,
        project_id: &ProjectId,
        section_name: &str,
        record: Record,
        expiry_date: String,
    ) -> Result<ContextBundle, TrackerError> {
        let comments = self.tracker.comments(&record.id)?;
        let attachments = self.tracker.attachments(&record.id)?;
        let mut map = AttachmentMap::build(attachments, &record.id);
        for att in map.iter_mut() {
            self.hydrate(att, &record.id);
        }

        let subrecords = self
            .tracker
            .subrecords(&record.id)?
            .iter()
            .map(|r| self.fetch_subrecord(r))
            .collect();

        Ok(ContextBundle {
            project_id: project_id.clone(),
            section_name: section_name.to_string(),
            record,
            expiry_date,
            comments,
            record_attachments: map.record,
            comment_attachments: map.by_comment,
            subrecords,
        })
    }

    fn fetch_subrecord(&self, r: &RecordRef) -> SubRecord {
        match self.try_fetch_subrecord(r) {
            Ok(sub) => sub,
            Err(e) => {
                tracing::warn!("sub-record {} ({}) context unavailable: {}", r.id, r.title, e);
                SubRecord::from_ref(r)
            }
        }
    }

    fn try_fetch_subrecord(&self, r: &RecordRef) -> Result<SubRecord, TrackerError> {
        let detail = self.tracker.record(&r.id)?;
        let comments = self.tracker.comments(&r.id)?;
        let mut attachments = self.tracker.attachments(&r.id)?;
        for att in attachments.iter_mut() {
            self.hydrate(att, &r.id);
        }
        Ok(SubRecord {
            id: detail.id,
            title: detail.title,
            notes: detail.notes,
            completed: detail.completed,
            comments,
            attachments,
        })
    }

    /// Download and analyse one attachment. Failures leave the attachment
    /// un-hydrated and are logged.
    fn hydrate(&self, att: &mut Attachment, parent: &RecordId) {
        if !self.features.download_attachments {
            return;
        }
        let Some(url) = att.download_url.as_deref() else {
            return;
        };
        let bytes = match self.tracker.download(url) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!("download of {} ({}) failed: {}", att.name, att.id, e);
                return;
            }
        };
        let file = attachment_file_name(parent.as_str(), att.id.as_str(), &att.name);
        if let Err(e) = self.store.write_attachment(&file, &bytes) {
            tracing::warn!("could not save attachment {}: {}", file, e);
            return;
        }
        att.local_file = Some(file);

        if !self.features.analyze_images {
            return;
        }
        let (Some(oracle), Some(mime)) = (self.oracle, image_mime(&att.name)) else {
            return;
        };
        match oracle.analyze_image(prompts::IMAGE_ANALYSIS, &bytes, mime) {
            Ok(text) if !text.trim().is_empty() => att.analysis = Some(text.trim().to_string()),
            Ok(_) => tracing::debug!("empty analysis for {}", att.name),
            Err(e) => tracing::warn!("image analysis of {} failed: {}", att.name, e),
        }
    }
}
