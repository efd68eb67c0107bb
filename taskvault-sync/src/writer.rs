//! Artifact store — where rendered documents and downloaded files land.
//!
//! ```text
//! <output_root>/<project>/
//!   <section>/<YYYYMMDD_title>.md
//!   attachments/<parent>_<attachment>_<name>
//! ```
//!
//! Every write goes to a `.tmp` sibling first and is renamed into place.
//! Artifact writes are content-gated: when the SHA-256 of the new content
//! matches the file on disk, nothing is written.

use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use taskvault_renderer::naming::{clean_filename, identifier_marker, MARKER_SCAN_LINES};

use crate::error::{io_err, SyncError};

/// Attachment directory name inside a project directory.
pub const ATTACHMENT_DIR: &str = "attachments";

// ---------------------------------------------------------------------------
// Write result
// ---------------------------------------------------------------------------

/// Outcome of an individual artifact write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    /// File was written (content changed or did not previously exist).
    Written { path: PathBuf },
    /// File was skipped; content matches what is already on disk.
    Unchanged { path: PathBuf },
}

impl WriteResult {
    pub fn path(&self) -> &Path {
        match self {
            WriteResult::Written { path } | WriteResult::Unchanged { path } => path,
        }
    }
}

// ---------------------------------------------------------------------------
// atomic_write
// ---------------------------------------------------------------------------

/// Write `bytes` to `path` through a `.tmp` sibling, creating parents.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), SyncError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    let tmp = PathBuf::from(format!("{}.tmp", path.display()));
    std::fs::write(&tmp, bytes).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

fn digest(bytes: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(bytes);
    hex::encode(h.finalize())
}

// ---------------------------------------------------------------------------
// ArtifactStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    project_dir: PathBuf,
}

impl ArtifactStore {
    /// Store for `project_name` under `output_root`. The project name is
    /// sanitized into a directory name.
    pub fn new(output_root: &Path, project_name: &str) -> Self {
        ArtifactStore {
            project_dir: output_root.join(clean_filename(project_name)),
        }
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn attachments_dir(&self) -> PathBuf {
        self.project_dir.join(ATTACHMENT_DIR)
    }

    /// Directory for `section`. A section whose name collides with the
    /// attachment directory gets a trailing `_`.
    pub fn section_dir(&self, section: &str) -> PathBuf {
        let mut name = clean_filename(section);
        if name.eq_ignore_ascii_case(ATTACHMENT_DIR) {
            name.push('_');
        }
        self.project_dir.join(name)
    }

    /// Write an artifact into `section`, skipping identical content.
    pub fn write_artifact(
        &self,
        section: &str,
        file_name: &str,
        contents: &str,
    ) -> Result<WriteResult, SyncError> {
        let path = self.section_dir(section).join(file_name);
        let normalized = contents.replace("\r\n", "\n");

        if let Ok(existing) = std::fs::read(&path) {
            if digest(&existing) == digest(normalized.as_bytes()) {
                tracing::debug!("unchanged: {}", path.display());
                return Ok(WriteResult::Unchanged { path });
            }
        }

        atomic_write(&path, normalized.as_bytes())?;
        tracing::info!("wrote: {}", path.display());
        Ok(WriteResult::Written { path })
    }

    /// Save downloaded attachment bytes; always overwrites.
    pub fn write_attachment(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf, SyncError> {
        let path = self.attachments_dir().join(file_name);
        atomic_write(&path, bytes)?;
        tracing::debug!("saved attachment: {}", path.display());
        Ok(path)
    }

    /// Artifacts whose first lines carry the marker for `record_id`.
    ///
    /// Only direct `*.md` children of section directories are considered;
    /// the attachment directory is skipped. Results are sorted.
    pub fn find_by_marker(&self, record_id: &str) -> Result<Vec<PathBuf>, SyncError> {
        let marker = identifier_marker(record_id);
        let mut found = Vec::new();
        if !self.project_dir.is_dir() {
            return Ok(found);
        }
        let sections = std::fs::read_dir(&self.project_dir).map_err(|e| io_err(&self.project_dir, e))?;
        for section in sections {
            let section = section.map_err(|e| io_err(&self.project_dir, e))?.path();
            if !section.is_dir() || section.file_name().is_some_and(|n| n == ATTACHMENT_DIR) {
                continue;
            }
            let files = std::fs::read_dir(&section).map_err(|e| io_err(&section, e))?;
            for file in files {
                let path = file.map_err(|e| io_err(&section, e))?.path();
                if path.extension().and_then(|e| e.to_str()) != Some("md") {
                    continue;
                }
                match has_marker(&path, &marker) {
                    Ok(true) => found.push(path),
                    Ok(false) => {}
                    Err(e) => tracing::debug!("skipping unreadable {}: {}", path.display(), e),
                }
            }
        }
        found.sort();
        Ok(found)
    }

    /// Delete every artifact for `record_id`. Returns the removed paths.
    pub fn remove_by_marker(&self, record_id: &str) -> Result<Vec<PathBuf>, SyncError> {
        self.remove_matching(record_id, None)
    }

    /// Delete artifacts for `record_id` other than `keep`, e.g. after a
    /// title or section change moved the record to a new file.
    pub fn remove_stale(&self, record_id: &str, keep: &Path) -> Result<Vec<PathBuf>, SyncError> {
        self.remove_matching(record_id, Some(keep))
    }

    fn remove_matching(
        &self,
        record_id: &str,
        keep: Option<&Path>,
    ) -> Result<Vec<PathBuf>, SyncError> {
        let mut removed = Vec::new();
        for path in self.find_by_marker(record_id)? {
            if keep == Some(path.as_path()) {
                continue;
            }
            std::fs::remove_file(&path).map_err(|e| io_err(&path, e))?;
            tracing::info!("removed artifact for record {}: {}", record_id, path.display());
            removed.push(path);
        }
        Ok(removed)
    }
}

/// True when one of the first [`MARKER_SCAN_LINES`] lines equals `marker`.
fn has_marker(path: &Path, marker: &str) -> std::io::Result<bool> {
    let file = std::fs::File::open(path)?;
    for line in BufReader::new(file).lines().take(MARKER_SCAN_LINES) {
        if line?.trim_end() == marker {
            return Ok(true);
        }
    }
    Ok(false)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
