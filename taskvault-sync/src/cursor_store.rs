//! Sync cursor store — per-project timestamp of the last successful sync.
//!
//! Persists a flat JSON object `{ "<project id>": "<timestamp>" }` at
//! `<home>/.taskvault/sync_record.json`. The whole document is loaded
//! eagerly and rewritten atomically (`.tmp` + rename) on every save.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use taskvault_core::config::taskvault_dir_at;
use taskvault_core::types::{format_timestamp, parse_timestamp, ProjectId};

use crate::error::{io_err, SyncError};

const STORE_FILE: &str = "sync_record.json";

/// `~/.taskvault/sync_record.json`
pub fn store_path_at(home: &Path) -> PathBuf {
    taskvault_dir_at(home).join(STORE_FILE)
}

#[derive(Debug, Clone)]
pub struct CursorStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl CursorStore {
    /// Load the store under `home`.
    pub fn load_at(home: &Path) -> Self {
        Self::open(store_path_at(home))
    }

    /// Load the store at `path`.
    ///
    /// A missing, unreadable or malformed file yields an empty store; the
    /// problem is logged and the next save replaces the file.
    pub fn open(path: PathBuf) -> Self {
        let entries = match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<BTreeMap<String, String>>(&contents) {
                Ok(map) => map,
                Err(e) => {
                    tracing::warn!("ignoring malformed sync record {}: {}", path.display(), e);
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                tracing::warn!("cannot read sync record {}: {}", path.display(), e);
                BTreeMap::new()
            }
        };
        CursorStore { path, entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Timestamp of the last sync, or `None` when never synchronized or the
    /// stored value does not parse.
    pub fn get_last_sync(&self, project: &ProjectId) -> Option<DateTime<Utc>> {
        let raw = self.entries.get(project.as_str())?;
        let parsed = parse_timestamp(raw);
        if parsed.is_none() {
            tracing::warn!(
                "stored sync time '{}' for project {} is not a timestamp; treating as never synced",
                raw,
                project
            );
        }
        parsed
    }

    /// Record `at` as the last sync time for `project` and persist.
    ///
    /// Returns `Ok(false)` without writing when `at` is older than the stored
    /// cursor.
    pub fn save_sync_time(
        &mut self,
        project: &ProjectId,
        at: DateTime<Utc>,
    ) -> Result<bool, SyncError> {
        if let Some(current) = self.get_last_sync(project) {
            if at < current {
                tracing::warn!(
                    "refusing to move sync cursor for {} back from {} to {}",
                    project,
                    format_timestamp(current),
                    format_timestamp(at)
                );
                return Ok(false);
            }
        }
        self.entries
            .insert(project.as_str().to_string(), format_timestamp(at));
        self.persist()?;
        Ok(true)
    }

    /// Raw stored entries, by project id.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn persist(&self) -> Result<(), SyncError> {
        let Some(dir) = self.path.parent() else {
            return Err(io_err(
                &self.path,
                std::io::Error::other("invalid sync record path"),
            ));
        };
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

        let json = serde_json::to_string_pretty(&self.entries)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| io_err(&tmp, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| io_err(&self.path, e))?;
        Ok(())
    }
}

/// Human-readable age of a timestamp: `42s`, `5m`, `3h`, `2d`.
pub fn format_age(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = now.signed_duration_since(at).num_seconds().max(0) as u64;
    if seconds < 60 {
        return format!("{seconds}s");
    }
    if seconds < 60 * 60 {
        return format!("{}m", seconds / 60);
    }
    if seconds < 60 * 60 * 24 {
        return format!("{}h", seconds / (60 * 60));
    }
    format!("{}d", seconds / (60 * 60 * 24))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ts(raw: &str) -> DateTime<Utc> {
        parse_timestamp(raw).unwrap()
    }

    fn pid() -> ProjectId {
        ProjectId::from("1200")
    }

    #[test]
    fn empty_store_when_file_missing() {
        let tmp = TempDir::new().unwrap();
        let store = CursorStore::load_at(tmp.path());
        assert!(store.get_last_sync(&pid()).is_none());
        assert_eq!(store.entries().count(), 0);
    }

    #[test]
    fn save_then_reload() {
        let tmp = TempDir::new().unwrap();
        let mut store = CursorStore::load_at(tmp.path());
        assert!(store.save_sync_time(&pid(), ts("2025-01-10T00:00:00Z")).unwrap());

        let raw = std::fs::read_to_string(store_path_at(tmp.path())).unwrap();
        assert!(raw.contains(r#""1200": "2025-01-10T00:00:00.000000Z""#), "{raw}");

        let reloaded = CursorStore::load_at(tmp.path());
        assert_eq!(reloaded.get_last_sync(&pid()), Some(ts("2025-01-10T00:00:00Z")));
        assert!(!store_path_at(tmp.path()).with_extension("json.tmp").exists());
    }

    #[test]
    fn cursor_never_moves_backwards() {
        let tmp = TempDir::new().unwrap();
        let mut store = CursorStore::load_at(tmp.path());
        store.save_sync_time(&pid(), ts("2025-01-10T00:00:00Z")).unwrap();
        assert!(!store.save_sync_time(&pid(), ts("2025-01-09T00:00:00Z")).unwrap());
        assert_eq!(store.get_last_sync(&pid()), Some(ts("2025-01-10T00:00:00Z")));
        assert!(store.save_sync_time(&pid(), ts("2025-01-10T00:00:00Z")).unwrap());
    }

    #[test]
    fn malformed_file_is_treated_as_empty() {
        let tmp = TempDir::new().unwrap();
        let path = store_path_at(tmp.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();
        let mut store = CursorStore::load_at(tmp.path());
        assert!(store.get_last_sync(&pid()).is_none());
        store.save_sync_time(&pid(), ts("2025-01-10T00:00:00Z")).unwrap();
        assert!(CursorStore::load_at(tmp.path()).get_last_sync(&pid()).is_some());
    }

    #[test]
    fn unparseable_value_means_never_synced() {
        let tmp = TempDir::new().unwrap();
        let path = store_path_at(tmp.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"1200": "yesterday"}"#).unwrap();
        let mut store = CursorStore::load_at(tmp.path());
        assert!(store.get_last_sync(&pid()).is_none());
        assert!(store.save_sync_time(&pid(), ts("2020-01-01T00:00:00Z")).unwrap());
    }

    #[test]
    fn accepts_second_precision_values() {
        let tmp = TempDir::new().unwrap();
        let path = store_path_at(tmp.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"1200": "2025-12-16T10:00:00Z"}"#).unwrap();
        let store = CursorStore::load_at(tmp.path());
        assert_eq!(store.get_last_sync(&pid()), Some(ts("2025-12-16T10:00:00.000Z")));
    }

    #[test]
    fn age_formatting() {
        let now = ts("2025-01-10T00:00:00Z");
        assert_eq!(format_age(ts("2025-01-09T23:59:30Z"), now), "30s");
        assert_eq!(format_age(ts("2025-01-09T23:55:00Z"), now), "5m");
        assert_eq!(format_age(ts("2025-01-09T21:00:00Z"), now), "3h");
        assert_eq!(format_age(ts("2025-01-08T00:00:00Z"), now), "2d");
        assert_eq!(format_age(ts("2025-01-11T00:00:00Z"), now), "0s");
    }
}
