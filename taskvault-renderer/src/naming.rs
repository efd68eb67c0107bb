//! File and marker naming shared by the writer, the cleanup pass and the
//! Q&A miner.

use chrono::NaiveDate;

/// Longest artifact file name, `.md` included.
pub const MAX_ARTIFACT_NAME_CHARS: usize = 100;

/// Number of leading lines searched for the identifier marker.
pub const MARKER_SCAN_LINES: usize = 6;

const MAX_CLEAN_CHARS: usize = 80;

/// Replace path-hostile characters, drop newlines, trim, cap at 80 chars.
/// Empty input becomes `untitled`.
pub fn clean_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| *c != '\n' && *c != '\r')
        .map(|c| match c {
            '\\' | '/' | '*' | '?' | ':' | '"' | '<' | '>' | '|' => '_',
            other => other,
        })
        .collect();
    let trimmed: String = cleaned.trim().chars().take(MAX_CLEAN_CHARS).collect();
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed
    }
}

/// `YYYYMMDD_<clean title>.md`, cut to [`MAX_ARTIFACT_NAME_CHARS`].
pub fn artifact_file_name(created: NaiveDate, title: &str) -> String {
    let name = format!("{}_{}.md", created.format("%Y%m%d"), clean_filename(title));
    if name.chars().count() <= MAX_ARTIFACT_NAME_CHARS {
        return name;
    }
    let base: String = name
        .trim_end_matches(".md")
        .chars()
        .take(MAX_ARTIFACT_NAME_CHARS - 4)
        .collect();
    format!("{base}.md")
}

/// `<parent>_<attachment>_<clean name>`; unique per parent/attachment pair.
pub fn attachment_file_name(parent_id: &str, attachment_id: &str, name: &str) -> String {
    format!("{parent_id}_{attachment_id}_{}", clean_filename(name))
}

/// The front-matter line identifying which record an artifact came from.
pub fn identifier_marker(record_id: &str) -> String {
    format!("gid: {record_id}")
}
