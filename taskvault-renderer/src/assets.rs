//! In-text asset references.
//!
//! Users paste links to uploaded files straight into descriptions and
//! comments. The tracker renders those as
//! `https://app.asana.com/app/asana/-/get_asset?asset_id=<id>`; the id is the
//! attachment id, so the renderer can put the file next to the text that
//! mentions it.

use once_cell::sync::Lazy;
use regex::Regex;

use taskvault_core::types::AttachmentId;

static ASSET_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"https://app\.asana\.com/app/asana/-/get_asset\?asset_id=(\d+)")
        .expect("valid asset regex")
});

/// Attachment ids referenced in `text`, first occurrence order, no repeats.
pub fn asset_references(text: &str) -> Vec<AttachmentId> {
    let mut out: Vec<AttachmentId> = Vec::new();
    for caps in ASSET_RE.captures_iter(text) {
        let id = AttachmentId::from(&caps[1]);
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}
