//! Redaction batcher — many strings in, one original→redacted lookup out.
//!
//! Strings are packed into batches bounded by [`MAX_CHARS_PER_BATCH`]
//! characters and sent to the oracle as `{ "0": text, "1": text, ... }`.
//! Whatever happens to a batch, every string it carried ends up as a key in
//! the lookup: a missing or malformed answer maps the string to itself.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};

use crate::prompts;
use crate::remote::{parse_json_object, Oracle};

/// Character budget per oracle request.
pub const MAX_CHARS_PER_BATCH: usize = 10_000;

const MIN_TOKENS: u32 = 1_000;
const MAX_TOKENS: u32 = 16_000;

/// Original → redacted text. A miss means "publish as is".
pub type RedactionLookup = BTreeMap<String, String>;

/// `clamp(chars * 1.5, 1000, 16000)`
pub fn token_budget(chars: usize) -> u32 {
    let estimate = (chars as f64 * 1.5) as u64;
    estimate.clamp(MIN_TOKENS as u64, MAX_TOKENS as u64) as u32
}

/// Sorted distinct strings worth sending: more than one character.
pub fn eligible<I, S>(strings: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    strings
        .into_iter()
        .map(Into::into)
        .filter(|s| s.chars().count() > 1)
        .collect::<BTreeSet<String>>()
        .into_iter()
        .collect()
}

pub struct RedactionBatcher<'a> {
    oracle: &'a dyn Oracle,
    budget: usize,
}

impl<'a> RedactionBatcher<'a> {
    pub fn new(oracle: &'a dyn Oracle) -> Self {
        RedactionBatcher {
            oracle,
            budget: MAX_CHARS_PER_BATCH,
        }
    }

    /// Override the per-batch character budget.
    pub fn with_budget(mut self, budget: usize) -> Self {
        self.budget = budget.max(1);
        self
    }

    /// Redact `strings`. Every eligible input is a key of the result.
    pub fn mask_texts<I, S>(&self, strings: I) -> RedactionLookup
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut lookup = RedactionLookup::new();
        self.mask_into(strings, &mut lookup);
        lookup
    }

    /// Redact the strings not already in `lookup` and merge the results.
    pub fn mask_into<I, S>(&self, strings: I, lookup: &mut RedactionLookup)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pending: Vec<String> = eligible(strings)
            .into_iter()
            .filter(|s| !lookup.contains_key(s))
            .collect();
        if pending.is_empty() {
            return;
        }
        let total: usize = pending.iter().map(|s| s.chars().count()).sum();
        tracing::debug!("redacting {} strings ({} chars)", pending.len(), total);

        let mut batch: Vec<&str> = Vec::new();
        let mut batch_chars = 0usize;

        for text in &pending {
            let len = text.chars().count();

            if len > self.budget {
                self.flush(&mut batch, &mut batch_chars, lookup);
                tracing::warn!(
                    "string of {} chars exceeds the {}-char batch budget; sending alone",
                    len,
                    self.budget
                );
                let mut alone = vec![text.as_str()];
                let mut alone_chars = len;
                self.flush(&mut alone, &mut alone_chars, lookup);
                continue;
            }

            if batch_chars + len > self.budget {
                self.flush(&mut batch, &mut batch_chars, lookup);
            }
            batch.push(text.as_str());
            batch_chars += len;
        }
        self.flush(&mut batch, &mut batch_chars, lookup);
    }

    fn flush(&self, batch: &mut Vec<&str>, chars: &mut usize, lookup: &mut RedactionLookup) {
        if batch.is_empty() {
            return;
        }
        let results = self.send(batch, *chars);
        let mut missing = 0usize;
        for (idx, original) in batch.iter().enumerate() {
            let redacted = results
                .as_ref()
                .and_then(|r| r.get(&idx.to_string()))
                .and_then(Value::as_str);
            match redacted {
                Some(r) => {
                    lookup.insert((*original).to_string(), r.to_string());
                }
                None => {
                    missing += 1;
                    lookup.insert((*original).to_string(), (*original).to_string());
                }
            }
        }
        if results.is_some() && missing > 0 {
            tracing::debug!("{} of {} strings kept unredacted (no answer)", missing, batch.len());
        }
        batch.clear();
        *chars = 0;
    }

    /// One oracle round-trip. `None` on any failure.
    fn send(&self, batch: &[&str], chars: usize) -> Option<Map<String, Value>> {
        let payload: Map<String, Value> = batch
            .iter()
            .enumerate()
            .map(|(idx, text)| (idx.to_string(), Value::String((*text).to_string())))
            .collect();
        let payload = match serde_json::to_string(&payload) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!("cannot encode redaction batch: {}", e);
                return None;
            }
        };

        match self
            .oracle
            .complete_json(prompts::REDACTION, &payload, token_budget(chars))
        {
            Ok(raw) => {
                let parsed = parse_json_object(&raw);
                if parsed.is_none() {
                    tracing::warn!(
                        "redaction batch of {} strings ({} chars) returned non-object JSON; keeping originals",
                        batch.len(),
                        chars
                    );
                }
                parsed
            }
            Err(e) => {
                tracing::warn!(
                    "redaction batch of {} strings ({} chars) failed: {}; keeping originals",
                    batch.len(),
                    chars,
                    e
                );
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
