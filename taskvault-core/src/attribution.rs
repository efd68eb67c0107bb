//! Attachment attribution — which parent does each attachment really belong to?
//!
//! The tracker lists every attachment reachable from a record in one flat
//! list, including files uploaded inside comments. Rendering needs them split
//! so comment uploads sit under their comment rather than in the record's
//! attachment section.

use std::collections::BTreeMap;

use crate::types::{Attachment, CommentId, ParentKind, RecordId};

/// Partition of one record's attachments by parent.
///
/// Every input attachment lands in exactly one of `record` or `by_comment`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachmentMap {
    pub record: Vec<Attachment>,
    pub by_comment: BTreeMap<CommentId, Vec<Attachment>>,
}

impl AttachmentMap {
    /// Classify `attachments` fetched for `record_id`.
    ///
    /// Only attachments whose parent is a comment with a non-empty id go to
    /// `by_comment`. Everything else, including a missing or unrecognised
    /// parent, is kept on the record so nothing is silently dropped.
    pub fn build(attachments: Vec<Attachment>, record_id: &RecordId) -> Self {
        let mut map = AttachmentMap::default();
        for att in attachments {
            let comment_parent = att
                .parent
                .as_ref()
                .filter(|p| p.kind == ParentKind::Comment && !p.id.trim().is_empty())
                .map(|p| CommentId::from(p.id.trim()));

            match comment_parent {
                Some(comment_id) => map.by_comment.entry(comment_id).or_default().push(att),
                None => {
                    if let Some(parent) = att.parent.as_ref() {
                        if parent.kind == ParentKind::Record && parent.id != record_id.0 {
                            tracing::debug!(
                                "attachment {} reports parent record {}, attributing to {}",
                                att.id,
                                parent.id,
                                record_id
                            );
                        }
                    }
                    map.record.push(att);
                }
            }
        }
        map
    }

    /// Total number of attachments across both partitions.
    pub fn len(&self) -> usize {
        self.record.len() + self.by_comment.values().map(Vec::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mutable access to every attachment, record-level first.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Attachment> {
        self.record
            .iter_mut()
            .chain(self.by_comment.values_mut().flat_map(|v| v.iter_mut()))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use rstest::rstest;

    use super::*;
    use crate::types::AttachmentId;

    fn att(id: &str) -> Attachment {
        Attachment::new(id, format!("{id}.png"))
    }

    #[test]
    fn comment_attachments_are_grouped_by_comment() {
        let input = vec![
            att("a1").with_parent(ParentKind::Record, "r1"),
            att("a2").with_parent(ParentKind::Comment, "c1"),
            att("a3").with_parent(ParentKind::Comment, "c1"),
            att("a4").with_parent(ParentKind::Comment, "c2"),
        ];
        let map = AttachmentMap::build(input, &RecordId::from("r1"));

        assert_eq!(map.record.len(), 1);
        assert_eq!(map.by_comment[&CommentId::from("c1")].len(), 2);
        assert_eq!(map.by_comment[&CommentId::from("c2")].len(), 1);
        let c1: Vec<_> = map.by_comment[&CommentId::from("c1")]
            .iter()
            .map(|a| a.id.0.as_str())
            .collect();
        assert_eq!(c1, vec!["a2", "a3"], "input order preserved");
    }

    #[rstest]
    #[case::missing_parent(None)]
    #[case::unknown_kind(Some((ParentKind::Unknown, "x")))]
    #[case::comment_without_id(Some((ParentKind::Comment, "")))]
    #[case::comment_with_blank_id(Some((ParentKind::Comment, "  ")))]
    #[case::other_record(Some((ParentKind::Record, "someone-else")))]
    fn malformed_parents_default_to_record(#[case] parent: Option<(ParentKind, &str)>) {
        let mut a = att("a1");
        if let Some((kind, id)) = parent {
            a = a.with_parent(kind, id);
        }
        let map = AttachmentMap::build(vec![a], &RecordId::from("r1"));
        assert_eq!(map.record.len(), 1);
        assert!(map.by_comment.is_empty());
    }

    #[test]
    fn partition_is_exhaustive_and_disjoint() {
        let kinds = [ParentKind::Record, ParentKind::Comment, ParentKind::Unknown];
        let input: Vec<Attachment> = (0..30)
            .map(|i| {
                let a = att(&format!("a{i}"));
                match i % 4 {
                    0 => a,
                    n => a.with_parent(kinds[n - 1], format!("p{}", i % 3)),
                }
            })
            .collect();
        let expected: BTreeSet<AttachmentId> = input.iter().map(|a| a.id.clone()).collect();

        let map = AttachmentMap::build(input.clone(), &RecordId::from("r"));
        assert_eq!(map.len(), input.len());

        let seen: Vec<AttachmentId> = map
            .record
            .iter()
            .chain(map.by_comment.values().flatten())
            .map(|a| a.id.clone())
            .collect();
        let unique: BTreeSet<AttachmentId> = seen.iter().cloned().collect();
        assert_eq!(seen.len(), unique.len(), "no attachment duplicated");
        assert_eq!(unique, expected, "no attachment dropped");
    }

    #[test]
    fn empty_input_gives_empty_map() {
        let map = AttachmentMap::build(vec![], &RecordId::from("r"));
        assert!(map.is_empty());
    }
}
