//! Path resolver and persistent mutator.
//!
//! `apply` first walks the path read-only and checks that the edit fits the terminal
//! slot, and only then rebuilds the spine. The input document is never modified: a
//! failed edit leaves nothing behind, a successful one returns a new root whose
//! off-path subtrees are the very same `Arc`s as in the input.

use serde::{Deserialize, Serialize};

use crate::cv::navigate::{trail, Cursor, Node, Rebuild, Slot};
use crate::cv::path::{Path, PathError, Selector};
use crate::cv::schema::CvDocument;

/// A leaf value read from or written to the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
    /// An optional field that currently holds no value.
    Unset,
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(value: Vec<String>) -> Self {
        FieldValue::List(value)
    }
}

/// A single change applied at the end of a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    /// Replace the leaf (text, optional text, or a whole list of text).
    Set(FieldValue),
    /// Append a string to a list of text.
    Push(String),
    /// Append a default record to a list of records.
    PushEntry,
    /// Remove the element at this position from either kind of list.
    Remove(usize),
}

impl Edit {
    /// What the terminal slot must be for this edit to apply.
    pub fn expects(&self) -> &'static str {
        match self {
            Edit::Set(FieldValue::Text(_)) => "text",
            Edit::Set(FieldValue::List(_)) => "list of text",
            Edit::Set(FieldValue::Unset) => "optional text",
            Edit::Push(_) => "list of text",
            Edit::PushEntry => "list of records",
            Edit::Remove(_) => "list",
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Read-only resolution
// ────────────────────────────────────────────────────────────────────────────

/// What a fully walked path points at.
pub enum Target<'a> {
    Text(&'a str),
    OptionalText(Option<&'a str>),
    Texts(&'a [String]),
    Record(&'a dyn Node),
    Records(Vec<&'a dyn Node>),
}

impl Target<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            Target::Text(_) => "text",
            Target::OptionalText(_) => "optional text",
            Target::Texts(_) => "list of text",
            Target::Record(node) => node.kind(),
            Target::Records(_) => "list of records",
        }
    }
}

impl<'a> From<Slot<'a>> for Target<'a> {
    fn from(slot: Slot<'a>) -> Self {
        match slot {
            Slot::Text(s) => Target::Text(s),
            Slot::OptionalText(s) => Target::OptionalText(s),
            Slot::Texts(items) => Target::Texts(items),
            Slot::Record(node) => Target::Record(node),
            Slot::Records(items) => Target::Records(items),
        }
    }
}

/// Walks `path` from `root` without copying anything.
pub fn resolve<'a>(root: &'a dyn Node, path: &Path) -> Result<Target<'a>, PathError> {
    let steps = path.steps();
    let mut node = root;

    for (depth, step) in steps.iter().enumerate() {
        let here = || trail(&steps[..=depth]);
        let slot = node.slot(&step.name).ok_or_else(|| PathError::Resolution {
            path: here(),
            container: node.kind(),
            name: step.name.clone(),
        })?;

        let target = match (step.selector, slot) {
            (None, slot) => Target::from(slot),
            (Some(Selector::Id(_)), _) => return Err(PathError::UnresolvedId { path: here() }),
            (Some(Selector::Index(i)), Slot::Texts(items)) => match items.get(i) {
                Some(item) => Target::Text(item),
                None => {
                    return Err(PathError::IndexOutOfRange {
                        path: here(),
                        index: i,
                        len: items.len(),
                    })
                }
            },
            (Some(Selector::Index(i)), Slot::Records(items)) => match items.get(i) {
                Some(item) => Target::Record(*item),
                None => {
                    return Err(PathError::IndexOutOfRange {
                        path: here(),
                        index: i,
                        len: items.len(),
                    })
                }
            },
            (Some(Selector::Index(_)), other) => {
                return Err(PathError::TypeMismatch {
                    path: here(),
                    expected: "list",
                    found: other.kind(),
                })
            }
        };

        if depth + 1 == steps.len() {
            return Ok(target);
        }
        match target {
            Target::Record(next) => node = next,
            other => {
                return Err(PathError::Resolution {
                    path: trail(&steps[..=depth + 1]),
                    container: other.kind(),
                    name: steps[depth + 1].name.clone(),
                })
            }
        }
    }

    // Paths are non-empty by construction; reaching here means the loop never ran.
    Err(PathError::Syntax {
        path: String::new(),
        reason: "path is empty".to_string(),
    })
}

/// Checks that `edit` can be applied to `target` without touching anything.
fn check(target: &Target<'_>, edit: &Edit, path: &Path) -> Result<(), PathError> {
    let fits = match (edit, target) {
        (Edit::Set(FieldValue::Text(_)), Target::Text(_) | Target::OptionalText(_)) => true,
        (Edit::Set(FieldValue::Unset), Target::OptionalText(_)) => true,
        (Edit::Set(FieldValue::List(_)), Target::Texts(_)) => true,
        (Edit::Push(_), Target::Texts(_)) => true,
        (Edit::PushEntry, Target::Records(_)) => true,
        (Edit::Remove(index), Target::Texts(items)) => {
            return in_range(*index, items.len(), path);
        }
        (Edit::Remove(index), Target::Records(items)) => {
            return in_range(*index, items.len(), path);
        }
        _ => false,
    };
    if fits {
        Ok(())
    } else {
        Err(PathError::TypeMismatch {
            path: path.to_string(),
            expected: edit.expects(),
            found: target.kind(),
        })
    }
}

fn in_range(index: usize, len: usize, path: &Path) -> Result<(), PathError> {
    if index < len {
        Ok(())
    } else {
        Err(PathError::IndexOutOfRange {
            path: path.to_string(),
            index,
            len,
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Public API
// ────────────────────────────────────────────────────────────────────────────

/// Reads the leaf at `path`. Records and lists of records are not values.
pub fn get(document: &CvDocument, path: &Path) -> Result<FieldValue, PathError> {
    match resolve(document, path)? {
        Target::Text(s) => Ok(FieldValue::Text(s.to_string())),
        Target::OptionalText(Some(s)) => Ok(FieldValue::Text(s.to_string())),
        Target::OptionalText(None) => Ok(FieldValue::Unset),
        Target::Texts(items) => Ok(FieldValue::List(items.to_vec())),
        other => Err(PathError::TypeMismatch {
            path: path.to_string(),
            expected: "text or list of text",
            found: other.kind(),
        }),
    }
}

/// Number of elements in the sequence at `path`.
pub fn len(document: &CvDocument, path: &Path) -> Result<usize, PathError> {
    match resolve(document, path)? {
        Target::Texts(items) => Ok(items.len()),
        Target::Records(items) => Ok(items.len()),
        other => Err(PathError::TypeMismatch {
            path: path.to_string(),
            expected: "list",
            found: other.kind(),
        }),
    }
}

/// Returns a new document with `edit` applied at `path`.
pub fn apply(document: &CvDocument, path: &Path, edit: Edit) -> Result<CvDocument, PathError> {
    let target = resolve(document, path)?;
    check(&target, &edit, path)?;
    document.rebuild(Cursor::start(path.steps()), edit)
}

/// Returns a new document with the leaf at `path` replaced by `value`.
pub fn set(document: &CvDocument, path: &Path, value: FieldValue) -> Result<CvDocument, PathError> {
    apply(document, path, Edit::Set(value))
}

/// String-path convenience over [`get`].
pub fn get_str(document: &CvDocument, path: &str) -> Result<FieldValue, PathError> {
    get(document, &Path::parse(path)?)
}

/// String-path convenience over [`set`].
pub fn set_str(
    document: &CvDocument,
    path: &str,
    value: impl Into<FieldValue>,
) -> Result<CvDocument, PathError> {
    set(document, &Path::parse(path)?, value.into())
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::cv::schema::sample_document;

    fn path(s: &str) -> Path {
        Path::parse(s).unwrap()
    }

    #[test]
    fn test_get_reads_text_list_and_unset_leaves() {
        let doc = sample_document();
        assert_eq!(
            get_str(&doc, "experience[0].title").unwrap(),
            FieldValue::from("Engineer")
        );
        assert_eq!(
            get_str(&doc, "skills[0].items").unwrap(),
            FieldValue::List(vec!["A".to_string(), "B".to_string()])
        );
        assert_eq!(
            get_str(&doc, "personalInfo.website").unwrap(),
            FieldValue::Unset
        );
        assert_eq!(
            get_str(&doc, "experience[0].achievements[2]").unwrap(),
            FieldValue::from("Mentored 4 engineers")
        );
    }

    #[test]
    fn test_set_then_get_round_trips_for_every_leaf_kind() {
        let doc = sample_document();
        let cases: Vec<(&str, FieldValue)> = vec![
            ("summary", FieldValue::from("New summary")),
            ("personalInfo.name", FieldValue::from("Grace Hopper")),
            ("personalInfo.website", FieldValue::from("https://ada.dev")),
            ("experience[1].company", FieldValue::from("Initech")),
            ("experience[0].achievements[1]", FieldValue::from("Cut costs by 30%")),
            ("projects[0].url", FieldValue::from("https://engine.dev")),
            (
                "skills[1].items",
                FieldValue::List(vec!["Make".to_string()]),
            ),
            ("education[0].description", FieldValue::from("Self-taught")),
            ("certifications[0].date", FieldValue::from("1844")),
            ("languages[0].proficiency", FieldValue::from("C2")),
        ];
        for (p, value) in cases {
            let next = set(&doc, &path(p), value.clone()).unwrap();
            assert_eq!(get(&next, &path(p)).unwrap(), value, "round trip of {p}");
        }
    }

    #[test]
    fn test_set_never_mutates_the_input_document() {
        let doc = sample_document();
        let before = doc.clone();
        let snapshot = sample_document();
        let _ = set_str(&doc, "experience[0].achievements[0]", "Changed").unwrap();
        let _ = set_str(&doc, "personalInfo.name", "Changed").unwrap();
        assert_eq!(doc, before);
        assert_eq!(doc, snapshot);
    }

    #[test]
    fn test_set_shares_every_subtree_off_the_spine() {
        let doc = sample_document();
        let next = set_str(&doc, "experience[0].achievements[1]", "Changed").unwrap();

        // Spine is reallocated.
        assert!(!Arc::ptr_eq(&doc.experience, &next.experience));
        assert!(!Arc::ptr_eq(&doc.experience[0], &next.experience[0]));
        assert!(!Arc::ptr_eq(
            &doc.experience[0].achievements,
            &next.experience[0].achievements
        ));

        // Everything else is shared.
        assert!(Arc::ptr_eq(&doc.personal_info, &next.personal_info));
        assert!(Arc::ptr_eq(&doc.skills, &next.skills));
        assert!(Arc::ptr_eq(&doc.projects, &next.projects));
        assert!(Arc::ptr_eq(&doc.education, &next.education));
        assert!(Arc::ptr_eq(&doc.certifications, &next.certifications));
        assert!(Arc::ptr_eq(&doc.languages, &next.languages));
        assert!(Arc::ptr_eq(&doc.experience[1], &next.experience[1]));
        assert!(Arc::ptr_eq(
            &doc.experience[0].technologies,
            &next.experience[0].technologies
        ));
    }

    #[test]
    fn test_index_out_of_range_is_rejected_and_document_unchanged() {
        let doc = sample_document();
        let before = doc.clone();
        let err = set_str(&doc, "experience[99].title", "x").unwrap_err();
        assert!(
            matches!(err, PathError::IndexOutOfRange { index: 99, len: 2, .. }),
            "got {err:?}"
        );
        assert_eq!(doc, before);
    }

    #[test]
    fn test_writing_one_past_the_end_does_not_extend() {
        let doc = sample_document();
        let err = set_str(&doc, "skills[0].items[2]", "C").unwrap_err();
        assert!(matches!(err, PathError::IndexOutOfRange { index: 2, len: 2, .. }));
    }

    #[test]
    fn test_unknown_property_is_rejected() {
        let doc = sample_document();
        let err = set_str(&doc, "experience[0].salary", "100k").unwrap_err();
        match err {
            PathError::Resolution {
                container, name, ..
            } => {
                assert_eq!(container, "experience entry");
                assert_eq!(name, "salary");
            }
            other => panic!("expected resolution error, got {other:?}"),
        }
        assert!(matches!(
            get_str(&doc, "hobbies").unwrap_err(),
            PathError::Resolution { .. }
        ));
    }

    #[test]
    fn test_descending_past_a_leaf_is_a_resolution_error() {
        let doc = sample_document();
        let err = get_str(&doc, "summary.length").unwrap_err();
        assert!(matches!(err, PathError::Resolution { container: "text", .. }));
        let err = set_str(&doc, "skills[0].items[0].label", "x").unwrap_err();
        assert!(matches!(err, PathError::Resolution { container: "text", .. }));
    }

    #[test]
    fn test_type_mismatch_between_text_and_list() {
        let doc = sample_document();
        let err = set_str(&doc, "experience[0].achievements", "not a list").unwrap_err();
        assert!(matches!(
            err,
            PathError::TypeMismatch {
                expected: "text",
                found: "list of text",
                ..
            }
        ));

        let err = set(
            &doc,
            &path("experience[0].title"),
            FieldValue::List(vec!["x".to_string()]),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            PathError::TypeMismatch {
                expected: "list of text",
                found: "text",
                ..
            }
        ));
    }

    #[test]
    fn test_records_are_not_leaf_values() {
        let doc = sample_document();
        assert!(matches!(
            get_str(&doc, "experience[0]").unwrap_err(),
            PathError::TypeMismatch { .. }
        ));
        assert!(matches!(
            set_str(&doc, "personalInfo", "x").unwrap_err(),
            PathError::TypeMismatch { .. }
        ));
    }

    #[test]
    fn test_indexing_a_non_list_is_a_type_mismatch() {
        let doc = sample_document();
        let err = get_str(&doc, "summary[0]").unwrap_err();
        assert!(matches!(
            err,
            PathError::TypeMismatch {
                expected: "list",
                found: "text",
                ..
            }
        ));
    }

    #[test]
    fn test_unset_clears_optional_but_not_required_text() {
        let doc = sample_document();
        let cleared = set(&doc, &path("personalInfo.github"), FieldValue::Unset).unwrap();
        assert_eq!(cleared.personal_info.github, None);

        let err = set(&doc, &path("personalInfo.name"), FieldValue::Unset).unwrap_err();
        assert!(matches!(err, PathError::TypeMismatch { .. }));
    }

    #[test]
    fn test_push_and_remove_on_text_lists() {
        let doc = sample_document();
        let p = path("skills[0].items");
        let pushed = apply(&doc, &p, Edit::Push("C".to_string())).unwrap();
        assert_eq!(*pushed.skills[0].items, vec!["A", "B", "C"]);

        let removed = apply(&pushed, &p, Edit::Remove(1)).unwrap();
        assert_eq!(*removed.skills[0].items, vec!["A", "C"]);

        let err = apply(&removed, &p, Edit::Remove(2)).unwrap_err();
        assert!(matches!(err, PathError::IndexOutOfRange { index: 2, len: 2, .. }));
    }

    #[test]
    fn test_push_entry_and_remove_on_record_lists() {
        let doc = sample_document();
        let p = path("certifications");
        let pushed = apply(&doc, &p, Edit::PushEntry).unwrap();
        assert_eq!(pushed.certifications.len(), 2);
        assert_eq!(pushed.certifications[1].name, "");
        assert!(Arc::ptr_eq(&doc.certifications[0], &pushed.certifications[0]));

        let removed = apply(&pushed, &p, Edit::Remove(0)).unwrap();
        assert_eq!(removed.certifications.len(), 1);
        assert_eq!(removed.certifications[0].name, "");

        let err = apply(&doc, &path("skills[0].items"), Edit::PushEntry).unwrap_err();
        assert!(matches!(err, PathError::TypeMismatch { .. }));
    }

    #[test]
    fn test_id_selectors_must_be_resolved_first() {
        let doc = sample_document();
        let err = get_str(&doc, "experience[#1].title").unwrap_err();
        assert!(matches!(err, PathError::UnresolvedId { .. }));
    }

    #[test]
    fn test_len_counts_both_list_kinds() {
        let doc = sample_document();
        assert_eq!(len(&doc, &path("experience")).unwrap(), 2);
        assert_eq!(len(&doc, &path("experience[0].achievements")).unwrap(), 3);
        assert!(len(&doc, &path("summary")).is_err());
    }
}
