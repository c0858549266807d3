//! Builder state store: the single owner of the document being edited.
//!
//! Holds the frozen `original`, the `current` document (replaced wholesale on every
//! edit, never mutated in place), the stable item ids, the edit/ATS flags and the
//! customization record. Every document edit is all-or-nothing: the mutator validates
//! the full path before building anything, and `current`, the ids and the revision are
//! only updated once it succeeded.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::cv::mutator::{self, Edit, FieldValue, Target};
use crate::cv::path::{Path, PathError, Selector};
use crate::cv::schema::{Customization, CustomizationPatch, CvDocument};
use crate::cv::{Identities, ItemId, ResolvedPath};

/// Describes one applied document edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    /// Id-form path of the field or sequence that changed.
    pub path: Path,
    pub revision: u64,
}

impl Change {
    /// True when a consumer bound to `bound` must re-render.
    pub fn affects(&self, bound: &Path) -> bool {
        bound.starts_with(&self.path) || self.path.starts_with(bound)
    }
}

#[derive(Debug, Clone)]
pub struct BuilderStore {
    original: Arc<CvDocument>,
    current: Arc<CvDocument>,
    identities: Identities,
    editing: bool,
    ats_mode: bool,
    customization: Customization,
    revision: u64,
}

impl BuilderStore {
    pub fn new(document: CvDocument) -> Self {
        Self::with_customization(document, Customization::default())
    }

    pub fn with_customization(document: CvDocument, customization: Customization) -> Self {
        let original = Arc::new(document);
        let current = Arc::new(CvDocument::clone(&original));
        let identities = Identities::assign(current.as_ref());
        Self {
            original,
            current,
            identities,
            editing: false,
            ats_mode: false,
            customization,
            revision: 0,
        }
    }

    // ── Reads ───────────────────────────────────────────────────────────────

    pub fn current(&self) -> &Arc<CvDocument> {
        &self.current
    }

    pub fn original(&self) -> &Arc<CvDocument> {
        &self.original
    }

    pub fn identities(&self) -> &Identities {
        &self.identities
    }

    pub fn is_editing(&self) -> bool {
        self.editing
    }

    pub fn ats_mode(&self) -> bool {
        self.ats_mode
    }

    pub fn customization(&self) -> &Customization {
        &self.customization
    }

    /// Incremented on every applied document edit and on reset.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Reads the leaf at `path`, which may use positions or item ids.
    pub fn value_at(&self, path: &str) -> Result<FieldValue, PathError> {
        let resolved = self.resolve(path)?;
        mutator::get(&self.current, &resolved.indexed)
    }

    /// Stable ids of the sequence at `path`, in position order.
    pub fn item_ids(&self, path: &str) -> Result<Vec<ItemId>, PathError> {
        let resolved = self.resolve(path)?;
        let len = mutator::len(&self.current, &resolved.indexed)?;
        let ids = self.identities.ids(&resolved.stable.to_string());
        debug_assert_eq!(ids.len(), len);
        Ok(ids.to_vec())
    }

    /// Translates `path` into its positional and id forms.
    pub fn resolve(&self, path: &str) -> Result<ResolvedPath, PathError> {
        self.identities.resolve(&Path::parse(path)?)
    }

    /// Returns the current document by value for serialization.
    pub fn export_data(&self) -> CvDocument {
        CvDocument::clone(&self.current)
    }

    // ── Document edits ──────────────────────────────────────────────────────

    /// Replaces the text at `path`. The existing value must be text.
    pub fn update_field(&mut self, path: &str, value: impl Into<String>) -> Result<Change, PathError> {
        let value = value.into();
        self.commit(path, Edit::Set(FieldValue::Text(value)), |_, _, _| {})
    }

    /// Replaces a whole list of text.
    pub fn update_list(&mut self, path: &str, items: Vec<String>) -> Result<Change, PathError> {
        let len = items.len();
        self.commit(path, Edit::Set(FieldValue::List(items)), move |ids, resolved, _| {
            ids.record_replace(&resolved.stable.to_string(), len);
        })
    }

    /// Replaces the element `index` of the list at `path`.
    pub fn update_list_item(
        &mut self,
        path: &str,
        index: usize,
        value: impl Into<String>,
    ) -> Result<Change, PathError> {
        let item = Path::parse(path)?.select(Selector::Index(index))?;
        self.update_field(&item.to_string(), value)
    }

    /// Appends `value` to the list of text at `path`.
    pub fn add_list_item(&mut self, path: &str, value: impl Into<String>) -> Result<Change, PathError> {
        let value = value.into();
        self.commit(path, Edit::Push(value), |ids, resolved, _| {
            ids.record_push(&resolved.stable.to_string());
        })
    }

    /// Appends an empty record to the list of records at `path`.
    pub fn add_entry(&mut self, path: &str) -> Result<Change, PathError> {
        self.commit(path, Edit::PushEntry, |ids, resolved, next| {
            let len = mutator::len(next, &resolved.indexed).unwrap_or(0);
            let Some(last) = len.checked_sub(1) else {
                return;
            };
            let Ok(entry_path) = resolved.indexed.select(Selector::Index(last)) else {
                return;
            };
            if let Ok(Target::Record(entry)) = mutator::resolve(next, &entry_path) {
                ids.record_entry(&resolved.stable.to_string(), entry);
            }
        })
    }

    /// Removes element `index` from the list at `path`; later elements shift down.
    pub fn remove_list_item(&mut self, path: &str, index: usize) -> Result<Change, PathError> {
        self.commit(path, Edit::Remove(index), move |ids, resolved, _| {
            ids.record_remove(&resolved.stable.to_string(), index);
        })
    }

    /// Removes the element addressed by `item_path` (e.g. `skills[0].items[#12]`).
    pub fn remove_item(&mut self, item_path: &str) -> Result<Change, PathError> {
        let resolved = self.resolve(item_path)?;
        match resolved.indexed.last().selector {
            Some(Selector::Index(index)) => {
                self.remove_list_item(&resolved.indexed.sequence().to_string(), index)
            }
            _ => Err(PathError::TypeMismatch {
                path: item_path.to_string(),
                expected: "list element",
                found: "property",
            }),
        }
    }

    /// Replaces `current` with a fresh copy of `original` and leaves edit mode.
    pub fn reset_to_original(&mut self) {
        self.current = Arc::new(CvDocument::clone(&self.original));
        self.identities = Identities::assign(self.current.as_ref());
        self.editing = false;
        self.revision += 1;
        debug!("Builder reset to original (revision {})", self.revision);
    }

    // ── Presentation state ──────────────────────────────────────────────────

    pub fn set_editing(&mut self, editing: bool) {
        self.editing = editing;
    }

    pub fn set_ats_mode(&mut self, ats_mode: bool) {
        self.ats_mode = ats_mode;
    }

    pub fn update_customization(&mut self, patch: CustomizationPatch) {
        self.customization.apply(patch);
    }

    // ── Internals ───────────────────────────────────────────────────────────

    /// Resolves, applies and, on success only, installs the new document and updates ids.
    fn commit<F>(&mut self, path: &str, edit: Edit, track: F) -> Result<Change, PathError>
    where
        F: FnOnce(&mut Identities, &ResolvedPath, &CvDocument),
    {
        let outcome = self
            .resolve(path)
            .and_then(|resolved| {
                mutator::apply(&self.current, &resolved.indexed, edit).map(|next| (resolved, next))
            });

        let (resolved, next) = match outcome {
            Ok(applied) => applied,
            Err(e) => {
                warn!("Rejected edit at '{path}': {e}");
                return Err(e);
            }
        };

        track(&mut self.identities, &resolved, &next);
        self.current = Arc::new(next);
        self.revision += 1;
        debug!("Applied edit at '{}' (revision {})", resolved.stable, self.revision);

        Ok(Change {
            path: resolved.stable,
            revision: self.revision,
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
