//! Stable identities for sequence elements.
//!
//! Positions shift when an element is removed, so anything that keeps pointing at
//! `achievements[2]` silently starts addressing a different item. Each element therefore
//! gets a synthetic `ItemId` when the document is loaded, and paths may address elements
//! as `achievements[#17]`. Ids live beside the document (never inside it) so exports stay
//! an exact mirror of the content.
//!
//! Identity lists are keyed by the *stable key* of their sequence: its path with every
//! ancestor selector written as an id (`experience[#3].achievements`). Removing an
//! earlier experience entry therefore leaves the keys of later entries untouched.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cv::navigate::{Node, Slot};
use crate::cv::path::{Path, PathError, Selector, Step};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub u64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A path in both of its addressing forms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Positional form understood by the mutator.
    pub indexed: Path,
    /// Id form; stays valid across insertions and removals elsewhere.
    pub stable: Path,
}

impl ResolvedPath {
    /// Stable key of the sequence this path ends on.
    pub fn sequence_key(&self) -> String {
        self.stable.sequence().to_string()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Identities {
    next: u64,
    lists: HashMap<String, Vec<ItemId>>,
}

impl Identities {
    /// Mints ids for every element of every sequence reachable from `root`.
    pub fn assign(root: &dyn Node) -> Self {
        let mut identities = Self::default();
        identities.walk(root, "");
        identities
    }

    /// Ids of the sequence under `key`, in position order.
    pub fn ids(&self, key: &str) -> &[ItemId] {
        self.lists.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Translates a path in either form into both forms.
    ///
    /// Index selectors past the end are passed through untranslated so the mutator can
    /// report them as out of range; an id with no matching element fails here.
    pub fn resolve(&self, path: &Path) -> Result<ResolvedPath, PathError> {
        let mut indexed: Vec<Step> = Vec::with_capacity(path.steps().len());
        let mut stable: Vec<Step> = Vec::with_capacity(path.steps().len());
        // Once a position has no id, deeper keys cannot be derived.
        let mut tracked = true;

        for step in path.steps() {
            let key = key_of(&stable, &step.name);
            let ids = self.lists.get(&key).filter(|_| tracked);
            match step.selector {
                None => {
                    indexed.push(step.clone());
                    stable.push(step.clone());
                }
                Some(Selector::Index(index)) => {
                    indexed.push(step.clone());
                    match ids.and_then(|ids| ids.get(index)) {
                        Some(id) => stable.push(Step::new(&step.name, Some(Selector::Id(*id)))),
                        None => {
                            tracked = false;
                            stable.push(step.clone());
                        }
                    }
                }
                Some(Selector::Id(id)) => {
                    let position = ids
                        .and_then(|ids| ids.iter().position(|candidate| *candidate == id))
                        .ok_or_else(|| PathError::UnknownItem {
                            path: format!("{key}[{id}]"),
                            id,
                        })?;
                    indexed.push(Step::new(&step.name, Some(Selector::Index(position))));
                    stable.push(step.clone());
                }
            }
        }

        match (Path::from_steps(indexed), Path::from_steps(stable)) {
            (Some(indexed), Some(stable)) => Ok(ResolvedPath { indexed, stable }),
            _ => Err(PathError::Syntax {
                path: path.to_string(),
                reason: "path is empty".to_string(),
            }),
        }
    }

    /// A string was appended to the sequence under `key`.
    pub fn record_push(&mut self, key: &str) -> ItemId {
        let id = self.mint();
        self.lists.entry(key.to_string()).or_default().push(id);
        id
    }

    /// A record was appended to the sequence under `key`; its own sequences get ids too.
    pub fn record_entry(&mut self, key: &str, entry: &dyn Node) -> ItemId {
        let id = self.record_push(key);
        self.walk(entry, &format!("{key}[{id}]"));
        id
    }

    /// The element at `index` was removed from the sequence under `key`.
    pub fn record_remove(&mut self, key: &str, index: usize) {
        let Some(ids) = self.lists.get_mut(key) else {
            return;
        };
        if index >= ids.len() {
            return;
        }
        let removed = ids.remove(index);
        let nested = format!("{key}[{removed}].");
        self.lists.retain(|k, _| !k.starts_with(&nested));
    }

    /// The sequence under `key` was replaced wholesale with `len` new strings.
    pub fn record_replace(&mut self, key: &str, len: usize) {
        let ids = self.mint_many(len);
        self.lists.insert(key.to_string(), ids);
    }

    fn mint(&mut self) -> ItemId {
        self.next += 1;
        ItemId(self.next)
    }

    fn mint_many(&mut self, n: usize) -> Vec<ItemId> {
        (0..n).map(|_| self.mint()).collect()
    }

    fn walk(&mut self, node: &dyn Node, prefix: &str) {
        for name in node.fields() {
            let key = if prefix.is_empty() {
                name.to_string()
            } else {
                format!("{prefix}.{name}")
            };
            match node.slot(name) {
                Some(Slot::Texts(items)) => {
                    let ids = self.mint_many(items.len());
                    self.lists.insert(key, ids);
                }
                Some(Slot::Records(items)) => {
                    let ids = self.mint_many(items.len());
                    for (item, id) in items.iter().zip(&ids) {
                        self.walk(*item, &format!("{key}[{id}]"));
                    }
                    self.lists.insert(key, ids);
                }
                Some(Slot::Record(inner)) => self.walk(inner, &key),
                _ => {}
            }
        }
    }
}

fn key_of(stable_prefix: &[Step], name: &str) -> String {
    let mut key = String::new();
    for step in stable_prefix {
        key.push_str(&step.to_string());
        key.push('.');
    }
    key.push_str(name);
    key
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cv::schema::sample_document;

    fn path(s: &str) -> Path {
        Path::parse(s).unwrap()
    }

    #[test]
    fn test_assign_covers_nested_sequences() {
        let doc = sample_document();
        let ids = Identities::assign(&doc);
        assert_eq!(ids.ids("experience").len(), 2);
        let first = ids.ids("experience")[0];
        assert_eq!(ids.ids(&format!("experience[{first}].achievements")).len(), 3);
        assert_eq!(ids.ids(&format!("experience[{first}].technologies")).len(), 2);
        assert_eq!(ids.ids("languages").len(), 1);
        assert!(ids.ids("summary").is_empty());
    }

    #[test]
    fn test_ids_are_unique() {
        let doc = sample_document();
        let ids = Identities::assign(&doc);
        let mut all: Vec<ItemId> = ids.lists.values().flatten().copied().collect();
        let total = all.len();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), total);
    }

    #[test]
    fn test_resolve_translates_indices_to_ids_and_back() {
        let doc = sample_document();
        let ids = Identities::assign(&doc);
        let resolved = ids.resolve(&path("experience[1].achievements[0]")).unwrap();
        let entry = ids.ids("experience")[1];
        let item = ids.ids(&format!("experience[{entry}].achievements"))[0];
        assert_eq!(
            resolved.stable.to_string(),
            format!("experience[{entry}].achievements[{item}]")
        );

        let back = ids.resolve(&resolved.stable).unwrap();
        assert_eq!(back.indexed.to_string(), "experience[1].achievements[0]");
        assert_eq!(
            back.sequence_key(),
            format!("experience[{entry}].achievements")
        );
    }

    #[test]
    fn test_resolve_passes_out_of_range_indices_through() {
        let doc = sample_document();
        let ids = Identities::assign(&doc);
        let resolved = ids.resolve(&path("experience[99].title")).unwrap();
        assert_eq!(resolved.indexed.to_string(), "experience[99].title");
        assert_eq!(resolved.stable.to_string(), "experience[99].title");
    }

    #[test]
    fn test_resolve_rejects_unknown_ids() {
        let doc = sample_document();
        let ids = Identities::assign(&doc);
        let err = ids.resolve(&path("experience[#999].title")).unwrap_err();
        assert!(matches!(err, PathError::UnknownItem { id: ItemId(999), .. }));
    }

    #[test]
    fn test_removal_keeps_later_ids_and_drops_nested_keys() {
        let doc = sample_document();
        let mut ids = Identities::assign(&doc);
        let [first, second] = [ids.ids("experience")[0], ids.ids("experience")[1]];

        ids.record_remove("experience", 0);

        assert_eq!(ids.ids("experience"), &[second]);
        assert!(ids.ids(&format!("experience[{first}].achievements")).is_empty());
        assert_eq!(
            ids.ids(&format!("experience[{second}].achievements")).len(),
            1
        );
        let resolved = ids.resolve(&path(&format!("experience[{second}].title"))).unwrap();
        assert_eq!(resolved.indexed.to_string(), "experience[0].title");
    }

    #[test]
    fn test_removal_does_not_touch_keys_sharing_a_numeric_prefix() {
        let mut ids = Identities::default();
        ids.lists.insert("experience".to_string(), vec![ItemId(1), ItemId(12)]);
        ids.lists
            .insert("experience[#1].achievements".to_string(), vec![ItemId(2)]);
        ids.lists
            .insert("experience[#12].achievements".to_string(), vec![ItemId(13)]);

        ids.record_remove("experience", 0);

        assert!(ids.ids("experience[#1].achievements").is_empty());
        assert_eq!(ids.ids("experience[#12].achievements"), &[ItemId(13)]);
    }

    #[test]
    fn test_push_and_replace_mint_fresh_ids() {
        let doc = sample_document();
        let mut ids = Identities::assign(&doc);
        let group = ids.ids("skills")[0];
        let key = format!("skills[{group}].items");
        let before = ids.ids(&key).to_vec();

        let pushed = ids.record_push(&key);
        assert_eq!(ids.ids(&key).len(), 3);
        assert!(!before.contains(&pushed));

        ids.record_replace(&key, 1);
        assert_eq!(ids.ids(&key).len(), 1);
        assert!(!before.contains(&ids.ids(&key)[0]));
    }
}
