//! Editable fields and lists.
//!
//! A field shows its value as static text outside edit mode and as an input (or a
//! textarea when multiline) inside it. The input carries the field's id-form path in
//! `data-path`, which is what the client sends back on commit. Lists key every item by
//! its stable id so an open editor keeps pointing at the same item when earlier items
//! are removed.

use std::convert::Infallible;

use crate::builder::dom::{Element, Node};
use crate::builder::store::{BuilderStore, Change};
use crate::cv::mutator::FieldValue;
use crate::cv::path::{Path, PathError, Selector};
use crate::cv::ItemId;

// ────────────────────────────────────────────────────────────────────────────
// Editable field
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct EditableField {
    path: Path,
    value: String,
    multiline: bool,
    tag: &'static str,
    class: Option<String>,
}

impl EditableField {
    pub fn new(path: Path, value: impl Into<String>) -> Self {
        Self {
            path,
            value: value.into(),
            multiline: false,
            tag: "span",
            class: None,
        }
    }

    pub fn multiline(mut self) -> Self {
        self.multiline = true;
        self
    }

    /// Element used for the static rendering.
    pub fn tag(mut self, tag: &'static str) -> Self {
        self.tag = tag;
        self
    }

    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }

    pub fn render(&self, editing: bool) -> Element {
        let el = if !editing {
            Element::new(self.tag).text(self.value.clone())
        } else if self.multiline {
            Element::new("textarea")
                .attr("data-path", self.path.to_string())
                .text(self.value.clone())
        } else {
            Element::new("input")
                .attr("type", "text")
                .attr("data-path", self.path.to_string())
                .attr("value", self.value.clone())
        };
        match &self.class {
            Some(class) => el.class(class.clone()),
            None => el,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The submitted value equals the stored one; nothing was written.
    Unchanged,
    Applied(Change),
}

/// Writes `value` at `path` unless it is already the stored value.
///
/// An empty submission for an absent optional field counts as unchanged.
pub fn commit(store: &mut BuilderStore, path: &str, value: &str) -> Result<CommitOutcome, PathError> {
    let unchanged = match store.value_at(path)? {
        FieldValue::Text(current) => current == value,
        FieldValue::Unset => value.is_empty(),
        FieldValue::List(_) => false,
    };
    if unchanged {
        return Ok(CommitOutcome::Unchanged);
    }
    store.update_field(path, value).map(CommitOutcome::Applied)
}

// ────────────────────────────────────────────────────────────────────────────
// Editable list
// ────────────────────────────────────────────────────────────────────────────

/// Captions of the add and remove buttons shown in edit mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListControls {
    pub add: &'static str,
    pub remove: &'static str,
}

impl Default for ListControls {
    fn default() -> Self {
        Self {
            add: "Add",
            remove: "Remove",
        }
    }
}

/// A sequence bound to its id-form path, with the item paths precomputed.
pub struct EditableList<'a, T> {
    path: Path,
    items: &'a [T],
    keys: Vec<(ItemId, Path)>,
    tag: &'static str,
    class: Option<String>,
    controls: ListControls,
}

impl<'a, T> EditableList<'a, T> {
    /// Binds `items`, the current value of the sequence at `path`.
    pub fn bind(store: &BuilderStore, path: &str, items: &'a [T]) -> Result<Self, PathError> {
        let path = store.resolve(path)?.stable;
        let ids = store.item_ids(&path.to_string())?;
        let keys = ids
            .into_iter()
            .map(|id| path.select(Selector::Id(id)).map(|item| (id, item)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            path,
            items,
            keys,
            tag: "ul",
            class: None,
            controls: ListControls::default(),
        })
    }

    pub fn tag(mut self, tag: &'static str) -> Self {
        self.tag = tag;
        self
    }

    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }

    pub fn controls(mut self, controls: ListControls) -> Self {
        self.controls = controls;
        self
    }

    /// Renders each item through `render_item(item, index, item_path)`.
    ///
    /// Items are keyed by stable id. In edit mode every item gets a remove control and
    /// the list gets an add control; both carry the path they act on.
    pub fn render<F>(&self, editing: bool, mut render_item: F) -> Element
    where
        F: FnMut(&T, usize, &Path) -> Node,
    {
        let rendered = self.try_render(editing, |item, index, path| {
            Ok::<_, Infallible>(render_item(item, index, path))
        });
        match rendered {
            Ok(el) => el,
            Err(never) => match never {},
        }
    }

    /// Like [`render`](Self::render) for item renderers that can fail, e.g. by binding
    /// nested lists.
    pub fn try_render<F, E>(&self, editing: bool, mut render_item: F) -> Result<Element, E>
    where
        F: FnMut(&T, usize, &Path) -> Result<Node, E>,
    {
        let item_tag = if self.tag == "ul" || self.tag == "ol" { "li" } else { "div" };
        let mut list = Element::new(self.tag).attr("data-path", self.path.to_string());
        if let Some(class) = &self.class {
            list = list.class(class.clone());
        }

        for (index, (item, (id, item_path))) in self.items.iter().zip(&self.keys).enumerate() {
            let mut row = Element::new(item_tag)
                .attr("data-key", id.to_string())
                .child(render_item(item, index, item_path)?);
            if editing {
                row = row.child(
                    Element::new("button")
                        .attr("type", "button")
                        .attr("data-action", "remove")
                        .attr("data-path", item_path.to_string())
                        .text(self.controls.remove),
                );
            }
            list = list.child(row);
        }

        if editing {
            list = list.child(
                Element::new("button")
                    .attr("type", "button")
                    .attr("data-action", "add")
                    .attr("data-path", self.path.to_string())
                    .text(self.controls.add),
            );
        }
        Ok(list)
    }
}

impl EditableList<'_, String> {
    /// Each item rendered as an editable field with the given static tag.
    pub fn render_fields(&self, editing: bool, item_tag: &'static str) -> Element {
        self.render(editing, |value, _, item_path| {
            EditableField::new(item_path.clone(), value.clone())
                .tag(item_tag)
                .render(editing)
                .into()
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
