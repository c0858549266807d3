// CV document model and the path-based editing engine.
// The document is immutable behind `Arc`; every edit produces a new root that shares
// all untouched subtrees with the previous one.

pub mod dataset;
pub mod identity;
pub mod mutator;
pub mod navigate;
pub mod path;
pub mod schema;

pub use identity::{Identities, ItemId, ResolvedPath};
pub use mutator::{Edit, FieldValue};
pub use path::{Path, PathError, Selector, Step};
pub use schema::{CustomizationPatch, Customization, CvDocument};
