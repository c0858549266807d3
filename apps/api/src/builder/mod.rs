// Interactive builder: the editable store, the preview surface rendered from it and the
// HTTP handlers that drive both. One `Session` per mounted builder.

pub mod dom;
pub mod editable;
pub mod handlers;
pub mod preview;
pub mod session;
pub mod store;

pub use session::{RasterOptions, Session, SessionRegistry};
pub use store::{BuilderStore, Change};
