//! Versioned text: snapshots, the edit log and offset translation.
//!
//! - [`Buffer`] / [`Snapshot`] / [`Edit`] - immutable text versions and the
//!   edits between them
//! - [`EditorDocuments`] - the editing session, sole mutator of live buffers
//! - [`translate_backward`] / [`translate_forward`] - position mapping across
//!   the edit log

mod editor;
mod snapshot;
mod translate;

pub use editor::EditorDocuments;
pub use snapshot::{Buffer, Edit, Snapshot};
pub use translate::{remap_range_to_latest, translate_backward, translate_forward};
