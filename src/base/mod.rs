//! Foundation types for cursorkit.
//!
//! This module provides fundamental types used throughout the engine:
//! - [`BufferId`] - Identity of one logical file across edits
//! - [`TextRange`], [`TextSize`] - Byte positions in a snapshot
//! - [`LineCol`], [`LineIndex`] - Line/column conversion
//! - [`Name`], [`Interner`] - String interning for declaration names
//!
//! This module has NO dependencies on other cursorkit modules.

mod buffer_id;
mod intern;
mod span;

pub use buffer_id::BufferId;
pub use intern::{Interner, Name};
pub use span::{LineCol, LineIndex, TextRange, TextSize};

// Re-export text-size types for convenience
pub use text_size;
