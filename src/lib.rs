//! # cursorkit
//!
//! Incremental symbol resolution for editor tooling: given a file, an
//! offset and the arguments the file is analyzed with, answer "what is
//! under the cursor" and "where else does it occur", reusing analyses of
//! older snapshots whenever the edits since then provably left the query
//! position untouched.
//!
//! ## Module Structure (dependency order)
//!
//! ```text
//! ide      → AnalysisHost, cursor info, related identifiers, reuse checks
//!   ↓
//! manager  → worker pool, single-flight builds, consumers
//!   ↓
//! hir      → analyzed trees, resolution, the Analyzer seam
//!   ↓
//! text     → snapshots, edit log, offset translation
//!   ↓
//! syntax   → token lexing for identity checks
//!   ↓
//! base     → primitives (BufferId, TextRange, Name interning)
//! ```

/// Foundation types: BufferId, spans, Name interning
pub mod base;

/// Host configuration
pub mod config;

/// Error kinds shared between layers
pub mod error;

/// Analyzed trees and resolution
pub mod hir;

/// IDE queries
pub mod ide;

/// Analysis scheduling
pub mod manager;

/// Token lexing
pub mod syntax;

/// Versioned text
pub mod text;

pub use base::{BufferId, Interner, LineCol, LineIndex, Name, TextRange, TextSize};
pub use config::{HostConfig, MAX_RETRIES_WITHOUT_CACHE};
pub use error::{BuildError, CursorError, EditError, HostError};
pub use ide::{AnalysisHost, CursorInfo, MarkupRenderer, RelatedIdentsInfo};
