//! IDE queries: cursor info and related identifiers.
//!
//! The public entry point is [`AnalysisHost`]. The pieces underneath are
//! exposed for hosts that drive the pipeline themselves:
//!
//! 1. [`validate_reuse`] - can an out-of-date analysis answer this query?
//! 2. [`assemble_cursor_info`] - turn a resolved entity into a record
//! 3. [`scan_related_identifiers`] - every occurrence of an entity
//!
//! ## Usage
//!
//! ```ignore
//! use cursorkit::ide::{AnalysisHost, MarkupRenderer};
//!
//! let host = AnalysisHost::new(HostConfig::default(), my_analyzer, MarkupRenderer)?;
//! host.documents().open("/main.mini", "let x = 1\nprint(x)\n");
//! host.cursor_info("/main.mini", 16, ["-target", "x86_64"], |info| {
//!     println!("{} {}", info.kind(), info.name());
//! });
//! ```

mod analysis;
mod cursor_info;
mod related;
mod render;
mod reuse;

pub use analysis::AnalysisHost;
pub use cursor_info::{
    CursorContext, CursorInfo, MODULE_REF_UID, SYNTHESIZED_USR_SEPARATOR, assemble_cursor_info,
};
pub use related::{RelatedIdentsInfo, scan_related_identifiers};
pub use render::{DeclRenderer, MarkupRenderer, RenderedDecl, overload_signature, type_interface};
pub use reuse::{ReuseDecision, validate_reuse};
