//! Error kinds for the editing session, the build pipeline and resolution.
//!
//! None of these reach an IDE caller directly: the public query API always
//! answers with a well-formed (possibly empty or cancelled) record. They are
//! the currency between the layers underneath it.

use std::sync::Arc;

use thiserror::Error;

/// A rejected edit to a live document.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EditError {
    #[error("no open document at '{0}'")]
    UnknownDocument(Arc<str>),

    #[error("edit range {offset}..{end} is out of bounds for text of length {len}")]
    OutOfBounds { offset: usize, end: usize, len: usize },

    #[error("edit boundary {0} is not on a character boundary")]
    NotCharBoundary(usize),

    #[error("snapshot at stamp {stamp} is not the latest (latest is {latest})")]
    StaleSnapshot { stamp: u64, latest: u64 },
}

/// The analyzer could not produce an analysis.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("analysis build was cancelled")]
    Cancelled,

    #[error("no open document at '{0}'")]
    MissingDocument(Arc<str>),

    #[error("analyzer failed: {0}")]
    Analyzer(String),
}

/// Why a cursor query produced no record.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CursorError {
    /// The offset does not bind to any entity.
    #[error("offset does not resolve to an entity")]
    NoResolution,

    /// The offset lies past the end of the text it was given for.
    #[error("offset {offset} is out of range for text of length {len}")]
    OutOfRange { offset: u32, len: u32 },

    /// The entity exists but is marked unavailable.
    #[error("declaration is unavailable")]
    Unavailable,

    /// A location could not be translated to the latest snapshot.
    #[error("location could not be remapped to the latest snapshot")]
    StaleRemapFailed,

    #[error("request was cancelled")]
    Cancelled,

    #[error(transparent)]
    BuildFailed(#[from] BuildError),
}

impl CursorError {
    /// Whether a fresh analysis could plausibly succeed where a reused one
    /// failed during assembly.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CursorError::Unavailable | CursorError::StaleRemapFailed)
    }

    /// Whether the query was abandoned rather than answered.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, CursorError::Cancelled | CursorError::BuildFailed(BuildError::Cancelled))
    }
}

/// Host construction failures.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("failed to start analysis worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}
