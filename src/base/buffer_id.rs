//! Buffer identifiers for tracking a file's text across edits.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// The identity of one logical file's text across time.
///
/// Every snapshot of a buffer carries the same `BufferId`, so checking
/// whether two snapshots belong to the same buffer is a single integer
/// comparison. Ids are process-unique; a buffer that is closed and
/// reopened gets a fresh id.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct BufferId(u32);

static NEXT_BUFFER_ID: AtomicU32 = AtomicU32::new(0);

impl BufferId {
    /// Allocate a fresh, never-before-used id.
    pub fn fresh() -> Self {
        Self(NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw index.
    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BufferId({})", self.0)
    }
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buffer#{}", self.0)
    }
}
