//! Immutable text snapshots and the per-buffer edit log.
//!
//! A [`Buffer`] is the identity of one file's text across time. Each edit
//! applied to the newest [`Snapshot`] appends exactly one [`Edit`] to the
//! buffer's log and produces the next snapshot, so the edits between any two
//! snapshots of a buffer can be enumerated without diffing their text.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use smol_str::SmolStr;

use crate::base::{BufferId, TextRange, TextSize};
use crate::error::EditError;

/// One replace operation: `removed_len` bytes at `offset` replaced by
/// `inserted`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Edit {
    pub offset: TextSize,
    pub removed_len: TextSize,
    pub inserted: SmolStr,
}

impl Edit {
    pub fn new(offset: u32, removed_len: u32, inserted: impl Into<SmolStr>) -> Self {
        Self {
            offset: TextSize::from(offset),
            removed_len: TextSize::from(removed_len),
            inserted: inserted.into(),
        }
    }

    pub fn inserted_len(&self) -> TextSize {
        TextSize::of(self.inserted.as_str())
    }

    /// The span this edit removed, in the older snapshot's coordinates.
    pub fn removed_range(&self) -> TextRange {
        TextRange::at(self.offset, self.removed_len)
    }

    /// The span this edit inserted, in the newer snapshot's coordinates.
    pub fn inserted_range(&self) -> TextRange {
        TextRange::at(self.offset, self.inserted_len())
    }
}

/// Shared, append-only state of one buffer.
struct BufferLog {
    id: BufferId,
    path: Arc<str>,
    /// `edits[n]` transforms the snapshot with stamp `n` into stamp `n + 1`.
    edits: RwLock<Vec<Edit>>,
}

/// The identity of one logical file's text.
#[derive(Clone)]
pub struct Buffer {
    log: Arc<BufferLog>,
}

impl Buffer {
    /// Create a buffer and its first snapshot (stamp 0).
    pub fn new(path: impl Into<Arc<str>>, text: impl Into<Arc<str>>) -> (Buffer, Snapshot) {
        let log = Arc::new(BufferLog {
            id: BufferId::fresh(),
            path: path.into(),
            edits: RwLock::new(Vec::new()),
        });
        let snapshot = Snapshot(Arc::new(SnapshotInner {
            log: log.clone(),
            stamp: 0,
            text: text.into(),
        }));
        (Buffer { log }, snapshot)
    }

    pub fn id(&self) -> BufferId {
        self.log.id
    }

    pub fn path(&self) -> &str {
        &self.log.path
    }

    /// Number of edits applied so far, which is also the newest stamp.
    pub fn latest_stamp(&self) -> u64 {
        self.log.edits.read().len() as u64
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("id", &self.log.id)
            .field("path", &self.log.path)
            .finish()
    }
}

struct SnapshotInner {
    log: Arc<BufferLog>,
    stamp: u64,
    text: Arc<str>,
}

/// An immutable version of a buffer's text.
///
/// Cloning is a reference-count bump. Two snapshots of the same buffer with
/// equal stamps have identical text.
#[derive(Clone)]
pub struct Snapshot(Arc<SnapshotInner>);

impl Snapshot {
    pub fn buffer_id(&self) -> BufferId {
        self.0.log.id
    }

    pub fn path(&self) -> &str {
        &self.0.log.path
    }

    pub fn stamp(&self) -> u64 {
        self.0.stamp
    }

    pub fn text(&self) -> &str {
        &self.0.text
    }

    pub fn len(&self) -> TextSize {
        TextSize::of(&*self.0.text)
    }

    pub fn is_empty(&self) -> bool {
        self.0.text.is_empty()
    }

    #[inline]
    pub fn is_from_same_buffer(&self, other: &Snapshot) -> bool {
        Arc::ptr_eq(&self.0.log, &other.0.log)
    }

    /// Apply one replace operation, producing the next snapshot.
    ///
    /// Only the newest snapshot of a buffer can be edited; the write lock on
    /// the log makes append + stamp assignment a single step.
    pub fn replace(
        &self,
        offset: u32,
        removed_len: u32,
        inserted: impl Into<SmolStr>,
    ) -> Result<Snapshot, EditError> {
        let edit = Edit::new(offset, removed_len, inserted);
        let text = &*self.0.text;

        let start = offset as usize;
        let end = start + removed_len as usize;
        if end > text.len() {
            return Err(EditError::OutOfBounds { offset: start, end, len: text.len() });
        }
        if !text.is_char_boundary(start) {
            return Err(EditError::NotCharBoundary(start));
        }
        if !text.is_char_boundary(end) {
            return Err(EditError::NotCharBoundary(end));
        }

        let mut edits = self.0.log.edits.write();
        let latest = edits.len() as u64;
        if latest != self.0.stamp {
            return Err(EditError::StaleSnapshot { stamp: self.0.stamp, latest });
        }

        let mut new_text = String::with_capacity(text.len() - (end - start) + edit.inserted.len());
        new_text.push_str(&text[..start]);
        new_text.push_str(&edit.inserted);
        new_text.push_str(&text[end..]);

        edits.push(edit);

        Ok(Snapshot(Arc::new(SnapshotInner {
            log: self.0.log.clone(),
            stamp: latest + 1,
            text: Arc::from(new_text),
        })))
    }

    /// Enumerate, in application order, the edits that turn `self` into
    /// `newer`.
    ///
    /// `f` returns `false` to stop early. Returns `true` only when every edit
    /// was visited; snapshots of different buffers or a `newer` that is
    /// actually older never complete.
    pub fn foreach_replace_until(&self, newer: &Snapshot, mut f: impl FnMut(&Edit) -> bool) -> bool {
        if !self.is_from_same_buffer(newer) || self.stamp() > newer.stamp() {
            return false;
        }

        let edits = self.0.log.edits.read();
        let (from, to) = (self.stamp() as usize, newer.stamp() as usize);
        let Some(range) = edits.get(from..to) else {
            return false;
        };
        range.iter().all(|edit| f(edit))
    }

    /// Collect the edits between `self` and `newer`, or `None` when they
    /// cannot be enumerated.
    pub fn edits_until(&self, newer: &Snapshot) -> Option<Vec<Edit>> {
        let mut collected = Vec::new();
        let completed = self.foreach_replace_until(newer, |edit| {
            collected.push(edit.clone());
            true
        });
        completed.then_some(collected)
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("buffer", &self.buffer_id())
            .field("stamp", &self.stamp())
            .field("len", &self.0.text.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_produces_next_snapshot() {
        let (buffer, s0) = Buffer::new("/a.mini", "let x = 1\nprint(x)");
        let s1 = s0.replace(0, 0, "// ").unwrap();

        assert_eq!(s1.text(), "// let x = 1\nprint(x)");
        assert_eq!(s1.stamp(), 1);
        assert_eq!(s0.text(), "let x = 1\nprint(x)");
        assert!(s0.is_from_same_buffer(&s1));
        assert_eq!(buffer.latest_stamp(), 1);
    }

    #[test]
    fn test_stale_snapshot_cannot_be_edited() {
        let (_buffer, s0) = Buffer::new("/a.mini", "abc");
        let _s1 = s0.replace(0, 1, "x").unwrap();

        assert_eq!(
            s0.replace(0, 0, "y").unwrap_err(),
            EditError::StaleSnapshot { stamp: 0, latest: 1 }
        );
    }

    #[test]
    fn test_edit_validation() {
        let (_buffer, s0) = Buffer::new("/a.mini", "héllo");

        assert!(matches!(s0.replace(4, 10, ""), Err(EditError::OutOfBounds { .. })));
        assert_eq!(s0.replace(2, 0, "x").unwrap_err(), EditError::NotCharBoundary(2));
    }

    #[test]
    fn test_edit_log_between_snapshots() {
        let (_buffer, s0) = Buffer::new("/a.mini", "abc def");
        let s1 = s0.replace(2, 1, "").unwrap();
        let s2 = s1.replace(0, 0, "X").unwrap();

        let edits = s0.edits_until(&s2).unwrap();
        assert_eq!(edits, vec![Edit::new(2, 1, ""), Edit::new(0, 0, "X")]);

        assert_eq!(s1.edits_until(&s2).unwrap(), vec![Edit::new(0, 0, "X")]);
        assert!(s2.edits_until(&s2).unwrap().is_empty());
        assert!(s2.edits_until(&s0).is_none());
    }

    #[test]
    fn test_divergent_buffers_do_not_enumerate() {
        let (_a, a0) = Buffer::new("/a.mini", "abc");
        let (_b, b0) = Buffer::new("/a.mini", "abc");
        let b1 = b0.replace(0, 0, "x").unwrap();

        assert!(!a0.is_from_same_buffer(&b0));
        assert!(!a0.foreach_replace_until(&b1, |_| true));
    }

    #[test]
    fn test_early_stop_is_incomplete() {
        let (_buffer, s0) = Buffer::new("/a.mini", "abc");
        let s1 = s0.replace(0, 0, "x").unwrap();
        let s2 = s1.replace(0, 0, "y").unwrap();

        let mut seen = 0;
        let completed = s0.foreach_replace_until(&s2, |_| {
            seen += 1;
            false
        });
        assert!(!completed);
        assert_eq!(seen, 1);
    }
}
