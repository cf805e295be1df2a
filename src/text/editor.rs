//! The editing session: open documents and their latest snapshots.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use smol_str::SmolStr;
use tracing::debug;

use super::snapshot::{Buffer, Snapshot};
use crate::error::EditError;

/// One live document.
#[derive(Debug)]
struct EditorDocument {
    buffer: Buffer,
    /// Serializes edits so each one produces exactly one snapshot.
    latest: Mutex<Snapshot>,
}

/// Registry of open documents, keyed by path.
///
/// This is the only component that mutates buffer state. Readers get
/// snapshots, which are immutable and can be held across edits.
#[derive(Debug, Default)]
pub struct EditorDocuments {
    docs: RwLock<IndexMap<Arc<str>, Arc<EditorDocument>>>,
}

impl EditorDocuments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open (or reopen) a document with fresh text.
    ///
    /// Reopening starts a new buffer: snapshots of the previous buffer no
    /// longer count as the same buffer, so analyses built on them will not be
    /// reused.
    pub fn open(&self, path: &str, text: impl Into<Arc<str>>) -> Snapshot {
        let path: Arc<str> = Arc::from(path);
        let (buffer, snapshot) = Buffer::new(path.clone(), text);
        debug!(path = %path, buffer = %buffer.id(), "opened document");

        let doc = Arc::new(EditorDocument {
            buffer,
            latest: Mutex::new(snapshot.clone()),
        });
        self.docs.write().insert(path, doc);
        snapshot
    }

    /// Replace `removed_len` bytes at `offset` in the latest snapshot.
    pub fn replace(
        &self,
        path: &str,
        offset: u32,
        removed_len: u32,
        inserted: impl Into<SmolStr>,
    ) -> Result<Snapshot, EditError> {
        let doc = self
            .document(path)
            .ok_or_else(|| EditError::UnknownDocument(Arc::from(path)))?;

        let mut latest = doc.latest.lock();
        let next = latest.replace(offset, removed_len, inserted)?;
        *latest = next.clone();
        debug!(path, stamp = next.stamp(), "applied edit");
        Ok(next)
    }

    pub fn latest_snapshot(&self, path: &str) -> Option<Snapshot> {
        self.document(path).map(|doc| doc.latest.lock().clone())
    }

    pub fn buffer(&self, path: &str) -> Option<Buffer> {
        self.document(path).map(|doc| doc.buffer.clone())
    }

    pub fn close(&self, path: &str) -> bool {
        self.docs.write().swap_remove(path).is_some()
    }

    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn paths(&self) -> Vec<Arc<str>> {
        self.docs.read().keys().cloned().collect()
    }

    fn document(&self, path: &str) -> Option<Arc<EditorDocument>> {
        self.docs.read().get(path).cloned()
    }
}
