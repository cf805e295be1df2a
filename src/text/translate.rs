//! Offset translation across the edit log.
//!
//! Positions move through edits in either direction. Both walks are
//! conservative: a position that did not exist on the other side (inserted
//! text going back, removed text going forward) has no translation, and an
//! edit starting exactly at the position always affects it.

use tracing::debug;

use super::snapshot::Snapshot;
use crate::base::{TextRange, TextSize};

/// Map `offset` in `newer` to the same character in `older`.
///
/// Returns `None` when the character was inserted by one of the edits in
/// between, when the edit log between the two snapshots cannot be
/// enumerated, or when `offset` lies outside every snapshot it passes.
pub fn translate_backward(offset: TextSize, newer: &Snapshot, older: &Snapshot) -> Option<TextSize> {
    let edits = older.edits_until(newer)?;

    let mut offset = offset;
    for edit in edits.iter().rev() {
        if edit.inserted_range().contains(offset) {
            return None;
        }
        if edit.offset <= offset {
            offset = offset.checked_add(edit.removed_len)?.checked_sub(edit.inserted_len())?;
        }
    }
    Some(offset)
}

/// Map `offset` in `older` to the same character in `newer`.
///
/// Returns `None` when the character was removed by one of the edits in
/// between, when the edit log cannot be fully enumerated, or when `offset`
/// lies outside every snapshot it passes.
pub fn translate_forward(offset: TextSize, older: &Snapshot, newer: &Snapshot) -> Option<TextSize> {
    let mut offset = offset;
    let completed = older.foreach_replace_until(newer, |edit| {
        if edit.removed_range().contains(offset) {
            return false;
        }
        if edit.offset <= offset {
            match offset.checked_add(edit.inserted_len()).and_then(|o| o.checked_sub(edit.removed_len)) {
                Some(shifted) => offset = shifted,
                None => return false,
            }
        }
        true
    });
    completed.then_some(offset)
}

/// Translate a declaration range from the snapshot an analysis was built on
/// to `latest`.
///
/// The first anchor sharing `latest`'s buffer is used. Equal stamps return the
/// range untouched; a range whose buffer has no anchor is assumed to be
/// current already. Fails when either endpoint cannot be translated.
pub fn remap_range_to_latest(range: TextRange, anchors: &[Snapshot], latest: &Snapshot) -> Option<TextRange> {
    let Some(anchor) = anchors.iter().find(|snap| snap.is_from_same_buffer(latest)) else {
        return Some(range);
    };
    if anchor.stamp() == latest.stamp() {
        return Some(range);
    }

    let start = translate_forward(range.start(), anchor, latest)?;
    let end = translate_forward(range.end(), anchor, latest)?;
    if end < start {
        debug!(?range, ?start, ?end, "remapped range is inverted");
        return None;
    }
    Some(TextRange::new(start, end))
}
