//! Deciding whether a query may be answered from an older analysis.
//!
//! Reusing an analysis built on an older snapshot avoids waiting for a fresh
//! build. It is allowed only when the queried position maps back onto the
//! older snapshot and the token found there is lexically the same token as
//! the one under the cursor now. Numeric translation alone is not trusted:
//! edits elsewhere can line offsets up over a different token.

use tracing::{debug, info};

use crate::base::TextSize;
use crate::hir::Analyzer;
use crate::text::{Snapshot, translate_backward};

/// An accepted reuse: which anchor to answer from and where the query lands
/// in it.
#[derive(Clone, Debug)]
pub struct ReuseDecision {
    pub anchor: Snapshot,
    pub offset: TextSize,
}

/// Validate answering a query at `offset` in `current` from an analysis
/// anchored on one of `anchors`.
///
/// Returns `None`, meaning a fresh analysis is required, when reuse is
/// disabled, `offset` is past the end of `current`, no anchor shares
/// `current`'s buffer, the position was inserted after the anchor was taken,
/// or the token under the position changed.
pub fn validate_reuse(
    offset: TextSize,
    current: &Snapshot,
    anchors: &[Snapshot],
    allow_reuse: bool,
    analyzer: &dyn Analyzer,
) -> Option<ReuseDecision> {
    if !allow_reuse {
        info!(path = current.path(), "reuse disabled, will resolve using up-to-date analysis");
        return None;
    }
    if offset > current.len() {
        debug!(?offset, len = ?current.len(), "offset past the end of the snapshot");
        return None;
    }

    let decision = check_anchor(offset, current, anchors, analyzer);
    match &decision {
        Some(decision) => info!(
            path = current.path(),
            stamp = decision.anchor.stamp(),
            latest = current.stamp(),
            "will try existing analysis"
        ),
        None => info!(path = current.path(), "will resolve using up-to-date analysis"),
    }
    decision
}

fn check_anchor(
    offset: TextSize,
    current: &Snapshot,
    anchors: &[Snapshot],
    analyzer: &dyn Analyzer,
) -> Option<ReuseDecision> {
    let anchor = anchors.iter().find(|snap| snap.is_from_same_buffer(current))?;
    if anchor.stamp() == current.stamp() {
        return Some(ReuseDecision { anchor: anchor.clone(), offset });
    }

    let Some(old_offset) = translate_backward(offset, current, anchor) else {
        debug!(?offset, "position did not exist in the anchor snapshot");
        return None;
    };

    let new_token = analyzer.lex_token_at(current, offset)?;
    let old_token = analyzer.lex_token_at(anchor, old_offset);
    if old_token.as_ref() != Some(&new_token) {
        debug!(?offset, ?old_offset, %new_token, ?old_token, "token under the cursor changed");
        return None;
    }

    Some(ReuseDecision { anchor: anchor.clone(), offset: old_offset })
}
