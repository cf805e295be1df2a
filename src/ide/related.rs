//! Related identifiers: every occurrence of one entity in a file.
//!
//! Occurrences are matched by declaration identity, never by name, so
//! shadowed or overloaded names do not leak into the result.

use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::base::TextRange;
use crate::hir::{AnalysisTree, NodeKind, ResolvedEntity};

/// Occurrences of one entity as `(offset, length)` byte pairs, in source
/// order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RelatedIdentsInfo {
    pub ranges: Vec<(u32, u32)>,
    pub is_cancelled: bool,
}

impl RelatedIdentsInfo {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn cancelled() -> Self {
        Self { ranges: Vec::new(), is_cancelled: true }
    }
}

/// Collect the occurrences of `entity`'s declaration.
///
/// The walk covers the declaration's innermost local scope, or the whole
/// file for top-level and member declarations. Module references, argument
/// labels, operators, and constructors, destructors or subscripts queried at
/// their declaration yield nothing. Once `cancel` fires the result is
/// cancelled and carries no ranges.
pub fn scan_related_identifiers(
    tree: &AnalysisTree,
    entity: &ResolvedEntity,
    cancel: &CancellationToken,
) -> RelatedIdentsInfo {
    scan_observed(tree, entity, cancel, |_| {})
}

/// [`scan_related_identifiers`], calling `on_match` with each occurrence as
/// it is found.
fn scan_observed(
    tree: &AnalysisTree,
    entity: &ResolvedEntity,
    cancel: &CancellationToken,
    mut on_match: impl FnMut(TextRange),
) -> RelatedIdentsInfo {
    if entity.is_keyword_argument() {
        return RelatedIdentsInfo::empty();
    }
    let Some(target) = entity.value_decl() else {
        return RelatedIdentsInfo::empty();
    };
    let decl = tree.decl(target);
    if !entity.is_ref() && decl.kind.is_special_member() {
        return RelatedIdentsInfo::empty();
    }
    if decl.is_operator {
        return RelatedIdentsInfo::empty();
    }

    let root = decl.local_scope.unwrap_or(AnalysisTree::ROOT);
    let mut ranges = Vec::new();
    let completed = tree.walk(root, |id, node| {
        if cancel.is_cancelled() {
            return false;
        }
        let matches = match &node.kind {
            NodeKind::Decl(d) => *d == target,
            NodeKind::Ref(r) if !r.is_keyword_argument => r.ctor_type.unwrap_or(r.target) == target,
            _ => false,
        };
        if matches {
            trace!(?id, range = ?node.range, "related occurrence");
            on_match(node.range);
            ranges.push((u32::from(node.range.start()), u32::from(node.range.len())));
        }
        true
    });

    if !completed || cancel.is_cancelled() {
        return RelatedIdentsInfo::cancelled();
    }
    RelatedIdentsInfo { ranges, is_cancelled: false }
}
