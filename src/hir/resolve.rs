//! Symbol resolution: mapping a position to the entity bound there.
//!
//! The resolver answers "what is under this offset?" against one
//! [`AnalysisTree`]. The offset is expected to be snapped to the start of its
//! token already; the resolver itself never looks at text.
//!
//! Resolution picks the innermost declaration-site, reference or
//! module-reference node containing the offset. Module references
//! short-circuit entity resolution. References that go through a constructor
//! or type alias denote the type, not the raw value declaration. Unavailable
//! declarations never resolve through [`Resolver::resolve`];
//! [`Resolver::entity_at`] reports them so callers can tell "nothing here"
//! from "something unusable here".

use std::cmp::Reverse;

use rustc_hash::FxHashSet;
use tracing::trace;

use super::decl::{DeclKind, Ty};
use super::ids::{DeclId, ModuleId};
use super::tree::{AnalysisTree, NodeKind};
use crate::base::{TextRange, TextSize};

// ============================================================================
// RESOLVED ENTITY
// ============================================================================

/// What a position resolved to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolvedEntity {
    /// A reference to a module, e.g. the name in an import.
    Module { module: ModuleId, range: TextRange },
    /// The declaring occurrence of a name.
    Declaration { decl: DeclId, range: TextRange },
    /// A use-site.
    Reference {
        target: DeclId,
        ctor_type: Option<DeclId>,
        ty: Option<Ty>,
        is_keyword_argument: bool,
        range: TextRange,
    },
}

impl ResolvedEntity {
    /// Byte range of the occurrence in the anchor snapshot.
    pub fn range(&self) -> TextRange {
        match self {
            ResolvedEntity::Module { range, .. }
            | ResolvedEntity::Declaration { range, .. }
            | ResolvedEntity::Reference { range, .. } => *range,
        }
    }

    pub fn is_ref(&self) -> bool {
        !matches!(self, ResolvedEntity::Declaration { .. })
    }

    /// The declaration this entity stands for: the type behind a constructor
    /// reference when there is one, the referenced or declared entity
    /// otherwise. `None` for modules.
    pub fn value_decl(&self) -> Option<DeclId> {
        match self {
            ResolvedEntity::Module { .. } => None,
            ResolvedEntity::Declaration { decl, .. } => Some(*decl),
            ResolvedEntity::Reference { target, ctor_type, .. } => Some(ctor_type.unwrap_or(*target)),
        }
    }

    pub fn static_type(&self) -> Option<&Ty> {
        match self {
            ResolvedEntity::Reference { ty, .. } => ty.as_ref(),
            _ => None,
        }
    }

    pub fn is_keyword_argument(&self) -> bool {
        matches!(self, ResolvedEntity::Reference { is_keyword_argument: true, .. })
    }

    pub fn decl_kind(&self, tree: &AnalysisTree) -> Option<DeclKind> {
        self.value_decl().map(|decl| tree.decl(decl).kind)
    }
}

// ============================================================================
// RESOLVER
// ============================================================================

/// Position-to-entity resolution over one tree.
#[derive(Clone, Copy, Debug)]
pub struct Resolver<'a> {
    tree: &'a AnalysisTree,
}

impl<'a> Resolver<'a> {
    pub fn new(tree: &'a AnalysisTree) -> Self {
        Self { tree }
    }

    /// Resolve the entity at `offset`, or `None` for whitespace, literals,
    /// keywords and unavailable declarations.
    pub fn resolve(&self, offset: TextSize) -> Option<ResolvedEntity> {
        let entity = self.entity_at(offset)?;
        match entity.value_decl() {
            Some(decl) if self.tree.decl(decl).is_unavailable => {
                trace!(?decl, "declaration is unavailable");
                None
            }
            _ => Some(entity),
        }
    }

    /// The entity bound at `offset`, unavailable declarations included.
    pub fn entity_at(&self, offset: TextSize) -> Option<ResolvedEntity> {
        let (id, node) = self
            .tree
            .nodes_at(offset)
            .filter(|(_, node)| !matches!(node.kind, NodeKind::Scope(_)))
            // innermost wins; on equal ranges the deeper (later) node wins
            .min_by_key(|(id, node)| (node.range.len(), Reverse(*id)))?;
        trace!(?id, ?offset, kind = ?node.kind, "resolved node");

        match &node.kind {
            NodeKind::Scope(_) => None,
            NodeKind::ModuleRef(module) => Some(ResolvedEntity::Module { module: *module, range: node.range }),
            NodeKind::Decl(decl) => Some(ResolvedEntity::Declaration { decl: *decl, range: node.range }),
            NodeKind::Ref(reference) => Some(ResolvedEntity::Reference {
                target: reference.target,
                ctor_type: reference.ctor_type,
                ty: reference.ty.clone(),
                is_keyword_argument: reference.is_keyword_argument,
                range: node.range,
            }),
        }
    }

    /// Declarations sharing `decl`'s base name visible from its scope,
    /// excluding `decl` itself and unavailable ones, innermost first.
    pub fn related_decls(&self, decl: DeclId) -> Vec<DeclId> {
        let target = self.tree.decl(decl);
        self.tree
            .lookup_unqualified(target.name, target.scope)
            .into_iter()
            .filter(|&other| other != decl && !self.tree.decl(other).is_unavailable)
            .collect()
    }

    /// Nominal type in `ty` that stands in for `decl`'s own nominal context,
    /// when that is a different concrete type: the first type that either is
    /// the context or conforms to it.
    pub fn base_type_for(&self, decl: DeclId, ty: Option<&Ty>) -> Option<DeclId> {
        let context = self.tree.decl(decl).nominal_context?;
        let found = ty?
            .nominals
            .iter()
            .copied()
            .find(|&candidate| self.conforms_to(candidate, context))?;
        (found != context).then_some(found)
    }

    /// Whether `ty` is `target` or reaches it through its conformances and
    /// superclasses.
    pub fn conforms_to(&self, ty: DeclId, target: DeclId) -> bool {
        let mut seen = FxHashSet::default();
        let mut stack = vec![ty];
        while let Some(current) = stack.pop() {
            if current == target {
                return true;
            }
            if seen.insert(current) {
                stack.extend(self.tree.decl(current).conformances.iter().copied());
            }
        }
        false
    }
}
