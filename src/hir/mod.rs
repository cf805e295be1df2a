//! High-level IR: the analyzed tree and symbol resolution.
//!
//! - [`AnalysisTree`] / [`TreeBuilder`] - declarations, scopes and
//!   references of one analyzed file
//! - [`Invocation`] - what to build, the coalescing key
//! - [`Analyzer`] - the collaborator that produces trees
//! - [`Resolver`] / [`ResolvedEntity`] - what a position is bound to

mod analyzer;
mod decl;
mod ids;
mod input;
mod resolve;
mod tree;

pub use analyzer::Analyzer;
pub use decl::{
    Decl, DeclKind, DeclLocation, DeclSpec, Param, Signature, Ty, TypeRef, is_operator_name,
};
pub use ids::{DeclId, ModuleId, NodeId};
pub use input::Invocation;
pub use resolve::{ResolvedEntity, Resolver};
pub use tree::{
    AnalysisResult, AnalysisTree, ModuleInfo, Node, NodeKind, RefNode, ScopeKind, ScopeVisibility,
    TreeBuilder,
};
