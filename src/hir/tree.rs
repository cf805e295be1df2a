//! The analyzed tree an analyzer hands back for one snapshot.
//!
//! # Layout
//!
//! Nodes live in one arena in creation order, which builders keep equal to
//! source order, so a pre-order walk of a subtree is a walk in source order.
//! Declarations live in a second arena and are referenced by [`DeclId`] from
//! declaration-site and reference nodes.
//!
//! Every scope node carries a [`ScopeVisibility`]: the declarations made
//! directly in it, keyed by interned base name. The file scope additionally
//! holds declarations imported from other modules. Unqualified lookup walks
//! these maps from a scope outwards.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use super::decl::{Decl, DeclSpec, Ty, is_operator_name};
use super::ids::{DeclId, ModuleId, NodeId};
use super::input::Invocation;
use crate::base::{Interner, Name, TextRange, TextSize};
use crate::text::Snapshot;

/// A module the tree knows about.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleInfo {
    pub name: SmolStr,
    pub full_name: SmolStr,
    pub is_system: bool,
}

impl ModuleInfo {
    pub fn new(name: impl Into<SmolStr>) -> Self {
        let name = name.into();
        Self { full_name: name.clone(), name, is_system: false }
    }

    pub fn with_full_name(mut self, full_name: impl Into<SmolStr>) -> Self {
        self.full_name = full_name.into();
        self
    }

    pub fn system(mut self) -> Self {
        self.is_system = true;
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScopeKind {
    /// The whole file.
    File,
    /// The member list of a nominal type.
    Type(DeclId),
    /// A function body, closure or block: anything local.
    Local,
}

/// A use-site of a declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefNode {
    pub target: DeclId,
    /// The type a constructor call or type-alias spelling goes through, e.g.
    /// `Point` in `Point(x: 1)` whose `target` is the initializer.
    pub ctor_type: Option<DeclId>,
    /// Static type of the referencing expression.
    pub ty: Option<Ty>,
    /// The node is an argument label, like `at` in `insert(1, at: 0)`.
    pub is_keyword_argument: bool,
}

impl RefNode {
    pub fn to(target: DeclId) -> Self {
        Self { target, ctor_type: None, ty: None, is_keyword_argument: false }
    }

    pub fn through_type(mut self, ty_decl: DeclId) -> Self {
        self.ctor_type = Some(ty_decl);
        self
    }

    pub fn with_ty(mut self, ty: Ty) -> Self {
        self.ty = Some(ty);
        self
    }

    pub fn keyword_argument(mut self) -> Self {
        self.is_keyword_argument = true;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Scope(ScopeKind),
    Decl(DeclId),
    Ref(RefNode),
    ModuleRef(ModuleId),
}

#[derive(Clone, Debug)]
pub struct Node {
    pub kind: NodeKind,
    pub range: TextRange,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// Names visible in one scope.
#[derive(Clone, Debug, Default)]
pub struct ScopeVisibility {
    direct: FxHashMap<Name, Vec<DeclId>>,
    imports: FxHashMap<Name, Vec<DeclId>>,
}

impl ScopeVisibility {
    /// Declarations made directly in this scope, then imported ones.
    pub fn lookup(&self, name: Name) -> impl Iterator<Item = DeclId> + '_ {
        let direct = self.direct.get(&name).into_iter().flatten();
        let imports = self.imports.get(&name).into_iter().flatten();
        direct.chain(imports).copied()
    }

    pub fn add_direct(&mut self, name: Name, decl: DeclId) {
        self.direct.entry(name).or_default().push(decl);
    }

    pub fn add_import(&mut self, name: Name, decl: DeclId) {
        self.imports.entry(name).or_default().push(decl);
    }

    pub fn len(&self) -> usize {
        self.direct.values().chain(self.imports.values()).map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An analyzed, immutable, queryable tree for one file.
#[derive(Debug)]
pub struct AnalysisTree {
    file: Arc<str>,
    interner: Interner,
    modules: Vec<ModuleInfo>,
    decls: Vec<Decl>,
    nodes: Vec<Node>,
    scopes: FxHashMap<NodeId, ScopeVisibility>,
}

impl AnalysisTree {
    pub const ROOT: NodeId = NodeId(0);
    pub const MAIN_MODULE: ModuleId = ModuleId(0);

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn decl(&self, id: DeclId) -> &Decl {
        &self.decls[id.idx()]
    }

    pub fn decls(&self) -> impl Iterator<Item = (DeclId, &Decl)> {
        self.decls.iter().enumerate().map(|(i, d)| (DeclId(i as u32), d))
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.idx()]
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i as u32), n))
    }

    pub fn module(&self, id: ModuleId) -> &ModuleInfo {
        &self.modules[id.idx()]
    }

    pub fn main_module(&self) -> &ModuleInfo {
        self.module(Self::MAIN_MODULE)
    }

    pub fn name_text(&self, name: Name) -> SmolStr {
        self.interner.lookup(name).unwrap_or_default()
    }

    pub fn base_name(&self, id: DeclId) -> SmolStr {
        self.name_text(self.decl(id).name)
    }

    pub fn scope(&self, id: NodeId) -> Option<&ScopeVisibility> {
        self.scopes.get(&id)
    }

    /// Every declaration named `name` visible from `scope`, innermost scope
    /// first.
    pub fn lookup_unqualified(&self, name: Name, scope: NodeId) -> Vec<DeclId> {
        let mut results = Vec::new();
        let mut current = Some(scope);
        while let Some(id) = current {
            if let Some(vis) = self.scopes.get(&id) {
                results.extend(vis.lookup(name));
            }
            current = self.node(id).parent;
        }
        results
    }

    /// Pre-order walk of the subtree rooted at `root`.
    ///
    /// `visit` returns `false` to stop the whole walk; the return value tells
    /// whether the walk ran to completion.
    pub fn walk(&self, root: NodeId, mut visit: impl FnMut(NodeId, &Node) -> bool) -> bool {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let node = self.node(id);
            if !visit(id, node) {
                return false;
            }
            stack.extend(node.children.iter().rev().copied());
        }
        true
    }

    /// Nodes whose range contains `offset`, in arena order.
    pub fn nodes_at(&self, offset: TextSize) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes()
            .filter(move |(_, node)| node.range.contains(offset))
    }
}

/// An analysis plus the snapshot it was built from.
#[derive(Debug)]
pub struct AnalysisResult {
    pub tree: AnalysisTree,
    pub snapshot: Snapshot,
    pub invocation: Invocation,
}

/// Incremental constructor for an [`AnalysisTree`].
///
/// Analyzers add scopes, declarations and references in source order.
pub struct TreeBuilder {
    tree: AnalysisTree,
    open: Vec<NodeId>,
}

impl TreeBuilder {
    /// Start a tree for `file` whose main module is `main`, with the file
    /// scope open.
    pub fn new(file: impl Into<Arc<str>>, main: ModuleInfo) -> Self {
        let root = Node {
            kind: NodeKind::Scope(ScopeKind::File),
            range: TextRange::default(),
            parent: None,
            children: Vec::new(),
        };
        let mut scopes = FxHashMap::default();
        scopes.insert(AnalysisTree::ROOT, ScopeVisibility::default());
        Self {
            tree: AnalysisTree {
                file: file.into(),
                interner: Interner::new(),
                modules: vec![main],
                decls: Vec::new(),
                nodes: vec![root],
                scopes,
            },
            open: vec![AnalysisTree::ROOT],
        }
    }

    pub fn add_module(&mut self, module: ModuleInfo) -> ModuleId {
        let id = ModuleId(self.tree.modules.len() as u32);
        self.tree.modules.push(module);
        id
    }

    pub fn intern(&self, name: &str) -> Name {
        self.tree.interner.intern(name)
    }

    /// Set the range of the file scope.
    pub fn set_file_range(&mut self, range: TextRange) {
        self.tree.nodes[0].range = range;
    }

    /// Declare an entity in the innermost open scope.
    ///
    /// When `name_range` is given a declaration-site node is added there and,
    /// unless `spec` already carries one, the location defaults to this
    /// file.
    pub fn declare(&mut self, spec: DeclSpec, name_range: Option<TextRange>) -> DeclId {
        let scope = self.current_scope();
        let local_scope = self.innermost_local_scope();
        let nominal_context = match self.tree.node(scope).kind {
            NodeKind::Scope(ScopeKind::Type(owner)) => Some(owner),
            _ => None,
        };

        let mut spec = spec;
        if spec.location.is_none() {
            if let Some(range) = name_range {
                spec = spec.with_location(self.tree.file.clone(), range);
            }
        }

        let id = self.push_decl(spec, scope, local_scope, nominal_context);
        let name = self.tree.decls[id.idx()].name;
        self.tree.scopes.entry(scope).or_default().add_direct(name, id);

        if let Some(range) = name_range {
            self.push_node(NodeKind::Decl(id), range);
        }
        id
    }

    /// Declare an entity from another module, visible from the file scope.
    pub fn declare_imported(&mut self, spec: DeclSpec) -> DeclId {
        let id = self.push_decl(spec, AnalysisTree::ROOT, None, None);
        let name = self.tree.decls[id.idx()].name;
        self.tree.scopes.entry(AnalysisTree::ROOT).or_default().add_import(name, id);
        id
    }

    /// Declare a member of an imported nominal type.
    pub fn declare_imported_member(&mut self, spec: DeclSpec, owner: DeclId) -> DeclId {
        self.push_decl(spec, AnalysisTree::ROOT, None, Some(owner))
    }

    pub fn open_scope(&mut self, kind: ScopeKind, range: TextRange) -> NodeId {
        let id = self.push_node(NodeKind::Scope(kind), range);
        self.tree.scopes.insert(id, ScopeVisibility::default());
        self.open.push(id);
        id
    }

    /// Close the innermost scope. The file scope is never closed.
    pub fn close_scope(&mut self) {
        if self.open.len() > 1 {
            self.open.pop();
        }
    }

    pub fn reference(&mut self, reference: RefNode, range: TextRange) -> NodeId {
        self.push_node(NodeKind::Ref(reference), range)
    }

    pub fn module_ref(&mut self, module: ModuleId, range: TextRange) -> NodeId {
        self.push_node(NodeKind::ModuleRef(module), range)
    }

    /// Record that `decl` overrides `base`, for analyzers that learn it
    /// after declaring both.
    pub fn set_overridden(&mut self, decl: DeclId, base: DeclId) {
        self.tree.decls[decl.idx()].overridden = Some(base);
    }

    pub fn add_conformance(&mut self, ty: DeclId, protocol: DeclId) {
        self.tree.decls[ty.idx()].conformances.push(protocol);
    }

    pub fn current_scope(&self) -> NodeId {
        self.open.last().copied().unwrap_or(AnalysisTree::ROOT)
    }

    pub fn finish(self) -> AnalysisTree {
        self.tree
    }

    fn innermost_local_scope(&self) -> Option<NodeId> {
        self.open
            .iter()
            .rev()
            .copied()
            .find(|&id| self.tree.node(id).kind == NodeKind::Scope(ScopeKind::Local))
    }

    fn push_decl(
        &mut self,
        spec: DeclSpec,
        scope: NodeId,
        local_scope: Option<NodeId>,
        nominal_context: Option<DeclId>,
    ) -> DeclId {
        let id = DeclId(self.tree.decls.len() as u32);
        let decl = Decl {
            kind: spec.kind,
            name: self.tree.interner.intern(&spec.base_name),
            display_name: spec.resolved_display_name(),
            is_operator: is_operator_name(&spec.base_name),
            usr: spec.usr,
            type_text: spec.type_text,
            doc: spec.doc,
            group: spec.group,
            module: spec.module.unwrap_or(AnalysisTree::MAIN_MODULE),
            location: spec.location,
            signature: spec.signature,
            scope,
            local_scope,
            nominal_context,
            overridden: spec.overridden,
            satisfies: spec.satisfies,
            conformances: spec.conformances,
            is_implicit: spec.is_implicit,
            is_unavailable: spec.is_unavailable,
        };
        self.tree.decls.push(decl);
        id
    }

    fn push_node(&mut self, kind: NodeKind, range: TextRange) -> NodeId {
        let id = NodeId(self.tree.nodes.len() as u32);
        let parent = self.current_scope();
        self.tree.nodes.push(Node { kind, range, parent: Some(parent), children: Vec::new() });
        self.tree.nodes[parent.idx()].children.push(id);
        id
    }
}
