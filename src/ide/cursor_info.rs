//! Cursor info: the record describing what a position is bound to.
//!
//! All string fields of a [`CursorInfo`] are slices of one shared buffer,
//! filled field by field while the record is assembled and frozen once at
//! the end. Cloning a record is cheap.

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use super::render::{DeclRenderer, overload_signature, push_escaped};
use crate::base::{LineCol, LineIndex, TextRange};
use crate::error::CursorError;
use crate::hir::{AnalysisResult, AnalysisTree, DeclId, ModuleId, ResolvedEntity, Resolver};
use crate::text::{EditorDocuments, remap_range_to_latest};

/// Separates a member's USR from the USR of the concrete type it was
/// reached through.
pub const SYNTHESIZED_USR_SEPARATOR: &str = "::SYNTHESIZED::";

/// Kind identifier of module references.
pub const MODULE_REF_UID: &str = "source.lang.ref.module";

type Span = Range<usize>;

/// Everything known about the entity under a cursor.
///
/// An empty record (see [`CursorInfo::is_empty`]) means "no information";
/// a cancelled one means the query was abandoned.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CursorInfo {
    buf: Arc<str>,
    kind: Span,
    name: Span,
    usr: Span,
    type_name: Span,
    doc_comment: Span,
    annotated_decl: Span,
    fully_annotated_decl: Span,
    group_name: Span,
    type_interface: Span,
    module_name: Span,
    decl_file: Span,
    decl_range: Option<TextRange>,
    decl_line_col: Option<LineCol>,
    override_usrs: Vec<Span>,
    related_decls: Vec<Span>,
    is_system: bool,
    is_cancelled: bool,
}

impl CursorInfo {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn cancelled() -> Self {
        Self { is_cancelled: true, ..Self::default() }
    }

    /// No entity was found (or the query failed).
    pub fn is_empty(&self) -> bool {
        self.kind.is_empty() && !self.is_cancelled
    }

    pub fn is_cancelled(&self) -> bool {
        self.is_cancelled
    }

    fn slice(&self, span: &Span) -> &str {
        self.buf.get(span.clone()).unwrap_or_default()
    }

    /// Kind identifier, e.g. `source.lang.decl.var.global`.
    pub fn kind(&self) -> &str {
        self.slice(&self.kind)
    }

    pub fn name(&self) -> &str {
        self.slice(&self.name)
    }

    pub fn usr(&self) -> &str {
        self.slice(&self.usr)
    }

    pub fn type_name(&self) -> &str {
        self.slice(&self.type_name)
    }

    pub fn doc_comment(&self) -> &str {
        self.slice(&self.doc_comment)
    }

    pub fn annotated_declaration(&self) -> &str {
        self.slice(&self.annotated_decl)
    }

    pub fn fully_annotated_declaration(&self) -> &str {
        self.slice(&self.fully_annotated_decl)
    }

    pub fn group_name(&self) -> &str {
        self.slice(&self.group_name)
    }

    /// Interface of the entity's type: the reference's static type, or the
    /// declared type itself for type declarations. Empty when neither is a
    /// nominal type.
    pub fn type_interface(&self) -> &str {
        self.slice(&self.type_interface)
    }

    /// Owning module for declarations imported without a source location;
    /// the full module name for module references.
    pub fn module_name(&self) -> &str {
        self.slice(&self.module_name)
    }

    /// File and byte range of the declaration, in the coordinates of that
    /// file's latest snapshot.
    pub fn declaration_loc(&self) -> Option<(&str, TextRange)> {
        self.decl_range.map(|range| (self.slice(&self.decl_file), range))
    }

    pub fn declaration_line_col(&self) -> Option<LineCol> {
        self.decl_line_col
    }

    pub fn override_usrs(&self) -> impl Iterator<Item = &str> {
        self.override_usrs.iter().map(|span| self.slice(span))
    }

    pub fn related_declarations(&self) -> impl Iterator<Item = &str> {
        self.related_decls.iter().map(|span| self.slice(span))
    }

    pub fn is_system(&self) -> bool {
        self.is_system
    }
}

impl fmt::Debug for CursorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_cancelled {
            return f.write_str("CursorInfo(cancelled)");
        }
        if self.is_empty() {
            return f.write_str("CursorInfo(empty)");
        }
        f.debug_struct("CursorInfo")
            .field("kind", &self.kind())
            .field("name", &self.name())
            .field("usr", &self.usr())
            .field("type_name", &self.type_name())
            .field("module_name", &self.module_name())
            .field("declaration_loc", &self.declaration_loc())
            .field("override_usrs", &self.override_usrs().collect::<Vec<_>>())
            .field("related", &self.related_declarations().collect::<Vec<_>>())
            .field("is_system", &self.is_system)
            .finish()
    }
}

/// Appends fields to one buffer, remembering where each one landed.
#[derive(Default)]
struct RecordBuilder {
    buf: String,
}

impl RecordBuilder {
    fn push(&mut self, text: &str) -> Span {
        self.field(|buf| buf.push_str(text))
    }

    fn field(&mut self, fill: impl FnOnce(&mut String)) -> Span {
        let start = self.buf.len();
        fill(&mut self.buf);
        start..self.buf.len()
    }
}

/// What assembly needs besides the entity itself.
#[derive(Clone, Copy)]
pub struct CursorContext<'a> {
    pub analysis: &'a AnalysisResult,
    pub renderer: &'a dyn DeclRenderer,
    /// Source of the latest snapshots declaration locations are mapped to.
    pub documents: &'a EditorDocuments,
}

/// Build the cursor info record for a resolved entity.
///
/// Fails with [`CursorError::StaleRemapFailed`] when the declaration's
/// location cannot be carried forward to the latest snapshot of its file,
/// and with [`CursorError::Unavailable`] for unavailable declarations.
pub fn assemble_cursor_info(ctx: CursorContext<'_>, entity: &ResolvedEntity) -> Result<CursorInfo, CursorError> {
    let tree = &ctx.analysis.tree;
    let decl = match entity {
        ResolvedEntity::Module { module, .. } => return Ok(module_record(tree, *module)),
        _ => entity.value_decl().ok_or(CursorError::NoResolution)?,
    };
    let d = tree.decl(decl);
    if d.is_unavailable {
        return Err(CursorError::Unavailable);
    }

    let resolver = Resolver::new(tree);
    let base_type = resolver.base_type_for(decl, entity.static_type());
    let mut b = RecordBuilder::default();

    let kind = b.push(&d.kind.uid(entity.is_ref()));
    let name = b.push(&d.display_name);
    let usr = b.field(|buf| {
        buf.push_str(&d.usr);
        if let Some(base) = base_type {
            buf.push_str(SYNTHESIZED_USR_SEPARATOR);
            buf.push_str(&tree.decl(base).usr);
        }
    });
    let type_name = b.push(d.type_text.as_deref().unwrap_or_default());
    let doc_comment = b.push(d.doc.as_deref().unwrap_or_default());

    let rendered = ctx.renderer.render(tree, decl, base_type);
    let annotated_decl = b.push(&rendered.annotated);
    let fully_annotated_decl = b.push(&rendered.fully_annotated);
    let group_name = b.push(d.group.as_deref().unwrap_or_default());
    let interface_type = entity
        .static_type()
        .and_then(|ty| ty.nominals.first().copied())
        .or_else(|| d.kind.is_nominal_type().then_some(decl));
    let type_interface = match interface_type.and_then(|ty| ctx.renderer.render_type_interface(tree, ty)) {
        Some(interface) => b.push(&interface),
        None => 0..0,
    };

    let override_usrs = overridden_decls(tree, decl)
        .into_iter()
        .map(|over| b.push(&tree.decl(over).usr))
        .collect();

    let related_decls = related_decls(tree, &resolver, decl)
        .into_iter()
        .map(|(related, duplicate_name)| {
            b.field(|buf| {
                let rd = tree.decl(related);
                buf.push_str("<RelatedName usr=\"");
                push_escaped(buf, &rd.usr);
                buf.push_str("\">");
                if rd.kind.is_function() && duplicate_name {
                    buf.push_str(&overload_signature(tree, related, base_type));
                } else {
                    push_escaped(buf, &rd.display_name);
                }
                buf.push_str("</RelatedName>");
            })
        })
        .collect();

    let module_name = if d.location.is_none() && d.module != AnalysisTree::MAIN_MODULE {
        b.push(&tree.module(d.module).name)
    } else {
        0..0
    };

    let (decl_file, decl_range, decl_line_col) = match &d.location {
        Some(loc) => {
            let latest = ctx.documents.latest_snapshot(&loc.file);
            let range = match &latest {
                Some(latest) => {
                    let anchors = std::slice::from_ref(&ctx.analysis.snapshot);
                    remap_range_to_latest(loc.range, anchors, latest).ok_or_else(|| {
                        debug!(file = %loc.file, range = ?loc.range, "declaration location could not be remapped");
                        CursorError::StaleRemapFailed
                    })?
                }
                None => loc.range,
            };
            let line_col = latest.map(|snap| LineIndex::new(snap.text()).line_col(range.start()));
            (b.push(&loc.file), Some(range), line_col)
        }
        None => (0..0, None, None),
    };

    Ok(CursorInfo {
        buf: Arc::from(b.buf),
        kind,
        name,
        usr,
        type_name,
        doc_comment,
        annotated_decl,
        fully_annotated_decl,
        group_name,
        type_interface,
        module_name,
        decl_file,
        decl_range,
        decl_line_col,
        override_usrs,
        related_decls,
        is_system: tree.module(d.module).is_system,
        is_cancelled: false,
    })
}

/// A module reference carries its name, full name and system flag only.
fn module_record(tree: &AnalysisTree, module: ModuleId) -> CursorInfo {
    let info = tree.module(module);
    let mut b = RecordBuilder::default();
    let kind = b.push(MODULE_REF_UID);
    let name = b.push(&info.name);
    let module_name = b.push(&info.full_name);
    CursorInfo {
        buf: Arc::from(b.buf),
        kind,
        name,
        module_name,
        is_system: info.is_system,
        ..CursorInfo::default()
    }
}

/// Every declaration `decl` overrides, nearest first, followed by the
/// requirements it satisfies.
fn overridden_decls(tree: &AnalysisTree, decl: DeclId) -> Vec<DeclId> {
    let mut seen = FxHashSet::default();
    seen.insert(decl);
    let mut result = Vec::new();

    let mut current = tree.decl(decl).overridden;
    while let Some(over) = current {
        if !seen.insert(over) {
            break;
        }
        result.push(over);
        current = tree.decl(over).overridden;
    }
    for &requirement in &tree.decl(decl).satisfies {
        if seen.insert(requirement) {
            result.push(requirement);
        }
    }
    result
}

/// Declarations sharing `decl`'s base name, each flagged when its display
/// name is shared with another candidate (counting `decl` itself).
fn related_decls(tree: &AnalysisTree, resolver: &Resolver<'_>, decl: DeclId) -> Vec<(DeclId, bool)> {
    let related = resolver.related_decls(decl);

    let mut names_seen: FxHashMap<&str, usize> = FxHashMap::default();
    *names_seen.entry(tree.decl(decl).display_name.as_str()).or_default() += 1;
    for &other in &related {
        *names_seen.entry(tree.decl(other).display_name.as_str()).or_default() += 1;
    }

    related
        .into_iter()
        .map(|other| {
            let duplicate = names_seen.get(tree.decl(other).display_name.as_str()).copied().unwrap_or(0) > 1;
            (other, duplicate)
        })
        .collect()
}
