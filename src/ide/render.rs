//! Declaration markup: annotated and fully annotated signatures.
//!
//! Two flavours are produced for every declaration:
//!
//! - the *annotated* form wraps the printed signature in
//!   `<Declaration>…</Declaration>` and marks resolved type names with
//!   `<Type usr="…">`;
//! - the *fully annotated* form tags every structural part: the declaration
//!   itself by kind (`<decl.function.free>`), its name (`<decl.name>`),
//!   parameters, parameter names and types, the return type, and type
//!   references by kind (`<ref.struct usr="…">`).
//!
//! Both are printed by one [`MarkupPrinter`], an explicit visitor that keeps
//! the stack of declarations being printed so nested parts know which tag
//! applies to them.

use std::fmt::Write as _;

use rustc_hash::FxHashSet;

use crate::hir::{AnalysisTree, Decl, DeclId, DeclKind, Param, TypeRef};

/// The two markup renderings of one declaration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RenderedDecl {
    pub annotated: String,
    pub fully_annotated: String,
}

/// Renders declaration markup for cursor info.
///
/// `base_type` is the concrete type standing in for the declaration's own
/// nominal context at the queried site; references to that context are
/// printed as the base type instead.
pub trait DeclRenderer: Send + Sync + 'static {
    fn render(&self, tree: &AnalysisTree, decl: DeclId, base_type: Option<DeclId>) -> RenderedDecl;

    /// Source-like interface of the nominal type `ty`, or `None` when this
    /// renderer does not print interfaces.
    fn render_type_interface(&self, tree: &AnalysisTree, ty: DeclId) -> Option<String> {
        let _ = (tree, ty);
        None
    }
}

/// The default XML-like markup renderer.
#[derive(Clone, Copy, Debug, Default)]
pub struct MarkupRenderer;

impl DeclRenderer for MarkupRenderer {
    fn render(&self, tree: &AnalysisTree, decl: DeclId, base_type: Option<DeclId>) -> RenderedDecl {
        let decl = non_implicit(tree, decl);

        let mut annotated = MarkupPrinter::new(tree, Style::Annotated, base_type);
        annotated.out.push_str("<Declaration>");
        annotated.print_decl(decl);
        annotated.out.push_str("</Declaration>");

        let mut full = MarkupPrinter::new(tree, Style::Full, base_type);
        full.print_decl(decl);

        RenderedDecl { annotated: annotated.finish(), fully_annotated: full.finish() }
    }

    fn render_type_interface(&self, tree: &AnalysisTree, ty: DeclId) -> Option<String> {
        type_interface(tree, ty)
    }
}

/// The type's own declaration followed by its explicit members, one per
/// line, unescaped. `None` unless `ty` is a nominal type.
pub fn type_interface(tree: &AnalysisTree, ty: DeclId) -> Option<String> {
    if !tree.decl(ty).kind.is_nominal_type() {
        return None;
    }
    let mut printer = MarkupPrinter::new(tree, Style::Source, None);
    printer.print_decl(ty);
    printer.out.push_str(" {\n");
    for (member, d) in tree.decls() {
        if d.nominal_context == Some(ty) && !d.is_implicit {
            printer.out.push_str("  ");
            printer.print_decl(member);
            printer.out.push('\n');
        }
    }
    printer.out.push('}');
    Some(printer.finish())
}

/// Implicit declarations carry no useful spelling; print the closest
/// explicit declaration they override instead.
fn non_implicit(tree: &AnalysisTree, mut decl: DeclId) -> DeclId {
    let mut seen = FxHashSet::default();
    loop {
        let d = tree.decl(decl);
        match d.overridden {
            Some(base) if d.is_implicit && seen.insert(decl) => decl = base,
            _ => return decl,
        }
    }
}

/// `name(label: Type, …)` with XML escaping and no tags, used to tell
/// overloads apart in related-declaration lists.
pub fn overload_signature(tree: &AnalysisTree, decl: DeclId, base_type: Option<DeclId>) -> String {
    let mut printer = MarkupPrinter::new(tree, Style::Plain, base_type);
    let d = tree.decl(decl);
    printer.text(&tree.base_name(decl));
    printer.out.push('(');
    if let Some(sig) = &d.signature {
        for (i, param) in sig.params.iter().enumerate() {
            if i > 0 {
                printer.out.push_str(", ");
            }
            printer.text(param.label.as_deref().unwrap_or("_"));
            printer.out.push_str(": ");
            printer.type_ref(d, &param.ty);
        }
    }
    printer.out.push(')');
    printer.finish()
}

/// Append `text` with the five XML special characters escaped.
pub(crate) fn push_escaped(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Style {
    /// No tags and no escaping.
    Source,
    /// No tags at all.
    Plain,
    /// `<Type usr>` around resolved type names only.
    Annotated,
    /// Structural tags everywhere.
    Full,
}

const EXTERNAL_PARAM_TAG: &str = "decl.var.parameter.name.external";
const LOCAL_PARAM_TAG: &str = "decl.var.parameter.name.local";

/// Stack-based markup visitor.
struct MarkupPrinter<'t> {
    tree: &'t AnalysisTree,
    style: Style,
    base_type: Option<DeclId>,
    /// Kinds of the declarations currently open, innermost last.
    stack: Vec<DeclKind>,
    out: String,
}

impl<'t> MarkupPrinter<'t> {
    fn new(tree: &'t AnalysisTree, style: Style, base_type: Option<DeclId>) -> Self {
        Self { tree, style, base_type, stack: Vec::new(), out: String::new() }
    }

    fn finish(self) -> String {
        self.out
    }

    // ---- structural boundaries ----

    fn decl_pre(&mut self, kind: DeclKind) {
        self.stack.push(kind);
        self.open(kind.tag(false));
    }

    fn decl_post(&mut self) {
        if let Some(kind) = self.stack.pop() {
            self.close(kind.tag(false));
        }
    }

    fn name(&mut self, tag: &str, text: &str) {
        self.open(tag);
        self.text(text);
        self.close(tag);
    }

    fn type_pre(&mut self) {
        if let Some(tag) = self.type_tag() {
            self.open(tag);
        }
    }

    fn type_post(&mut self) {
        if let Some(tag) = self.type_tag() {
            self.close(tag);
        }
    }

    fn type_tag(&self) -> Option<&'static str> {
        match self.stack.last()? {
            DeclKind::Param => Some("decl.var.parameter.type"),
            kind if kind.is_function() => Some("decl.function.returntype"),
            _ => None,
        }
    }

    fn open(&mut self, tag: &str) {
        if self.style == Style::Full {
            let _ = write!(self.out, "<{tag}>");
        }
    }

    fn close(&mut self, tag: &str) {
        if self.style == Style::Full {
            let _ = write!(self.out, "</{tag}>");
        }
    }

    fn text(&mut self, text: &str) {
        if self.style == Style::Source {
            self.out.push_str(text);
        } else {
            push_escaped(&mut self.out, text);
        }
    }

    // ---- printing ----

    fn print_decl(&mut self, id: DeclId) {
        let tree = self.tree;
        let decl = tree.decl(id);
        self.decl_pre(decl.kind);

        if let Some(keyword) = decl.kind.keyword() {
            self.text(keyword);
            if !matches!(decl.kind, DeclKind::Constructor | DeclKind::Destructor | DeclKind::Subscript) {
                self.out.push(' ');
            }
        }
        if !decl.kind.is_special_member() {
            let tag = if decl.kind == DeclKind::Param { LOCAL_PARAM_TAG } else { "decl.name" };
            let name = tree.base_name(id);
            self.name(tag, &name);
        }

        if decl.kind.is_function() {
            self.print_signature(decl);
        } else if decl.kind.is_nominal_type() {
            self.print_conformances(decl);
        } else if let Some(ty) = &decl.type_text {
            let separator = if decl.kind == DeclKind::TypeAlias { " = " } else { ": " };
            self.out.push_str(separator);
            self.type_pre();
            let ty = TypeRef::new(ty.clone(), None);
            self.type_ref(decl, &ty);
            self.type_post();
        }

        self.decl_post();
    }

    fn print_signature(&mut self, decl: &Decl) {
        if decl.kind == DeclKind::Destructor {
            return;
        }
        self.out.push('(');
        if let Some(sig) = &decl.signature {
            for (i, param) in sig.params.iter().enumerate() {
                if i > 0 {
                    self.out.push_str(", ");
                }
                self.print_param(decl, param);
            }
        }
        self.out.push(')');

        if let Some(result) = decl.signature.as_ref().and_then(|sig| sig.result.as_ref()) {
            self.text(" -> ");
            self.type_pre();
            self.type_ref(decl, result);
            self.type_post();
        }
    }

    fn print_param(&mut self, owner: &Decl, param: &Param) {
        self.decl_pre(DeclKind::Param);
        match param.label.as_deref() {
            Some(label) if label == param.name => self.name(EXTERNAL_PARAM_TAG, label),
            Some(label) => {
                self.name(EXTERNAL_PARAM_TAG, label);
                self.out.push(' ');
                self.name(LOCAL_PARAM_TAG, &param.name);
            }
            None if owner.kind == DeclKind::Subscript => self.name(LOCAL_PARAM_TAG, &param.name),
            None => {
                self.out.push_str("_ ");
                self.name(LOCAL_PARAM_TAG, &param.name);
            }
        }
        self.out.push_str(": ");
        self.type_pre();
        self.type_ref(owner, &param.ty);
        self.type_post();
        self.decl_post();
    }

    fn print_conformances(&mut self, decl: &Decl) {
        for (i, &protocol) in decl.conformances.iter().enumerate() {
            self.out.push_str(if i == 0 { ": " } else { ", " });
            let name = self.tree.base_name(protocol);
            self.print_type_name(&name, Some(protocol));
        }
    }

    /// Print a type spelled in `owner`'s signature, substituting the base
    /// type for references to `owner`'s own nominal context.
    fn type_ref(&mut self, owner: &Decl, ty: &TypeRef) {
        if let Some(base) = self.base_type {
            let is_context = ty.decl.is_some() && ty.decl == owner.nominal_context;
            if is_context || ty.text == "Self" {
                let name = self.tree.base_name(base);
                self.print_type_name(&name, Some(base));
                return;
            }
        }
        self.print_type_name(&ty.text, ty.decl);
    }

    fn print_type_name(&mut self, text: &str, decl: Option<DeclId>) {
        let Some(decl) = decl else {
            self.text(text);
            return;
        };
        let target = self.tree.decl(decl);
        let tag = match self.style {
            Style::Source | Style::Plain => {
                self.text(text);
                return;
            }
            Style::Annotated => "Type",
            Style::Full => target.kind.tag(true),
        };
        let _ = write!(self.out, "<{tag} usr=\"");
        push_escaped(&mut self.out, &target.usr);
        self.out.push_str("\">");
        self.text(text);
        let _ = write!(self.out, "</{tag}>");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::{TextRange, TextSize};
    use crate::hir::{DeclSpec, ModuleInfo, ScopeKind, Signature, TreeBuilder};

    fn range(start: u32, end: u32) -> TextRange {
        TextRange::new(TextSize::from(start), TextSize::from(end))
    }

    fn param(label: Option<&str>, name: &str, ty: &str, decl: Option<DeclId>) -> Param {
        Param { label: label.map(Into::into), name: name.into(), ty: TypeRef::new(ty, decl) }
    }

    #[test]
    fn test_free_function_markup() {
        let mut b = TreeBuilder::new("/a.mini", ModuleInfo::new("main"));
        let int = b.declare_imported(DeclSpec::new(DeclKind::Struct, "Int", "s:Int"));
        let sig = Signature {
            params: vec![param(None, "x", "Int", Some(int))],
            result: Some(TypeRef::new("Int", Some(int))),
        };
        let f = b.declare(DeclSpec::new(DeclKind::FreeFunction, "foo", "s:foo").with_signature(sig), Some(range(5, 8)));
        let tree = b.finish();

        let rendered = MarkupRenderer.render(&tree, f, None);
        assert_eq!(
            rendered.annotated,
            "<Declaration>func foo(_ x: <Type usr=\"s:Int\">Int</Type>) -&gt; <Type usr=\"s:Int\">Int</Type></Declaration>"
        );
        assert_eq!(
            rendered.fully_annotated,
            concat!(
                "<decl.function.free>func <decl.name>foo</decl.name>(",
                "<decl.var.parameter>_ <decl.var.parameter.name.local>x</decl.var.parameter.name.local>: ",
                "<decl.var.parameter.type><ref.struct usr=\"s:Int\">Int</ref.struct></decl.var.parameter.type>",
                "</decl.var.parameter>) -&gt; ",
                "<decl.function.returntype><ref.struct usr=\"s:Int\">Int</ref.struct></decl.function.returntype>",
                "</decl.function.free>"
            )
        );
    }

    #[test]
    fn test_variable_markup() {
        let mut b = TreeBuilder::new("/a.mini", ModuleInfo::new("main"));
        let x = b.declare(DeclSpec::new(DeclKind::GlobalVar, "x", "s:x").with_type("Array<Int>"), Some(range(4, 5)));
        let tree = b.finish();

        let rendered = MarkupRenderer.render(&tree, x, None);
        assert_eq!(rendered.annotated, "<Declaration>var x: Array&lt;Int&gt;</Declaration>");
        assert_eq!(
            rendered.fully_annotated,
            "<decl.var.global>var <decl.name>x</decl.name>: Array&lt;Int&gt;</decl.var.global>"
        );
    }

    #[test]
    fn test_labels_and_base_type_substitution() {
        let mut b = TreeBuilder::new("/a.mini", ModuleInfo::new("main"));
        let shape = b.declare(DeclSpec::new(DeclKind::Protocol, "Shape", "s:Shape"), Some(range(9, 14)));
        b.open_scope(ScopeKind::Type(shape), range(15, 60));
        let sig = Signature {
            params: vec![param(Some("with"), "other", "Self", Some(shape))],
            result: None,
        };
        let m = b.declare(DeclSpec::new(DeclKind::InstanceMethod, "merge", "s:Shape:merge").with_signature(sig), Some(range(20, 25)));
        b.close_scope();
        let square = b.declare(DeclSpec::new(DeclKind::Struct, "Square", "s:Square").conforming_to(shape), Some(range(70, 76)));
        let tree = b.finish();

        let plain = MarkupRenderer.render(&tree, m, None);
        assert_eq!(
            plain.annotated,
            "<Declaration>func merge(with other: <Type usr=\"s:Shape\">Self</Type>)</Declaration>"
        );

        let substituted = MarkupRenderer.render(&tree, m, Some(square));
        assert_eq!(
            substituted.annotated,
            "<Declaration>func merge(with other: <Type usr=\"s:Square\">Square</Type>)</Declaration>"
        );
        assert!(substituted.fully_annotated.contains(
            "<decl.var.parameter.name.external>with</decl.var.parameter.name.external> \
             <decl.var.parameter.name.local>other</decl.var.parameter.name.local>"
        ));

        let ty = MarkupRenderer.render(&tree, square, None);
        assert_eq!(
            ty.fully_annotated,
            "<decl.struct>struct <decl.name>Square</decl.name>: <ref.protocol usr=\"s:Shape\">Shape</ref.protocol></decl.struct>"
        );
    }

    #[test]
    fn test_implicit_declaration_prints_overridden() {
        let mut b = TreeBuilder::new("/a.mini", ModuleInfo::new("main"));
        let base = b.declare(DeclSpec::new(DeclKind::InstanceMethod, "draw", "s:Base:draw"), Some(range(0, 4)));
        let synthesized = b.declare_imported(
            DeclSpec::new(DeclKind::InstanceMethod, "draw", "s:Derived:draw").overriding(base).implicit(),
        );
        let tree = b.finish();

        let rendered = MarkupRenderer.render(&tree, synthesized, None);
        assert_eq!(rendered.annotated, "<Declaration>func draw()</Declaration>");
    }

    #[test]
    fn test_overload_signature() {
        let mut b = TreeBuilder::new("/a.mini", ModuleInfo::new("main"));
        let sig = Signature {
            params: vec![param(None, "item", "Int", None), param(Some("at"), "index", "Int", None)],
            result: None,
        };
        let f = b.declare(DeclSpec::new(DeclKind::FreeFunction, "insert", "s:insert").with_signature(sig), Some(range(5, 11)));
        let tree = b.finish();

        assert_eq!(overload_signature(&tree, f, None), "insert(_: Int, at: Int)");
    }

    #[test]
    fn test_type_interface() {
        let mut b = TreeBuilder::new("/a.mini", ModuleInfo::new("main"));
        let shape = b.declare(DeclSpec::new(DeclKind::Protocol, "Shape", "s:Shape"), Some(range(9, 14)));
        let point = b.declare(DeclSpec::new(DeclKind::Struct, "Point", "s:Point").conforming_to(shape), Some(range(27, 32)));
        b.open_scope(ScopeKind::Type(point), range(40, 120));
        b.declare(DeclSpec::new(DeclKind::InstanceVar, "x", "s:Point:x").with_type("Array<Int>"), Some(range(46, 47)));
        let sig = Signature {
            params: vec![param(Some("by"), "by", "Int", None)],
            result: Some(TypeRef::new("Point", Some(point))),
        };
        b.declare(DeclSpec::new(DeclKind::InstanceMethod, "moved", "s:Point:moved").with_signature(sig), Some(range(60, 65)));
        b.declare(DeclSpec::new(DeclKind::Constructor, "init", "s:Point:init").implicit(), None);
        b.close_scope();
        let tree = b.finish();

        assert_eq!(
            MarkupRenderer.render_type_interface(&tree, point).as_deref(),
            Some("struct Point: Shape {\n  var x: Array<Int>\n  func moved(by: Int) -> Point\n}")
        );
        assert_eq!(type_interface(&tree, shape).as_deref(), Some("protocol Shape {\n}"));
    }

    #[test]
    fn test_type_interface_of_non_type() {
        let mut b = TreeBuilder::new("/a.mini", ModuleInfo::new("main"));
        let x = b.declare(DeclSpec::new(DeclKind::GlobalVar, "x", "s:x").with_type("Int"), Some(range(4, 5)));
        let tree = b.finish();

        assert_eq!(MarkupRenderer.render_type_interface(&tree, x), None);
    }

    #[test]
    fn test_escaping() {
        let mut out = String::new();
        push_escaped(&mut out, "a<b && c>'d'\"");
        assert_eq!(out, "a&lt;b &amp;&amp; c&gt;&apos;d&apos;&quot;");
    }
}
