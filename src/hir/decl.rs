//! Declarations, their kinds and the types they mention.

use std::sync::Arc;

use smol_str::SmolStr;

use super::ids::{DeclId, ModuleId, NodeId};
use crate::base::{Name, TextRange};

/// Syntactic kind of a declaration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeclKind {
    FreeFunction,
    InstanceMethod,
    StaticMethod,
    Constructor,
    Destructor,
    Subscript,
    GlobalVar,
    InstanceVar,
    StaticVar,
    LocalVar,
    Param,
    Struct,
    Class,
    Enum,
    EnumElement,
    Protocol,
    TypeAlias,
    GenericTypeParam,
}

const UID_PREFIX: &str = "source.lang.";

impl DeclKind {
    /// Tag naming this kind in markup, e.g. `decl.function.free` or
    /// `ref.struct`.
    pub fn tag(self, is_ref: bool) -> &'static str {
        macro_rules! pick {
            ($suffix:literal) => {
                if is_ref {
                    concat!("ref.", $suffix)
                } else {
                    concat!("decl.", $suffix)
                }
            };
        }
        match self {
            DeclKind::FreeFunction => pick!("function.free"),
            DeclKind::InstanceMethod => pick!("function.method.instance"),
            DeclKind::StaticMethod => pick!("function.method.static"),
            DeclKind::Constructor => pick!("function.constructor"),
            DeclKind::Destructor => pick!("function.destructor"),
            DeclKind::Subscript => pick!("function.subscript"),
            DeclKind::GlobalVar => pick!("var.global"),
            DeclKind::InstanceVar => pick!("var.instance"),
            DeclKind::StaticVar => pick!("var.static"),
            DeclKind::LocalVar => pick!("var.local"),
            DeclKind::Param => pick!("var.parameter"),
            DeclKind::Struct => pick!("struct"),
            DeclKind::Class => pick!("class"),
            DeclKind::Enum => pick!("enum"),
            DeclKind::EnumElement => pick!("enumelement"),
            DeclKind::Protocol => pick!("protocol"),
            DeclKind::TypeAlias => pick!("typealias"),
            DeclKind::GenericTypeParam => pick!("generic_type_param"),
        }
    }

    /// Fully qualified kind identifier reported in cursor info.
    pub fn uid(self, is_ref: bool) -> String {
        format!("{UID_PREFIX}{}", self.tag(is_ref))
    }

    pub fn is_function(self) -> bool {
        matches!(
            self,
            DeclKind::FreeFunction
                | DeclKind::InstanceMethod
                | DeclKind::StaticMethod
                | DeclKind::Constructor
                | DeclKind::Destructor
                | DeclKind::Subscript
        )
    }

    pub fn is_nominal_type(self) -> bool {
        matches!(
            self,
            DeclKind::Struct | DeclKind::Class | DeclKind::Enum | DeclKind::Protocol
        )
    }

    /// Declarations whose name is not an identifier at the use site.
    pub fn is_special_member(self) -> bool {
        matches!(
            self,
            DeclKind::Constructor | DeclKind::Destructor | DeclKind::Subscript
        )
    }

    /// The introducer keyword printed before the name in a signature.
    pub fn keyword(self) -> Option<&'static str> {
        match self {
            DeclKind::FreeFunction | DeclKind::InstanceMethod => Some("func"),
            DeclKind::StaticMethod => Some("static func"),
            DeclKind::Constructor => Some("init"),
            DeclKind::Destructor => Some("deinit"),
            DeclKind::Subscript => Some("subscript"),
            DeclKind::GlobalVar | DeclKind::InstanceVar | DeclKind::LocalVar => Some("var"),
            DeclKind::StaticVar => Some("static var"),
            DeclKind::Struct => Some("struct"),
            DeclKind::Class => Some("class"),
            DeclKind::Enum => Some("enum"),
            DeclKind::EnumElement => Some("case"),
            DeclKind::Protocol => Some("protocol"),
            DeclKind::TypeAlias => Some("typealias"),
            DeclKind::Param | DeclKind::GenericTypeParam => None,
        }
    }
}

/// A named type as written in a signature.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeRef {
    pub text: SmolStr,
    /// The declaration the name binds to, when known.
    pub decl: Option<DeclId>,
}

impl TypeRef {
    pub fn new(text: impl Into<SmolStr>, decl: Option<DeclId>) -> Self {
        Self { text: text.into(), decl }
    }
}

/// The static type of an expression at a reference site.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ty {
    pub text: SmolStr,
    /// Nominal declarations appearing in the type, outermost first.
    pub nominals: Vec<DeclId>,
}

impl Ty {
    pub fn new(text: impl Into<SmolStr>, nominals: Vec<DeclId>) -> Self {
        Self { text: text.into(), nominals }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Param {
    /// Argument label used at call sites; `None` prints as `_`.
    pub label: Option<SmolStr>,
    pub name: SmolStr,
    pub ty: TypeRef,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Signature {
    pub params: Vec<Param>,
    pub result: Option<TypeRef>,
}

/// Where a declaration's name is written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeclLocation {
    pub file: Arc<str>,
    pub range: TextRange,
}

/// Everything an analyzer knows about one declaration.
#[derive(Clone, Debug)]
pub struct Decl {
    pub kind: DeclKind,
    pub name: Name,
    /// Full name including argument labels, e.g. `insert(_:at:)`.
    pub display_name: SmolStr,
    /// Stable identifier.
    pub usr: SmolStr,
    pub type_text: Option<SmolStr>,
    pub doc: Option<SmolStr>,
    pub group: Option<SmolStr>,
    pub module: ModuleId,
    pub location: Option<DeclLocation>,
    pub signature: Option<Signature>,
    /// Scope node the declaration is visible in.
    pub scope: NodeId,
    /// Innermost local scope (function body, closure) enclosing the
    /// declaration; `None` for top-level and member declarations.
    pub local_scope: Option<NodeId>,
    /// Nominal type the declaration is a direct member of.
    pub nominal_context: Option<DeclId>,
    pub overridden: Option<DeclId>,
    /// Protocol requirements this declaration satisfies.
    pub satisfies: Vec<DeclId>,
    /// For type declarations: protocols and superclasses it conforms to.
    pub conformances: Vec<DeclId>,
    pub is_implicit: bool,
    pub is_unavailable: bool,
    pub is_operator: bool,
}

/// Analyzer-facing description of a declaration, completed into a [`Decl`]
/// by [`TreeBuilder`](super::TreeBuilder).
#[derive(Clone, Debug)]
pub struct DeclSpec {
    pub kind: DeclKind,
    pub base_name: SmolStr,
    pub display_name: Option<SmolStr>,
    pub usr: SmolStr,
    pub type_text: Option<SmolStr>,
    pub doc: Option<SmolStr>,
    pub group: Option<SmolStr>,
    pub module: Option<ModuleId>,
    pub location: Option<DeclLocation>,
    pub signature: Option<Signature>,
    pub overridden: Option<DeclId>,
    pub satisfies: Vec<DeclId>,
    pub conformances: Vec<DeclId>,
    pub is_implicit: bool,
    pub is_unavailable: bool,
}

impl DeclSpec {
    pub fn new(kind: DeclKind, base_name: impl Into<SmolStr>, usr: impl Into<SmolStr>) -> Self {
        Self {
            kind,
            base_name: base_name.into(),
            display_name: None,
            usr: usr.into(),
            type_text: None,
            doc: None,
            group: None,
            module: None,
            location: None,
            signature: None,
            overridden: None,
            satisfies: Vec::new(),
            conformances: Vec::new(),
            is_implicit: false,
            is_unavailable: false,
        }
    }

    pub fn with_type(mut self, text: impl Into<SmolStr>) -> Self {
        self.type_text = Some(text.into());
        self
    }

    pub fn with_doc(mut self, doc: impl Into<SmolStr>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn with_group(mut self, group: impl Into<SmolStr>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn with_module(mut self, module: ModuleId) -> Self {
        self.module = Some(module);
        self
    }

    pub fn with_location(mut self, file: impl Into<Arc<str>>, range: TextRange) -> Self {
        self.location = Some(DeclLocation { file: file.into(), range });
        self
    }

    pub fn with_signature(mut self, signature: Signature) -> Self {
        self.signature = Some(signature);
        self
    }

    pub fn with_display_name(mut self, name: impl Into<SmolStr>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn overriding(mut self, decl: DeclId) -> Self {
        self.overridden = Some(decl);
        self
    }

    pub fn satisfying(mut self, requirement: DeclId) -> Self {
        self.satisfies.push(requirement);
        self
    }

    pub fn conforming_to(mut self, protocol: DeclId) -> Self {
        self.conformances.push(protocol);
        self
    }

    pub fn implicit(mut self) -> Self {
        self.is_implicit = true;
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.is_unavailable = true;
        self
    }

    /// Display name derived from the base name and the signature's labels,
    /// unless one was set explicitly.
    pub(crate) fn resolved_display_name(&self) -> SmolStr {
        if let Some(name) = &self.display_name {
            return name.clone();
        }
        match &self.signature {
            Some(sig) if self.kind.is_function() => {
                let mut name = String::from(self.base_name.as_str());
                name.push('(');
                for param in &sig.params {
                    name.push_str(param.label.as_deref().unwrap_or("_"));
                    name.push(':');
                }
                name.push(')');
                SmolStr::from(name)
            }
            _ => self.base_name.clone(),
        }
    }
}

/// Whether a base name is a symbolic operator such as `+` or `==`.
pub fn is_operator_name(name: &str) -> bool {
    name.chars()
        .next()
        .is_some_and(|c| !(c.is_alphanumeric() || c == '_' || c == '`'))
}
