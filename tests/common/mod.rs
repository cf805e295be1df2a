//! A toy analyzer for integration tests.
//!
//! The language has four forms, separated by whitespace:
//!
//! ```text
//! import Swift
//! let x = 1
//! func f(a: Int) { print(a) }
//! print(x)
//! ```
//!
//! Every other identifier is a reference to the innermost visible
//! declaration of that name. `print` is imported from the system module
//! `Swift`. Names starting with `old_` are declared unavailable, and so is
//! the `let` or `func` following an `@unavailable` attribute.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::time::Duration;

use cursorkit::hir::{
    AnalysisTree, Analyzer, DeclId, DeclKind, DeclSpec, Invocation, ModuleInfo, Param, RefNode,
    ScopeKind, Signature, TreeBuilder, TypeRef,
};
use cursorkit::ide::{DeclRenderer, RenderedDecl};
use cursorkit::syntax::{Lexer, Token};
use cursorkit::text::Snapshot;
use cursorkit::{AnalysisHost, BuildError, HostConfig, MarkupRenderer, TextRange, TextSize};
use parking_lot::{Condvar, Mutex};
use tokio_util::sync::CancellationToken;

pub const FILE: &str = "/main.mini";
pub const ARGS: [&str; 2] = ["-module-name", "main"];
pub const TIMEOUT: Duration = Duration::from_secs(10);

/// Holds builds until opened.
#[derive(Default)]
pub struct Gate {
    open: Mutex<bool>,
    cv: Condvar,
}

impl Gate {
    pub fn open(&self) {
        *self.open.lock() = true;
        self.cv.notify_all();
    }

    pub fn close(&self) {
        *self.open.lock() = false;
    }

    fn wait(&self) {
        let mut open = self.open.lock();
        while !*open {
            self.cv.wait(&mut open);
        }
    }
}

#[derive(Clone, Default)]
pub struct MiniAnalyzer {
    builds: Arc<AtomicUsize>,
    gate: Option<Arc<Gate>>,
    panics: bool,
}

impl MiniAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// An analyzer whose builds block until `gate` is opened.
    pub fn gated(gate: Arc<Gate>) -> Self {
        Self { gate: Some(gate), ..Self::default() }
    }

    /// An analyzer that panics in every build.
    pub fn panicking() -> Self {
        Self { panics: true, ..Self::default() }
    }

    /// Number of builds started so far.
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

impl Analyzer for MiniAnalyzer {
    fn build_analysis(
        &self,
        invocation: &Invocation,
        snapshot: &Snapshot,
        cancel: &CancellationToken,
    ) -> Result<AnalysisTree, BuildError> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.wait();
        }
        if cancel.is_cancelled() {
            return Err(BuildError::Cancelled);
        }
        if self.panics {
            panic!("mini analyzer crashed on {}", invocation.primary_file());
        }
        Ok(build_tree(invocation.primary_file(), snapshot.text()))
    }
}

const KEYWORDS: [&str; 3] = ["import", "let", "func"];

fn range(token: &Token) -> TextRange {
    token.range
}

pub fn build_tree(file: &str, text: &str) -> AnalysisTree {
    let tokens: Vec<Token> = Lexer::new(text).filter(|t| !t.kind.is_comment()).collect();
    let slice = |i: usize| tokens.get(i).map_or("", |t| &text[t.range]);

    let mut b = TreeBuilder::new(file, ModuleInfo::new("main"));
    b.set_file_range(TextRange::up_to(TextSize::of(text)));
    let swift = b.add_module(ModuleInfo::new("Swift").system());
    let print = b.declare_imported(
        DeclSpec::new(DeclKind::FreeFunction, "print", "s:s5printyyF")
            .with_module(swift)
            .with_type("(Any) -> ()")
            .with_signature(Signature {
                params: vec![Param {
                    label: None,
                    name: "items".into(),
                    ty: TypeRef::new("Any", None),
                }],
                result: None,
            }),
    );

    let mut scopes: Vec<HashMap<String, DeclId>> = vec![HashMap::from([("print".to_string(), print)])];
    let mut closers: Vec<usize> = Vec::new();
    let mut unavailable = false;
    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i];
        match slice(i) {
            "@" if slice(i + 1) == "unavailable" => {
                unavailable = true;
                i += 2;
                continue;
            }
            "import" if tokens.get(i + 1).is_some_and(|t| t.kind.is_identifier()) => {
                let name = slice(i + 1);
                let module = if name == "Swift" { swift } else { b.add_module(ModuleInfo::new(name)) };
                b.module_ref(module, range(&tokens[i + 1]));
                i += 2;
                continue;
            }
            "let" if tokens.get(i + 1).is_some_and(|t| t.kind.is_identifier()) => {
                let name = slice(i + 1);
                let kind = if closers.is_empty() { DeclKind::GlobalVar } else { DeclKind::LocalVar };
                let decl = attributed(spec(kind, name, &tokens[i + 1]), std::mem::take(&mut unavailable));
                let id = b.declare(decl.with_type("Int"), Some(range(&tokens[i + 1])));
                if let Some(scope) = scopes.last_mut() {
                    scope.insert(name.to_string(), id);
                }
                i += 2;
                continue;
            }
            "func" if tokens.get(i + 1).is_some_and(|t| t.kind.is_identifier()) && slice(i + 2) == "(" => {
                let unavailable = std::mem::take(&mut unavailable);
                i = declare_function(&mut b, &tokens, text, i, unavailable, &mut scopes, &mut closers);
                continue;
            }
            "}" if closers.last() == Some(&i) => {
                closers.pop();
                scopes.pop();
                b.close_scope();
            }
            name if token.kind.is_identifier() && !KEYWORDS.contains(&name) => {
                if let Some(&target) = scopes.iter().rev().find_map(|s| s.get(name)) {
                    b.reference(RefNode::to(target), range(&token));
                }
            }
            _ => {}
        }
        i += 1;
    }
    b.finish()
}

fn spec(kind: DeclKind, name: &str, token: &Token) -> DeclSpec {
    let usr = format!("s:4main{name}@{}", u32::from(token.range.start()));
    let spec = DeclSpec::new(kind, name, usr);
    if name.starts_with("old_") { spec.unavailable() } else { spec }
}

fn attributed(spec: DeclSpec, unavailable: bool) -> DeclSpec {
    if unavailable { spec.unavailable() } else { spec }
}

/// Declare `func name(p: T, ...) { ... }` starting at token `i` and open its
/// body scope. Returns the index of the first token of the body.
fn declare_function(
    b: &mut TreeBuilder,
    tokens: &[Token],
    text: &str,
    i: usize,
    unavailable: bool,
    scopes: &mut Vec<HashMap<String, DeclId>>,
    closers: &mut Vec<usize>,
) -> usize {
    let slice = |j: usize| tokens.get(j).map_or("", |t| &text[t.range]);
    let name_token = tokens[i + 1];
    let name = slice(i + 1);
    let open_paren = i + 2;

    let mut params = Vec::new();
    let mut j = open_paren + 1;
    while j < tokens.len() && slice(j) != ")" {
        if tokens[j].kind.is_identifier() && slice(j + 1) == ":" {
            params.push((j, slice(j).to_string(), slice(j + 2).to_string()));
            j += 3;
        } else {
            j += 1;
        }
    }
    let close_paren = j;
    let open_brace = (close_paren..tokens.len()).find(|&k| slice(k) == "{").unwrap_or(tokens.len());
    let mut depth = 0usize;
    let mut close_brace = tokens.len().saturating_sub(1);
    for k in open_brace..tokens.len() {
        match slice(k) {
            "{" => depth += 1,
            "}" => {
                depth -= 1;
                if depth == 0 {
                    close_brace = k;
                    break;
                }
            }
            _ => {}
        }
    }

    let signature = Signature {
        params: params
            .iter()
            .map(|(_, p, ty)| Param {
                label: Some(p.as_str().into()),
                name: p.as_str().into(),
                ty: TypeRef::new(ty.as_str(), None),
            })
            .collect(),
        result: None,
    };
    let func = b.declare(
        attributed(spec(DeclKind::FreeFunction, name, &name_token), unavailable).with_signature(signature),
        Some(name_token.range),
    );
    if let Some(scope) = scopes.last_mut() {
        scope.insert(name.to_string(), func);
    }

    let scope_end = tokens.get(close_brace).map_or(name_token.range.end(), |t| t.range.end());
    b.open_scope(
        ScopeKind::Local,
        TextRange::new(tokens[open_paren].range.start(), scope_end),
    );
    let mut locals = HashMap::new();
    for (k, p, ty) in &params {
        let id = b.declare(spec(DeclKind::Param, p, &tokens[*k]).with_type(ty.as_str()), Some(tokens[*k].range));
        locals.insert(p.clone(), id);
    }
    scopes.push(locals);
    closers.push(close_brace);
    open_brace + 1
}

/// A host over the mini language with `text` open at [`FILE`].
pub fn host_with(analyzer: MiniAnalyzer, text: &str) -> AnalysisHost {
    host_with_config(test_config(), analyzer, text)
}

pub fn test_config() -> HostConfig {
    HostConfig::default().with_worker_threads(4).with_thread_name("mini")
}

pub fn host_with_config(config: HostConfig, analyzer: MiniAnalyzer, text: &str) -> AnalysisHost {
    let host = AnalysisHost::new(config, analyzer, MarkupRenderer).unwrap();
    host.documents().open(FILE, text);
    host
}

pub fn host_with_renderer(analyzer: MiniAnalyzer, renderer: impl DeclRenderer, text: &str) -> AnalysisHost {
    let host = AnalysisHost::new(test_config(), analyzer, renderer).unwrap();
    host.documents().open(FILE, text);
    host
}

/// [`MarkupRenderer`] that waits for a gate before rendering.
pub struct GatedRenderer(pub Arc<Gate>);

impl DeclRenderer for GatedRenderer {
    fn render(&self, tree: &AnalysisTree, decl: DeclId, base_type: Option<DeclId>) -> RenderedDecl {
        self.0.wait();
        MarkupRenderer.render(tree, decl, base_type)
    }
}

pub struct PanickingRenderer;

impl DeclRenderer for PanickingRenderer {
    fn render(&self, _tree: &AnalysisTree, _decl: DeclId, _base_type: Option<DeclId>) -> RenderedDecl {
        panic!("renderer crashed")
    }
}

/// Run a cursor query and wait for its single answer.
pub fn cursor_info(host: &AnalysisHost, offset: u32) -> cursorkit::CursorInfo {
    let (tx, rx) = mpsc::channel();
    host.cursor_info(FILE, offset, ARGS, move |info| tx.send(info).unwrap());
    let info = rx.recv_timeout(TIMEOUT).unwrap();
    assert!(rx.recv_timeout(Duration::from_millis(50)).is_err(), "answered twice");
    info
}

pub fn related_identifiers(host: &AnalysisHost, offset: u32) -> cursorkit::RelatedIdentsInfo {
    let (tx, rx) = mpsc::channel();
    host.related_identifiers(FILE, offset, ARGS, move |info| tx.send(info).unwrap());
    rx.recv_timeout(TIMEOUT).unwrap()
}
