//! The public query API.
//!
//! [`AnalysisHost`] owns the editing session, the analysis manager and the
//! collaborators. Queries are asynchronous: each takes a receiver that is
//! called exactly once, on a worker thread, with a well-formed record. A
//! query that finds nothing or fails gets an empty record; an abandoned one
//! gets a cancelled record.

use std::cmp::Ordering;
use std::sync::Arc;

use smol_str::SmolStr;
use tokio_util::sync::CancellationToken;
use tracing::{debug, debug_span, info, warn};

use super::cursor_info::{CursorContext, CursorInfo, assemble_cursor_info};
use super::related::{RelatedIdentsInfo, scan_related_identifiers};
use super::render::DeclRenderer;
use super::reuse::validate_reuse;
use crate::base::TextSize;
use crate::config::{HostConfig, MAX_RETRIES_WITHOUT_CACHE};
use crate::error::{BuildError, CursorError, HostError};
use crate::hir::{AnalysisResult, Analyzer, Invocation, Resolver};
use crate::manager::{AstConsumer, AstManager, QueryOutcome, Responder};
use crate::text::{EditorDocuments, Snapshot, translate_backward, translate_forward};

impl QueryOutcome for CursorInfo {
    fn empty_outcome() -> Self {
        CursorInfo::empty()
    }

    fn cancelled_outcome() -> Self {
        CursorInfo::cancelled()
    }
}

impl QueryOutcome for RelatedIdentsInfo {
    fn empty_outcome() -> Self {
        RelatedIdentsInfo::empty()
    }

    fn cancelled_outcome() -> Self {
        RelatedIdentsInfo::cancelled()
    }
}

/// Entry point for cursor queries over a set of open documents.
///
/// Cloning yields another handle to the same host.
#[derive(Clone)]
pub struct AnalysisHost {
    ctx: Arc<QueryContext>,
}

struct QueryContext {
    config: HostConfig,
    manager: AstManager,
    renderer: Arc<dyn DeclRenderer>,
}

impl AnalysisHost {
    pub fn new(
        config: HostConfig,
        analyzer: impl Analyzer,
        renderer: impl DeclRenderer,
    ) -> Result<Self, HostError> {
        let documents = Arc::new(EditorDocuments::new());
        let manager = AstManager::new(&config, Arc::new(analyzer), documents)?;
        Ok(Self {
            ctx: Arc::new(QueryContext { config, manager, renderer: Arc::new(renderer) }),
        })
    }

    /// The editing session. Edits made here are what queries see.
    pub fn documents(&self) -> &EditorDocuments {
        self.ctx.manager.documents()
    }

    /// Close `path` and drop the analyses built for it.
    pub fn close_document(&self, path: &str) -> bool {
        self.ctx.manager.close_document(path)
    }

    pub fn config(&self) -> &HostConfig {
        &self.ctx.config
    }

    pub fn manager(&self) -> &AstManager {
        &self.ctx.manager
    }

    /// A token for one request, cancelled by [`shutdown`](Self::shutdown)
    /// as well as by the caller.
    pub fn request_token(&self) -> CancellationToken {
        self.ctx.manager.cancel_token().child_token()
    }

    /// Resolve the entity at `offset` in the latest snapshot of `file`.
    pub fn cursor_info<I, S>(
        &self,
        file: &str,
        offset: u32,
        args: I,
        receiver: impl FnOnce(CursorInfo) + Send + 'static,
    ) where
        I: IntoIterator<Item = S>,
        S: Into<SmolStr>,
    {
        self.cursor_info_with_cancel(file, offset, args, self.request_token(), receiver);
    }

    /// [`cursor_info`](Self::cursor_info) with a caller-owned cancellation
    /// token, ideally obtained from [`request_token`](Self::request_token).
    pub fn cursor_info_with_cancel<I, S>(
        &self,
        file: &str,
        offset: u32,
        args: I,
        cancel: CancellationToken,
        receiver: impl FnOnce(CursorInfo) + Send + 'static,
    ) where
        I: IntoIterator<Item = S>,
        S: Into<SmolStr>,
    {
        let request = CursorRequest {
            invocation: Invocation::new(file, args),
            snapshot: self.documents().latest_snapshot(file),
            offset: TextSize::from(offset),
            try_existing: self.ctx.config.try_existing_analysis,
            retries_left: MAX_RETRIES_WITHOUT_CACHE,
            cancel,
        };
        self.ctx.resolve_cursor(request, Responder::new(receiver));
    }

    /// Find every occurrence of the entity at `offset` in `file`.
    pub fn related_identifiers<I, S>(
        &self,
        file: &str,
        offset: u32,
        args: I,
        receiver: impl FnOnce(RelatedIdentsInfo) + Send + 'static,
    ) where
        I: IntoIterator<Item = S>,
        S: Into<SmolStr>,
    {
        self.related_identifiers_with_cancel(file, offset, args, self.request_token(), receiver);
    }

    pub fn related_identifiers_with_cancel<I, S>(
        &self,
        file: &str,
        offset: u32,
        args: I,
        cancel: CancellationToken,
        receiver: impl FnOnce(RelatedIdentsInfo) + Send + 'static,
    ) where
        I: IntoIterator<Item = S>,
        S: Into<SmolStr>,
    {
        let consumer = RelatedIdConsumer {
            ctx: self.ctx.clone(),
            snapshot: self.documents().latest_snapshot(file),
            offset: TextSize::from(offset),
            cancel,
            responder: Responder::new(receiver),
        };
        self.ctx.manager.process_ast(Invocation::new(file, args), Box::new(consumer));
    }

    /// Cancel all pending queries; later queries are answered as cancelled.
    pub fn shutdown(&self) {
        self.ctx.manager.shutdown();
    }
}

impl std::fmt::Debug for AnalysisHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisHost")
            .field("config", &self.ctx.config)
            .field("manager", &self.ctx.manager)
            .finish()
    }
}

impl QueryContext {
    fn analyzer(&self) -> &dyn Analyzer {
        self.manager.analyzer()
    }

    fn is_shut_down(&self) -> bool {
        self.manager.cancel_token().is_cancelled()
    }

    fn resolve_cursor(self: &Arc<Self>, request: CursorRequest, responder: Responder<CursorInfo>) {
        let invocation = request.invocation.clone();
        let consumer = CursorInfoConsumer {
            ctx: self.clone(),
            offset: request.offset,
            reused: Vec::new(),
            request,
            responder,
        };
        self.manager.process_ast(invocation, Box::new(consumer));
    }

    /// Resolve and assemble against one analysis; `offset` is in the
    /// analysis's own snapshot. Unavailable declarations are reported as
    /// such so a stale analysis can be retried.
    fn cursor_info_in(&self, analysis: &AnalysisResult, offset: TextSize) -> Result<CursorInfo, CursorError> {
        let offset = self.snap_offset(analysis, offset)?;
        let entity = Resolver::new(&analysis.tree)
            .entity_at(offset)
            .ok_or(CursorError::NoResolution)?;
        let ctx = CursorContext {
            analysis,
            renderer: &*self.renderer,
            documents: self.manager.documents(),
        };
        assemble_cursor_info(ctx, &entity)
    }

    fn related_in(
        &self,
        analysis: &AnalysisResult,
        offset: TextSize,
        cancel: &CancellationToken,
    ) -> Result<RelatedIdentsInfo, CursorError> {
        let offset = self.snap_offset(analysis, offset)?;
        let entity = Resolver::new(&analysis.tree)
            .resolve(offset)
            .ok_or(CursorError::NoResolution)?;
        let info = scan_related_identifiers(&analysis.tree, &entity, cancel);
        if info.is_cancelled {
            return Err(CursorError::Cancelled);
        }
        Ok(info)
    }

    /// Start of the token at `offset` in the analysis's snapshot.
    fn snap_offset(&self, analysis: &AnalysisResult, offset: TextSize) -> Result<TextSize, CursorError> {
        let len = analysis.snapshot.len();
        if offset > len {
            return Err(CursorError::OutOfRange { offset: offset.into(), len: len.into() });
        }
        Ok(self.analyzer().token_start(&analysis.snapshot, offset))
    }
}

/// Carry `offset` from the snapshot a query was made against to the one an
/// analysis was built on.
fn carry_offset(offset: TextSize, requested: &Snapshot, built_on: &Snapshot) -> Option<TextSize> {
    if !requested.is_from_same_buffer(built_on) {
        return None;
    }
    match requested.stamp().cmp(&built_on.stamp()) {
        Ordering::Equal => Some(offset),
        Ordering::Less => translate_forward(offset, requested, built_on),
        Ordering::Greater => translate_backward(offset, requested, built_on),
    }
}

/// Answer a query. Failures become the empty outcome and abandoned queries
/// the cancelled one.
fn deliver<T: QueryOutcome>(query: &'static str, responder: Responder<T>, outcome: Result<T, CursorError>) {
    let answer = match outcome {
        Ok(answer) => answer,
        Err(err) if err.is_cancellation() => {
            debug!(query, %err, "query abandoned");
            T::cancelled_outcome()
        }
        Err(err @ (CursorError::NoResolution | CursorError::Unavailable | CursorError::OutOfRange { .. })) => {
            debug!(query, %err, "nothing to report");
            T::empty_outcome()
        }
        Err(err) => {
            warn!(query, %err, "query failed");
            T::empty_outcome()
        }
    };
    responder.respond(answer);
}

struct CursorRequest {
    invocation: Invocation,
    /// Latest snapshot of the primary file when the query was made.
    snapshot: Option<Snapshot>,
    /// Offset in `snapshot`.
    offset: TextSize,
    try_existing: bool,
    retries_left: u32,
    cancel: CancellationToken,
}

impl CursorRequest {
    fn offset_in(&self, analysis: &AnalysisResult) -> Option<TextSize> {
        let requested = self.snapshot.as_ref()?;
        let offset = carry_offset(self.offset, requested, &analysis.snapshot);
        if offset.is_none() {
            debug!(offset = u32::from(self.offset), "queried position did not survive later edits");
        }
        offset
    }
}

struct CursorInfoConsumer {
    ctx: Arc<QueryContext>,
    request: CursorRequest,
    /// Where the query lands in a reused analysis.
    offset: TextSize,
    /// Anchor snapshots of a reused, out-of-date analysis.
    reused: Vec<Snapshot>,
    responder: Responder<CursorInfo>,
}

impl AstConsumer for CursorInfoConsumer {
    fn can_use_existing(&mut self, snapshots: &[Snapshot]) -> bool {
        let Some(current) = &self.request.snapshot else {
            return false;
        };
        let decision = validate_reuse(
            self.request.offset,
            current,
            snapshots,
            self.request.try_existing,
            self.ctx.analyzer(),
        );
        match decision {
            Some(decision) => {
                self.offset = decision.offset;
                self.reused = snapshots.to_vec();
                true
            }
            None => false,
        }
    }

    fn handle_primary_ast(self: Box<Self>, analysis: Arc<AnalysisResult>) {
        let this = *self;
        if this.request.cancel.is_cancelled() || this.ctx.is_shut_down() {
            deliver("cursor_info", this.responder, Err(CursorError::Cancelled));
            return;
        }

        let _span = debug_span!(
            "cursor_info",
            file = this.request.invocation.primary_file(),
            offset = u32::from(this.request.offset)
        )
        .entered();

        let offset = if this.reused.is_empty() {
            this.request.offset_in(&analysis)
        } else {
            Some(this.offset)
        };
        let outcome = match offset {
            Some(offset) => this.ctx.cursor_info_in(&analysis, offset),
            None => Err(CursorError::NoResolution),
        };

        match outcome {
            Err(err) if err.is_retryable() && !this.reused.is_empty() && this.request.retries_left > 0 => {
                info!(%err, "failed against existing analysis, retrying with up-to-date analysis");
                let request = CursorRequest {
                    try_existing: false,
                    retries_left: this.request.retries_left - 1,
                    ..this.request
                };
                this.ctx.resolve_cursor(request, this.responder);
            }
            outcome => deliver("cursor_info", this.responder, outcome),
        }
    }

    fn cancelled(self: Box<Self>) {
        deliver("cursor_info", self.responder, Err(CursorError::Cancelled));
    }

    fn failed(self: Box<Self>, error: BuildError) {
        deliver("cursor_info", self.responder, Err(CursorError::BuildFailed(error)));
    }
}

struct RelatedIdConsumer {
    ctx: Arc<QueryContext>,
    /// Latest snapshot of the file when the query was made.
    snapshot: Option<Snapshot>,
    offset: TextSize,
    cancel: CancellationToken,
    responder: Responder<RelatedIdentsInfo>,
}

impl AstConsumer for RelatedIdConsumer {
    fn handle_primary_ast(self: Box<Self>, analysis: Arc<AnalysisResult>) {
        if self.cancel.is_cancelled() || self.ctx.is_shut_down() {
            deliver("related_idents", self.responder, Err(CursorError::Cancelled));
            return;
        }

        let _span = debug_span!(
            "related_idents",
            file = analysis.invocation.primary_file(),
            offset = u32::from(self.offset)
        )
        .entered();

        let offset = self
            .snapshot
            .as_ref()
            .and_then(|requested| carry_offset(self.offset, requested, &analysis.snapshot));
        let outcome = match offset {
            Some(offset) => self.ctx.related_in(&analysis, offset, &self.cancel),
            None => Err(CursorError::NoResolution),
        };
        deliver("related_idents", self.responder, outcome);
    }

    fn cancelled(self: Box<Self>) {
        deliver("related_idents", self.responder, Err(CursorError::Cancelled));
    }

    fn failed(self: Box<Self>, error: BuildError) {
        deliver("related_idents", self.responder, Err(CursorError::BuildFailed(error)));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use rstest::rstest;

    use super::*;
    use crate::text::Buffer;

    fn at(offset: u32) -> TextSize {
        TextSize::from(offset)
    }

    fn answer(outcome: Result<CursorInfo, CursorError>) -> CursorInfo {
        let (tx, rx) = mpsc::channel();
        deliver("cursor_info", Responder::new(move |info: CursorInfo| tx.send(info).unwrap()), outcome);
        rx.try_recv().unwrap()
    }

    #[rstest]
    #[case(CursorError::Cancelled)]
    #[case(CursorError::BuildFailed(BuildError::Cancelled))]
    fn test_abandoned_queries_answer_cancelled(#[case] err: CursorError) {
        assert!(answer(Err(err)).is_cancelled());
    }

    #[rstest]
    #[case(CursorError::NoResolution)]
    #[case(CursorError::Unavailable)]
    #[case(CursorError::OutOfRange { offset: 40, len: 9 })]
    #[case(CursorError::StaleRemapFailed)]
    #[case(CursorError::BuildFailed(BuildError::Analyzer("boom".into())))]
    #[case(CursorError::BuildFailed(BuildError::MissingDocument(Arc::from("/a.mini"))))]
    fn test_failed_queries_answer_empty(#[case] err: CursorError) {
        assert!(answer(Err(err)).is_empty());
    }

    #[test]
    fn test_carry_offset_between_snapshots() {
        let (_buffer, s0) = Buffer::new("/a.mini", "let x = 1\nprint(x)");
        let s1 = s0.replace(0, 0, "// ").unwrap();
        let (_other, o0) = Buffer::new("/a.mini", "let x = 1\nprint(x)");

        assert_eq!(carry_offset(at(16), &s0, &s0), Some(at(16)));
        assert_eq!(carry_offset(at(16), &s0, &s1), Some(at(19)));
        assert_eq!(carry_offset(at(19), &s1, &s0), Some(at(16)));
        assert_eq!(carry_offset(at(1), &s1, &s0), None);
        assert_eq!(carry_offset(at(16), &s0, &o0), None);
    }
}
