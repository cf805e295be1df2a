//! The consumer side of an analysis request.

use std::fmt;
use std::sync::Arc;

use crate::error::BuildError;
use crate::hir::AnalysisResult;
use crate::text::Snapshot;

/// One pending query waiting for an analysis.
///
/// Exactly one of the three terminal methods is called, exactly once.
pub trait AstConsumer: Send + 'static {
    /// Offered the anchor snapshots of an existing but out-of-date analysis
    /// before a build is scheduled. Returning `true` takes that analysis.
    ///
    /// Runs synchronously on the requesting thread: must not block.
    fn can_use_existing(&mut self, _snapshots: &[Snapshot]) -> bool {
        false
    }

    fn handle_primary_ast(self: Box<Self>, analysis: Arc<AnalysisResult>);

    fn cancelled(self: Box<Self>);

    fn failed(self: Box<Self>, error: BuildError);
}

/// Query results with an empty and a cancelled form.
pub trait QueryOutcome: Send + 'static {
    fn empty_outcome() -> Self;

    fn cancelled_outcome() -> Self;
}

type Receiver<T> = Box<dyn FnOnce(T) + Send + 'static>;

/// A one-shot channel back to the caller of a query.
///
/// Every query owns exactly one responder. Responding consumes it; dropping
/// it without a response delivers the cancelled outcome instead, so the
/// caller always hears back exactly once.
pub struct Responder<T: QueryOutcome> {
    receiver: Option<Receiver<T>>,
}

impl<T: QueryOutcome> Responder<T> {
    pub fn new(receiver: impl FnOnce(T) + Send + 'static) -> Self {
        Self { receiver: Some(Box::new(receiver)) }
    }

    pub fn respond(mut self, outcome: T) {
        if let Some(receiver) = self.receiver.take() {
            receiver(outcome);
        }
    }
}

impl<T: QueryOutcome> Drop for Responder<T> {
    fn drop(&mut self) {
        if let Some(receiver) = self.receiver.take() {
            receiver(T::cancelled_outcome());
        }
    }
}

impl<T: QueryOutcome> fmt::Debug for Responder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Responder")
            .field("pending", &self.receiver.is_some())
            .finish()
    }
}
