//! The analyzer collaborator: whatever turns text into an [`AnalysisTree`].

use smol_str::SmolStr;
use tokio_util::sync::CancellationToken;

use super::input::Invocation;
use super::tree::AnalysisTree;
use crate::base::TextSize;
use crate::error::BuildError;
use crate::syntax;
use crate::text::Snapshot;

/// Builds analyses and lexes tokens for one language.
///
/// `build_analysis` runs on the worker pool and may be slow; it should poll
/// `cancel` and return [`BuildError::Cancelled`] once it is set. The lexing
/// methods run synchronously while a query decides whether to reuse an older
/// analysis, so they must be cheap and must not block.
pub trait Analyzer: Send + Sync + 'static {
    fn build_analysis(
        &self,
        invocation: &Invocation,
        snapshot: &Snapshot,
        cancel: &CancellationToken,
    ) -> Result<AnalysisTree, BuildError>;

    /// Text of the smallest token containing `offset`.
    fn lex_token_at(&self, snapshot: &Snapshot, offset: TextSize) -> Option<SmolStr> {
        syntax::token_text_at(snapshot.text(), offset).map(SmolStr::from)
    }

    /// Start of the token containing `offset`, or `offset` itself outside
    /// any token.
    fn token_start(&self, snapshot: &Snapshot, offset: TextSize) -> TextSize {
        syntax::token_start(snapshot.text(), offset)
    }
}
