//! Lightweight lexing for token-identity checks and offset snapping.
//!
//! Nothing here builds a tree: reuse validation needs the text of the token
//! under a position in two snapshots, and resolution needs the start of the
//! token enclosing a position. Both are answered by re-lexing raw text.

mod lexer;

pub use lexer::{Lexer, Token, TokenKind, token_at, token_start, token_text_at};
