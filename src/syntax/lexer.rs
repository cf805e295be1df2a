//! Token lexer shared by reuse validation and the resolver.
//!
//! The token set is deliberately language-neutral: identifiers, numbers,
//! strings, comments (returned as tokens, never skipped), operator runs and
//! single punctuation characters.

use logos::Logos;

use crate::base::{TextRange, TextSize};

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum TokenKind {
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Ident,

    /// Backtick-escaped identifier, e.g. `` `default` ``
    #[regex(r"`[A-Za-z_][A-Za-z0-9_]*`")]
    EscapedIdent,

    #[regex(r"[0-9][0-9_]*(\.[0-9][0-9_]*)?")]
    Number,

    #[regex(r#""([^"\\\n]|\\.)*""#)]
    String,

    #[regex(r"//[^\n]*")]
    LineComment,

    #[token("/*", block_comment)]
    BlockComment,

    #[regex(r"[-+*%=<>!&|^~?.]+")]
    #[token("/")]
    #[token("/=")]
    Operator,

    #[regex(r"[(){}\[\],;:@#]")]
    Punct,

    /// Anything the lexer could not classify
    Error,
}

/// Consume a block comment up to and including `*/`, or to end of input.
fn block_comment(lex: &mut logos::Lexer<TokenKind>) -> bool {
    let rest = lex.remainder();
    match rest.find("*/") {
        Some(end) => lex.bump(end + 2),
        None => lex.bump(rest.len()),
    }
    true
}

impl TokenKind {
    pub fn is_comment(self) -> bool {
        matches!(self, TokenKind::LineComment | TokenKind::BlockComment)
    }

    pub fn is_identifier(self) -> bool {
        matches!(self, TokenKind::Ident | TokenKind::EscapedIdent)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub range: TextRange,
}

/// Iterator over the tokens of a text.
#[derive(Clone)]
pub struct Lexer<'src> {
    inner: logos::Lexer<'src, TokenKind>,
    source: &'src str,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            inner: TokenKind::lexer(source),
            source,
        }
    }

    /// Get the source text for a token.
    pub fn slice(&self, token: &Token) -> &'src str {
        &self.source[token.range]
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Self::Item> {
        let kind = match self.inner.next()? {
            Ok(kind) => kind,
            Err(()) => TokenKind::Error,
        };
        let span = self.inner.span();
        let range = TextRange::new(TextSize::from(span.start as u32), TextSize::from(span.end as u32));
        Some(Token { kind, range })
    }
}

/// The smallest token containing `offset`, if any.
///
/// Positions in whitespace, or past the end of the text, have no token.
pub fn token_at(text: &str, offset: TextSize) -> Option<Token> {
    Lexer::new(text)
        .take_while(|token| token.range.start() <= offset)
        .find(|token| token.range.contains(offset))
}

/// The text of the token containing `offset`.
pub fn token_text_at(text: &str, offset: TextSize) -> Option<&str> {
    token_at(text, offset)
        .filter(|token| token.kind != TokenKind::Error)
        .map(|token| &text[token.range])
}

/// Snap `offset` to the start of its enclosing token; positions outside any
/// token are returned unchanged.
pub fn token_start(text: &str, offset: TextSize) -> TextSize {
    token_at(text, offset).map_or(offset, |token| token.range.start())
}
