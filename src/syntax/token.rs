/*!
Tokens produced by the pattern lexer.

Tokens are ephemeral: the parser pulls them on demand and never stores more
than one of lookahead. A lexical fault becomes a [`TokenKind::Error`] token
rather than aborting the lexer, so the parser decides how to surface it.
*/

use crate::{error::Error, syntax::class::ClassSet};

/// A lexed token with its byte span in the pattern.
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset of the first byte of the token.
    pub start: usize,
    /// Byte offset one past the last byte of the token.
    pub end: usize,
}

impl Token {
    pub(crate) fn new(kind: TokenKind, start: usize, end: usize) -> Token {
        Token { kind, start, end }
    }
}

/// Zero-width assertions reachable through escapes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnchorKind {
    /// `\b`
    WordBoundary,
    /// `\B`
    NotWordBoundary,
    /// `\A`
    TextStart,
    /// `\z`
    TextEnd,
    /// `\K`
    Keep,
}

/// What a token is.
#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    /// A single character to be matched verbatim (includes resolved simple
    /// escapes such as `\n` or `\.`).
    Literal(char),
    /// `.`
    Dot,
    /// `^`
    Caret,
    /// `$`
    Dollar,
    /// `*`
    Star,
    /// `+`
    Plus,
    /// `?`
    Question,
    /// `|`
    Alternate,
    /// `{m,n}`, `{m,}`, `{m}` or `{,n}`. A malformed brace expression is
    /// lexed as a literal `{` instead.
    Repeat { min: u32, max: Option<u32> },
    /// `(`
    GroupOpen,
    /// `(?:`
    NonCapturingOpen,
    /// `(?>`
    AtomicOpen,
    /// `(?P<name>` or `(?<name>`
    NamedOpen(String),
    /// `(?=` / `(?!`
    LookaheadOpen { negated: bool },
    /// `(?<=` / `(?<!`
    LookbehindOpen { negated: bool },
    /// `)`
    GroupClose,
    /// A bracketed class payload `[…]`, or a `\d`-family shorthand.
    Class(ClassSet),
    /// `\b \B \A \z \K`
    Anchor(AnchorKind),
    /// `\1` … `\99`
    Backref(u32),
    /// `\k<name>`
    NamedBackref(String),
    /// The opening `r'` / `r"` of a raw-literal envelope.
    RawStart,
    /// The closing quote of a raw-literal envelope.
    RawEnd,
    /// A lexical fault at this position; the payload carries kind, message
    /// and offset.
    Error(Error),
    /// End of pattern.
    Eof,
}

impl TokenKind {
    /// True for the postfix quantifier tokens.
    pub(crate) fn is_quantifier(&self) -> bool {
        matches!(
            self,
            TokenKind::Star | TokenKind::Plus | TokenKind::Question | TokenKind::Repeat { .. }
        )
    }
}
