/*!
Pattern surface syntax: lexing and parsing into an [`Ast`].

Supported syntax is the standard concat / alternation / quantifier / class
grammar:

- literals, `.`, escapes (`\n`, `\t`, `\xHH`, `\x{…}`, identity escapes);
- classes `[…]` / `[^…]` with ranges and the `\d \D \w \W \s \S`
  shorthands;
- quantifiers `* + ?` and `{m,n}` / `{m,}` / `{m}` / `{,n}`, each with an
  optional reluctance `?`;
- groups `(…)`, `(?:…)`, `(?>…)`, `(?P<name>…)` / `(?<name>…)`, look-around
  `(?=…) (?!…) (?<=…) (?<!…)`;
- backreferences `\N` and `\k<name>`;
- anchors `^ $ \A \z \b \B \K`;
- the raw-literal envelope `r'…'` / `r"…"` when
  [`Flags::RAW_LITERAL`](crate::Flags::RAW_LITERAL) is set and the
  configuration enables it. Inside the envelope, `\` followed by the
  opening quote is the only quote escape; regex-level escapes keep their
  meaning.

With [`Flags::EXTENDED`](crate::Flags::EXTENDED), unescaped whitespace and
`#`-to-end-of-line comments in the pattern are skipped.
*/

pub(crate) mod class;
pub(crate) mod lexer;
pub(crate) mod parser;
pub(crate) mod token;

pub mod ast;

pub use class::ClassSet;
pub(crate) use parser::parse;
pub use token::{AnchorKind, Token, TokenKind};

use crate::{config::Config, error::Result, flags::Flags};

/// Parses a pattern into its syntax tree.
///
/// ```
/// use librift::{syntax, Config, Flags};
///
/// let ast = syntax::parse_pattern("a|b+", Flags::empty(), &Config::default()).unwrap();
/// assert_eq!(ast.to_string(), "a|b+");
/// ```
pub fn parse_pattern(pattern: &str, flags: Flags, config: &Config) -> Result<ast::Ast> {
    parser::parse(pattern, flags, config).map(|parsed| parsed.ast)
}
