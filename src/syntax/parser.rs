/*!
Recursive-descent pattern parser.

Grammar, loosest binding first: alternation, concatenation, postfix
quantifier, primary. Group identifiers are assigned in opening-paren order;
capture numbers cover capturing groups only and are dense from 1. Every
failure carries the byte offset of the offending token.
*/

use crate::{
    config::Config,
    error::{Error, Result},
    flags::Flags,
    syntax::{
        ast::{Anchor, Ast, AstStats, Group, GroupKind},
        lexer::Lexer,
        token::{AnchorKind, Token, TokenKind},
    },
};

/// A parsed pattern plus the side tables compilation needs.
#[derive(Clone, Debug)]
pub(crate) struct ParsedPattern {
    pub ast: Ast,
    pub stats: AstStats,
    /// Capture names in declaration order, paired with capture numbers.
    pub names: Vec<(String, u32)>,
    /// True if the pattern used the `r'…'` / `r"…"` envelope.
    pub raw_envelope: bool,
}

/// Parses `pattern` under `flags`, honoring the configured ceilings.
pub(crate) fn parse(pattern: &str, flags: Flags, config: &Config) -> Result<ParsedPattern> {
    if pattern.len() > config.max_pattern_length {
        return Err(Error::limit("pattern source exceeds max_pattern_length"));
    }
    let raw_allowed = flags.contains(Flags::RAW_LITERAL) && config.enable_raw_literal_syntax;
    let mut parser = Parser {
        lexer: Lexer::new(pattern, flags, raw_allowed),
        token: Token::new(TokenKind::Eof, 0, 0),
        config,
        next_group: 1,
        next_capture: 1,
        names: Vec::new(),
    };
    parser.bump()?;
    parser.parse_pattern()
}

struct Parser<'p, 'c> {
    lexer: Lexer<'p>,
    /// One token of lookahead.
    token: Token,
    config: &'c Config,
    next_group: u32,
    next_capture: u32,
    names: Vec<(String, u32)>,
}

impl Parser<'_, '_> {
    fn bump(&mut self) -> Result<()> {
        self.token = self.lexer.next_token();
        if let TokenKind::Error(err) = &self.token.kind {
            return Err(err.clone());
        }
        Ok(())
    }

    fn parse_pattern(&mut self) -> Result<ParsedPattern> {
        let raw_envelope = self.token.kind == TokenKind::RawStart;
        if raw_envelope {
            self.bump()?;
        }
        let ast = self.parse_alternation()?;
        if raw_envelope {
            if self.token.kind != TokenKind::RawEnd {
                return Err(Error::syntax("unterminated raw literal", self.token.start));
            }
            self.bump()?;
        }
        match self.token.kind {
            TokenKind::Eof => {}
            TokenKind::GroupClose => {
                return Err(Error::syntax("unmatched `)`", self.token.start));
            }
            _ => {
                return Err(Error::syntax("unexpected token", self.token.start));
            }
        }
        let stats = ast.stats();
        Ok(ParsedPattern {
            ast,
            stats,
            names: std::mem::take(&mut self.names),
            raw_envelope,
        })
    }

    fn parse_alternation(&mut self) -> Result<Ast> {
        let mut alternatives = vec![self.parse_concat()?];
        while self.token.kind == TokenKind::Alternate {
            self.bump()?;
            alternatives.push(self.parse_concat()?);
        }
        Ok(if alternatives.len() == 1 {
            alternatives.pop().expect("one alternative")
        } else {
            Ast::Alternate(alternatives)
        })
    }

    fn parse_concat(&mut self) -> Result<Ast> {
        let mut children = Vec::new();
        loop {
            match self.token.kind {
                TokenKind::Eof
                | TokenKind::Alternate
                | TokenKind::GroupClose
                | TokenKind::RawEnd => break,
                _ => {}
            }
            if self.token.kind.is_quantifier() {
                return Err(Error::syntax("quantifier with no operand", self.token.start));
            }
            let primary = self.parse_primary()?;
            children.push(self.parse_postfix(primary)?);
        }
        Ok(match children.len() {
            0 => Ast::Empty,
            1 => children.pop().expect("one child"),
            _ => Ast::Concat(children),
        })
    }

    /// Applies an optional quantifier token (plus an optional reluctance
    /// `?`) to a parsed primary.
    fn parse_postfix(&mut self, ast: Ast) -> Result<Ast> {
        let start = self.token.start;
        let (min, max) = match self.token.kind {
            TokenKind::Star => (0, None),
            TokenKind::Plus => (1, None),
            TokenKind::Question => (0, Some(1)),
            TokenKind::Repeat { min, max } => (min, max),
            _ => return Ok(ast),
        };
        if let Some(max) = max {
            if min > max {
                return Err(Error::syntax("quantifier minimum exceeds maximum", start));
            }
        }
        if matches!(ast, Ast::Anchor(_)) {
            return Err(Error::syntax("quantifier applied to an anchor", start));
        }
        self.bump()?;
        let greedy = if self.token.kind == TokenKind::Question {
            self.bump()?;
            false
        } else {
            true
        };
        if self.token.kind.is_quantifier() {
            return Err(Error::syntax("quantifier follows a quantifier", self.token.start));
        }
        Ok(Ast::Repeat {
            ast: Box::new(ast),
            min,
            max,
            greedy,
        })
    }

    fn parse_primary(&mut self) -> Result<Ast> {
        let start = self.token.start;
        let ast = match std::mem::replace(&mut self.token.kind, TokenKind::Eof) {
            TokenKind::Literal(c) => Ast::Literal(c),
            TokenKind::Dot => Ast::Dot,
            TokenKind::Caret => Ast::Anchor(Anchor::LineStart),
            TokenKind::Dollar => Ast::Anchor(Anchor::LineEnd),
            TokenKind::Class(set) => Ast::Class(set),
            TokenKind::Anchor(kind) => Ast::Anchor(match kind {
                AnchorKind::WordBoundary => Anchor::WordBoundary,
                AnchorKind::NotWordBoundary => Anchor::NotWordBoundary,
                AnchorKind::TextStart => Anchor::TextStart,
                AnchorKind::TextEnd => Anchor::TextEnd,
                AnchorKind::Keep => Anchor::Keep,
            }),
            TokenKind::Backref(n) => {
                if n == 0 || n >= self.next_capture {
                    return Err(Error::syntax("backreference to non-existent group", start));
                }
                Ast::Backref(n)
            }
            TokenKind::NamedBackref(name) => {
                let Some(&(_, capture)) = self.names.iter().find(|(n, _)| *n == name) else {
                    return Err(Error::syntax("backreference to unknown group name", start));
                };
                Ast::Backref(capture)
            }
            TokenKind::GroupOpen => {
                return self.parse_group(GroupKind::Capturing { name: None }, start)
            }
            TokenKind::NamedOpen(name) => {
                if self.names.iter().any(|(n, _)| *n == name) {
                    return Err(Error::syntax("duplicate group name", start));
                }
                return self.parse_group(GroupKind::Capturing { name: Some(name) }, start);
            }
            TokenKind::NonCapturingOpen => return self.parse_group(GroupKind::NonCapturing, start),
            TokenKind::AtomicOpen => return self.parse_group(GroupKind::Atomic, start),
            TokenKind::LookaheadOpen { negated } => {
                return self.parse_group(GroupKind::Lookahead { negated }, start)
            }
            TokenKind::LookbehindOpen { negated } => {
                return self.parse_group(GroupKind::Lookbehind { negated }, start)
            }
            TokenKind::RawStart => {
                return Err(Error::syntax("raw literal not at pattern start", start))
            }
            // Quantifiers, alternation bars, closers and error tokens are
            // all consumed by the callers above.
            _ => return Err(Error::internal("token not handled by primary parser").at(start)),
        };
        self.bump()?;
        Ok(ast)
    }

    fn parse_group(&mut self, kind: GroupKind, open_at: usize) -> Result<Ast> {
        let index = self.next_group;
        self.next_group += 1;
        let capture = if let GroupKind::Capturing { name } = &kind {
            let capture = self.next_capture;
            if capture as usize > self.config.max_capture_groups {
                return Err(Error::limit("too many capture groups").at(open_at));
            }
            self.next_capture += 1;
            if let Some(name) = name {
                self.names.push((name.clone(), capture));
            }
            Some(capture)
        } else {
            None
        };
        self.bump()?;
        let ast = self.parse_alternation()?;
        if self.token.kind != TokenKind::GroupClose {
            return Err(Error::syntax("unmatched `(`", open_at));
        }
        self.bump()?;
        Ok(Ast::Group(Box::new(Group {
            ast,
            kind,
            index,
            capture,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    fn parse_ok(pattern: &str) -> ParsedPattern {
        parse(pattern, Flags::empty(), &Config::default()).unwrap()
    }

    fn parse_err(pattern: &str) -> Error {
        parse(pattern, Flags::empty(), &Config::default()).unwrap_err()
    }

    #[test]
    fn empty_pattern() {
        assert_eq!(parse_ok("").ast, Ast::Empty);
    }

    #[test]
    fn literal_concat() {
        let parsed = parse_ok("abc");
        assert_eq!(
            parsed.ast,
            Ast::Concat(vec![
                Ast::Literal('a'),
                Ast::Literal('b'),
                Ast::Literal('c')
            ])
        );
        assert_eq!(parsed.stats.capture_count, 0);
    }

    #[test]
    fn precedence() {
        // Alternation binds loosest; quantifier binds to one primary.
        let parsed = parse_ok("ab|c*");
        let Ast::Alternate(alts) = parsed.ast else {
            panic!("expected alternation");
        };
        assert_eq!(alts.len(), 2);
        assert_eq!(
            alts[1],
            Ast::Repeat {
                ast: Box::new(Ast::Literal('c')),
                min: 0,
                max: None,
                greedy: true
            }
        );
    }

    #[test]
    fn capture_numbering_skips_noncapturing() {
        let parsed = parse_ok("(a)(?:b)(?<x>c)(?=d)");
        let stats = parsed.stats;
        assert_eq!(stats.capture_count, 2);
        assert_eq!(stats.group_count, 4);
        assert_eq!(parsed.names, vec![("x".to_string(), 2)]);

        let Ast::Concat(children) = parsed.ast else {
            panic!("expected concat");
        };
        let indices: Vec<(u32, Option<u32>)> = children
            .iter()
            .map(|c| {
                let Ast::Group(g) = c else { panic!("expected group") };
                (g.index, g.capture)
            })
            .collect();
        assert_eq!(
            indices,
            vec![(1, Some(1)), (2, None), (3, Some(2)), (4, None)]
        );
    }

    #[test]
    fn quantifier_normalization() {
        let star = parse_ok("a{0,}").ast;
        assert_eq!(star, parse_ok("a*").ast);
        let plus = parse_ok("a{1,}").ast;
        assert_eq!(plus, parse_ok("a+").ast);
        let question = parse_ok("a{0,1}").ast;
        assert_eq!(question, parse_ok("a?").ast);
        let none = parse_ok("a{0,0}").ast;
        assert_eq!(
            none,
            Ast::Repeat {
                ast: Box::new(Ast::Literal('a')),
                min: 0,
                max: Some(0),
                greedy: true
            }
        );
    }

    #[test]
    fn reluctant_quantifier() {
        let parsed = parse_ok("a+?");
        assert_eq!(
            parsed.ast,
            Ast::Repeat {
                ast: Box::new(Ast::Literal('a')),
                min: 1,
                max: None,
                greedy: false
            }
        );
    }

    #[test]
    fn structural_errors() {
        assert_eq!(parse_err("*a").kind(), ErrorKind::Syntax);
        assert_eq!(parse_err("(a").kind(), ErrorKind::Syntax);
        assert_eq!(parse_err("a)").kind(), ErrorKind::Syntax);
        assert_eq!(parse_err("a{3,1}").kind(), ErrorKind::Syntax);
        assert_eq!(parse_err(r"\2(a)").kind(), ErrorKind::Syntax);
        assert_eq!(parse_err(r"\k<nope>").kind(), ErrorKind::Syntax);
        assert_eq!(parse_err("a**").kind(), ErrorKind::Syntax);
        assert_eq!(parse_err("(?<x>a)(?<x>b)").kind(), ErrorKind::Syntax);
    }

    #[test]
    fn error_positions_point_at_token() {
        let err = parse_err("ab)cd");
        assert_eq!(err.position(), Some(2));
        let err = parse_err("a{3,1}");
        assert_eq!(err.position(), Some(1));
    }

    #[test]
    fn backref_resolution() {
        let parsed = parse_ok(r"(a)(?<w>b)\1\k<w>");
        let Ast::Concat(children) = parsed.ast else {
            panic!("expected concat");
        };
        assert_eq!(children[2], Ast::Backref(1));
        assert_eq!(children[3], Ast::Backref(2));
    }

    #[test]
    fn empty_alternative_branches() {
        let parsed = parse_ok("a|");
        let Ast::Alternate(alts) = parsed.ast else {
            panic!("expected alternation");
        };
        assert_eq!(alts[1], Ast::Empty);
    }

    #[test]
    fn pattern_length_limit() {
        let config = Config::builder().max_pattern_length(4).build();
        let err = parse("abcde", Flags::empty(), &config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LimitExceeded);
    }

    #[test]
    fn capture_group_limit() {
        let config = Config::builder().max_capture_groups(2).build();
        let err = parse("(a)(b)(c)", Flags::empty(), &config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LimitExceeded);
    }

    #[test]
    fn raw_envelope_parses() {
        let flags = Flags::RAW_LITERAL;
        let parsed = parse(r"r'\d+'", flags, &Config::default()).unwrap();
        assert!(parsed.raw_envelope);
        assert!(matches!(
            parsed.ast,
            Ast::Repeat { min: 1, max: None, .. }
        ));
    }

    #[test]
    fn raw_envelope_without_flag_is_unsupported() {
        let err = parse(r"r'\d+'", Flags::empty(), &Config::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedFeature);
    }

    #[test]
    fn raw_envelope_disabled_by_config() {
        let config = Config::builder().enable_raw_literal_syntax(false).build();
        let err = parse(r"r'\d+'", Flags::RAW_LITERAL, &config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedFeature);
    }

    #[test]
    fn print_reparse_roundtrip() {
        for pattern in [
            "abc",
            "a|b|",
            "(a+)+b",
            "(?:ab)*?",
            "(?<x>a)\\1",
            "[a-z0-9_]{2,7}",
            "\\Aa\\.b?\\z",
            "(?=x)(?!y)(?<=z)(?<!w)",
            "(?>ab|cd)",
            "a{3}b{4,}c{5,6}",
        ] {
            let first = parse_ok(pattern);
            let printed = first.ast.to_string();
            let second = parse(&printed, Flags::empty(), &Config::default())
                .unwrap_or_else(|e| panic!("reparse of {printed:?} failed: {e}"));
            assert_eq!(first.ast, second.ast, "printed as {printed:?}");
        }
    }
}
