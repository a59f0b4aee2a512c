/*!
The pattern lexer.

`next_token` turns the pattern buffer at the current offset into one token
whose span covers exactly the consumed bytes. Lexical faults are emitted as
[`TokenKind::Error`] tokens so the surrounding parser stays in control.

The lexer also owns the raw-literal envelope: a pattern starting with `r'`
or `r"` (when enabled) produces a [`TokenKind::RawStart`], then ordinary
tokens up to the matching unescaped quote, then [`TokenKind::RawEnd`].
Inside the envelope `\` followed by the quote is the only quote escape;
regex-level escapes such as `\d` keep their meaning.
*/

use crate::{
    error::Error,
    flags::Flags,
    syntax::{
        class::ClassSet,
        token::{AnchorKind, Token, TokenKind},
    },
};

/// Result of lexing one character-class atom: either a single literal
/// character or a shorthand class (e.g. `\d`) to be merged in.
enum ClassAtom {
    Char(char),
    Set(ClassSet),
}

#[derive(Clone, Copy, PartialEq)]
enum RawState {
    /// Not a raw-literal pattern.
    Plain,
    /// Between `RawStart` and the closing quote.
    Inside(char),
    /// The closing quote has been consumed.
    Finished,
}

pub(crate) struct Lexer<'p> {
    pattern: &'p str,
    pos: usize,
    flags: Flags,
    raw_allowed: bool,
    raw: RawState,
    started: bool,
}

impl<'p> Lexer<'p> {
    pub(crate) fn new(pattern: &'p str, flags: Flags, raw_allowed: bool) -> Lexer<'p> {
        Lexer {
            pattern,
            pos: 0,
            flags,
            raw_allowed,
            raw: RawState::Plain,
            started: false,
        }
    }

    fn rest(&self) -> &'p str {
        &self.pattern[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.pattern[self.pos + offset..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn token(&self, kind: TokenKind, start: usize) -> Token {
        Token::new(kind, start, self.pos)
    }

    fn error(&self, message: &str, start: usize) -> Token {
        self.token(TokenKind::Error(Error::syntax(message, start)), start)
    }

    /// Produces the next token at the current offset.
    pub(crate) fn next_token(&mut self) -> Token {
        if !self.started {
            self.started = true;
            if let Some(quote) = self.raw_prefix() {
                let start = self.pos;
                self.pos += 2;
                if !self.raw_allowed {
                    let err = Error::unsupported("raw-literal syntax is not enabled").at(start);
                    return self.token(TokenKind::Error(err), start);
                }
                self.raw = RawState::Inside(quote);
                return self.token(TokenKind::RawStart, start);
            }
        }

        if self.flags.contains(Flags::EXTENDED) {
            self.skip_extended();
        }

        let start = self.pos;
        let Some(c) = self.peek() else {
            return match self.raw {
                RawState::Inside(_) => self.error("unterminated raw literal", start),
                _ => self.token(TokenKind::Eof, start),
            };
        };

        if let RawState::Inside(quote) = self.raw {
            if c == quote {
                self.bump();
                self.raw = RawState::Finished;
                return self.token(TokenKind::RawEnd, start);
            }
        }
        if self.raw == RawState::Finished {
            return self.error("unexpected characters after raw literal", start);
        }

        self.bump();
        match c {
            '.' => self.token(TokenKind::Dot, start),
            '^' => self.token(TokenKind::Caret, start),
            '$' => self.token(TokenKind::Dollar, start),
            '*' => self.token(TokenKind::Star, start),
            '+' => self.token(TokenKind::Plus, start),
            '?' => self.token(TokenKind::Question, start),
            '|' => self.token(TokenKind::Alternate, start),
            ')' => self.token(TokenKind::GroupClose, start),
            '(' => self.lex_group_open(start),
            '{' => self.lex_brace(start),
            '[' => self.lex_class(start),
            '\\' => self.lex_escape(start, false).unwrap_or_else(|t| t),
            c => self.token(TokenKind::Literal(c), start),
        }
    }

    fn raw_prefix(&self) -> Option<char> {
        let mut chars = self.pattern.chars();
        if chars.next() != Some('r') {
            return None;
        }
        match chars.next() {
            Some(q @ ('\'' | '"')) => Some(q),
            _ => None,
        }
    }

    fn skip_extended(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('#') => {
                    while let Some(c) = self.bump() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                _ => return,
            }
        }
    }

    /// `(` has already been consumed.
    fn lex_group_open(&mut self, start: usize) -> Token {
        if self.peek() != Some('?') {
            return self.token(TokenKind::GroupOpen, start);
        }
        self.bump();
        match self.peek() {
            Some(':') => {
                self.bump();
                self.token(TokenKind::NonCapturingOpen, start)
            }
            Some('>') => {
                self.bump();
                self.token(TokenKind::AtomicOpen, start)
            }
            Some('=') => {
                self.bump();
                self.token(TokenKind::LookaheadOpen { negated: false }, start)
            }
            Some('!') => {
                self.bump();
                self.token(TokenKind::LookaheadOpen { negated: true }, start)
            }
            Some('P') => {
                self.bump();
                if self.peek() != Some('<') {
                    return self.error("expected `<` after `(?P`", start);
                }
                self.bump();
                self.lex_group_name(start)
            }
            Some('<') => {
                self.bump();
                match self.peek() {
                    Some('=') => {
                        self.bump();
                        self.token(TokenKind::LookbehindOpen { negated: false }, start)
                    }
                    Some('!') => {
                        self.bump();
                        self.token(TokenKind::LookbehindOpen { negated: true }, start)
                    }
                    _ => self.lex_group_name(start),
                }
            }
            _ => self.error("unrecognized group syntax", start),
        }
    }

    /// The opening `<` of a group name has been consumed.
    fn lex_group_name(&mut self, start: usize) -> Token {
        let mut name = String::new();
        loop {
            match self.peek() {
                Some('>') if !name.is_empty() => {
                    self.bump();
                    return self.token(TokenKind::NamedOpen(name), start);
                }
                Some(c) if c.is_ascii_alphanumeric() || c == '_' => {
                    self.bump();
                    name.push(c);
                }
                _ => return self.error("malformed group name", start),
            }
        }
    }

    /// `{` has already been consumed. A malformed brace expression is a
    /// literal `{`.
    fn lex_brace(&mut self, start: usize) -> Token {
        let checkpoint = self.pos;
        if let Some(kind) = self.try_lex_repeat() {
            return self.token(kind, start);
        }
        self.pos = checkpoint;
        self.token(TokenKind::Literal('{'), start)
    }

    fn try_lex_repeat(&mut self) -> Option<TokenKind> {
        let min = self.lex_number();
        let max = if self.peek() == Some(',') {
            self.bump();
            match self.lex_number() {
                Some(n) => Some(Some(n)),
                None => Some(None), // `{m,}`
            }
        } else {
            None // `{m}`
        };
        if self.peek() != Some('}') {
            return None;
        }
        // `{}` and `{,}` are not repeat expressions.
        if min.is_none() && !matches!(max, Some(Some(_))) {
            return None;
        }
        self.bump();
        let min = min.unwrap_or(0);
        let max = match max {
            None => Some(min),   // `{m}`
            Some(None) => None,  // `{m,}`
            Some(Some(n)) => Some(n),
        };
        Some(TokenKind::Repeat { min, max })
    }

    fn lex_number(&mut self) -> Option<u32> {
        let mut digits = 0usize;
        let mut value: u32 = 0;
        while let Some(c) = self.peek() {
            let Some(d) = c.to_digit(10) else { break };
            self.bump();
            digits += 1;
            value = value.saturating_mul(10).saturating_add(d);
        }
        (digits > 0).then_some(value)
    }

    /// `[` has already been consumed.
    fn lex_class(&mut self, start: usize) -> Token {
        let mut set = ClassSet::new();
        let negated = if self.peek() == Some('^') {
            self.bump();
            true
        } else {
            false
        };
        let mut first = true;
        loop {
            match self.peek() {
                None => return self.error("unterminated character class", start),
                Some(']') if !first => {
                    self.bump();
                    break;
                }
                _ => {}
            }
            if let RawState::Inside(quote) = self.raw {
                if self.peek() == Some(quote) {
                    return self.error("raw literal closed inside character class", start);
                }
            }
            first = false;
            let lo = match self.class_atom(start) {
                Ok(atom) => atom,
                Err(token) => return token,
            };
            match lo {
                ClassAtom::Set(shorthand) => {
                    set.push_class(&shorthand);
                    continue;
                }
                ClassAtom::Char(lo) => {
                    // A trailing `-` (or `-` before `]`) is a literal dash.
                    if self.peek() == Some('-') && !matches!(self.peek_at(1), None | Some(']')) {
                        self.bump();
                        match self.class_atom(start) {
                            Ok(ClassAtom::Char(hi)) if lo <= hi => set.push_range(lo, hi),
                            Ok(ClassAtom::Char(_)) => {
                                return self.error("invalid character-class range", start)
                            }
                            Ok(ClassAtom::Set(_)) => {
                                return self.error("class shorthand as range endpoint", start)
                            }
                            Err(token) => return token,
                        }
                    } else {
                        set.push_char(lo);
                    }
                }
            }
        }
        set.normalize();
        if negated {
            set.negate();
        }
        self.token(TokenKind::Class(set), start)
    }

    fn class_atom(&mut self, class_start: usize) -> Result<ClassAtom, Token> {
        let c = self.bump().expect("caller checked for end of input");
        if c != '\\' {
            return Ok(ClassAtom::Char(c));
        }
        match self.lex_escape(class_start, true) {
            Ok(token) => match token.kind {
                TokenKind::Literal(c) => Ok(ClassAtom::Char(c)),
                TokenKind::Class(set) => Ok(ClassAtom::Set(set)),
                _ => Err(self.error("escape not allowed in character class", class_start)),
            },
            Err(token) => Err(token),
        }
    }

    /// `\` has already been consumed. Returns `Err` for error tokens so
    /// callers can propagate them unchanged.
    fn lex_escape(&mut self, start: usize, in_class: bool) -> Result<Token, Token> {
        let Some(c) = self.bump() else {
            return Err(self.error("pattern ends with a bare backslash", start));
        };
        let kind = match c {
            'd' => TokenKind::Class(ClassSet::digit()),
            'D' => TokenKind::Class(negated(ClassSet::digit())),
            'w' => TokenKind::Class(ClassSet::word()),
            'W' => TokenKind::Class(negated(ClassSet::word())),
            's' => TokenKind::Class(ClassSet::space()),
            'S' => TokenKind::Class(negated(ClassSet::space())),
            'n' => TokenKind::Literal('\n'),
            't' => TokenKind::Literal('\t'),
            'r' => TokenKind::Literal('\r'),
            'f' => TokenKind::Literal('\u{c}'),
            'v' => TokenKind::Literal('\u{b}'),
            'a' => TokenKind::Literal('\u{7}'),
            'e' => TokenKind::Literal('\u{1b}'),
            '0' => TokenKind::Literal('\0'),
            'x' => return self.lex_hex_escape(start),
            'b' if !in_class => TokenKind::Anchor(AnchorKind::WordBoundary),
            'b' if in_class => TokenKind::Literal('\u{8}'),
            'B' if !in_class => TokenKind::Anchor(AnchorKind::NotWordBoundary),
            'A' if !in_class => TokenKind::Anchor(AnchorKind::TextStart),
            'z' if !in_class => TokenKind::Anchor(AnchorKind::TextEnd),
            'K' if !in_class => TokenKind::Anchor(AnchorKind::Keep),
            '1'..='9' if !in_class => {
                self.pos -= 1;
                let n = self.lex_number().expect("at least one digit present");
                TokenKind::Backref(n)
            }
            'k' if !in_class => {
                if self.peek() != Some('<') {
                    return Err(self.error("expected `<name>` after `\\k`", start));
                }
                self.bump();
                let mut name = String::new();
                loop {
                    match self.peek() {
                        Some('>') if !name.is_empty() => {
                            self.bump();
                            break;
                        }
                        Some(c) if c.is_ascii_alphanumeric() || c == '_' => {
                            self.bump();
                            name.push(c);
                        }
                        _ => return Err(self.error("malformed backreference name", start)),
                    }
                }
                TokenKind::NamedBackref(name)
            }
            // Identity escape; inside a raw envelope this is also how the
            // quote character itself is written.
            c => TokenKind::Literal(c),
        };
        Ok(self.token(kind, start))
    }

    /// `\x` has already been consumed: two hex digits or `{…}`.
    fn lex_hex_escape(&mut self, start: usize) -> Result<Token, Token> {
        let mut value: u32 = 0;
        if self.peek() == Some('{') {
            self.bump();
            let mut digits = 0;
            loop {
                match self.peek() {
                    Some('}') if digits > 0 => {
                        self.bump();
                        break;
                    }
                    Some(c) if c.is_ascii_hexdigit() && digits < 6 => {
                        self.bump();
                        digits += 1;
                        value = value * 16 + c.to_digit(16).unwrap();
                    }
                    _ => return Err(self.error("invalid hex escape", start)),
                }
            }
        } else {
            for _ in 0..2 {
                match self.peek() {
                    Some(c) if c.is_ascii_hexdigit() => {
                        self.bump();
                        value = value * 16 + c.to_digit(16).unwrap();
                    }
                    _ => return Err(self.error("invalid hex escape", start)),
                }
            }
        }
        match char::from_u32(value) {
            Some(c) => Ok(self.token(TokenKind::Literal(c), start)),
            None => Err(self.error("hex escape is not a scalar value", start)),
        }
    }
}

fn negated(mut set: ClassSet) -> ClassSet {
    set.negate();
    set
}
