/*!
The abstract syntax tree for parsed patterns.

Nodes own their children; the whole tree is `Clone` so compiled patterns can
retain it for diagnostics. [`Ast::stats`] computes the structural counts the
complexity estimator and the engine router need, and the `Display`
implementation prints a pattern that reparses to the same tree.
*/

use std::fmt;

use crate::syntax::class::ClassSet;

/// A regex syntax tree node.
#[derive(Clone, Debug, PartialEq)]
pub enum Ast {
    /// Matches the empty string.
    Empty,
    /// A single character.
    Literal(char),
    /// A character class.
    Class(ClassSet),
    /// `.`
    Dot,
    /// Two or more nodes in sequence.
    Concat(Vec<Ast>),
    /// Two or more alternatives, leftmost preferred.
    Alternate(Vec<Ast>),
    /// A quantified node. `max` of `None` means unbounded.
    Repeat {
        ast: Box<Ast>,
        min: u32,
        max: Option<u32>,
        greedy: bool,
    },
    /// Any parenthesized sub-pattern.
    Group(Box<Group>),
    /// A zero-width assertion.
    Anchor(Anchor),
    /// A backreference to capture group `N` (named backreferences are
    /// resolved to indices by the parser).
    Backref(u32),
}

/// A parenthesized sub-pattern.
#[derive(Clone, Debug, PartialEq)]
pub struct Group {
    pub ast: Ast,
    pub kind: GroupKind,
    /// Identifier assigned to every group in opening-paren order, starting
    /// at 1.
    pub index: u32,
    /// Capture number, assigned in opening-paren order over capturing
    /// groups only; dense starting at 1. `None` for the non-capturing
    /// family.
    pub capture: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GroupKind {
    Capturing { name: Option<String> },
    NonCapturing,
    Atomic,
    Lookahead { negated: bool },
    Lookbehind { negated: bool },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Anchor {
    /// `^`
    LineStart,
    /// `$`
    LineEnd,
    /// `\A`
    TextStart,
    /// `\z`
    TextEnd,
    /// `\b`
    WordBoundary,
    /// `\B`
    NotWordBoundary,
    /// `\K`: resets the reported match start to the current position.
    Keep,
}

/// Structural counts used by the engine router and the complexity
/// estimator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AstStats {
    /// Number of capturing groups (the public group count).
    pub capture_count: u32,
    /// Number of groups of any kind.
    pub group_count: u32,
    pub max_group_depth: u32,
    pub alternation_count: u32,
    pub quantifier_count: u32,
    /// Quantifiers nested somewhere beneath another quantifier.
    pub nested_quantifier_count: u32,
    pub has_backref: bool,
    pub has_lookahead: bool,
    pub has_lookbehind: bool,
    pub has_atomic: bool,
    /// The largest finite quantifier bound in the tree.
    pub max_finite_repeat: u32,
}

impl Ast {
    /// Walks the tree computing [`AstStats`].
    pub fn stats(&self) -> AstStats {
        let mut stats = AstStats::default();
        self.collect(&mut stats, 0, 0);
        stats
    }

    fn collect(&self, stats: &mut AstStats, group_depth: u32, repeat_depth: u32) {
        match self {
            Ast::Empty | Ast::Literal(_) | Ast::Class(_) | Ast::Dot | Ast::Anchor(_) => {}
            Ast::Backref(_) => stats.has_backref = true,
            Ast::Concat(children) => {
                for child in children {
                    child.collect(stats, group_depth, repeat_depth);
                }
            }
            Ast::Alternate(alts) => {
                stats.alternation_count += 1;
                for alt in alts {
                    alt.collect(stats, group_depth, repeat_depth);
                }
            }
            Ast::Repeat { ast, max, .. } => {
                stats.quantifier_count += 1;
                if repeat_depth > 0 {
                    stats.nested_quantifier_count += 1;
                }
                if let Some(max) = max {
                    stats.max_finite_repeat = stats.max_finite_repeat.max(*max);
                }
                ast.collect(stats, group_depth, repeat_depth + 1);
            }
            Ast::Group(group) => {
                stats.group_count += 1;
                if group.capture.is_some() {
                    stats.capture_count += 1;
                }
                match group.kind {
                    GroupKind::Atomic => stats.has_atomic = true,
                    GroupKind::Lookahead { .. } => stats.has_lookahead = true,
                    GroupKind::Lookbehind { .. } => stats.has_lookbehind = true,
                    _ => {}
                }
                stats.max_group_depth = stats.max_group_depth.max(group_depth + 1);
                group.ast.collect(stats, group_depth + 1, repeat_depth);
            }
        }
    }

    /// The fixed width in bytes this node always matches, if it has one.
    /// Drives look-behind support.
    pub(crate) fn fixed_utf8_width(&self) -> Option<usize> {
        match self {
            Ast::Empty | Ast::Anchor(_) => Some(0),
            Ast::Literal(c) => Some(c.len_utf8()),
            Ast::Class(set) => set.uniform_utf8_width(),
            Ast::Dot => None,
            Ast::Concat(children) => children.iter().map(Ast::fixed_utf8_width).sum(),
            Ast::Alternate(alts) => {
                let mut width = None;
                for alt in alts {
                    let w = alt.fixed_utf8_width()?;
                    match width {
                        None => width = Some(w),
                        Some(prev) if prev == w => {}
                        _ => return None,
                    }
                }
                width
            }
            Ast::Repeat { ast, min, max, .. } => match max {
                Some(max) if min == max => {
                    ast.fixed_utf8_width().map(|w| w * (*min as usize))
                }
                _ => {
                    if matches!(**ast, Ast::Empty) {
                        Some(0)
                    } else {
                        None
                    }
                }
            },
            Ast::Group(group) => match group.kind {
                GroupKind::Lookahead { .. } | GroupKind::Lookbehind { .. } => Some(0),
                _ => group.ast.fixed_utf8_width(),
            },
            Ast::Backref(_) => None,
        }
    }
}

impl fmt::Display for Ast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.write_pattern(&mut out);
        f.write_str(&out)
    }
}

impl Ast {
    fn write_pattern(&self, out: &mut String) {
        match self {
            Ast::Empty => {}
            Ast::Literal(c) => write_literal(out, *c),
            Ast::Class(set) => set.write_pattern(out),
            Ast::Dot => out.push('.'),
            Ast::Concat(children) => {
                for child in children {
                    child.write_pattern(out);
                }
            }
            Ast::Alternate(alts) => {
                for (i, alt) in alts.iter().enumerate() {
                    if i > 0 {
                        out.push('|');
                    }
                    alt.write_pattern(out);
                }
            }
            Ast::Repeat { ast, min, max, greedy } => {
                ast.write_pattern(out);
                match (min, max) {
                    (0, None) => out.push('*'),
                    (1, None) => out.push('+'),
                    (0, Some(1)) => out.push('?'),
                    (m, None) => {
                        out.push('{');
                        out.push_str(&m.to_string());
                        out.push_str(",}");
                    }
                    (m, Some(n)) if m == n => {
                        out.push('{');
                        out.push_str(&m.to_string());
                        out.push('}');
                    }
                    (m, Some(n)) => {
                        out.push('{');
                        out.push_str(&m.to_string());
                        out.push(',');
                        out.push_str(&n.to_string());
                        out.push('}');
                    }
                }
                if !greedy {
                    out.push('?');
                }
            }
            Ast::Group(group) => {
                match &group.kind {
                    GroupKind::Capturing { name: None } => out.push('('),
                    GroupKind::Capturing { name: Some(name) } => {
                        out.push_str("(?<");
                        out.push_str(name);
                        out.push('>');
                    }
                    GroupKind::NonCapturing => out.push_str("(?:"),
                    GroupKind::Atomic => out.push_str("(?>"),
                    GroupKind::Lookahead { negated: false } => out.push_str("(?="),
                    GroupKind::Lookahead { negated: true } => out.push_str("(?!"),
                    GroupKind::Lookbehind { negated: false } => out.push_str("(?<="),
                    GroupKind::Lookbehind { negated: true } => out.push_str("(?<!"),
                }
                group.ast.write_pattern(out);
                out.push(')');
            }
            Ast::Anchor(anchor) => out.push_str(match anchor {
                Anchor::LineStart => "^",
                Anchor::LineEnd => "$",
                Anchor::TextStart => "\\A",
                Anchor::TextEnd => "\\z",
                Anchor::WordBoundary => "\\b",
                Anchor::NotWordBoundary => "\\B",
                Anchor::Keep => "\\K",
            }),
            Ast::Backref(n) => {
                out.push('\\');
                out.push_str(&n.to_string());
            }
        }
    }
}

fn write_literal(out: &mut String, c: char) {
    match c {
        '.' | '^' | '$' | '*' | '+' | '?' | '(' | ')' | '[' | ']' | '{' | '}' | '|' | '\\' => {
            out.push('\\');
            out.push(c);
        }
        '\n' => out.push_str("\\n"),
        '\r' => out.push_str("\\r"),
        '\t' => out.push_str("\\t"),
        c if (c as u32) < 0x20 => {
            use std::fmt::Write as _;
            let _ = write!(out, "\\x{{{:x}}}", c as u32);
        }
        c => out.push(c),
    }
}
