/*!
Character classes as sorted, merged scalar ranges plus a negation bit.

The same representation is used by the AST, the automaton transitions and
the bytecode class table, so membership tests sit on the hot path: a short
linear scan over the first few ranges, then binary search.
*/

use std::fmt::Write as _;

use crate::flags::NewlineMode;

/// A set of characters: sorted non-overlapping ranges, optionally negated.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ClassSet {
    ranges: Vec<(char, char)>,
    negated: bool,
}

impl ClassSet {
    pub fn new() -> ClassSet {
        ClassSet::default()
    }

    pub fn from_ranges(ranges: impl IntoIterator<Item = (char, char)>) -> ClassSet {
        let mut set = ClassSet::new();
        for (lo, hi) in ranges {
            set.push_range(lo, hi);
        }
        set.normalize();
        set
    }

    pub fn single(c: char) -> ClassSet {
        ClassSet {
            ranges: vec![(c, c)],
            negated: false,
        }
    }

    /// The set matching every character: an empty negated set.
    pub fn any() -> ClassSet {
        ClassSet {
            ranges: Vec::new(),
            negated: true,
        }
    }

    /// What `.` matches under the given newline mode.
    pub fn dot(mode: NewlineMode) -> ClassSet {
        let mut set = ClassSet::from_ranges(mode.excluded_chars().iter().map(|&c| (c, c)));
        set.negate();
        set
    }

    /// `\d`.
    pub fn digit() -> ClassSet {
        ClassSet::from_ranges([('0', '9')])
    }

    /// `\w`.
    pub fn word() -> ClassSet {
        ClassSet::from_ranges([('0', '9'), ('A', 'Z'), ('_', '_'), ('a', 'z')])
    }

    /// `\s`.
    pub fn space() -> ClassSet {
        ClassSet::from_ranges([
            ('\t', '\r'), // \t \n \v \f \r
            (' ', ' '),
        ])
    }

    pub fn push_char(&mut self, c: char) {
        self.push_range(c, c);
    }

    pub fn push_range(&mut self, lo: char, hi: char) {
        debug_assert!(lo <= hi);
        self.ranges.push((lo, hi));
    }

    /// Folds another (non-negated) set's ranges into this one. Negated sets
    /// are materialized as their complement first.
    pub fn push_class(&mut self, other: &ClassSet) {
        if other.negated {
            for range in complement_of(&other.ranges) {
                self.ranges.push(range);
            }
        } else {
            self.ranges.extend_from_slice(&other.ranges);
        }
    }

    pub fn negate(&mut self) {
        self.negated = !self.negated;
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    pub fn ranges(&self) -> &[(char, char)] {
        &self.ranges
    }

    /// Sorts and merges overlapping or adjacent ranges.
    pub fn normalize(&mut self) {
        if self.ranges.len() < 2 {
            return;
        }
        self.ranges.sort_unstable();
        let mut merged: Vec<(char, char)> = Vec::with_capacity(self.ranges.len());
        for &(lo, hi) in &self.ranges {
            match merged.last_mut() {
                Some(last) if u32::from(lo) <= u32::from(last.1).saturating_add(1) => {
                    if hi > last.1 {
                        last.1 = hi;
                    }
                }
                _ => merged.push((lo, hi)),
            }
        }
        self.ranges = merged;
    }

    /// Membership test, negation included.
    #[inline]
    pub fn contains(&self, c: char) -> bool {
        self.contains_raw(c) != self.negated
    }

    #[inline]
    fn contains_raw(&self, c: char) -> bool {
        // Check a few common ranges linearly before binary searching, the
        // typical class is short and predominantly ASCII.
        for &(lo, hi) in self.ranges.iter().take(4) {
            if c < lo {
                return false;
            }
            if c <= hi {
                return true;
            }
        }
        if self.ranges.len() <= 4 {
            return false;
        }
        self.ranges[4..]
            .binary_search_by(|&(lo, hi)| {
                if hi < c {
                    std::cmp::Ordering::Less
                } else if lo > c {
                    std::cmp::Ordering::Greater
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .is_ok()
    }

    /// True if this set matches every character.
    pub fn is_any(&self) -> bool {
        (self.negated && self.ranges.is_empty())
            || (!self.negated && self.ranges == [('\0', char::MAX)])
    }

    /// The single character this set matches, if it matches exactly one.
    pub fn exact_char(&self) -> Option<char> {
        if !self.negated && self.ranges.len() == 1 && self.ranges[0].0 == self.ranges[0].1 {
            Some(self.ranges[0].0)
        } else {
            None
        }
    }

    /// The UTF-8 width shared by every member, if they all agree. Used to
    /// compute fixed widths for look-behind.
    pub fn uniform_utf8_width(&self) -> Option<usize> {
        let ranges = if self.negated {
            complement_of(&self.ranges)
        } else {
            self.ranges.clone()
        };
        let mut width = None;
        for (lo, hi) in ranges {
            if lo.len_utf8() != hi.len_utf8() {
                return None;
            }
            // Scalar ranges within one UTF-8 length class share that length
            // only if they don't straddle a length boundary.
            for boundary in ['\u{80}', '\u{800}', '\u{10000}'] {
                if lo < boundary && hi >= boundary {
                    return None;
                }
            }
            match width {
                None => width = Some(lo.len_utf8()),
                Some(w) if w == lo.len_utf8() => {}
                _ => return None,
            }
        }
        width
    }

    /// The effective ranges with negation resolved, for consumers that need
    /// a positive range list (alphabet derivation, determinization).
    pub(crate) fn materialize(&self) -> Vec<(char, char)> {
        if self.negated {
            complement_of(&self.ranges)
        } else {
            self.ranges.clone()
        }
    }

    /// Prints the class in pattern syntax.
    pub(crate) fn write_pattern(&self, out: &mut String) {
        out.push('[');
        if self.negated {
            out.push('^');
        }
        for &(lo, hi) in &self.ranges {
            write_class_char(out, lo);
            if lo != hi {
                out.push('-');
                write_class_char(out, hi);
            }
        }
        out.push(']');
    }
}

fn write_class_char(out: &mut String, c: char) {
    match c {
        ']' | '\\' | '^' | '-' => {
            out.push('\\');
            out.push(c);
        }
        '\n' => out.push_str("\\n"),
        '\r' => out.push_str("\\r"),
        '\t' => out.push_str("\\t"),
        c if (c as u32) < 0x20 => {
            let _ = write!(out, "\\x{{{:x}}}", c as u32);
        }
        c => out.push(c),
    }
}

/// The complement of a sorted, merged range list over all scalar values.
fn complement_of(ranges: &[(char, char)]) -> Vec<(char, char)> {
    let mut sorted = ranges.to_vec();
    sorted.sort_unstable();
    let mut out = Vec::with_capacity(sorted.len() + 1);
    let mut next = Some('\0');
    for &(lo, hi) in &sorted {
        if let Some(start) = next {
            if start < lo {
                if let Some(end) = prev_char(lo) {
                    out.push((start, end));
                }
            }
        }
        next = next_char(hi);
        if next.is_none() {
            break;
        }
    }
    if let Some(start) = next {
        out.push((start, char::MAX));
    }
    out
}

fn next_char(c: char) -> Option<char> {
    match c {
        char::MAX => None,
        '\u{d7ff}' => Some('\u{e000}'),
        c => char::from_u32(c as u32 + 1),
    }
}

fn prev_char(c: char) -> Option<char> {
    match c {
        '\0' => None,
        '\u{e000}' => Some('\u{d7ff}'),
        c => char::from_u32(c as u32 - 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_merges_adjacent() {
        let mut set = ClassSet::new();
        set.push_range('a', 'f');
        set.push_range('g', 'k');
        set.push_range('c', 'h');
        set.normalize();
        assert_eq!(set.ranges(), &[('a', 'k')]);
    }

    #[test]
    fn negated_membership() {
        let mut set = ClassSet::from_ranges([('0', '9')]);
        assert!(set.contains('5'));
        assert!(!set.contains('x'));
        set.negate();
        assert!(!set.contains('5'));
        assert!(set.contains('x'));
    }

    #[test]
    fn dot_excludes_terminator() {
        let dot = ClassSet::dot(NewlineMode::Lf);
        assert!(dot.contains('a'));
        assert!(dot.contains('\r'));
        assert!(!dot.contains('\n'));
    }

    #[test]
    fn complement_skips_surrogates() {
        let comp = complement_of(&[('\0', 'a')]);
        assert_eq!(comp[0].0, 'b');
        for &(lo, hi) in &comp {
            assert!(!(u32::from(lo)..=u32::from(hi)).contains(&0xd800));
        }
    }

    #[test]
    fn uniform_width() {
        assert_eq!(ClassSet::digit().uniform_utf8_width(), Some(1));
        assert_eq!(ClassSet::from_ranges([('α', 'ω')]).uniform_utf8_width(), Some(2));
        assert_eq!(ClassSet::from_ranges([('a', 'é')]).uniform_utf8_width(), None);
        assert_eq!(ClassSet::any().uniform_utf8_width(), None);
    }

    #[test]
    fn binary_search_path() {
        let set = ClassSet::from_ranges([
            ('a', 'b'),
            ('d', 'e'),
            ('g', 'h'),
            ('j', 'k'),
            ('m', 'n'),
            ('p', 'q'),
        ]);
        assert!(set.contains('p'));
        assert!(!set.contains('o'));
        assert!(set.contains('a'));
    }
}
