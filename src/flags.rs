/*!
Compile and run flags.

Flags travel with a pattern from compilation through matching and into the
serialized bytecode header, so each flag occupies a fixed bit in a 32-bit
word and unused bits are required to be zero.

Two flag families are mutually exclusive and are reconciled by a documented
priority order rather than rejected:

- newline mode: `CRLF > ANYCRLF > ANY > LF > CR`, default [`NewlineMode::Lf`];
- optimization objective: `speed > size`, default speed.
*/

use bitflags::bitflags;

bitflags! {
    /// Pattern compile/run flags.
    ///
    /// ```
    /// use librift::Flags;
    ///
    /// let flags = Flags::EXTENDED | Flags::UTF8;
    /// assert!(flags.contains(Flags::EXTENDED));
    /// assert_eq!(flags.bits() & !Flags::all().bits(), 0);
    /// ```
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Flags: u32 {
        /// Line terminator for `^`/`$` and `.` is `\r`.
        const NEWLINE_CR = 1 << 0;
        /// Line terminator is `\n`.
        const NEWLINE_LF = 1 << 1;
        /// Line terminator is the two-byte sequence `\r\n`.
        const NEWLINE_CRLF = 1 << 2;
        /// Line terminator is `\r`, `\n` or `\r\n`.
        const NEWLINE_ANYCRLF = 1 << 3;
        /// Any of `\r`, `\n`, `\r\n` or vertical tab / form feed.
        const NEWLINE_ANY = 1 << 4;
        /// Unescaped whitespace and `#`-to-end-of-line comments in the
        /// pattern are skipped.
        const EXTENDED = 1 << 5;
        /// The scan loop advances one code point at a time instead of one
        /// byte at a time.
        const UTF8 = 1 << 6;
        /// Enables the `r'…'` / `r"…"` raw-literal pattern envelope.
        const RAW_LITERAL = 1 << 7;
        /// Optimize the compiled form for match speed.
        const OPTIMIZE_SPEED = 1 << 8;
        /// Optimize the compiled form for size.
        const OPTIMIZE_SIZE = 1 << 9;
    }
}

/// The resolved newline-mode family of a flag word.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NewlineMode {
    Cr,
    #[default]
    Lf,
    CrLf,
    AnyCrLf,
    Any,
}

impl NewlineMode {
    /// True if a line terminator ends at byte offset `at` (exclusive), i.e.
    /// `$` in multi-line sense may match at `at` minus the terminator.
    pub(crate) fn is_terminator_at(self, bytes: &[u8], at: usize) -> bool {
        match self {
            NewlineMode::Cr => bytes.get(at) == Some(&b'\r'),
            NewlineMode::Lf => bytes.get(at) == Some(&b'\n'),
            NewlineMode::CrLf => bytes.get(at) == Some(&b'\r') && bytes.get(at + 1) == Some(&b'\n'),
            NewlineMode::AnyCrLf => matches!(bytes.get(at), Some(&b'\r') | Some(&b'\n')),
            NewlineMode::Any => matches!(
                bytes.get(at),
                Some(&b'\r') | Some(&b'\n') | Some(&0x0b) | Some(&0x0c)
            ),
        }
    }

    /// True if a line starts at byte offset `at`, i.e. a terminator ends
    /// immediately before it.
    pub(crate) fn is_line_start(self, bytes: &[u8], at: usize) -> bool {
        if at == 0 {
            return true;
        }
        match self {
            NewlineMode::Cr => bytes[at - 1] == b'\r',
            NewlineMode::Lf => bytes[at - 1] == b'\n',
            NewlineMode::CrLf => at >= 2 && bytes[at - 2] == b'\r' && bytes[at - 1] == b'\n',
            NewlineMode::AnyCrLf => {
                // Do not match between the CR and LF of a CRLF pair.
                matches!(bytes[at - 1], b'\r' | b'\n')
                    && !(bytes[at - 1] == b'\r' && bytes.get(at) == Some(&b'\n'))
            }
            NewlineMode::Any => matches!(bytes[at - 1], b'\r' | b'\n' | 0x0b | 0x0c),
        }
    }

    /// True if `$` in line sense may match at byte offset `at`.
    pub(crate) fn is_line_end(self, bytes: &[u8], at: usize) -> bool {
        if at == bytes.len() {
            return true;
        }
        match self {
            NewlineMode::AnyCrLf | NewlineMode::Any => {
                // Do not match between the CR and LF of a CRLF pair.
                self.is_terminator_at(bytes, at) && !(at > 0 && bytes[at - 1] == b'\r' && bytes[at] == b'\n')
            }
            mode => mode.is_terminator_at(bytes, at),
        }
    }

    /// Characters `.` must not match under this mode.
    pub(crate) fn excluded_chars(self) -> &'static [char] {
        match self {
            NewlineMode::Cr => &['\r'],
            NewlineMode::Lf => &['\n'],
            NewlineMode::CrLf | NewlineMode::AnyCrLf => &['\r', '\n'],
            NewlineMode::Any => &['\r', '\n', '\u{b}', '\u{c}'],
        }
    }
}

/// The resolved optimization-objective family of a flag word.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Objective {
    #[default]
    Speed,
    Size,
}

impl Flags {
    /// Resolves the newline-mode family by priority
    /// `CRLF > ANYCRLF > ANY > LF > CR`.
    pub fn newline_mode(self) -> NewlineMode {
        if self.contains(Flags::NEWLINE_CRLF) {
            NewlineMode::CrLf
        } else if self.contains(Flags::NEWLINE_ANYCRLF) {
            NewlineMode::AnyCrLf
        } else if self.contains(Flags::NEWLINE_ANY) {
            NewlineMode::Any
        } else if self.contains(Flags::NEWLINE_LF) {
            NewlineMode::Lf
        } else if self.contains(Flags::NEWLINE_CR) {
            NewlineMode::Cr
        } else {
            NewlineMode::default()
        }
    }

    /// Resolves the optimization-objective family by priority `speed > size`.
    pub fn objective(self) -> Objective {
        if self.contains(Flags::OPTIMIZE_SPEED) {
            Objective::Speed
        } else if self.contains(Flags::OPTIMIZE_SIZE) {
            Objective::Size
        } else {
            Objective::default()
        }
    }

    /// Reconstructs a flag word from serialized bits, rejecting unknown bits.
    pub(crate) fn from_serialized(bits: u32) -> Option<Flags> {
        Flags::from_bits(bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newline_priority() {
        let f = Flags::NEWLINE_CR | Flags::NEWLINE_ANY | Flags::NEWLINE_CRLF;
        assert_eq!(f.newline_mode(), NewlineMode::CrLf);
        let f = Flags::NEWLINE_CR | Flags::NEWLINE_ANY;
        assert_eq!(f.newline_mode(), NewlineMode::Any);
        assert_eq!(Flags::empty().newline_mode(), NewlineMode::Lf);
    }

    #[test]
    fn objective_priority() {
        let f = Flags::OPTIMIZE_SIZE | Flags::OPTIMIZE_SPEED;
        assert_eq!(f.objective(), Objective::Speed);
        assert_eq!(Flags::OPTIMIZE_SIZE.objective(), Objective::Size);
    }

    #[test]
    fn unknown_bits_rejected() {
        assert!(Flags::from_serialized(1 << 31).is_none());
        assert!(Flags::from_serialized(Flags::UTF8.bits()).is_some());
    }

    #[test]
    fn crlf_line_boundaries() {
        let bytes = b"ab\r\ncd";
        let mode = NewlineMode::CrLf;
        assert!(mode.is_line_start(bytes, 0));
        assert!(!mode.is_line_start(bytes, 3));
        assert!(mode.is_line_start(bytes, 4));
        assert!(mode.is_line_end(bytes, 2));
        assert!(!mode.is_line_end(bytes, 3));
        assert!(mode.is_line_end(bytes, 6));
    }

    #[test]
    fn anycrlf_does_not_split_crlf() {
        let bytes = b"a\r\nb";
        let mode = NewlineMode::AnyCrLf;
        assert!(mode.is_line_end(bytes, 1));
        assert!(!mode.is_line_end(bytes, 2));
        assert!(!mode.is_line_start(bytes, 2));
        assert!(mode.is_line_start(bytes, 3));
    }
}
