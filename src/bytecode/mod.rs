/*!
The flat bytecode form of a compiled pattern.

An instruction is one opcode byte plus one 32-bit operand, interpreted per
opcode: a character, a jump target, a group index, a class-table index, a
boundary kind, or a packed `{min, max, greedy}` triple. The containing
[`Program`] carries the class table, the group count, the compile flags and
the original pattern, and validates every instruction before it can run.
*/

use crate::{
    error::{Error, Result},
    flags::Flags,
    syntax::ClassSet,
};

pub(crate) mod compile;
pub(crate) mod serialize;

/// The closed instruction set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Nop = 0,
    /// Consume the character in the operand.
    MatchChar = 1,
    /// Consume one character of the class-table entry in the operand.
    MatchClass = 2,
    /// Consume any character.
    MatchAny = 3,
    /// Continue at the operand.
    Jump = 4,
    /// Fork: the preferred path falls through, the alternative branches to
    /// the operand.
    Split = 5,
    /// Record the current position as the start of the group in the
    /// operand.
    SaveStart = 6,
    /// Record the current position as the end of the group in the operand.
    SaveEnd = 7,
    /// Begin a counted repeat; the operand packs `{min, max, greedy}`.
    RepeatStart = 8,
    /// Close a counted repeat; the operand points back at its
    /// `RepeatStart`.
    RepeatEnd = 9,
    /// Zero-width assertion; the operand selects the [`BoundaryKind`].
    Boundary = 10,
    /// Match the text captured by the group in the operand. A group that
    /// has not captured yet matches the empty string.
    Backref = 11,
    /// Zero-width sub-match: the body is the instructions between here and
    /// the operand (exclusive), terminated by `Accept`; on success,
    /// continue at the operand.
    Lookahead = 12,
    /// As [`Opcode::Lookahead`], succeeding when the body does not match.
    NegLookahead = 13,
    /// Report a match at the current position.
    Accept = 14,
    /// Kill the current path.
    Fail = 15,
}

impl Opcode {
    pub(crate) fn from_u8(byte: u8) -> Option<Opcode> {
        Some(match byte {
            0 => Opcode::Nop,
            1 => Opcode::MatchChar,
            2 => Opcode::MatchClass,
            3 => Opcode::MatchAny,
            4 => Opcode::Jump,
            5 => Opcode::Split,
            6 => Opcode::SaveStart,
            7 => Opcode::SaveEnd,
            8 => Opcode::RepeatStart,
            9 => Opcode::RepeatEnd,
            10 => Opcode::Boundary,
            11 => Opcode::Backref,
            12 => Opcode::Lookahead,
            13 => Opcode::NegLookahead,
            14 => Opcode::Accept,
            15 => Opcode::Fail,
            _ => return None,
        })
    }
}

/// Boundary-assertion kinds carried in a [`Opcode::Boundary`] operand.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum BoundaryKind {
    WordBoundary = 0,
    NotWordBoundary = 1,
    TextStart = 2,
    TextEnd = 3,
    LineStart = 4,
    LineEnd = 5,
}

impl BoundaryKind {
    pub(crate) fn from_u32(operand: u32) -> Option<BoundaryKind> {
        Some(match operand {
            0 => BoundaryKind::WordBoundary,
            1 => BoundaryKind::NotWordBoundary,
            2 => BoundaryKind::TextStart,
            3 => BoundaryKind::TextEnd,
            4 => BoundaryKind::LineStart,
            5 => BoundaryKind::LineEnd,
            _ => return None,
        })
    }
}

/// Sentinel in the packed repeat operand for "no upper bound".
pub(crate) const REPEAT_UNBOUNDED: u32 = 0xfff;
/// Largest representable finite repeat bound.
pub(crate) const MAX_COUNTED_REPEAT: u32 = REPEAT_UNBOUNDED - 1;

/// Packs a repeat triple: bits 0–11 minimum, bits 12–23 maximum (or the
/// unbounded sentinel), bit 24 greediness.
pub(crate) fn pack_repeat(min: u32, max: Option<u32>, greedy: bool) -> u32 {
    debug_assert!(min <= MAX_COUNTED_REPEAT);
    debug_assert!(max.map_or(true, |m| m <= MAX_COUNTED_REPEAT));
    min | (max.unwrap_or(REPEAT_UNBOUNDED) << 12) | (u32::from(greedy) << 24)
}

pub(crate) fn unpack_repeat(operand: u32) -> (u32, Option<u32>, bool) {
    let min = operand & 0xfff;
    let max = (operand >> 12) & 0xfff;
    let greedy = operand & (1 << 24) != 0;
    (
        min,
        (max != REPEAT_UNBOUNDED).then_some(max),
        greedy,
    )
}

/// One instruction: opcode plus 32-bit operand.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Inst {
    pub opcode: Opcode,
    pub operand: u32,
}

impl Inst {
    pub(crate) fn new(opcode: Opcode, operand: u32) -> Inst {
        Inst { opcode, operand }
    }
}

/// A validated bytecode program with its metadata.
#[derive(Clone, Debug)]
pub struct Program {
    insts: Vec<Inst>,
    classes: Vec<ClassSet>,
    group_count: u32,
    flags: Flags,
    pattern: String,
    /// Per-instruction repeat-counter slot; `u32::MAX` for instructions
    /// that are not `RepeatStart`.
    repeat_slots: Vec<u32>,
    repeat_count: u32,
    /// Per-instruction loop-mark slot for backward jumps; `u32::MAX`
    /// elsewhere. The VM uses these to cut loop iterations that consume no
    /// input.
    loop_slots: Vec<u32>,
    loop_count: u32,
    /// True when the program contains instructions the set-based engine
    /// cannot run (backreferences, look-ahead, counted repeats).
    needs_backtrack: bool,
}

impl Program {
    pub(crate) fn new(
        insts: Vec<Inst>,
        classes: Vec<ClassSet>,
        group_count: u32,
        flags: Flags,
        pattern: String,
    ) -> Result<Program> {
        validate(&insts, classes.len(), group_count)?;
        let mut program = Program {
            insts,
            classes,
            group_count,
            flags,
            pattern,
            repeat_slots: Vec::new(),
            repeat_count: 0,
            loop_slots: Vec::new(),
            loop_count: 0,
            needs_backtrack: false,
        };
        program.analyze();
        Ok(program)
    }

    fn analyze(&mut self) {
        self.repeat_slots = vec![u32::MAX; self.insts.len()];
        self.loop_slots = vec![u32::MAX; self.insts.len()];
        let mut next_repeat = 0;
        let mut next_loop = 0;
        for (pc, inst) in self.insts.iter().enumerate() {
            match inst.opcode {
                Opcode::RepeatStart => {
                    self.repeat_slots[pc] = next_repeat;
                    next_repeat += 1;
                }
                Opcode::Jump if (inst.operand as usize) <= pc => {
                    self.loop_slots[pc] = next_loop;
                    next_loop += 1;
                }
                Opcode::Backref | Opcode::Lookahead | Opcode::NegLookahead => {
                    self.needs_backtrack = true;
                }
                _ => {}
            }
        }
        self.repeat_count = next_repeat;
        self.loop_count = next_loop;
        if next_repeat > 0 {
            self.needs_backtrack = true;
        }
    }

    pub fn instruction_count(&self) -> usize {
        self.insts.len()
    }

    pub fn group_count(&self) -> u32 {
        self.group_count
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub(crate) fn insts(&self) -> &[Inst] {
        &self.insts
    }

    pub(crate) fn classes(&self) -> &[ClassSet] {
        &self.classes
    }

    pub(crate) fn class(&self, index: u32) -> &ClassSet {
        &self.classes[index as usize]
    }

    pub(crate) fn repeat_slot(&self, pc: u32) -> u32 {
        self.repeat_slots[pc as usize]
    }

    pub(crate) fn repeat_count(&self) -> u32 {
        self.repeat_count
    }

    pub(crate) fn loop_slot(&self, pc: u32) -> u32 {
        self.loop_slots[pc as usize]
    }

    pub(crate) fn loop_count(&self) -> u32 {
        self.loop_count
    }

    pub(crate) fn needs_backtrack(&self) -> bool {
        self.needs_backtrack
    }

    /// Capture slots including the implicit group 0, two per group.
    pub(crate) fn slot_count(&self) -> usize {
        2 * (self.group_count as usize + 1)
    }

    /// Control-flow edges, the program analogue of automaton transitions;
    /// feeds the complexity estimator.
    pub(crate) fn edge_count(&self) -> usize {
        self.insts
            .iter()
            .map(|inst| match inst.opcode {
                Opcode::Accept | Opcode::Fail => 0,
                Opcode::Split
                | Opcode::RepeatEnd
                | Opcode::Lookahead
                | Opcode::NegLookahead => 2,
                _ => 1,
            })
            .sum()
    }
}

/// Structural validation shared by the compilers and the deserializer:
/// every target in range, every group index within the group count, every
/// class index within the table, repeat scaffolding well-formed.
pub(crate) fn validate(insts: &[Inst], class_count: usize, group_count: u32) -> Result<()> {
    let len = insts.len();
    if len == 0 {
        return Err(Error::bytecode("program has no instructions"));
    }
    for (pc, inst) in insts.iter().enumerate() {
        let operand = inst.operand;
        match inst.opcode {
            Opcode::Nop | Opcode::MatchAny | Opcode::Accept | Opcode::Fail => {}
            Opcode::MatchChar => {
                if char::from_u32(operand).is_none() {
                    return Err(Error::bytecode("character operand is not a scalar value"));
                }
            }
            Opcode::MatchClass => {
                if operand as usize >= class_count {
                    return Err(Error::bytecode("class index out of range"));
                }
            }
            Opcode::Jump | Opcode::Split => {
                if operand as usize >= len {
                    return Err(Error::bytecode("jump target out of range"));
                }
            }
            Opcode::Lookahead | Opcode::NegLookahead => {
                if operand as usize >= len || operand as usize <= pc + 1 {
                    return Err(Error::bytecode("look-around continuation out of range"));
                }
            }
            Opcode::SaveStart | Opcode::SaveEnd => {
                // Group 0 is the implicit whole match.
                if operand > group_count {
                    return Err(Error::bytecode("capture group index out of range"));
                }
            }
            Opcode::Backref => {
                if operand == 0 || operand > group_count {
                    return Err(Error::bytecode("backreference group out of range"));
                }
            }
            Opcode::Boundary => {
                if BoundaryKind::from_u32(operand).is_none() {
                    return Err(Error::bytecode("unknown boundary kind"));
                }
            }
            Opcode::RepeatStart => {
                let (min, max, _) = unpack_repeat(operand);
                if let Some(max) = max {
                    if min > max {
                        return Err(Error::bytecode("repeat minimum exceeds maximum"));
                    }
                }
            }
            Opcode::RepeatEnd => {
                if operand as usize >= pc
                    || insts[operand as usize].opcode != Opcode::RepeatStart
                {
                    return Err(Error::bytecode("repeat end does not close a repeat start"));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inst(opcode: Opcode, operand: u32) -> Inst {
        Inst::new(opcode, operand)
    }

    #[test]
    fn repeat_packing_roundtrip() {
        for (min, max, greedy) in [
            (0, None, true),
            (1, Some(1), false),
            (7, Some(4000), true),
            (MAX_COUNTED_REPEAT, None, false),
        ] {
            assert_eq!(unpack_repeat(pack_repeat(min, max, greedy)), (min, max, greedy));
        }
    }

    #[test]
    fn opcode_byte_roundtrip() {
        for byte in 0..=15u8 {
            let opcode = Opcode::from_u8(byte).unwrap();
            assert_eq!(opcode as u8, byte);
        }
        assert_eq!(Opcode::from_u8(16), None);
    }

    #[test]
    fn validation_rejects_bad_targets() {
        let bad = vec![inst(Opcode::Jump, 9), inst(Opcode::Accept, 0)];
        assert!(validate(&bad, 0, 0).is_err());

        let bad = vec![inst(Opcode::MatchClass, 0), inst(Opcode::Accept, 0)];
        assert!(validate(&bad, 0, 0).is_err());

        let bad = vec![inst(Opcode::Backref, 2), inst(Opcode::Accept, 0)];
        assert!(validate(&bad, 0, 1).is_err());

        let good = vec![
            inst(Opcode::Split, 1),
            inst(Opcode::MatchChar, 'a' as u32),
            inst(Opcode::Accept, 0),
        ];
        assert!(validate(&good, 0, 0).is_ok());
    }

    #[test]
    fn program_analysis() {
        let insts = vec![
            inst(Opcode::RepeatStart, pack_repeat(1, Some(3), true)),
            inst(Opcode::MatchChar, 'a' as u32),
            inst(Opcode::RepeatEnd, 0),
            inst(Opcode::Accept, 0),
        ];
        let program = Program::new(
            insts,
            Vec::new(),
            0,
            Flags::empty(),
            "a{1,3}".to_string(),
        )
        .unwrap();
        assert!(program.needs_backtrack());
        assert_eq!(program.repeat_count(), 1);
        assert_eq!(program.repeat_slot(0), 0);
    }
}
