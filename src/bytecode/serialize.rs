/*!
The on-disk form of a compiled program.

Header of seven 32-bit fields in the writer's native byte order (magic,
endianness marker, format version, compile flags, instruction count, group
count, pattern byte length), followed by the packed instruction records
(one opcode byte, three zero padding bytes, one 32-bit operand) and the
NUL-terminated pattern string.

Readers compare the endianness marker against its byte-reversed form and
byte-swap every 32-bit field when needed. Unknown magic and
newer-than-supported versions are rejected with `conversion-failed`;
structural faults inside an otherwise well-formed artifact are
`invalid-bytecode`.

The class table is not part of the artifact: the loader recompiles the
embedded pattern under the embedded flags and validates the loaded
instruction stream against the recompiled tables.
*/

use crate::{
    bytecode::{Inst, Opcode, Program},
    error::{Error, Result},
    flags::Flags,
};

pub(crate) const MAGIC: u32 = 0x5249_4654;
pub(crate) const ENDIAN_MARKER: u32 = 0x0102_0304;
pub(crate) const FORMAT_VERSION: u32 = 1;

const HEADER_LEN: usize = 28;
const INST_LEN: usize = 8;

/// The fields read back from a serialized artifact, before validation
/// against a recompile of the embedded pattern.
#[derive(Debug)]
pub(crate) struct RawArtifact {
    pub flags: Flags,
    pub group_count: u32,
    pub insts: Vec<Inst>,
    pub pattern: String,
}

/// Serializes a program in native byte order.
pub(crate) fn write(program: &Program) -> Vec<u8> {
    let pattern = program.pattern().as_bytes();
    let mut out = Vec::with_capacity(
        HEADER_LEN + program.instruction_count() * INST_LEN + pattern.len() + 1,
    );
    for field in [
        MAGIC,
        ENDIAN_MARKER,
        FORMAT_VERSION,
        program.flags().bits(),
        program.instruction_count() as u32,
        program.group_count(),
        pattern.len() as u32,
    ] {
        out.extend_from_slice(&field.to_ne_bytes());
    }
    for inst in program.insts() {
        out.push(inst.opcode as u8);
        out.extend_from_slice(&[0, 0, 0]);
        out.extend_from_slice(&inst.operand.to_ne_bytes());
    }
    out.extend_from_slice(pattern);
    out.push(0);
    out
}

/// Parses an artifact back into its raw fields, handling byte order.
pub(crate) fn read(bytes: &[u8]) -> Result<RawArtifact> {
    if bytes.len() < HEADER_LEN {
        return Err(Error::conversion("artifact shorter than its header"));
    }
    let raw_field = |index: usize| {
        u32::from_ne_bytes(bytes[index * 4..index * 4 + 4].try_into().expect("4 bytes"))
    };
    let swap = match raw_field(1) {
        ENDIAN_MARKER => false,
        marker if marker == ENDIAN_MARKER.swap_bytes() => true,
        _ => return Err(Error::conversion("unrecognized endianness marker")),
    };
    let field = |index: usize| {
        let value = raw_field(index);
        if swap {
            value.swap_bytes()
        } else {
            value
        }
    };
    if field(0) != MAGIC {
        return Err(Error::conversion("unrecognized artifact magic"));
    }
    if field(2) > FORMAT_VERSION {
        return Err(Error::conversion("artifact format version is newer than this reader"));
    }
    let Some(flags) = Flags::from_serialized(field(3)) else {
        return Err(Error::bytecode("unknown flag bits in artifact"));
    };
    let instruction_count = field(4) as usize;
    let group_count = field(5);
    let pattern_length = field(6) as usize;

    let insts_end = HEADER_LEN + instruction_count * INST_LEN;
    // Pattern bytes plus the NUL terminator.
    if bytes.len() < insts_end + pattern_length + 1 {
        return Err(Error::conversion("artifact truncated"));
    }
    let mut insts = Vec::with_capacity(instruction_count);
    for record in bytes[HEADER_LEN..insts_end].chunks_exact(INST_LEN) {
        let Some(opcode) = Opcode::from_u8(record[0]) else {
            return Err(Error::bytecode("unknown opcode in artifact"));
        };
        if record[1..4] != [0, 0, 0] {
            return Err(Error::bytecode("nonzero padding in instruction record"));
        }
        let mut operand = u32::from_ne_bytes(record[4..8].try_into().expect("4 bytes"));
        if swap {
            operand = operand.swap_bytes();
        }
        insts.push(Inst::new(opcode, operand));
    }
    let pattern_bytes = &bytes[insts_end..insts_end + pattern_length];
    if bytes[insts_end + pattern_length] != 0 {
        return Err(Error::bytecode("pattern string is not NUL-terminated"));
    }
    let pattern = String::from_utf8(pattern_bytes.to_vec())
        .map_err(|_| Error::bytecode("pattern string is not valid UTF-8"))?;
    Ok(RawArtifact {
        flags,
        group_count,
        insts,
        pattern,
    })
}
