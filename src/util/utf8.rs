/*!
Byte-level UTF-8 decoding.

The matching runtime works on raw bytes so that the scan loop can start an
attempt at any byte offset (the UTF-8 flag only changes scan granularity).
Decoding therefore has to tolerate mid-character offsets: an invalid or
truncated sequence decodes as its single lead byte.
*/

/// Decodes the character starting at `at`, returning it with its width in
/// bytes. `None` at end of input.
pub(crate) fn decode(bytes: &[u8], at: usize) -> Option<(char, usize)> {
    let b0 = *bytes.get(at)?;
    if b0 < 0x80 {
        return Some((b0 as char, 1));
    }
    let width = match b0 {
        0xc2..=0xdf => 2,
        0xe0..=0xef => 3,
        0xf0..=0xf4 => 4,
        _ => return Some((b0 as char, 1)),
    };
    if at + width > bytes.len() {
        return Some((b0 as char, 1));
    }
    let mut cp = u32::from(b0 & (0x7f >> width));
    for &b in &bytes[at + 1..at + width] {
        if b & 0xc0 != 0x80 {
            return Some((b0 as char, 1));
        }
        cp = (cp << 6) | u32::from(b & 0x3f);
    }
    match char::from_u32(cp) {
        Some(c) if c.len_utf8() == width => Some((c, width)),
        _ => Some((b0 as char, 1)),
    }
}

/// Decodes the character ending at `at` (exclusive). `None` at offset zero.
pub(crate) fn decode_back(bytes: &[u8], at: usize) -> Option<(char, usize)> {
    if at == 0 {
        return None;
    }
    // Back up over at most three continuation bytes to a lead byte.
    let mut start = at - 1;
    for _ in 0..3 {
        if bytes[start] & 0xc0 != 0x80 || start == 0 {
            break;
        }
        start -= 1;
    }
    match decode(bytes, start) {
        Some((c, width)) if start + width == at => Some((c, width)),
        _ => Some((bytes[at - 1] as char, 1)),
    }
}

/// Word characters for `\b`, `\B` and `\w`: ASCII alphanumerics plus `_`.
pub(crate) fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_and_multibyte() {
        let s = "aé€".as_bytes();
        assert_eq!(decode(s, 0), Some(('a', 1)));
        assert_eq!(decode(s, 1), Some(('é', 2)));
        assert_eq!(decode(s, 3), Some(('€', 3)));
        assert_eq!(decode(s, 6), None);
    }

    #[test]
    fn mid_character_offset_decodes_single_byte() {
        let s = "é".as_bytes();
        let (c, width) = decode(s, 1).unwrap();
        assert_eq!(width, 1);
        assert_eq!(c as u32, u32::from(s[1]));
    }

    #[test]
    fn backward_decode() {
        let s = "xé".as_bytes();
        assert_eq!(decode_back(s, 3), Some(('é', 2)));
        assert_eq!(decode_back(s, 1), Some(('x', 1)));
        assert_eq!(decode_back(s, 0), None);
    }
}
