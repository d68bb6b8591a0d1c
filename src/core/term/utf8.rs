//! UTF-8 boundary detection for streamed pty output

/// Length of a truncated multi-byte code point at the end of `bytes`.
///
/// Returns 0 when the buffer ends on a code point boundary or when the
/// trailing bytes are invalid anyway (the decoder will substitute them).
pub fn incomplete_tail_len(bytes: &[u8]) -> usize {
    let start = bytes.len().saturating_sub(3);

    for i in (start..bytes.len()).rev() {
        let b = bytes[i];
        if b & 0xC0 == 0x80 {
            // Continuation byte, keep looking for the lead
            continue;
        }

        let expected = match b {
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => return 0,
        };
        let present = bytes.len() - i;
        return if expected > present { present } else { 0 };
    }

    0
}
