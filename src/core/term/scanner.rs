//! Escape sequence scanner
//!
//! Finds the extent of one escape sequence in a byte buffer and classifies
//! it. The scanner never interprets parameters beyond what the renderer
//! needs; it only decides where a sequence ends and what family it is.

const ESC: u8 = 0x1B;
const BEL: u8 = 0x07;

/// Classification of a complete escape sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscapeKind {
    /// CSI ... H
    CursorPosition,
    /// CSI ... A
    CursorUp,
    /// CSI ... B
    CursorDown,
    /// CSI ... C
    CursorForward,
    /// CSI ... D
    CursorBack,
    /// CSI ... m
    Sgr,
    /// ESC ] ...
    Osc,
    /// Anything else, forwarded as-is when terminated
    Other,
}

/// One complete escape sequence borrowed from the scanned buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscapeToken<'a> {
    pub kind: EscapeKind,
    pub bytes: &'a [u8],
}

/// Result of scanning at an escape introducer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scan<'a> {
    Complete(EscapeToken<'a>),
    /// The buffer ended before the sequence did
    Incomplete,
}

impl<'a> EscapeToken<'a> {
    fn new(kind: EscapeKind, bytes: &'a [u8]) -> Self {
        Self { kind, bytes }
    }

    /// Byte length of the sequence
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the sequence ended on a byte that legitimately closes it.
    ///
    /// A CSI interrupted by a control byte is reported as a complete `Other`
    /// token that fails this check.
    pub fn is_terminated(&self) -> bool {
        match self.bytes {
            [ESC, b'[', .., last] => (0x40..=0x7E).contains(last),
            [ESC, b']', ..] => true,
            [ESC, .., last] => (0x30..=0x7E).contains(last),
            _ => false,
        }
    }

    /// Numeric CSI parameters.
    ///
    /// Returns `Some(vec![])` for a bare sequence such as `ESC [ H` and
    /// `None` when any field is empty or not a plain decimal number (private
    /// markers like `?` included).
    pub fn params(&self) -> Option<Vec<u32>> {
        let body = match self.bytes {
            [ESC, b'[', body @ .., _] => body,
            _ => return None,
        };
        if body.is_empty() {
            return Some(Vec::new());
        }

        body.split(|&b| b == b';')
            .map(|field| {
                if field.is_empty() || !field.iter().all(u8::is_ascii_digit) {
                    return None;
                }
                field
                    .iter()
                    .try_fold(0u32, |acc, &d| acc.checked_mul(10)?.checked_add(u32::from(d - b'0')))
            })
            .collect()
    }

    /// Repeat count for relative cursor motion: first parameter, at least 1.
    pub fn count(&self) -> u16 {
        let n = self
            .params()
            .and_then(|p| p.first().copied())
            .unwrap_or(1)
            .max(1);
        u16::try_from(n).unwrap_or(u16::MAX)
    }
}

/// Scan one escape sequence starting at `offset`.
///
/// `buf[offset]` must be `ESC`. Returns the shortest complete span, or
/// `Scan::Incomplete` if `buf` ends before a terminator.
pub fn scan(buf: &[u8], offset: usize) -> Scan<'_> {
    debug_assert_eq!(buf.get(offset), Some(&ESC));
    let rest = &buf[offset..];

    match rest.get(1) {
        None => Scan::Incomplete,
        Some(b'[') => scan_csi(rest),
        Some(b']') => scan_osc(rest),
        // ESC followed by a control or non-ASCII byte: the lone ESC is discarded
        Some(&b) if !(0x20..0x7F).contains(&b) => {
            Scan::Complete(EscapeToken::new(EscapeKind::Other, &rest[..1]))
        }
        Some(_) => scan_escape(rest),
    }
}

fn scan_csi(rest: &[u8]) -> Scan<'_> {
    for (i, &b) in rest.iter().enumerate().skip(2) {
        match b {
            0x20..=0x3F => continue,
            0x40..=0x7E => {
                let kind = match b {
                    b'H' => EscapeKind::CursorPosition,
                    b'A' => EscapeKind::CursorUp,
                    b'B' => EscapeKind::CursorDown,
                    b'C' => EscapeKind::CursorForward,
                    b'D' => EscapeKind::CursorBack,
                    b'm' => EscapeKind::Sgr,
                    _ => EscapeKind::Other,
                };
                return Scan::Complete(EscapeToken::new(kind, &rest[..=i]));
            }
            _ => return Scan::Complete(EscapeToken::new(EscapeKind::Other, &rest[..i])),
        }
    }
    Scan::Incomplete
}

fn scan_osc(rest: &[u8]) -> Scan<'_> {
    match rest.get(2) {
        None => return Scan::Incomplete,
        // Linux console palette: ESC ] P n rr gg bb
        Some(b'P') => {
            for i in 3..10 {
                match rest.get(i) {
                    None => return Scan::Incomplete,
                    Some(b) if !b.is_ascii_graphic() => {
                        return Scan::Complete(EscapeToken::new(EscapeKind::Osc, &rest[..i]));
                    }
                    Some(_) => {}
                }
            }
            return Scan::Complete(EscapeToken::new(EscapeKind::Osc, &rest[..10]));
        }
        // Linux console palette reset
        Some(b'R') => return Scan::Complete(EscapeToken::new(EscapeKind::Osc, &rest[..3])),
        Some(_) => {}
    }

    let mut i = 2;
    while i < rest.len() {
        match rest[i] {
            BEL => return Scan::Complete(EscapeToken::new(EscapeKind::Osc, &rest[..=i])),
            ESC => {
                return match rest.get(i + 1) {
                    None => Scan::Incomplete,
                    Some(b'\\') => Scan::Complete(EscapeToken::new(EscapeKind::Osc, &rest[..i + 2])),
                    // A new sequence started, the OSC ends before it
                    Some(_) => Scan::Complete(EscapeToken::new(EscapeKind::Osc, &rest[..i])),
                };
            }
            _ => i += 1,
        }
    }
    Scan::Incomplete
}

/// ESC, optional intermediates, one final byte (`ESC 7`, `ESC ( B`)
fn scan_escape(rest: &[u8]) -> Scan<'_> {
    for (i, &b) in rest.iter().enumerate().skip(1) {
        match b {
            0x20..=0x2F => continue,
            0x30..=0x7E => return Scan::Complete(EscapeToken::new(EscapeKind::Other, &rest[..=i])),
            _ => return Scan::Complete(EscapeToken::new(EscapeKind::Other, &rest[..i])),
        }
    }
    Scan::Incomplete
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete(buf: &[u8]) -> EscapeToken<'_> {
        match scan(buf, 0) {
            Scan::Complete(token) => token,
            Scan::Incomplete => panic!("expected complete sequence in {:?}", buf),
        }
    }

    #[test]
    fn test_csi_classification() {
        assert_eq!(complete(b"\x1b[10;20H").kind, EscapeKind::CursorPosition);
        assert_eq!(complete(b"\x1b[A").kind, EscapeKind::CursorUp);
        assert_eq!(complete(b"\x1b[3B").kind, EscapeKind::CursorDown);
        assert_eq!(complete(b"\x1b[C").kind, EscapeKind::CursorForward);
        assert_eq!(complete(b"\x1b[2D").kind, EscapeKind::CursorBack);
        assert_eq!(complete(b"\x1b[1;31m").kind, EscapeKind::Sgr);
        assert_eq!(complete(b"\x1b[2J").kind, EscapeKind::Other);
        assert_eq!(complete(b"\x1b[15~").kind, EscapeKind::Other);
        assert_eq!(complete(b"\x1b[?2004h").kind, EscapeKind::Other);
    }

    #[test]
    fn test_shortest_span() {
        let token = complete(b"\x1b[31mhello");
        assert_eq!(token.bytes, b"\x1b[31m");
        assert_eq!(token.len(), 5);
    }

    #[test]
    fn test_scan_at_offset() {
        let buf = b"ab\x1b[Kcd";
        match scan(buf, 2) {
            Scan::Complete(token) => assert_eq!(token.bytes, b"\x1b[K"),
            Scan::Incomplete => panic!("expected complete"),
        }
    }

    #[test]
    fn test_incomplete_sequences() {
        assert_eq!(scan(b"\x1b", 0), Scan::Incomplete);
        assert_eq!(scan(b"\x1b[", 0), Scan::Incomplete);
        assert_eq!(scan(b"\x1b[31", 0), Scan::Incomplete);
        assert_eq!(scan(b"\x1b]0;title", 0), Scan::Incomplete);
        assert_eq!(scan(b"\x1b]0;title\x1b", 0), Scan::Incomplete);
        assert_eq!(scan(b"\x1b]P12345", 0), Scan::Incomplete);
        assert_eq!(scan(b"\x1b(", 0), Scan::Incomplete);
    }

    #[test]
    fn test_osc_terminators() {
        let token = complete(b"\x1b]0;my title\x07rest");
        assert_eq!(token.kind, EscapeKind::Osc);
        assert_eq!(token.bytes, b"\x1b]0;my title\x07");

        let token = complete(b"\x1b]8;;http://x\x1b\\link");
        assert_eq!(token.bytes, b"\x1b]8;;http://x\x1b\\");

        let token = complete(b"\x1b]P0aabbccX");
        assert_eq!(token.bytes, b"\x1b]P0aabbcc");

        let token = complete(b"\x1b]Rx");
        assert_eq!(token.bytes, b"\x1b]R");
    }

    #[test]
    fn test_osc_abandoned_by_new_escape() {
        let token = complete(b"\x1b]0;abc\x1b[m");
        assert_eq!(token.kind, EscapeKind::Osc);
        assert_eq!(token.bytes, b"\x1b]0;abc");
    }

    #[test]
    fn test_two_byte_and_intermediate_forms() {
        let token = complete(b"\x1b7abc");
        assert_eq!(token.kind, EscapeKind::Other);
        assert_eq!(token.bytes, b"\x1b7");
        assert!(token.is_terminated());

        let token = complete(b"\x1b(B");
        assert_eq!(token.bytes, b"\x1b(B");
        assert!(token.is_terminated());
    }

    #[test]
    fn test_malformed_csi_is_not_terminated() {
        let token = complete(b"\x1b[12\nabc");
        assert_eq!(token.kind, EscapeKind::Other);
        assert_eq!(token.bytes, b"\x1b[12");
        assert!(!token.is_terminated());

        let token = complete(b"\x1b\x1b[m");
        assert_eq!(token.bytes, b"\x1b");
        assert!(!token.is_terminated());

        let token = complete("\x1b(é".as_bytes());
        assert_eq!(token.bytes, b"\x1b(");
        assert!(!token.is_terminated());
    }

    #[test]
    fn test_params() {
        assert_eq!(complete(b"\x1b[H").params(), Some(vec![]));
        assert_eq!(complete(b"\x1b[10;20H").params(), Some(vec![10, 20]));
        assert_eq!(complete(b"\x1b[;5H").params(), None);
        assert_eq!(complete(b"\x1b[?25h").params(), None);
        assert_eq!(complete(b"\x1b]0;x\x07").params(), None);
    }

    #[test]
    fn test_count_defaults_to_one() {
        assert_eq!(complete(b"\x1b[A").count(), 1);
        assert_eq!(complete(b"\x1b[0A").count(), 1);
        assert_eq!(complete(b"\x1b[7C").count(), 7);
        assert_eq!(complete(b"\x1b[99999999D").count(), u16::MAX);
    }
}
