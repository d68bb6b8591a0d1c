//! Display width classification
//!
//! Only combining marks are treated specially: they share the column of the
//! character before them. Everything else consumes one column.

/// Code point ranges that merge with the preceding column.
const COMBINING_RANGES: [(u32, u32); 4] = [
    (0x0300, 0x036F), // Combining Diacritical Marks
    (0x1DC0, 0x1DFF), // Combining Diacritical Marks Supplement
    (0x20D0, 0x20FF), // Combining Diacritical Marks for Symbols
    (0xFE20, 0xFE2F), // Combining Half Marks
];

/// Returns true if `ch` occupies zero display columns.
pub fn is_combining(ch: char) -> bool {
    let cp = ch as u32;
    COMBINING_RANGES
        .iter()
        .any(|&(start, end)| (start..=end).contains(&cp))
}

/// Number of columns the cursor advances after printing `ch`.
pub fn advance(ch: char) -> u16 {
    if is_combining(ch) {
        0
    } else {
        1
    }
}
