//! Screen renderer
//!
//! Rewrites a pane's raw pty output so it draws inside the pane's rectangle
//! of the real terminal. Coordinate-bearing escape sequences are translated,
//! attributes are forwarded untouched, and anything that cannot be processed
//! yet (a split code point or escape sequence) is held back until the next
//! chunk arrives.

use std::io::Write;

use super::scanner::{scan, EscapeKind, EscapeToken, Scan};
use super::utf8::incomplete_tail_len;
use super::width;

const ESC: u8 = 0x1B;

/// Destructive backspace inside a rectangle: left, blank, left
const ERASE_LEFT: &str = "\x1b[D \x1b[D";

/// A rectangle of the real terminal.
///
/// `left`/`top` are 1-based real-terminal coordinates of the top-left cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub left: u16,
    pub top: u16,
    pub width: u16,
    pub height: u16,
}

impl Rect {
    pub const fn new(left: u16, top: u16, width: u16, height: u16) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }
}

/// Per-pane output translator
#[derive(Debug)]
pub struct ScreenRenderer {
    rect: Rect,
    /// Cursor column, relative to `rect`
    x: u16,
    /// Cursor row, relative to `rect`
    y: u16,
    /// Bytes held back from the previous chunk
    pending: Vec<u8>,
}

impl ScreenRenderer {
    pub fn new(rect: Rect) -> Self {
        Self {
            rect,
            x: 0,
            y: 0,
            pending: Vec::new(),
        }
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    /// Relative cursor position as `(x, y)`
    pub fn cursor(&self) -> (u16, u16) {
        (self.x, self.y)
    }

    /// Bytes waiting for the rest of a code point or escape sequence
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    /// Translate one chunk of pty output into real-terminal output.
    pub fn render(&mut self, input: &[u8]) -> Vec<u8> {
        let mut buf = std::mem::take(&mut self.pending);
        buf.extend_from_slice(input);

        let split = buf.len() - incomplete_tail_len(&buf);
        let utf8_tail = buf.split_off(split);

        let text = normalize(&String::from_utf8_lossy(&buf));
        let mut out = Vec::with_capacity(text.len() + 16);

        if !text.is_empty() {
            self.position(&mut out);
            let held = self.scan_text(&text, &mut out);
            self.pending.extend_from_slice(held);
        }
        self.pending.extend_from_slice(&utf8_tail);

        out
    }

    /// Walk the normalized text, returning the unprocessed remainder.
    fn scan_text<'t>(&mut self, text: &'t str, out: &mut Vec<u8>) -> &'t [u8] {
        let bytes = text.as_bytes();
        let mut i = 0;

        while i < bytes.len() {
            match bytes[i] {
                b'\n' => {
                    self.x = 0;
                    self.set_row(u32::from(self.y) + 1);
                    self.position(out);
                    i += 1;
                }
                ESC => match scan(bytes, i) {
                    Scan::Incomplete => return &bytes[i..],
                    Scan::Complete(token) => {
                        self.apply(token, out);
                        i += token.len();
                    }
                },
                // BEL, CR and the remaining C0 controls
                b if b < 0x20 => i += 1,
                _ => {
                    let Some(ch) = text[i..].chars().next() else {
                        break;
                    };
                    let len = ch.len_utf8();
                    out.extend_from_slice(&bytes[i..i + len]);
                    self.advance(width::advance(ch), out);
                    i += len;
                }
            }
        }

        &[]
    }

    fn apply(&mut self, token: EscapeToken<'_>, out: &mut Vec<u8>) {
        match token.kind {
            EscapeKind::CursorPosition => match token.params().as_deref() {
                Some([]) => {
                    self.x = 0;
                    self.y = 0;
                    self.position(out);
                }
                Some(&[row, col]) => {
                    self.set_row(row.saturating_sub(1));
                    self.set_col(col.saturating_sub(1));
                    self.position(out);
                }
                // Other forms are not remapped
                _ => out.extend_from_slice(token.bytes),
            },
            EscapeKind::CursorUp => {
                self.y = self.y.saturating_sub(token.count());
                self.position(out);
            }
            EscapeKind::CursorDown => {
                self.set_row(u32::from(self.y) + u32::from(token.count()));
                self.position(out);
            }
            EscapeKind::CursorForward => {
                let limit = self.rect.width.saturating_sub(2);
                self.x = self.x.saturating_add(token.count()).min(limit);
                self.position(out);
            }
            EscapeKind::CursorBack => {
                self.x = self.x.saturating_sub(token.count());
                self.position(out);
            }
            EscapeKind::Sgr => out.extend_from_slice(token.bytes),
            EscapeKind::Osc => {
                tracing::trace!("dropping OSC sequence ({} bytes)", token.len());
            }
            EscapeKind::Other => {
                if token.is_terminated() {
                    out.extend_from_slice(token.bytes);
                } else {
                    tracing::trace!("dropping malformed escape {:?}", token.bytes);
                }
            }
        }
    }

    fn advance(&mut self, columns: u16, out: &mut Vec<u8>) {
        if columns == 0 {
            return;
        }
        self.x = self.x.saturating_add(columns);
        if self.x >= self.rect.width {
            self.x = 0;
            self.set_row(u32::from(self.y) + 1);
            self.position(out);
        }
    }

    /// Rows past the bottom edge stick to the last row.
    fn set_row(&mut self, row: u32) {
        let last = u32::from(self.rect.height.saturating_sub(1));
        self.y = u16::try_from(row.min(last)).unwrap_or(0);
    }

    fn set_col(&mut self, col: u32) {
        let last = u32::from(self.rect.width.saturating_sub(1));
        self.x = u16::try_from(col.min(last)).unwrap_or(0);
    }

    /// Emit an absolute cursor move to the current cell in real coordinates.
    fn position(&self, out: &mut Vec<u8>) {
        let row = u32::from(self.rect.top) + u32::from(self.y);
        let col = u32::from(self.rect.left) + u32::from(self.x);
        // Writing into a Vec cannot fail
        let _ = write!(out, "\x1b[{};{}H", row, col);
    }
}

/// DEL becomes BS, and every BS becomes a destructive erase.
fn normalize(text: &str) -> String {
    if !text.contains(|c: char| c == '\x7f' || c == '\x08') {
        return text.to_string();
    }
    text.replace('\x7f', "\x08").replace('\x08', ERASE_LEFT)
}
