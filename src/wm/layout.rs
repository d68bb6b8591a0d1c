//! Layout - Initial tiling of the real terminal into pane rectangles

use serde::{Deserialize, Serialize};

use crate::core::term::Rect;

/// Maximum panes for the even layouts
pub const MAX_PANES: u16 = 9;

/// Layout preset types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutKind {
    /// One pane covering the whole terminal
    Single,
    /// Four equal quadrants
    #[default]
    Quad,
    /// Panes side by side
    Columns,
    /// Panes stacked top to bottom
    Rows,
}

/// Split `total` cells into `parts` runs differing by at most one cell.
///
/// Returns `(offset, length)` pairs with 0-based offsets.
fn even_runs(total: u16, parts: u16) -> Vec<(u16, u16)> {
    let parts = parts.max(1);
    let base = total / parts;
    let extra = total % parts;

    let mut offset = 0;
    (0..parts)
        .map(|i| {
            let len = base + u16::from(i < extra);
            let run = (offset, len);
            offset += len;
            run
        })
        .collect()
}

/// Compute pane rectangles for a `rows` x `cols` terminal.
///
/// Rectangles are returned in tiling order (left to right, top to bottom)
/// and never include an empty one.
pub fn tile(kind: LayoutKind, rows: u16, cols: u16, panes: u16) -> Vec<Rect> {
    let panes = panes.clamp(1, MAX_PANES);

    let (row_runs, col_runs) = match kind {
        LayoutKind::Single => (even_runs(rows, 1), even_runs(cols, 1)),
        LayoutKind::Quad => (even_runs(rows, 2), even_runs(cols, 2)),
        LayoutKind::Columns => (even_runs(rows, 1), even_runs(cols, panes)),
        LayoutKind::Rows => (even_runs(rows, panes), even_runs(cols, 1)),
    };

    let mut rects = Vec::with_capacity(row_runs.len() * col_runs.len());
    for &(top, height) in &row_runs {
        for &(left, width) in &col_runs {
            if width > 0 && height > 0 {
                rects.push(Rect::new(left + 1, top + 1, width, height));
            }
        }
    }
    rects
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_covers_terminal() {
        assert_eq!(tile(LayoutKind::Single, 24, 80, 1), vec![Rect::new(1, 1, 80, 24)]);
    }

    #[test]
    fn test_quad_even_terminal() {
        assert_eq!(
            tile(LayoutKind::Quad, 24, 80, 4),
            vec![
                Rect::new(1, 1, 40, 12),
                Rect::new(41, 1, 40, 12),
                Rect::new(1, 13, 40, 12),
                Rect::new(41, 13, 40, 12),
            ]
        );
    }

    #[test]
    fn test_quad_odd_terminal_covers_every_cell() {
        let rects = tile(LayoutKind::Quad, 25, 81, 4);
        assert_eq!(rects.len(), 4);
        let area: u32 = rects.iter().map(|r| u32::from(r.width) * u32::from(r.height)).sum();
        assert_eq!(area, 25 * 81);
        assert_eq!(rects[3], Rect::new(42, 14, 40, 12));
    }

    #[test]
    fn test_columns_and_rows() {
        assert_eq!(
            tile(LayoutKind::Columns, 10, 30, 3),
            vec![
                Rect::new(1, 1, 10, 10),
                Rect::new(11, 1, 10, 10),
                Rect::new(21, 1, 10, 10),
            ]
        );
        assert_eq!(
            tile(LayoutKind::Rows, 10, 30, 2),
            vec![Rect::new(1, 1, 30, 5), Rect::new(1, 6, 30, 5)]
        );
    }

    #[test]
    fn test_pane_count_clamped() {
        assert_eq!(tile(LayoutKind::Columns, 10, 100, 0).len(), 1);
        assert_eq!(tile(LayoutKind::Columns, 10, 100, 50).len(), MAX_PANES as usize);
    }

    #[test]
    fn test_tiny_terminal_skips_empty_tiles() {
        assert_eq!(tile(LayoutKind::Quad, 1, 1, 4), vec![Rect::new(1, 1, 1, 1)]);
    }
}
