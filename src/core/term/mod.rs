//! Output translation for a single pane.
//!
//! - **scanner**: escape sequence extent and classification
//! - **width**: combining-mark detection
//! - **utf8**: truncated code point detection at chunk boundaries
//! - **renderer**: cursor tracking and coordinate remapping

pub mod renderer;
pub mod scanner;
pub mod utf8;
pub mod width;

pub use renderer::{Rect, ScreenRenderer};
