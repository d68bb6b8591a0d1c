//! Pane management - tiling, pane lifetime, and input focus.
//!
//! - **layout**: initial tiling of the terminal into rectangles
//! - **pane**: one rectangle plus its shell session
//! - **manager**: `Multiplexer` supervising every pane, `InputDispatcher` for stdin

pub mod layout;
pub mod manager;
pub mod pane;

pub use layout::LayoutKind;
pub use manager::Multiplexer;
