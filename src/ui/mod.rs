//! Real terminal side of the multiplexer.
//!
//! - **output**: single writer gate in front of stdout
//! - **input**: prefix-key routing of stdin
//! - **terminal**: raw/cooked mode and alternate screen

pub mod input;
pub mod output;
pub mod terminal;

pub use input::{InputAction, InputRouter, PrefixKey};
pub use output::OutputGate;
pub use terminal::{CrosstermTerminal, TerminalControl};
