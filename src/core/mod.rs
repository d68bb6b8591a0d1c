//! Core pane machinery.
//!
//! - **pty**: pseudo-terminal allocation, child spawning, line discipline
//! - **term**: escape-aware output rewriting for one rectangle
//! - **session**: pane lifecycle and its reader/writer/waiter threads
//!
//! # Architecture
//!
//! ```text
//! Session
//! ├── PtyParts (reader, writer, child process)
//! └── ScreenRenderer
//!     ├── Scanner (escape sequences)
//!     └── Cursor + pending tail
//! ```

pub mod pty;
pub mod session;
pub mod term;
